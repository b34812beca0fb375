#![forbid(unsafe_op_in_unsafe_fn)]

use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use libloading::Library;
use parking_lot::Mutex;

use crate::error::{WuffsError, WuffsResult};
use crate::model::{FrameResult, ProbeResult};
use crate::native::abi::{
    self, CpuSupportsAccelFn, DecodeFrameIntoFn, ErrorMessageFn, ProbeFn, RawFrameResult,
    RawProbeResult,
};
use crate::native::loader::NativeLibrary;

const UNKNOWN_ERROR: &str = "unknown error";

/// Typed call surface of one loaded `wuffs_imageio` binary.
///
/// Required symbols are resolved lazily, each exactly once: a lock-free read on the
/// fast path and a narrow lock for the first resolution.
pub struct NativeApi {
    library: Option<Library>,
    origin: PathBuf,
    probe: OnceLock<ProbeFn>,
    decode: OnceLock<DecodeFrameIntoFn>,
    error_message: OnceLock<ErrorMessageFn>,
    resolve_lock: Mutex<()>,
}

impl std::fmt::Debug for NativeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeApi")
            .field("origin", &self.origin)
            .field("probe_resolved", &self.probe.get().is_some())
            .field("decode_resolved", &self.decode.get().is_some())
            .field("error_message_resolved", &self.error_message.get().is_some())
            .finish()
    }
}

impl NativeApi {
    /// Loads a specific binary as a standalone handle (not the process-wide one).
    pub fn open(path: &Path) -> WuffsResult<Self> {
        log::debug!(target: "ffi", "loading '{}'", path.display());

        // SAFETY: loading runs the library's initializers; the wuffs_imageio binaries have
        // none beyond the C runtime's.
        let library = unsafe { Library::new(path) }.map_err(|source| WuffsError::LibraryLoad {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            library: Some(library),
            origin: path.to_path_buf(),
            probe: OnceLock::new(),
            decode: OnceLock::new(),
            error_message: OnceLock::new(),
            resolve_lock: Mutex::new(()),
        })
    }

    /// Builds a handle over already-known entry points.
    #[cfg(test)]
    pub(crate) fn from_fns(
        probe: ProbeFn,
        decode: DecodeFrameIntoFn,
        error_message: ErrorMessageFn,
    ) -> Self {
        Self {
            library: None,
            origin: PathBuf::from("<in-process>"),
            probe: OnceLock::from(probe),
            decode: OnceLock::from(decode),
            error_message: OnceLock::from(error_message),
            resolve_lock: Mutex::new(()),
        }
    }

    #[inline]
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    fn resolve<F: Copy>(&self, cell: &OnceLock<F>, symbol: &'static str) -> WuffsResult<F> {
        if let Some(f) = cell.get() {
            return Ok(*f);
        }

        let _guard = self.resolve_lock.lock();
        if let Some(f) = cell.get() {
            return Ok(*f);
        }

        let f = self.lookup::<F>(symbol)?;
        log::trace!(target: "ffi", "resolved '{symbol}' in '{}'", self.origin.display());
        Ok(*cell.get_or_init(|| f))
    }

    fn lookup<F: Copy>(&self, symbol: &'static str) -> WuffsResult<F> {
        let lib = self
            .library
            .as_ref()
            .ok_or_else(|| WuffsError::SymbolResolution {
                symbol,
                message: format!("no library behind '{}'", self.origin.display()),
            })?;

        // SAFETY: `F` is one of the abi fn types, matching the exported C signature.
        let sym = unsafe { lib.get::<F>(symbol.as_bytes()) }.map_err(|e| {
            WuffsError::SymbolResolution {
                symbol,
                message: e.to_string(),
            }
        })?;
        Ok(*sym)
    }

    /// Asks the binary whether the CPU can run the accelerated variant.
    ///
    /// A missing export counts as "unsupported".
    pub fn cpu_supports_accel(&self) -> bool {
        let f = match self.lookup::<CpuSupportsAccelFn>(abi::SYM_CPU_SUPPORTS_ACCEL) {
            Ok(f) => f,
            Err(e) => {
                log::debug!(target: "ffi", "cpu feature probe unavailable: {e}");
                return false;
            }
        };
        // SAFETY: takes no arguments and only executes cpuid/xgetbv.
        unsafe { f() != 0 }
    }

    /// Resolves a native status code into an owned, human-readable message.
    pub fn error_message(&self, code: i32) -> WuffsResult<String> {
        let f = self.resolve(&self.error_message, abi::SYM_ERROR_MESSAGE)?;

        // SAFETY: returns NULL or a NUL-terminated string that stays valid until the next
        // native call on this thread; it is copied before returning.
        let message = unsafe {
            let ptr = f(code);
            if ptr.is_null() {
                UNKNOWN_ERROR.to_owned()
            } else {
                CStr::from_ptr(ptr).to_string_lossy().into_owned()
            }
        };
        Ok(message)
    }

    fn check(&self, operation: &'static str, code: i32) -> WuffsResult<()> {
        if code == abi::status::OK {
            return Ok(());
        }
        let message = self.error_message(code)?;
        Err(WuffsError::NativeDecode {
            operation,
            code,
            message,
        })
    }

    /// Reads dimensions and frame count without decoding pixels.
    pub fn probe(&self, data: &[u8]) -> WuffsResult<ProbeResult> {
        if data.is_empty() {
            return Err(WuffsError::invalid_input("data is empty"));
        }

        let f = self.resolve(&self.probe, abi::SYM_PROBE)?;
        let mut out = RawProbeResult::default();

        // SAFETY: `data` is valid for `data.len()` bytes and `out` is an exclusively borrowed
        // struct with the native layout; the call does not retain either pointer.
        let code = unsafe { f(data.as_ptr(), data.len(), &mut out) };
        self.check(abi::SYM_PROBE, code)?;

        Ok(out.into())
    }

    /// Decodes frame `frame_index` into `dst` (4 bytes per pixel, B,G,R,A).
    pub fn decode_frame_into(
        &self,
        data: &[u8],
        frame_index: u32,
        dst: &mut [u8],
    ) -> WuffsResult<FrameResult> {
        if data.is_empty() {
            return Err(WuffsError::invalid_input("data is empty"));
        }
        if dst.is_empty() {
            return Err(WuffsError::invalid_input("dst pixels are empty"));
        }

        let f = self.resolve(&self.decode, abi::SYM_DECODE_FRAME_INTO)?;
        let mut out = RawFrameResult::default();

        // SAFETY: input and output slices are valid for their lengths and do not overlap
        // (`dst` is exclusively borrowed); options are always NULL.
        let code = unsafe {
            f(
                data.as_ptr(),
                data.len(),
                frame_index,
                std::ptr::null(),
                dst.as_mut_ptr(),
                dst.len(),
                &mut out,
            )
        };
        self.check(abi::SYM_DECODE_FRAME_INTO, code)?;

        Ok(out.into())
    }
}

/// The process-wide native handle, loading the platform binary on first use.
#[inline]
pub fn bridge() -> WuffsResult<&'static NativeApi> {
    Ok(NativeLibrary::load()?.api())
}

/// Validates an `(offset, length)` window over `data` and returns it.
pub fn checked_range(data: &[u8], offset: usize, length: usize) -> WuffsResult<&[u8]> {
    let end = offset.checked_add(length).ok_or_else(|| {
        WuffsError::invalid_input(format!(
            "invalid offset/length for array: offset={offset}, length={length}"
        ))
    })?;
    data.get(offset..end).ok_or_else(|| {
        WuffsError::invalid_input(format!(
            "invalid offset/length for array of {}: offset={offset}, length={length}",
            data.len()
        ))
    })
}
