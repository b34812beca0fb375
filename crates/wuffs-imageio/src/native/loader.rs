use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::config::{self, NativeConfig};
use crate::error::{WuffsError, WuffsResult};
use crate::native::ffi::NativeApi;
use crate::native::platform::PlatformDescriptor;
use crate::native::resources::{extract_to_temp, NativeResources, ResourceChain};

/// Which binary ended up loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeVariant {
    Baseline,
    Accelerated,
}

impl NativeVariant {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            NativeVariant::Baseline => "baseline",
            NativeVariant::Accelerated => "avx2",
        }
    }
}

impl fmt::Display for NativeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of variant selection over some library handle type.
#[derive(Debug)]
pub struct Selected<H> {
    pub handle: H,
    pub path: PathBuf,
    pub variant: NativeVariant,
}

/// Extracts and opens the right binary for `platform`.
///
/// The baseline is always extracted and opened first; its CPU probe decides whether the
/// accelerated binary replaces it. A platform with no accelerated file, a resource set that
/// does not carry it, or `allow_accel == false` keeps the baseline.
pub fn select_variant<H>(
    platform: &PlatformDescriptor,
    resources: &dyn NativeResources,
    allow_accel: bool,
    temp_prefix: &str,
    mut open: impl FnMut(&Path) -> WuffsResult<H>,
    supports_accel: impl Fn(&H) -> bool,
) -> WuffsResult<Selected<H>> {
    let baseline_key = platform
        .baseline_resource()
        .ok_or_else(|| WuffsError::UnsupportedPlatform {
            platform: platform.label(),
        })?;

    let baseline_path = extract_to_temp(resources, &baseline_key, temp_prefix)?;
    let baseline = open(&baseline_path)?;

    let baseline_selected = |handle: H, path: PathBuf| Selected {
        handle,
        path,
        variant: NativeVariant::Baseline,
    };

    let Some(accel_key) = platform.accel_resource() else {
        return Ok(baseline_selected(baseline, baseline_path));
    };
    if !allow_accel {
        log::debug!(target: "natives", "accelerated variant disabled by config");
        return Ok(baseline_selected(baseline, baseline_path));
    }
    if !resources.contains(&accel_key) {
        log::debug!(target: "natives", "no accelerated binary packaged for {}", platform.label());
        return Ok(baseline_selected(baseline, baseline_path));
    }
    if !supports_accel(&baseline) {
        log::debug!(target: "natives", "cpu lacks avx2, staying on baseline");
        return Ok(baseline_selected(baseline, baseline_path));
    }

    let accel_path = extract_to_temp(resources, &accel_key, temp_prefix)?;
    let accel = open(&accel_path)?;
    drop(baseline);

    Ok(Selected {
        handle: accel,
        path: accel_path,
        variant: NativeVariant::Accelerated,
    })
}

/// The process-wide loaded binary.
#[derive(Debug)]
pub struct LoadedNative {
    api: NativeApi,
    path: PathBuf,
    variant: NativeVariant,
}

impl LoadedNative {
    #[inline]
    pub fn api(&self) -> &NativeApi {
        &self.api
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn variant(&self) -> NativeVariant {
        self.variant
    }
}

static LOADED: OnceLock<LoadedNative> = OnceLock::new();
static LOAD_LOCK: Mutex<()> = Mutex::new(());

/// Process-wide, load-once access to the platform's `wuffs_imageio` binary.
///
/// Failures are returned to every caller and are not cached: a later call retries.
pub struct NativeLibrary;

impl NativeLibrary {
    pub fn load() -> WuffsResult<&'static LoadedNative> {
        if let Some(loaded) = LOADED.get() {
            return Ok(loaded);
        }

        let _guard = LOAD_LOCK.lock();
        if let Some(loaded) = LOADED.get() {
            return Ok(loaded);
        }

        let loaded = Self::load_with(PlatformDescriptor::current(), config::global())?;
        Ok(LOADED.get_or_init(|| loaded))
    }

    fn load_with(platform: &PlatformDescriptor, cfg: &NativeConfig) -> WuffsResult<LoadedNative> {
        if !platform.supported {
            return Err(WuffsError::UnsupportedPlatform {
                platform: platform.label(),
            });
        }

        let resources = ResourceChain::from_config(cfg.natives_dir.as_deref());
        if resources.is_empty() {
            log::warn!(
                target: "natives",
                "no embedded natives and no natives dir configured (set {})",
                config::ENV_NATIVES_DIR
            );
        }

        let selected = select_variant(
            platform,
            &resources,
            cfg.accelerated,
            &cfg.temp_prefix,
            NativeApi::open,
            NativeApi::cpu_supports_accel,
        )?;

        log::info!(
            target: "natives",
            "loaded wuffs_imageio ({}) for {} from '{}'",
            selected.variant,
            platform.label(),
            selected.path.display()
        );

        Ok(LoadedNative {
            api: selected.handle,
            path: selected.path,
            variant: selected.variant,
        })
    }

    #[inline]
    pub fn is_loaded() -> bool {
        LOADED.get().is_some()
    }

    /// Resource key of the baseline binary for this process; `None` when unsupported.
    #[inline]
    pub fn resource_path_for_current_platform() -> Option<String> {
        PlatformDescriptor::current().baseline_resource()
    }

    /// Path of the binary actually loaded, loading it if needed.
    pub fn loaded_library_path() -> WuffsResult<&'static Path> {
        Ok(Self::load()?.path())
    }

    pub fn loaded_variant() -> WuffsResult<NativeVariant> {
        Ok(Self::load()?.variant())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::resources::EmbeddedResources;
    use std::cell::RefCell;

    static LINUX_BOTH: &[(&str, &[u8])] = &[
        ("natives/x86_64-linux/libwuffs_imageio.so", b"baseline"),
        ("natives/x86_64-linux/libwuffs_imageio_avx2.so", b"accelerated"),
    ];

    static LINUX_BASELINE_ONLY: &[(&str, &[u8])] =
        &[("natives/x86_64-linux/libwuffs_imageio.so", b"baseline")];

    static MAC_ARM: &[(&str, &[u8])] = &[
        ("natives/arm64-macos/libwuffs_imageio.dylib", b"baseline"),
        ("natives/arm64-macos/libwuffs_imageio_avx2.dylib", b"never"),
    ];

    /// Fake handle: remembers the bytes of the file it was "opened" from.
    #[derive(Debug)]
    struct FakeLib(Vec<u8>);

    fn open_fake(opened: &RefCell<Vec<PathBuf>>) -> impl FnMut(&Path) -> WuffsResult<FakeLib> + '_ {
        move |p| {
            opened.borrow_mut().push(p.to_path_buf());
            Ok(FakeLib(std::fs::read(p)?))
        }
    }

    fn linux() -> PlatformDescriptor {
        PlatformDescriptor::resolve("linux", "x86_64")
    }

    #[test]
    fn avx2_capable_cpu_gets_accelerated_variant() {
        let opened = RefCell::new(Vec::new());
        let res = EmbeddedResources::from_static(LINUX_BOTH);
        let s = select_variant(&linux(), &res, true, "wuffs-sel-", open_fake(&opened), |_| true)
            .unwrap();

        assert_eq!(s.variant, NativeVariant::Accelerated);
        assert_eq!(s.handle.0, b"accelerated");
        assert_eq!(s.path.file_name().unwrap(), "libwuffs_imageio_avx2.so");
        assert_eq!(opened.borrow().len(), 2);
    }

    #[test]
    fn cpu_without_avx2_keeps_baseline() {
        let opened = RefCell::new(Vec::new());
        let res = EmbeddedResources::from_static(LINUX_BOTH);
        let s = select_variant(&linux(), &res, true, "wuffs-sel-", open_fake(&opened), |_| false)
            .unwrap();

        assert_eq!(s.variant, NativeVariant::Baseline);
        assert_eq!(s.handle.0, b"baseline");
        assert_eq!(opened.borrow().len(), 1);
    }

    #[test]
    fn config_can_disable_acceleration() {
        let opened = RefCell::new(Vec::new());
        let res = EmbeddedResources::from_static(LINUX_BOTH);
        let s = select_variant(&linux(), &res, false, "wuffs-sel-", open_fake(&opened), |_| {
            panic!("cpu probe must not run when acceleration is disabled")
        })
        .unwrap();
        assert_eq!(s.variant, NativeVariant::Baseline);
    }

    #[test]
    fn missing_accelerated_resource_keeps_baseline() {
        let opened = RefCell::new(Vec::new());
        let res = EmbeddedResources::from_static(LINUX_BASELINE_ONLY);
        let s = select_variant(&linux(), &res, true, "wuffs-sel-", open_fake(&opened), |_| true)
            .unwrap();
        assert_eq!(s.variant, NativeVariant::Baseline);
    }

    #[test]
    fn arm64_never_probes_for_avx2() {
        let opened = RefCell::new(Vec::new());
        let res = EmbeddedResources::from_static(MAC_ARM);
        let mac = PlatformDescriptor::resolve("macos", "aarch64");
        let s = select_variant(&mac, &res, true, "wuffs-sel-", open_fake(&opened), |_| {
            panic!("arm64 has no accelerated variant")
        })
        .unwrap();
        assert_eq!(s.variant, NativeVariant::Baseline);
        assert_eq!(s.path.file_name().unwrap(), "libwuffs_imageio.dylib");
    }

    #[test]
    fn missing_baseline_is_fatal() {
        let opened = RefCell::new(Vec::new());
        let res = EmbeddedResources::from_static(MAC_ARM);
        let err = select_variant(&linux(), &res, true, "wuffs-sel-", open_fake(&opened), |_| true)
            .unwrap_err();
        assert!(matches!(err, WuffsError::MissingNativeResource { .. }));
        assert!(opened.borrow().is_empty());
    }

    #[test]
    fn unsupported_platform_fails_before_extraction() {
        let opened = RefCell::new(Vec::new());
        let res = EmbeddedResources::from_static(LINUX_BOTH);
        let p = PlatformDescriptor::resolve("linux", "aarch64");
        let err =
            select_variant(&p, &res, true, "wuffs-sel-", open_fake(&opened), |_| true).unwrap_err();
        assert!(matches!(err, WuffsError::UnsupportedPlatform { .. }));

        let err = NativeLibrary::load_with(&p, &NativeConfig::default()).unwrap_err();
        assert!(matches!(err, WuffsError::UnsupportedPlatform { ref platform } if platform == "linux aarch64"));
    }

    #[test]
    fn open_failure_propagates() {
        let res = EmbeddedResources::from_static(LINUX_BOTH);
        let err = select_variant(
            &linux(),
            &res,
            true,
            "wuffs-sel-",
            |p: &Path| NativeApi::open(p),
            NativeApi::cpu_supports_accel,
        )
        .unwrap_err();
        assert!(matches!(err, WuffsError::LibraryLoad { .. }));
    }

    #[test]
    fn resource_path_matches_platform() {
        assert_eq!(
            NativeLibrary::resource_path_for_current_platform(),
            PlatformDescriptor::current().baseline_resource()
        );
    }
}
