//! Fixed C ABI of the `wuffs_imageio` native library.
//!
//! Layouts are spelled out field by field with explicit offsets; they must match
//! `wuffs_probe_result` / `wuffs_frame_result` in the native header exactly.

use std::ffi::{c_char, c_int};
use std::mem::{offset_of, size_of};

pub const SYM_PROBE: &str = "wuffs_probe_image";
pub const SYM_DECODE_FRAME_INTO: &str = "wuffs_decode_frame_into";
pub const SYM_ERROR_MESSAGE: &str = "wuffs_error_message";
pub const SYM_CPU_SUPPORTS_ACCEL: &str = "wuffs_cpu_supports_avx2";

/// Native status codes.
pub mod status {
    pub const OK: i32 = 0;
    pub const INVALID_ARGUMENT: i32 = -1;
    pub const UNSUPPORTED_FORMAT: i32 = -2;
    pub const CODEC_ERROR: i32 = -3;
    pub const NOT_IMPLEMENTED: i32 = -4;
}

/// Bytes per output pixel in the observed ABI (B, G, R, A).
pub const BYTES_PER_PIXEL: i32 = 4;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RawProbeResult {
    pub width: i32,
    pub height: i32,
    pub frame_count: i32,
    pub bytes_per_pixel: i32,
    pub stride_bytes: i32,
}

pub const PROBE_WIDTH_OFFSET: usize = 0;
pub const PROBE_HEIGHT_OFFSET: usize = 4;
pub const PROBE_FRAME_COUNT_OFFSET: usize = 8;
pub const PROBE_BYTES_PER_PIXEL_OFFSET: usize = 12;
pub const PROBE_STRIDE_BYTES_OFFSET: usize = 16;
pub const PROBE_RESULT_SIZE: usize = 20;

const _: () = {
    assert!(offset_of!(RawProbeResult, width) == PROBE_WIDTH_OFFSET);
    assert!(offset_of!(RawProbeResult, height) == PROBE_HEIGHT_OFFSET);
    assert!(offset_of!(RawProbeResult, frame_count) == PROBE_FRAME_COUNT_OFFSET);
    assert!(offset_of!(RawProbeResult, bytes_per_pixel) == PROBE_BYTES_PER_PIXEL_OFFSET);
    assert!(offset_of!(RawProbeResult, stride_bytes) == PROBE_STRIDE_BYTES_OFFSET);
    assert!(size_of::<RawProbeResult>() == PROBE_RESULT_SIZE);
};

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RawFrameResult {
    pub width: i32,
    pub height: i32,
    pub stride_bytes: i32,
    pub bytes_written: i32,
}

pub const FRAME_WIDTH_OFFSET: usize = 0;
pub const FRAME_HEIGHT_OFFSET: usize = 4;
pub const FRAME_STRIDE_BYTES_OFFSET: usize = 8;
pub const FRAME_BYTES_WRITTEN_OFFSET: usize = 12;
pub const FRAME_RESULT_SIZE: usize = 16;

const _: () = {
    assert!(offset_of!(RawFrameResult, width) == FRAME_WIDTH_OFFSET);
    assert!(offset_of!(RawFrameResult, height) == FRAME_HEIGHT_OFFSET);
    assert!(offset_of!(RawFrameResult, stride_bytes) == FRAME_STRIDE_BYTES_OFFSET);
    assert!(offset_of!(RawFrameResult, bytes_written) == FRAME_BYTES_WRITTEN_OFFSET);
    assert!(size_of::<RawFrameResult>() == FRAME_RESULT_SIZE);
};

/// Decode options accepted by `wuffs_decode_frame_into`.
///
/// Reserved: every call passes NULL and nothing here reads or builds one.
#[repr(C)]
pub struct ReservedDecodeOptions {
    _private: [u8; 0],
}

pub type ProbeFn =
    unsafe extern "C" fn(data: *const u8, len: usize, out: *mut RawProbeResult) -> c_int;

pub type DecodeFrameIntoFn = unsafe extern "C" fn(
    data: *const u8,
    len: usize,
    frame_index: u32,
    options: *const ReservedDecodeOptions,
    dst: *mut u8,
    dst_len: usize,
    out: *mut RawFrameResult,
) -> c_int;

/// Returned pointer is only valid until the next native call.
pub type ErrorMessageFn = unsafe extern "C" fn(code: c_int) -> *const c_char;

pub type CpuSupportsAccelFn = unsafe extern "C" fn() -> c_int;
