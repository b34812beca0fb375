use crate::error::{WuffsError, WuffsResult};
use crate::native::abi::{RawFrameResult, RawProbeResult, BYTES_PER_PIXEL};

/// Metadata-only view of an encoded image, as reported by the native probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeResult {
    pub width: i32,
    pub height: i32,
    pub frame_count: i32,
    pub bytes_per_pixel: i32,
    pub stride_bytes: i32,
}

impl ProbeResult {
    /// Exact output length for a 4-byte-per-pixel decode: `width * height * 4`.
    pub fn pixel_buffer_len(&self) -> WuffsResult<usize> {
        if self.width < 0 || self.height < 0 {
            return Err(WuffsError::invalid_input(format!(
                "negative dimensions {}x{}",
                self.width, self.height
            )));
        }
        let len = self
            .width
            .checked_mul(BYTES_PER_PIXEL)
            .and_then(|row| row.checked_mul(self.height))
            .ok_or(WuffsError::DimensionOverflow {
                width: self.width,
                height: self.height,
            })?;
        Ok(len as usize)
    }

    /// Row length of the 4-byte-per-pixel output.
    #[inline]
    pub fn row_bytes(&self) -> i32 {
        self.width.saturating_mul(BYTES_PER_PIXEL)
    }
}

impl From<RawProbeResult> for ProbeResult {
    #[inline]
    fn from(r: RawProbeResult) -> Self {
        Self {
            width: r.width,
            height: r.height,
            frame_count: r.frame_count,
            bytes_per_pixel: r.bytes_per_pixel,
            stride_bytes: r.stride_bytes,
        }
    }
}

/// Describes the buffer a decode call actually wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameResult {
    pub width: i32,
    pub height: i32,
    pub stride_bytes: i32,
    pub bytes_written: i32,
}

impl From<RawFrameResult> for FrameResult {
    #[inline]
    fn from(r: RawFrameResult) -> Self {
        Self {
            width: r.width,
            height: r.height,
            stride_bytes: r.stride_bytes,
            bytes_written: r.bytes_written,
        }
    }
}

impl FrameResult {
    /// Fails unless the decode filled exactly the `expected_len` bytes the probe promised.
    pub fn verify(&self, probe: &ProbeResult, expected_len: usize) -> WuffsResult<()> {
        let complete = self.width == probe.width
            && self.height == probe.height
            && usize::try_from(self.bytes_written).ok() == Some(expected_len);
        if complete {
            return Ok(());
        }
        Err(WuffsError::IncompleteFrame {
            width: self.width,
            height: self.height,
            written: self.bytes_written,
            expected_width: probe.width,
            expected_height: probe.height,
            expected_len,
        })
    }
}
