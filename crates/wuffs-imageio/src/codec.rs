use crate::error::WuffsResult;
use crate::model::{FrameResult, ProbeResult};
use crate::native::ffi::{bridge, NativeApi};

/// Probe/decode backend a reader drives.
pub trait FrameCodec: Send + Sync {
    fn probe(&self, data: &[u8]) -> WuffsResult<ProbeResult>;

    /// Fills `dst` with frame `frame_index` as 4 bytes per pixel (B, G, R, A).
    fn decode_frame_into(
        &self,
        data: &[u8],
        frame_index: u32,
        dst: &mut [u8],
    ) -> WuffsResult<FrameResult>;
}

impl FrameCodec for NativeApi {
    #[inline]
    fn probe(&self, data: &[u8]) -> WuffsResult<ProbeResult> {
        NativeApi::probe(self, data)
    }

    #[inline]
    fn decode_frame_into(
        &self,
        data: &[u8],
        frame_index: u32,
        dst: &mut [u8],
    ) -> WuffsResult<FrameResult> {
        NativeApi::decode_frame_into(self, data, frame_index, dst)
    }
}

/// Routes through the process-wide bridge, loading the native binary on first use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeCodec;

impl FrameCodec for NativeCodec {
    #[inline]
    fn probe(&self, data: &[u8]) -> WuffsResult<ProbeResult> {
        bridge()?.probe(data)
    }

    #[inline]
    fn decode_frame_into(
        &self,
        data: &[u8],
        frame_index: u32,
        dst: &mut [u8],
    ) -> WuffsResult<FrameResult> {
        bridge()?.decode_frame_into(data, frame_index, dst)
    }
}
