use std::sync::Arc;

use crate::codec::{FrameCodec, NativeCodec};
use crate::config;
use crate::error::{WuffsError, WuffsResult};
use crate::image::{DecodedImage, PixelLayout};
use crate::io::{materialize, ImageSource, InputBuffer};
use crate::metadata::BasicImageMetadata;
use crate::model::ProbeResult;
use crate::registry::ImageReader;
use crate::sniff::ImageFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderState {
    Uninitialized,
    InputSet,
    Probed,
    Decoded,
}

/// Single-owner PNG/JPEG reader driving a [`FrameCodec`].
///
/// The probe and the input buffer are cached per input; `set_input` drops both.
pub struct WuffsImageReader {
    format: ImageFormat,
    codec: Arc<dyn FrameCodec>,
    log_decode: bool,

    state: ReaderState,
    source: Option<Box<dyn ImageSource>>,
    input: Option<InputBuffer>,
    probe: Option<ProbeResult>,
}

impl std::fmt::Debug for WuffsImageReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WuffsImageReader")
            .field("format", &self.format)
            .field("state", &self.state)
            .field("probe", &self.probe)
            .finish()
    }
}

impl WuffsImageReader {
    /// Reader backed by the process-wide native library.
    pub fn new(format: ImageFormat) -> Self {
        Self::with_codec(format, Arc::new(NativeCodec))
    }

    pub fn with_codec(format: ImageFormat, codec: Arc<dyn FrameCodec>) -> Self {
        Self {
            format,
            codec,
            log_decode: config::global().log_decode,
            state: ReaderState::Uninitialized,
            source: None,
            input: None,
            probe: None,
        }
    }

    #[inline]
    pub fn with_log_decode(mut self, on: bool) -> Self {
        self.log_decode = on;
        self
    }

    #[inline]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    #[inline]
    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn set_input(&mut self, source: Box<dyn ImageSource>) {
        self.source = Some(source);
        self.input = None;
        self.probe = None;
        self.state = ReaderState::InputSet;
    }

    /// Drops the input and every cache.
    pub fn dispose(&mut self) {
        self.source = None;
        self.input = None;
        self.probe = None;
        self.state = ReaderState::Uninitialized;
    }

    /// Returns the current source, e.g. to rewind or close it after a read.
    #[inline]
    pub fn take_input(&mut self) -> Option<Box<dyn ImageSource>> {
        let source = self.source.take();
        self.dispose();
        source
    }

    fn input_buffer(&mut self) -> WuffsResult<InputBuffer> {
        if let Some(buf) = &self.input {
            return Ok(buf.clone());
        }

        let source = self.source.as_deref_mut().ok_or(WuffsError::InputNotSet)?;
        let buf = match source.as_array() {
            Some(view) => view,
            None => {
                log::trace!(
                    target: "decode",
                    "materializing {} input",
                    source.source_type()
                );
                materialize(source)?
            }
        };

        self.input = Some(buf.clone());
        Ok(buf)
    }

    /// Probes once per input; later calls return the cached result.
    pub fn probe(&mut self) -> WuffsResult<ProbeResult> {
        if let Some(p) = self.probe {
            return Ok(p);
        }
        if self.state == ReaderState::Uninitialized {
            return Err(WuffsError::InputNotSet);
        }

        let input = self.input_buffer()?;
        let p = self.codec.probe(input.as_slice())?;

        self.probe = Some(p);
        self.state = ReaderState::Probed;
        Ok(p)
    }

    #[inline]
    fn check_index(index: usize) -> WuffsResult<()> {
        if index != 0 {
            return Err(WuffsError::ImageIndexOutOfBounds { index });
        }
        Ok(())
    }

    pub fn num_images(&mut self) -> WuffsResult<usize> {
        Ok(self.probe()?.frame_count.max(0) as usize)
    }

    pub fn width(&mut self, index: usize) -> WuffsResult<i32> {
        Self::check_index(index)?;
        Ok(self.probe()?.width)
    }

    pub fn height(&mut self, index: usize) -> WuffsResult<i32> {
        Self::check_index(index)?;
        Ok(self.probe()?.height)
    }

    /// The one layout every decode produces.
    pub fn image_types(&self, index: usize) -> WuffsResult<[PixelLayout; 1]> {
        Self::check_index(index)?;
        Ok([PixelLayout::BGRA_STRAIGHT])
    }

    /// `None` when the input cannot be probed.
    pub fn image_metadata(&mut self, index: usize) -> WuffsResult<Option<BasicImageMetadata>> {
        Self::check_index(index)?;
        match self.probe() {
            Ok(p) => Ok(Some(BasicImageMetadata::new(p.width, p.height, 4))),
            Err(e) => {
                log::debug!(target: "decode", "no metadata, probe failed: {e}");
                Ok(None)
            }
        }
    }

    #[inline]
    pub fn stream_metadata(&self) -> Option<BasicImageMetadata> {
        None
    }

    pub fn read(&mut self, index: usize) -> WuffsResult<DecodedImage> {
        Self::check_index(index)?;

        let p = self.probe()?;
        let len = p.pixel_buffer_len()?;
        let stride = p.row_bytes() as usize;
        let input = self.input_buffer()?;

        let mut pixels = vec![0u8; len];
        let frame = self.codec.decode_frame_into(input.as_slice(), 0, &mut pixels)?;
        frame.verify(&p, len)?;

        // pixel_buffer_len rejected negative dimensions.
        let image = DecodedImage::from_bgra(p.width as u32, p.height as u32, stride, pixels)?;
        self.state = ReaderState::Decoded;

        if self.log_decode {
            log::info!(
                target: "decode",
                "decoded {} image w:{} h:{}",
                self.format,
                p.width,
                p.height
            );
        } else {
            log::debug!(
                target: "decode",
                "decoded {} image w:{} h:{}",
                self.format,
                p.width,
                p.height
            );
        }

        Ok(image)
    }
}

impl ImageReader for WuffsImageReader {
    #[inline]
    fn format_name(&self) -> &'static str {
        self.format.name()
    }

    #[inline]
    fn set_input(&mut self, source: Box<dyn ImageSource>) {
        WuffsImageReader::set_input(self, source)
    }

    #[inline]
    fn num_images(&mut self) -> WuffsResult<usize> {
        WuffsImageReader::num_images(self)
    }

    #[inline]
    fn width(&mut self, index: usize) -> WuffsResult<i32> {
        WuffsImageReader::width(self, index)
    }

    #[inline]
    fn height(&mut self, index: usize) -> WuffsResult<i32> {
        WuffsImageReader::height(self, index)
    }

    #[inline]
    fn image_metadata(&mut self, index: usize) -> WuffsResult<Option<BasicImageMetadata>> {
        WuffsImageReader::image_metadata(self, index)
    }

    #[inline]
    fn read(&mut self, index: usize) -> WuffsResult<DecodedImage> {
        WuffsImageReader::read(self, index)
    }

    #[inline]
    fn dispose(&mut self) {
        WuffsImageReader::dispose(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{ByteArraySource, StreamSource};
    use crate::model::FrameResult;
    use parking_lot::Mutex;
    use std::io::{Cursor, Seek, SeekFrom};

    /// Fixed 2x2 codec that records what it was handed.
    #[derive(Default)]
    struct RecordingCodec {
        probes: Mutex<usize>,
        seen: Mutex<Vec<usize>>,
    }

    impl FrameCodec for RecordingCodec {
        fn probe(&self, data: &[u8]) -> WuffsResult<ProbeResult> {
            *self.probes.lock() += 1;
            self.seen.lock().push(data.as_ptr() as usize);
            if data.first() != Some(&0x89) {
                return Err(WuffsError::NativeDecode {
                    operation: "wuffs_probe_image",
                    code: -2,
                    message: "unsupported format".into(),
                });
            }
            Ok(ProbeResult {
                width: 2,
                height: 2,
                frame_count: 1,
                bytes_per_pixel: 4,
                stride_bytes: 8,
            })
        }

        fn decode_frame_into(
            &self,
            data: &[u8],
            _frame_index: u32,
            dst: &mut [u8],
        ) -> WuffsResult<FrameResult> {
            if data.last() == Some(&0xEE) {
                return Err(WuffsError::NativeDecode {
                    operation: "wuffs_decode_frame_into",
                    code: -3,
                    message: "png: bad checksum".into(),
                });
            }
            for px in dst.chunks_exact_mut(4) {
                px.copy_from_slice(&[0x10, 0x20, 0x30, 0xFF]);
            }
            Ok(FrameResult {
                width: 2,
                height: 2,
                stride_bytes: 8,
                bytes_written: dst.len() as i32,
            })
        }
    }

    fn reader(codec: &Arc<RecordingCodec>) -> WuffsImageReader {
        WuffsImageReader::with_codec(ImageFormat::Png, codec.clone()).with_log_decode(false)
    }

    const PNGISH: &[u8] = b"\x89PNG\r\n\x1a\npayload";

    #[test]
    fn walks_the_state_machine() {
        let codec = Arc::new(RecordingCodec::default());
        let mut r = reader(&codec);
        assert_eq!(r.state(), ReaderState::Uninitialized);
        assert!(matches!(r.probe(), Err(WuffsError::InputNotSet)));
        assert!(matches!(r.read(0), Err(WuffsError::InputNotSet)));

        r.set_input(Box::new(ByteArraySource::new(PNGISH.to_vec())));
        assert_eq!(r.state(), ReaderState::InputSet);

        r.probe().unwrap();
        assert_eq!(r.state(), ReaderState::Probed);

        let img = r.read(0).unwrap();
        assert_eq!(r.state(), ReaderState::Decoded);
        assert_eq!((img.width(), img.height()), (2, 2));
        assert_eq!(img.as_raw().len(), 16);
        assert_eq!(img.pixel(1, 1), Some([0x30, 0x20, 0x10, 0xFF]));

        r.dispose();
        assert_eq!(r.state(), ReaderState::Uninitialized);
    }

    #[test]
    fn probe_is_cached_until_input_changes() {
        let codec = Arc::new(RecordingCodec::default());
        let mut r = reader(&codec);
        r.set_input(Box::new(ByteArraySource::new(PNGISH.to_vec())));

        assert_eq!(r.num_images().unwrap(), 1);
        assert_eq!(r.width(0).unwrap(), 2);
        assert_eq!(r.height(0).unwrap(), 2);
        r.read(0).unwrap();
        assert_eq!(*codec.probes.lock(), 1);

        r.set_input(Box::new(ByteArraySource::new(PNGISH.to_vec())));
        assert_eq!(r.state(), ReaderState::InputSet);
        r.probe().unwrap();
        assert_eq!(*codec.probes.lock(), 2);
    }

    #[test]
    fn array_backed_input_is_not_copied() {
        let codec = Arc::new(RecordingCodec::default());
        let mut r = reader(&codec);
        let data: Arc<[u8]> = Arc::from(PNGISH);
        let base = data.as_ptr() as usize;

        r.set_input(Box::new(ByteArraySource::new(Arc::clone(&data))));
        r.probe().unwrap();
        assert_eq!(codec.seen.lock()[0], base);
    }

    #[test]
    fn stream_input_is_materialized_and_rewound() {
        let codec = Arc::new(RecordingCodec::default());
        let mut r = reader(&codec);
        let mut src = StreamSource::new(Cursor::new(PNGISH.to_vec()));
        src.seek(SeekFrom::Start(4)).unwrap();

        r.set_input(Box::new(src));
        let img = r.read(0).unwrap();
        assert_eq!(img.width(), 2);

        let mut back = r.take_input().unwrap();
        assert_eq!(back.stream_position().unwrap(), 4);
    }

    #[test]
    fn only_index_zero() {
        let codec = Arc::new(RecordingCodec::default());
        let mut r = reader(&codec);
        r.set_input(Box::new(ByteArraySource::new(PNGISH.to_vec())));
        assert!(matches!(r.read(1), Err(WuffsError::ImageIndexOutOfBounds { index: 1 })));
        assert!(matches!(r.image_metadata(1), Err(WuffsError::ImageIndexOutOfBounds { .. })));
        assert_eq!(r.image_types(0).unwrap(), [PixelLayout::BGRA_STRAIGHT]);
        assert!(r.stream_metadata().is_none());
    }

    #[test]
    fn decode_failure_keeps_probed_state() {
        let codec = Arc::new(RecordingCodec::default());
        let mut r = reader(&codec);
        let mut bad = PNGISH.to_vec();
        bad.push(0xEE);
        r.set_input(Box::new(ByteArraySource::new(bad)));

        let err = r.read(0).unwrap_err();
        assert_eq!(err.native_code(), Some(-3));
        assert!(err.to_string().contains("checksum"));
        assert_eq!(r.state(), ReaderState::Probed);
    }

    /// Probes 2x2 but claims to have written a single pixel.
    struct ShortWriteCodec;

    impl FrameCodec for ShortWriteCodec {
        fn probe(&self, _data: &[u8]) -> WuffsResult<ProbeResult> {
            Ok(ProbeResult {
                width: 2,
                height: 2,
                frame_count: 1,
                bytes_per_pixel: 4,
                stride_bytes: 8,
            })
        }

        fn decode_frame_into(
            &self,
            _data: &[u8],
            _frame_index: u32,
            dst: &mut [u8],
        ) -> WuffsResult<FrameResult> {
            dst[..4].copy_from_slice(&[1, 2, 3, 4]);
            Ok(FrameResult {
                width: 1,
                height: 1,
                stride_bytes: 4,
                bytes_written: 4,
            })
        }
    }

    #[test]
    fn short_decode_is_not_returned_as_an_image() {
        let mut r = WuffsImageReader::with_codec(ImageFormat::Png, Arc::new(ShortWriteCodec))
            .with_log_decode(false);
        r.set_input(Box::new(ByteArraySource::new(PNGISH.to_vec())));

        let err = r.read(0).unwrap_err();
        assert!(
            matches!(
                err,
                WuffsError::IncompleteFrame {
                    width: 1,
                    height: 1,
                    written: 4,
                    expected_width: 2,
                    expected_height: 2,
                    expected_len: 16,
                }
            ),
            "got {err:?}"
        );
        assert!(!err.is_fatal());
        assert_eq!(r.state(), ReaderState::Probed);
    }

    #[test]
    fn metadata_follows_probe() {
        let codec = Arc::new(RecordingCodec::default());
        let mut r = reader(&codec);
        r.set_input(Box::new(ByteArraySource::new(PNGISH.to_vec())));
        assert_eq!(r.image_metadata(0).unwrap(), Some(BasicImageMetadata::new(2, 2, 4)));

        r.set_input(Box::new(ByteArraySource::new(b"GIF89a".to_vec())));
        assert_eq!(r.image_metadata(0).unwrap(), None);
        assert_eq!(r.state(), ReaderState::InputSet);
    }
}
