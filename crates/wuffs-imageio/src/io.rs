use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::error::{WuffsError, WuffsResult};
use crate::native::ffi::checked_range;

/// Validated `(data, offset, length)` window handed to the native codec.
///
/// Cloning shares the backing bytes.
#[derive(Clone)]
pub struct InputBuffer {
    data: Arc<[u8]>,
    offset: usize,
    length: usize,
}

impl InputBuffer {
    pub fn new(data: Arc<[u8]>, offset: usize, length: usize) -> WuffsResult<Self> {
        checked_range(&data, offset, length)?;
        Ok(Self {
            data,
            offset,
            length,
        })
    }

    #[inline]
    pub fn whole(data: Arc<[u8]>) -> Self {
        let length = data.len();
        Self {
            data,
            offset: 0,
            length,
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.length]
    }

    #[inline]
    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// True when both buffers view the same allocation.
    #[inline]
    pub fn shares_storage_with(&self, other: &InputBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for InputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputBuffer")
            .field("backing_len", &self.data.len())
            .field("offset", &self.offset)
            .field("length", &self.length)
            .finish()
    }
}

/// A seekable byte source a reader can be pointed at.
pub trait ImageSource: Read + Seek + Send {
    /// Backing bytes when the source is array-backed; enables zero-copy decode.
    #[inline]
    fn as_array(&self) -> Option<InputBuffer> {
        None
    }

    /// Total length in bytes, when known.
    #[inline]
    fn length(&self) -> Option<u64> {
        None
    }

    fn source_type(&self) -> &'static str;
}

/// Seekable, zero-copy view over shared bytes.
#[derive(Debug)]
pub struct ByteArraySource {
    data: Arc<[u8]>,
    offset: usize,
    length: usize,
    pos: u64,
    closed: bool,
}

impl ByteArraySource {
    #[inline]
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        let data = data.into();
        let length = data.len();
        Self {
            data,
            offset: 0,
            length,
            pos: 0,
            closed: false,
        }
    }

    /// View of `data[offset..offset + length]`.
    pub fn with_range(data: impl Into<Arc<[u8]>>, offset: usize, length: usize) -> WuffsResult<Self> {
        let data = data.into();
        checked_range(&data, offset, length)?;
        Ok(Self {
            data,
            offset,
            length,
            pos: 0,
            closed: false,
        })
    }

    /// Backing bytes (no copy).
    #[inline]
    pub fn array(&self) -> &Arc<[u8]> {
        &self.data
    }

    #[inline]
    pub fn array_offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn array_length(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Idempotent.
    #[inline]
    pub fn close(&mut self) {
        self.closed = true;
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[inline]
    fn check_open(&self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::Other, "closed"));
        }
        Ok(())
    }

    #[inline]
    fn remaining(&self) -> &[u8] {
        let start = self.offset + (self.pos as usize).min(self.length);
        &self.data[start..self.offset + self.length]
    }
}

impl Read for ByteArraySource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_open()?;
        let rem = self.remaining();
        let n = rem.len().min(buf.len());
        buf[..n].copy_from_slice(&rem[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for ByteArraySource {
    fn seek(&mut self, to: SeekFrom) -> io::Result<u64> {
        self.check_open()?;
        let target = match to {
            SeekFrom::Start(p) => i128::from(p),
            SeekFrom::Current(d) => i128::from(self.pos) + i128::from(d),
            SeekFrom::End(d) => self.length as i128 + i128::from(d),
        };
        if target < 0 || target > self.length as i128 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("pos out of range: {target}"),
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

impl ImageSource for ByteArraySource {
    #[inline]
    fn as_array(&self) -> Option<InputBuffer> {
        Some(InputBuffer {
            data: Arc::clone(&self.data),
            offset: self.offset,
            length: self.length,
        })
    }

    #[inline]
    fn length(&self) -> Option<u64> {
        Some(self.length as u64)
    }

    fn source_type(&self) -> &'static str {
        "ByteArraySource"
    }
}

/// Any seekable stream (files, cursors). Decoding it materializes one owned copy.
#[derive(Debug)]
pub struct StreamSource<R> {
    inner: R,
}

impl<R: Read + Seek + Send> StreamSource<R> {
    #[inline]
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    #[inline]
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for StreamSource<R> {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Seek> Seek for StreamSource<R> {
    #[inline]
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl<R: Read + Seek + Send> ImageSource for StreamSource<R> {
    fn source_type(&self) -> &'static str {
        "StreamSource"
    }
}

/// Reads the whole source from the start into one owned buffer, restoring the position.
pub fn materialize(source: &mut dyn ImageSource) -> WuffsResult<InputBuffer> {
    let pos = source.stream_position().ok();

    let result = (|| -> io::Result<Vec<u8>> {
        if pos != Some(0) {
            source.seek(SeekFrom::Start(0))?;
        }
        let mut bytes = match source.length() {
            Some(len) => Vec::with_capacity(usize::try_from(len).unwrap_or(0)),
            None => Vec::new(),
        };
        source.read_to_end(&mut bytes)?;
        Ok(bytes)
    })();

    if let Some(pos) = pos {
        if let Err(e) = source.seek(SeekFrom::Start(pos)) {
            log::debug!(
                target: "decode",
                "could not restore {} position {pos}: {e}",
                source.source_type()
            );
        }
    }

    let bytes = result.map_err(WuffsError::Io)?;
    Ok(InputBuffer::whole(bytes.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn range_is_validated() {
        let data: Arc<[u8]> = Arc::from(&b"0123456789"[..]);
        assert!(ByteArraySource::with_range(data.clone(), 2, 8).is_ok());
        assert!(ByteArraySource::with_range(data.clone(), 2, 9).is_err());
        assert!(ByteArraySource::with_range(data.clone(), 11, 0).is_err());
        assert!(InputBuffer::new(data.clone(), 10, 0).is_ok());
        assert!(InputBuffer::new(data, 0, 11).is_err());
    }

    #[test]
    fn reads_only_the_window() {
        let mut src = ByteArraySource::with_range(b"xxABCDyy".to_vec(), 2, 4).unwrap();
        let mut out = Vec::new();
        src.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"ABCD");
        assert_eq!(src.read(&mut [0u8; 4]).unwrap(), 0);
        assert_eq!(src.as_array().unwrap().as_slice(), b"ABCD");
    }

    #[test]
    fn seek_bounds() {
        let mut src = ByteArraySource::new(b"abcdef".to_vec());
        assert_eq!(src.seek(SeekFrom::Start(6)).unwrap(), 6);
        assert!(src.seek(SeekFrom::Start(7)).is_err());
        assert!(src.seek(SeekFrom::Current(-7)).is_err());
        assert_eq!(src.seek(SeekFrom::End(-2)).unwrap(), 4);
        let mut b = [0u8; 2];
        src.read_exact(&mut b).unwrap();
        assert_eq!(&b, b"ef");
    }

    #[test]
    fn close_is_idempotent_and_blocks_io() {
        let mut src = ByteArraySource::new(b"abc".to_vec());
        src.close();
        src.close();
        assert!(src.is_closed());
        assert!(src.read(&mut [0u8; 1]).is_err());
        assert!(src.seek(SeekFrom::Start(0)).is_err());
    }

    #[test]
    fn array_view_shares_storage() {
        let data: Arc<[u8]> = Arc::from(&b"shared"[..]);
        let src = ByteArraySource::new(Arc::clone(&data));
        let view = src.as_array().unwrap();
        assert!(Arc::ptr_eq(view.data(), &data));
    }

    #[test]
    fn materialize_restores_position() {
        let mut src = StreamSource::new(Cursor::new(b"stream-bytes".to_vec()));
        src.seek(SeekFrom::Start(3)).unwrap();
        let buf = materialize(&mut src).unwrap();
        assert_eq!(buf.as_slice(), b"stream-bytes");
        assert_eq!(src.stream_position().unwrap(), 3);
        assert!(src.as_array().is_none());
    }

    /// Stream that can rewind to the start but refuses every other absolute seek.
    struct RewindOnly(Cursor<Vec<u8>>);

    impl Read for RewindOnly {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Seek for RewindOnly {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            match pos {
                SeekFrom::Start(0) | SeekFrom::Current(0) => self.0.seek(pos),
                _ => Err(io::Error::new(io::ErrorKind::Unsupported, "rewind only")),
            }
        }
    }

    impl ImageSource for RewindOnly {
        fn as_array(&self) -> Option<InputBuffer> {
            None
        }

        fn length(&self) -> Option<u64> {
            None
        }

        fn source_type(&self) -> &'static str {
            "RewindOnly"
        }
    }

    #[test]
    fn failed_position_restore_still_yields_bytes() {
        let mut cur = Cursor::new(b"abcdef".to_vec());
        cur.set_position(3);
        let mut src = RewindOnly(cur);

        let buf = materialize(&mut src).unwrap();
        assert_eq!(buf.as_slice(), b"abcdef");
        assert_eq!(src.0.position(), 6);
    }
}