use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
pub const JPEG_SIGNATURE: [u8; 3] = [0xFF, 0xD8, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }

    #[inline]
    pub fn signature(self) -> &'static [u8] {
        match self {
            ImageFormat::Png => &PNG_SIGNATURE,
            ImageFormat::Jpeg => &JPEG_SIGNATURE,
        }
    }

    #[inline]
    pub fn format_names(self) -> &'static [&'static str] {
        match self {
            ImageFormat::Png => &["png", "PNG"],
            ImageFormat::Jpeg => &["jpeg", "JPEG", "jpg", "JPG"],
        }
    }

    #[inline]
    pub fn suffixes(self) -> &'static [&'static str] {
        match self {
            ImageFormat::Png => &["png"],
            ImageFormat::Jpeg => &["jpg", "jpeg"],
        }
    }

    #[inline]
    pub fn mime_types(self) -> &'static [&'static str] {
        match self {
            ImageFormat::Png => &["image/png"],
            ImageFormat::Jpeg => &["image/jpeg"],
        }
    }

    /// Checked in this order by [`sniff`].
    pub const ALL: [ImageFormat; 2] = [ImageFormat::Png, ImageFormat::Jpeg];
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compares the next `signature.len()` bytes against `signature`.
///
/// The position is restored in every case; a short read is a non-match.
pub fn matches<S: Read + Seek + ?Sized>(source: &mut S, signature: &[u8]) -> io::Result<bool> {
    let pos = source.stream_position()?;

    let mut buf = vec![0u8; signature.len()];
    let read = source.read_exact(&mut buf);
    source.seek(SeekFrom::Start(pos))?;

    match read {
        Ok(()) => Ok(buf == signature),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

#[inline]
pub fn is_png<S: Read + Seek + ?Sized>(source: &mut S) -> io::Result<bool> {
    matches(source, &PNG_SIGNATURE)
}

#[inline]
pub fn is_jpeg<S: Read + Seek + ?Sized>(source: &mut S) -> io::Result<bool> {
    matches(source, &JPEG_SIGNATURE)
}

pub fn sniff<S: Read + Seek + ?Sized>(source: &mut S) -> io::Result<Option<ImageFormat>> {
    for format in ImageFormat::ALL {
        if matches(source, format.signature())? {
            return Ok(Some(format));
        }
    }
    Ok(None)
}

/// Prefix check over in-memory bytes.
#[inline]
pub fn sniff_bytes(bytes: &[u8]) -> Option<ImageFormat> {
    ImageFormat::ALL
        .into_iter()
        .find(|f| bytes.starts_with(f.signature()))
}
