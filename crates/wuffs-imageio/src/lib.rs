#![forbid(unsafe_op_in_unsafe_fn)]

//! PNG/JPEG decoding through the prebuilt `wuffs_imageio` native library.
//!
//! The crate locates, extracts and loads the platform binary once per process, calls it
//! through a fixed C ABI, and exposes the result as readers discoverable through a
//! [`ProviderRegistry`].

use std::io::{Seek, SeekFrom};
use std::sync::Arc;

pub mod codec;
pub mod config;
pub mod error;
pub mod image;
pub mod io;
pub mod metadata;
pub mod model;
pub mod native;
pub mod providers;
pub mod reader;
pub mod registry;
pub mod sniff;

pub use codec::{FrameCodec, NativeCodec};
pub use config::{ConfigLoader, ConfigOverrides, NativeConfig};
pub use error::{WuffsError, WuffsResult};
pub use image::{DecodedImage, PixelLayout, BAND_OFFSETS};
pub use io::{ByteArraySource, ImageSource, InputBuffer, StreamSource};
pub use metadata::BasicImageMetadata;
pub use model::{FrameResult, ProbeResult};
pub use native::{bridge, cleanup_extracted, NativeApi, NativeLibrary, NativeVariant, PlatformDescriptor};
pub use reader::{ReaderState, WuffsImageReader};
pub use registry::{ImageReader, ProviderInfo, ProviderRegistry, ReaderProvider, SourceProvider};
pub use sniff::ImageFormat;

/// Registers this crate's providers on `registry`; see [`providers::register_all`].
#[inline]
pub fn register(registry: &ProviderRegistry, prefer: bool) {
    providers::register_all(registry, prefer);
}

/// Registers on the global registry, preferring our readers.
#[inline]
pub fn register_default() {
    register(ProviderRegistry::global(), true);
}

/// Seekable zero-copy source over `bytes`.
#[inline]
pub fn create_source(bytes: impl Into<Arc<[u8]>>) -> ByteArraySource {
    ByteArraySource::new(bytes)
}

/// Decodes `bytes` with our PNG/JPEG reader when the signature matches, otherwise with
/// the first reader the global registry offers.
pub fn read(bytes: impl Into<Arc<[u8]>>) -> WuffsResult<DecodedImage> {
    read_with(bytes, ProviderRegistry::global())
}

/// [`read`] with an explicit fallback registry.
pub fn read_with(
    bytes: impl Into<Arc<[u8]>>,
    fallback: &ProviderRegistry,
) -> WuffsResult<DecodedImage> {
    let bytes: Arc<[u8]> = bytes.into();
    if bytes.is_empty() {
        return Err(WuffsError::invalid_input("bytes is empty"));
    }

    let mut source = create_source(bytes);

    if let Some(format) = sniff::sniff(&mut source)? {
        let mut reader = WuffsImageReader::new(format);
        return decode_with(&mut reader, source);
    }

    source.seek(SeekFrom::Start(0))?;
    let Some(provider) = fallback.readers_for(&mut source)?.into_iter().next() else {
        return Err(WuffsError::UnsupportedFormat);
    };
    log::debug!(
        target: "providers",
        "no native signature match, falling back to '{}'",
        provider.info().id
    );

    let mut reader = provider.create_reader();
    decode_with(reader.as_mut(), source)
}

fn decode_with(reader: &mut dyn ImageReader, source: ByteArraySource) -> WuffsResult<DecodedImage> {
    reader.set_input(Box::new(source));
    let result = reader.read(0);
    reader.dispose();
    result
}
