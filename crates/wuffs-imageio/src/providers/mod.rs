use std::sync::Arc;

use crate::codec::{FrameCodec, NativeCodec};
use crate::error::WuffsResult;
use crate::io::ImageSource;
use crate::reader::WuffsImageReader;
use crate::registry::{ImageReader, ProviderInfo, ProviderRegistry, ReaderProvider, SourceProvider};
use crate::sniff::{self, ImageFormat};

pub mod bytes;
pub mod jpeg;
pub mod png;

pub use bytes::ByteArraySourceProvider;

pub const VENDOR: &str = "wuffs-imageio";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Link-time registration of this crate's reader providers.
pub struct ReaderProviderEntry {
    pub create: fn() -> Arc<dyn ReaderProvider>,
}

inventory::collect!(ReaderProviderEntry);

#[inline]
pub fn iter_reader_providers() -> impl Iterator<Item = Arc<dyn ReaderProvider>> {
    inventory::iter::<ReaderProviderEntry>
        .into_iter()
        .map(|e| (e.create)())
}

/// PNG or JPEG reader provider over a [`FrameCodec`].
pub struct WuffsReaderProvider {
    format: ImageFormat,
    info: ProviderInfo,
    codec: Arc<dyn FrameCodec>,
}

impl WuffsReaderProvider {
    #[inline]
    pub fn new(format: ImageFormat) -> Self {
        Self::with_codec(format, Arc::new(NativeCodec))
    }

    pub fn with_codec(format: ImageFormat, codec: Arc<dyn FrameCodec>) -> Self {
        let info = ProviderInfo::new(provider_id(format), VENDOR)
            .with_version(VERSION)
            .with_description(format!("Wuffs-based {} reader", format.name().to_uppercase()))
            .with_format_names(format.format_names())
            .with_suffixes(format.suffixes())
            .with_mime_types(format.mime_types());
        Self {
            format,
            info,
            codec,
        }
    }

    #[inline]
    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

impl ReaderProvider for WuffsReaderProvider {
    #[inline]
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    fn can_decode(&self, source: &mut dyn ImageSource) -> WuffsResult<bool> {
        Ok(sniff::matches(source, self.format.signature())?)
    }

    fn create_reader(&self) -> Box<dyn ImageReader> {
        Box::new(WuffsImageReader::with_codec(self.format, Arc::clone(&self.codec)))
    }
}

#[inline]
pub fn provider_id(format: ImageFormat) -> String {
    format!("{VENDOR}.{}", format.name())
}

/// True for providers shipped by this crate.
#[inline]
fn is_own(info: &ProviderInfo) -> bool {
    info.vendor == VENDOR
}

/// Registers the byte-array source provider and every discovered reader provider.
///
/// With `prefer`, our readers are ordered before any foreign reader declaring the same
/// format, and our source provider before any foreign one for the same input type.
/// Calling it again on the same registry only re-applies the ordering.
pub fn register_all(registry: &ProviderRegistry, prefer: bool) {
    let bytes: Arc<dyn SourceProvider> = Arc::new(ByteArraySourceProvider::new());
    registry.register_source(bytes);

    for provider in iter_reader_providers() {
        registry.register_reader(provider);
    }

    if prefer {
        prefer_own(registry);
    }
}

fn prefer_own(registry: &ProviderRegistry) {
    let readers = registry.reader_providers();
    let png_id = provider_id(ImageFormat::Png);
    let jpeg_id = provider_id(ImageFormat::Jpeg);

    for other in readers.iter().map(|p| p.info()).filter(|i| !is_own(i)) {
        if other.declares_format("png") && registry.set_reader_ordering(&png_id, &other.id) {
            log::debug!(target: "providers", "'{png_id}' ordered before '{}'", other.id);
        }
        if (other.declares_format("jpeg") || other.declares_format("jpg"))
            && registry.set_reader_ordering(&jpeg_id, &other.id)
        {
            log::debug!(target: "providers", "'{jpeg_id}' ordered before '{}'", other.id);
        }
    }

    let sources = registry.source_providers();
    let Some(ours) = sources.iter().find(|p| is_own(p.info())) else {
        return;
    };
    for other in sources.iter().filter(|p| !is_own(p.info())) {
        if other.input_type() == ours.input_type() {
            registry.set_source_ordering(&ours.info().id, &other.info().id);
        }
    }
}
