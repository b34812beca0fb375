use std::sync::Arc;

use crate::providers::{ReaderProviderEntry, WuffsReaderProvider};
use crate::registry::ReaderProvider;
use crate::sniff::ImageFormat;

#[inline]
pub fn provider() -> WuffsReaderProvider {
    WuffsReaderProvider::new(ImageFormat::Jpeg)
}

fn create() -> Arc<dyn ReaderProvider> {
    Arc::new(provider())
}

inventory::submit! {
    ReaderProviderEntry { create }
}
