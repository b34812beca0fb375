use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::{WuffsError, WuffsResult};
use crate::io::{ByteArraySource, ImageSource};
use crate::providers::{VENDOR, VERSION};
use crate::registry::{ProviderInfo, SourceProvider};

/// Builds zero-copy [`ByteArraySource`]s from `Arc<[u8]>` inputs.
pub struct ByteArraySourceProvider {
    info: ProviderInfo,
}

impl ByteArraySourceProvider {
    pub fn new() -> Self {
        Self {
            info: ProviderInfo::new(format!("{VENDOR}.bytes"), VENDOR)
                .with_version(VERSION)
                .with_description("byte array source (no copy)"),
        }
    }
}

impl Default for ByteArraySourceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceProvider for ByteArraySourceProvider {
    #[inline]
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    #[inline]
    fn input_type(&self) -> TypeId {
        TypeId::of::<Arc<[u8]>>()
    }

    #[inline]
    fn input_type_name(&self) -> &'static str {
        "Arc<[u8]>"
    }

    fn create_source(&self, input: &dyn Any) -> WuffsResult<Box<dyn ImageSource>> {
        let bytes = input
            .downcast_ref::<Arc<[u8]>>()
            .ok_or(WuffsError::UnexpectedSourceType {
                expected: "Arc<[u8]>",
                found: format!("{:?}", input.type_id()),
            })?;
        Ok(Box::new(ByteArraySource::new(Arc::clone(bytes))))
    }
}
