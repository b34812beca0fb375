use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced anywhere between the native loader and the reader.
///
/// Loader/ABI failures (`UnsupportedPlatform`, `MissingNativeResource`, `Extraction`,
/// `LibraryLoad`, `SymbolResolution`) abort initialization and are never retried internally.
/// `NativeDecode` is a per-call failure and is surfaced as-is.
#[derive(Debug, Error)]
pub enum WuffsError {
    #[error("unsupported platform for wuffs-imageio: {platform}")]
    UnsupportedPlatform { platform: String },

    #[error("missing native library resource: {resource}")]
    MissingNativeResource { resource: String },

    #[error("failed to extract native library '{resource}': {source}")]
    Extraction {
        resource: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to load native library '{}': {source}", path.display())]
    LibraryLoad {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("native symbol '{symbol}' could not be resolved: {message}")]
    SymbolResolution {
        symbol: &'static str,
        message: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{operation} failed: {message} ({code})")]
    NativeDecode {
        operation: &'static str,
        code: i32,
        message: String,
    },

    #[error("unexpected source type: expected {expected}, got {found}")]
    UnexpectedSourceType {
        expected: &'static str,
        found: String,
    },

    #[error("reader has no input set")]
    InputNotSet,

    #[error("image index {index} out of bounds (only index 0 is supported)")]
    ImageIndexOutOfBounds { index: usize },

    #[error("pixel buffer size overflows for {width}x{height}")]
    DimensionOverflow { width: i32, height: i32 },

    #[error(
        "decoded frame {width}x{height} ({written} bytes) does not match probe \
         {expected_width}x{expected_height} ({expected_len} bytes)"
    )]
    IncompleteFrame {
        width: i32,
        height: i32,
        written: i32,
        expected_width: i32,
        expected_height: i32,
        expected_len: usize,
    },

    #[error("no registered reader can decode this input")]
    UnsupportedFormat,

    #[error("metadata is read-only")]
    ReadOnlyMetadata,

    #[error("unsupported metadata format: {0}")]
    UnsupportedMetadataFormat(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl WuffsError {
    #[inline]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// True for failures that indicate a packaging, platform or ABI defect.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WuffsError::UnsupportedPlatform { .. }
                | WuffsError::MissingNativeResource { .. }
                | WuffsError::Extraction { .. }
                | WuffsError::LibraryLoad { .. }
                | WuffsError::SymbolResolution { .. }
                | WuffsError::DimensionOverflow { .. }
        )
    }

    /// Native status code, when the error came from a native call.
    #[inline]
    pub fn native_code(&self) -> Option<i32> {
        match self {
            WuffsError::NativeDecode { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type WuffsResult<T> = Result<T, WuffsError>;
