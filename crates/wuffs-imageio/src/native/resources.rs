use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{WuffsError, WuffsResult};

include!(concat!(env!("OUT_DIR"), "/embedded_natives.rs"));

/// A source of packaged native binaries addressed by resource key
/// (`natives/<platform_id>/<file>`).
pub trait NativeResources: Send + Sync {
    fn describe(&self) -> String;

    /// Opens a resource for reading; `Ok(None)` when this source does not carry it.
    fn open(&self, key: &str) -> io::Result<Option<Box<dyn Read + '_>>>;

    #[inline]
    fn contains(&self, key: &str) -> bool {
        matches!(self.open(key), Ok(Some(_)))
    }
}

/// Natives compiled into the crate by `build.rs`.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedResources {
    entries: &'static [(&'static str, &'static [u8])],
}

impl EmbeddedResources {
    #[inline]
    pub fn bundled() -> Self {
        Self {
            entries: EMBEDDED_NATIVES,
        }
    }

    #[inline]
    pub fn from_static(entries: &'static [(&'static str, &'static [u8])]) -> Self {
        Self { entries }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl NativeResources for EmbeddedResources {
    fn describe(&self) -> String {
        format!("embedded({} entries)", self.entries.len())
    }

    fn open(&self, key: &str) -> io::Result<Option<Box<dyn Read + '_>>> {
        Ok(self
            .entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, bytes)| Box::new(Cursor::new(*bytes)) as Box<dyn Read + '_>))
    }
}

/// Natives laid out on disk as `<root>/<platform_id>/<file>`.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    #[inline]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> Option<PathBuf> {
        let rel = key.strip_prefix("natives/")?;
        if rel.split('/').any(|c| c.is_empty() || c == "..") {
            return None;
        }
        Some(rel.split('/').fold(self.root.clone(), |p, c| p.join(c)))
    }
}

impl NativeResources for DirectoryResources {
    fn describe(&self) -> String {
        format!("dir({})", self.root.display())
    }

    fn open(&self, key: &str) -> io::Result<Option<Box<dyn Read + '_>>> {
        let Some(path) = self.path_of(key) else {
            return Ok(None);
        };
        match File::open(&path) {
            Ok(f) => Ok(Some(Box::new(f))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Ordered lookup across several sources; first hit wins.
#[derive(Default)]
pub struct ResourceChain {
    sources: Vec<Box<dyn NativeResources>>,
}

impl ResourceChain {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with(mut self, source: impl NativeResources + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    #[inline]
    pub fn push(&mut self, source: Box<dyn NativeResources>) {
        self.sources.push(source);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Default chain: embedded natives, then the configured natives directory.
    pub fn from_config(natives_dir: Option<&Path>) -> Self {
        let mut chain = Self::new();
        let embedded = EmbeddedResources::bundled();
        if !embedded.is_empty() {
            chain.push(Box::new(embedded));
        }
        if let Some(dir) = natives_dir {
            chain.push(Box::new(DirectoryResources::new(dir)));
        }
        chain
    }
}

impl NativeResources for ResourceChain {
    fn describe(&self) -> String {
        let parts: Vec<String> = self.sources.iter().map(|s| s.describe()).collect();
        format!("[{}]", parts.join(", "))
    }

    fn open(&self, key: &str) -> io::Result<Option<Box<dyn Read + '_>>> {
        for s in &self.sources {
            if let Some(r) = s.open(key)? {
                return Ok(Some(r));
            }
        }
        Ok(None)
    }
}

// =================================================================================================
// Extraction
// =================================================================================================

static EXTRACTED: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

/// Copies `key` byte-for-byte into a fresh temp directory and returns the file path.
///
/// The file and its directory are registered for [`cleanup_extracted`].
pub fn extract_to_temp(
    resources: &dyn NativeResources,
    key: &str,
    temp_prefix: &str,
) -> WuffsResult<PathBuf> {
    let mut reader = resources
        .open(key)
        .map_err(|source| WuffsError::Extraction {
            resource: key.to_owned(),
            source,
        })?
        .ok_or_else(|| WuffsError::MissingNativeResource {
            resource: key.to_owned(),
        })?;

    let file_name = key.rsplit('/').next().unwrap_or(key);

    let dir = create_temp_dir(temp_prefix).map_err(|source| WuffsError::Extraction {
        resource: key.to_owned(),
        source,
    })?;
    schedule_cleanup(dir.clone());

    let out = dir.join(file_name);
    let copied = File::create(&out)
        .and_then(|mut f| io::copy(&mut reader, &mut f))
        .map_err(|source| WuffsError::Extraction {
            resource: key.to_owned(),
            source,
        })?;
    schedule_cleanup(out.clone());

    log::debug!(
        target: "natives",
        "extracted '{}' -> '{}' ({} bytes)",
        key,
        out.display(),
        copied
    );

    Ok(out)
}

/// A fresh directory under the system temp dir that outlives the guard; removal is left to
/// [`cleanup_extracted`].
fn create_temp_dir(prefix: &str) -> io::Result<PathBuf> {
    Ok(tempfile::Builder::new().prefix(prefix).tempdir()?.keep())
}

#[inline]
fn schedule_cleanup(path: PathBuf) {
    EXTRACTED.lock().push(path);
}

/// Removes every extracted native file and directory, newest first. Best-effort.
///
/// Hosts call this at shutdown; a library still mapped on Windows stays behind.
pub fn cleanup_extracted() -> usize {
    let paths: Vec<PathBuf> = std::mem::take(&mut *EXTRACTED.lock());
    let mut removed = 0;
    for p in paths.iter().rev() {
        let r = if p.is_dir() {
            fs::remove_dir(p)
        } else {
            fs::remove_file(p)
        };
        match r {
            Ok(()) => removed += 1,
            Err(e) => {
                log::debug!(target: "natives", "cleanup skipped '{}': {e}", p.display());
            }
        }
    }
    removed
}
