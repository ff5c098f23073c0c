//! Content keys: the cache identity of one physical snapshot of image bytes.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;

/// Tags for in-memory images come from this counter, so two in-memory
/// snapshots never share a key even when their bytes are identical.
static NEXT_MEMORY_TAG: AtomicU64 = AtomicU64::new(1);

/// Identifies one byte-for-byte snapshot of a reference's content.
///
/// A key is a canonical path plus a snapshot tag (for files, the
/// modification time in nanoseconds). Distinct keys never alias, even if
/// their bytes happen to be identical.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey {
    path: PathBuf,
    tag: u64,
}

impl ContentKey {
    /// Creates a key from an already-canonical path and a caller-supplied tag.
    pub fn new(path: impl Into<PathBuf>, tag: u64) -> Self {
        Self {
            path: path.into(),
            tag,
        }
    }

    /// Builds the key for a file on disk from its canonical path and mtime.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let canonical = path.canonicalize()?;
        let modified = std::fs::metadata(&canonical)?.modified()?;
        let tag = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Ok(Self::new(canonical, tag))
    }

    /// Allocates a fresh key for an in-memory image.
    pub fn in_memory(display: &str) -> Self {
        let tag = NEXT_MEMORY_TAG.fetch_add(1, Ordering::Relaxed);
        Self::new(PathBuf::from(format!("<memory>/{display}")), tag)
    }

    /// The canonical path (or synthetic path for in-memory images).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The snapshot tag.
    pub fn tag(&self) -> u64 {
        self.tag
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path.display(), self.tag)
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lib.rgmd");
        std::fs::write(&file, b"bytes").unwrap();
        let a = ContentKey::from_path(&file).unwrap();
        let b = ContentKey::from_path(&file).unwrap();
        assert_eq!(a, b);
        assert!(a.path().is_absolute());
    }

    #[test]
    fn relative_and_absolute_paths_agree() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lib.rgmd");
        std::fs::write(&file, b"bytes").unwrap();
        let dotted = dir.path().join(".").join("lib.rgmd");
        assert_eq!(
            ContentKey::from_path(&file).unwrap(),
            ContentKey::from_path(&dotted).unwrap()
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContentKey::from_path(&dir.path().join("absent.rgmd")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn in_memory_keys_never_alias() {
        let a = ContentKey::in_memory("lib");
        let b = ContentKey::in_memory("lib");
        assert_ne!(a, b);
        assert_eq!(a.path(), b.path());
    }

    #[test]
    fn tag_distinguishes_snapshots() {
        let a = ContentKey::new("/x/lib.rgmd", 1);
        let b = ContentKey::new("/x/lib.rgmd", 2);
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "/x/lib.rgmd@1");
    }
}
