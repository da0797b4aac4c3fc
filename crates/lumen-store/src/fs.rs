//! Filesystem collaborator.
//!
//! The store addresses files by absolute-looking path strings such as
//! `/presets.json`, the way the controller's flash filesystem does. Any call
//! may fail with an I/O error, and writes are not assumed to be atomic.
//!
//! - [`StdFs`] maps those paths into a host directory.
//! - [`MemoryFs`] keeps files in memory and can inject failures; clones share
//!   the same files, so a test can keep a handle after giving one to a store.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

/// Byte-addressed file access.
pub trait FileSystem {
    /// Returns true if `path` exists.
    fn exists(&self, path: &str) -> bool;

    /// Append the contents of `path` to `buf`.
    fn read(&self, path: &str, buf: &mut Vec<u8>) -> io::Result<()>;

    /// Replace the contents of `path` with `data`.
    fn write(&self, path: &str, data: &[u8]) -> io::Result<()>;

    /// Remove `path`.
    fn remove(&self, path: &str) -> io::Result<()>;
}

/// Files stored under a directory of the host filesystem.
#[derive(Debug, Clone)]
pub struct StdFs {
    root: PathBuf,
}

impl StdFs {
    /// Serve files from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory files are stored in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path for a store path.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl FileSystem for StdFs {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn read(&self, path: &str, buf: &mut Vec<u8>) -> io::Result<()> {
        use std::io::Read;
        std::fs::File::open(self.resolve(path))?.read_to_end(buf)?;
        Ok(())
    }

    fn write(&self, path: &str, data: &[u8]) -> io::Result<()> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(target, data)
    }

    fn remove(&self, path: &str) -> io::Result<()> {
        std::fs::remove_file(self.resolve(path))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, Vec<u8>>,
    writes: BTreeMap<String, usize>,
    fail_reads: bool,
    fail_writes: bool,
}

/// In-memory filesystem with failure injection.
///
/// # Example
///
/// ```rust
/// use lumen_store::{FileSystem, MemoryFs};
///
/// let fs = MemoryFs::new();
/// let handle = fs.clone();
///
/// fs.write("/presets.json", b"{\"0\":{}}").unwrap();
/// assert!(handle.exists("/presets.json"));
/// assert_eq!(handle.write_count("/presets.json"), 1);
///
/// handle.fail_writes(true);
/// assert!(fs.write("/presets.json", b"{}").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryFs {
    /// Creates an empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent read fail.
    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    /// Make every subsequent write and remove fail.
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Number of successful writes to `path`.
    pub fn write_count(&self, path: &str) -> usize {
        self.state.lock().writes.get(path).copied().unwrap_or(0)
    }

    /// Copy of the contents of `path`.
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(path).cloned()
    }

    /// Paths of all stored files.
    pub fn paths(&self) -> Vec<String> {
        self.state.lock().files.keys().cloned().collect()
    }

    /// Store `data` at `path` directly, bypassing failure injection and write counts.
    pub fn insert(&self, path: &str, data: impl Into<Vec<u8>>) {
        self.state.lock().files.insert(path.to_string(), data.into());
    }
}

fn injected(what: &str) -> io::Error {
    io::Error::other(format!("injected {what} failure"))
}

impl FileSystem for MemoryFs {
    fn exists(&self, path: &str) -> bool {
        self.state.lock().files.contains_key(path)
    }

    fn read(&self, path: &str, buf: &mut Vec<u8>) -> io::Result<()> {
        let state = self.state.lock();
        if state.fail_reads {
            return Err(injected("read"));
        }
        let data = state
            .files
            .get(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))?;
        buf.extend_from_slice(data);
        Ok(())
    }

    fn write(&self, path: &str, data: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(injected("write"));
        }
        state.files.insert(path.to_string(), data.to_vec());
        *state.writes.entry(path.to_string()).or_default() += 1;
        Ok(())
    }

    fn remove(&self, path: &str) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(injected("remove"));
        }
        state
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_std_fs_roundtrip() {
        let dir = TempDir::new().unwrap();
        let fs = StdFs::new(dir.path());
        assert!(!fs.exists("/presets.json"));

        fs.write("/presets.json", b"{\"0\":{}}").unwrap();
        assert!(fs.exists("/presets.json"));
        assert!(dir.path().join("presets.json").is_file());

        let mut buf = b"prefix".to_vec();
        fs.read("/presets.json", &mut buf).unwrap();
        assert_eq!(buf, b"prefix{\"0\":{}}");

        fs.remove("/presets.json").unwrap();
        assert!(!fs.exists("/presets.json"));
    }

    #[test]
    fn test_std_fs_creates_missing_root() {
        let dir = TempDir::new().unwrap();
        let fs = StdFs::new(dir.path().join("nested").join("data"));
        fs.write("/tmp.json", b"{}").unwrap();
        assert!(fs.exists("/tmp.json"));
    }

    #[test]
    fn test_std_fs_read_missing_fails() {
        let dir = TempDir::new().unwrap();
        let fs = StdFs::new(dir.path());
        let mut buf = Vec::new();
        let err = fs.read("/missing.json", &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_memory_fs_failure_injection() {
        let fs = MemoryFs::new();
        fs.write("/a", b"1").unwrap();
        fs.fail_reads(true);
        assert!(fs.read("/a", &mut Vec::new()).is_err());
        fs.fail_reads(false);
        fs.fail_writes(true);
        assert!(fs.write("/a", b"2").is_err());
        assert!(fs.remove("/a").is_err());
        assert_eq!(fs.contents("/a"), Some(b"1".to_vec()));
        assert_eq!(fs.write_count("/a"), 1);
    }

    #[test]
    fn test_memory_fs_insert_bypasses_counts() {
        let fs = MemoryFs::new();
        fs.insert("/a", "x");
        assert_eq!(fs.write_count("/a"), 0);
        assert_eq!(fs.paths(), vec!["/a".to_string()]);
    }
}
