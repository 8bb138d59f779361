use crate::error::{Error, Result};
use std::fs::Metadata;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// platform-neutral, testable access to the handful of filesystem
/// operations the object-store layer needs. the crate never writes
/// through this trait - it is a read surface only, per the read-only
/// scope of the whole crate.
pub trait FileSystem: Send + Sync {
    fn open_read(&self, path: &Path) -> Result<Box<dyn ReadSeek>>;
    fn exists(&self, path: &Path) -> bool;
    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
    fn metadata(&self, path: &Path) -> Result<Metadata>;
}

pub trait ReadSeek: Read + std::io::Seek + Send {}
impl<T: Read + std::io::Seek + Send> ReadSeek for T {}

/// the default [`FileSystem`] implementation, backed directly by
/// `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn open_read(&self, path: &Path) -> Result<Box<dyn ReadSeek>> {
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        Ok(Box::new(file))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = vec![];
        let dir = std::fs::read_dir(path).map_err(|e| Error::io(path, e))?;
        for entry in dir {
            let entry = entry.map_err(|e| Error::io(path, e))?;
            entries.push(entry.path());
        }
        Ok(entries)
    }

    fn metadata(&self, path: &Path) -> Result<Metadata> {
        std::fs::symlink_metadata(path).map_err(|e| Error::io(path, e))
    }
}

/// in-memory [`FileSystem`] used to build synthetic `.git` directories in
/// tests without touching disk.
#[derive(Default)]
pub struct InMemoryFileSystem {
    files: Mutex<std::collections::HashMap<PathBuf, Vec<u8>>>,
}

impl InMemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files.lock().unwrap().insert(path.into(), bytes.into());
    }
}

impl FileSystem for InMemoryFileSystem {
    fn open_read(&self, path: &Path) -> Result<Box<dyn ReadSeek>> {
        let files = self.files.lock().unwrap();
        let bytes = files
            .get(path)
            .ok_or_else(|| Error::io(path, std::io::Error::from(std::io::ErrorKind::NotFound)))?;
        Ok(Box::new(std::io::Cursor::new(bytes.clone())))
    }

    // there is no explicit directory entry backing a fan-out dir like
    // `objects/ab` or `objects/pack` - only leaf file paths are stored - so
    // a path "exists" here either as a literal file or as an ancestor of
    // one, matching how a real filesystem would answer for a directory
    // that has never been `mkdir`'d but has files under it.
    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().keys().any(|k| k.starts_with(path))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files.lock().unwrap();
        let mut out = std::collections::BTreeSet::new();
        for key in files.keys() {
            if let Ok(rel) = key.strip_prefix(path) {
                if let Some(first) = rel.components().next() {
                    out.insert(path.join(first));
                }
            }
        }
        Ok(out.into_iter().collect())
    }

    fn metadata(&self, path: &Path) -> Result<Metadata> {
        // no in-memory metadata surface exists in std; tests that need
        // mtime/size based status comparisons use `StdFileSystem` against
        // a real `tempfile` directory instead.
        let _ = path;
        Err(Error::io(path, std::io::Error::from(std::io::ErrorKind::Unsupported)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_roundtrips_bytes() {
        let fs = InMemoryFileSystem::new();
        fs.insert("/repo/.git/HEAD", b"ref: refs/heads/master\n".to_vec());
        assert!(fs.exists(Path::new("/repo/.git/HEAD")));
        let mut buf = String::new();
        fs.open_read(Path::new("/repo/.git/HEAD")).unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "ref: refs/heads/master\n");
    }
}
