use crate::error::Result;
use crate::fs::{FileSystem, ReadSeek};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

/// an open file handle parked in the cache, seeked back to the start
/// before being reinserted so the next caller always gets a fresh read
/// position.
struct Entry {
    path: PathBuf,
    handle: Box<dyn ReadSeek>,
}

/// LRU cache of open file handles keyed by absolute path.
///
/// capacity defaults to the host's available parallelism (at least 4, per
/// spec). releasing a handle reinserts it at the front of the queue seeked
/// to the start rather than closing it; once the cache is at capacity the
/// least-recently-used handle is closed to make room. `dispose` closes
/// everything, used when a repository instance is dropped.
///
/// grounded in the single-mutex, capacity-agnostic shape of the teacher's
/// `BitObjCache`, generalized here to be capacity-bounded and keyed by
/// path rather than object id.
pub struct HandleCache {
    fs: Arc<dyn FileSystem>,
    capacity: usize,
    entries: Mutex<VecDeque<Entry>>,
}

impl HandleCache {
    pub fn new(fs: Arc<dyn FileSystem>, capacity: usize) -> Self {
        let capacity = capacity.max(4);
        Self { fs, capacity, entries: Mutex::new(VecDeque::with_capacity(capacity)) }
    }

    pub fn default_capacity() -> usize {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4).max(4)
    }

    /// acquire a handle for `path`, reusing a cached one seeked to 0 if
    /// present, otherwise opening a fresh one and evicting the
    /// least-recently-used entry if the cache is already full.
    pub fn acquire(&self, path: &std::path::Path) -> Result<Box<dyn ReadSeek>> {
        let mut entries = self.entries.lock();
        if let Some(pos) = entries.iter().position(|e| e.path == path) {
            let entry = entries.remove(pos).unwrap();
            return Ok(entry.handle);
        }
        drop(entries);
        self.fs.open_read(path)
    }

    /// return a handle to the cache, seeked back to the start. evicts the
    /// oldest entry if this would exceed capacity.
    pub fn release(&self, path: PathBuf, mut handle: Box<dyn ReadSeek>) {
        use std::io::Seek;
        if handle.seek(std::io::SeekFrom::Start(0)).is_err() {
            return;
        }
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_back();
        }
        entries.push_front(Entry { path, handle });
    }

    /// close every cached handle, used on repository close
    pub fn dispose(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFileSystem;

    #[test]
    fn caches_and_evicts_by_capacity() {
        let fs = Arc::new(InMemoryFileSystem::new());
        fs.insert("/a", b"a".to_vec());
        fs.insert("/b", b"b".to_vec());
        fs.insert("/c", b"c".to_vec());
        let cache = HandleCache::new(fs, 2);

        let a = cache.acquire(std::path::Path::new("/a")).unwrap();
        cache.release("/a".into(), a);
        let b = cache.acquire(std::path::Path::new("/b")).unwrap();
        cache.release("/b".into(), b);
        assert_eq!(cache.len(), 2);

        let c = cache.acquire(std::path::Path::new("/c")).unwrap();
        cache.release("/c".into(), c);
        // capacity 2: oldest ("/a") evicted
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn dispose_closes_all() {
        let fs = Arc::new(InMemoryFileSystem::new());
        fs.insert("/a", b"a".to_vec());
        let cache = HandleCache::new(fs, 4);
        let a = cache.acquire(std::path::Path::new("/a")).unwrap();
        cache.release("/a".into(), a);
        cache.dispose();
        assert_eq!(cache.len(), 0);
    }
}
