use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::handle_cache::HandleCache;
use crate::hash::{ObjectId, PartialObjectId, HASH_SIZE};
use crate::obj::{read_obj_header, ObjectHeader, ObjectKind};
use crate::pack::{Pack, PACK_EXT, PACK_IDX_EXT};
use crate::zlib::open_deflate;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// a fully materialized object body together with the id/kind it was
/// looked up by - the object store's output before [`crate::obj::Object::parse`]
/// turns the bytes into a typed record.
#[derive(Clone, Debug, PartialEq)]
pub struct RawObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub bytes: Vec<u8>,
}

/// combines the loose-object backend (spec 4.4) with however many packs
/// live under `objects/pack` (spec 4.3.5): loose is tried first since it
/// needs no index lookup, then each pack in turn. grounded in the
/// teacher's `BitObjDb`/`BitLooseObjDb`/`BitPackedObjDb` split, collapsed
/// into one struct since this crate has exactly these two backends and
/// neither is user-pluggable.
///
/// pack file handles are owned directly by their `Pack` for the session's
/// lifetime (spec 4.3.5's "cached for the life of the repository
/// session"), so the handle cache from 4.1 is applied here to the loose
/// backend instead, where every lookup opens a (likely) different path.
pub struct Odb {
    fs: Arc<dyn FileSystem>,
    objects_path: PathBuf,
    handles: HandleCache,
    packs: Mutex<SmallVec<[Pack; 1]>>,
    max_delta_depth: usize,
}

impl Odb {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        objects_path: impl Into<PathBuf>,
        handle_cache_capacity: usize,
        max_delta_depth: u32,
    ) -> Result<Self> {
        let objects_path = objects_path.into();
        let max_delta_depth = max_delta_depth as usize;
        let packs = Self::discover_packs(&*fs, &objects_path, max_delta_depth)?;
        Ok(Self {
            handles: HandleCache::new(Arc::clone(&fs), handle_cache_capacity),
            fs,
            objects_path,
            packs: Mutex::new(packs),
            max_delta_depth,
        })
    }

    fn discover_packs(fs: &dyn FileSystem, objects_path: &Path, max_delta_depth: usize) -> Result<SmallVec<[Pack; 1]>> {
        let pack_dir = objects_path.join("pack");
        if !fs.exists(&pack_dir) {
            return Ok(SmallVec::new());
        }

        let mut packs = SmallVec::new();
        for path in fs.list_dir(&pack_dir)? {
            if path.extension().and_then(|e| e.to_str()) != Some(PACK_EXT) {
                continue;
            }
            let idx_path = path.with_extension(PACK_IDX_EXT);
            if !fs.exists(&idx_path) {
                // an in-progress `index-pack`/`gc` can leave a `.pack`
                // without its `.idx` momentarily; skip rather than error
                continue;
            }
            let pack_reader = fs.open_read(&path)?;
            let idx_reader = fs.open_read(&idx_path)?;
            let pack = Pack::open(pack_reader, idx_reader, path, idx_path)?.with_max_delta_depth(max_delta_depth);
            packs.push(pack);
        }
        Ok(packs)
    }

    /// re-scans `objects/pack` for packs written since this `Odb` was
    /// opened. nothing in spec 4.3.5 calls for automatic invalidation
    /// mid-session; callers that know the on-disk set changed (e.g. after
    /// observing a ref update that implies a fetch happened) call this
    /// explicitly.
    pub fn refresh_packs(&self) -> Result<()> {
        *self.packs.lock() = Self::discover_packs(&*self.fs, &self.objects_path, self.max_delta_depth)?;
        Ok(())
    }

    fn loose_path(&self, oid: ObjectId) -> PathBuf {
        let hex = oid.to_hex();
        self.objects_path.join(&hex[..2]).join(&hex[2..])
    }

    /// header and fully materialized body for `oid`.
    pub fn read(&self, oid: ObjectId, cancel: &CancellationToken) -> Result<Option<RawObject>> {
        if let Some(raw) = self.read_loose(oid)? {
            return Ok(Some(raw));
        }
        for pack in self.packs.lock().iter_mut() {
            cancel.check()?;
            if let Some(resolved) = pack.resolve(oid, cancel)? {
                return Ok(Some(RawObject { id: oid, kind: resolved.kind, bytes: resolved.bytes }));
            }
        }
        Ok(None)
    }

    fn read_loose(&self, oid: ObjectId) -> Result<Option<RawObject>> {
        let path = self.loose_path(oid);
        if !self.fs.exists(&path) {
            return Ok(None);
        }
        let handle = self.handles.acquire(&path)?;
        let mut stream = open_deflate(BufReader::new(handle));
        let header = read_obj_header(&mut stream)?;
        let mut bytes = Vec::with_capacity(header.size as usize);
        stream.read_to_end(&mut bytes).map_err(|e| Error::io(&path, e))?;
        if bytes.len() as u64 != header.size {
            return Err(Error::malformed_object(
                oid,
                format!("declared size {} but read {} bytes", header.size, bytes.len()),
            ));
        }
        self.handles.release(path, stream.into_inner().into_inner());
        Ok(Some(RawObject { id: oid, kind: header.kind, bytes }))
    }

    /// the kind and uncompressed size of `oid` without reading its body
    /// where the backend allows it - a pack lookup never materializes a
    /// delta base fully just to report the final kind (see
    /// [`Pack::header`]); the loose backend still has to inflate the fixed
    /// `"<kind> <size>\0"` prefix, but nothing past it.
    pub fn read_header(&self, oid: ObjectId, cancel: &CancellationToken) -> Result<Option<ObjectHeader>> {
        let path = self.loose_path(oid);
        if self.fs.exists(&path) {
            let handle = self.handles.acquire(&path)?;
            let mut stream = open_deflate(BufReader::new(handle));
            let header = read_obj_header(&mut stream)?;
            self.handles.release(path, stream.into_inner().into_inner());
            return Ok(Some(header));
        }
        for pack in self.packs.lock().iter_mut() {
            cancel.check()?;
            if let Some((kind, size)) = pack.header(oid, cancel)? {
                return Ok(Some(ObjectHeader { kind, size }));
            }
        }
        Ok(None)
    }

    pub fn exists(&self, oid: ObjectId, cancel: &CancellationToken) -> Result<bool> {
        Ok(self.read_header(oid, cancel)?.is_some())
    }

    /// a read-only stream over a blob's bytes without fully materializing
    /// where the backend allows it (spec 4.3.4). a loose blob always
    /// streams directly out of its zlib inflater; a packed blob streams
    /// when undeltified and falls back to a materialized cursor otherwise
    /// (see [`Pack::open_blob_stream`]).
    pub fn open_blob_stream(&self, oid: ObjectId, cancel: &CancellationToken) -> Result<Option<Box<dyn Read + '_>>> {
        let path = self.loose_path(oid);
        if self.fs.exists(&path) {
            let handle = self.handles.acquire(&path)?;
            let mut stream = open_deflate(BufReader::new(handle));
            let header = read_obj_header(&mut stream)?;
            if header.kind != ObjectKind::Blob {
                return Err(Error::malformed_object(oid, format!("expected blob, found {}", header.kind)));
            }
            // the handle stays borrowed by the stream until the caller
            // drops it; it is not returned to the cache in this path.
            return Ok(Some(Box::new(stream)));
        }
        for pack in self.packs.lock().iter_mut() {
            cancel.check()?;
            if let Some(stream) = pack.open_blob_stream(oid, cancel)? {
                return Ok(Some(stream));
            }
        }
        Ok(None)
    }

    /// every oid across loose and packed storage whose hex form starts
    /// with `prefix`, used to disambiguate an abbreviated hash.
    pub fn prefix_matches(&self, prefix: PartialObjectId) -> Result<Vec<ObjectId>> {
        let mut out = self.loose_prefix_matches(prefix)?;
        for pack in self.packs.lock().iter_mut() {
            out.extend(pack.prefix_matches(prefix)?);
        }
        out.sort();
        out.dedup();
        Ok(out)
    }

    fn loose_prefix_matches(&self, prefix: PartialObjectId) -> Result<Vec<ObjectId>> {
        if !self.fs.exists(&self.objects_path) {
            return Ok(vec![]);
        }
        let padded = prefix.into_oid().to_hex();

        let mut out = vec![];
        for dir_path in self.fs.list_dir(&self.objects_path)? {
            let Some(dirname) = dir_path.file_name().and_then(|n| n.to_str()) else { continue };
            // skips `pack`, `info`, and anything else that isn't a
            // two-hex-digit fan-out directory
            if dirname.len() != 2 || !dirname.bytes().all(|b| b.is_ascii_hexdigit()) {
                continue;
            }
            if dirname.as_bytes()[0] != padded.as_bytes()[0] {
                continue;
            }
            if prefix.len() >= 2 && dirname.as_bytes()[1] != padded.as_bytes()[1] {
                continue;
            }

            for file_path in self.fs.list_dir(&dir_path)? {
                let Some(filename) = file_path.file_name().and_then(|n| n.to_str()) else { continue };
                if filename.len() != HASH_SIZE * 2 - 2 {
                    continue;
                }
                let Ok(oid) = format!("{dirname}{filename}").parse::<ObjectId>() else { continue };
                if prefix.matches(&oid) {
                    out.push(oid);
                }
            }
        }
        Ok(out)
    }

    /// closes every cached loose-object file handle; pack handles close
    /// when the `Pack`s themselves are dropped along with this `Odb`.
    pub fn dispose(&self) {
        self.handles.dispose();
    }
}

#[cfg(test)]
mod tests;
