use crate::cancel::CancellationToken;
use crate::delta::Delta;
use crate::error::{Error, Result};
use crate::fs::ReadSeek;
use crate::hash::{ObjectId, PartialObjectId, HASH_SIZE};
use crate::io::{BufReadExtSized, ReadExt};
use crate::obj::ObjectKind;
use crate::serialize::{Deserialize, DeserializeSized};
use crate::zlib::open_deflate;
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_EXT: &str = "pack";
pub const PACK_IDX_EXT: &str = "idx";
const PACK_IDX_MAGIC: u32 = 0xff744f63;
const FANOUT_ENTRYC: usize = 256;
const FANOUT_ENTRY_SIZE: u64 = 4;
const FANOUT_SIZE: u64 = FANOUT_ENTRYC as u64 * FANOUT_ENTRY_SIZE;
const PACK_IDX_HEADER_SIZE: u64 = 8;
const CRC_SIZE: u64 = 4;
const OFFSET_SIZE: u64 = 4;
const EXT_OFFSET_SIZE: u64 = 8;
/// high bit of a v2 offset-table entry marks "look this index up in the
/// 64-bit extension layer instead" (spec 4.3.1 step 3)
const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;
const MAX_OFFSET: u32 = 0x7fff_ffff;

/// bound on ofs-delta/ref-delta chain length (spec 4.3.3). a pack produced
/// by `git repack` rarely nests more than a dozen deep; this only guards
/// against a corrupt or adversarial pack looping or recursing forever.
pub const DEFAULT_MAX_DELTA_DEPTH: usize = 50;

/// a pack entry's type tag (spec 4.3.2). `OfsDelta`/`RefDelta` never escape
/// this module - [`Pack::resolve`] always returns the chain's innermost
/// non-delta [`ObjectKind`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
enum EntryKind {
    Commit = 1,
    Tree = 2,
    Blob = 3,
    Tag = 4,
    OfsDelta = 6,
    RefDelta = 7,
}

impl EntryKind {
    fn try_from_u8(n: u8) -> Result<Self> {
        Ok(match n {
            1 => Self::Commit,
            2 => Self::Tree,
            3 => Self::Blob,
            4 => Self::Tag,
            6 => Self::OfsDelta,
            7 => Self::RefDelta,
            _ => return Err(Error::corrupt_pack("<pack>", 0, format!("invalid pack entry type tag `{n}`"))),
        })
    }

    fn into_obj_kind(self) -> Option<ObjectKind> {
        match self {
            Self::Commit => Some(ObjectKind::Commit),
            Self::Tree => Some(ObjectKind::Tree),
            Self::Blob => Some(ObjectKind::Blob),
            Self::Tag => Some(ObjectKind::Tag),
            Self::OfsDelta | Self::RefDelta => None,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
struct EntryHeader {
    kind: EntryKind,
    /// uncompressed size of the entry's payload (for deltas, the size of
    /// the delta script, not the expanded target)
    size: u64,
}

/// the bytes of a single pack entry after zlib inflation, before any delta
/// expansion.
enum RawEntry {
    Base(ObjectKind, Vec<u8>),
    /// base is `entry_offset - relative_offset` bytes into the same pack
    OfsDelta(u64, Vec<u8>),
    RefDelta(ObjectId, Vec<u8>),
}

/// streaming reader over a `.pack` file's entries, seekable to any entry by
/// byte offset (offsets come from a [`PackIndexReader`]).
struct PackfileReader<R> {
    reader: BufReader<R>,
    path: PathBuf,
    object_count: u32,
}

impl<R: Read> PackfileReader<R> {
    fn new(reader: R, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut reader = BufReader::new(reader);
        let object_count = Self::parse_header(&mut reader, &path)?;
        Ok(Self { reader, path, object_count })
    }

    fn parse_header(reader: &mut impl BufRead, path: &Path) -> Result<u32> {
        let io = |e: std::io::Error| Error::io(path, e);
        let sig = reader.read_array::<u8, 4>()?;
        if &sig != PACK_SIGNATURE {
            return Err(Error::corrupt_pack(path, 0, "invalid packfile signature"));
        }
        let version = reader.read_u32().map_err(io)?;
        if version != 2 {
            return Err(Error::corrupt_pack(path, 4, format!("unsupported packfile version `{version}`")));
        }
        reader.read_u32().map_err(io)
    }

    /// entry header: high bit of each byte is a continuation flag, low 3
    /// bits of the *first* byte are the entry kind, the remaining 4 bits of
    /// the first byte plus 7 bits of each continuation byte assemble a
    /// little-endian base-128 size (spec 4.3.2).
    fn read_entry_header(&mut self) -> Result<EntryHeader> {
        let (ty, size) =
            self.reader.read_le_varint_with_shift(3).map_err(|e| Error::io(&self.path, e))?;
        let kind = EntryKind::try_from_u8(ty)?;
        Ok(EntryHeader { kind, size })
    }

    /// inflate exactly `size` bytes of uncompressed payload from the
    /// current position.
    fn inflate(&mut self, size: u64) -> Result<Vec<u8>> {
        let mut stream = open_deflate(&mut self.reader);
        let mut out = Vec::with_capacity(size as usize);
        stream.read_to_end(&mut out).map_err(|e| Error::io(&self.path, e))?;
        if out.len() as u64 != size {
            return Err(Error::corrupt_pack(
                &self.path,
                0,
                format!("entry declared size {size} but inflated to {} bytes", out.len()),
            ));
        }
        Ok(out)
    }

    fn read_raw_entry(&mut self, entry_offset: u64) -> Result<RawEntry> {
        let header = self.read_entry_header()?;
        Ok(match header.kind {
            EntryKind::OfsDelta => {
                let rel = self.reader.read_offset().map_err(|e| Error::io(&self.path, e))?;
                let base_offset = entry_offset.checked_sub(rel).ok_or_else(|| {
                    Error::corrupt_pack(&self.path, entry_offset, "ofs-delta base offset underflows pack start")
                })?;
                RawEntry::OfsDelta(base_offset, self.inflate(header.size)?)
            }
            EntryKind::RefDelta => {
                let base_oid = self.reader.read_oid().map_err(|e| Error::io(&self.path, e))?;
                RawEntry::RefDelta(base_oid, self.inflate(header.size)?)
            }
            base => {
                let kind = base.into_obj_kind().expect("non-delta entry kinds always map to an object kind");
                RawEntry::Base(kind, self.inflate(header.size)?)
            }
        })
    }
}

impl<R: Read + Seek> PackfileReader<R> {
    fn read_header_at(&mut self, offset: u64) -> Result<EntryHeader> {
        self.reader.seek(SeekFrom::Start(offset)).map_err(|e| Error::io(&self.path, e))?;
        self.read_entry_header()
    }

    fn read_raw_entry_at(&mut self, offset: u64) -> Result<RawEntry> {
        self.reader.seek(SeekFrom::Start(offset)).map_err(|e| Error::io(&self.path, e))?;
        self.read_raw_entry(offset)
    }
}

/// which on-disk table of a v2 pack index a given lookup targets; mirrors
/// the four-layer structure directly (fan-out precedes all of these and is
/// held in memory instead of re-read per lookup).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Layer {
    Oid,
    Crc,
    Ofs,
    Ext,
}

/// seekable reader over a `.idx` (version 2) file: fan-out table kept
/// resident, everything else read on demand and cached per fan-out bucket.
/// grounded in the teacher's `PackIndexReader`, with the oid-bucket cache
/// rewritten against a plain `HashMap` (the teacher used the nightly
/// `hash_raw_entry` API, unavailable on stable).
struct PackIndexReader<R> {
    reader: BufReader<R>,
    path: PathBuf,
    fanout: [u32; FANOUT_ENTRYC],
    /// number of objects in the pack (last fan-out entry)
    n: u64,
    oid_bucket_cache: HashMap<u8, Vec<ObjectId>>,
    crc_offset_cache: HashMap<ObjectId, (u32, u64)>,
}

impl<R: Read + Seek> PackIndexReader<R> {
    fn new(reader: R, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut reader = BufReader::new(reader);
        Self::parse_header(&mut reader, &path)?;
        let fanout = reader.read_array::<u32, FANOUT_ENTRYC>()?;
        let n = fanout[FANOUT_ENTRYC - 1] as u64;
        Ok(Self {
            reader,
            path,
            fanout,
            n,
            oid_bucket_cache: HashMap::new(),
            crc_offset_cache: HashMap::new(),
        })
    }

    fn parse_header(reader: &mut impl BufRead, path: &Path) -> Result<()> {
        let io = |e: std::io::Error| Error::io(path, e);
        let magic = reader.read_u32().map_err(io)?;
        if magic != PACK_IDX_MAGIC {
            return Err(Error::malformed_index(path, "invalid pack index signature"));
        }
        let version = reader.read_u32().map_err(io)?;
        if version != 2 {
            return Err(Error::malformed_index(path, format!("unsupported pack index version `{version}`")));
        }
        Ok(())
    }

    /// byte offset of `layer[index]` from the start of the file.
    fn offset_of(&self, layer: Layer, index: u64) -> u64 {
        const SIZE: [u64; 4] = [HASH_SIZE as u64, CRC_SIZE, OFFSET_SIZE, EXT_OFFSET_SIZE];
        let layer = layer as usize;
        let base =
            PACK_IDX_HEADER_SIZE + FANOUT_SIZE + (0..layer).map(|l| SIZE[l] * self.n).sum::<u64>();
        base + index * SIZE[layer]
    }

    fn read_from<T: Deserialize>(&mut self, layer: Layer, index: u64) -> Result<T> {
        let offset = self.offset_of(layer, index);
        self.reader.seek(SeekFrom::Start(offset)).map_err(|e| Error::io(&self.path, e))?;
        self.reader.read_type()
    }

    fn oid_bucket(&mut self, prefix: u8) -> Result<&[ObjectId]> {
        if !self.oid_bucket_cache.contains_key(&prefix) {
            let low = if prefix == 0 { 0 } else { self.fanout[prefix as usize - 1] } as u64;
            let high = self.fanout[prefix as usize] as u64;
            let offset = PACK_IDX_HEADER_SIZE + FANOUT_SIZE + low * HASH_SIZE as u64;
            self.reader.seek(SeekFrom::Start(offset)).map_err(|e| Error::io(&self.path, e))?;
            let oids = self.reader.read_vec::<ObjectId>((high - low) as usize)?;
            self.oid_bucket_cache.insert(prefix, oids);
        }
        Ok(&self.oid_bucket_cache[&prefix])
    }

    /// index of `oid` within the sorted oid table (spec 4.3.1 steps 1-2),
    /// or `None` if absent from this pack.
    fn find_oid_index(&mut self, oid: ObjectId) -> Result<Option<u64>> {
        let prefix = oid.as_bytes()[0];
        let low = if prefix == 0 { 0 } else { self.fanout[prefix as usize - 1] } as u64;
        let bucket = self.oid_bucket(prefix)?;
        Ok(bucket.binary_search(&oid).ok().map(|i| low + i as u64))
    }

    /// resolves a found index's offset-table entry, following into the
    /// 64-bit extension layer when the high bit is set (spec 4.3.1 step 3).
    fn find_crc_offset(&mut self, oid: ObjectId) -> Result<Option<(u32, u64)>> {
        if let Some(&cached) = self.crc_offset_cache.get(&oid) {
            return Ok(Some(cached));
        }
        let Some(index) = self.find_oid_index(oid)? else { return Ok(None) };
        let crc = self.read_from::<u32>(Layer::Crc, index)?;
        let raw_offset = self.read_from::<u32>(Layer::Ofs, index)?;
        let offset = if raw_offset & LARGE_OFFSET_FLAG != 0 {
            self.read_from::<u64>(Layer::Ext, (raw_offset & MAX_OFFSET) as u64)?
        } else {
            raw_offset as u64
        };
        self.crc_offset_cache.insert(oid, (crc, offset));
        Ok(Some((crc, offset)))
    }

    fn read_oid_at(&mut self, index: u64) -> Result<ObjectId> {
        self.read_from(Layer::Oid, index)
    }

    /// oids starting at `from`, in sorted order, up to the end of the table
    /// - used to enumerate short-hash candidates sharing a prefix.
    fn oids_from(&mut self, from: u64) -> Result<Vec<ObjectId>> {
        let mut out = Vec::new();
        let mut index = from;
        while index < self.n {
            out.push(self.read_oid_at(index)?);
            index += 1;
        }
        Ok(out)
    }
}

/// the fully-expanded bytes of a resolved pack object, with the chain's
/// innermost non-delta kind.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedObject {
    pub kind: ObjectKind,
    pub bytes: Vec<u8>,
}

/// one `(pack, idx)` pair: index lookup, entry-header decoding, and
/// delta-chain resolution for a single packfile (spec 4.3). a repository
/// with several packs holds one `Pack` per file and probes each in turn
/// (spec 4.3.5); that fan-out lives in the object database, not here.
pub struct Pack {
    pack_path: PathBuf,
    pack_reader: PackfileReader<Box<dyn ReadSeek>>,
    idx_reader: PackIndexReader<Box<dyn ReadSeek>>,
    /// resolved-object cache keyed by entry offset, shared across repeated
    /// lookups and across delta chains that share a base.
    resolved: HashMap<u64, ResolvedObject>,
    max_delta_depth: usize,
}

impl Pack {
    pub fn open(
        pack: Box<dyn ReadSeek>,
        idx: Box<dyn ReadSeek>,
        pack_path: impl Into<PathBuf>,
        idx_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let pack_path = pack_path.into();
        let pack_reader = PackfileReader::new(pack, pack_path.clone())?;
        let idx_reader = PackIndexReader::new(idx, idx_path.into())?;
        Ok(Self {
            pack_path,
            pack_reader,
            idx_reader,
            resolved: HashMap::new(),
            max_delta_depth: DEFAULT_MAX_DELTA_DEPTH,
        })
    }

    pub fn with_max_delta_depth(mut self, depth: usize) -> Self {
        self.max_delta_depth = depth;
        self
    }

    pub fn object_count(&self) -> u32 {
        self.pack_reader.object_count
    }

    /// pack-local byte offset of `oid`, or `None` if this pack doesn't
    /// contain it - a normal outcome when probing multiple packs, not an
    /// error (spec section 7).
    pub fn offset_of(&mut self, oid: ObjectId) -> Result<Option<u64>> {
        Ok(self.idx_reader.find_crc_offset(oid)?.map(|(_crc, offset)| offset))
    }

    pub fn contains(&mut self, oid: ObjectId) -> Result<bool> {
        Ok(self.offset_of(oid)?.is_some())
    }

    /// oids in this pack whose hex representation starts with `prefix`.
    pub fn prefix_matches(&mut self, prefix: PartialObjectId) -> Result<Vec<ObjectId>> {
        let extended = prefix.into_oid();
        if let Some(index) = self.idx_reader.find_oid_index(extended)? {
            return Ok(self
                .idx_reader
                .oids_from(index)?
                .into_iter()
                .take_while(|oid| prefix.matches(oid))
                .collect());
        }
        // `extended` (the prefix zero-padded to 40 hex chars) wasn't found
        // directly; scan forward from where it would have sorted.
        let first_byte = extended.as_bytes()[0];
        let low = if first_byte == 0 { 0 } else { self.idx_reader.fanout[first_byte as usize - 1] } as u64;
        let bucket = self.idx_reader.oid_bucket(first_byte)?;
        let start_in_bucket = bucket.partition_point(|oid| oid < &extended);
        Ok(self
            .idx_reader
            .oids_from(low + start_in_bucket as u64)?
            .into_iter()
            .take_while(|oid| prefix.matches(oid))
            .collect())
    }

    /// the resolved kind and size of `oid` without materializing delta
    /// bases beyond what's needed to recover the final kind.
    pub fn header(&mut self, oid: ObjectId, cancel: &CancellationToken) -> Result<Option<(ObjectKind, u64)>> {
        let Some(offset) = self.offset_of(oid)? else { return Ok(None) };
        let header = self.header_at(offset, cancel)?;
        Ok(Some(header))
    }

    fn header_at(&mut self, offset: u64, cancel: &CancellationToken) -> Result<(ObjectKind, u64)> {
        cancel.check()?;
        let header = self.pack_reader.read_header_at(offset)?;
        match header.kind.into_obj_kind() {
            Some(kind) => Ok((kind, header.size)),
            None => {
                // the declared size on a delta entry is the *target* size
                // (spec 4.3.2), so only the kind needs to come from the base
                let base_offset = match header.kind {
                    EntryKind::OfsDelta => match self.pack_reader.read_raw_entry_at(offset)? {
                        RawEntry::OfsDelta(base_offset, _) => base_offset,
                        _ => unreachable!("header kind was OfsDelta"),
                    },
                    EntryKind::RefDelta => {
                        let base_oid = match self.pack_reader.read_raw_entry_at(offset)? {
                            RawEntry::RefDelta(base_oid, _) => base_oid,
                            _ => unreachable!("header kind was RefDelta"),
                        };
                        self.offset_of(base_oid)?.ok_or(Error::ObjectNotFound(base_oid))?
                    }
                    _ => unreachable!("non-delta kinds returned a kind above"),
                };
                let (base_kind, _) = self.header_at(base_offset, cancel)?;
                Ok((base_kind, header.size))
            }
        }
    }

    /// fully resolves the object at `oid`, following and expanding any
    /// ofs-delta/ref-delta chain (spec 4.3.3). the innermost non-delta kind
    /// and the expanded target bytes are returned together.
    pub fn resolve(&mut self, oid: ObjectId, cancel: &CancellationToken) -> Result<Option<ResolvedObject>> {
        let Some(offset) = self.offset_of(oid)? else { return Ok(None) };
        self.resolve_at(offset, cancel).map(Some)
    }

    pub fn resolve_at(&mut self, offset: u64, cancel: &CancellationToken) -> Result<ResolvedObject> {
        let mut visited = HashSet::new();
        self.resolve_chain(offset, &mut visited, 0, cancel)
    }

    fn resolve_chain(
        &mut self,
        offset: u64,
        visited: &mut HashSet<u64>,
        depth: usize,
        cancel: &CancellationToken,
    ) -> Result<ResolvedObject> {
        cancel.check()?;
        if let Some(cached) = self.resolved.get(&offset) {
            return Ok(cached.clone());
        }
        if depth > self.max_delta_depth {
            return Err(Error::corrupt_pack(
                &self.pack_path,
                offset,
                format!("delta chain exceeds max depth {}", self.max_delta_depth),
            ));
        }
        if !visited.insert(offset) {
            return Err(Error::corrupt_pack(&self.pack_path, offset, "delta cycle detected"));
        }

        let raw = self.pack_reader.read_raw_entry_at(offset)?;
        let resolved = match raw {
            RawEntry::Base(kind, bytes) => ResolvedObject { kind, bytes },
            RawEntry::OfsDelta(base_offset, delta_bytes) => {
                let base = self.resolve_chain(base_offset, visited, depth + 1, cancel)?;
                let delta = Delta::deserialize_from_slice(&delta_bytes)?;
                ResolvedObject { kind: base.kind, bytes: delta.expand(&base.bytes)? }
            }
            RawEntry::RefDelta(base_oid, delta_bytes) => {
                // assumes the base lives in this same pack, true of any pack
                // produced by `git repack`; a thin pack whose base was never
                // fixed up locally would need cross-pack resolution, which
                // this module doesn't attempt - the odb falls back to
                // `ObjectNotFound` and tries the next backend.
                let base_offset = self.offset_of(base_oid)?.ok_or(Error::ObjectNotFound(base_oid))?;
                let base = self.resolve_chain(base_offset, visited, depth + 1, cancel)?;
                let delta = Delta::deserialize_from_slice(&delta_bytes)?;
                ResolvedObject { kind: base.kind, bytes: delta.expand(&base.bytes)? }
            }
        };

        self.resolved.insert(offset, resolved.clone());
        Ok(resolved)
    }

    /// a streaming read over a blob's bytes (spec 4.3.4). when the entry has
    /// no delta hops this streams directly out of the packfile without
    /// materializing; a deltified blob still requires the chain to be
    /// expanded in memory first (the copy/insert script needs random access
    /// into the base), so this falls back to wrapping the materialized
    /// bytes in a cursor in that case.
    pub fn open_blob_stream(
        &mut self,
        oid: ObjectId,
        cancel: &CancellationToken,
    ) -> Result<Option<Box<dyn Read + '_>>> {
        let Some(offset) = self.offset_of(oid)? else { return Ok(None) };
        // `read_header_at` leaves the cursor positioned right after the
        // header, i.e. at the start of the zlib payload.
        let header = self.pack_reader.read_header_at(offset)?;
        if let Some(kind) = header.kind.into_obj_kind() {
            if kind == ObjectKind::Blob {
                return Ok(Some(Box::new(open_deflate(&mut self.pack_reader.reader))));
            }
        }
        let resolved = self.resolve_at(offset, cancel)?;
        Ok(Some(Box::new(std::io::Cursor::new(resolved.bytes))))
    }
}
