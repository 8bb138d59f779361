use crate::error::{Error, Result};
use crate::hash::{ObjectId, HASH_SIZE};
use crate::io::{BufReadExt, BufReadExtSized, ReadExt};
use crate::obj::FileMode;
use crate::path::RepoPath;
use crate::time::Timespec;
use sha1::{Digest, Sha1};
use std::io::{Cursor, Read};
use std::path::Path;

/// merge stage of an index entry: `None` for a normally staged file, the
/// other three for the base/ours/theirs copies of an unresolved conflict
/// (spec 4.7.1). encoded in bits 12-13 of an entry's flags word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MergeStage {
    None = 0,
    Base = 1,
    Ours = 2,
    Theirs = 3,
}

impl MergeStage {
    fn from_bits(n: u16) -> Self {
        match n {
            0 => Self::None,
            1 => Self::Base,
            2 => Self::Ours,
            3 => Self::Theirs,
            _ => unreachable!("masked to 2 bits"),
        }
    }
}

const ASSUME_VALID: u16 = 0x8000;
const EXTENDED: u16 = 0x4000;
const STAGE_MASK: u16 = 0x3000;
const STAGE_SHIFT: u16 = 12;
const NAME_MASK: u16 = 0x0fff;

/// the 16-bit flags word every index entry carries, plus the optional
/// extended flags word present in v3+ entries with the extended bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntryFlags {
    raw: u16,
    extended_raw: u16,
}

impl IndexEntryFlags {
    pub fn assume_valid(self) -> bool {
        self.raw & ASSUME_VALID != 0
    }

    pub fn extended(self) -> bool {
        self.raw & EXTENDED != 0
    }

    pub fn stage(self) -> MergeStage {
        MergeStage::from_bits((self.raw & STAGE_MASK) >> STAGE_SHIFT)
    }

    /// the name length this entry's flags word claims, capped at the
    /// 0xFFF sentinel meaning "at least 0xFFF, read until NUL instead" -
    /// the parser always reads until NUL regardless of this value.
    pub fn name_length_field(self) -> u16 {
        self.raw & NAME_MASK
    }

    pub fn extended_raw(self) -> u16 {
        self.extended_raw
    }
}

/// one parsed `.git/index` entry (spec 4.7.1). `path` is repository-relative.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub ctime: Timespec,
    pub mtime: Timespec,
    pub dev: u32,
    pub ino: u32,
    pub mode: FileMode,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
    pub id: ObjectId,
    pub flags: IndexEntryFlags,
    pub path: RepoPath,
}

impl IndexEntry {
    pub fn stage(&self) -> MergeStage {
        self.flags.stage()
    }
}

/// an index extension record - `TREE`, `REUC`, `UNTR`, `FSMN`, or any other
/// 4-byte signature - kept as an opaque `(signature, bytes)` pair rather
/// than semantically parsed (documented Open Question decision, see
/// DESIGN.md): no read-only operation in this crate needs the cache-tree
/// or resolve-undo data, and the teacher's own attempt at parsing `TREE`
/// (`index/tree_cache.rs`) was an unfinished stub.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexExtension {
    pub signature: [u8; 4],
    pub data: Vec<u8>,
}

/// a parsed `.git/index` file: `DIRC` magic, version 2/3/4, entries, then
/// extensions, then a trailing SHA-1 over everything before it (spec
/// 4.7.1). grounded in the teacher's `BitIndexInner`/`BitIndexEntry`,
/// stripped of every write/build-tree/add-entry operation and extended to
/// versions 3 and 4 (the teacher only ever wrote and read v2).
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub version: u32,
    entries: Vec<IndexEntry>,
    extensions: Vec<IndexExtension>,
}

const DIRC_MAGIC: &[u8; 4] = b"DIRC";

/// the index a repository that has never written `.git/index` behaves as
/// if it had (spec 8: "index with zero entries parses successfully").
impl Default for Index {
    fn default() -> Self {
        Self { version: 2, entries: vec![], extensions: vec![] }
    }
}

impl Index {
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn extensions(&self) -> &[IndexExtension] {
        &self.extensions
    }

    pub fn extension(&self, signature: &[u8; 4]) -> Option<&[u8]> {
        self.extensions.iter().find(|ext| &ext.signature == signature).map(|ext| ext.data.as_slice())
    }

    /// the stage-`None` entry at `path`, if tracked - the lookup the
    /// working-directory status engine needs to decide whether a path is
    /// tracked at all (spec 4.7.2).
    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.path.as_str() == path && e.stage() == MergeStage::None)
    }

    pub fn parse(mut reader: impl Read, path: &Path) -> Result<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).map_err(|e| Error::io(path, e))?;
        if buf.len() < 12 + HASH_SIZE {
            return Err(Error::malformed_index(path, "file shorter than the fixed header and trailer"));
        }

        let (body, trailer) = buf.split_at(buf.len() - HASH_SIZE);
        let expected = ObjectId::new(trailer.try_into().expect("split at HASH_SIZE from the end"));
        let computed = ObjectId::new(Sha1::digest(body).into());
        if computed != expected {
            return Err(Error::malformed_index(path, "trailing checksum does not match file contents"));
        }

        let mut cursor = Cursor::new(body);
        let io = |e: std::io::Error| Error::io(path, e);

        let magic = cursor.read_array::<u8, 4>()?;
        if &magic != DIRC_MAGIC {
            return Err(Error::malformed_index(path, "missing DIRC magic"));
        }
        let version = cursor.read_u32().map_err(io)?;
        if !(2..=4).contains(&version) {
            return Err(Error::malformed_index(path, format!("unsupported index version `{version}`")));
        }
        let count = cursor.read_u32().map_err(io)?;

        let entries = Self::parse_entries(&mut cursor, version, count, path)?;
        let extensions = Self::parse_extensions(&mut cursor, path)?;

        Ok(Self { version, entries, extensions })
    }

    fn parse_entries(
        cursor: &mut Cursor<&[u8]>,
        version: u32,
        count: u32,
        path: &Path,
    ) -> Result<Vec<IndexEntry>> {
        let io = |e: std::io::Error| Error::io(path, e);
        let mut entries = Vec::with_capacity(count as usize);
        let mut prev_path = String::new();

        for _ in 0..count {
            let start = cursor.position();

            let ctime = Timespec::new(cursor.read_u32().map_err(io)?, cursor.read_u32().map_err(io)?);
            let mtime = Timespec::new(cursor.read_u32().map_err(io)?, cursor.read_u32().map_err(io)?);
            let dev = cursor.read_u32().map_err(io)?;
            let ino = cursor.read_u32().map_err(io)?;
            let mode = FileMode(cursor.read_u32().map_err(io)?);
            let uid = cursor.read_u32().map_err(io)?;
            let gid = cursor.read_u32().map_err(io)?;
            let size = cursor.read_u32().map_err(io)?;
            let id = cursor.read_oid().map_err(io)?;
            let raw_flags = cursor.read_u16().map_err(io)?;

            let extended = version >= 3 && raw_flags & EXTENDED != 0;
            let extended_raw = if extended { cursor.read_u16().map_err(io)? } else { 0 };
            let flags = IndexEntryFlags { raw: raw_flags, extended_raw };

            let path_str = if version == 4 {
                let strip = cursor.read_offset().map_err(io)? as usize;
                let keep = prev_path.len().saturating_sub(strip);
                let mut name = prev_path[..keep].to_owned();
                name.push_str(&cursor.read_null_terminated_string()?);
                prev_path = name.clone();
                name
            } else {
                let name = cursor.read_null_terminated_string()?;
                let consumed = cursor.position() - start;
                let padded = (consumed + 8) & !7;
                let pad = (padded - consumed) as usize;
                if pad > 0 {
                    let mut discard = vec![0u8; pad];
                    cursor.read_exact(&mut discard).map_err(io)?;
                }
                name
            };

            entries.push(IndexEntry {
                ctime,
                mtime,
                dev,
                ino,
                mode,
                uid,
                gid,
                size,
                id,
                flags,
                path: RepoPath::new(path_str),
            });
        }

        Ok(entries)
    }

    fn parse_extensions(cursor: &mut Cursor<&[u8]>, path: &Path) -> Result<Vec<IndexExtension>> {
        let io = |e: std::io::Error| Error::io(path, e);
        let mut extensions = vec![];
        loop {
            if cursor.is_at_eof().map_err(io)? {
                break;
            }
            let signature = cursor.read_array::<u8, 4>()?;
            let length = cursor.read_u32().map_err(io)?;
            let mut data = vec![0u8; length as usize];
            cursor.read_exact(&mut data).map_err(io)?;
            extensions.push(IndexExtension { signature, data });
        }
        Ok(extensions)
    }
}

#[cfg(test)]
mod tests;
