mod blob;
mod commit;
mod tag;
mod tree;

pub use blob::Blob;
pub use commit::Commit;
pub use tag::Tag;
pub use tree::{Tree, TreeEntry};

use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::io::BufReadExt;
use crate::serialize::{DeserializeSized, Serialize};
use std::fmt::{self, Debug, Display, Formatter};
use std::fs::Metadata;
use std::io::{BufRead, BufReader, Write};
use std::str::FromStr;

/// a fully-materialized, typed record read out of the object store. every
/// variant already carries an `ObjectId` it was looked up by; verifying
/// that id against the canonical `sha1("<kind> <size>\0<body>")` preimage
/// is a caller-invoked step (`Object::verify`), not implicit, so batch
/// reads that trust their source don't pay for it twice.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Blob(Blob),
    Commit(Box<Commit>),
    Tree(Tree),
    Tag(Box<Tag>),
}

impl Object {
    pub fn parse(id: ObjectId, kind: ObjectKind, reader: impl BufRead, size: u64) -> Result<Self> {
        Ok(match kind {
            ObjectKind::Commit => Self::Commit(Box::new(Commit::deserialize_sized_unbuffered(reader, size)?)),
            ObjectKind::Tree => Self::Tree(Tree::deserialize_sized_unbuffered(reader, size)?),
            ObjectKind::Blob => Self::Blob(Blob::deserialize_sized_unbuffered(reader, size)?),
            ObjectKind::Tag => Self::Tag(Box::new(Tag::deserialize_sized_unbuffered(reader, size)?)),
        }
        .with_id(id))
    }

    fn with_id(self, _id: ObjectId) -> Self {
        self
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Commit(_) => ObjectKind::Commit,
            Self::Tree(_) => ObjectKind::Tree,
            Self::Tag(_) => ObjectKind::Tag,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Tree(_))
    }

    pub fn is_treeish(&self) -> bool {
        matches!(self, Self::Tree(_) | Self::Commit(_))
    }

    pub fn into_tree(self) -> Result<Tree> {
        match self {
            Self::Tree(tree) => Ok(tree),
            other => Err(Error::malformed_object(ObjectId::UNKNOWN, format!("expected tree, found {}", other.kind()))),
        }
    }

    pub fn into_commit(self) -> Result<Commit> {
        match self {
            Self::Commit(commit) => Ok(*commit),
            other => Err(Error::malformed_object(ObjectId::UNKNOWN, format!("expected commit, found {}", other.kind()))),
        }
    }

    /// recomputes `sha1("<kind> <size>\0<body>")` and compares it against
    /// `id` - the testable invariant every object read via either loose or
    /// pack paths must satisfy.
    pub fn verify(&self, id: ObjectId) -> Result<()> {
        let bytes = self.serialize_body()?;
        let computed = ObjectId::hash_object(&self.kind().to_string(), &bytes);
        if computed != id {
            return Err(Error::malformed_object(
                id,
                format!("hash mismatch: computed {computed} from {} bytes", bytes.len()),
            ));
        }
        Ok(())
    }

    fn serialize_body(&self) -> Result<Vec<u8>> {
        let mut buf = vec![];
        match self {
            Self::Blob(blob) => blob.serialize(&mut buf)?,
            Self::Commit(commit) => commit.serialize(&mut buf)?,
            Self::Tree(tree) => tree.serialize(&mut buf)?,
            Self::Tag(tag) => tag.serialize(&mut buf)?,
        }
        Ok(buf)
    }
}

/// a Git object's raw type tag, as it appears in both loose headers and
/// pack entries (pack entries additionally use 6/7 for the transient
/// ofs-delta/ref-delta encodings, modeled separately in `pack::EntryKind`
/// since a delta is never observed above the pack layer).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ObjectKind {
    Commit = 1,
    Tree = 2,
    Blob = 3,
    Tag = 4,
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Blob => "blob",
            Self::Tag => "tag",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ObjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "commit" => Ok(Self::Commit),
            "tree" => Ok(Self::Tree),
            "blob" => Ok(Self::Blob),
            "tag" => Ok(Self::Tag),
            _ => Err(Error::malformed_object(ObjectId::UNKNOWN, format!("unknown object type `{s}`"))),
        }
    }
}

impl TryFrom<u8> for ObjectKind {
    type Error = Error;

    fn try_from(n: u8) -> Result<Self> {
        match n {
            1 => Ok(Self::Commit),
            2 => Ok(Self::Tree),
            3 => Ok(Self::Blob),
            4 => Ok(Self::Tag),
            _ => Err(Error::malformed_object(ObjectId::UNKNOWN, format!("unknown pack object type tag `{n}`"))),
        }
    }
}

#[derive(PartialEq, Debug)]
pub struct ObjectHeader {
    pub kind: ObjectKind,
    pub size: u64,
}

/// reads a loose object header: `"<type> <size>\0"`. shared by the loose
/// object backend and by pack entry materialization, which reconstructs an
/// equivalent header once a delta chain has been fully resolved.
pub(crate) fn read_obj_header(mut reader: impl BufRead) -> Result<ObjectHeader> {
    let kind: ObjectKind = reader.read_ascii_str(0x20)?.parse()?;
    let size = reader.read_ascii_num(0x00)? as u64;
    Ok(ObjectHeader { kind, size })
}

/// a tree entry's file mode. modeled as a thin wrapper over the raw `u32`
/// rather than a closed enum so unusual-but-valid modes (anything git
/// itself would preserve, e.g. a non-standard executable bit combination)
/// round-trip instead of being rejected - the teacher's `FileMode::new`
/// panics on an unrecognized mode, which a read-only, robustness-oriented
/// crate must not do.
#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct FileMode(pub u32);

impl FileMode {
    pub const REG: Self = Self(0o100644);
    pub const EXEC: Self = Self(0o100755);
    pub const LINK: Self = Self(0o120000);
    pub const TREE: Self = Self(0o40000);
    pub const GITLINK: Self = Self(0o160000);

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn is_link(self) -> bool {
        self == Self::LINK
    }

    pub fn is_file(self) -> bool {
        self == Self::EXEC || self == Self::REG
    }

    /// any mode representing blob content (regular file, executable, or
    /// symlink) as opposed to a tree or gitlink
    pub fn is_blob(self) -> bool {
        self.is_file() || self.is_link()
    }

    pub fn is_tree(self) -> bool {
        self == Self::TREE
    }

    pub fn is_gitlink(self) -> bool {
        self == Self::GITLINK
    }

    pub fn from_metadata(metadata: &Metadata) -> Self {
        use std::os::unix::fs::PermissionsExt;
        if metadata.file_type().is_symlink() {
            Self::LINK
        } else if metadata.is_dir() {
            Self::TREE
        } else if metadata.permissions().mode() & 0o111 != 0 {
            Self::EXEC
        } else {
            Self::REG
        }
    }

    /// `None` for mode values this crate cannot map to an object kind
    /// (gitlinks point at a nested repository, not an object in this one)
    pub fn infer_obj_kind(self) -> Option<ObjectKind> {
        if self.is_tree() {
            Some(ObjectKind::Tree)
        } else if self.is_blob() {
            Some(ObjectKind::Blob)
        } else {
            None
        }
    }
}

impl Display for FileMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if f.alternate() { write!(f, "{:o}", self.0) } else { write!(f, "{:06o}", self.0) }
    }
}

impl Debug for FileMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl FromStr for FileMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        u32::from_str_radix(s, 8)
            .map(Self)
            .map_err(|_| Error::malformed_object(ObjectId::UNKNOWN, format!("invalid file mode `{s}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_mode_preserves_unusual_values() {
        // 100664 is not one of git's canonical modes but must still
        // round-trip rather than panic, unlike the teacher's `FileMode::new`
        let mode: FileMode = "100664".parse().unwrap();
        assert_eq!(mode.as_u32(), 0o100664);
        assert_eq!(format!("{mode}"), "100664");
    }

    #[test]
    fn object_kind_round_trips_through_display() {
        for kind in [ObjectKind::Commit, ObjectKind::Tree, ObjectKind::Blob, ObjectKind::Tag] {
            let s = kind.to_string();
            assert_eq!(s.parse::<ObjectKind>().unwrap(), kind);
        }
    }
}
