use super::FileMode;
use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::io::BufReadExt;
use crate::path::{path_cmp_explicit, RepoPath};
use crate::serialize::{Deserialize, DeserializeSized, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::io::prelude::*;

#[derive(PartialEq, Debug, Default, Clone)]
pub struct Tree {
    pub entries: BTreeSet<TreeEntry>,
}

impl Display for Tree {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

impl Serialize for Tree {
    fn serialize(&self, writer: &mut dyn Write) -> Result<()> {
        for entry in &self.entries {
            entry.serialize(writer)?;
        }
        Ok(())
    }
}

impl DeserializeSized for Tree {
    fn deserialize_sized(reader: &mut impl BufRead, size: u64) -> Result<Self> {
        let reader = &mut reader.take(size);
        let mut tree = Self::default();
        while !reader.is_at_eof().map_err(|e| Error::io("<tree>", e))? {
            tree.entries.insert(TreeEntry::deserialize(reader)?);
        }
        Ok(tree)
    }
}

/// a single `<mode> SP <name> NUL <20-byte-hash>` record. `path` is the bare
/// entry name as it appears on disk - a tree never stores its own full path,
/// only a caller walking the tree knows the prefix to prepend.
#[derive(PartialEq, Debug, Clone, Eq, Copy)]
pub struct TreeEntry {
    pub mode: FileMode,
    pub path: RepoPath,
    pub hash: ObjectId,
}

impl TreeEntry {
    // files must sort before directories that share a path prefix
    // (`index.rs` < `index/`), but a tree entry's stored name never carries
    // the trailing slash - `sort_key` supplies it only for comparison.
    fn is_dir(&self) -> bool {
        self.mode.is_tree()
    }
}

impl PartialOrd for TreeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        path_cmp_explicit(self.path.as_bytes(), self.is_dir(), other.path.as_bytes(), other.is_dir())
    }
}

impl Deserialize for TreeEntry {
    fn deserialize(reader: &mut impl BufRead) -> Result<Self> {
        let mut mode_buf = vec![];
        reader.read_until(0x20, &mut mode_buf).map_err(|e| Error::io("<tree>", e))?;
        mode_buf.pop(); // trailing space
        let mode_str = std::str::from_utf8(&mode_buf)
            .map_err(|_| Error::malformed_object(ObjectId::UNKNOWN, "non-utf8 tree entry mode".to_owned()))?;
        let mode: FileMode = mode_str.parse()?;

        let mut path_buf = vec![];
        reader.read_until(0x00, &mut path_buf).map_err(|e| Error::io("<tree>", e))?;
        path_buf.pop(); // trailing NUL
        let path = RepoPath::new(
            String::from_utf8(path_buf)
                .map_err(|_| Error::malformed_object(ObjectId::UNKNOWN, "non-utf8 tree entry path".to_owned()))?,
        );

        let mut hash_bytes = [0u8; 20];
        reader.read_exact(&mut hash_bytes).map_err(|e| Error::io("<tree>", e))?;
        let hash = ObjectId::new(hash_bytes);

        Ok(Self { mode, path, hash })
    }
}

impl Serialize for TreeEntry {
    fn serialize(&self, writer: &mut dyn Write) -> Result<()> {
        (|| -> std::io::Result<()> {
            write!(writer, "{:#}", self.mode)?;
            writer.write_all(b" ")?;
            write!(writer, "{}", self.path)?;
            writer.write_all(b"\0")?;
            writer.write_all(self.hash.as_bytes())?;
            Ok(())
        })()
        .map_err(|e| Error::io("<tree>", e))
    }
}

impl Display for TreeEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let kind = self.mode.infer_obj_kind().map(|k| k.to_string()).unwrap_or_else(|| "commit".to_owned());
        write!(f, "{} {} {}\t{}", self.mode, kind, self.hash, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(mode: FileMode, path: &str, byte: u8) -> TreeEntry {
        TreeEntry { mode, path: RepoPath::new(path), hash: ObjectId::new([byte; 20]) }
    }

    #[test]
    fn files_sort_before_same_named_directory() {
        let mut tree = Tree::default();
        tree.entries.insert(entry(FileMode::TREE, "index", 1));
        tree.entries.insert(entry(FileMode::REG, "index.rs", 2));
        let paths: Vec<_> = tree.entries.iter().map(|e| e.path.as_str().to_owned()).collect();
        assert_eq!(paths, vec!["index.rs", "index"]);
    }

    #[test]
    fn round_trips_through_serialize() {
        let mut tree = Tree::default();
        tree.entries.insert(entry(FileMode::REG, "a.txt", 1));
        tree.entries.insert(entry(FileMode::EXEC, "run.sh", 2));
        tree.entries.insert(entry(FileMode::TREE, "sub", 3));

        let mut bytes = vec![];
        tree.serialize(&mut bytes).unwrap();
        let parsed = Tree::deserialize_sized(&mut bytes.as_slice(), bytes.len() as u64).unwrap();
        assert_eq!(tree, parsed);
    }

    #[test]
    fn deserializes_a_single_entry_record() {
        let mode = FileMode::REG;
        let hash = ObjectId::new([0x42; 20]);
        let mut bytes = vec![];
        write!(&mut bytes, "{mode:#}").unwrap();
        bytes.push(b' ');
        bytes.extend_from_slice(b"hello.txt");
        bytes.push(0);
        bytes.extend_from_slice(hash.as_bytes());

        let parsed = TreeEntry::deserialize(&mut bytes.as_slice()).unwrap();
        assert_eq!(parsed.mode, mode);
        assert_eq!(parsed.path.as_str(), "hello.txt");
        assert_eq!(parsed.hash, hash);
    }
}
