use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::serialize::{DeserializeSized, Serialize};
use crate::signature::Signature;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::io::prelude::*;

/// a parsed commit object. `parent_ids` holds zero or more parents in the
/// order they appear in the object body (zero for a root commit, two or
/// more for a merge) - the teacher's original modeled a single `Option<Oid>`
/// parent, which can't represent a merge commit.
#[derive(PartialEq, Clone, Debug)]
pub struct Commit {
    pub tree: ObjectId,
    pub parent_ids: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
    pub gpgsig: Option<String>,
}

impl Commit {
    pub fn tree(&self) -> ObjectId {
        self.tree
    }

    pub fn is_merge(&self) -> bool {
        self.parent_ids.len() > 1
    }

    pub fn is_root(&self) -> bool {
        self.parent_ids.is_empty()
    }

    /// the first blank-line-delimited paragraph of the message, with
    /// internal newlines replaced by spaces (spec section 3)
    pub fn subject(&self) -> String {
        let paragraph = self.message.split("\n\n").next().unwrap_or("");
        paragraph.replace('\n', " ")
    }

    /// everything after the subject's paragraph, including the blank line
    /// that separates them; empty if the message has no body
    pub fn body(&self) -> &str {
        match self.message.split_once("\n\n") {
            Some((_, rest)) => rest,
            None => "",
        }
    }
}

impl Display for Commit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut buf = vec![];
        self.serialize(&mut buf).map_err(|_| fmt::Error)?;
        write!(f, "{}", String::from_utf8_lossy(&buf))
    }
}

impl Serialize for Commit {
    fn serialize(&self, writer: &mut dyn Write) -> Result<()> {
        macro_rules! w {
            ($s:expr) => {
                writeln!(writer, "{}", $s.replace('\n', "\n ")).map_err(|e| Error::io("<commit>", e))
            };
        }

        w!(format!("tree {}", self.tree))?;
        for parent in &self.parent_ids {
            w!(format!("parent {parent}"))?;
        }
        w!(format!("author {}", self.author))?;
        w!(format!("committer {}", self.committer))?;
        if let Some(gpgsig) = &self.gpgsig {
            w!(format!("gpgsig {gpgsig}"))?;
        }

        writeln!(writer).map_err(|e| Error::io("<commit>", e))?;
        write!(writer, "{}", self.message).map_err(|e| Error::io("<commit>", e))?;
        Ok(())
    }
}

impl DeserializeSized for Commit {
    fn deserialize_sized(reader: &mut impl BufRead, size: u64) -> Result<Self> {
        let malformed = |reason: &str| Error::malformed_object(ObjectId::UNKNOWN, reason.to_owned());

        let mut lines = reader.take(size).lines();
        let mut attrs: HashMap<String, String> = HashMap::new();
        let mut parent_ids = vec![];

        let mut key: Option<String> = None;
        let mut value: Option<String> = None;

        let flush = |key: &mut Option<String>, value: &mut Option<String>, attrs: &mut HashMap<String, String>, parent_ids: &mut Vec<ObjectId>| -> Result<()> {
            if let (Some(k), Some(v)) = (key.take(), value.take()) {
                if k == "parent" {
                    parent_ids.push(v.parse()?);
                } else {
                    attrs.insert(k, v);
                }
            }
            Ok(())
        };

        loop {
            let Some(line) = lines.next() else { break };
            let line = line.map_err(|e| Error::io("<commit>", e))?;

            if let Some(v) = &mut value {
                if let Some(rest) = line.strip_prefix(' ') {
                    v.push('\n');
                    v.push_str(rest);
                    continue;
                } else {
                    flush(&mut key, &mut value, &mut attrs, &mut parent_ids)?;
                }
            }

            if line.is_empty() {
                break;
            }

            let (k, v) = line.split_once(' ').ok_or_else(|| malformed("commit header line missing a value"))?;
            key = Some(k.to_owned());
            value = Some(v.to_owned());
        }
        flush(&mut key, &mut value, &mut attrs, &mut parent_ids)?;

        let message = lines.collect::<std::result::Result<Vec<_>, _>>().map_err(|e| Error::io("<commit>", e))?.join("\n");

        let tree = attrs.get("tree").ok_or_else(|| malformed("commit missing tree"))?.parse()?;
        let author = attrs.get("author").ok_or_else(|| malformed("commit missing author"))?.parse()?;
        let committer = attrs.get("committer").ok_or_else(|| malformed("commit missing committer"))?.parse()?;
        let gpgsig = attrs.get("gpgsig").cloned();

        Ok(Self { tree, parent_ids, author, committer, message, gpgsig })
    }
}
