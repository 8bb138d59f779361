use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::obj::ObjectKind;
use crate::serialize::{DeserializeSized, Serialize};
use crate::signature::Signature;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::io::prelude::*;

/// a parsed annotated tag object (spec section 3). a lightweight tag is
/// never represented by this type - it is just a ref pointing directly at
/// a commit, with no object of its own to read.
#[derive(PartialEq, Clone, Debug)]
pub struct Tag {
    pub target: ObjectId,
    pub target_kind: ObjectKind,
    pub name: String,
    pub tagger: Option<Signature>,
    pub message: Option<String>,
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut buf = vec![];
        self.serialize(&mut buf).map_err(|_| fmt::Error)?;
        write!(f, "{}", String::from_utf8_lossy(&buf))
    }
}

impl Serialize for Tag {
    fn serialize(&self, writer: &mut dyn Write) -> Result<()> {
        writeln!(writer, "object {}", self.target).map_err(|e| Error::io("<tag>", e))?;
        writeln!(writer, "type {}", self.target_kind).map_err(|e| Error::io("<tag>", e))?;
        writeln!(writer, "tag {}", self.name).map_err(|e| Error::io("<tag>", e))?;
        if let Some(tagger) = &self.tagger {
            writeln!(writer, "tagger {tagger}").map_err(|e| Error::io("<tag>", e))?;
        }
        if let Some(message) = &self.message {
            writeln!(writer).map_err(|e| Error::io("<tag>", e))?;
            write!(writer, "{message}").map_err(|e| Error::io("<tag>", e))?;
        }
        Ok(())
    }
}

impl DeserializeSized for Tag {
    fn deserialize_sized(reader: &mut impl BufRead, size: u64) -> Result<Self> {
        let malformed = |reason: &str| Error::malformed_object(ObjectId::UNKNOWN, reason.to_owned());

        let mut lines = reader.take(size).lines();
        let mut attrs: HashMap<String, String> = HashMap::new();

        loop {
            let Some(line) = lines.next() else { break };
            let line = line.map_err(|e| Error::io("<tag>", e))?;
            if line.is_empty() {
                break;
            }
            let (k, v) = line.split_once(' ').ok_or_else(|| malformed("tag header line missing a value"))?;
            attrs.insert(k.to_owned(), v.to_owned());
        }

        let message_lines =
            lines.collect::<std::result::Result<Vec<_>, _>>().map_err(|e| Error::io("<tag>", e))?.join("\n");
        let message = if message_lines.is_empty() { None } else { Some(message_lines) };

        let target = attrs.get("object").ok_or_else(|| malformed("tag missing object"))?.parse()?;
        let target_kind: ObjectKind =
            attrs.get("type").ok_or_else(|| malformed("tag missing type"))?.parse()?;
        let name = attrs.get("tag").ok_or_else(|| malformed("tag missing name"))?.to_owned();
        let tagger = attrs.get("tagger").map(|s| s.parse()).transpose()?;

        Ok(Self { target, target_kind, name, tagger, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bytes(tagger_line: &str, message: &str) -> Vec<u8> {
        let mut s = format!(
            "object {}\ntype commit\ntag v1.0.0\n",
            ObjectId::hash_object("commit", b"irrelevant for this test"),
        );
        if !tagger_line.is_empty() {
            s.push_str(tagger_line);
            s.push('\n');
        }
        s.push('\n');
        s.push_str(message);
        s.into_bytes()
    }

    #[test]
    fn parses_annotated_tag_with_tagger_and_message() {
        let bytes =
            sample_bytes("tagger Andy Yu <andyyu2004@gmail.com> 1616061862 +1300", "first release\n");
        let tag = Tag::deserialize_sized(&mut bytes.as_slice(), bytes.len() as u64).unwrap();
        assert_eq!(tag.target_kind, ObjectKind::Commit);
        assert_eq!(tag.name, "v1.0.0");
        assert!(tag.tagger.is_some());
        assert_eq!(tag.message.as_deref(), Some("first release\n"));
    }

    #[test]
    fn tagger_and_message_are_optional() {
        let bytes = sample_bytes("", "");
        let tag = Tag::deserialize_sized(&mut bytes.as_slice(), bytes.len() as u64).unwrap();
        assert!(tag.tagger.is_none());
        assert!(tag.message.is_none());
    }

    #[test]
    fn round_trips_through_serialize() {
        let bytes =
            sample_bytes("tagger Andy Yu <andyyu2004@gmail.com> 1616061862 +1300", "first release\n");
        let tag = Tag::deserialize_sized(&mut bytes.as_slice(), bytes.len() as u64).unwrap();
        let mut out = vec![];
        tag.serialize(&mut out).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn rejects_tag_missing_object_header() {
        let bytes = b"type commit\ntag v1.0.0\n\nmsg\n".to_vec();
        assert!(Tag::deserialize_sized(&mut bytes.as_slice(), bytes.len() as u64).is_err());
    }
}
