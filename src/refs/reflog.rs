use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::signature::Signature;
use std::str::FromStr;

/// one line of a reference's reflog: `<old-hex> <new-hex> <committer> TAB
/// <message>` (spec 4.5). `old_id` is `ObjectId::UNKNOWN` for a ref's first
/// entry, matching git's own convention for "didn't exist before".
#[derive(Debug, Clone, PartialEq)]
pub struct ReflogEntry {
    pub old_id: ObjectId,
    pub new_id: ObjectId,
    pub committer: Signature,
    pub message: String,
}

impl FromStr for ReflogEntry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::malformed_ref("<reflog>", format!("malformed reflog line `{s}`"));
        let (old_id, rest) = s.split_once(' ').ok_or_else(malformed)?;
        let (new_id, rest) = rest.split_once(' ').ok_or_else(malformed)?;
        let (committer, message) = rest.split_once('\t').ok_or_else(malformed)?;
        Ok(Self {
            old_id: old_id.parse()?,
            new_id: new_id.parse()?,
            committer: committer.parse()?,
            message: message.to_owned(),
        })
    }
}

/// a reference's append-only history of value changes (spec 3, 4.5). the
/// reflog of `refs/stash` is how stashes are modeled: there is no separate
/// stash record type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reflog {
    pub entries: Vec<ReflogEntry>,
}

impl FromStr for Reflog {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let entries =
            s.lines().filter(|l| !l.is_empty()).map(ReflogEntry::from_str).collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reflog_entry() {
        let line = format!(
            "{} {} Andy Yu <andyyu2004@gmail.com> 1616061862 +1300\tcommit: initial commit",
            ObjectId::UNKNOWN,
            ObjectId::EMPTY_TREE,
        );
        let entry: ReflogEntry = line.parse().unwrap();
        assert_eq!(entry.old_id, ObjectId::UNKNOWN);
        assert_eq!(entry.new_id, ObjectId::EMPTY_TREE);
        assert_eq!(entry.message, "commit: initial commit");
    }

    #[test]
    fn parses_multi_line_reflog() {
        let line1 = format!(
            "{} {} Andy Yu <andyyu2004@gmail.com> 1616061862 +1300\tcommit (initial): first",
            ObjectId::UNKNOWN,
            ObjectId::EMPTY_TREE,
        );
        let line2 = format!(
            "{} {} Andy Yu <andyyu2004@gmail.com> 1616061900 +1300\tcommit: second",
            ObjectId::EMPTY_TREE,
            ObjectId::EMPTY_BLOB,
        );
        let reflog: Reflog = format!("{line1}\n{line2}\n").parse().unwrap();
        assert_eq!(reflog.entries.len(), 2);
        assert_eq!(reflog.entries[1].old_id, ObjectId::EMPTY_TREE);
    }

    #[test]
    fn rejects_malformed_line() {
        assert!("not a valid reflog line".parse::<Reflog>().is_err());
    }
}
