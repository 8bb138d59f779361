mod refdb;
mod reflog;

use crate::error::{Error, Result};
use crate::hash::ObjectId;
use lazy_static::lazy_static;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

pub use refdb::{PackedRefEntry, RefDb};
pub use reflog::{Reflog, ReflogEntry};

lazy_static! {
    /// defines what is an invalid reference name (anything else is valid).
    // a reference name is invalid if any of the following conditions hold
    // - any path component begins with `.` (`^.` or `/.`)
    // - contains `..`
    // - contains any of `* : ? [ \ ^ ~` <space> <tab>
    // - ends with `/` or `.lock`
    // - contains `@{`
    static ref INVALID_REF_REGEX: Regex =
        Regex::new(r#"^\.|/\.|\.\.|\*|:|\?|\[|\\|\^|~| |\t|/$|\.lock$|@\{"#).unwrap();
}

pub fn is_valid_name(s: &str) -> bool {
    !INVALID_REF_REGEX.is_match(s)
}

/// non-validated, parsed representation of a reference (spec section 3).
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum Ref {
    /// refers directly to an object
    Direct(ObjectId),
    /// redirects to another reference by its path relative to the `.git`
    /// directory, e.g. `refs/heads/master`
    Symbolic(RefName),
}

impl Ref {
    pub fn head() -> Self {
        Self::Symbolic(RefName::head())
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct(..))
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Self::Symbolic(..))
    }

    pub fn into_direct(self) -> Option<ObjectId> {
        match self {
            Self::Direct(oid) => Some(oid),
            Self::Symbolic(_) => None,
        }
    }
}

impl From<ObjectId> for Ref {
    fn from(oid: ObjectId) -> Self {
        Self::Direct(oid)
    }
}

impl From<RefName> for Ref {
    fn from(name: RefName) -> Self {
        Self::Symbolic(name)
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(oid) => write!(f, "{oid}"),
            Self::Symbolic(name) => write!(f, "ref: {name}"),
        }
    }
}

const SYMBOLIC_REF_PREFIX: &str = "ref: ";

impl FromStr for Ref {
    type Err = Error;

    /// parses the body of a loose ref file: either a hex object id
    /// (trailing whitespace tolerated) or a `ref: <path>` redirect (spec
    /// 4.5). anything else is a malformed reference, a fatal parse error
    /// per spec section 7.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim_end();
        if let Some(rest) = s.strip_prefix(SYMBOLIC_REF_PREFIX) {
            return RefName::new(rest.trim_end()).map(Self::Symbolic);
        }
        if let Ok(oid) = ObjectId::from_str(s) {
            return Ok(Self::Direct(oid));
        }
        Err(Error::malformed_ref(s, "ref body is neither a hex id nor a `ref:` redirect"))
    }
}

/// a validated reference name, relative to the `.git` directory
/// (`HEAD`, `refs/heads/master`, `refs/remotes/origin/master`, …).
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct RefName {
    path: String,
    kind: RefKind,
}

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub enum RefKind {
    Head,
    Branch,
    Remote,
    Tag,
    Unknown,
}

impl RefName {
    pub fn head() -> Self {
        Self { path: "HEAD".to_owned(), kind: RefKind::Head }
    }

    /// constructs a `RefName` without validating git's reference name
    /// grammar - used for paths this crate already knows are well formed
    /// (`refs/heads/<x>` built internally), as opposed to [`RefName::new`]
    /// which validates arbitrary input.
    pub fn new_unchecked(path: impl Into<String>) -> Self {
        let path = path.into();
        let kind = Self::calculate_kind(&path);
        Self { path, kind }
    }

    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if !is_valid_name(&path) {
            return Err(Error::malformed_ref(path.as_str(), "invalid reference name"));
        }
        Ok(Self::new_unchecked(path))
    }

    pub fn kind(&self) -> RefKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    fn calculate_kind(path: &str) -> RefKind {
        if path == "HEAD" {
            RefKind::Head
        } else if path.starts_with("refs/heads/") {
            RefKind::Branch
        } else if path.starts_with("refs/remotes/") {
            RefKind::Remote
        } else if path.starts_with("refs/tags/") {
            RefKind::Tag
        } else {
            RefKind::Unknown
        }
    }

    /// the name with its `refs/heads|tags|remotes/` prefix stripped, as
    /// displayed to a user (`master` rather than `refs/heads/master`)
    pub fn short(&self) -> &str {
        for prefix in ["refs/heads/", "refs/tags/", "refs/remotes/"] {
            if let Some(rest) = self.path.strip_prefix(prefix) {
                return rest;
            }
        }
        &self.path
    }
}

impl Display for RefName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

impl Ord for RefName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind.cmp(&other.kind).then_with(|| self.path.cmp(&other.path))
    }
}

impl PartialOrd for RefName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_names() {
        assert!(!is_valid_name("refs/heads/.hidden"));
        assert!(!is_valid_name("refs/heads/a..b"));
        assert!(!is_valid_name("refs/heads/a.lock"));
        assert!(!is_valid_name("refs/heads/a b"));
        assert!(is_valid_name("refs/heads/master"));
    }

    #[test]
    fn parses_direct_and_symbolic_ref_bodies() {
        let hex = "1205dc34ce48bda28fc543daaf9525a9bb6e6d1";
        assert_eq!(hex.parse::<Ref>().unwrap(), Ref::Direct(hex.parse().unwrap()));

        let sym = "ref: refs/heads/master\n".parse::<Ref>().unwrap();
        assert_eq!(sym, Ref::Symbolic(RefName::new("refs/heads/master").unwrap()));
    }

    #[test]
    fn rejects_malformed_ref_body() {
        assert!("not a hex id and no ref prefix".parse::<Ref>().is_err());
    }

    #[test]
    fn short_strips_known_prefixes() {
        let name = RefName::new("refs/heads/master").unwrap();
        assert_eq!(name.short(), "master");
        assert_eq!(name.kind(), RefKind::Branch);
    }
}
