use crate::error::Result;
use crate::io::ReadExt;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter};
use std::io::BufRead;
use std::ops::Deref;
use std::path::{Component, Path, PathBuf};

/// a repository-relative path as it appears inside a tree entry or an
/// index entry: forward-slash separated, UTF-8 (this crate does not
/// attempt to round-trip non-UTF-8 paths, unlike the on-disk format which
/// is byte-oriented - acceptable for a read-only query surface).
///
/// owned rather than interned: unlike the teacher's process-global
/// interner, nothing here keeps a `'static` arena alive for the lifetime
/// of the program, matching the "no mutable global state" requirement.
#[derive(Clone, Eq, PartialEq, Hash, Default)]
pub struct RepoPath(String);

impl RepoPath {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn join(&self, child: &str) -> Self {
        if self.0.is_empty() {
            Self(child.to_owned())
        } else {
            Self(format!("{}/{}", self.0, child))
        }
    }

    pub fn parent(&self) -> Option<Self> {
        self.0.rfind('/').map(|i| Self(self.0[..i].to_owned()))
    }

    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[i + 1..],
            None => &self.0,
        }
    }

    pub fn starts_with(&self, prefix: &RepoPath) -> bool {
        if prefix.0.is_empty() {
            return true;
        }
        self.0 == prefix.0 || self.0.starts_with(&format!("{}/", prefix.0))
    }

    /// `foo/bar/baz` -> `[foo, foo/bar, foo/bar/baz]`, used by the status
    /// engine to invalidate every ancestor directory of a changed path
    pub fn cumulative_components(&self) -> impl Iterator<Item = RepoPath> + '_ {
        let bytes = self.0.as_bytes();
        let mut index = 0;
        let mut done = false;
        std::iter::from_fn(move || {
            if done {
                return None;
            }
            match bytes[index..].iter().position(|&b| b == b'/') {
                Some(i) => {
                    index += i + 1;
                    Some(Self(self.0[..index - 1].to_owned()))
                }
                None => {
                    done = true;
                    Some(self.clone())
                }
            }
        })
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// same string with a trailing slash appended, used when comparing a
    /// tree directory entry against sibling file entries: git sorts as if
    /// directory names carried their trailing separator
    pub fn join_trailing_slash(&self) -> String {
        format!("{}/", self.0)
    }
}

impl Borrow<str> for RepoPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Deref for RepoPath {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RepoPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for RepoPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl<'a> From<&'a str> for RepoPath {
    fn from(s: &'a str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RepoPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Debug for RepoPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl Display for RepoPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl crate::serialize::Deserialize for RepoPath {
    fn deserialize(reader: &mut impl BufRead) -> Result<Self> {
        Ok(Self(reader.read_to_str().map_err(|e| crate::error::Error::io("<path>", e))?))
    }
}

impl PartialOrd for RepoPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RepoPath {
    // from git's readcache.c `name_compare`: byte-wise compare up to the
    // shared prefix length, ties broken by length. IMPORTANT: directories
    // must already carry a trailing slash for this ordering to be correct -
    // see `path_cmp_explicit` for the variant that adds it implicitly.
    fn cmp(&self, other: &Self) -> Ordering {
        path_cmp(self.as_bytes(), other.as_bytes())
    }
}

/// byte-wise compare two paths up to their common prefix, then compare a
/// virtual trailing separator at the truncation point: `/` for a directory,
/// `\0` for a file, so files sort before directories that share a path
/// prefix (`index.rs` < `index/`).
pub fn path_cmp_explicit(a: &[u8], a_is_dir: bool, b: &[u8], b_is_dir: bool) -> Ordering {
    let min_len = a.len().min(b.len());
    a[..min_len].cmp(&b[..min_len]).then_with(|| {
        let x = if a.len() == min_len { if a_is_dir { b'/' } else { b'\0' } } else { a[min_len] };
        let y = if b.len() == min_len { if b_is_dir { b'/' } else { b'\0' } } else { b[min_len] };
        x.cmp(&y)
    })
}

/// directories must already carry a trailing slash before calling this;
/// otherwise use [`path_cmp_explicit`].
pub fn path_cmp(a: &[u8], b: &[u8]) -> Ordering {
    let min_len = a.len().min(b.len());
    a[..min_len].cmp(&b[..min_len]).then_with(|| a.len().cmp(&b.len()))
}

/// normalize a path, removing `.` and `..` components, without resolving
/// symlinks (unlike [`std::fs::canonicalize`]) - ported from cargo's
/// `cargo-util` path normalization, which solves exactly the "don't touch
/// the filesystem, just simplify the component list" problem this crate
/// needs for interpreting `gitdir:` redirection and worktree paths.
pub fn normalize(path: &Path) -> PathBuf {
    let mut components = path.components().peekable();
    let mut ret = if let Some(c @ Component::Prefix(..)) = components.peek().cloned() {
        components.next();
        PathBuf::from(c.as_os_str())
    } else {
        PathBuf::new()
    };

    for component in components {
        match component {
            Component::Prefix(..) => unreachable!(),
            Component::RootDir => ret.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                ret.pop();
            }
            Component::Normal(c) => ret.push(c),
        }
    }
    ret
}
