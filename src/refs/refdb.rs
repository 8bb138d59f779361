use super::{Ref, RefName, Reflog};
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::hash::ObjectId;
use log::{debug, trace};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// one parsed line of `packed-refs`: the name's direct target, plus the
/// peeled commit id carried on a following `^<hex>` line for an annotated
/// tag (spec 4.5). `peeled` lets a tag resolve to its commit without
/// reading and parsing the tag object at all.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedRefEntry {
    pub target: ObjectId,
    pub peeled: Option<ObjectId>,
}

/// reads `HEAD`, loose refs, `packed-refs`, worktree HEADs, and reflogs
/// under one `.git` directory, and follows symbolic-ref chains to a final
/// id (spec 4.5). grounded in the teacher's `BitRefDb`/`BitRefDbBackend`
/// split, collapsed into one struct (there is exactly one backend here) and
/// stripped of every write operation (`create`/`update`/`delete`), which
/// have no place in a read-only layer.
pub struct RefDb {
    fs: Arc<dyn FileSystem>,
    git_dir: PathBuf,
    symbolic_ref_max_hops: u32,
}

impl RefDb {
    pub fn new(fs: Arc<dyn FileSystem>, git_dir: impl Into<PathBuf>, symbolic_ref_max_hops: u32) -> Self {
        Self { fs, git_dir: git_dir.into(), symbolic_ref_max_hops }
    }

    fn read_file_to_string(&self, path: &Path) -> Result<String> {
        let mut s = String::new();
        self.fs.open_read(path)?.read_to_string(&mut s).map_err(|e| Error::io(path, e))?;
        Ok(s)
    }

    /// reads `.git/HEAD` without following it
    pub fn read_head(&self) -> Result<Ref> {
        self.read_loose_file(&self.git_dir.join("HEAD"))
    }

    /// reads `.git/worktrees/<name>/HEAD`, the per-worktree HEAD file for a
    /// linked worktree (spec 4.7.4)
    pub fn read_worktree_head(&self, worktree_name: &str) -> Result<Ref> {
        self.read_loose_file(&self.git_dir.join("worktrees").join(worktree_name).join("HEAD"))
    }

    fn read_loose_file(&self, path: &Path) -> Result<Ref> {
        let body = self.read_file_to_string(path)?;
        body.parse()
    }

    /// reads `name` without following a symbolic chain: loose ref file
    /// first, falling back to `packed-refs` (loose overrides packed of the
    /// same name). `Ok(None)` for a name that exists in neither (spec 4.5:
    /// "a missing reference returns absent").
    pub fn read(&self, name: &RefName) -> Result<Option<Ref>> {
        let path = self.git_dir.join(name.as_str());
        if self.fs.exists(&path) {
            trace!("refdb: reading loose ref `{name}`");
            return self.read_loose_file(&path).map(Some);
        }
        Ok(self.read_packed(name)?.map(|entry| Ref::Direct(entry.target)))
    }

    /// reads `name`'s `packed-refs` entry directly, including its peeled
    /// commit id if one was recorded - the fast path [`crate::peel::peel_tag`]
    /// should prefer over reading and parsing the tag object.
    pub fn read_packed(&self, name: &RefName) -> Result<Option<PackedRefEntry>> {
        let path = self.git_dir.join("packed-refs");
        if !self.fs.exists(&path) {
            return Ok(None);
        }
        let text = self.read_file_to_string(&path)?;
        let mut lines = text.lines().peekable();
        while let Some(line) = lines.next() {
            if line.is_empty() || line.starts_with('#') || line.starts_with('^') {
                continue;
            }
            let (hex, rname) = line
                .split_once(' ')
                .ok_or_else(|| Error::malformed_ref(path.clone(), format!("malformed packed-refs line `{line}`")))?;
            if rname != name.as_str() {
                continue;
            }
            let target: ObjectId = hex.parse()?;
            let peeled = match lines.peek() {
                Some(next) if next.starts_with('^') => Some(next[1..].parse()?),
                _ => None,
            };
            return Ok(Some(PackedRefEntry { target, peeled }));
        }
        Ok(None)
    }

    /// follows a symbolic-ref chain starting at `start` up to
    /// `symbolic_ref_max_hops` hops, returning the final reference. `Ok(None)`
    /// if the chain bottoms out at a name that doesn't exist.
    pub fn resolve(&self, start: Ref) -> Result<Option<Ref>> {
        let mut current = start;
        for _ in 0..=self.symbolic_ref_max_hops {
            match current {
                Ref::Direct(_) => return Ok(Some(current)),
                Ref::Symbolic(ref name) => match self.read(name)? {
                    Some(next) => current = next,
                    None => return Ok(None),
                },
            }
        }
        Err(Error::malformed_ref(
            self.git_dir.clone(),
            "symbolic reference chain exceeds the maximum hop count",
        ))
    }

    /// like [`Self::resolve`] but collapses the result to the final object
    /// id, `Ok(None)` if the chain is absent
    pub fn fully_resolve(&self, start: Ref) -> Result<Option<ObjectId>> {
        Ok(self.resolve(start)?.and_then(Ref::into_direct))
    }

    /// reads `.git/logs/<name>`, `Ok(None)` if the reference has never been
    /// logged
    pub fn read_reflog(&self, name: &RefName) -> Result<Option<Reflog>> {
        let path = self.git_dir.join("logs").join(name.as_str());
        if !self.fs.exists(&path) {
            return Ok(None);
        }
        debug!("refdb: reading reflog for `{name}`");
        Ok(Some(self.read_file_to_string(&path)?.parse()?))
    }

    /// the reflog of `refs/stash` - per spec 4.5, "stashes are the reflog
    /// of `refs/stash`"; there is no separate stash entry format.
    pub fn read_stash(&self) -> Result<Option<Reflog>> {
        self.read_reflog(&RefName::new_unchecked("refs/stash"))
    }
}
