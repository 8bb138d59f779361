//! working-directory status engine (spec 4.7.2): compares the index against
//! `HEAD`'s tree (the staged set) and against the on-disk working tree (the
//! unstaged set), and walks untracked paths through a [`FilterStack`].
//!
//! grounded in the teacher's `status.rs`/`diff.rs` (`BitStatus`,
//! `WorkspaceDiff`, `diff_head_index`/`diff_index_worktree`), which drove
//! the same three-way comparison off its own `BitIndex`/tree-iterator
//! machinery; that machinery assumed a writable repository (`with_index_mut`,
//! a process-global path interner) this crate doesn't have, so the
//! comparison here walks the parsed [`crate::index::Index`] and
//! [`crate::obj::Tree`] directly instead of through a shared iterator
//! abstraction. the output shape follows spec section 3's `FileStatus`
//! record rather than the teacher's `WorkspaceDiff`, since spec.md gives a
//! concrete data model to target.

use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::ignore::FilterStack;
use crate::index::Index;
use crate::obj::{FileMode, Object, Tree, TreeEntry};
use crate::path::RepoPath;
use crate::repo::Repository;
use crate::time::Timespec;
use std::collections::BTreeMap;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// spec section 3's working-directory file status classification.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FileStatusKind {
    Unmodified,
    Modified,
    Added,
    Deleted,
    Renamed,
    Copied,
    TypeChanged,
    Untracked,
    Ignored,
}

/// one path's status, carrying whichever of the index/worktree hashes are
/// relevant to how it was classified (spec section 3).
#[derive(Debug, Clone, PartialEq)]
pub struct FileStatus {
    pub path: RepoPath,
    pub status: FileStatusKind,
    pub index_hash: Option<ObjectId>,
    pub worktree_hash: Option<ObjectId>,
}

/// the full result of a status scan (spec 4.7.2): staged changes (index vs
/// `HEAD`), unstaged changes (worktree vs index), untracked paths, and
/// ignored paths (spec section 3 lists `ignored` as its own status kind,
/// distinct from a tracked-but-gitignored file, which git never reports as
/// ignored).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingTreeStatus {
    pub staged: Vec<FileStatus>,
    pub unstaged: Vec<FileStatus>,
    pub untracked: Vec<FileStatus>,
    pub ignored: Vec<FileStatus>,
}

impl WorkingTreeStatus {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty() && self.untracked.is_empty()
    }
}

/// recursively flattens a tree into `path -> (mode, hash)` pairs. gitlinks
/// (submodules) are recorded but never descended into - spec's non-goals
/// exclude submodule recursion beyond opening a nested core against a path.
fn flatten_tree(repo: &Repository, tree: &Tree, prefix: &RepoPath, out: &mut BTreeMap<RepoPath, TreeEntry>) -> Result<()> {
    for entry in &tree.entries {
        let path = if prefix.is_empty() { entry.path.clone() } else { prefix.join(entry.path.as_str()) };
        if entry.mode.is_tree() {
            let obj = repo.read_obj(entry.hash)?;
            let subtree = match &*obj {
                Object::Tree(t) => t.clone(),
                other => return Err(Error::malformed_object(entry.hash, format!("expected tree, found {}", other.kind()))),
            };
            flatten_tree(repo, &subtree, &path, out)?;
        } else {
            out.insert(path.clone(), TreeEntry { mode: entry.mode, path, hash: entry.hash });
        }
    }
    Ok(())
}

impl Repository {
    /// parses `.git/index`, `Ok(None)` if the repository has never staged
    /// anything (no index file written yet).
    pub fn read_index(&self) -> Result<Option<Index>> {
        let path = self.git_dir().join("index");
        if !self.file_system().exists(&path) {
            return Ok(None);
        }
        let reader = self.file_system().open_read(&path)?;
        Ok(Some(Index::parse(reader, &path)?))
    }

    /// flattens `HEAD`'s tree into `path -> (mode, hash)` pairs, empty for
    /// an unborn branch (no commits yet).
    fn head_tree_flat(&self) -> Result<BTreeMap<RepoPath, TreeEntry>> {
        let commit_id = match self.resolve_head()? {
            Some(id) => id,
            None => return Ok(BTreeMap::new()),
        };
        let commit_obj = self.read_obj(commit_id)?;
        let tree_id = match &*commit_obj {
            Object::Commit(c) => c.tree,
            other => return Err(Error::malformed_object(commit_id, format!("expected commit, found {}", other.kind()))),
        };
        let tree_obj = self.read_obj(tree_id)?;
        let tree = match &*tree_obj {
            Object::Tree(t) => t.clone(),
            other => return Err(Error::malformed_object(tree_id, format!("expected tree, found {}", other.kind()))),
        };
        let mut flat = BTreeMap::new();
        flatten_tree(self, &tree, &RepoPath::default(), &mut flat)?;
        Ok(flat)
    }

    /// the staged set (spec 4.7.2 step 1): index entries compared against
    /// `HEAD`'s tree. entries equal in both are omitted.
    pub fn staged_status(&self, index: &Index) -> Result<Vec<FileStatus>> {
        let head_tree = self.head_tree_flat()?;

        let mut out = vec![];
        let mut seen = std::collections::HashSet::new();

        for entry in index.entries() {
            if entry.stage() != crate::index::MergeStage::None {
                continue;
            }
            seen.insert(entry.path.clone());
            match head_tree.get(&entry.path) {
                Some(head_entry) if head_entry.mode == entry.mode && head_entry.hash == entry.id => continue,
                Some(_) => out.push(FileStatus {
                    path: entry.path.clone(),
                    status: FileStatusKind::Modified,
                    index_hash: Some(entry.id),
                    worktree_hash: None,
                }),
                None => out.push(FileStatus {
                    path: entry.path.clone(),
                    status: FileStatusKind::Added,
                    index_hash: Some(entry.id),
                    worktree_hash: None,
                }),
            }
        }

        for path in head_tree.keys() {
            if !seen.contains(path) {
                out.push(FileStatus {
                    path: path.clone(),
                    status: FileStatusKind::Deleted,
                    index_hash: None,
                    worktree_hash: None,
                });
            }
        }

        out.sort_by(|a, b| a.path.as_str().cmp(b.path.as_str()));
        Ok(out)
    }

    /// the unstaged set (spec 4.7.2 step 2): index entries compared against
    /// the on-disk working tree, short-circuiting on `(mtime, ctime, size,
    /// mode)` before rehashing file contents.
    pub fn unstaged_status(&self, index: &Index) -> Result<Vec<FileStatus>> {
        let work_dir = match self.work_dir() {
            Some(dir) => dir,
            None => return Ok(vec![]), // bare repository has no working tree
        };

        let mut out = vec![];
        for entry in index.entries() {
            if entry.stage() != crate::index::MergeStage::None {
                continue;
            }
            let abs_path = work_dir.join(entry.path.as_str());
            if !self.file_system().exists(&abs_path) {
                out.push(FileStatus {
                    path: entry.path.clone(),
                    status: FileStatusKind::Deleted,
                    index_hash: Some(entry.id),
                    worktree_hash: None,
                });
                continue;
            }

            let metadata = self.file_system().metadata(&abs_path)?;
            if metadata_matches_index(&metadata, entry) {
                continue;
            }

            let worktree_hash = self.hash_worktree_file(&abs_path)?;
            if worktree_hash == entry.id {
                continue;
            }

            out.push(FileStatus {
                path: entry.path.clone(),
                status: FileStatusKind::Modified,
                index_hash: Some(entry.id),
                worktree_hash: Some(worktree_hash),
            });
        }

        out.sort_by(|a, b| a.path.as_str().cmp(b.path.as_str()));
        Ok(out)
    }

    /// hashes a working-tree file the way git hashes a blob:
    /// `sha1("blob <size>\0<bytes>")`.
    pub fn hash_worktree_file(&self, abs_path: &Path) -> Result<ObjectId> {
        use std::io::Read;
        let mut bytes = vec![];
        self.file_system().open_read(abs_path)?.read_to_end(&mut bytes).map_err(|e| Error::io(abs_path, e))?;
        Ok(ObjectId::hash_object("blob", &bytes))
    }

    /// the untracked and ignored sets (spec 4.7.2 step 3): working-tree
    /// files the index doesn't mention, split by the `ignore` filter
    /// pipeline (spec 4.7.3) into `(untracked, ignored)`. a tracked file
    /// matching an ignore pattern is neither - it stays tracked.
    pub fn untracked_files(&self, index: &Index, ignore: &FilterStack) -> Result<(Vec<FileStatus>, Vec<FileStatus>)> {
        let work_dir = match self.work_dir() {
            Some(dir) => dir.to_owned(),
            None => return Ok((vec![], vec![])),
        };

        let tracked: std::collections::HashSet<&str> =
            index.entries().iter().map(|e| e.path.as_str()).collect();

        let mut untracked = vec![];
        let mut ignored = vec![];
        self.walk_untracked(&work_dir, &RepoPath::default(), &tracked, ignore, &mut untracked, &mut ignored)?;
        untracked.sort_by(|a: &FileStatus, b: &FileStatus| a.path.as_str().cmp(b.path.as_str()));
        ignored.sort_by(|a: &FileStatus, b: &FileStatus| a.path.as_str().cmp(b.path.as_str()));
        Ok((untracked, ignored))
    }

    fn walk_untracked(
        &self,
        abs_dir: &Path,
        rel_dir: &RepoPath,
        tracked: &std::collections::HashSet<&str>,
        ignore: &FilterStack,
        untracked: &mut Vec<FileStatus>,
        ignored: &mut Vec<FileStatus>,
    ) -> Result<()> {
        for child in self.file_system().list_dir(abs_dir)? {
            let name = match child.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => continue,
            };
            if name == ".git" {
                continue;
            }
            let rel = rel_dir.join(name);
            let metadata = self.file_system().metadata(&child)?;
            let is_dir = metadata.is_dir();
            let excluded = ignore.is_excluded(rel.as_str(), is_dir);

            if is_dir {
                if excluded {
                    continue;
                }
                self.walk_untracked(&child, &rel, tracked, ignore, untracked, ignored)?;
                continue;
            }

            if tracked.contains(rel.as_str()) {
                continue;
            }

            let worktree_hash = Some(self.hash_worktree_file(&child)?);
            let status = FileStatus {
                path: rel,
                status: if excluded { FileStatusKind::Ignored } else { FileStatusKind::Untracked },
                index_hash: None,
                worktree_hash,
            };
            if excluded {
                ignored.push(status);
            } else {
                untracked.push(status);
            }
        }
        Ok(())
    }

    /// runs the full status scan (spec 4.7.2): staged, unstaged, untracked,
    /// and ignored sets.
    pub fn status(&self, ignore: &FilterStack) -> Result<WorkingTreeStatus> {
        let index = self.read_index()?.unwrap_or_default();
        let staged = self.staged_status(&index)?;
        let unstaged = self.unstaged_status(&index)?;
        let (untracked, ignored) = self.untracked_files(&index, ignore)?;
        Ok(WorkingTreeStatus { staged, unstaged, untracked, ignored })
    }
}

fn metadata_matches_index(metadata: &std::fs::Metadata, entry: &crate::index::IndexEntry) -> bool {
    Timespec::mtime(metadata) == entry.mtime
        && Timespec::ctime(metadata) == entry.ctime
        && metadata.size() == entry.size as u64
        && FileMode::from_metadata(metadata) == entry.mode
}

#[cfg(test)]
mod tests;
