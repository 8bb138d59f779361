//! worktree enumeration (spec 4.7.4): the main working tree plus any
//! linked worktrees registered under `.git/worktrees/<name>/`. grounded in
//! the teacher's `refs.rs` symbolic-ref-following for parsing the nested
//! `HEAD` files - the teacher itself has no worktree concept (single
//! working directory only), so the enumeration and descriptor shape are
//! built fresh against spec.md's description.

use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::hash::ObjectId;
use crate::refs::{Ref, RefDb};
use log::trace;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// the literal name spec.md assigns the main working tree, as distinct
/// from a linked worktree's directory-derived name.
pub const MAIN_WORKTREE_NAME: &str = "(main)";

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WorktreeStatus {
    Normal,
    Bare,
    Detached,
    Locked,
    Prunable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorktreeDescriptor {
    pub name: String,
    pub absolute_path: PathBuf,
    pub status: WorktreeStatus,
    pub head_id: Option<ObjectId>,
    pub branch_name: Option<String>,
    pub is_main: bool,
}

/// reads `.git/worktrees/<name>/{HEAD,gitdir,locked}` to enumerate every
/// worktree registered against one `.git` directory.
pub struct WorktreeDb {
    fs: Arc<dyn FileSystem>,
    git_dir: PathBuf,
}

impl WorktreeDb {
    pub fn new(fs: Arc<dyn FileSystem>, git_dir: impl Into<PathBuf>) -> Self {
        Self { fs, git_dir: git_dir.into() }
    }

    /// `main_work_dir` is the repository's own working directory (`None`
    /// for a bare repository); `is_bare` comes from `core.bare` in config.
    pub fn list(
        &self,
        refdb: &RefDb,
        main_work_dir: Option<&Path>,
        is_bare: bool,
    ) -> Result<Vec<WorktreeDescriptor>> {
        let mut out = vec![self.main_descriptor(refdb, main_work_dir, is_bare)?];

        let worktrees_dir = self.git_dir.join("worktrees");
        if self.fs.exists(&worktrees_dir) {
            for entry in self.fs.list_dir(&worktrees_dir)? {
                let name = entry
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| Error::malformed_ref(entry.clone(), "non-UTF-8 worktree name"))?
                    .to_owned();
                trace!("worktree: found linked worktree `{name}`");
                out.push(self.linked_descriptor(refdb, &name)?);
            }
        }
        Ok(out)
    }

    fn main_descriptor(
        &self,
        refdb: &RefDb,
        main_work_dir: Option<&Path>,
        is_bare: bool,
    ) -> Result<WorktreeDescriptor> {
        let head = refdb.read_head()?;
        let (head_id, branch_name, detached) = self.resolve_head_info(refdb, head)?;
        let status = if is_bare {
            WorktreeStatus::Bare
        } else if detached {
            WorktreeStatus::Detached
        } else {
            WorktreeStatus::Normal
        };
        Ok(WorktreeDescriptor {
            name: MAIN_WORKTREE_NAME.to_owned(),
            absolute_path: main_work_dir.map(Path::to_path_buf).unwrap_or_else(|| self.git_dir.clone()),
            status,
            head_id,
            branch_name,
            is_main: true,
        })
    }

    fn linked_descriptor(&self, refdb: &RefDb, name: &str) -> Result<WorktreeDescriptor> {
        let dir = self.git_dir.join("worktrees").join(name);
        let work_dir = self.read_gitdir_file(&dir.join("gitdir"))?;
        let locked = self.fs.exists(&dir.join("locked"));

        let head = refdb.read_worktree_head(name)?;
        let (head_id, branch_name, detached) = self.resolve_head_info(refdb, head)?;

        let prunable = match &work_dir {
            Some(path) => !self.fs.exists(path),
            None => true,
        };

        let status = if locked {
            WorktreeStatus::Locked
        } else if prunable {
            WorktreeStatus::Prunable
        } else if detached {
            WorktreeStatus::Detached
        } else {
            WorktreeStatus::Normal
        };

        Ok(WorktreeDescriptor {
            name: name.to_owned(),
            absolute_path: work_dir.unwrap_or_else(|| dir.clone()),
            status,
            head_id,
            branch_name,
            is_main: false,
        })
    }

    /// `gitdir` holds the absolute path to the linked worktree's `.git`
    /// file; the working directory is that file's parent.
    fn read_gitdir_file(&self, path: &Path) -> Result<Option<PathBuf>> {
        if !self.fs.exists(path) {
            return Ok(None);
        }
        let mut s = String::new();
        self.fs.open_read(path)?.read_to_string(&mut s).map_err(|e| Error::io(path, e))?;
        let dotgit = PathBuf::from(s.trim_end());
        Ok(dotgit.parent().map(Path::to_path_buf))
    }

    /// returns `(head_id, branch_name, is_detached)` for a worktree's
    /// `HEAD` contents: a symbolic `HEAD` is not detached and carries the
    /// branch's short name; a direct `HEAD` is detached with no branch.
    fn resolve_head_info(
        &self,
        refdb: &RefDb,
        head: Ref,
    ) -> Result<(Option<ObjectId>, Option<String>, bool)> {
        match &head {
            Ref::Symbolic(name) => {
                let branch_name = Some(name.short().to_owned());
                let head_id = refdb.fully_resolve(head)?;
                Ok((head_id, branch_name, false))
            }
            Ref::Direct(oid) => Ok((Some(*oid), None, true)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFileSystem;
    use crate::refs::RefDb;

    fn oid(hex: &str) -> ObjectId {
        hex.parse().unwrap()
    }

    #[test]
    fn main_worktree_normal_on_branch() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let hex = "1205dc34ce48bda28fc543daaf9525a9bb6e6d1";
        fs.insert("/repo/.git/HEAD", "ref: refs/heads/master\n".as_bytes());
        fs.insert("/repo/.git/refs/heads/master", format!("{hex}\n"));
        let refdb = RefDb::new(fs.clone(), "/repo/.git", 5);
        let wtdb = WorktreeDb::new(fs, "/repo/.git");

        let descriptors = wtdb.list(&refdb, Some(Path::new("/repo")), false).unwrap();
        assert_eq!(descriptors.len(), 1);
        let main = &descriptors[0];
        assert_eq!(main.name, MAIN_WORKTREE_NAME);
        assert!(main.is_main);
        assert_eq!(main.status, WorktreeStatus::Normal);
        assert_eq!(main.head_id, Some(oid(hex)));
        assert_eq!(main.branch_name.as_deref(), Some("master"));
    }

    #[test]
    fn bare_repo_reports_bare_status() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let hex = "1205dc34ce48bda28fc543daaf9525a9bb6e6d1";
        fs.insert("/repo.git/HEAD", "ref: refs/heads/master\n".as_bytes());
        fs.insert("/repo.git/refs/heads/master", format!("{hex}\n"));
        let refdb = RefDb::new(fs.clone(), "/repo.git", 5);
        let wtdb = WorktreeDb::new(fs, "/repo.git");

        let descriptors = wtdb.list(&refdb, None, true).unwrap();
        assert_eq!(descriptors[0].status, WorktreeStatus::Bare);
    }

    #[test]
    fn detached_head_has_no_branch_name() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let hex = "1205dc34ce48bda28fc543daaf9525a9bb6e6d1";
        fs.insert("/repo/.git/HEAD", format!("{hex}\n"));
        let refdb = RefDb::new(fs.clone(), "/repo/.git", 5);
        let wtdb = WorktreeDb::new(fs, "/repo/.git");

        let descriptors = wtdb.list(&refdb, Some(Path::new("/repo")), false).unwrap();
        assert_eq!(descriptors[0].status, WorktreeStatus::Detached);
        assert_eq!(descriptors[0].branch_name, None);
        assert_eq!(descriptors[0].head_id, Some(oid(hex)));
    }

    #[test]
    fn linked_worktree_is_enumerated() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let hex = "1205dc34ce48bda28fc543daaf9525a9bb6e6d1";
        fs.insert("/repo/.git/HEAD", "ref: refs/heads/master\n".as_bytes());
        fs.insert("/repo/.git/refs/heads/master", format!("{hex}\n"));
        fs.insert("/repo/.git/worktrees/feature/HEAD", "ref: refs/heads/feature\n".as_bytes());
        fs.insert("/repo/.git/refs/heads/feature", format!("{hex}\n"));
        fs.insert("/repo/.git/worktrees/feature/gitdir", "/other/feature/.git\n".as_bytes());
        fs.insert("/other/feature/.git", "gitdir: /repo/.git/worktrees/feature\n".as_bytes());

        let refdb = RefDb::new(fs.clone(), "/repo/.git", 5);
        let wtdb = WorktreeDb::new(fs, "/repo/.git");

        let descriptors = wtdb.list(&refdb, Some(Path::new("/repo")), false).unwrap();
        assert_eq!(descriptors.len(), 2);
        let linked = descriptors.iter().find(|d| d.name == "feature").unwrap();
        assert_eq!(linked.absolute_path, PathBuf::from("/other/feature"));
        assert_eq!(linked.branch_name.as_deref(), Some("feature"));
        assert_eq!(linked.status, WorktreeStatus::Normal);
    }

    #[test]
    fn locked_worktree_reports_locked_even_if_missing() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let hex = "1205dc34ce48bda28fc543daaf9525a9bb6e6d1";
        fs.insert("/repo/.git/HEAD", format!("{hex}\n"));
        fs.insert("/repo/.git/worktrees/gone/HEAD", format!("{hex}\n"));
        fs.insert("/repo/.git/worktrees/gone/gitdir", "/vanished/.git\n".as_bytes());
        fs.insert("/repo/.git/worktrees/gone/locked", "manually locked\n".as_bytes());

        let refdb = RefDb::new(fs.clone(), "/repo/.git", 5);
        let wtdb = WorktreeDb::new(fs, "/repo/.git");

        let descriptors = wtdb.list(&refdb, Some(Path::new("/repo")), false).unwrap();
        let linked = descriptors.iter().find(|d| d.name == "gone").unwrap();
        assert_eq!(linked.status, WorktreeStatus::Locked);
    }

    #[test]
    fn prunable_when_working_directory_vanished() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let hex = "1205dc34ce48bda28fc543daaf9525a9bb6e6d1";
        fs.insert("/repo/.git/HEAD", format!("{hex}\n"));
        fs.insert("/repo/.git/worktrees/gone/HEAD", format!("{hex}\n"));
        fs.insert("/repo/.git/worktrees/gone/gitdir", "/vanished/.git\n".as_bytes());

        let refdb = RefDb::new(fs.clone(), "/repo/.git", 5);
        let wtdb = WorktreeDb::new(fs, "/repo/.git");

        let descriptors = wtdb.list(&refdb, Some(Path::new("/repo")), false).unwrap();
        let linked = descriptors.iter().find(|d| d.name == "gone").unwrap();
        assert_eq!(linked.status, WorktreeStatus::Prunable);
    }
}
