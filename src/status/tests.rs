use super::*;
use crate::ignore::{Filter, FilterStack};
use crate::obj::FileMode;
use crate::test_utils::{IndexFixtureEntry, TestRepo};

#[test]
fn clean_tree_reports_nothing_in_any_set() {
    let mut repo = TestRepo::new();
    repo.commit_file("README.md", b"hello\n");
    repo.write_worktree_file("README.md", b"hello\n");

    let blob_id = ObjectId::hash_object("blob", b"hello\n");
    let metadata = std::fs::metadata(repo.work_dir().join("README.md")).unwrap();
    repo.write_index(&[IndexFixtureEntry {
        path: "README.md",
        id: blob_id,
        mode: FileMode::REG,
        mtime_sec: Timespec::mtime(&metadata).sec,
        ctime_sec: Timespec::ctime(&metadata).sec,
        size: metadata.len() as u32,
    }]);

    let status = repo.repo.status(&FilterStack::new()).unwrap();
    assert!(status.is_clean(), "{status:?}");
}

#[test]
fn new_untracked_file_and_modified_tracked_file_are_reported_separately() {
    let mut repo = TestRepo::new();
    repo.commit_file("README.md", b"hello\n");

    // the index still records the original content/size; the working tree
    // has since been overwritten with different content of a different
    // length, so the metadata short-circuit can't hide the change.
    let original_blob = ObjectId::hash_object("blob", b"hello\n");
    repo.write_index(&[IndexFixtureEntry {
        path: "README.md",
        id: original_blob,
        mode: FileMode::REG,
        mtime_sec: 1,
        ctime_sec: 1,
        size: 6,
    }]);
    repo.write_worktree_file("README.md", b"goodbye, world\n");
    repo.write_worktree_file("new_file.txt", b"new\n");

    let status = repo.repo.status(&FilterStack::new()).unwrap();

    assert_eq!(status.staged.len(), 0);
    assert_eq!(status.unstaged.len(), 1);
    let modified = &status.unstaged[0];
    assert_eq!(modified.path.as_str(), "README.md");
    assert_eq!(modified.status, FileStatusKind::Modified);
    assert_ne!(modified.index_hash, modified.worktree_hash);

    assert_eq!(status.untracked.len(), 1);
    let untracked = &status.untracked[0];
    assert_eq!(untracked.path.as_str(), "new_file.txt");
    assert_eq!(untracked.status, FileStatusKind::Untracked);
    assert_eq!(untracked.index_hash, None);
    assert_eq!(untracked.worktree_hash, Some(ObjectId::hash_object("blob", b"new\n")));
}

#[test]
fn staged_status_reports_modified_and_added_against_head() {
    // `TestRepo::commit_file` builds a fresh single-entry tree per call
    // rather than accumulating a working tree, so `HEAD`'s tree here holds
    // exactly `{a.txt}`.
    let mut repo = TestRepo::new();
    repo.commit_file("a.txt", b"a");

    let a_staged_blob = ObjectId::hash_object("blob", b"a-staged");
    let new_blob = ObjectId::hash_object("blob", b"brand new");
    repo.write_index(&[
        IndexFixtureEntry { path: "a.txt", id: a_staged_blob, mode: FileMode::REG, mtime_sec: 1, ctime_sec: 1, size: 8 },
        IndexFixtureEntry { path: "c.txt", id: new_blob, mode: FileMode::REG, mtime_sec: 1, ctime_sec: 1, size: 9 },
    ]);

    let index = repo.repo.read_index().unwrap().unwrap();
    let staged = repo.repo.staged_status(&index).unwrap();

    let by_path = |p: &str| staged.iter().find(|s| s.path.as_str() == p).unwrap();
    assert_eq!(by_path("a.txt").status, FileStatusKind::Modified);
    assert_eq!(by_path("c.txt").status, FileStatusKind::Added);
    assert_eq!(staged.len(), 2);
}

#[test]
fn staged_status_reports_deleted_when_head_entry_missing_from_index() {
    let mut repo = TestRepo::new();
    repo.commit_file("a.txt", b"a");

    let new_blob = ObjectId::hash_object("blob", b"brand new");
    repo.write_index(&[IndexFixtureEntry {
        path: "c.txt",
        id: new_blob,
        mode: FileMode::REG,
        mtime_sec: 1,
        ctime_sec: 1,
        size: 9,
    }]);

    let index = repo.repo.read_index().unwrap().unwrap();
    let staged = repo.repo.staged_status(&index).unwrap();

    let by_path = |p: &str| staged.iter().find(|s| s.path.as_str() == p).unwrap();
    assert_eq!(by_path("a.txt").status, FileStatusKind::Deleted);
    assert_eq!(by_path("c.txt").status, FileStatusKind::Added);
    assert_eq!(staged.len(), 2);
}

#[test]
fn untracked_files_respect_ignore_pipeline() {
    let repo = TestRepo::new();
    repo.write_worktree_file("debug.log", b"noisy");
    repo.write_worktree_file("important.log", b"keep me");
    repo.write_worktree_file("src/main.rs", b"fn main() {}");

    let mut ignore = FilterStack::new();
    ignore.push(Filter::parse("*.log\n!important.log\n"));

    let index = crate::index::Index::default();
    let (untracked, ignored) = repo.repo.untracked_files(&index, &ignore).unwrap();

    let untracked_paths: Vec<&str> = untracked.iter().map(|f| f.path.as_str()).collect();
    assert!(untracked_paths.contains(&"important.log"));
    assert!(untracked_paths.contains(&"src/main.rs"));
    assert!(!untracked_paths.contains(&"debug.log"));

    assert_eq!(ignored.len(), 1);
    assert_eq!(ignored[0].path.as_str(), "debug.log");
    assert_eq!(ignored[0].status, FileStatusKind::Ignored);
}

#[test]
fn missing_index_behaves_as_if_empty() {
    let repo = TestRepo::new();
    assert_eq!(repo.repo.read_index().unwrap(), None);
    let status = repo.repo.status(&FilterStack::new()).unwrap();
    assert!(status.staged.is_empty());
    assert!(status.unstaged.is_empty());
}

#[test]
fn bare_repository_has_no_unstaged_or_untracked_sets() {
    let dir = tempfile::tempdir().unwrap();
    let git_dir = dir.path().join("repo.git");
    std::fs::create_dir_all(git_dir.join("objects")).unwrap();
    std::fs::create_dir_all(git_dir.join("refs/heads")).unwrap();
    std::fs::write(git_dir.join("HEAD"), b"ref: refs/heads/master\n").unwrap();

    let options = crate::repo::RepositoryOptions::new(std::sync::Arc::new(crate::fs::StdFileSystem));
    let repo = Repository::open(git_dir, None, options).unwrap();

    let index = crate::index::Index::default();
    assert_eq!(repo.unstaged_status(&index).unwrap(), vec![]);
    let (untracked, ignored) = repo.untracked_files(&index, &FilterStack::new()).unwrap();
    assert_eq!(untracked, vec![]);
    assert_eq!(ignored, vec![]);
}
