use crate::fs::StdFileSystem;
use crate::hash::ObjectId;
use crate::obj::{Commit, FileMode, ObjectKind, Tag, Tree, TreeEntry};
use crate::path::RepoPath;
use crate::repo::{Repository, RepositoryOptions};
use crate::serialize::Serialize;
use crate::signature::Signature;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// one fixture row for [`TestRepo::write_index`]: a stage-`None` entry with
/// caller-chosen `mtime`/`ctime`/`size`, so status tests can force a
/// metadata mismatch (or match) without depending on filesystem timestamp
/// resolution.
pub struct IndexFixtureEntry {
    pub path: &'static str,
    pub id: ObjectId,
    pub mode: FileMode,
    pub mtime_sec: u32,
    pub ctime_sec: u32,
    pub size: u32,
}

/// a throwaway repository backed by a real temp directory on disk,
/// written to directly through `std::fs` rather than through this crate's
/// (read-only) [`Repository`] API. grounded in the teacher's own test
/// helpers (`BitRepo::init_load`, the various `tree! { ... }`/`bit_add!`
/// test macros scattered through its test modules), which likewise built
/// fixture repositories by driving bit's own write path; since this crate
/// has no write path, the equivalent here hand-writes loose objects with
/// the same zlib/sha1 encoding [`crate::odb::Odb`] expects to read back.
pub struct TestRepo {
    dir: TempDir,
    pub repo: Repository,
    head_commit: Option<ObjectId>,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let git_dir = dir.path().join(".git");
        std::fs::create_dir_all(git_dir.join("objects")).unwrap();
        std::fs::create_dir_all(git_dir.join("refs/heads")).unwrap();
        std::fs::write(git_dir.join("HEAD"), b"ref: refs/heads/master\n").unwrap();

        let options = RepositoryOptions::new(Arc::new(StdFileSystem));
        let repo = Repository::open(git_dir, Some(dir.path().to_owned()), options).unwrap();
        Self { dir, repo, head_commit: None }
    }

    pub fn work_dir(&self) -> &std::path::Path {
        self.dir.path()
    }

    fn git_dir(&self) -> PathBuf {
        self.dir.path().join(".git")
    }

    fn write_loose(&self, kind: ObjectKind, body: &[u8]) -> ObjectId {
        let id = ObjectId::hash_object(&kind.to_string(), body);
        let hex = id.to_hex();
        let dir = self.git_dir().join("objects").join(&hex[..2]);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(&hex[2..]);
        if path.exists() {
            return id;
        }
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        write!(encoder, "{kind} {}\0", body.len()).unwrap();
        encoder.write_all(body).unwrap();
        let compressed = encoder.finish().unwrap();
        std::fs::write(path, compressed).unwrap();
        id
    }

    /// writes a single-file tree and a commit on top of whatever has
    /// already been committed in this repo, moving `refs/heads/master`
    /// forward, and returns the new commit's id.
    pub fn commit_file(&mut self, path: &str, bytes: &[u8]) -> ObjectId {
        let blob_id = self.write_loose(ObjectKind::Blob, bytes);

        let mut entries = BTreeSet::new();
        entries.insert(TreeEntry { mode: FileMode::REG, path: RepoPath::new(path.to_owned()), hash: blob_id });
        let tree = Tree { entries };
        let mut tree_body = vec![];
        tree.serialize(&mut tree_body).unwrap();
        let tree_id = self.write_loose(ObjectKind::Tree, &tree_body);

        let author: Signature = "Test User <test@example.com> 1700000000 +0000".parse().unwrap();
        let commit = Commit {
            tree: tree_id,
            parent_ids: self.head_commit.into_iter().collect(),
            author: author.clone(),
            committer: author,
            message: format!("commit {path}\n"),
            gpgsig: None,
        };
        let mut commit_body = vec![];
        commit.serialize(&mut commit_body).unwrap();
        let commit_id = self.write_loose(ObjectKind::Commit, &commit_body);

        std::fs::write(self.git_dir().join("refs/heads/master"), format!("{commit_id}\n")).unwrap();
        self.head_commit = Some(commit_id);
        commit_id
    }

    /// writes `tag` as a loose object and returns its id. does not create
    /// a `refs/tags/*` entry for it - tests that need to resolve the tag
    /// by name write that ref themselves via [`Self::git_dir`]'s sibling
    /// `refs/tags` directory.
    pub fn write_loose_tag(&self, tag: &Tag) -> ObjectId {
        let mut body = vec![];
        tag.serialize(&mut body).unwrap();
        self.write_loose(ObjectKind::Tag, &body)
    }

    /// writes an arbitrary file into the working directory (not the index,
    /// not the object store) - used by status-engine tests to create
    /// untracked or modified files.
    pub fn write_worktree_file(&self, path: &str, bytes: &[u8]) {
        let full = self.dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, bytes).unwrap();
    }

    /// hand-writes `.git/index` in DIRC v2 form: fixed 62-byte entry header,
    /// NUL-terminated name padded to a multiple of 8, trailing SHA-1 over
    /// everything before it. status-engine tests use this instead of a
    /// write path this crate doesn't have.
    pub fn write_index(&self, entries: &[IndexFixtureEntry]) {
        let mut body = Vec::new();
        body.extend_from_slice(b"DIRC");
        body.extend_from_slice(&2u32.to_be_bytes());
        body.extend_from_slice(&(entries.len() as u32).to_be_bytes());

        for entry in entries {
            let start = body.len();
            body.extend_from_slice(&entry.ctime_sec.to_be_bytes());
            body.extend_from_slice(&0u32.to_be_bytes());
            body.extend_from_slice(&entry.mtime_sec.to_be_bytes());
            body.extend_from_slice(&0u32.to_be_bytes());
            body.extend_from_slice(&0u32.to_be_bytes()); // dev
            body.extend_from_slice(&0u32.to_be_bytes()); // ino
            body.extend_from_slice(&entry.mode.0.to_be_bytes());
            body.extend_from_slice(&0u32.to_be_bytes()); // uid
            body.extend_from_slice(&0u32.to_be_bytes()); // gid
            body.extend_from_slice(&entry.size.to_be_bytes());
            body.extend_from_slice(entry.id.as_bytes());
            let name_len = entry.path.len().min(0xfff) as u16;
            body.extend_from_slice(&name_len.to_be_bytes());
            body.extend_from_slice(entry.path.as_bytes());
            body.push(0);
            let consumed = body.len() - start;
            let padded = (consumed + 8) & !7;
            body.resize(start + padded, 0);
        }

        let mut hasher = Sha1::new();
        hasher.update(&body);
        body.extend_from_slice(&hasher.finalize());
        std::fs::write(self.git_dir().join("index"), body).unwrap();
    }
}
