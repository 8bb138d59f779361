use crate::hash::ObjectId;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// the closed error taxonomy for the object-store access layer
///
/// a missing reference is modelled as `Option::None` on the affected return
/// types, never as a variant here - `Absent` is a sentinel, not an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error at `{path}`: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },

    #[error("object `{0}` not found")]
    ObjectNotFound(ObjectId),

    #[error("corrupt pack `{path}` at offset {offset}: {reason}")]
    CorruptPack { path: PathBuf, offset: u64, reason: String },

    #[error("malformed object `{id}`: {reason}")]
    MalformedObject { id: ObjectId, reason: String },

    #[error("malformed index file `{path}`: {reason}")]
    MalformedIndex { path: PathBuf, reason: String },

    #[error("malformed reference `{path}`: {reason}")]
    MalformedRef { path: PathBuf, reason: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn corrupt_pack(path: impl Into<PathBuf>, offset: u64, reason: impl Into<String>) -> Self {
        Self::CorruptPack { path: path.into(), offset, reason: reason.into() }
    }

    pub fn malformed_object(id: ObjectId, reason: impl Into<String>) -> Self {
        Self::MalformedObject { id, reason: reason.into() }
    }

    pub fn malformed_index(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedIndex { path: path.into(), reason: reason.into() }
    }

    pub fn malformed_ref(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedRef { path: path.into(), reason: reason.into() }
    }

    /// whether this error represents a lookup miss rather than a fault
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound(..))
    }
}

/// extension trait mirroring the teacher's not-found/fatal classification,
/// used by the odb to decide whether to fall through to the next backend
pub trait ResultExt {
    fn is_not_found(&self) -> bool;
}

impl<T> ResultExt for Result<T> {
    fn is_not_found(&self) -> bool {
        matches!(self, Err(e) if e.is_not_found())
    }
}
