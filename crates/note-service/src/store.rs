//! The `NoteStore` trait: the narrow interface to the real on-disk note
//! layout, audio-format sniffing, and LLM text cleaning that spec.md treats
//! as external collaborators. Shaped directly on
//! `memory::storage::traits::Storage` (async trait, `exists`/`read`/`write`/
//! `delete`/`list`/`rename`, a `StorageError` enum implementing
//! `std::error::Error`), swapping content-hash optimistic locking for the
//! revision-number locking the note index owns instead.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("note not found: {path}")]
    NotFound { path: String },
    #[error("note already exists: {path}")]
    AlreadyExists { path: String },
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("parent directory missing for '{path}'")]
    ParentNotFound { path: String },
    #[error("i/o error: {message}")]
    Io { message: String },
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            message: err.to_string(),
        }
    }
}

/// Filesystem metadata surfaced on read, used to build the read-path
/// conveniences (`name`, `size`, timestamps) in `NoteView` that spec.md's
/// distillation didn't spell out but `note_service.py::_build_note_dict`
/// composes from the store alongside index identity.
#[derive(Debug, Clone, Copy)]
pub struct StoreMetadata {
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub size: u64,
}

/// Abstract storage backend for note content, addressed by canonical
/// (extension-stripped) path. Implementations own the on-disk extension.
#[async_trait::async_trait]
pub trait NoteStore: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool, StoreError>;
    async fn read(&self, path: &str) -> Result<String, StoreError>;
    async fn write(&self, path: &str, content: &str) -> Result<(), StoreError>;
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
    async fn rename(&self, from: &str, to: &str) -> Result<(), StoreError>;
    async fn stat(&self, path: &str) -> Result<StoreMetadata, StoreError>;
}
