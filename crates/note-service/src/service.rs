//! Facade over `NoteStore` + `NoteIndex`: ID-keyed reads/writes, revision
//! checks, and the marker-replacement protocol. Grounded on the Python
//! reference's `NoteService` (`examples/original_source/backend/services/
//! note_service.py`), carried over operation-for-operation.

use crate::store::{NoteStore, StoreError, StoreMetadata};
use chrono::{DateTime, Utc};
use note_index::{NoteId, NoteIndex};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum NoteServiceError {
    #[error("note not found")]
    NotFound,
    #[error("revision conflict for note '{note_id}': expected {expected_revision}, current {current_revision}")]
    RevisionConflict {
        note_id: NoteId,
        expected_revision: u64,
        current_revision: u64,
    },
    #[error("note already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid note name")]
    InvalidName,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Index(#[from] note_index::IndexError),
}

/// Read-path view of a note: identity + revision from the index, content +
/// filesystem metadata from the store. Supplements spec.md's bare `get_note`
/// the way `note_service.py::_build_note_dict` does — composing a dict from
/// both collaborators rather than returning raw content.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteView {
    pub note_id: NoteId,
    pub path: String,
    pub name: String,
    pub revision: u64,
    pub content: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Outcome of `replace_marker`, mirroring spec.md §4.2's `{status, ...}`
/// payload as a closed enum instead of a loosely typed map. Serializable so
/// the job engine can persist it as a job's `last_result`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MarkerApplyResult {
    Applied {
        note_id: NoteId,
        note_path: String,
        revision: u64,
    },
    MarkerMissing {
        note_id: NoteId,
        note_path: String,
        revision: u64,
    },
    NoteDeleted {
        note_id: NoteId,
    },
}

impl MarkerApplyResult {
    pub fn note_path(&self) -> Option<&str> {
        match self {
            MarkerApplyResult::Applied { note_path, .. } => Some(note_path),
            MarkerApplyResult::MarkerMissing { note_path, .. } => Some(note_path),
            MarkerApplyResult::NoteDeleted { .. } => None,
        }
    }

    pub fn revision(&self) -> Option<u64> {
        match self {
            MarkerApplyResult::Applied { revision, .. } => Some(*revision),
            MarkerApplyResult::MarkerMissing { revision, .. } => Some(*revision),
            MarkerApplyResult::NoteDeleted { .. } => None,
        }
    }
}

pub struct NoteService {
    store: Arc<dyn NoteStore>,
    index: NoteIndex,
    // Serializes update_note/replace_marker/create/rename/move/delete so the
    // read-check-write sequence against the store and the index commits as
    // one step per process, matching spec.md §4.2's "entire protocol runs
    // under the service's write lock".
    write_lock: Mutex<()>,
}

impl NoteService {
    pub fn new(store: Arc<dyn NoteStore>, index: NoteIndex) -> Self {
        Self {
            store,
            index,
            write_lock: Mutex::new(()),
        }
    }

    async fn build_view(&self, note_id: NoteId, path: String, revision: u64) -> Result<NoteView, NoteServiceError> {
        let content = self.store.read(&path).await?;
        let StoreMetadata {
            created_at,
            modified_at,
            size,
        } = self.store.stat(&path).await?;
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Ok(NoteView {
            note_id,
            path,
            name,
            revision,
            content,
            size,
            created_at,
            modified_at,
        })
    }

    /// Checks the store before touching the index: a path the store doesn't
    /// recognize must not seed a phantom index record just because someone
    /// asked about it. Only a path the store confirms exists reaches
    /// `ensure_path`.
    pub async fn get_note(&self, path: &str) -> Result<NoteView, NoteServiceError> {
        let canonical = note_fs::strip_extension(path);
        if !self.store.exists(&canonical).await? {
            return Err(NoteServiceError::NotFound);
        }
        let identity = self.index.ensure_path(&canonical).await?;
        self.build_view(identity.note_id, canonical, identity.revision).await
    }

    pub async fn get_note_by_id(&self, note_id: &NoteId) -> Result<NoteView, NoteServiceError> {
        let resolved = self.index.get_by_id(note_id).await.ok_or(NoteServiceError::NotFound)?;
        self.build_view(resolved.note_id, resolved.path, resolved.revision).await
    }

    pub async fn resolve_note_path(&self, note_id: &NoteId) -> Option<String> {
        self.index.resolve_path(note_id).await
    }

    pub async fn list_notes(&self, folder: Option<&str>) -> Result<Vec<NoteView>, NoteServiceError> {
        let prefix = folder.unwrap_or("");
        let paths = self.store.list(prefix).await?;
        let mut views = Vec::with_capacity(paths.len());
        for path in paths {
            let identity = self.index.ensure_path(&path).await?;
            views.push(self.build_view(identity.note_id, path, identity.revision).await?);
        }
        Ok(views)
    }

    pub async fn create_note(&self, folder: Option<&str>, name: &str, content: &str) -> Result<NoteView, NoteServiceError> {
        let sanitized = note_fs::sanitize_filename(name).map_err(|_| NoteServiceError::InvalidName)?;
        let path = match folder {
            Some(folder) if !folder.is_empty() => format!("{folder}/{sanitized}"),
            _ => sanitized,
        };

        let _guard = self.write_lock.lock().await;
        if self.store.exists(&path).await? {
            return Err(NoteServiceError::AlreadyExists(path));
        }
        self.store.write(&path, content).await?;
        let identity = self.index.ensure_path(&path).await?;
        self.build_view(identity.note_id, path, identity.revision).await
    }

    /// Fails with `RevisionConflict` when `expected_revision` differs from
    /// the index's current revision. On success, the write precedes the
    /// revision increment; a crash between the two yields a revision that
    /// trails content by one, which spec.md §4.2 accepts as a tolerable
    /// at-least-once edge case.
    pub async fn update_note(&self, path: &str, content: &str, expected_revision: u64) -> Result<NoteView, NoteServiceError> {
        let canonical = note_fs::strip_extension(path);
        let _guard = self.write_lock.lock().await;

        if !self.store.exists(&canonical).await? {
            return Err(NoteServiceError::NotFound);
        }
        let identity = self.index.ensure_path(&canonical).await?;
        if identity.revision != expected_revision {
            return Err(NoteServiceError::RevisionConflict {
                note_id: identity.note_id,
                expected_revision,
                current_revision: identity.revision,
            });
        }

        self.store.write(&canonical, content).await?;
        let new_revision = self
            .index
            .increment_revision(&identity.note_id)
            .await?
            .ok_or(NoteServiceError::NotFound)?;
        self.build_view(identity.note_id, canonical, new_revision).await
    }

    pub async fn rename_note(&self, path: &str, new_name: &str) -> Result<NoteView, NoteServiceError> {
        let sanitized = note_fs::sanitize_filename(new_name).map_err(|_| NoteServiceError::InvalidName)?;
        let canonical = note_fs::strip_extension(path);

        let _guard = self.write_lock.lock().await;
        let identity = self.index.ensure_path(&canonical).await?;
        let parent = canonical.rsplit_once('/').map(|(p, _)| p);
        let new_path = match parent {
            Some(parent) => format!("{parent}/{sanitized}"),
            None => sanitized,
        };

        self.store.rename(&canonical, &new_path).await?;
        let resolved = self
            .index
            .update_path(&identity.note_id, &new_path)
            .await?
            .ok_or(NoteServiceError::NotFound)?;
        self.build_view(resolved.note_id, resolved.path, resolved.revision).await
    }

    pub async fn move_note(&self, path: &str, target_folder: &str) -> Result<NoteView, NoteServiceError> {
        let canonical = note_fs::strip_extension(path);

        let _guard = self.write_lock.lock().await;
        let identity = self.index.ensure_path(&canonical).await?;
        let file_name = canonical.rsplit('/').next().unwrap_or(&canonical);
        let new_path = if target_folder.is_empty() {
            file_name.to_string()
        } else {
            format!("{target_folder}/{file_name}")
        };

        self.store.rename(&canonical, &new_path).await?;
        let resolved = self
            .index
            .update_path(&identity.note_id, &new_path)
            .await?
            .ok_or(NoteServiceError::NotFound)?;
        self.build_view(resolved.note_id, resolved.path, resolved.revision).await
    }

    /// Best-effort id resolution from path, physical delete, then tombstone.
    pub async fn delete_note(&self, path: &str) -> Result<(), NoteServiceError> {
        let canonical = note_fs::strip_extension(path);
        let _guard = self.write_lock.lock().await;
        let identity = self.index.get_by_path(&canonical).await;

        self.store.delete(&canonical).await?;

        match identity {
            Some(resolved) => self.index.mark_deleted_by_id(&resolved.note_id).await?,
            None => self.index.mark_deleted_by_path(&canonical).await?,
        }
        Ok(())
    }

    /// The marker-replacement protocol (spec.md §4.2): locate the record by
    /// id, generate candidate spellings, replace the first occurrence of
    /// whichever candidate matches, bump the revision. Runs entirely under
    /// the service's write lock so concurrent updates and replacements
    /// serialize per process.
    pub async fn replace_marker(
        &self,
        note_id: &NoteId,
        marker_token: &str,
        replacement_text: &str,
    ) -> Result<MarkerApplyResult, NoteServiceError> {
        let _guard = self.write_lock.lock().await;

        let Some(resolved) = self.index.get_by_id(note_id).await else {
            return Ok(MarkerApplyResult::NoteDeleted {
                note_id: note_id.clone(),
            });
        };

        let content = self.store.read(&resolved.path).await?;
        let candidates = note_fs::marker_candidates(marker_token);
        let matched = candidates.into_iter().find(|candidate| content.contains(candidate.as_str()));

        let Some(matched) = matched else {
            return Ok(MarkerApplyResult::MarkerMissing {
                note_id: note_id.clone(),
                note_path: resolved.path,
                revision: resolved.revision,
            });
        };

        let updated_content = content.replacen(&matched, replacement_text, 1);
        self.store.write(&resolved.path, &updated_content).await?;
        let new_revision = self
            .index
            .increment_revision(note_id)
            .await?
            .ok_or(NoteServiceError::NotFound)?;

        info!(note_id = %note_id, path = %resolved.path, revision = new_revision, "marker replaced");
        Ok(MarkerApplyResult::Applied {
            note_id: note_id.clone(),
            note_path: resolved.path,
            revision: new_revision,
        })
    }

    /// Reconciler entry point: list every note the store currently knows
    /// about and reconcile the index against it.
    pub async fn sync_index(&self) -> Result<(), NoteServiceError> {
        let paths = self.store.list("").await?;
        self.index.sync_paths(&paths).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem_store::FilesystemNoteStore;
    use note_index::{Clock, FakeClock};
    use tempfile::TempDir;

    async fn new_service() -> (TempDir, NoteService) {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn NoteStore> = Arc::new(FilesystemNoteStore::new(dir.path().to_path_buf()));
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(1000));
        let index = NoteIndex::load(dir.path().join("index.json"), clock).await.unwrap();
        (dir, NoteService::new(store, index))
    }

    #[tokio::test]
    async fn lifecycle_update_then_conflict() {
        let (_dir, service) = new_service().await;
        let created = service.create_note(None, "hello", "hello").await.unwrap();
        assert_eq!(created.revision, 1);

        let updated = service.update_note(&created.path, "hi", 1).await.unwrap();
        assert_eq!(updated.revision, 2);
        assert_eq!(updated.content, "hi");

        let conflict = service.update_note(&created.path, "stale", 1).await;
        match conflict {
            Err(NoteServiceError::RevisionConflict {
                current_revision, ..
            }) => assert_eq!(current_revision, 2),
            other => panic!("expected revision conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn replace_marker_handles_escaped_spelling() {
        let (_dir, service) = new_service().await;
        let note = service
            .create_note(None, "voice", r"before \[\[tx:m:x]] after")
            .await
            .unwrap();

        let result = service
            .replace_marker(&note.note_id, "[[tx:m:x]]", "done")
            .await
            .unwrap();
        match result {
            MarkerApplyResult::Applied { revision, .. } => assert_eq!(revision, 2),
            other => panic!("expected applied, got {other:?}"),
        }

        let reread = service.get_note_by_id(&note.note_id).await.unwrap();
        assert_eq!(reread.content, "before done after");
    }

    #[tokio::test]
    async fn replace_marker_missing_is_idempotent_and_non_mutating() {
        let (_dir, service) = new_service().await;
        let note = service.create_note(None, "voice", "no marker here").await.unwrap();

        let first = service.replace_marker(&note.note_id, "[[tx:m:x]]", "done").await.unwrap();
        let second = service.replace_marker(&note.note_id, "[[tx:m:x]]", "done").await.unwrap();
        assert_eq!(first, second);
        match first {
            MarkerApplyResult::MarkerMissing { revision, .. } => assert_eq!(revision, 1),
            other => panic!("expected marker_missing, got {other:?}"),
        }
        let reread = service.get_note_by_id(&note.note_id).await.unwrap();
        assert_eq!(reread.revision, 1);
        assert_eq!(reread.content, "no marker here");
    }

    #[tokio::test]
    async fn replace_marker_on_deleted_note_reports_note_deleted() {
        let (_dir, service) = new_service().await;
        let note = service.create_note(None, "voice", "[[tx:m:x]]").await.unwrap();
        service.delete_note(&note.path).await.unwrap();

        let result = service.replace_marker(&note.note_id, "[[tx:m:x]]", "done").await.unwrap();
        assert_eq!(result, MarkerApplyResult::NoteDeleted { note_id: note.note_id });
    }

    #[tokio::test]
    async fn get_note_on_unknown_path_fails_without_seeding_index() {
        let (_dir, service) = new_service().await;
        let result = service.get_note("never-created").await;
        assert!(matches!(result, Err(NoteServiceError::NotFound)));
        assert!(service.index.get_by_path("never-created").await.is_none());
    }

    #[tokio::test]
    async fn rename_note_preserves_id_and_revision() {
        let (_dir, service) = new_service().await;
        let note = service.create_note(None, "old-name", "content").await.unwrap();
        let renamed = service.rename_note(&note.path, "new-name").await.unwrap();
        assert_eq!(renamed.note_id, note.note_id);
        assert_eq!(renamed.path, "new-name");
        assert_eq!(renamed.revision, note.revision);
    }
}
