//! Durable note identity / path / revision index.
//!
//! Paths mutate (rename, move); `NoteId` never does. This is the single
//! source of truth for that mapping, plus the optimistic-concurrency
//! revision counter. Grounded directly on the Python reference's
//! `NoteIndexService` (see `examples/original_source/backend/services/
//! note_index_service.py`), carried over field-for-field and operation-for-
//! operation.

use crate::clock::Clock;
use crate::ids::NoteId;
use crate::persistence::{atomic_write_json, load_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// One durable record: current path, revision, and tombstone state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteRecord {
    pub path: String,
    pub revision: u64,
    #[serde(default)]
    pub deleted: bool,
    pub updated_at: DateTime<Utc>,
}

/// Identity + revision returned by `ensure_path` and other mutating calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteIdentity {
    pub note_id: NoteId,
    pub revision: u64,
}

/// Identity + path + revision, returned where the caller also needs the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNote {
    pub note_id: NoteId,
    pub path: String,
    pub revision: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexDocument {
    version: u32,
    updated_at: DateTime<Utc>,
    notes: HashMap<NoteId, NoteRecord>,
    path_to_id: HashMap<String, NoteId>,
}

impl IndexDocument {
    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            version: 1,
            updated_at: now,
            notes: HashMap::new(),
            path_to_id: HashMap::new(),
        }
    }

    /// `path_to_id` is always a pure projection of `notes` over non-deleted
    /// records; rebuild it before every persist so the two can never drift.
    fn rebuild_projection(&mut self) {
        self.path_to_id = self
            .notes
            .iter()
            .filter(|(_, record)| !record.deleted)
            .map(|(id, record)| (record.path.clone(), id.clone()))
            .collect();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("persistence error: {0}")]
    Persist(#[from] crate::persistence::PersistError),
}

/// Durable note identity/revision index, guarded by a single lock covering
/// both the in-memory state and its on-disk projection.
pub struct NoteIndex {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    state: Mutex<IndexDocument>,
}

impl NoteIndex {
    /// Load the index from `path`, creating an empty one if absent or
    /// corrupt (spec.md §6: "absent/corrupt file is replaced with an empty
    /// state on load").
    pub async fn load(path: PathBuf, clock: Arc<dyn Clock>) -> Result<Self, IndexError> {
        let now = clock.now_iso();
        let document = load_json::<IndexDocument>(&path)
            .await
            .unwrap_or_else(|| IndexDocument::empty(now));
        let index = Self {
            path,
            clock,
            state: Mutex::new(document),
        };
        index.persist(index.state.lock().await).await?;
        Ok(index)
    }

    async fn persist(&self, mut guard: tokio::sync::MutexGuard<'_, IndexDocument>) -> Result<(), IndexError> {
        guard.rebuild_projection();
        guard.updated_at = self.clock.now_iso();
        atomic_write_json(&self.path, &*guard).await?;
        Ok(())
    }

    /// Idempotent: repeated calls with the same path return the same
    /// `note_id`. Revives a tombstoned record (clears `deleted`, bumps
    /// `updated_at`, preserves `revision`); otherwise creates a fresh record
    /// at `revision = 1`.
    pub async fn ensure_path(&self, path: &str) -> Result<NoteIdentity, IndexError> {
        let normalized = note_fs::normalize_path(path);
        let mut guard = self.state.lock().await;
        let identity = self.ensure_path_locked(&mut guard, &normalized);
        self.persist(guard).await?;
        Ok(identity)
    }

    fn ensure_path_locked(&self, guard: &mut IndexDocument, normalized: &str) -> NoteIdentity {
        if let Some(note_id) = guard.path_to_id.get(normalized).cloned() {
            if let Some(record) = guard.notes.get_mut(&note_id) {
                if record.deleted {
                    record.deleted = false;
                    record.updated_at = self.clock.now_iso();
                }
                return NoteIdentity {
                    note_id,
                    revision: record.revision,
                };
            }
        }

        let note_id = NoteId::generate();
        let record = NoteRecord {
            path: normalized.to_string(),
            revision: 1,
            deleted: false,
            updated_at: self.clock.now_iso(),
        };
        guard.notes.insert(note_id.clone(), record);
        guard.path_to_id.insert(normalized.to_string(), note_id.clone());
        debug!(note_id = %note_id, path = normalized, "note index created");
        NoteIdentity {
            note_id,
            revision: 1,
        }
    }

    pub async fn get_by_path(&self, path: &str) -> Option<ResolvedNote> {
        let normalized = note_fs::normalize_path(path);
        let guard = self.state.lock().await;
        let note_id = guard.path_to_id.get(&normalized)?.clone();
        let record = guard.notes.get(&note_id)?;
        if record.deleted {
            return None;
        }
        Some(ResolvedNote {
            note_id,
            path: record.path.clone(),
            revision: record.revision,
        })
    }

    pub async fn get_by_id(&self, note_id: &NoteId) -> Option<ResolvedNote> {
        let guard = self.state.lock().await;
        let record = guard.notes.get(note_id)?;
        if record.deleted {
            return None;
        }
        Some(ResolvedNote {
            note_id: note_id.clone(),
            path: record.path.clone(),
            revision: record.revision,
        })
    }

    /// Returns `None` ("not found") if the id is unknown or tombstoned.
    pub async fn increment_revision(&self, note_id: &NoteId) -> Result<Option<u64>, IndexError> {
        let mut guard = self.state.lock().await;
        let new_revision = {
            let Some(record) = guard.notes.get_mut(note_id) else {
                return Ok(None);
            };
            if record.deleted {
                return Ok(None);
            }
            record.revision += 1;
            record.updated_at = self.clock.now_iso();
            record.revision
        };
        self.persist(guard).await?;
        Ok(Some(new_revision))
    }

    /// Atomically removes the old path from the projection and inserts the
    /// new one. The caller is responsible for ensuring `new_path` doesn't
    /// collide with a different live record.
    pub async fn update_path(&self, note_id: &NoteId, new_path: &str) -> Result<Option<ResolvedNote>, IndexError> {
        let normalized = note_fs::normalize_path(new_path);
        let mut guard = self.state.lock().await;
        let resolved = {
            let Some(record) = guard.notes.get_mut(note_id) else {
                return Ok(None);
            };
            let old_path = record.path.clone();
            record.path = normalized.clone();
            record.deleted = false;
            record.updated_at = self.clock.now_iso();
            let revision = record.revision;

            if guard.path_to_id.get(&old_path) == Some(note_id) {
                guard.path_to_id.remove(&old_path);
            }
            guard.path_to_id.insert(normalized.clone(), note_id.clone());

            ResolvedNote {
                note_id: note_id.clone(),
                path: normalized,
                revision,
            }
        };
        self.persist(guard).await?;
        Ok(Some(resolved))
    }

    pub async fn mark_deleted_by_id(&self, note_id: &NoteId) -> Result<(), IndexError> {
        let mut guard = self.state.lock().await;
        let changed = {
            let Some(record) = guard.notes.get_mut(note_id) else {
                return Ok(());
            };
            record.deleted = true;
            record.updated_at = self.clock.now_iso();
            true
        };
        if changed {
            self.persist(guard).await?;
        }
        Ok(())
    }

    pub async fn mark_deleted_by_path(&self, path: &str) -> Result<(), IndexError> {
        let normalized = note_fs::normalize_path(path);
        let note_id = {
            let guard = self.state.lock().await;
            guard.path_to_id.get(&normalized).cloned()
        };
        if let Some(note_id) = note_id {
            self.mark_deleted_by_id(&note_id).await?;
        }
        Ok(())
    }

    pub async fn check_expected_revision(&self, note_id: &NoteId, expected: u64) -> bool {
        let guard = self.state.lock().await;
        match guard.notes.get(note_id) {
            Some(record) if !record.deleted => record.revision == expected,
            _ => false,
        }
    }

    pub async fn resolve_path(&self, note_id: &NoteId) -> Option<String> {
        let guard = self.state.lock().await;
        let record = guard.notes.get(note_id)?;
        if record.deleted {
            return None;
        }
        Some(record.path.clone())
    }

    /// Reconciler used at startup: paths absent from `current_paths` are
    /// tombstoned, paths present are un-tombstoned (and ensured if new), and
    /// the projection is rebuilt from the primary table.
    pub async fn sync_paths(&self, current_paths: &[String]) -> Result<(), IndexError> {
        let normalized: HashSet<String> = current_paths
            .iter()
            .map(|p| note_fs::normalize_path(p))
            .filter(|p| !p.is_empty())
            .collect();

        let mut guard = self.state.lock().await;
        let mut sorted: Vec<&String> = normalized.iter().collect();
        sorted.sort();
        for path in sorted {
            self.ensure_path_locked(&mut guard, path);
        }

        let now = self.clock.now_iso();
        for record in guard.notes.values_mut() {
            if normalized.contains(&record.path) {
                record.deleted = false;
            } else {
                record.deleted = true;
                record.updated_at = now;
            }
        }

        self.persist(guard).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use tempfile::TempDir;

    async fn new_index() -> (TempDir, NoteIndex) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(1000));
        let index = NoteIndex::load(path, clock).await.unwrap();
        (dir, index)
    }

    #[tokio::test]
    async fn ensure_path_is_idempotent() {
        let (_dir, index) = new_index().await;
        let first = index.ensure_path("notes/a").await.unwrap();
        let second = index.ensure_path("notes/a").await.unwrap();
        assert_eq!(first.note_id, second.note_id);
        assert_eq!(second.revision, 1);
    }

    #[tokio::test]
    async fn ensure_path_revives_tombstone_preserving_revision() {
        let (_dir, index) = new_index().await;
        let identity = index.ensure_path("notes/a").await.unwrap();
        index.increment_revision(&identity.note_id).await.unwrap();
        index.mark_deleted_by_id(&identity.note_id).await.unwrap();
        assert!(index.get_by_id(&identity.note_id).await.is_none());

        let revived = index.ensure_path("notes/a").await.unwrap();
        assert_eq!(revived.note_id, identity.note_id);
        assert_eq!(revived.revision, 2);
        assert!(index.get_by_id(&identity.note_id).await.is_some());
    }

    #[tokio::test]
    async fn increment_revision_on_tombstoned_returns_none() {
        let (_dir, index) = new_index().await;
        let identity = index.ensure_path("notes/a").await.unwrap();
        index.mark_deleted_by_id(&identity.note_id).await.unwrap();
        assert_eq!(index.increment_revision(&identity.note_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_path_moves_projection_atomically() {
        let (_dir, index) = new_index().await;
        let identity = index.ensure_path("old/path").await.unwrap();
        let resolved = index
            .update_path(&identity.note_id, "new/path")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.path, "new/path");
        assert!(index.get_by_path("old/path").await.is_none());
        assert!(index.get_by_path("new/path").await.is_some());
    }

    #[tokio::test]
    async fn sync_paths_tombstones_missing_and_revives_present() {
        let (_dir, index) = new_index().await;
        let a = index.ensure_path("a").await.unwrap();
        let _b = index.ensure_path("b").await.unwrap();

        index.sync_paths(&["a".to_string()]).await.unwrap();
        assert!(index.get_by_path("a").await.is_some());
        assert!(index.get_by_path("b").await.is_none());

        // Bringing "b" back should revive it through sync, not double-create.
        index.sync_paths(&["a".to_string(), "b".to_string()]).await.unwrap();
        assert!(index.get_by_path("b").await.is_some());
        assert_eq!(index.get_by_id(&a.note_id).await.unwrap().path, "a");
    }

    #[tokio::test]
    async fn check_expected_revision_matches_current() {
        let (_dir, index) = new_index().await;
        let identity = index.ensure_path("a").await.unwrap();
        assert!(index.check_expected_revision(&identity.note_id, 1).await);
        index.increment_revision(&identity.note_id).await.unwrap();
        assert!(!index.check_expected_revision(&identity.note_id, 1).await);
        assert!(index.check_expected_revision(&identity.note_id, 2).await);
    }

    #[tokio::test]
    async fn path_to_id_projection_matches_non_deleted_notes() {
        let (_dir, index) = new_index().await;
        index.ensure_path("a").await.unwrap();
        let b = index.ensure_path("b").await.unwrap();
        index.mark_deleted_by_id(&b.note_id).await.unwrap();

        let guard = index.state.lock().await;
        let projected: HashMap<String, NoteId> = guard
            .notes
            .iter()
            .filter(|(_, r)| !r.deleted)
            .map(|(id, r)| (r.path.clone(), id.clone()))
            .collect();
        assert_eq!(guard.path_to_id, projected);
    }

    #[tokio::test]
    async fn reload_from_disk_preserves_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(1000));
        let identity = {
            let index = NoteIndex::load(path.clone(), clock.clone()).await.unwrap();
            index.ensure_path("a").await.unwrap()
        };

        let reloaded = NoteIndex::load(path, clock).await.unwrap();
        let resolved = reloaded.get_by_id(&identity.note_id).await.unwrap();
        assert_eq!(resolved.path, "a");
        assert_eq!(resolved.revision, 1);
    }
}
