//! Reference `NoteStore` adapter over the local filesystem. Grounded on
//! `memory::storage::file::FileStorage`: same atomic-write-via-temp-file
//! idiom, same directory-traversal guard via `note_fs::validate_relative_path`,
//! same "add the extension if missing" convention — here fixed to `.md`
//! since the note index's canonical paths are always extension-stripped.

use crate::store::{NoteStore, StoreError, StoreMetadata};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::path::{Path, PathBuf};
use tokio::fs;

const NOTE_EXTENSION: &str = ".md";

pub struct FilesystemNoteStore {
    root: PathBuf,
}

impl FilesystemNoteStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let clean = note_fs::validate_relative_path(path).map_err(|e| StoreError::InvalidPath {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let with_ext = if clean.ends_with(NOTE_EXTENSION) {
            clean
        } else {
            format!("{clean}{NOTE_EXTENSION}")
        };
        Ok(self.root.join(with_ext))
    }

    fn random_hex_suffix() -> String {
        let bytes: [u8; 8] = rand::rng().random();
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    async fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
        let temp_path = path.with_extension(format!("{}.tmp", Self::random_hex_suffix()));
        if let Err(err) = fs::write(&temp_path, content).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err);
        }
        if let Err(err) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err);
        }
        Ok(())
    }

    fn to_system_time(time: std::io::Result<std::time::SystemTime>) -> DateTime<Utc> {
        time.map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now())
    }

    async fn list_recursive(&self, dir: &Path, prefix_root: &Path, out: &mut Vec<String>) -> Result<(), StoreError> {
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if name_str.starts_with('.') {
                continue;
            }
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                Box::pin(self.list_recursive(&path, prefix_root, out)).await?;
            } else if file_type.is_file() && name_str.ends_with(NOTE_EXTENSION) {
                if let Ok(rel) = path.strip_prefix(prefix_root) {
                    if let Some(rel_str) = rel.to_str() {
                        out.push(rel_str.trim_end_matches(NOTE_EXTENSION).replace('\\', "/"));
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl NoteStore for FilesystemNoteStore {
    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.resolve(path)?.exists())
    }

    async fn read(&self, path: &str) -> Result<String, StoreError> {
        let full = self.resolve(path)?;
        fs::read_to_string(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    path: path.to_string(),
                }
            } else {
                StoreError::from(e)
            }
        })
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            if !parent.exists() {
                return Err(StoreError::ParentNotFound {
                    path: path.to_string(),
                });
            }
        }
        Self::atomic_write(&full, content).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        fs::remove_file(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    path: path.to_string(),
                }
            } else {
                StoreError::from(e)
            }
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let search_dir = if prefix.is_empty() {
            self.root.clone()
        } else {
            let clean = note_fs::validate_relative_path(prefix).map_err(|e| StoreError::InvalidPath {
                path: prefix.to_string(),
                reason: e.to_string(),
            })?;
            self.root.join(clean)
        };
        if !search_dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        self.list_recursive(&search_dir, &self.root, &mut out).await?;
        Ok(out)
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let from_full = self.resolve(from)?;
        let to_full = self.resolve(to)?;
        if !from_full.exists() {
            return Err(StoreError::NotFound {
                path: from.to_string(),
            });
        }
        if to_full.exists() {
            return Err(StoreError::AlreadyExists {
                path: to.to_string(),
            });
        }
        if let Some(parent) = to_full.parent() {
            if !parent.exists() {
                return Err(StoreError::ParentNotFound {
                    path: to.to_string(),
                });
            }
        }
        fs::rename(&from_full, &to_full).await?;
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<StoreMetadata, StoreError> {
        let full = self.resolve(path)?;
        let metadata = fs::metadata(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    path: path.to_string(),
                }
            } else {
                StoreError::from(e)
            }
        })?;
        Ok(StoreMetadata {
            created_at: Self::to_system_time(metadata.created()),
            modified_at: Self::to_system_time(metadata.modified()),
            size: metadata.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FilesystemNoteStore {
        FilesystemNoteStore::new(dir.path().to_path_buf())
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.write("note", "hello").await.unwrap();
        assert_eq!(store.read("note").await.unwrap(), "hello");
        assert!(dir.path().join("note.md").exists());
    }

    #[tokio::test]
    async fn read_missing_returns_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(matches!(store.read("missing").await, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(matches!(
            store.read("../escape").await,
            Err(StoreError::InvalidPath { .. })
        ));
    }

    #[tokio::test]
    async fn rename_rejects_existing_destination() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.write("a", "1").await.unwrap();
        store.write("b", "2").await.unwrap();
        assert!(matches!(
            store.rename("a", "b").await,
            Err(StoreError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn list_finds_nested_notes() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.write("top", "x").await.unwrap();
        fs::create_dir(dir.path().join("sub")).await.unwrap();
        store.write("sub/nested", "y").await.unwrap();

        let mut all = store.list("").await.unwrap();
        all.sort();
        assert_eq!(all, vec!["sub/nested".to_string(), "top".to_string()]);
    }
}
