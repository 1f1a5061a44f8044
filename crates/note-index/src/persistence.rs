//! Atomic JSON persistence: write to a sibling temp file, then rename over
//! the target. Grounded on `memory::storage::file::FileStorage::atomic_write`,
//! upgraded from raw string content to generic `serde_json` payloads since
//! both the note index and the job engine snapshot need the same shape.

use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

fn random_hex_suffix() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Write `value` as pretty JSON to `path` atomically: serialize to a temp
/// file beside `path`, then rename over it. The rename is atomic on POSIX,
/// so a reader never observes a partially written file.
pub async fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let temp_path = sibling_temp_path(path);
    let contents = serde_json::to_string_pretty(value)?;

    if let Err(err) = fs::write(&temp_path, &contents).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(err.into());
    }
    if let Err(err) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(err.into());
    }
    Ok(())
}

fn sibling_temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "state".to_string());
    path.with_file_name(format!("{file_name}.{}.tmp", random_hex_suffix()))
}

/// Load a JSON document from `path`. Returns `Ok(None)` if the file is
/// absent; an unreadable or corrupt file is treated the same way by the
/// caller (replaced with an empty state), matching spec.md's "absent/corrupt
/// file is replaced with an empty state on load".
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let contents = fs::read_to_string(path).await.ok()?;
    serde_json::from_str(&contents).ok()
}

/// Append one line of JSON to `path`, creating the file and its parent
/// directory if needed. Writes are small enough to be atomic on POSIX.
pub async fn append_jsonl_line<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    use tokio::io::AsyncWriteExt;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    Ok(())
}
