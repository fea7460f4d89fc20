//! Filesystem helpers for snapshot-style writes.
//!
//! Every durable file is replaced as a whole: the new content goes to a
//! sibling temporary file which is then renamed over the destination, so a
//! reader never observes a half-written snapshot.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use crate::error::{StorageError, StorageResult};

/// Write `bytes` to `dst` via a temporary file in the same directory.
///
/// Creates the parent directory if needed.
pub async fn write_atomic(dst: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| StorageError::WriteFailed {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let tmp = dst.with_extension("tmp");

    fs::write(&tmp, bytes)
        .await
        .map_err(|source| StorageError::WriteFailed {
            path: tmp.clone(),
            source,
        })?;

    if let Err(source) = fs::rename(&tmp, dst).await {
        let _ = fs::remove_file(&tmp).await;
        tracing::error!(
            "Failed to move snapshot into place: {} -> {}: {}",
            tmp.display(),
            dst.display(),
            source
        );
        return Err(StorageError::WriteFailed {
            path: dst.to_path_buf(),
            source,
        });
    }

    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub async fn write_json_atomic<T: Serialize>(dst: &Path, value: &T) -> StorageResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(dst, &bytes).await
}

/// Read and parse a JSON file. A missing file is `Ok(None)`.
pub async fn read_json_optional<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StorageError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}
