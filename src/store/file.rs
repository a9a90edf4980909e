//! JSON-lines file audit store
//!
//! Appends one JSON-serialized `AuditRecord` per line. Appends are
//! serialized through an internal mutex so concurrent observers never
//! interleave partial lines.

use super::MessageAuditStore;
use crate::error::{AuditError, Result};
use crate::types::AuditRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct FileAuditStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileAuditStore {
    /// Create a store appending to `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every record in the file, oldest first
    ///
    /// Returns an empty list if the file does not exist yet.
    pub async fn read_all(&self) -> Result<Vec<AuditRecord>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(AuditError::from))
            .collect()
    }
}

#[async_trait]
impl MessageAuditStore for FileAuditStore {
    async fn record(&self, record: AuditRecord) -> Result<()> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AuditError::Store(format!(
                    "Failed to create audit directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                AuditError::Store(format!(
                    "Failed to open audit file {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        file.write_all(&line).await?;
        file.flush().await?;

        tracing::debug!(
            path = %self.path.display(),
            message_id = %record.metadata.message_id,
            direction = %record.metadata.direction,
            "Audit record appended"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}
