use chrono::Utc;
use loungewatch_core::{Comment, CoreError, RunMetadata};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Owns the on-disk snapshot file and its sibling metadata record. All
/// mutation goes through the backup-then-write-then-cleanup sequence; the
/// original file is never deleted before its replacement exists.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    data_path: PathBuf,
    metadata_path: PathBuf,
}

impl SnapshotStore {
    pub fn new(data_path: PathBuf, metadata_path: PathBuf) -> Self {
        Self {
            data_path,
            metadata_path,
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// Rename an existing snapshot aside to a timestamped backup. Returns
    /// the backup path, or `None` when there was nothing to back up.
    pub async fn create_backup(&self) -> Result<Option<PathBuf>, CoreError> {
        match tokio::fs::metadata(&self.data_path).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let backup_path = PathBuf::from(format!(
            "{}.backup_{}",
            self.data_path.display(),
            Utc::now().format("%Y%m%d_%H%M%S%.3f")
        ));
        tokio::fs::rename(&self.data_path, &backup_path).await?;
        info!("Created backup: {}", backup_path.display());
        Ok(Some(backup_path))
    }

    /// Rename a backup back over the target path.
    pub async fn restore_backup(&self, backup_path: &Path) -> Result<(), CoreError> {
        tokio::fs::rename(backup_path, &self.data_path).await?;
        info!("Restored backup file to {}", self.data_path.display());
        Ok(())
    }

    /// Remove a backup once the replacing snapshot is safely written.
    pub async fn discard_backup(&self, backup_path: &Path) {
        match tokio::fs::remove_file(backup_path).await {
            Ok(()) => info!("Removed backup file (scrape successful)"),
            Err(e) => warn!("Could not remove backup {}: {}", backup_path.display(), e),
        }
    }

    /// Serialize the corpus to the snapshot path. Returns the byte size of
    /// the written file.
    pub async fn write_snapshot(&self, corpus: &[Comment]) -> Result<u64, CoreError> {
        let json = serde_json::to_vec_pretty(corpus)?;
        let size = json.len() as u64;
        tokio::fs::write(&self.data_path, json).await?;
        info!(
            "Wrote {} comments ({} bytes) to {}",
            corpus.len(),
            size,
            self.data_path.display()
        );
        Ok(size)
    }

    pub async fn write_metadata(&self, metadata: &RunMetadata) -> Result<(), CoreError> {
        let json = serde_json::to_vec_pretty(metadata)?;
        tokio::fs::write(&self.metadata_path, json).await?;
        info!("Saved metadata to {}", self.metadata_path.display());
        Ok(())
    }

    /// Current size of the snapshot file, zero when absent.
    pub async fn snapshot_size(&self) -> u64 {
        tokio::fs::metadata(&self.data_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> SnapshotStore {
        let dir = std::env::temp_dir();
        SnapshotStore::new(
            dir.join(format!("loungewatch_store_{tag}_data.json")),
            dir.join(format!("loungewatch_store_{tag}_meta.json")),
        )
    }

    async fn cleanup(store: &SnapshotStore, backup: Option<&Path>) {
        tokio::fs::remove_file(store.data_path()).await.ok();
        tokio::fs::remove_file(store.metadata_path()).await.ok();
        if let Some(backup) = backup {
            tokio::fs::remove_file(backup).await.ok();
        }
    }

    #[tokio::test]
    async fn backup_of_missing_file_is_none() {
        let store = temp_store("missing");
        assert!(store.create_backup().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn backup_and_restore_round_trip() {
        let store = temp_store("roundtrip");
        tokio::fs::write(store.data_path(), b"original bytes")
            .await
            .unwrap();

        let backup = store.create_backup().await.unwrap().unwrap();
        assert!(tokio::fs::metadata(store.data_path()).await.is_err());
        assert!(tokio::fs::metadata(&backup).await.is_ok());

        store.restore_backup(&backup).await.unwrap();
        let restored = tokio::fs::read(store.data_path()).await.unwrap();
        assert_eq!(restored, b"original bytes");

        cleanup(&store, Some(&backup)).await;
    }

    #[tokio::test]
    async fn snapshot_size_is_zero_when_absent() {
        let store = temp_store("size");
        assert_eq!(store.snapshot_size().await, 0);
    }

    #[tokio::test]
    async fn write_snapshot_reports_byte_size() {
        let store = temp_store("write");
        let size = store.write_snapshot(&[]).await.unwrap();
        assert!(size > 0);
        assert_eq!(store.snapshot_size().await, size);
        cleanup(&store, None).await;
    }
}
