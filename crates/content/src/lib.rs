//! Content blob store — durable, screened, size-bounded node bodies.
//!
//! Each blob is a plain text file named by an opaque id, with an optional
//! JSON metadata sidecar. Every write passes the safety screen, formatting
//! normalization, and size-bound enforcement before any file is touched:
//! a rejected write never leaves a partial blob on disk.
//!
//! Writers serialize through the shared advisory path-lock registry, the
//! same discipline the tree store uses for its document file.

pub mod meta;
pub mod normalize;
pub mod safety;

pub use meta::BlobMeta;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use storyloom_config::{AppConfig, ContentConfig};
use storyloom_core::error::{ContentError, Error, Result};
use storyloom_core::id::mint_unique_id;
use storyloom_core::lock::PathLocks;
use tracing::{debug, warn};

/// The content blob store.
///
/// Cheap to clone behind an `Arc`; all state lives on disk apart from the
/// shared lock registry.
pub struct ContentStore {
    dir: PathBuf,
    config: ContentConfig,
    id_length: usize,
    lock_wait: Duration,
    locks: Arc<PathLocks>,
}

impl ContentStore {
    /// Create a store rooted at `dir` (created lazily on first write).
    pub fn new(dir: PathBuf, config: &AppConfig, locks: Arc<PathLocks>) -> Self {
        Self {
            dir,
            config: config.content.clone(),
            id_length: config.ids.length,
            lock_wait: Duration::from_millis(config.locks.wait_ms),
            locks,
        }
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.txt"))
    }

    fn sidecar_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.meta.json"))
    }

    fn backup_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.bak"))
    }

    /// Screen, normalize, and bound-check `content`; returns the
    /// normalized text that is safe to persist.
    fn prepare(&self, content: &str) -> Result<String> {
        safety::screen(content)?;
        let normalized = normalize::normalize(content, &self.config);
        self.enforce_bounds(&normalized)?;
        Ok(normalized)
    }

    fn enforce_bounds(&self, content: &str) -> Result<()> {
        let chars = content.chars().count();
        if chars > self.config.max_chars {
            return Err(ContentError::Validation(format!(
                "content is {chars} characters, maximum is {}",
                self.config.max_chars
            ))
            .into());
        }

        let lines = content.lines().count();
        if lines > self.config.max_lines {
            return Err(ContentError::Validation(format!(
                "content is {lines} lines, maximum is {}",
                self.config.max_lines
            ))
            .into());
        }

        for (i, line) in content.lines().enumerate() {
            let len = line.chars().count();
            if len > self.config.max_line_chars {
                return Err(ContentError::Validation(format!(
                    "line {} is {len} characters, maximum is {}",
                    i + 1,
                    self.config.max_line_chars
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Write new content and return its freshly minted blob id.
    ///
    /// `title` is advisory (the owning node's title) and used for logging
    /// only. Rejection leaves no file at the candidate path.
    pub async fn write(&self, content: &str, title: &str) -> Result<String> {
        let normalized = self.prepare(content)?;

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| ContentError::Storage(format!("Failed to create blob directory: {e}")))?;

        let id = mint_unique_id(self.id_length, |candidate| {
            self.blob_path(candidate).exists()
        });
        let path = self.blob_path(&id);

        let _guard = self.locks.acquire(&path, "blob-write", self.lock_wait).await?;

        std::fs::write(&path, &normalized)
            .map_err(|e| ContentError::Storage(format!("Failed to write blob {id}: {e}")))?;

        if self.config.write_sidecars {
            self.write_sidecar(&id, &BlobMeta::new(&normalized))?;
        }

        debug!(id, title, chars = normalized.chars().count(), "Wrote content blob");
        Ok(id)
    }

    /// Replace an existing blob's content in place.
    ///
    /// The old version is backed up before the write and restored if the
    /// write fails; the backup is discarded only after success.
    pub async fn update(&self, id: &str, new_content: &str) -> Result<()> {
        let normalized = self.prepare(new_content)?;

        let path = self.blob_path(id);
        let backup = self.backup_path(id);

        let _guard = self.locks.acquire(&path, "blob-update", self.lock_wait).await?;

        let had_previous = path.exists();
        if had_previous {
            std::fs::copy(&path, &backup).map_err(|e| {
                ContentError::Storage(format!("Failed to back up blob {id}: {e}"))
            })?;
        }

        if let Err(e) = std::fs::write(&path, &normalized) {
            if had_previous {
                match std::fs::copy(&backup, &path) {
                    Ok(_) => debug!(id, "Restored blob from backup after failed update"),
                    Err(restore_err) => {
                        warn!(id, error = %restore_err, "Failed to restore blob backup")
                    }
                }
            }
            return Err(ContentError::Storage(format!("Failed to update blob {id}: {e}")).into());
        }

        if self.config.write_sidecars {
            let meta = match self.read_sidecar(id) {
                Some(previous) => previous.refreshed(&normalized),
                None => BlobMeta::new(&normalized),
            };
            self.write_sidecar(id, &meta)?;
        }

        if had_previous {
            let _ = std::fs::remove_file(&backup);
        }

        debug!(id, chars = normalized.chars().count(), "Updated content blob");
        Ok(())
    }

    /// Read a blob's content. A missing id is `Ok(None)`, never an error:
    /// callers treat absence as "no content yet".
    pub async fn read(&self, id: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.blob_path(id)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ContentError::Storage(format!("Failed to read blob {id}: {e}")).into()),
        }
    }

    /// Delete a blob and its sidecar. Missing files are tolerated.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = self.blob_path(id);
        let _guard = self.locks.acquire(&path, "blob-delete", self.lock_wait).await?;

        for target in [path, self.sidecar_path(id), self.backup_path(id)] {
            match std::fs::remove_file(&target) {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(
                        ContentError::Storage(format!("Failed to delete blob {id}: {e}")).into(),
                    );
                }
            }
        }

        debug!(id, "Deleted content blob");
        Ok(())
    }

    /// Duplicate a blob under a fresh id (used by subtree copy — cloned
    /// nodes must never alias the original's content).
    ///
    /// Returns `Ok(None)` if the source blob does not exist; a dangling
    /// reference is tolerated at read time.
    pub async fn duplicate(&self, id: &str) -> Result<Option<String>> {
        let Some(content) = self.read(id).await? else {
            warn!(id, "Duplicate requested for missing blob");
            return Ok(None);
        };

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| ContentError::Storage(format!("Failed to create blob directory: {e}")))?;

        let new_id = mint_unique_id(self.id_length, |candidate| {
            self.blob_path(candidate).exists()
        });
        let path = self.blob_path(&new_id);

        let _guard = self.locks.acquire(&path, "blob-duplicate", self.lock_wait).await?;

        std::fs::write(&path, &content)
            .map_err(|e| ContentError::Storage(format!("Failed to duplicate blob {id}: {e}")))?;

        if self.config.write_sidecars {
            self.write_sidecar(&new_id, &BlobMeta::new(&content))?;
        }

        debug!(source = id, duplicate = new_id, "Duplicated content blob");
        Ok(Some(new_id))
    }

    /// Whether a blob file exists for `id` (used by consistency checks).
    pub fn exists(&self, id: &str) -> bool {
        self.blob_path(id).exists()
    }

    /// Read a blob's sidecar metadata, if present and parseable.
    pub fn read_sidecar(&self, id: &str) -> Option<BlobMeta> {
        let content = std::fs::read_to_string(self.sidecar_path(id)).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn write_sidecar(&self, id: &str, meta: &BlobMeta) -> Result<()> {
        let json = serde_json::to_string_pretty(meta).map_err(Error::Serialization)?;
        std::fs::write(self.sidecar_path(id), json)
            .map_err(|e| ContentError::Storage(format!("Failed to write sidecar for {id}: {e}")))?;
        Ok(())
    }

    /// Number of blob files currently on disk.
    pub fn blob_count(&self) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return 0;
        };
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "txt"))
            .count()
    }

    /// The configured maximum character count (shared with the protocol
    /// codec's message-length governance).
    pub fn max_chars(&self) -> usize {
        self.config.max_chars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(dir: &std::path::Path) -> ContentStore {
        ContentStore::new(dir.to_path_buf(), &AppConfig::default(), Arc::new(PathLocks::new()))
    }

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let tmp = tempdir().unwrap();
        let store = store(tmp.path());

        let id = store
            .write("It was a dark and stormy night.", "Opening")
            .await
            .unwrap();
        assert_eq!(id.len(), 8);

        let content = store.read(&id).await.unwrap().unwrap();
        assert_eq!(content, "It was a dark and stormy night.");
    }

    #[tokio::test]
    async fn missing_blob_reads_as_none() {
        let tmp = tempdir().unwrap();
        let store = store(tmp.path());
        assert!(store.read("deadbeef").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversize_content_rejected_with_no_file() {
        let tmp = tempdir().unwrap();
        let store = store(tmp.path());

        let huge = "x".repeat(3000);
        let err = store.write(&huge, "Too big").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Content(ContentError::Validation(_))
        ));

        // No partial file was created anywhere under the blob dir.
        assert_eq!(store.blob_count(), 0);
    }

    #[tokio::test]
    async fn overlong_line_rejected() {
        let tmp = tempdir().unwrap();
        let store = store(tmp.path());

        let content = format!("short\n{}\nshort", "y".repeat(250));
        assert!(store.write(&content, "Lines").await.is_err());
        assert_eq!(store.blob_count(), 0);
    }

    #[tokio::test]
    async fn unsafe_content_rejected_with_no_file() {
        let tmp = tempdir().unwrap();
        let store = store(tmp.path());

        let err = store
            .write("great stuff; rm -rf /", "Evil")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Content(ContentError::SafetyRejected { .. })
        ));
        assert_eq!(store.blob_count(), 0);
    }

    #[tokio::test]
    async fn content_is_normalized_on_write() {
        let tmp = tempdir().unwrap();
        let store = store(tmp.path());

        let id = store.write("hello   \r\nworld\n\n\n\n\nend", "Norm").await.unwrap();
        let content = store.read(&id).await.unwrap().unwrap();
        assert_eq!(content, "hello\nworld\n\n\nend");
    }

    #[tokio::test]
    async fn update_replaces_and_cleans_backup() {
        let tmp = tempdir().unwrap();
        let store = store(tmp.path());

        let id = store.write("first draft", "Draft").await.unwrap();
        store.update(&id, "second draft").await.unwrap();

        assert_eq!(store.read(&id).await.unwrap().unwrap(), "second draft");
        assert!(!tmp.path().join(format!("{id}.bak")).exists());
    }

    #[tokio::test]
    async fn update_rejection_leaves_original_intact() {
        let tmp = tempdir().unwrap();
        let store = store(tmp.path());

        let id = store.write("the original", "Draft").await.unwrap();
        let err = store.update(&id, &"z".repeat(5000)).await.unwrap_err();
        assert!(matches!(err, Error::Content(ContentError::Validation(_))));

        assert_eq!(store.read(&id).await.unwrap().unwrap(), "the original");
    }

    #[tokio::test]
    async fn sidecar_written_and_refreshed() {
        let tmp = tempdir().unwrap();
        let store = store(tmp.path());

        let id = store.write("one two three", "Meta").await.unwrap();
        let meta = store.read_sidecar(&id).unwrap();
        assert_eq!(meta.word_count, 3);

        store.update(&id, "now four words here").await.unwrap();
        let refreshed = store.read_sidecar(&id).unwrap();
        assert_eq!(refreshed.word_count, 4);
        assert_eq!(refreshed.created, meta.created);
    }

    #[tokio::test]
    async fn delete_removes_blob_and_sidecar() {
        let tmp = tempdir().unwrap();
        let store = store(tmp.path());

        let id = store.write("doomed", "Gone").await.unwrap();
        store.delete(&id).await.unwrap();

        assert!(store.read(&id).await.unwrap().is_none());
        assert!(store.read_sidecar(&id).is_none());
        // Deleting again is fine.
        store.delete(&id).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_mints_fresh_id_and_copies() {
        let tmp = tempdir().unwrap();
        let store = store(tmp.path());

        let id = store.write("shared prose", "Src").await.unwrap();
        let copy = store.duplicate(&id).await.unwrap().unwrap();
        assert_ne!(copy, id);
        assert_eq!(store.read(&copy).await.unwrap().unwrap(), "shared prose");

        // The copies are independent files.
        store.update(&copy, "diverged").await.unwrap();
        assert_eq!(store.read(&id).await.unwrap().unwrap(), "shared prose");
    }

    #[tokio::test]
    async fn duplicate_of_missing_blob_is_none() {
        let tmp = tempdir().unwrap();
        let store = store(tmp.path());
        assert!(store.duplicate("deadbeef").await.unwrap().is_none());
    }
}
