//! The authoritative tree store: persistence, recovery, and cached reads.
//!
//! One primary document file, one backup file. Every save captures the
//! last-known-good primary into the backup before overwriting, so a failed
//! write can restore it; every load falls back primary → backup → bundled
//! template before giving up with a corruption error.

use crate::template::default_template;
use crate::validate::validate;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use storyloom_config::AppConfig;
use storyloom_content::ContentStore;
use storyloom_core::error::{Error, Result, TreeError};
use storyloom_core::lock::PathLocks;
use storyloom_core::node::{Node, TreeDocument};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// The node tree store.
///
/// Owns the in-memory document cache; mutations (see `ops`) act on the
/// cache and [`save`](Self::save) persists it. No ambient singletons: the
/// store is constructed explicitly and passed to every collaborator.
pub struct TreeStore {
    pub(crate) tree_path: PathBuf,
    pub(crate) backup_path: PathBuf,
    pub(crate) id_length: usize,
    pub(crate) lock_wait: Duration,
    pub(crate) locks: Arc<PathLocks>,
    pub(crate) content: Arc<ContentStore>,
    pub(crate) cache: RwLock<Option<TreeDocument>>,
    // id → child-index path from root; rebuilt alongside every structural
    // change so lookups never traverse the whole tree.
    pub(crate) index: RwLock<HashMap<String, Vec<usize>>>,
    pub(crate) last_saved: RwLock<Option<DateTime<Utc>>>,
}

impl TreeStore {
    /// Create a store over the paths named by `config`.
    pub fn new(config: &AppConfig, locks: Arc<PathLocks>, content: Arc<ContentStore>) -> Self {
        Self {
            tree_path: config.storage.tree_path(),
            backup_path: config.storage.backup_path(),
            id_length: config.ids.length,
            lock_wait: Duration::from_millis(config.locks.wait_ms),
            locks,
            content,
            cache: RwLock::new(None),
            index: RwLock::new(HashMap::new()),
            last_saved: RwLock::new(None),
        }
    }

    /// Load the document, recovering via backup and template as needed.
    ///
    /// Only total failure of the primary → backup → template chain
    /// surfaces, as a fatal [`TreeError::Corruption`].
    pub async fn load(&self) -> Result<TreeDocument> {
        let _guard = self
            .locks
            .acquire(&self.tree_path, "tree-load", self.lock_wait)
            .await?;

        let doc = match self.read_document(&self.tree_path) {
            Ok(doc) => doc,
            Err(primary_err) => {
                warn!(
                    path = %self.tree_path.display(),
                    error = %primary_err,
                    "Primary document unusable, trying backup"
                );
                match self.read_document(&self.backup_path) {
                    Ok(doc) => {
                        info!("Recovered document from backup");
                        // Re-materialize the primary so the next load
                        // succeeds directly. Best-effort.
                        if let Err(e) = self.write_document(&self.tree_path, &doc) {
                            warn!(error = %e, "Could not rewrite primary from backup");
                        }
                        doc
                    }
                    Err(backup_err) => {
                        warn!(
                            error = %backup_err,
                            "Backup unusable, materializing default template"
                        );
                        let doc = default_template(self.id_length);
                        self.write_document(&self.tree_path, &doc).map_err(|e| {
                            TreeError::Corruption(format!(
                                "primary: {primary_err}; backup: {backup_err}; \
                                 template write failed: {e}"
                            ))
                        })?;
                        doc
                    }
                }
            }
        };

        *self.cache.write().await = Some(doc.clone());
        self.reindex(&doc).await;
        debug!(nodes = doc.node_count(), "Loaded tree document");
        Ok(doc)
    }

    /// Persist the cached document.
    pub async fn save(&self) -> Result<()> {
        let doc = self.cached().await?;
        self.save_document(&doc).await
    }

    /// Validate and persist `doc`, replacing the cache on success.
    ///
    /// The current primary is copied to the backup first; if the overwrite
    /// then fails, the primary is restored from that backup and the error
    /// surfaces — on disk the document is unchanged from the caller's
    /// perspective.
    pub async fn save_document(&self, doc: &TreeDocument) -> Result<()> {
        validate(doc).map_err(Error::Tree)?;

        let had_primary = self.tree_path.exists();
        if had_primary {
            std::fs::copy(&self.tree_path, &self.backup_path).map_err(|e| {
                TreeError::Storage(format!("Failed to capture backup before save: {e}"))
            })?;
        }

        let _guard = self
            .locks
            .acquire(&self.tree_path, "tree-save", self.lock_wait)
            .await?;

        if let Err(write_err) = self.write_document(&self.tree_path, doc) {
            if had_primary {
                match std::fs::copy(&self.backup_path, &self.tree_path) {
                    Ok(_) => warn!(error = %write_err, "Save failed; primary restored from backup"),
                    Err(restore_err) => warn!(
                        error = %write_err,
                        restore_error = %restore_err,
                        "Save failed and primary restore also failed"
                    ),
                }
            }
            return Err(Error::Tree(write_err));
        }

        *self.cache.write().await = Some(doc.clone());
        self.reindex(doc).await;
        *self.last_saved.write().await = Some(Utc::now());
        debug!(nodes = doc.node_count(), path = %self.tree_path.display(), "Saved tree document");
        Ok(())
    }

    /// Clone of the cached document.
    pub async fn document(&self) -> Result<TreeDocument> {
        self.cached().await
    }

    /// When the document was last successfully saved by this store.
    pub async fn last_saved(&self) -> Option<DateTime<Utc>> {
        *self.last_saved.read().await
    }

    /// Drop the in-memory cache; the next read must go through `load`.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
        self.index.write().await.clear();
    }

    /// Find a node by id via the index. `Ok(None)` for a missing id,
    /// never an error.
    pub async fn find(&self, id: &str) -> Result<Option<Node>> {
        let doc = self.cached().await?;
        let index = self.index.read().await;
        Ok(index
            .get(id)
            .and_then(|path| resolve(&doc.root, path))
            .cloned())
    }

    /// Find a node together with its direct parent (`None` for the root).
    pub async fn find_with_parent(&self, id: &str) -> Result<Option<(Node, Option<Node>)>> {
        let doc = self.cached().await?;
        let index = self.index.read().await;
        let Some(path) = index.get(id) else {
            return Ok(None);
        };
        let Some(node) = resolve(&doc.root, path) else {
            return Ok(None);
        };
        let parent = match path.split_last() {
            Some((_, prefix)) => resolve(&doc.root, prefix).cloned(),
            None => None,
        };
        Ok(Some((node.clone(), parent)))
    }

    /// Rebuild the id index from `doc`. Called after every structural
    /// change while the cache guard is still held.
    pub(crate) async fn reindex(&self, doc: &TreeDocument) {
        *self.index.write().await = build_index(doc);
    }

    /// Run structural validation on the cached document.
    pub async fn validate_cached(&self) -> Result<()> {
        let doc = self.cached().await?;
        validate(&doc).map_err(Error::Tree)
    }

    /// Full consistency check: structural validation plus blob-reference
    /// resolution. A dangling `text_hash` is tolerated at read time but is
    /// a validation failure here.
    pub async fn check_consistency(&self) -> Result<()> {
        let doc = self.cached().await?;
        validate(&doc).map_err(Error::Tree)?;

        let mut dangling: Vec<String> = Vec::new();
        doc.root.walk(&mut |node| {
            if let Some(hash) = &node.text_hash {
                if !self.content.exists(hash) {
                    dangling.push(format!("{} -> {hash}", node.id));
                }
            }
        });

        if dangling.is_empty() {
            Ok(())
        } else {
            Err(Error::Tree(TreeError::Validation(format!(
                "dangling blob references: {}",
                dangling.join(", ")
            ))))
        }
    }

    /// The content blob store this tree store routes bodies through.
    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    pub(crate) async fn cached(&self) -> Result<TreeDocument> {
        self.cache.read().await.clone().ok_or_else(|| {
            Error::Tree(TreeError::InvalidOperation(
                "no document loaded; call load() first".into(),
            ))
        })
    }

    fn read_document(&self, path: &Path) -> std::result::Result<TreeDocument, TreeError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TreeError::Storage(format!("Failed to read {}: {e}", path.display())))?;
        let doc: TreeDocument = serde_json::from_str(&text)
            .map_err(|e| TreeError::Corruption(format!("Failed to parse {}: {e}", path.display())))?;
        validate(&doc)?;
        Ok(doc)
    }

    fn write_document(
        &self,
        path: &Path,
        doc: &TreeDocument,
    ) -> std::result::Result<(), TreeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TreeError::Storage(format!("Failed to create data directory: {e}"))
            })?;
        }

        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| TreeError::Storage(format!("Failed to serialize document: {e}")))?;
        std::fs::write(path, json)
            .map_err(|e| TreeError::Storage(format!("Failed to write {}: {e}", path.display())))
    }
}

/// Map every id to its child-index path from the root.
fn build_index(doc: &TreeDocument) -> HashMap<String, Vec<usize>> {
    fn walk(node: &Node, path: &mut Vec<usize>, out: &mut HashMap<String, Vec<usize>>) {
        out.insert(node.id.clone(), path.clone());
        for (i, child) in node.children.iter().enumerate() {
            path.push(i);
            walk(child, path, out);
            path.pop();
        }
    }
    let mut out = HashMap::new();
    walk(&doc.root, &mut Vec::new(), &mut out);
    out
}

/// Follow a child-index path down from `root`.
fn resolve<'a>(root: &'a Node, path: &[usize]) -> Option<&'a Node> {
    let mut node = root;
    for &i in path {
        node = node.children.get(i)?;
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::store_in;
    use storyloom_core::node::ROOT_ID;
    use tempfile::tempdir;

    #[tokio::test]
    async fn fresh_install_materializes_template() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());

        let doc = store.load().await.unwrap();
        assert_eq!(doc.root.id, ROOT_ID);
        assert_eq!(doc.root.children.len(), 3);
        assert!(tmp.path().join("tree.json").exists());
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());

        store.load().await.unwrap();
        let id = store.create(ROOT_ID, "Chapter One", None, None).await.unwrap();
        store.save().await.unwrap();

        // A second store over the same paths sees the same tree.
        let store2 = store_in(tmp.path());
        let doc = store2.load().await.unwrap();
        assert_eq!(doc.find(&id).unwrap().title, "Chapter One");
        assert_eq!(doc.node_count(), 5);
    }

    #[tokio::test]
    async fn corrupt_primary_recovers_from_backup() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());

        store.load().await.unwrap();
        let id = store.create(ROOT_ID, "Kept", None, None).await.unwrap();
        store.save().await.unwrap();
        store.save().await.unwrap(); // second save captures the good state into the backup

        std::fs::write(tmp.path().join("tree.json"), "{ not json").unwrap();

        let store2 = store_in(tmp.path());
        let doc = store2.load().await.unwrap();
        assert!(doc.find(&id).is_some());
        // Primary was re-materialized from the backup.
        let store3 = store_in(tmp.path());
        assert!(store3.load().await.unwrap().find(&id).is_some());
    }

    #[tokio::test]
    async fn corrupt_primary_and_backup_fall_back_to_template() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("tree.json"), "garbage").unwrap();
        std::fs::write(tmp.path().join("tree.backup.json"), "also garbage").unwrap();

        let store = store_in(tmp.path());
        let doc = store.load().await.unwrap();
        assert_eq!(doc.root.children.len(), 3); // the template
    }

    #[tokio::test]
    async fn schema_invalid_document_is_rejected_at_load() {
        let tmp = tempdir().unwrap();
        // Parseable JSON, but missing the root field entirely.
        std::fs::write(tmp.path().join("tree.json"), r#"{"version":"1.0"}"#).unwrap();

        let store = store_in(tmp.path());
        // Falls through to the template rather than accepting the document.
        let doc = store.load().await.unwrap();
        assert_eq!(doc.root.id, ROOT_ID);
    }

    #[tokio::test]
    async fn save_validates_before_touching_disk() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        store.load().await.unwrap();
        store.save().await.unwrap();
        let before = std::fs::read_to_string(tmp.path().join("tree.json")).unwrap();

        let mut doc = store.document().await.unwrap();
        doc.root.id = "bogus".into();
        assert!(store.save_document(&doc).await.is_err());

        let after = std::fs::read_to_string(tmp.path().join("tree.json")).unwrap();
        assert_eq!(before, after);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_overwrite_leaves_primary_intact() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        store.load().await.unwrap();
        store.save().await.unwrap();

        let tree_path = tmp.path().join("tree.json");
        let before = std::fs::read_to_string(&tree_path).unwrap();

        // Make the primary unwritable so the overwrite fails after the
        // backup copy has already succeeded.
        let mut perms = std::fs::metadata(&tree_path).unwrap().permissions();
        perms.set_mode(0o444);
        std::fs::set_permissions(&tree_path, perms).unwrap();

        store.create(ROOT_ID, "Never lands", None, None).await.unwrap();
        let result = store.save().await;
        assert!(result.is_err());

        // Restore writability to read; the primary must be the pre-save
        // content, parseable, never truncated or mixed.
        let mut perms = std::fs::metadata(&tree_path).unwrap().permissions();
        perms.set_mode(0o644);
        std::fs::set_permissions(&tree_path, perms).unwrap();

        let after = std::fs::read_to_string(&tree_path).unwrap();
        assert_eq!(before, after);
        assert!(serde_json::from_str::<TreeDocument>(&after).is_ok());
    }

    #[tokio::test]
    async fn find_reports_missing_as_none() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        store.load().await.unwrap();
        assert!(store.find("deadbeef").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn operations_require_a_loaded_document() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        let err = store.find("anything").await.unwrap_err();
        assert!(err.to_string().contains("load"));
    }

    #[tokio::test]
    async fn consistency_check_flags_dangling_blob_refs() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        store.load().await.unwrap();

        let id = store
            .create(ROOT_ID, "Has content", Some("some body"), None)
            .await
            .unwrap();
        store.check_consistency().await.unwrap();

        // Point the node at a blob that does not exist.
        {
            let mut guard = store.cache.write().await;
            let doc = guard.as_mut().unwrap();
            let node = doc.root.find_mut(&id).unwrap();
            node.text_hash = Some("feedface".into());
        }
        assert!(store.check_consistency().await.is_err());
    }

    #[tokio::test]
    async fn invalidate_clears_cache() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        store.load().await.unwrap();
        store.invalidate().await;
        assert!(store.document().await.is_err());
    }
}
