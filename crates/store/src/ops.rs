//! Structural mutations on the cached tree.
//!
//! Every operation either applies fully or not at all: validation and
//! blob writes happen before the tree is touched, and in-memory edits are
//! performed under the cache write guard so partial reads never observe a
//! half-applied state.

use crate::store::TreeStore;
use std::collections::{BTreeMap, HashSet};
use storyloom_core::error::{Error, Result, TreeError};
use storyloom_core::id::mint_unique_id;
use storyloom_core::node::{Node, TreeDocument, ROOT_ID};
use tracing::debug;

/// Fields that [`TreeStore::update`] can merge into a node.
#[derive(Debug, Default, Clone)]
pub struct NodeUpdate {
    /// Replace the title.
    pub title: Option<String>,
    /// Replace the node body (routed through the content blob store).
    pub content: Option<String>,
    /// Merge these entries into the metadata map.
    pub metadata: Option<BTreeMap<String, String>>,
}

impl TreeStore {
    /// Create a node under `parent_id`, optionally with initial content,
    /// at `position` (clamped; append when `None`). Returns the new id.
    pub async fn create(
        &self,
        parent_id: &str,
        title: &str,
        initial_content: Option<&str>,
        position: Option<usize>,
    ) -> Result<String> {
        let mut guard = self.cache.write().await;
        let doc = loaded(&mut guard)?;

        if doc.find(parent_id).is_none() {
            return Err(Error::Tree(TreeError::NotFound(parent_id.into())));
        }

        let ids = doc.collect_ids();
        let id = mint_unique_id(self.id_length, |candidate| ids.contains(candidate));

        // Blob first: a rejected body must not leave a node behind.
        let text_hash = match initial_content {
            Some(content) => Some(self.content.write(content, title).await?),
            None => None,
        };

        let mut node = Node::new(id.clone(), title, Some(parent_id.to_string()));
        node.text_hash = text_hash;

        let Some(parent) = doc.root.find_mut(parent_id) else {
            return Err(Error::Tree(TreeError::NotFound(parent_id.into())));
        };
        let pos = position
            .unwrap_or(parent.children.len())
            .min(parent.children.len());
        parent.children.insert(pos, node);
        parent.touch();
        self.reindex(doc).await;

        debug!(id, parent = parent_id, title, "Created node");
        Ok(id)
    }

    /// Merge `fields` into the node `id` and re-stamp its modification
    /// time. Content changes go through the content blob store.
    pub async fn update(&self, id: &str, fields: NodeUpdate) -> Result<()> {
        let mut guard = self.cache.write().await;
        let doc = loaded(&mut guard)?;

        let Some(node) = doc.find(id) else {
            return Err(Error::Tree(TreeError::NotFound(id.into())));
        };
        let existing_hash = node.text_hash.clone();
        let title_for_blob = fields.title.clone().unwrap_or_else(|| node.title.clone());

        // Blob work before the in-place merge, so a rejection applies
        // nothing.
        let new_hash = match (&fields.content, existing_hash) {
            (Some(content), Some(hash)) => {
                self.content.update(&hash, content).await?;
                Some(hash)
            }
            (Some(content), None) => Some(self.content.write(content, &title_for_blob).await?),
            (None, hash) => hash,
        };

        let Some(node) = doc.root.find_mut(id) else {
            return Err(Error::Tree(TreeError::NotFound(id.into())));
        };
        if let Some(title) = fields.title {
            node.title = title;
        }
        if let Some(metadata) = fields.metadata {
            node.metadata.extend(metadata);
        }
        node.text_hash = new_hash;
        node.touch();

        debug!(id, "Updated node");
        Ok(())
    }

    /// Delete the node `id` and its subtree, along with their blobs.
    /// The root node cannot be deleted.
    pub async fn delete(&self, id: &str) -> Result<()> {
        if id == ROOT_ID {
            return Err(Error::Tree(TreeError::Validation(
                "the root node cannot be deleted".into(),
            )));
        }

        let mut guard = self.cache.write().await;
        let doc = loaded(&mut guard)?;

        let Some(parent) = doc.root.find_parent_of_mut(id) else {
            return Err(Error::Tree(TreeError::NotFound(id.into())));
        };
        let Some(pos) = parent.children.iter().position(|c| c.id == id) else {
            return Err(Error::Tree(TreeError::NotFound(id.into())));
        };
        let removed = parent.children.remove(pos);
        parent.touch();

        // The whole subtree is gone; its blobs go with it.
        let mut hashes = Vec::new();
        removed.walk(&mut |node| {
            if let Some(hash) = &node.text_hash {
                hashes.push(hash.clone());
            }
        });
        for hash in hashes {
            self.content.delete(&hash).await?;
        }
        self.reindex(doc).await;

        debug!(id, "Deleted node");
        Ok(())
    }

    /// Move `id` under `new_parent_id` at `position` (clamped; append when
    /// `None`). Atomic with respect to the in-memory tree: the node is
    /// attached to exactly one parent at every observable point.
    pub async fn move_node(
        &self,
        id: &str,
        new_parent_id: &str,
        position: Option<usize>,
    ) -> Result<()> {
        if id == ROOT_ID {
            return Err(Error::Tree(TreeError::Validation(
                "the root node cannot be moved".into(),
            )));
        }

        let mut guard = self.cache.write().await;
        let doc = loaded(&mut guard)?;

        let Some(subtree) = doc.find(id) else {
            return Err(Error::Tree(TreeError::NotFound(id.into())));
        };
        // Covers new_parent_id == id as well: a node is in its own subtree.
        if subtree.find(new_parent_id).is_some() {
            return Err(Error::Tree(TreeError::Validation(format!(
                "cannot move '{id}' under its own subtree"
            ))));
        }
        if doc.find(new_parent_id).is_none() {
            return Err(Error::Tree(TreeError::NotFound(new_parent_id.into())));
        }

        // Both endpoints are validated; detach and reattach under the same
        // cache guard so no reader can observe the node parentless.
        let Some(mut node) = doc.root.detach(id) else {
            return Err(Error::Tree(TreeError::NotFound(id.into())));
        };
        node.parent_id = Some(new_parent_id.to_string());
        node.touch();

        let Some(new_parent) = doc.root.find_mut(new_parent_id) else {
            // Unreachable: the target was validated to exist outside the
            // detached subtree. Surface rather than drop the node.
            return Err(Error::Internal(format!(
                "move target '{new_parent_id}' vanished mid-operation"
            )));
        };
        let pos = position
            .unwrap_or(new_parent.children.len())
            .min(new_parent.children.len());
        new_parent.children.insert(pos, node);
        new_parent.touch();
        self.reindex(doc).await;

        debug!(id, new_parent = new_parent_id, "Moved node");
        Ok(())
    }

    /// Deep-copy the subtree at `id` under `new_parent_id`. Every cloned
    /// node gets a fresh id; content blobs are duplicated, never aliased.
    /// Returns the new subtree's root id.
    pub async fn copy(&self, id: &str, new_parent_id: &str, recursive: bool) -> Result<String> {
        let mut guard = self.cache.write().await;
        let doc = loaded(&mut guard)?;

        let Some(source) = doc.find(id) else {
            return Err(Error::Tree(TreeError::NotFound(id.into())));
        };
        if doc.find(new_parent_id).is_none() {
            return Err(Error::Tree(TreeError::NotFound(new_parent_id.into())));
        }

        // Phase 1: clone the structure with fresh ids, remembering which
        // cloned node needs which source blob.
        let mut taken = doc.collect_ids();
        let mut blob_jobs: Vec<(String, String)> = Vec::new();
        let mut clone = clone_subtree(
            source,
            new_parent_id,
            recursive,
            self.id_length,
            &mut taken,
            &mut blob_jobs,
        );
        let new_id = clone.id.clone();

        // Phase 2: duplicate blobs and patch the clones.
        for (clone_id, source_hash) in blob_jobs {
            let duplicated = self.content.duplicate(&source_hash).await?;
            if let Some(node) = clone.find_mut(&clone_id) {
                node.text_hash = duplicated;
            }
        }

        let Some(parent) = doc.root.find_mut(new_parent_id) else {
            return Err(Error::Tree(TreeError::NotFound(new_parent_id.into())));
        };
        parent.children.push(clone);
        parent.touch();
        self.reindex(doc).await;

        debug!(source = id, copy = new_id, recursive, "Copied subtree");
        Ok(new_id)
    }

    /// Merge the nodes named by `ids` into one new node titled
    /// `new_title`, parented where the first source was.
    ///
    /// Bodies are concatenated in `ids` order, each prefixed with its
    /// source title as a header. All children of all sources are
    /// reparented under the new node, concatenated in `ids` order. The
    /// sources are removed as the final step.
    pub async fn merge(&self, ids: &[String], new_title: &str) -> Result<String> {
        if ids.is_empty() {
            return Err(Error::Tree(TreeError::Validation(
                "merge requires at least one source node".into(),
            )));
        }
        if ids.iter().any(|id| id == ROOT_ID) {
            return Err(Error::Tree(TreeError::Validation(
                "the root node cannot be merged".into(),
            )));
        }
        let mut distinct = HashSet::new();
        if !ids.iter().all(|id| distinct.insert(id.as_str())) {
            return Err(Error::Tree(TreeError::Validation(
                "merge sources must be distinct".into(),
            )));
        }

        let mut guard = self.cache.write().await;
        let doc = loaded(&mut guard)?;

        // Validate all sources and collect their bodies before mutating.
        let mut segments: Vec<String> = Vec::new();
        for id in ids {
            let Some(node) = doc.find(id) else {
                return Err(Error::Tree(TreeError::NotFound(id.clone())));
            };
            if let Some(hash) = &node.text_hash {
                if let Some(body) = self.content.read(hash).await? {
                    segments.push(format!("## {}\n\n{}", node.title, body));
                }
            }
        }

        let Some(target_parent) = doc.root.find_parent_of(&ids[0]) else {
            return Err(Error::Tree(TreeError::NotFound(ids[0].clone())));
        };
        let target_parent_id = target_parent.id.clone();

        let merged_body = segments.join("\n\n");
        let text_hash = if merged_body.is_empty() {
            None
        } else {
            Some(self.content.write(&merged_body, new_title).await?)
        };

        let taken = doc.collect_ids();
        let new_id = mint_unique_id(self.id_length, |candidate| taken.contains(candidate));
        let mut merged = Node::new(new_id.clone(), new_title, Some(target_parent_id.clone()));
        merged.text_hash = text_hash;

        // Gather children out of the sources, in ids order, before the
        // sources themselves are removed.
        for id in ids {
            let Some(source) = doc.root.find_mut(id) else {
                return Err(Error::Tree(TreeError::NotFound(id.clone())));
            };
            let mut children = std::mem::take(&mut source.children);
            for child in &mut children {
                child.parent_id = Some(new_id.clone());
            }
            merged.children.extend(children);
        }

        let Some(parent) = doc.root.find_mut(&target_parent_id) else {
            return Err(Error::Tree(TreeError::NotFound(target_parent_id)));
        };
        parent.children.push(merged);
        parent.touch();

        // Final step: remove the now-empty sources and their blobs.
        for id in ids {
            if let Some(removed) = doc.root.detach(id) {
                if let Some(hash) = removed.text_hash {
                    self.content.delete(&hash).await?;
                }
            }
        }
        self.reindex(doc).await;

        debug!(sources = ids.len(), merged = new_id, "Merged nodes");
        Ok(new_id)
    }
}

/// Borrow the loaded document out of the cache guard.
fn loaded<'a>(
    guard: &'a mut tokio::sync::RwLockWriteGuard<'_, Option<TreeDocument>>,
) -> Result<&'a mut TreeDocument> {
    guard.as_mut().ok_or_else(|| {
        Error::Tree(TreeError::InvalidOperation(
            "no document loaded; call load() first".into(),
        ))
    })
}

/// Clone `source` with fresh ids. Blob duplication is deferred: each
/// cloned node that needs one is recorded in `blob_jobs` as
/// `(clone_id, source_hash)`.
fn clone_subtree(
    source: &Node,
    parent_id: &str,
    recursive: bool,
    id_length: usize,
    taken: &mut HashSet<String>,
    blob_jobs: &mut Vec<(String, String)>,
) -> Node {
    let id = mint_unique_id(id_length, |candidate| taken.contains(candidate));
    taken.insert(id.clone());

    let mut clone = Node::new(id.clone(), source.title.clone(), Some(parent_id.to_string()));
    clone.metadata = source.metadata.clone();
    if let Some(hash) = &source.text_hash {
        blob_jobs.push((id.clone(), hash.clone()));
    }

    if recursive {
        for child in &source.children {
            clone.children.push(clone_subtree(
                child, &id, recursive, id_length, taken, blob_jobs,
            ));
        }
    }

    clone
}
