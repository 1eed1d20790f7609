//! Context assembly — bounded neighborhood context for a node.
//!
//! The generation collaborator accepts a bounded amount of input and the
//! tree can be arbitrarily large, so a request never forwards the whole
//! document.
//! For a starting node this assembler collects: the node itself, its
//! ancestors nearest-first up to a depth bound, and its direct children in
//! stored order — each entry's content truncated to a per-entry cap, and
//! only nodes that actually have content contribute entries.

use serde::Serialize;
use storyloom_config::ContextConfig;
use storyloom_content::ContentStore;
use storyloom_core::error::{Error, Result, TreeError};
use storyloom_core::node::{Node, TreeDocument};
use tracing::debug;

/// How a context entry relates to the starting node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Current,
    Parent,
    Child,
}

/// One entry of assembled context.
#[derive(Debug, Clone, Serialize)]
pub struct ContextEntry {
    pub title: String,
    pub content: String,
    pub relation: Relation,
}

/// The context assembler. Stateless — create one and reuse it.
pub struct ContextAssembler {
    max_depth: usize,
    max_chars_per_entry: usize,
}

impl ContextAssembler {
    pub fn new(max_depth: usize, max_chars_per_entry: usize) -> Self {
        Self {
            max_depth,
            max_chars_per_entry,
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.max_depth, config.max_chars_per_entry)
    }

    /// Assemble context for the node named by `id`.
    ///
    /// Order: current node, then ancestors nearest-first, then direct
    /// children in stored order. Fails with `NotFound` for a missing id.
    pub async fn node_context(
        &self,
        doc: &TreeDocument,
        content: &ContentStore,
        id: &str,
    ) -> Result<Vec<ContextEntry>> {
        let Some(path) = path_to(&doc.root, id) else {
            return Err(Error::Tree(TreeError::NotFound(id.into())));
        };

        // `path` runs root → … → node; the node is last.
        let (node, ancestors) = match path.split_last() {
            Some((node, ancestors)) => (*node, ancestors),
            None => return Err(Error::Tree(TreeError::NotFound(id.into()))),
        };

        let mut entries = Vec::new();

        if let Some(entry) = self.entry_for(node, Relation::Current, content).await? {
            entries.push(entry);
        }

        // Ancestors nearest-first, bounded by max_depth hops.
        for ancestor in ancestors.iter().rev().take(self.max_depth) {
            if let Some(entry) = self.entry_for(ancestor, Relation::Parent, content).await? {
                entries.push(entry);
            }
        }

        // Exactly one level downward.
        for child in &node.children {
            if let Some(entry) = self.entry_for(child, Relation::Child, content).await? {
                entries.push(entry);
            }
        }

        debug!(id, entries = entries.len(), "Assembled node context");
        Ok(entries)
    }

    /// Build an entry for `node`, or `None` if it has no readable content.
    async fn entry_for(
        &self,
        node: &Node,
        relation: Relation,
        content: &ContentStore,
    ) -> Result<Option<ContextEntry>> {
        let Some(hash) = &node.text_hash else {
            return Ok(None);
        };
        // A dangling reference reads as absent and contributes nothing.
        let Some(body) = content.read(hash).await? else {
            return Ok(None);
        };
        if body.is_empty() {
            return Ok(None);
        }

        Ok(Some(ContextEntry {
            title: node.title.clone(),
            content: truncate_chars(&body, self.max_chars_per_entry),
            relation,
        }))
    }
}

/// The ownership path root → … → node, or `None` if `id` is absent.
fn path_to<'a>(root: &'a Node, id: &str) -> Option<Vec<&'a Node>> {
    if root.id == id {
        return Some(vec![root]);
    }
    for child in &root.children {
        if let Some(mut path) = path_to(child, id) {
            path.insert(0, root);
            return Some(path);
        }
    }
    None
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use storyloom_config::AppConfig;
    use storyloom_core::lock::PathLocks;
    use storyloom_core::node::ROOT_ID;
    use tempfile::tempdir;

    struct Fixture {
        doc: TreeDocument,
        content: ContentStore,
        _tmp: tempfile::TempDir,
    }

    /// root ("root notes") → a ("chapter text") → b ("scene text"),
    /// with b's children c ("beat one") and d (no content).
    async fn fixture() -> Fixture {
        let tmp = tempdir().unwrap();
        let config = AppConfig::default();
        let content = ContentStore::new(
            tmp.path().to_path_buf(),
            &config,
            Arc::new(PathLocks::new()),
        );

        let mut doc = TreeDocument::new("Story");
        doc.root.text_hash = Some(content.write("root notes", "Story").await.unwrap());

        let mut a = Node::new("aaaa0000", "Chapter", Some(ROOT_ID.into()));
        a.text_hash = Some(content.write("chapter text", "Chapter").await.unwrap());

        let mut b = Node::new("bbbb0000", "Scene", Some("aaaa0000".into()));
        b.text_hash = Some(content.write("scene text", "Scene").await.unwrap());

        let mut c = Node::new("cccc0000", "Beat", Some("bbbb0000".into()));
        c.text_hash = Some(content.write("beat one", "Beat").await.unwrap());
        let d = Node::new("dddd0000", "Empty Beat", Some("bbbb0000".into()));

        b.children.push(c);
        b.children.push(d);
        a.children.push(b);
        doc.root.children.push(a);

        Fixture {
            doc,
            content,
            _tmp: tmp,
        }
    }

    #[tokio::test]
    async fn orders_current_then_ancestors_then_children() {
        let fx = fixture().await;
        let assembler = ContextAssembler::new(3, 500);

        let entries = assembler
            .node_context(&fx.doc, &fx.content, "bbbb0000")
            .await
            .unwrap();

        let shape: Vec<(&str, Relation)> = entries
            .iter()
            .map(|e| (e.title.as_str(), e.relation))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("Scene", Relation::Current),
                ("Chapter", Relation::Parent), // nearest ancestor first
                ("Story", Relation::Parent),
                ("Beat", Relation::Child), // contentless child contributes nothing
            ]
        );
    }

    #[tokio::test]
    async fn max_depth_bounds_ancestor_walk() {
        let fx = fixture().await;
        let assembler = ContextAssembler::new(1, 500);

        let entries = assembler
            .node_context(&fx.doc, &fx.content, "bbbb0000")
            .await
            .unwrap();

        let parents: Vec<&str> = entries
            .iter()
            .filter(|e| e.relation == Relation::Parent)
            .map(|e| e.title.as_str())
            .collect();
        assert_eq!(parents, vec!["Chapter"]);
    }

    #[tokio::test]
    async fn content_truncated_per_entry() {
        let fx = fixture().await;
        let assembler = ContextAssembler::new(3, 5);

        let entries = assembler
            .node_context(&fx.doc, &fx.content, "bbbb0000")
            .await
            .unwrap();
        assert_eq!(entries[0].content, "scene");
        assert!(entries.iter().all(|e| e.content.chars().count() <= 5));
    }

    #[tokio::test]
    async fn children_limited_to_one_level() {
        let fx = fixture().await;
        let assembler = ContextAssembler::new(3, 500);

        // From the Chapter node, the Beat grandchild must not appear.
        let entries = assembler
            .node_context(&fx.doc, &fx.content, "aaaa0000")
            .await
            .unwrap();
        assert!(entries.iter().all(|e| e.title != "Beat"));
        assert!(entries
            .iter()
            .any(|e| e.title == "Scene" && e.relation == Relation::Child));
    }

    #[tokio::test]
    async fn missing_node_is_not_found() {
        let fx = fixture().await;
        let assembler = ContextAssembler::new(3, 500);
        let err = assembler
            .node_context(&fx.doc, &fx.content, "deadbeef")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Tree(TreeError::NotFound(_))));
    }

    #[tokio::test]
    async fn dangling_blob_reference_contributes_nothing() {
        let mut fx = fixture().await;
        fx.doc.root.find_mut("cccc0000").unwrap().text_hash = Some("feedface".into());

        let assembler = ContextAssembler::new(3, 500);
        let entries = assembler
            .node_context(&fx.doc, &fx.content, "bbbb0000")
            .await
            .unwrap();
        assert!(entries.iter().all(|e| e.title != "Beat"));
    }
}
