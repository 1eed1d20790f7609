//! The document tree — nodes, the tree document, and traversal helpers.
//!
//! `children` is the sole ownership structure: the tree is a tree, not a
//! graph. `parent_id` is a non-owning back-reference kept for lookup and
//! validation only; it is never used for traversal correctness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// The id of the single undeletable root node.
pub const ROOT_ID: &str = "root";

/// Schema version written into every persisted document.
pub const DOCUMENT_VERSION: &str = "1.0";

/// The complete document: one tree, serialized and persisted as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeDocument {
    /// Schema version of the serialized form.
    pub version: String,

    /// When this document was first created.
    pub created: DateTime<Utc>,

    /// The root node, owning all descendants.
    pub root: Node,
}

impl TreeDocument {
    /// Create a fresh document with an empty root node.
    pub fn new(root_title: impl Into<String>) -> Self {
        Self {
            version: DOCUMENT_VERSION.to_string(),
            created: Utc::now(),
            root: Node::new(ROOT_ID, root_title, None),
        }
    }

    /// Find a node by id via a single depth-first traversal.
    pub fn find(&self, id: &str) -> Option<&Node> {
        self.root.find(id)
    }

    /// Find a node together with its direct parent (`None` for the root).
    pub fn find_with_parent(&self, id: &str) -> Option<(&Node, Option<&Node>)> {
        if self.root.id == id {
            return Some((&self.root, None));
        }
        let parent = self.root.find_parent_of(id)?;
        let node = parent.children.iter().find(|c| c.id == id)?;
        Some((node, Some(parent)))
    }

    /// Collect every node id in the tree (used for collision-free minting).
    pub fn collect_ids(&self) -> HashSet<String> {
        let mut ids = HashSet::new();
        self.root.walk(&mut |node| {
            ids.insert(node.id.clone());
        });
        ids
    }

    /// Total number of nodes, root included.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.root.walk(&mut |_| count += 1);
        count
    }

    /// Depth of the deepest node; the root alone has depth 1.
    pub fn max_depth(&self) -> usize {
        fn depth(node: &Node) -> usize {
            1 + node.children.iter().map(depth).max().unwrap_or(0)
        }
        depth(&self.root)
    }
}

/// A single addressable entry in the document tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Opaque fixed-length lowercase hex token (or the literal `"root"`).
    pub id: String,

    /// Human-readable title.
    pub title: String,

    /// Non-owning back-reference to the parent's id. `None` for the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Owned children, in significant order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,

    /// Reference to this node's content blob, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_hash: Option<String>,

    /// When this node was created.
    pub created: DateTime<Utc>,

    /// When this node was last modified.
    pub modified: DateTime<Utc>,

    /// Open string-keyed metadata map.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Node {
    /// Construct a node with fresh timestamps and no children or content.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        parent_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            parent_id,
            children: Vec::new(),
            text_hash: None,
            created: now,
            modified: now,
            metadata: BTreeMap::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }

    /// Re-stamp the modification time.
    pub fn touch(&mut self) {
        self.modified = Utc::now();
    }

    /// Depth-first search for a node by id, including self.
    pub fn find(&self, id: &str) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    /// Mutable depth-first search for a node by id, including self.
    pub fn find_mut(&mut self, id: &str) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// Find the node whose `children` list contains `id`.
    pub fn find_parent_of(&self, id: &str) -> Option<&Node> {
        if self.children.iter().any(|c| c.id == id) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_parent_of(id))
    }

    /// Mutable variant of [`find_parent_of`](Self::find_parent_of).
    pub fn find_parent_of_mut(&mut self, id: &str) -> Option<&mut Node> {
        if self.children.iter().any(|c| c.id == id) {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|c| c.find_parent_of_mut(id))
    }

    /// Remove the node `id` from wherever it sits in this subtree and
    /// return it, preserving the order of its former siblings.
    pub fn detach(&mut self, id: &str) -> Option<Node> {
        let parent = self.find_parent_of_mut(id)?;
        let pos = parent.children.iter().position(|c| c.id == id)?;
        Some(parent.children.remove(pos))
    }

    /// Visit every node in this subtree depth-first, parents before children.
    pub fn walk(&self, f: &mut impl FnMut(&Node)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }
}
