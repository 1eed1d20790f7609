//! Structural validation of a tree document.
//!
//! One walk checks everything: required fields per node, global id
//! uniqueness, and parent-link consistency (every non-root node's
//! `parent_id` must name the node that actually owns it).

use std::collections::HashSet;
use storyloom_core::error::TreeError;
use storyloom_core::node::{Node, TreeDocument, ROOT_ID};

/// Validate the invariants that must hold after every committed mutation.
pub fn validate(doc: &TreeDocument) -> Result<(), TreeError> {
    if doc.version.is_empty() {
        return Err(TreeError::Validation("document version is missing".into()));
    }

    if doc.root.id != ROOT_ID {
        return Err(TreeError::Validation(format!(
            "root node must have id '{ROOT_ID}', found '{}'",
            doc.root.id
        )));
    }

    if doc.root.parent_id.is_some() {
        return Err(TreeError::Validation("root node must have no parent".into()));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<(&Node, Option<&str>)> = vec![(&doc.root, None)];

    while let Some((node, parent_id)) = stack.pop() {
        if node.id.is_empty() {
            return Err(TreeError::Validation(format!(
                "node '{}' has an empty id",
                node.title
            )));
        }

        if !seen.insert(node.id.as_str()) {
            return Err(TreeError::Validation(format!(
                "duplicate node id '{}'",
                node.id
            )));
        }

        match (node.id.as_str(), parent_id) {
            (ROOT_ID, None) => {}
            (ROOT_ID, Some(_)) => {
                return Err(TreeError::Validation(
                    "a non-root node reuses the root id".into(),
                ));
            }
            (id, None) => {
                // Only reachable for the starting node, which is the root.
                return Err(TreeError::Validation(format!(
                    "node '{id}' sits at the root position"
                )));
            }
            (id, Some(actual_parent)) => {
                if node.parent_id.as_deref() != Some(actual_parent) {
                    return Err(TreeError::Validation(format!(
                        "node '{id}' records parent {:?} but is owned by '{actual_parent}'",
                        node.parent_id
                    )));
                }
            }
        }

        for child in &node.children {
            stack.push((child, Some(&node.id)));
        }
    }

    Ok(())
}
