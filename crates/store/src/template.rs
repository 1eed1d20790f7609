//! The bundled default document template.
//!
//! Used to bootstrap a fresh install and as the last rung of the
//! load-recovery chain when both the primary and backup files are
//! unusable.

use storyloom_core::id::mint_unique_id;
use storyloom_core::node::{Node, TreeDocument, ROOT_ID};

/// Build the default starter document: a root with three empty sections.
pub fn default_template(id_length: usize) -> TreeDocument {
    let mut doc = TreeDocument::new("My Story");

    for title in ["Outline", "Chapters", "Notes"] {
        let ids = doc.collect_ids();
        let id = mint_unique_id(id_length, |candidate| ids.contains(candidate));
        doc.root
            .children
            .push(Node::new(id, title, Some(ROOT_ID.into())));
    }

    doc
}
