//! Node tree store — the authoritative document tree, its persistence,
//! and all structural mutation.
//!
//! Persistence guarantees: the primary file and its backup are each
//! independently parseable and schema-valid whenever no write is in
//! flight. Load recovers primary → backup → bundled template; save
//! captures the last-known-good primary into the backup before
//! overwriting and restores it if the overwrite fails.

pub mod ops;
pub mod store;
pub mod template;
pub mod validate;

pub use ops::NodeUpdate;
pub use store::TreeStore;
pub use template::default_template;
pub use validate::validate;
