//! # Storyloom Core
//!
//! Domain types, traits, and error definitions for the Storyloom document
//! store. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The tree, its ids, the advisory lock registry, and the command protocol
//! types live here. Persistence, screening, assembly, and decoding live in
//! their respective crates. All crates depend inward on core.

pub mod command;
pub mod error;
pub mod id;
pub mod lock;
pub mod node;

// Re-export key types at crate root for ergonomics
pub use command::{Command, CommandHandler, CommandKind};
pub use error::{ContentError, Error, LockError, Result, TreeError};
pub use id::{mint_id, mint_unique_id, DEFAULT_ID_LENGTH};
pub use lock::{PathLockGuard, PathLocks};
pub use node::{Node, TreeDocument, DOCUMENT_VERSION, ROOT_ID};
