//! CLI subcommand implementations.

pub mod context_cmd;
pub mod init;
pub mod show;
pub mod status;
pub mod validate_cmd;

use std::sync::Arc;
use storyloom_config::AppConfig;
use storyloom_content::ContentStore;
use storyloom_core::lock::PathLocks;
use storyloom_store::TreeStore;

/// Wire the store stack together from loaded config.
pub(crate) fn open_store(config: &AppConfig) -> TreeStore {
    let locks = Arc::new(PathLocks::new());
    let content = Arc::new(ContentStore::new(
        config.storage.blobs_path(),
        config,
        locks.clone(),
    ));
    TreeStore::new(config, locks, content)
}
