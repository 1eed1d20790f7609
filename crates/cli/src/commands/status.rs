//! `storyloom status` — Show store status and stats.

use storyloom_config::{config_dir, AppConfig};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("📖 Storyloom Status");
    println!("==================");
    println!("  Config dir:   {}", config_dir().display());
    println!("  Data dir:     {}", config.storage.data_dir.display());
    println!("  Tree file:    {}", config.storage.tree_path().display());
    println!("  Blobs dir:    {}", config.storage.blobs_path().display());
    println!("  Id length:    {}", config.ids.length);
    println!("  Blob cap:     {} chars", config.content.max_chars);
    println!("  Lock wait:    {} ms", config.locks.wait_ms);

    if config.storage.tree_path().exists() {
        let store = super::open_store(&config);
        let doc = store.load().await?;
        let blobs = store.content().blob_count();

        println!("\n  Nodes:        {}", doc.node_count());
        println!("  Max depth:    {}", doc.max_depth());
        println!("  Blobs:        {blobs}");
        println!("\n  ✅ Story tree found");
    } else {
        println!("\n  ⚠️  No story tree — run `storyloom init` first");
    }

    Ok(())
}
