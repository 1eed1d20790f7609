//! `storyloom init` — First-time setup.

use storyloom_config::{config_dir, AppConfig};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = config_dir();
    let config_path = config_dir.join("config.toml");

    println!("📖 Storyloom — First-Time Setup");
    println!("===============================\n");

    // Create directories
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    // Create config file
    if config_path.exists() {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run init.\n");
    } else {
        let default_toml = AppConfig::default_toml();
        std::fs::write(&config_path, &default_toml)?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let data_dir = config.storage.data_dir.clone();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        std::fs::create_dir_all(config.storage.blobs_path())?;
        println!("✅ Created story workspace: {}", data_dir.display());
    } else {
        println!("  Story workspace exists: {}", data_dir.display());
    }

    // Materialize the tree (bootstraps the starter template if absent)
    let store = super::open_store(&config);
    let doc = store.load().await?;
    println!(
        "✅ Story tree ready: {} node(s) at {}",
        doc.node_count(),
        config.storage.tree_path().display()
    );

    println!("\n🎉 Setup complete! Run `storyloom show` to see your story outline.\n");

    Ok(())
}
