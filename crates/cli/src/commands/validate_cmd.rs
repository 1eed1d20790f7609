//! `storyloom validate` — Check tree structure and blob consistency.

use storyloom_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("🩺 Storyloom Validate");
    println!("====================\n");

    if !config.storage.tree_path().exists() {
        println!("  ❌ No story tree — run `storyloom init` first");
        return Ok(());
    }

    let store = super::open_store(&config);
    let mut issues = 0;

    match store.load().await {
        Ok(doc) => {
            println!("  ✅ Tree file parses ({} nodes)", doc.node_count());

            match storyloom_store::validate(&doc) {
                Ok(()) => println!("  ✅ Structure valid (ids unique, parent links consistent)"),
                Err(e) => {
                    println!("  ❌ Structure invalid: {e}");
                    issues += 1;
                }
            }

            match store.check_consistency().await {
                Ok(()) => println!("  ✅ All content references resolve"),
                Err(e) => {
                    println!("  ❌ Content reference problem: {e}");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  ❌ Failed to load tree: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
