//! `storyloom context` — Assemble generation context for a node.

use storyloom_config::AppConfig;
use storyloom_context::{ContextAssembler, Relation};

pub async fn run(id: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = super::open_store(&config);
    let doc = store.load().await?;

    let assembler = ContextAssembler::from_config(&config.context);
    let entries = assembler.node_context(&doc, store.content(), id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("(no context — neither the node nor its neighbors have content)");
        return Ok(());
    }

    for entry in &entries {
        let label = match entry.relation {
            Relation::Current => "current",
            Relation::Parent => "parent",
            Relation::Child => "child",
        };
        println!("--- {} ({label}) ---", entry.title);
        println!("{}\n", entry.content);
    }

    Ok(())
}
