//! `storyloom show` — Print the tree outline, or one node's content.

use storyloom_config::AppConfig;
use storyloom_core::node::Node;

pub async fn run(node_id: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = super::open_store(&config);
    let doc = store.load().await?;

    match node_id {
        Some(id) => {
            let Some(node) = doc.find(&id) else {
                println!("❌ No node with id {id}");
                return Ok(());
            };
            print_node(&store, node).await?;
        }
        None => {
            print_outline(&doc.root, 0);
        }
    }

    Ok(())
}

fn print_outline(node: &Node, depth: usize) {
    let marker = if node.text_hash.is_some() { "●" } else { "○" };
    println!("{}{} {} [{}]", "  ".repeat(depth), marker, node.title, node.id);
    for child in &node.children {
        print_outline(child, depth + 1);
    }
}

async fn print_node(
    store: &storyloom_store::TreeStore,
    node: &Node,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Title:     {}", node.title);
    println!("Id:        {}", node.id);
    if let Some(parent) = &node.parent_id {
        println!("Parent:    {parent}");
    }
    println!("Created:   {}", node.created.to_rfc3339());
    println!("Modified:  {}", node.modified.to_rfc3339());
    println!("Children:  {}", node.children.len());

    for (key, value) in &node.metadata {
        println!("  {key}: {value}");
    }

    match &node.text_hash {
        Some(hash) => match store.content().read(hash).await? {
            Some(body) => {
                if let Some(meta) = store.content().read_sidecar(hash) {
                    println!("Content:   {} chars, {} words", meta.char_count, meta.word_count);
                }
                println!("\n{body}");
            }
            None => println!("⚠️  Content blob {hash} is missing"),
        },
        None => println!("(no content)"),
    }

    Ok(())
}
