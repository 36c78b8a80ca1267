//! `repovec collections` - show the resolved collection map.

use anyhow::Result;
use clap::Args;

use crate::GlobalOptions;

use super::build_context;

#[derive(Args, Debug)]
pub struct CollectionsArgs {
    /// Also list what actually exists in the backend
    #[arg(long)]
    remote: bool,
}

pub async fn run(global: &GlobalOptions, args: CollectionsArgs) -> Result<()> {
    let context = build_context(global).await?;
    let collections = &context.config.collections;

    println!("Language collections:");
    for tag in collections.languages() {
        if let Some(name) = collections.for_language(tag) {
            println!("  {:<12} -> {}", tag, name);
        }
    }
    println!("Default collection: {}", collections.default_collection());
    match collections.mixed() {
        Some(mixed) => println!("Mixed collection:   {}", mixed),
        None => println!("Mixed collection:   (not configured)"),
    }

    if args.remote {
        println!("\nBackend collections:");
        for name in context.backend.list_collections().await? {
            println!("  {}", name);
        }
    }
    Ok(())
}
