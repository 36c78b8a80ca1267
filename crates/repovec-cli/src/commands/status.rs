//! `repovec status` - checkpoint summary and collection counts.

use anyhow::Result;
use clap::Args;

use repovec_pipeline::CheckpointStore;

use crate::GlobalOptions;

use super::build_context;

#[derive(Args, Debug)]
pub struct StatusArgs {}

pub async fn run(global: &GlobalOptions, _args: StatusArgs) -> Result<()> {
    let context = build_context(global).await?;
    let config = &context.config;

    let checkpoint = CheckpointStore::new(config.checkpoint_path.clone());
    match checkpoint.get_info() {
        Some(info) => {
            println!("Checkpoint:");
            println!("  active repo:     {}", info.repo_id);
            println!("  language:        {}", info.language);
            println!("  files processed: {}", info.files_processed);
            println!("  chunks:          {}", info.chunks_processed);
            println!("  completed repos: {}", info.completed_repos);
        }
        None => println!("Checkpoint: none (no interrupted run)"),
    }

    println!("\nBackend: {}", config.backend);
    println!("Collections:");
    for name in config.collections.ingest_collections() {
        match context.backend.collection_stats(&name).await {
            Ok(stats) => println!(
                "  {:<24} {:>8} points  [{}]",
                name, stats.points_count, stats.status
            ),
            Err(err) => println!("  {:<24} unavailable ({})", name, err),
        }
    }
    Ok(())
}
