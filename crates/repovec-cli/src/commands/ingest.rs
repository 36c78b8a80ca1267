//! `repovec ingest` - run the ingestion pipeline.

use anyhow::{bail, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use repovec_pipeline::{IngestStats, Pipeline};

use crate::GlobalOptions;

use super::build_context;

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Start from scratch instead of resuming from the checkpoint
    #[arg(long)]
    no_resume: bool,

    /// Restrict the run to these repository ids (repeatable)
    #[arg(long = "repo", value_name = "ID")]
    repos: Vec<String>,
}

pub async fn run(global: &GlobalOptions, args: IngestArgs) -> Result<()> {
    let context = build_context(global).await?;

    let mut repositories = context.repositories;
    if !args.repos.is_empty() {
        repositories.retain(|r| args.repos.iter().any(|id| id == &r.id));
        let missing: Vec<&String> = args
            .repos
            .iter()
            .filter(|id| !repositories.iter().any(|r| &&r.id == id))
            .collect();
        if !missing.is_empty() {
            bail!("unknown repository ids: {:?}", missing);
        }
    }
    if repositories.is_empty() {
        bail!("no repositories configured; provide a repos config file");
    }

    let pipeline = Pipeline::new(context.config, context.backend)?;

    // Ctrl-C cancels cooperatively: in-flight batches drain, the
    // checkpoint stays durable.
    let cancel = pipeline.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing in-flight work");
            cancel.cancel();
        }
    });

    let spinner = if global.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!("ingesting {} repositories", repositories.len()));
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        bar
    };

    let stats = pipeline.ingest(&repositories, !args.no_resume).await?;
    spinner.finish_and_clear();

    print_summary(&stats);
    Ok(())
}

fn print_summary(stats: &IngestStats) {
    println!();
    if stats.cancelled {
        println!("Run cancelled; progress is checkpointed.");
    }
    println!(
        "Repositories: {} processed, {} failed",
        stats.repos_processed, stats.repos_failed
    );

    if !stats.files_by_language.is_empty() {
        println!("Files by language:");
        for (language, count) in &stats.files_by_language {
            println!("  {:<12} {}", language, count);
        }
    }
    if stats.files_skipped > 0 {
        println!("Files skipped: {}", stats.files_skipped);
    }

    if !stats.chunks_by_collection.is_empty() {
        println!("Chunks stored by collection:");
        for (collection, count) in &stats.chunks_by_collection {
            println!("  {:<24} {}", collection, count);
        }
    }
    if !stats.chunks_by_domain.is_empty() {
        println!("Chunks by business domain:");
        for (domain, count) in &stats.chunks_by_domain {
            println!("  {:<12} {}", domain, count);
        }
    }
    println!("Total chunks stored: {}", stats.chunks_stored);

    if !stats.errors.is_empty() {
        println!("\nErrors ({}):", stats.errors.len());
        for error in &stats.errors {
            println!("  {}: {}", error.path, error.cause);
        }
    }
}
