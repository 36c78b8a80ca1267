//! `repovec search` - embed a query and retrieve top matches.

use anyhow::Result;
use clap::Args;

use repovec_embed::{EmbeddingClient, EmbeddingConfig};
use repovec_store::{ScoredPoint, SearchFilter};

use crate::GlobalOptions;

use super::build_context;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Natural-language query
    query: String,

    /// Search one collection (name or alias)
    #[arg(long, conflicts_with = "language")]
    collection: Option<String>,

    /// Search the collection mapped to one language tag
    #[arg(long)]
    language: Option<String>,

    /// Restrict hits to one repository
    #[arg(long)]
    repo: Option<String>,

    /// Maximum results
    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// Minimum similarity score
    #[arg(long)]
    threshold: Option<f32>,
}

pub async fn run(global: &GlobalOptions, args: SearchArgs) -> Result<()> {
    let context = build_context(global).await?;
    let config = &context.config;

    let embedder = EmbeddingClient::new(EmbeddingConfig {
        base_url: config.embedding.base_url.clone(),
        api_key: config.embedding.api_key.clone(),
        model: config.embedding.model.clone(),
        dimension: config.embedding.dimension,
        max_batch_size: config.batch_size.max(1),
        rate_limit: config.rate_limit,
        timeout_secs: config.request_timeout_secs,
        max_retries: config.max_retries,
    })?;

    let query_vector = embedder
        .embed(&[args.query.clone()])
        .await?
        .into_iter()
        .next()
        .unwrap_or_default();

    // One named collection, one language's collection, or all of them.
    let collections: Vec<String> = if let Some(ref name) = args.collection {
        vec![config.collections.resolve_name(name).to_string()]
    } else if let Some(ref tag) = args.language {
        match config.collections.for_language(tag) {
            Some(collection) => vec![collection.to_string()],
            None => anyhow::bail!("no collection configured for language '{}'", tag),
        }
    } else {
        config.collections.ingest_collections()
    };

    let filter = args.repo.as_ref().map(|repo| SearchFilter {
        repo_id: Some(repo.clone()),
        language: None,
    });

    let mut hits: Vec<(String, ScoredPoint)> = Vec::new();
    for collection in &collections {
        match context
            .backend
            .search(
                collection,
                &query_vector,
                args.limit,
                args.threshold,
                filter.clone(),
            )
            .await
        {
            Ok(results) => hits.extend(results.into_iter().map(|hit| (collection.clone(), hit))),
            Err(err) => tracing::debug!(collection = %collection, %err, "collection not searchable"),
        }
    }

    hits.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));
    hits.truncate(args.limit);

    if hits.is_empty() {
        println!("No matches.");
        return Ok(());
    }

    for (collection, hit) in &hits {
        let payload = &hit.payload;
        println!(
            "{:.3}  {}  {}:{}-{}  [{} {} in {}]",
            hit.score,
            payload.item_name,
            payload.file_path,
            payload.start_line,
            payload.end_line,
            payload.language,
            payload.item_type,
            collection,
        );
        let preview: String = payload.content.lines().take(3).collect::<Vec<_>>().join("\n    ");
        if !preview.is_empty() {
            println!("    {}", preview);
        }
    }
    Ok(())
}
