use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use skumatch::config::{OpenAiArgs, DEFAULT_EMBED_BATCH, DEFAULT_EMBED_MODEL};
use skumatch::logging::init_tracing;
use skumatch::{CatalogEmbeddingCache, CatalogMatch, EmbeddingMatcher, OpenAiEmbedder, Table};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "catalog-match",
    about = "Match each supply row to its closest catalog row by embedding similarity"
)]
struct MatchCli {
    /// Supply table (JSONL with Description, Quantity, and Price or Price per Unit)
    #[arg(long)]
    supply: PathBuf,

    /// Catalog table (JSONL with Description and Price)
    #[arg(long)]
    catalog: PathBuf,

    /// Output JSONL; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,

    /// Catalog embedding cache path (defaults to <catalog stem>.embeddings.json)
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Always recompute catalog embeddings and skip writing the cache
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    /// Embedding model identifier
    #[arg(long, env = "SKU_EMBED_MODEL", default_value = DEFAULT_EMBED_MODEL)]
    embed_model: String,

    /// Max descriptions per embedding request
    #[arg(long, env = "SKU_EMBED_BATCH", default_value_t = DEFAULT_EMBED_BATCH)]
    embed_batch: usize,

    #[command(flatten)]
    openai: OpenAiArgs,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = MatchCli::parse();

    let key = cli.openai.require_key()?;
    let embedder = OpenAiEmbedder::new(
        key,
        &cli.openai.openai_base,
        cli.embed_model.clone(),
        cli.openai.timeout(),
        cli.openai.max_attempts(),
        cli.embed_batch.max(1),
    )?;

    let supply = Table::read_jsonl(&cli.supply)?;
    let catalog = Table::read_jsonl(&cli.catalog)?;
    info!(
        supply = supply.len(),
        catalog = catalog.len(),
        batch = embedder.batch_size(),
        "tables loaded"
    );

    let cache = if cli.no_cache {
        None
    } else {
        Some(match &cli.cache {
            Some(path) => CatalogEmbeddingCache::new(
                cli.catalog.display().to_string(),
                path.clone(),
                cli.embed_model.clone(),
            ),
            None => CatalogEmbeddingCache::beside_catalog(&cli.catalog, cli.embed_model.clone()),
        })
    };

    let matcher = EmbeddingMatcher::new(embedder);
    let matches = matcher.match_to_catalog(&supply, &catalog, cache.as_ref())?;

    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_matches(BufWriter::new(file), &matches)?;
            info!(path = %path.display(), rows = matches.len(), "wrote matches");
        }
        None => write_matches(io::stdout().lock(), &matches)?,
    }
    Ok(())
}

fn write_matches<W: Write>(mut writer: W, matches: &[CatalogMatch]) -> Result<()> {
    for row in matches {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
