//! Chain event replay driver.
//!
//! Feeds newline-delimited JSON chain events through the full indexing
//! pipeline against a real Elasticsearch backend, without a live node.
//! Each input line is one event tagged with its stream:
//!
//! ```text
//! {"stream":"accepted_block","block_num":1,"block_id":"...","validated":true,...}
//! {"stream":"applied_transaction","id":"...","status":"executed",...}
//! ```
//!
//! # Usage
//!
//! ```bash
//! scribe-index --input chain.jsonl --elastic-url http://localhost:9200
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use scribe_core::chain::{BlockStateEvent, TransactionMetadataEvent, TransactionTraceEvent};
use scribe_core::controller::SignalHub;
use scribe_index::{ElasticClient, IndexerConfig, IndexerPlugin};

/// Replay chain events from a JSONL file into the indexer pipeline.
#[derive(Parser, Debug)]
#[command(name = "scribe-index")]
#[command(about = "Replay chain events into the Elasticsearch indexer", long_about = None)]
#[command(version)]
struct Args {
    /// Input file of newline-delimited JSON chain events.
    #[arg(long, short)]
    input: PathBuf,

    /// Elasticsearch base URLs (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "http://localhost:9200")]
    elastic_url: Vec<String>,

    /// Index name.
    #[arg(long, default_value = "chain")]
    index_name: String,

    /// Suppress indexing below this block number.
    #[arg(long, default_value = "0")]
    start_block: u32,

    /// Soft bound on each stream queue.
    #[arg(long, default_value = "1024")]
    queue_size: usize,

    /// Bound on the ABI decoder cache.
    #[arg(long, default_value = "2048")]
    cache_size: usize,

    /// Keep an existing index instead of dropping it first.
    #[arg(long)]
    keep_index: bool,

    /// Path to .env file (optional).
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,
}

/// One replayed event, tagged by stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "stream", rename_all = "snake_case")]
enum ReplayEvent {
    AcceptedBlock(BlockStateEvent),
    IrreversibleBlock(BlockStateEvent),
    AcceptedTransaction(TransactionMetadataEvent),
    AppliedTransaction(TransactionTraceEvent),
}

fn main() -> Result<()> {
    let args = Args::parse();

    if std::path::Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)?;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!(
        input = %args.input.display(),
        urls = ?args.elastic_url,
        index = %args.index_name,
        "replaying chain events"
    );

    let client = ElasticClient::new(args.elastic_url.clone(), args.index_name.clone())?;
    let config = IndexerConfig {
        elastic_urls: args.elastic_url,
        index_name: args.index_name,
        max_queue_size: args.queue_size,
        abi_cache_size: args.cache_size,
        start_block_num: args.start_block,
        delete_index_on_startup: !args.keep_index,
        ..IndexerConfig::default()
    };

    let hub = SignalHub::new();
    let mut plugin = IndexerPlugin::new(config, client);
    plugin.initialize(&hub)?;
    plugin.start()?;

    let file = File::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let reader = BufReader::new(file);

    let mut replayed = 0usize;
    let mut skipped = 0usize;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ReplayEvent>(&line) {
            Ok(ReplayEvent::AcceptedBlock(bs)) => hub.emit_accepted_block(Arc::new(bs)),
            Ok(ReplayEvent::IrreversibleBlock(bs)) => hub.emit_irreversible_block(Arc::new(bs)),
            Ok(ReplayEvent::AcceptedTransaction(t)) => {
                hub.emit_accepted_transaction(Arc::new(t))
            }
            Ok(ReplayEvent::AppliedTransaction(t)) => hub.emit_applied_transaction(Arc::new(t)),
            Err(e) => {
                tracing::warn!(line = lineno + 1, error = %e, "skipping malformed event");
                skipped += 1;
                continue;
            }
        }
        replayed += 1;
    }

    plugin.shutdown();
    tracing::info!(replayed, skipped, "replay complete");
    Ok(())
}
