//! Elasticsearch chain-data indexer plugin.
//!
//! An asynchronous, backpressured ingestion pipeline: the controller's
//! signal emitter enqueues chain events onto four bounded stream queues,
//! and a single consumer thread drains them, decorates each record with
//! ABI-decoded payloads, and writes JSON documents to Elasticsearch.
//!
//! # Architecture
//!
//! ```text
//! controller signals ──► StreamQueues (4 bounded FIFOs, one lock)
//!                              │ drain
//!                              ▼
//!                     consumer thread ──► Processor ──► ElasticClient
//!                              │               │
//!                              │               ▼
//!                              └────────── AbiCache (LRU, store-backed)
//! ```
//!
//! Backpressure is adaptive: the producer sleeps longer as queues overrun
//! their bound and the sleep decays once the consumer catches up. Nothing
//! is dropped.

pub mod abi_cache;
pub mod client;
pub mod encode;
mod error;
pub mod mappings;
pub mod pipeline;
pub mod process;
pub mod queue;
pub mod store;

pub use client::ElasticClient;
pub use error::{Error, Result};
pub use pipeline::{IndexerConfig, IndexerPlugin, PipelineState};
pub use process::Processor;
pub use queue::{Drained, StreamQueues};
pub use store::{BulkBatch, BulkOp, DocKind, DocumentStore};
