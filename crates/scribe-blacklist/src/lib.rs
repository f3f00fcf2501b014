//! Blacklist integrity checker plugin.
//!
//! Computes a canonical fingerprint over the node's configured actor
//! blacklist and reconciles it against two on-chain fingerprints: the
//! reference set published by the review body and the hash this producer
//! last submitted. Discrepancies are reported through
//! `POST /v1/blacklist/check_hash`.
//!
//! The reconciler is read-only: it consumes the controller's in-memory
//! configuration and on-chain table reads, and never contends with the
//! indexer pipeline.

pub mod config;
mod error;
pub mod hash;
pub mod plugin;
pub mod reconciler;
pub mod routes;
pub mod signature;

pub use config::BlacklistConfig;
pub use error::{Error, Result};
pub use hash::{blacklist_hash, canonical_serialization};
pub use plugin::BlacklistPlugin;
pub use reconciler::{CheckHashResult, Reconciler};
pub use routes::{AppState, router, serve};
pub use signature::{KeyPair, parse_signature_provider};
