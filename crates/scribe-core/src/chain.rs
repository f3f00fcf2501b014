//! Chain event payloads emitted by the controller.
//!
//! These are the four event shapes the indexer subscribes to: accepted
//! blocks, irreversible blocks, accepted transactions, and applied
//! transaction traces. Events are handed to subscribers behind `Arc`s; the
//! last processing buffer to drop its handle releases the payload.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::name::Name;

/// An opaque 256-bit identifier, rendered as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Checksum256(pub [u8; 32]);

impl Checksum256 {
    /// Deterministic identifier carrying a block number in its first bytes,
    /// the way block ids embed their height.
    pub fn from_block_num(block_num: u32) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..4].copy_from_slice(&block_num.to_be_bytes());
        Checksum256(bytes)
    }
}

impl fmt::Display for Checksum256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Checksum256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum256({self})")
    }
}

impl FromStr for Checksum256 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = hex::decode(s).map_err(|e| Error::Stream(format!("bad checksum hex: {e}")))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| Error::Stream("checksum must be 32 bytes".into()))?;
        Ok(Checksum256(bytes))
    }
}

impl Serialize for Checksum256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Checksum256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Serialize `Vec<u8>` fields as lowercase hex strings.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &[u8],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

/// An authorization carried by an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: Name,
    pub permission: Name,
}

/// A single contract action with its opaque binary payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub account: Name,
    pub name: Name,
    #[serde(default)]
    pub authorization: Vec<PermissionLevel>,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

/// A signed transaction as carried in blocks and metadata events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Expiration, seconds since epoch.
    pub expiration: u32,
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub signatures: Vec<String>,
}

/// Execution status of a transaction within a block or trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Executed,
    SoftFail,
    HardFail,
    Delayed,
    Expired,
}

impl TransactionStatus {
    /// True only for successfully applied transactions.
    pub fn succeeded(self) -> bool {
        matches!(self, TransactionStatus::Executed)
    }
}

/// A transaction and its receipt as ordered inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub status: TransactionStatus,
    pub cpu_usage_us: u32,
    pub net_usage_words: u32,
    pub trx: SignedTransaction,
}

/// The block payload contained in a block state event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlock {
    pub previous: Checksum256,
    /// Block timestamp, seconds since epoch.
    pub timestamp: u32,
    pub producer: Name,
    #[serde(default)]
    pub transactions: Vec<TransactionReceipt>,
}

/// Emitted by the controller on every accepted block, and again (with the
/// same shape) once the block becomes irreversible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStateEvent {
    pub block_num: u32,
    pub block_id: Checksum256,
    pub validated: bool,
    pub in_current_chain: bool,
    /// Opaque header state the controller attaches; indexed verbatim.
    #[serde(default)]
    pub block_header_state: serde_json::Value,
    pub block: SignedBlock,
}

/// Emitted when a transaction is accepted, before application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMetadataEvent {
    pub id: Checksum256,
    pub trx: SignedTransaction,
}

/// Receipt produced for one executed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReceipt {
    pub receiver: Name,
    pub global_sequence: u64,
    pub recv_sequence: u64,
}

/// Trace of one executed action, with any inline actions it spawned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTrace {
    pub receipt: ActionReceipt,
    pub act: Action,
    pub elapsed_us: u64,
    #[serde(default)]
    pub console: String,
    #[serde(default)]
    pub inline_traces: Vec<ActionTrace>,
}

/// Emitted when a transaction is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTraceEvent {
    pub id: Checksum256,
    pub status: TransactionStatus,
    pub elapsed_us: u64,
    pub net_usage_words: u32,
    pub action_traces: Vec<ActionTrace>,
}
