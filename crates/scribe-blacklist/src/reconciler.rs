//! Blacklist hash reconciliation.
//!
//! Compares three fingerprints of the actor blacklist: the one computed
//! from the node's own configuration, the reference set published on chain
//! by the review body, and the hash this producer last submitted. The
//! on-chain data lives in two tables under the blacklist contract.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use scribe_core::controller::{ChainReader, TableQuery};

use crate::config::BlacklistConfig;
use crate::error::Result;
use crate::hash::blacklist_hash;

/// Row limit for on-chain table reads.
const TABLE_ROW_LIMIT: u32 = 100;

/// Row `type` marking actor blacklist entries in the contract table.
const ACTOR_BLACKLIST_TYPE: &str = "actor-blacklist";

/// Outcome of a blacklist hash check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckHashResult {
    pub local_hash: String,
    pub onchain_hash: String,
    pub submitted_hash: String,
    pub msg: String,
}

/// Read-only reconciliation engine.
pub struct Reconciler {
    reader: Arc<dyn ChainReader>,
    contract: String,
    producer: Option<String>,
}

impl Reconciler {
    pub fn new(reader: Arc<dyn ChainReader>, config: &BlacklistConfig) -> Self {
        Reconciler {
            reader,
            contract: config.contract.clone(),
            producer: config.producer_name.clone(),
        }
    }

    /// Compute all three fingerprints and the verdict.
    pub fn check_hash(&self) -> Result<CheckHashResult> {
        let local_accounts = self.reader.actor_blacklist();
        let local_hash = blacklist_hash(&local_accounts);

        let onchain_accounts = self.onchain_blacklist()?;
        let onchain_hash = blacklist_hash(&onchain_accounts);

        let submitted_hash = self.submitted_hash()?;

        let msg = if local_hash != onchain_hash {
            "local and ecaf hash MISMATCH!"
        } else if local_hash != submitted_hash {
            "local and submitted hash MISMATCH!"
        } else {
            "OK"
        };

        Ok(CheckHashResult {
            local_hash,
            onchain_hash,
            submitted_hash,
            msg: msg.to_owned(),
        })
    }

    /// The reference account set: rows of type `actor-blacklist` in the
    /// contract's own table, flattened.
    fn onchain_blacklist(&self) -> Result<Vec<String>> {
        let query = TableQuery::new(
            self.contract.clone(),
            self.contract.clone(),
            self.contract.clone(),
            TABLE_ROW_LIMIT,
        );
        let rows = self.reader.get_table_rows(&query)?;
        let mut accounts = Vec::new();
        for row in &rows {
            if row["type"] != ACTOR_BLACKLIST_TYPE {
                continue;
            }
            for entry in row["accounts"].as_array().into_iter().flatten() {
                if let Some(name) = entry.as_str() {
                    accounts.push(name.to_owned());
                }
            }
        }
        Ok(accounts)
    }

    /// The hash this producer last submitted; empty string if none.
    fn submitted_hash(&self) -> Result<String> {
        let Some(producer) = &self.producer else {
            return Ok(String::new());
        };
        let query = TableQuery::new(
            self.contract.clone(),
            self.contract.clone(),
            "producerhash",
            TABLE_ROW_LIMIT,
        );
        let rows = self.reader.get_table_rows(&query)?;
        let submitted = rows
            .iter()
            .find(|row| row["producer"] == Value::String(producer.clone()))
            .and_then(|row| row["hash"].as_str())
            .unwrap_or_default();
        Ok(submitted.to_owned())
    }
}
