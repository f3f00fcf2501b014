//! Per-stream document construction and submission.
//!
//! The [`Processor`] owns the document store, the ABI cache, and the
//! start-block gate, and runs exclusively on the consumer thread. Failures
//! while handling one event are logged and the stream continues; nothing
//! is retried.

use std::time::Duration;

use serde_json::{Value, json};
use tracing::{error, warn};

use scribe_core::abi::{AbiDefinition, NewAccount, SetAbi};
use scribe_core::chain::{
    ActionTrace, BlockStateEvent, SignedTransaction, TransactionMetadataEvent,
    TransactionTraceEvent,
};
use scribe_core::{NEWACCOUNT_ACTION, Name, SETABI_ACTION, SYSTEM_ACCOUNT};

use crate::abi_cache::AbiCache;
use crate::encode;
use crate::error::Result;
use crate::store::{BulkBatch, DocKind, DocumentStore};

/// Milliseconds since epoch for `createAt`/`updateAt` stamps.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Consumer-side state: store, ABI cache, and the start-block gate.
pub struct Processor<S: DocumentStore> {
    store: S,
    cache: AbiCache,
    start_block_num: u32,
    start_block_reached: bool,
    abi_decode_time: Duration,
}

impl<S: DocumentStore> Processor<S> {
    pub fn new(
        store: S,
        abi_cache_size: usize,
        start_block_num: u32,
        abi_decode_time: Duration,
    ) -> Self {
        Processor {
            store,
            cache: AbiCache::new(abi_cache_size),
            // with no threshold configured the gate starts tripped
            start_block_reached: start_block_num == 0,
            start_block_num,
            abi_decode_time,
        }
    }

    pub fn start_block_reached(&self) -> bool {
        self.start_block_reached
    }

    /// Accepted block: trips the gate, then indexes the `block_states` and
    /// `blocks` documents.
    pub fn process_accepted_block(&mut self, bs: &BlockStateEvent) {
        if !self.start_block_reached && bs.block_num >= self.start_block_num {
            self.start_block_reached = true;
        }
        if !self.start_block_reached {
            return;
        }
        if let Err(e) = self.index_accepted_block(bs) {
            error!(block_num = bs.block_num, error = %e, "failed to index accepted block");
        }
    }

    /// Irreversible block: marks previously indexed `blocks` documents and
    /// indexes the finalized `block_states` document.
    pub fn process_irreversible_block(&mut self, bs: &BlockStateEvent) {
        if !self.start_block_reached {
            return;
        }
        if let Err(e) = self.index_irreversible_block(bs) {
            error!(block_num = bs.block_num, error = %e, "failed to index irreversible block");
        }
    }

    /// Accepted transaction: account maintenance always runs, since
    /// `setabi` must be captured even before the start block; the
    /// `transactions` document is written only once the gate has tripped.
    pub fn process_accepted_transaction(&mut self, t: &TransactionMetadataEvent) {
        self.update_accounts(&t.trx);
        if !self.start_block_reached {
            return;
        }
        if let Err(e) = self.index_transaction(t) {
            error!(id = %t.id, error = %e, "failed to index accepted transaction");
        }
    }

    /// Applied transaction: indexes the trace and one `actions` document
    /// per action trace, inline traces included.
    pub fn process_applied_transaction(&mut self, t: &TransactionTraceEvent) {
        if !self.start_block_reached {
            return;
        }
        if let Err(e) = self.index_transaction_trace(t) {
            error!(id = %t.id, error = %e, "failed to index transaction trace");
        }
    }

    fn encode_block(&mut self, block: &scribe_core::chain::SignedBlock) -> Result<Value> {
        let Self {
            store,
            cache,
            abi_decode_time,
            ..
        } = &mut *self;
        let mut resolver = |n: Name| cache.resolve(&*store, n);
        encode::block_to_value(block, &mut resolver, *abi_decode_time)
    }

    fn encode_transaction(&mut self, trx: &SignedTransaction) -> Result<Value> {
        let Self {
            store,
            cache,
            abi_decode_time,
            ..
        } = &mut *self;
        let mut resolver = |n: Name| cache.resolve(&*store, n);
        encode::transaction_to_value(trx, &mut resolver, *abi_decode_time)
    }

    fn encode_action_trace(&mut self, trace: &ActionTrace) -> Result<Value> {
        let Self {
            store,
            cache,
            abi_decode_time,
            ..
        } = &mut *self;
        let mut resolver = |n: Name| cache.resolve(&*store, n);
        encode::action_trace_to_value(trace, &mut resolver, *abi_decode_time)
    }

    fn index_accepted_block(&mut self, bs: &BlockStateEvent) -> Result<()> {
        let now = now_millis();
        let block_id = bs.block_id.to_string();

        let block_state_doc = json!({
            "block_num": bs.block_num,
            "block_id": &block_id,
            "validated": bs.validated,
            "in_current_chain": bs.in_current_chain,
            "block_header_state": bs.block_header_state,
            "createAt": now,
        });
        self.store
            .index(DocKind::BlockStates, &block_state_doc.to_string(), None)?;

        let block_value = self.encode_block(&bs.block)?;
        let block_doc = json!({
            "block_num": bs.block_num,
            "block_id": &block_id,
            "irreversible": false,
            "block": block_value,
            "createAt": now,
        });
        self.store
            .index(DocKind::Blocks, &block_doc.to_string(), None)?;
        Ok(())
    }

    fn index_irreversible_block(&mut self, bs: &BlockStateEvent) -> Result<()> {
        let now = now_millis();
        let block_id = bs.block_id.to_string();

        let query = json!({"query": {"term": {"block_id": &block_id}}}).to_string();
        let response = self.store.search(DocKind::Blocks, &query)?;
        let mut batch = BulkBatch::new(DocKind::Blocks);
        let patch = json!({"irreversible": true, "updateAt": now}).to_string();
        for hit in response["hits"]["hits"].as_array().into_iter().flatten() {
            if let Some(id) = hit["_id"].as_str() {
                batch.update(id, &patch);
            }
        }
        if !batch.is_empty() {
            self.store.bulk(&batch)?;
        }

        let block_state_doc = json!({
            "block_num": bs.block_num,
            "block_id": &block_id,
            "validated": bs.validated,
            "in_current_chain": bs.in_current_chain,
            "block_header_state": bs.block_header_state,
            "irreversible": true,
            "createAt": now,
        });
        self.store
            .index(DocKind::BlockStates, &block_state_doc.to_string(), None)?;
        Ok(())
    }

    fn index_transaction(&mut self, t: &TransactionMetadataEvent) -> Result<()> {
        let now = now_millis();
        let id = t.id.to_string();
        let trx_value = self.encode_transaction(&t.trx)?;
        let doc = json!({
            "id": &id,
            "transaction": trx_value,
            "createAt": now,
        });
        self.store
            .index(DocKind::Transactions, &doc.to_string(), Some(id.as_str()))?;
        Ok(())
    }

    fn index_transaction_trace(&mut self, t: &TransactionTraceEvent) -> Result<()> {
        let now = now_millis();
        let traces = t
            .action_traces
            .iter()
            .map(|tr| self.encode_action_trace(tr))
            .collect::<Result<Vec<_>>>()?;
        let doc = json!({
            "id": t.id.to_string(),
            "status": t.status,
            "elapsed_us": t.elapsed_us,
            "net_usage_words": t.net_usage_words,
            "action_traces": traces,
            "createAt": now,
        });
        self.store
            .index(DocKind::TransactionTraces, &doc.to_string(), None)?;

        let mut flat = Vec::new();
        flatten_traces(&t.action_traces, &mut flat);
        let mut batch = BulkBatch::new(DocKind::Actions);
        let trx_id = t.id.to_string();
        for trace in flat {
            let act_value = {
                let Self {
                    store,
                    cache,
                    abi_decode_time,
                    ..
                } = &mut *self;
                let mut resolver = |n: Name| cache.resolve(&*store, n);
                encode::action_to_value(&trace.act, &mut resolver, *abi_decode_time)?
            };
            let action_doc = json!({
                "trx_id": &trx_id,
                "global_sequence": trace.receipt.global_sequence,
                "receiver": trace.receipt.receiver,
                "act": act_value,
                "createAt": now,
            });
            batch.index(None, &action_doc.to_string());
        }
        if !batch.is_empty() {
            self.store.bulk(&batch)?;
        }
        Ok(())
    }

    /// Capture `setabi` and `newaccount` system actions into the
    /// `accounts` documents. Per-action failures are logged and skipped.
    fn update_accounts(&mut self, trx: &SignedTransaction) {
        for act in &trx.actions {
            if act.account != SYSTEM_ACCOUNT {
                continue;
            }
            let outcome = if act.name == SETABI_ACTION {
                self.capture_setabi(&act.data)
            } else if act.name == NEWACCOUNT_ACTION {
                self.capture_newaccount(&act.data)
            } else {
                Ok(())
            };
            if let Err(e) = outcome {
                warn!(action = %act.name, error = %e, "failed to capture system action");
            }
        }
    }

    fn capture_setabi(&mut self, data: &[u8]) -> Result<()> {
        let setabi = SetAbi::from_bytes(data)?;
        let abi = AbiDefinition::from_bytes(&setabi.abi)?;
        // drop the stale decoder so the next resolve sees the new ABI
        self.cache.invalidate(setabi.account);

        let now = now_millis();
        let abi_value = serde_json::to_value(&abi)?;
        match self.find_account(setabi.account)? {
            Some(id) => {
                let mut batch = BulkBatch::new(DocKind::Accounts);
                let patch = json!({"abi": abi_value, "updateAt": now}).to_string();
                batch.update(&id, &patch);
                self.store.bulk(&batch)?;
            }
            None => {
                let doc = json!({
                    "name": setabi.account.to_string(),
                    "abi": abi_value,
                    "createAt": now,
                });
                self.store
                    .index(DocKind::Accounts, &doc.to_string(), None)?;
            }
        }
        Ok(())
    }

    fn capture_newaccount(&mut self, data: &[u8]) -> Result<()> {
        let newaccount = NewAccount::from_bytes(data)?;
        if self.find_account(newaccount.name)?.is_some() {
            return Ok(());
        }
        let doc = json!({
            "name": newaccount.name.to_string(),
            "createAt": now_millis(),
        });
        self.store
            .index(DocKind::Accounts, &doc.to_string(), None)?;
        Ok(())
    }

    /// The `_id` of the `accounts` document for `account`, if one exists.
    fn find_account(&self, account: Name) -> Result<Option<String>> {
        let query = json!({"query": {"term": {"name": account.to_string()}}}).to_string();
        let response = self.store.search(DocKind::Accounts, &query)?;
        Ok(response["hits"]["hits"][0]["_id"].as_str().map(str::to_owned))
    }
}

fn flatten_traces<'a>(traces: &'a [ActionTrace], out: &mut Vec<&'a ActionTrace>) {
    for trace in traces {
        out.push(trace);
        flatten_traces(&trace.inline_traces, out);
    }
}
