//! Variant encoding: native records to annotated JSON document form.
//!
//! Each function serializes a chain type and then decorates the contained
//! actions, asking the resolver for a per-account decoder. When a decoder
//! is available and the payload decodes, `data` becomes the structured
//! form and the raw payload moves to `hex_data`; otherwise `data` stays in
//! its opaque hex form. Failing to resolve an ABI is not an error.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use scribe_core::Name;
use scribe_core::abi::AbiDecoder;
use scribe_core::chain::{Action, ActionTrace, SignedBlock, SignedTransaction};

use crate::error::Result;

/// Per-account decoder lookup, normally backed by the ABI cache.
pub type AbiResolver<'a> = &'a mut dyn FnMut(Name) -> Option<Arc<AbiDecoder>>;

/// Encode one action, decoding its payload when an ABI is available.
pub fn action_to_value(
    action: &Action,
    resolver: AbiResolver<'_>,
    max_time: Duration,
) -> Result<Value> {
    let mut value = serde_json::to_value(action)?;
    if let Some(decoder) = resolver(action.account) {
        match decoder.decode_action(action.name, &action.data, max_time) {
            Ok(decoded) => {
                value["hex_data"] = Value::String(hex::encode(&action.data));
                value["data"] = decoded;
            }
            Err(e) => {
                debug!(
                    account = %action.account,
                    action = %action.name,
                    error = %e,
                    "action payload kept in opaque form"
                );
            }
        }
    }
    Ok(value)
}

/// Encode a transaction with its actions decorated.
pub fn transaction_to_value(
    trx: &SignedTransaction,
    resolver: AbiResolver<'_>,
    max_time: Duration,
) -> Result<Value> {
    let mut value = serde_json::to_value(trx)?;
    let actions = trx
        .actions
        .iter()
        .map(|a| action_to_value(a, resolver, max_time))
        .collect::<Result<Vec<_>>>()?;
    value["actions"] = Value::Array(actions);
    Ok(value)
}

/// Encode a block, decorating the actions of every contained transaction.
pub fn block_to_value(
    block: &SignedBlock,
    resolver: AbiResolver<'_>,
    max_time: Duration,
) -> Result<Value> {
    let mut value = serde_json::to_value(block)?;
    for (slot, receipt) in value["transactions"]
        .as_array_mut()
        .into_iter()
        .flatten()
        .zip(&block.transactions)
    {
        slot["trx"] = transaction_to_value(&receipt.trx, resolver, max_time)?;
    }
    Ok(value)
}

/// Encode an action trace tree, decorating every `act` payload.
pub fn action_trace_to_value(
    trace: &ActionTrace,
    resolver: AbiResolver<'_>,
    max_time: Duration,
) -> Result<Value> {
    let mut value = serde_json::to_value(trace)?;
    value["act"] = action_to_value(&trace.act, resolver, max_time)?;
    let inline = trace
        .inline_traces
        .iter()
        .map(|t| action_trace_to_value(t, resolver, max_time))
        .collect::<Result<Vec<_>>>()?;
    value["inline_traces"] = Value::Array(inline);
    Ok(value)
}
