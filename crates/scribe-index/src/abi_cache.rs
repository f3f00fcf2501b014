//! Bounded LRU cache of per-account ABI decoders.
//!
//! Two indexes over one entry set: a primary map keyed by account and a
//! secondary ordered map keyed by last-access tick. A lookup touches the
//! entry; a miss searches the store's `accounts` documents and decodes the
//! hit's `abi` field. When the cache is full the entry with the earliest
//! last access is evicted before the insert. Only the consumer thread
//! touches the cache, so there is no internal locking.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use scribe_core::abi::{AbiDecoder, AbiDefinition};
use scribe_core::{Name, SYSTEM_ACCOUNT};

use crate::error::Result;
use crate::store::{DocKind, DocumentStore};

struct CacheEntry {
    last_accessed: u64,
    decoder: Arc<AbiDecoder>,
}

/// Bounded cache of account ABI decoders backed by the document store.
pub struct AbiCache {
    capacity: usize,
    /// Logical clock; bumped on every touch so LRU order is total.
    tick: u64,
    by_account: HashMap<Name, CacheEntry>,
    by_last_access: BTreeMap<u64, Name>,
}

impl AbiCache {
    pub fn new(capacity: usize) -> Self {
        AbiCache {
            capacity,
            tick: 0,
            by_account: HashMap::new(),
            by_last_access: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_account.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_account.is_empty()
    }

    pub fn contains(&self, account: Name) -> bool {
        self.by_account.contains_key(&account)
    }

    /// Resolve the decoder for `account`, consulting the store on a miss.
    ///
    /// Returns `None` when the account has no usable ABI; store or decode
    /// failures are logged and treated the same way.
    pub fn resolve<S: DocumentStore + ?Sized>(
        &mut self,
        store: &S,
        account: Name,
    ) -> Option<Arc<AbiDecoder>> {
        if account.is_empty() {
            return None;
        }
        if let Some(entry) = self.by_account.get_mut(&account) {
            self.by_last_access.remove(&entry.last_accessed);
            self.tick += 1;
            entry.last_accessed = self.tick;
            self.by_last_access.insert(self.tick, account);
            return Some(Arc::clone(&entry.decoder));
        }
        match self.fetch(store, account) {
            Ok(Some(decoder)) => {
                self.purge();
                self.tick += 1;
                self.by_last_access.insert(self.tick, account);
                self.by_account.insert(
                    account,
                    CacheEntry {
                        last_accessed: self.tick,
                        decoder: Arc::clone(&decoder),
                    },
                );
                Some(decoder)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(account = %account, error = %e, "ABI lookup failed");
                None
            }
        }
    }

    /// Drop a cached entry, forcing the next resolve to hit the store.
    pub fn invalidate(&mut self, account: Name) {
        if let Some(entry) = self.by_account.remove(&account) {
            self.by_last_access.remove(&entry.last_accessed);
        }
    }

    /// Remove the least-recently-accessed entry if the cache is full.
    fn purge(&mut self) {
        if self.by_account.len() < self.capacity {
            return;
        }
        if let Some((_, account)) = self.by_last_access.pop_first() {
            self.by_account.remove(&account);
            debug!(account = %account, "evicted least-recently-accessed ABI");
        }
    }

    fn fetch<S: DocumentStore + ?Sized>(
        &self,
        store: &S,
        account: Name,
    ) -> Result<Option<Arc<AbiDecoder>>> {
        let query = json!({"query": {"term": {"name": account.to_string()}}}).to_string();
        let response = store.search(DocKind::Accounts, &query)?;
        if total_hits(&response) != 1 {
            return Ok(None);
        }
        let abi_value = &response["hits"]["hits"][0]["_source"]["abi"];
        if abi_value.is_null() {
            return Ok(None);
        }
        let mut abi: AbiDefinition = match serde_json::from_value(abi_value.clone()) {
            Ok(abi) => abi,
            Err(e) => {
                info!(account = %account, error = %e, "unable to convert account abi to a descriptor");
                return Ok(None);
            }
        };
        if account == SYSTEM_ACCOUNT {
            abi.rewrite_setabi_to_structured();
        }
        Ok(Some(Arc::new(AbiDecoder::new(&abi))))
    }
}

/// Hit totals come back as a bare number or, on newer backends, as
/// `{"value": n, "relation": ...}`.
fn total_hits(response: &Value) -> u64 {
    match &response["hits"]["total"] {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::Object(o) => o.get("value").and_then(Value::as_u64).unwrap_or(0),
        _ => 0,
    }
}
