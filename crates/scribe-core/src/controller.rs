//! Seam between the host node's controller and the plugins.
//!
//! The controller itself lives in the host; the plugins only see two
//! narrow surfaces. [`ChainSignals`] is the event side: subscribing returns
//! a [`Subscription`] handle that detaches when dropped, so releasing the
//! handles before the emitter goes away is just drop order. [`ChainReader`]
//! is the read-only query side used by the blacklist reconciler.
//!
//! [`SignalHub`] is the in-process implementation the host (and tests, and
//! the replay driver) emit through.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;

use crate::chain::{BlockStateEvent, TransactionMetadataEvent, TransactionTraceEvent};
use crate::error::Result;

pub type BlockCallback = Box<dyn Fn(&Arc<BlockStateEvent>) + Send + Sync>;
pub type MetadataCallback = Box<dyn Fn(&Arc<TransactionMetadataEvent>) + Send + Sync>;
pub type TraceCallback = Box<dyn Fn(&Arc<TransactionTraceEvent>) + Send + Sync>;

/// The four event streams the controller emits.
pub trait ChainSignals {
    fn subscribe_accepted_block(&self, cb: BlockCallback) -> Subscription;
    fn subscribe_irreversible_block(&self, cb: BlockCallback) -> Subscription;
    fn subscribe_accepted_transaction(&self, cb: MetadataCallback) -> Subscription;
    fn subscribe_applied_transaction(&self, cb: TraceCallback) -> Subscription;
}

/// Read-only chain state queries.
pub trait ChainReader: Send + Sync {
    /// Account names currently configured in the node's actor blacklist.
    fn actor_blacklist(&self) -> Vec<String>;

    /// Rows of an on-chain table, decoded to JSON objects.
    fn get_table_rows(&self, query: &TableQuery) -> Result<Vec<Value>>;
}

/// Parameters of an on-chain table read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub code: String,
    pub scope: String,
    pub table: String,
    pub limit: u32,
}

impl TableQuery {
    pub fn new(
        code: impl Into<String>,
        scope: impl Into<String>,
        table: impl Into<String>,
        limit: u32,
    ) -> Self {
        TableQuery {
            code: code.into(),
            scope: scope.into(),
            table: table.into(),
            limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalKind {
    AcceptedBlock,
    IrreversibleBlock,
    AcceptedTransaction,
    AppliedTransaction,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    accepted_block: Vec<(u64, BlockCallback)>,
    irreversible_block: Vec<(u64, BlockCallback)>,
    accepted_transaction: Vec<(u64, MetadataCallback)>,
    applied_transaction: Vec<(u64, TraceCallback)>,
}

impl Registry {
    fn detach(&mut self, kind: SignalKind, id: u64) {
        match kind {
            SignalKind::AcceptedBlock => self.accepted_block.retain(|(i, _)| *i != id),
            SignalKind::IrreversibleBlock => self.irreversible_block.retain(|(i, _)| *i != id),
            SignalKind::AcceptedTransaction => self.accepted_transaction.retain(|(i, _)| *i != id),
            SignalKind::AppliedTransaction => self.applied_transaction.retain(|(i, _)| *i != id),
        }
    }
}

/// RAII handle to a signal subscription; dropping it detaches the callback.
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    kind: SignalKind,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().detach(self.kind, self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Subscription({:?}, {})", self.kind, self.id)
    }
}

/// In-process signal emitter.
///
/// Callbacks run on the emitting thread, under the registry lock; per the
/// threading model there is exactly one emitting context.
#[derive(Clone, Default)]
pub struct SignalHub {
    registry: Arc<Mutex<Registry>>,
}

impl SignalHub {
    pub fn new() -> Self {
        SignalHub::default()
    }

    fn subscription(&self, kind: SignalKind, id: u64) -> Subscription {
        Subscription {
            registry: Arc::downgrade(&self.registry),
            kind,
            id,
        }
    }

    pub fn emit_accepted_block(&self, event: Arc<BlockStateEvent>) {
        let registry = self.registry.lock();
        for (_, cb) in &registry.accepted_block {
            cb(&event);
        }
    }

    pub fn emit_irreversible_block(&self, event: Arc<BlockStateEvent>) {
        let registry = self.registry.lock();
        for (_, cb) in &registry.irreversible_block {
            cb(&event);
        }
    }

    pub fn emit_accepted_transaction(&self, event: Arc<TransactionMetadataEvent>) {
        let registry = self.registry.lock();
        for (_, cb) in &registry.accepted_transaction {
            cb(&event);
        }
    }

    pub fn emit_applied_transaction(&self, event: Arc<TransactionTraceEvent>) {
        let registry = self.registry.lock();
        for (_, cb) in &registry.applied_transaction {
            cb(&event);
        }
    }
}

impl ChainSignals for SignalHub {
    fn subscribe_accepted_block(&self, cb: BlockCallback) -> Subscription {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.accepted_block.push((id, cb));
        self.subscription(SignalKind::AcceptedBlock, id)
    }

    fn subscribe_irreversible_block(&self, cb: BlockCallback) -> Subscription {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.irreversible_block.push((id, cb));
        self.subscription(SignalKind::IrreversibleBlock, id)
    }

    fn subscribe_accepted_transaction(&self, cb: MetadataCallback) -> Subscription {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.accepted_transaction.push((id, cb));
        self.subscription(SignalKind::AcceptedTransaction, id)
    }

    fn subscribe_applied_transaction(&self, cb: TraceCallback) -> Subscription {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.applied_transaction.push((id, cb));
        self.subscription(SignalKind::AppliedTransaction, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Checksum256, SignedBlock};
    use crate::name::Name;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn block_event(num: u32) -> Arc<BlockStateEvent> {
        Arc::new(BlockStateEvent {
            block_num: num,
            block_id: Checksum256::from_block_num(num),
            validated: true,
            in_current_chain: true,
            block_header_state: serde_json::Value::Null,
            block: SignedBlock {
                previous: Checksum256::from_block_num(num.saturating_sub(1)),
                timestamp: 1_700_000_000,
                producer: Name::new("producer1").unwrap(),
                transactions: vec![],
            },
        })
    }

    #[test]
    fn emit_reaches_subscriber() {
        let hub = SignalHub::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = Arc::clone(&seen);
        let _sub = hub.subscribe_accepted_block(Box::new(move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        }));
        hub.emit_accepted_block(block_event(1));
        hub.emit_accepted_block(block_event(2));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_subscription_detaches() {
        let hub = SignalHub::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = Arc::clone(&seen);
        let sub = hub.subscribe_accepted_block(Box::new(move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        }));
        hub.emit_accepted_block(block_event(1));
        drop(sub);
        hub.emit_accepted_block(block_event(2));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn streams_are_independent() {
        let hub = SignalHub::new();
        let blocks = Arc::new(AtomicUsize::new(0));
        let irreversible = Arc::new(AtomicUsize::new(0));
        let b = Arc::clone(&blocks);
        let i = Arc::clone(&irreversible);
        let _s1 = hub.subscribe_accepted_block(Box::new(move |_| {
            b.fetch_add(1, Ordering::SeqCst);
        }));
        let _s2 = hub.subscribe_irreversible_block(Box::new(move |_| {
            i.fetch_add(1, Ordering::SeqCst);
        }));
        hub.emit_accepted_block(block_event(1));
        assert_eq!(blocks.load(Ordering::SeqCst), 1);
        assert_eq!(irreversible.load(Ordering::SeqCst), 0);
    }
}
