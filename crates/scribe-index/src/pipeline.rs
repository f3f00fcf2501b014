//! Pipeline orchestration: subscriptions, the consumer thread, lifecycle.
//!
//! The orchestrator registers the four stream callbacks on the controller,
//! prepares the index, and runs a single consumer thread that drains the
//! queues and hands each buffer to the processors in a fixed priority
//! order: traces, accepted transactions, accepted blocks, irreversible
//! blocks.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{error, info};

use scribe_core::SYSTEM_ACCOUNT;
use scribe_core::controller::{ChainSignals, Subscription};

use crate::error::{Error, Result};
use crate::mappings::INDEX_MAPPINGS;
use crate::process::{Processor, now_millis};
use crate::queue::StreamQueues;
use crate::store::{DocKind, DocumentStore};

/// Per-stream drain cycles slower than this are logged.
const SLOW_DRAIN: Duration = Duration::from_millis(500);

/// Indexer configuration, mirroring the plugin's options.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Document store base URLs.
    pub elastic_urls: Vec<String>,
    /// Name of the index all document kinds live under.
    pub index_name: String,
    /// Soft bound on each stream queue.
    pub max_queue_size: usize,
    /// Bound on the ABI decoder cache.
    pub abi_cache_size: usize,
    /// Blocks below this number are not indexed; 0 disables the gate.
    pub start_block_num: u32,
    /// Drop any existing index before creating it.
    pub delete_index_on_startup: bool,
    /// Time budget for decoding a single ABI payload.
    pub abi_decode_time: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        IndexerConfig {
            elastic_urls: vec!["http://localhost:9200".into()],
            index_name: "chain".into(),
            max_queue_size: 1024,
            abi_cache_size: 2048,
            start_block_num: 0,
            delete_index_on_startup: false,
            abi_decode_time: Duration::from_millis(15),
        }
    }
}

/// Lifecycle of the indexer plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Initialized,
    Started,
    Draining,
    Stopped,
}

/// The chain-data indexer plugin.
///
/// Owns the queues, the controller subscriptions, and the consumer thread.
/// Dropping the plugin shuts it down; subscriptions are released before the
/// caller's controller can go away.
pub struct IndexerPlugin<S: DocumentStore + 'static> {
    config: IndexerConfig,
    state: PipelineState,
    queues: Arc<StreamQueues>,
    subscriptions: Vec<Subscription>,
    store: Option<S>,
    processor: Option<Processor<S>>,
    consumer: Option<JoinHandle<()>>,
}

impl<S: DocumentStore + 'static> IndexerPlugin<S> {
    pub fn new(config: IndexerConfig, store: S) -> Self {
        let queues = Arc::new(StreamQueues::new(config.max_queue_size));
        IndexerPlugin {
            config,
            state: PipelineState::Uninitialized,
            queues,
            subscriptions: Vec::new(),
            store: Some(store),
            processor: None,
            consumer: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The producer's current adaptive backpressure sleep.
    pub fn current_sleep(&self) -> Duration {
        self.queues.current_sleep()
    }

    /// Register subscriptions and prepare the index.
    pub fn initialize(&mut self, signals: &dyn ChainSignals) -> Result<()> {
        if self.state != PipelineState::Uninitialized {
            return Err(Error::Config(format!(
                "initialize called in state {:?}",
                self.state
            )));
        }
        let store = self
            .store
            .take()
            .ok_or_else(|| Error::Config("document store already consumed".into()))?;

        if self.config.delete_index_on_startup {
            info!(index = %self.config.index_name, "dropping index");
            store.delete_index()?;
        }
        info!(index = %self.config.index_name, "creating index");
        store.create_index(INDEX_MAPPINGS)?;

        if store.count(DocKind::Accounts, None)? == 0 {
            let doc = json!({
                "name": SYSTEM_ACCOUNT.to_string(),
                "createAt": now_millis(),
            });
            store.index(DocKind::Accounts, &doc.to_string(), None)?;
        }

        let q = Arc::clone(&self.queues);
        self.subscriptions.push(signals.subscribe_accepted_block(
            Box::new(move |bs| q.push_block(Arc::clone(bs))),
        ));
        let q = Arc::clone(&self.queues);
        self.subscriptions.push(signals.subscribe_irreversible_block(
            Box::new(move |bs| q.push_irreversible(Arc::clone(bs))),
        ));
        let q = Arc::clone(&self.queues);
        self.subscriptions.push(signals.subscribe_accepted_transaction(
            Box::new(move |t| q.push_metadata(Arc::clone(t))),
        ));
        let q = Arc::clone(&self.queues);
        self.subscriptions.push(signals.subscribe_applied_transaction(
            Box::new(move |t| q.push_trace(Arc::clone(t))),
        ));

        self.processor = Some(Processor::new(
            store,
            self.config.abi_cache_size,
            self.config.start_block_num,
            self.config.abi_decode_time,
        ));
        self.state = PipelineState::Initialized;
        Ok(())
    }

    /// Launch the consumer thread.
    pub fn start(&mut self) -> Result<()> {
        if self.state != PipelineState::Initialized {
            return Err(Error::Config(format!(
                "start called in state {:?}",
                self.state
            )));
        }
        let processor = self
            .processor
            .take()
            .ok_or_else(|| Error::Config("processor already consumed".into()))?;
        let queues = Arc::clone(&self.queues);
        let handle = thread::Builder::new()
            .name("scribe-index-consumer".into())
            .spawn(move || consume(queues, processor))?;
        self.consumer = Some(handle);
        self.state = PipelineState::Started;
        info!("indexer consumer thread started");
        Ok(())
    }

    /// Cooperative shutdown: set done, notify, join, release subscriptions.
    pub fn shutdown(&mut self) {
        if self.state == PipelineState::Stopped {
            return;
        }
        if self.state == PipelineState::Started {
            self.state = PipelineState::Draining;
            info!("indexer shutdown in progress; draining queued events");
            self.queues.shutdown();
            if let Some(handle) = self.consumer.take()
                && handle.join().is_err()
            {
                error!("consumer thread panicked during shutdown");
            }
        }
        self.subscriptions.clear();
        self.state = PipelineState::Stopped;
    }
}

impl<S: DocumentStore + 'static> Drop for IndexerPlugin<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn consume<S: DocumentStore>(queues: Arc<StreamQueues>, mut processor: Processor<S>) {
    loop {
        let drained = queues.drain();
        if drained.done {
            info!(queued = drained.total(), "draining stream queues");
        }

        let start = Instant::now();
        let size = drained.traces.len();
        for event in &drained.traces {
            processor.process_applied_transaction(event);
        }
        log_slow("process_applied_transaction", size, start.elapsed());

        let start = Instant::now();
        let size = drained.metadata.len();
        for event in &drained.metadata {
            processor.process_accepted_transaction(event);
        }
        log_slow("process_accepted_transaction", size, start.elapsed());

        let start = Instant::now();
        let size = drained.blocks.len();
        for event in &drained.blocks {
            processor.process_accepted_block(event);
        }
        log_slow("process_accepted_block", size, start.elapsed());

        let start = Instant::now();
        let size = drained.irreversible.len();
        for event in &drained.irreversible {
            processor.process_irreversible_block(event);
        }
        log_slow("process_irreversible_block", size, start.elapsed());

        if drained.done && drained.is_empty() {
            break;
        }
    }
    info!("indexer consumer thread shutdown gracefully");
}

fn log_slow(operation: &str, size: usize, elapsed: Duration) {
    if elapsed <= SLOW_DRAIN {
        return;
    }
    let per_item = if size > 0 {
        elapsed / size as u32
    } else {
        Duration::ZERO
    };
    info!(operation, size, ?elapsed, ?per_item, "slow drain cycle");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::MemoryStore;
    use scribe_core::Name;
    use scribe_core::chain::{BlockStateEvent, Checksum256, SignedBlock};
    use scribe_core::controller::SignalHub;

    fn test_config() -> IndexerConfig {
        IndexerConfig {
            index_name: "chain-test".into(),
            max_queue_size: 1024,
            abi_cache_size: 32,
            abi_decode_time: Duration::from_secs(5),
            ..IndexerConfig::default()
        }
    }

    fn block_event(num: u32) -> Arc<BlockStateEvent> {
        Arc::new(BlockStateEvent {
            block_num: num,
            block_id: Checksum256::from_block_num(num),
            validated: true,
            in_current_chain: true,
            block_header_state: serde_json::Value::Null,
            block: SignedBlock {
                previous: Checksum256::from_block_num(num.saturating_sub(1)),
                timestamp: 1_700_000_000 + num,
                producer: Name::new("producer1").unwrap(),
                transactions: vec![],
            },
        })
    }

    #[test]
    fn lifecycle_walks_through_the_states() {
        let store = Arc::new(MemoryStore::new());
        let hub = SignalHub::new();
        let mut plugin = IndexerPlugin::new(test_config(), Arc::clone(&store));
        assert_eq!(plugin.state(), PipelineState::Uninitialized);

        plugin.initialize(&hub).unwrap();
        assert_eq!(plugin.state(), PipelineState::Initialized);

        plugin.start().unwrap();
        assert_eq!(plugin.state(), PipelineState::Started);

        plugin.shutdown();
        assert_eq!(plugin.state(), PipelineState::Stopped);
    }

    #[test]
    fn initialize_twice_is_a_config_error() {
        let store = Arc::new(MemoryStore::new());
        let hub = SignalHub::new();
        let mut plugin = IndexerPlugin::new(test_config(), store);
        plugin.initialize(&hub).unwrap();
        assert!(matches!(plugin.initialize(&hub), Err(Error::Config(_))));
    }

    #[test]
    fn shutdown_before_start_skips_the_join() {
        let store = Arc::new(MemoryStore::new());
        let hub = SignalHub::new();
        let mut plugin = IndexerPlugin::new(test_config(), store);
        plugin.initialize(&hub).unwrap();
        plugin.shutdown();
        assert_eq!(plugin.state(), PipelineState::Stopped);
    }

    #[test]
    fn initialize_seeds_the_system_account_once() {
        let store = Arc::new(MemoryStore::new());
        let hub = SignalHub::new();
        let mut plugin = IndexerPlugin::new(test_config(), Arc::clone(&store));
        plugin.initialize(&hub).unwrap();

        let accounts = store.docs(DocKind::Accounts);
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].body["name"], "eosio");
        assert!(store.created_with.lock().as_deref().is_some());
        drop(plugin);

        // a second run against the same store does not reseed
        let hub = SignalHub::new();
        let mut plugin = IndexerPlugin::new(test_config(), Arc::clone(&store));
        plugin.initialize(&hub).unwrap();
        assert_eq!(store.docs(DocKind::Accounts).len(), 1);
        drop(plugin);
    }

    #[test]
    fn delete_index_on_startup_drops_first() {
        let store = Arc::new(MemoryStore::new());
        store.insert(DocKind::Blocks, json!({"block_num": 1}));
        let hub = SignalHub::new();
        let mut plugin = IndexerPlugin::new(
            IndexerConfig {
                delete_index_on_startup: true,
                ..test_config()
            },
            Arc::clone(&store),
        );
        plugin.initialize(&hub).unwrap();
        assert!(store.docs(DocKind::Blocks).is_empty());
        assert_eq!(store.deletes.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[test]
    fn emitted_blocks_end_up_in_the_store() {
        let store = Arc::new(MemoryStore::new());
        let hub = SignalHub::new();
        let mut plugin = IndexerPlugin::new(test_config(), Arc::clone(&store));
        plugin.initialize(&hub).unwrap();
        plugin.start().unwrap();

        for n in 1..=64 {
            hub.emit_accepted_block(block_event(n));
        }
        plugin.shutdown();

        let states = store.docs(DocKind::BlockStates);
        assert_eq!(states.len(), 64);
        assert_eq!(store.docs(DocKind::Blocks).len(), 64);
        // per-stream order is preserved
        let nums: Vec<u32> = states
            .iter()
            .map(|d| d.body["block_num"].as_u64().unwrap() as u32)
            .collect();
        assert_eq!(nums, (1..=64).collect::<Vec<u32>>());
    }

    #[test]
    fn sustained_load_processes_every_event_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        let hub = SignalHub::new();
        let mut plugin = IndexerPlugin::new(
            IndexerConfig {
                max_queue_size: 256,
                ..test_config()
            },
            Arc::clone(&store),
        );
        plugin.initialize(&hub).unwrap();
        plugin.start().unwrap();

        for n in 1..=2048 {
            hub.emit_accepted_block(block_event(n));
        }
        plugin.shutdown();

        assert_eq!(store.docs(DocKind::BlockStates).len(), 2048);
        // backpressure decayed once the producer stopped overrunning
        assert!(plugin.current_sleep() <= Duration::from_millis(1000));
    }

    #[test]
    fn subscriptions_are_released_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let hub = SignalHub::new();
        let mut plugin = IndexerPlugin::new(test_config(), Arc::clone(&store));
        plugin.initialize(&hub).unwrap();
        plugin.start().unwrap();
        plugin.shutdown();

        // events emitted after shutdown are not observed
        hub.emit_accepted_block(block_event(1));
        assert!(store.docs(DocKind::BlockStates).is_empty());
    }

    #[test]
    fn start_block_gate_holds_across_the_pipeline() {
        let store = Arc::new(MemoryStore::new());
        let hub = SignalHub::new();
        let mut plugin = IndexerPlugin::new(
            IndexerConfig {
                start_block_num: 100,
                ..test_config()
            },
            Arc::clone(&store),
        );
        plugin.initialize(&hub).unwrap();
        plugin.start().unwrap();

        for n in 90..100 {
            hub.emit_accepted_block(block_event(n));
        }
        hub.emit_accepted_block(block_event(100));
        hub.emit_accepted_block(block_event(101));
        plugin.shutdown();

        let states = store.docs(DocKind::BlockStates);
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].body["block_num"], 100);
    }
}
