//! Bounded producer→consumer stream queues with adaptive backpressure.
//!
//! Four FIFO queues of shared event handles sit behind one mutex and one
//! condition variable. The producer side never performs I/O: an enqueue can
//! only block on the lock and on its adaptive sleep. The consumer waits on
//! the condition and drains every non-empty queue in one critical section,
//! so it never holds the lock while processing.
//!
//! The adaptive sleep is shared across streams: it grows by 10 ms on every
//! over-capacity enqueue and decays by 10 ms on every in-capacity enqueue,
//! bounded to [0, 1000] ms. Over-capacity enqueues still succeed — the
//! bound is soft by one slot per producer call, and nothing is dropped.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use scribe_core::chain::{BlockStateEvent, TransactionMetadataEvent, TransactionTraceEvent};

const SLEEP_STEP_MS: u64 = 10;
const SLEEP_CAP_MS: u64 = 1000;

type Sleeper = Box<dyn Fn(Duration) + Send + Sync>;

#[derive(Default)]
struct Queues {
    traces: VecDeque<Arc<TransactionTraceEvent>>,
    metadata: VecDeque<Arc<TransactionMetadataEvent>>,
    blocks: VecDeque<Arc<BlockStateEvent>>,
    irreversible: VecDeque<Arc<BlockStateEvent>>,
    done: bool,
}

/// Everything one drain cycle captured, in processing order.
pub struct Drained {
    pub traces: VecDeque<Arc<TransactionTraceEvent>>,
    pub metadata: VecDeque<Arc<TransactionMetadataEvent>>,
    pub blocks: VecDeque<Arc<BlockStateEvent>>,
    pub irreversible: VecDeque<Arc<BlockStateEvent>>,
    /// Whether shutdown had been requested when the drain was captured.
    pub done: bool,
}

impl Drained {
    pub fn total(&self) -> usize {
        self.traces.len() + self.metadata.len() + self.blocks.len() + self.irreversible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// The four producer→consumer stream queues.
pub struct StreamQueues {
    state: Mutex<Queues>,
    condition: Condvar,
    max_queue_size: usize,
    sleep_ms: AtomicU64,
    sleeper: Sleeper,
}

impl StreamQueues {
    pub fn new(max_queue_size: usize) -> Self {
        StreamQueues::with_sleeper(max_queue_size, Box::new(std::thread::sleep))
    }

    /// Like [`StreamQueues::new`] with the backpressure sleep replaced,
    /// so tests can observe sleeps without serving them.
    pub fn with_sleeper(max_queue_size: usize, sleeper: Sleeper) -> Self {
        StreamQueues {
            state: Mutex::new(Queues::default()),
            condition: Condvar::new(),
            max_queue_size,
            sleep_ms: AtomicU64::new(0),
            sleeper,
        }
    }

    /// The producer's current adaptive sleep.
    pub fn current_sleep(&self) -> Duration {
        Duration::from_millis(self.sleep_ms.load(Ordering::Relaxed))
    }

    pub fn push_trace(&self, event: Arc<TransactionTraceEvent>) {
        self.push(event, |q| &mut q.traces);
    }

    pub fn push_metadata(&self, event: Arc<TransactionMetadataEvent>) {
        self.push(event, |q| &mut q.metadata);
    }

    pub fn push_block(&self, event: Arc<BlockStateEvent>) {
        self.push(event, |q| &mut q.blocks);
    }

    pub fn push_irreversible(&self, event: Arc<BlockStateEvent>) {
        self.push(event, |q| &mut q.irreversible);
    }

    fn push<T>(&self, event: Arc<T>, pick: impl Fn(&mut Queues) -> &mut VecDeque<Arc<T>>) {
        let mut state = self.state.lock();
        let queue_size = pick(&mut state).len();
        if queue_size > self.max_queue_size {
            drop(state);
            self.condition.notify_one();
            let mut sleep = self
                .sleep_ms
                .load(Ordering::Relaxed)
                .saturating_add(SLEEP_STEP_MS);
            if sleep > SLEEP_CAP_MS {
                sleep = SLEEP_CAP_MS;
                warn!(queue_size, "stream queue over capacity with backpressure sleep at cap");
            }
            self.sleep_ms.store(sleep, Ordering::Relaxed);
            (self.sleeper)(Duration::from_millis(sleep));
            state = self.state.lock();
        } else {
            let sleep = self
                .sleep_ms
                .load(Ordering::Relaxed)
                .saturating_sub(SLEEP_STEP_MS);
            self.sleep_ms.store(sleep, Ordering::Relaxed);
        }
        pick(&mut state).push_back(event);
        drop(state);
        self.condition.notify_one();
    }

    /// Block until any queue is non-empty or shutdown is requested, then
    /// move every queue's contents out in one critical section.
    pub fn drain(&self) -> Drained {
        let mut state = self.state.lock();
        while state.traces.is_empty()
            && state.metadata.is_empty()
            && state.blocks.is_empty()
            && state.irreversible.is_empty()
            && !state.done
        {
            self.condition.wait(&mut state);
        }
        Drained {
            traces: std::mem::take(&mut state.traces),
            metadata: std::mem::take(&mut state.metadata),
            blocks: std::mem::take(&mut state.blocks),
            irreversible: std::mem::take(&mut state.irreversible),
            done: state.done,
        }
    }

    /// Request cooperative shutdown and wake the consumer.
    pub fn shutdown(&self) {
        self.state.lock().done = true;
        self.condition.notify_all();
    }
}
