//! Debounce aggregator — coalesces a message and its rapid edits.
//!
//! Every inbound message starts a settle timer keyed by its message ID.
//! Edits that arrive before the timer fires replace the pending snapshot and
//! restart the timer. When a timer finally fires, the latest snapshot is
//! emitted exactly once on the settled channel and the entry is dropped.
//! Edits to messages that have already settled are ignored.
//!
//! Timers own their handles to the pending map, so dropping the debouncer
//! still lets in-flight messages settle.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

struct Pending<V> {
    snapshot: V,
    generation: u64,
    timer: JoinHandle<()>,
}

type Entries<K, V> = Arc<Mutex<HashMap<K, Pending<V>>>>;

/// Keyed settle timers with reset and cancel.
pub struct Debouncer<K, V> {
    delay: Duration,
    entries: Entries<K, V>,
    settled_tx: mpsc::Sender<V>,
    generations: AtomicU64,
}

impl<K, V> Debouncer<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + 'static,
    V: Send + 'static,
{
    /// Create a debouncer and the receiver its settled snapshots arrive on.
    pub fn new(delay: Duration) -> (Self, mpsc::Receiver<V>) {
        let (settled_tx, settled_rx) = mpsc::channel(256);
        let debouncer = Self {
            delay,
            entries: Arc::new(Mutex::new(HashMap::new())),
            settled_tx,
            generations: AtomicU64::new(1),
        };
        (debouncer, settled_rx)
    }

    /// Register a new message, or refresh it if it is already pending.
    pub async fn on_message(&self, key: K, snapshot: V) {
        let mut entries = self.entries.lock().await;
        self.arm(&mut entries, key, snapshot);
    }

    /// Refresh a pending message with edited content.
    ///
    /// Returns `false` (and does nothing) when the key is not pending.
    pub async fn on_edit(&self, key: &K, snapshot: V) -> bool {
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(key) {
            debug!(?key, "Edit for a settled or unknown message ignored");
            return false;
        }
        self.arm(&mut entries, key.clone(), snapshot);
        true
    }

    /// Drop a pending entry and its timer.
    pub async fn cancel(&self, key: &K) -> bool {
        match self.entries.lock().await.remove(key) {
            Some(pending) => {
                pending.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Number of messages waiting to settle.
    pub async fn pending(&self) -> usize {
        self.entries.lock().await.len()
    }

    fn arm(&self, entries: &mut HashMap<K, Pending<V>>, key: K, snapshot: V) {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let timer = tokio::spawn(fire(
            self.entries.clone(),
            self.settled_tx.clone(),
            key.clone(),
            generation,
            Instant::now() + self.delay,
        ));

        let pending = Pending {
            snapshot,
            generation,
            timer,
        };
        if let Some(stale) = entries.insert(key, pending) {
            stale.timer.abort();
        }
    }
}

async fn fire<K, V>(entries: Entries<K, V>, settled_tx: mpsc::Sender<V>, key: K, generation: u64, deadline: Instant)
where
    K: Eq + Hash,
{
    tokio::time::sleep_until(deadline).await;

    let snapshot = {
        let mut entries = entries.lock().await;
        match entries.get(&key) {
            Some(pending) if pending.generation == generation => entries.remove(&key).map(|p| p.snapshot),
            // Superseded or cancelled while this timer was waiting on the lock
            _ => None,
        }
    };

    if let Some(snapshot) = snapshot {
        let _ = settled_tx.send(snapshot).await;
    }
}
