//! Memoizing diff cache.
//!
//! One [`DiffCache`] is constructed per build session and shared by every
//! caller that needs artifact diffs. Requests are keyed by
//! [`DependencyDescriptor`] value:
//!
//! - a key with a finished result is served from memory
//! - a key with a computation in flight attaches to it; no second computation starts
//! - otherwise a computation is spawned on the runtime's blocking pool
//!
//! Results expire after an idle period and the least recently used entry is
//! evicted once the cache is full. Failures are handed to every attached
//! waiter and then forgotten, so the next request retries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use abi_diff::{AbiDiff, DiffComputer, DiffError, DiffResult};
use abi_node::NodeReader;
use abi_types::DependencyDescriptor;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::history::ArtifactHistory;

type Outcome<N> = Result<Arc<AbiDiff<N>>, Arc<DiffError>>;

/// Counters describing cache effectiveness.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests served from a finished result or attached to one in flight.
    pub hits: u64,
    /// Requests that started a computation.
    pub misses: u64,
    /// Computations that finished successfully.
    pub computations: u64,
    /// Computations that failed.
    pub failures: u64,
}

enum SlotState<N> {
    Pending {
        result: watch::Receiver<Option<Outcome<N>>>,
        task: AbortHandle,
    },
    Ready(Arc<AbiDiff<N>>),
}

struct Slot<N> {
    state: SlotState<N>,
    last_access: Instant,
    /// Logical access clock, for LRU ordering.
    tick: u64,
    /// Distinguishes this slot from a later one for the same key.
    generation: u64,
}

impl<N> Slot<N> {
    fn is_expired(&self, now: Instant, idle: Duration) -> bool {
        matches!(self.state, SlotState::Ready(_)) && now.duration_since(self.last_access) > idle
    }
}

struct State<N> {
    slots: HashMap<DependencyDescriptor, Slot<N>>,
    tick: u64,
    next_generation: u64,
    shut_down: bool,
}

impl<N> State<N> {
    fn purge_expired(&mut self, now: Instant, idle: Duration) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| !slot.is_expired(now, idle));
        before - self.slots.len()
    }

    /// Evict least recently used finished results until at most `max` slots
    /// remain.
    ///
    /// Computations in flight are never evicted, so the map may exceed `max`
    /// while they run. It is trimmed again as each one completes.
    fn evict_to(&mut self, max: usize) {
        while self.slots.len() > max {
            let victim = self
                .slots
                .iter()
                .filter(|(_, slot)| matches!(slot.state, SlotState::Ready(_)))
                .min_by_key(|(_, slot)| slot.tick)
                .map(|(key, _)| key.clone());
            let Some(key) = victim else { break };
            self.slots.remove(&key);
            debug!(artifact = %key.file.display(), "evicted least recently used diff");
        }
    }
}

struct Inner<R: NodeReader> {
    computer: Arc<DiffComputer<R>>,
    history: Arc<dyn ArtifactHistory>,
    config: CacheConfig,
    runtime: Handle,
    state: Mutex<State<R::Node>>,
    /// Set on shutdown; running computations stop at their next decode.
    cancel: Arc<AtomicBool>,
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    failures: AtomicU64,
}

impl<R: NodeReader> Inner<R> {
    /// Record a finished computation, unless its slot was invalidated or
    /// replaced.
    fn complete(
        &self,
        key: &DependencyDescriptor,
        generation: u64,
        outcome: &Outcome<R::Node>,
        elapsed: Duration,
    ) {
        let mut state = self.state.lock().expect("lock poisoned");
        let current = state
            .slots
            .get(key)
            .is_some_and(|slot| slot.generation == generation);
        match outcome {
            Ok(diff) => {
                self.computations.fetch_add(1, Ordering::Relaxed);
                if let Some(slot) = state.slots.get_mut(key).filter(|_| current) {
                    slot.state = SlotState::Ready(Arc::clone(diff));
                    slot.last_access = Instant::now();
                }
                state.evict_to(self.config.max_entries);
                info!(
                    artifact = %key.file.display(),
                    changed_or_added = diff.changed_or_added.len(),
                    deleted = diff.deleted.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "diff computed"
                );
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                if current {
                    state.slots.remove(key);
                }
                warn!(artifact = %key.file.display(), error = %err, "diff computation failed");
            }
        }
    }
}

/// Bounded, time-expiring, asynchronous memoization of artifact diffs.
///
/// Cloning is cheap; clones share the same entries.
pub struct DiffCache<R: NodeReader> {
    inner: Arc<Inner<R>>,
}

impl<R: NodeReader> Clone for DiffCache<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: NodeReader> DiffCache<R> {
    /// Create a cache that runs computations on `runtime`.
    pub fn new(
        reader: R,
        history: impl ArtifactHistory + 'static,
        config: CacheConfig,
        runtime: Handle,
    ) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                computer: Arc::new(DiffComputer::new(reader)),
                history: Arc::new(history),
                config,
                runtime,
                state: Mutex::new(State {
                    slots: HashMap::new(),
                    tick: 0,
                    next_generation: 0,
                    shut_down: false,
                }),
                cancel: Arc::new(AtomicBool::new(false)),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                computations: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Return the diff for `descriptor`, computing it at most once.
    ///
    /// Dropping the returned future does not cancel the computation; it keeps
    /// running for other waiters and its result is cached.
    pub async fn get(&self, descriptor: &DependencyDescriptor) -> CacheResult<Arc<AbiDiff<R::Node>>> {
        let mut result = {
            let mut state = self.inner.state.lock().expect("lock poisoned");
            if state.shut_down {
                return Err(CacheError::Shutdown);
            }
            let now = Instant::now();
            state.purge_expired(now, self.inner.config.idle_timeout());
            state.tick += 1;
            let tick = state.tick;

            let result = match state.slots.get_mut(descriptor) {
                Some(slot) => {
                    slot.last_access = now;
                    slot.tick = tick;
                    self.inner.hits.fetch_add(1, Ordering::Relaxed);
                    match &slot.state {
                        SlotState::Ready(diff) => {
                            debug!(artifact = %descriptor.file.display(), "diff cache hit");
                            return Ok(Arc::clone(diff));
                        }
                        SlotState::Pending { result, .. } => {
                            debug!(artifact = %descriptor.file.display(), "attached to diff in flight");
                            result.clone()
                        }
                    }
                }
                None => {
                    self.inner.misses.fetch_add(1, Ordering::Relaxed);
                    debug!(artifact = %descriptor.file.display(), "diff cache miss");
                    let generation = state.next_generation;
                    state.next_generation += 1;
                    let (result, task) = self.spawn(descriptor.clone(), generation);
                    state.slots.insert(
                        descriptor.clone(),
                        Slot {
                            state: SlotState::Pending {
                                result: result.clone(),
                                task,
                            },
                            last_access: now,
                            tick,
                            generation,
                        },
                    );
                    state.evict_to(self.inner.config.max_entries);
                    result
                }
            };
            result
        };

        // The sender is dropped without a value only when the task was aborted.
        let outcome = result
            .wait_for(Option::is_some)
            .await
            .map_err(|_| CacheError::Shutdown)?
            .clone();
        match outcome {
            Some(Ok(diff)) => Ok(diff),
            Some(Err(err)) => Err(CacheError::Diff(err)),
            None => Err(CacheError::Shutdown),
        }
    }

    /// Blocking variant of [`get`](Self::get) for threads outside the runtime.
    ///
    /// Must not be called from within an async context.
    pub fn get_blocking(&self, descriptor: &DependencyDescriptor) -> CacheResult<Arc<AbiDiff<R::Node>>> {
        self.inner.runtime.block_on(self.get(descriptor))
    }

    fn spawn(
        &self,
        key: DependencyDescriptor,
        generation: u64,
    ) -> (watch::Receiver<Option<Outcome<R::Node>>>, AbortHandle) {
        let (tx, rx) = watch::channel(None);
        let inner = Arc::clone(&self.inner);
        let task = self.inner.runtime.spawn(async move {
            let started = Instant::now();
            let computer = Arc::clone(&inner.computer);
            let history = Arc::clone(&inner.history);
            let cancel = Arc::clone(&inner.cancel);
            let descriptor = key.clone();
            let joined = tokio::task::spawn_blocking(move || {
                compute(&computer, history.as_ref(), &descriptor, &cancel)
            })
            .await;
            let outcome = match joined {
                Ok(Ok(diff)) => Ok(Arc::new(diff)),
                Ok(Err(err)) => Err(Arc::new(err)),
                Err(join) => Err(Arc::new(DiffError::Worker(join.to_string()))),
            };
            inner.complete(&key, generation, &outcome, started.elapsed());
            tx.send_replace(Some(outcome));
        });
        (rx, task.abort_handle())
    }

    /// Drop every result idle for longer than the configured timeout.
    ///
    /// Expiry also happens lazily on each [`get`](Self::get); this is for
    /// callers that want memory back between builds.
    pub fn purge_expired(&self) -> usize {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        let purged = state.purge_expired(Instant::now(), self.inner.config.idle_timeout());
        if purged > 0 {
            debug!(purged, "expired diffs purged");
        }
        purged
    }

    /// Forget the entry for `descriptor`. A computation in flight keeps
    /// running for its current waiters but its result is not cached.
    pub fn invalidate(&self, descriptor: &DependencyDescriptor) -> bool {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        state.slots.remove(descriptor).is_some()
    }

    /// Number of entries, finished or in flight.
    pub fn len(&self) -> usize {
        self.inner.state.lock().expect("lock poisoned").slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            computations: self.inner.computations.load(Ordering::Relaxed),
            failures: self.inner.failures.load(Ordering::Relaxed),
        }
    }

    /// Cancel computations in flight and drop all entries.
    ///
    /// Waiters of cancelled computations and every later request receive
    /// [`CacheError::Shutdown`]. A computation already running on the blocking
    /// pool finishes the node it is decoding, then stops and closes its
    /// artifacts. Calling this twice is harmless.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        if state.shut_down {
            return;
        }
        state.shut_down = true;
        self.inner.cancel.store(true, Ordering::Relaxed);
        let mut cancelled = 0;
        for (_, slot) in state.slots.drain() {
            if let SlotState::Pending { task, .. } = slot.state {
                task.abort();
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            warn!(cancelled, "diff cache shut down with computations in flight");
        } else {
            debug!("diff cache shut down");
        }
    }
}

fn compute<R: NodeReader>(
    computer: &DiffComputer<R>,
    history: &dyn ArtifactHistory,
    descriptor: &DependencyDescriptor,
    cancel: &AtomicBool,
) -> DiffResult<AbiDiff<R::Node>> {
    let old_file = descriptor
        .old_digest
        .and_then(|digest| history.resolve(&digest));
    computer.diff_until(descriptor, old_file.as_deref(), descriptor.file(), cancel)
}
