use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::channel::oneshot;
use sentry::{Hub, SentryFutureExt};
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::Instrument;

use crate::config::ResourceCacheConfig;
use crate::fetch::Fetcher;
use crate::utils::futures::CallOnDrop;

use super::{
    CacheEntry, EntryState, EntryStatus, ExpireAfter, FetchError, ResourceKey, ResumeHandle,
    StalenessPolicy,
};

/// What the cache keeps about one resource.
struct Slot<T> {
    /// Identifies the fetch that created this slot.
    generation: u64,
    state: EntryState<T>,
    /// When the entry reached its terminal state.
    settled_at: Option<Instant>,
    last_read: Instant,
    /// Whether the terminal state has been handed out by an access since the entry settled.
    ///
    /// Unobserved entries are neither stale nor evictable, so the first read after the resume
    /// handle settles always sees the terminal state.
    observed: bool,
    /// Set when all readers dropped interest while the fetch is still in flight.
    detached: bool,
}

type EntryMap<T> = HashMap<ResourceKey, Slot<T>>;

struct Inner<T> {
    entries: Mutex<EntryMap<T>>,
    next_generation: AtomicU64,
    in_flight: AtomicU64,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, EntryMap<T>> {
        // A panic while holding the lock cannot leave a slot half-written, so it is safe to
        // keep using the map.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Transitions the pending entry for `key` into a terminal `state`.
    ///
    /// Only applies if the entry still belongs to the fetch identified by `generation`.
    /// Returns `false` if the result was discarded.
    fn settle(&self, key: &ResourceKey, generation: u64, state: EntryState<T>) -> bool {
        let mut entries = self.lock();
        let Some(slot) = entries.get_mut(key) else {
            tracing::debug!(key = %key, "Discarding fetch result, entry is gone");
            return false;
        };
        if slot.generation != generation || slot.state.status().is_terminal() {
            tracing::debug!(
                key = %key,
                generation,
                current = slot.generation,
                "Discarding fetch result of a superseded entry"
            );
            return false;
        }
        if slot.detached {
            entries.remove(key);
            tracing::debug!(key = %key, "Dropping fetch result nobody is interested in");
            return false;
        }

        slot.state = state;
        slot.settled_at = Some(Instant::now());
        slot.observed = false;
        true
    }
}

/// The result of [`ResourceCache::invalidate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    /// A terminal entry was removed, the next access fetches the resource again.
    Removed,
    /// A fetch is still in flight and its result will be used.
    InFlight,
    /// There was no entry for the key.
    Absent,
}

/// Entry counts by status, see [`ResourceCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub pending: usize,
    pub success: usize,
    pub error: usize,
}

impl CacheStats {
    pub fn total(&self) -> usize {
        self.pending + self.success + self.error
    }
}

/// A keyed store of resource fetches.
///
/// The first [`acquire`](Self::acquire) of a key spawns a fetch through the [`Fetcher`] and
/// stores a pending entry. Every other access of that key attaches to the same entry, so for a
/// given key at most one fetch is in flight at any time. Once the fetch completes, the entry
/// holds the value or the error until it is invalidated or considered stale by the
/// [`StalenessPolicy`].
///
/// Cloning the cache is cheap, all clones share the same entries.
pub struct ResourceCache<F: Fetcher> {
    name: Arc<str>,
    max_entries: Option<usize>,
    fetcher: Arc<F>,
    policy: Arc<dyn StalenessPolicy>,
    inner: Arc<Inner<F::Value>>,
    runtime: Handle,
}

impl<F: Fetcher> Clone for ResourceCache<F> {
    fn clone(&self) -> Self {
        // https://github.com/rust-lang/rust/issues/26925
        Self {
            name: Arc::clone(&self.name),
            max_entries: self.max_entries,
            fetcher: Arc::clone(&self.fetcher),
            policy: Arc::clone(&self.policy),
            inner: Arc::clone(&self.inner),
            runtime: self.runtime.clone(),
        }
    }
}

impl<F: Fetcher> fmt::Debug for ResourceCache<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .inner
            .entries
            .try_lock()
            .map(|entries| entries.len())
            .unwrap_or_default();
        f.debug_struct("ResourceCache")
            .field("name", &self.name)
            .field("entries", &entries)
            .field("in_flight", &self.inner.in_flight.load(Ordering::Relaxed))
            .field("max_entries", &self.max_entries)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<F: Fetcher> ResourceCache<F> {
    /// Creates a cache that spawns its fetches on `runtime`.
    ///
    /// The staleness policy is built from the configured expiration times, see [`ExpireAfter`].
    pub fn new(config: &ResourceCacheConfig, fetcher: F, runtime: Handle) -> Self {
        Self {
            name: config.name.as_str().into(),
            max_entries: config.max_entries,
            fetcher: Arc::new(fetcher),
            policy: Arc::new(ExpireAfter::from_config(config)),
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                in_flight: AtomicU64::new(0),
            }),
            runtime,
        }
    }

    /// Replaces the staleness policy.
    pub fn with_policy(mut self, policy: impl StalenessPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Returns the entry for `key`, creating it if needed.
    ///
    /// If there is no entry, or the existing terminal entry is stale, this stores a pending
    /// entry and spawns a fetch for it. Otherwise the existing entry is returned unchanged.
    ///
    /// This never blocks on the fetch and never fails. Fetch errors are recorded in the entry.
    pub fn acquire(&self, key: &ResourceKey) -> CacheEntry<F::Value> {
        let name = self.name();
        metric!(counter("resources.access") += 1, "cache" => name);
        let now = Instant::now();

        let (generation, sender, handle) = {
            let mut entries = self.inner.lock();

            if let Some(slot) = entries.get_mut(key) {
                slot.last_read = now;
                let stale = match slot.settled_at {
                    None => false,
                    Some(_) if !slot.observed => {
                        slot.observed = true;
                        false
                    }
                    Some(settled_at) => self
                        .policy
                        .is_stale(slot.state.status(), now.duration_since(settled_at)),
                };

                if !stale {
                    if let EntryState::Pending(_) = slot.state {
                        // A concurrent access was deduplicated.
                        metric!(counter("resources.channel.hit") += 1, "cache" => name);
                        if slot.detached {
                            tracing::debug!(key = %key, "Re-attaching to in-flight fetch");
                            slot.detached = false;
                        }
                    } else {
                        metric!(counter("resources.memory.hit") += 1, "cache" => name);
                    }
                    tracing::trace!(key = %key, status = %slot.state.status(), "Resource cache hit");
                    return CacheEntry::new(key.clone(), slot.state.clone());
                }

                metric!(
                    counter("resources.stale") += 1,
                    "cache" => name,
                    "status" => slot.state.status().as_str(),
                );
                tracing::debug!(key = %key, status = %slot.state.status(), "Refetching stale resource");
            }

            let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
            let (sender, handle) = ResumeHandle::channel();
            entries.insert(
                key.clone(),
                Slot {
                    generation,
                    state: EntryState::Pending(handle.clone()),
                    settled_at: None,
                    last_read: now,
                    observed: false,
                    detached: false,
                },
            );
            self.evict_over_capacity(&mut entries);

            (generation, sender, handle)
        };

        // The fetcher is invoked outside of the lock, it may well access the cache itself.
        self.spawn_fetch(key.clone(), generation, sender);

        CacheEntry::new(key.clone(), EntryState::Pending(handle))
    }

    /// Returns the entry for `key` without creating it or starting a fetch.
    pub fn peek(&self, key: &ResourceKey) -> Option<CacheEntry<F::Value>> {
        let entries = self.inner.lock();
        entries
            .get(key)
            .map(|slot| CacheEntry::new(key.clone(), slot.state.clone()))
    }

    /// Removes the terminal entry for `key`, so that the next access fetches it again.
    ///
    /// Pending entries are left untouched: the fetch in flight will produce the freshest result
    /// anyway, and replacing it would start a second fetch for the same key.
    pub fn invalidate(&self, key: &ResourceKey) -> Invalidation {
        let mut entries = self.inner.lock();
        let invalidation = match entries.get(key).map(|slot| slot.state.status()) {
            None => Invalidation::Absent,
            Some(EntryStatus::Pending) => Invalidation::InFlight,
            Some(_) => {
                entries.remove(key);
                Invalidation::Removed
            }
        };
        tracing::debug!(key = %key, ?invalidation, "Invalidated resource");
        invalidation
    }

    /// Drops interest in `key`.
    ///
    /// A terminal entry is removed. A pending entry is detached: its fetch still runs to
    /// completion, but the result is thrown away unless the key is acquired again in the meantime.
    ///
    /// Returns `false` if there was no entry for the key.
    pub fn forget(&self, key: &ResourceKey) -> bool {
        let mut entries = self.inner.lock();
        match entries.get(key).map(|slot| slot.state.status()) {
            None => false,
            Some(EntryStatus::Pending) => {
                if let Some(slot) = entries.get_mut(key) {
                    slot.detached = true;
                }
                true
            }
            Some(_) => {
                entries.remove(key);
                true
            }
        }
    }

    /// Invalidates all terminal entries.
    pub fn clear(&self) {
        let mut entries = self.inner.lock();
        entries.retain(|_, slot| !slot.state.status().is_terminal());
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.inner.lock();
        let mut stats = CacheStats::default();
        for slot in entries.values() {
            match slot.state.status() {
                EntryStatus::Pending => stats.pending += 1,
                EntryStatus::Success => stats.success += 1,
                EntryStatus::Error => stats.error += 1,
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evicts the least recently read terminal entries until the capacity is met.
    ///
    /// Entries that settled but have not been read since are kept, just like pending ones.
    fn evict_over_capacity(&self, entries: &mut EntryMap<F::Value>) {
        let Some(max_entries) = self.max_entries else {
            return;
        };

        while entries.len() > max_entries {
            let lru = entries
                .iter()
                .filter(|(_, slot)| slot.observed && slot.state.status().is_terminal())
                .min_by_key(|(_, slot)| slot.last_read)
                .map(|(key, _)| key.clone());

            // Everything left is in flight or waiting for its first read.
            let Some(key) = lru else {
                break;
            };
            entries.remove(&key);
            metric!(counter("resources.evicted") += 1, "cache" => self.name());
            tracing::debug!(key = %key, "Evicted resource over capacity");
        }
    }

    /// Spawns the fetch for a freshly created pending entry.
    fn spawn_fetch(&self, key: ResourceKey, generation: u64, sender: oneshot::Sender<()>) {
        let name = Arc::clone(&self.name);
        metric!(counter("resources.fetch") += 1, "cache" => &name);

        let in_flight = self.inner.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        metric!(gauge("resources.in_flight") = in_flight, "cache" => &name);
        let done_token = {
            let inner = Arc::clone(&self.inner);
            let name = Arc::clone(&name);
            CallOnDrop::new(move || {
                let in_flight = inner.in_flight.fetch_sub(1, Ordering::Relaxed) - 1;
                metric!(gauge("resources.in_flight") = in_flight, "cache" => &name);
            })
        };

        let span = tracing::debug_span!("fetch_resource", key = %key, generation);
        let settlement = Settlement {
            inner: Arc::clone(&self.inner),
            name,
            key,
            generation,
            sender: Some(sender),
        };
        let fetch = self.fetcher.fetch(&settlement.key);

        let task = async move {
            let _done_token = done_token; // move into the future

            let start = Instant::now();
            let result = fetch.await;
            metric!(
                timer("resources.fetch.duration") = start.elapsed(),
                "cache" => &settlement.name,
            );

            settlement.complete(result);
        }
        .instrument(span)
        .bind_hub(Hub::new_from_top(Hub::current()));

        self.runtime.spawn(task);
    }
}

/// Settles the entry of one fetch, and its resume handle.
///
/// If this is dropped before [`complete`](Self::complete) is called, the entry settles with
/// [`FetchError::Cancelled`], so readers waiting on the resume handle observe a terminal state.
struct Settlement<T> {
    inner: Arc<Inner<T>>,
    name: Arc<str>,
    key: ResourceKey,
    generation: u64,
    sender: Option<oneshot::Sender<()>>,
}

impl<T> Settlement<T> {
    fn complete(mut self, result: Result<T, FetchError>) {
        self.settle(result);
    }

    fn settle(&mut self, result: Result<T, FetchError>) {
        let Some(sender) = self.sender.take() else {
            return;
        };

        let status = match &result {
            Ok(_) => "success",
            Err(err) => err.metrics_tag(),
        };
        metric!(
            counter("resources.fetch.result") += 1,
            "cache" => &self.name,
            "status" => status,
        );

        let state = match result {
            Ok(value) => EntryState::Success(Arc::new(value)),
            Err(err) => {
                tracing::debug!(key = %self.key, error = %err, "Fetching resource failed");
                EntryState::Error(err)
            }
        };

        if !self.inner.settle(&self.key, self.generation, state) {
            metric!(counter("resources.discarded") += 1, "cache" => &self.name);
        }

        // Settle the entry first, so that woken readers observe the terminal state.
        sender.send(()).ok();
    }
}

impl<T> Drop for Settlement<T> {
    fn drop(&mut self) {
        if self.sender.is_some() {
            tracing::warn!(key = %self.key, "Fetch was dropped before completing");
            self.settle(Err(FetchError::Cancelled));
        }
    }
}
