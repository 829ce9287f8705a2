//! Query caching with de-duplication, invalidation, and background refetch.
//!
//! The [`QueryClient`] is the central cache: a key → entry store plus the
//! broadcast channels that drive refetching. [`Query`] (see [`stream`]) is
//! the subscription view over one key: it emits a [`QuerySnapshot`] whenever
//! the entry changes state, handles polling and focus refetch per its
//! [`QueryPolicy`], and coalesces with every other subscriber of the same
//! key so a key never has more than one fetch in flight.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use linkfeed::query::{FetchMode, QueryClient, QueryKey, QueryPolicy};
//!
//! let client = QueryClient::new();
//! let query = client.watch(
//!     QueryKey::new(["post", "42"]),
//!     QueryPolicy::default(),
//!     Arc::new(|_mode| Box::pin(fetch_post_42())),
//! );
//!
//! let mut updates = query.stream();
//! while let Some(snapshot) = updates.next().await {
//!     // render snapshot.data() / snapshot.error()
//! }
//!
//! // After a mutation elsewhere:
//! client.invalidate(QueryKey::from("post")); // prefix hit, triggers refetch
//! ```

mod cache;
pub mod key;
pub mod policy;
mod stream;

pub use cache::EntryStatus;
pub use key::QueryKey;
pub use policy::QueryPolicy;
pub use stream::{Query, QuerySnapshot, QueryState};

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::BoxFuture;
use tokio::sync::broadcast;

use crate::error::{ApiError, GENERIC_MESSAGE};

use cache::CacheSlot;

/// Whether a fetch drives the global loading indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// First load of a mounted query: the busy signal is shown.
    Foreground,
    /// Background refetch (polling, invalidation, focus): suppressed.
    Background,
}

impl FetchMode {
    /// `true` when the transport call should skip the loading gate.
    #[must_use]
    pub fn suppresses_loading(self) -> bool {
        matches!(self, Self::Background)
    }
}

/// An async fetch function for one query.
///
/// The [`FetchMode`] tells the fetcher whether to mark the transport request
/// suppressed; it must be forwarded into the request descriptor.
pub type Fetcher<V> =
    Arc<dyn Fn(FetchMode) -> BoxFuture<'static, Result<V, ApiError>> + Send + Sync>;

const INVALIDATION_CAPACITY: usize = 100;
const FOCUS_CAPACITY: usize = 16;

/// The central cache and invalidation hub for queries.
///
/// Cloning is cheap; all clones share the same cache. Construct one per
/// process (it is injected, not global) and hand clones to every query.
#[derive(Debug, Clone)]
pub struct QueryClient {
    cache: Arc<DashMap<QueryKey, CacheSlot>>,
    inflight: Arc<DashMap<QueryKey, broadcast::Sender<()>>>,
    invalidation_tx: broadcast::Sender<QueryKey>,
    focus_tx: broadcast::Sender<()>,
}

impl QueryClient {
    #[must_use]
    pub fn new() -> Self {
        let (invalidation_tx, _) = broadcast::channel(INVALIDATION_CAPACITY);
        let (focus_tx, _) = broadcast::channel(FOCUS_CAPACITY);
        Self {
            cache: Arc::new(DashMap::new()),
            inflight: Arc::new(DashMap::new()),
            invalidation_tx,
            focus_tx,
        }
    }

    /// Creates the subscription view for one key.
    pub fn watch<V>(&self, key: QueryKey, policy: QueryPolicy, fetcher: Fetcher<V>) -> Query<V>
    where
        V: PartialEq + Send + Sync + 'static,
    {
        Query::new(key, fetcher, self.clone(), policy)
    }

    /// One-shot imperative fetch honoring cache freshness: fresh data is
    /// returned without a network call, otherwise the fetch coalesces with
    /// any in-flight fetch for the key.
    pub async fn fetch<V>(
        &self,
        key: &QueryKey,
        policy: &QueryPolicy,
        fetcher: &Fetcher<V>,
    ) -> Result<Arc<V>, ApiError>
    where
        V: PartialEq + Send + Sync + 'static,
    {
        if !self.is_stale(key, policy.stale_time) {
            if let Some(cached) = self.peek::<V>(key) {
                return Ok(cached);
            }
        }
        let mode = if self.has_data(key) {
            FetchMode::Background
        } else {
            FetchMode::Foreground
        };
        self.fetch_with(key, policy, fetcher, mode).await
    }

    /// Marks every entry whose key starts with `prefix` stale and notifies
    /// mounted queries so they refetch.
    pub fn invalidate(&self, prefix: impl Into<QueryKey>) {
        let prefix = prefix.into();
        tracing::debug!(%prefix, "invalidating cache entries");
        for mut entry in self.cache.iter_mut() {
            if entry.key().starts_with(&prefix) {
                entry.value_mut().mark_stale();
            }
        }
        let _ = self.invalidation_tx.send(prefix);
        self.sweep();
    }

    /// Drops a single entry outright.
    pub fn remove(&self, key: &QueryKey) {
        self.cache.remove(key);
    }

    /// Empties the cache (e.g. on logout).
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Signals that the host application regained focus; queries that opted
    /// into focus refetching re-evaluate their staleness.
    pub fn notify_focus(&self) {
        let _ = self.focus_tx.send(());
    }

    /// The cached value for `key`, if present and of type `V`. Counts as a
    /// use for retention purposes.
    #[must_use]
    pub fn peek<V: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<V>> {
        let mut slot = self.cache.get_mut(key)?;
        slot.touch();
        slot.typed::<V>()
    }

    #[must_use]
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.cache.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Fetches `key`, coalescing with any in-flight fetch: the first caller
    /// becomes the leader and starts the fetcher; every concurrent caller
    /// awaits the leader's completion and reads the settled entry. This is
    /// what keeps "at most one in-flight fetch per key" true.
    pub(crate) async fn fetch_with<V>(
        &self,
        key: &QueryKey,
        policy: &QueryPolicy,
        fetcher: &Fetcher<V>,
        mode: FetchMode,
    ) -> Result<Arc<V>, ApiError>
    where
        V: PartialEq + Send + Sync + 'static,
    {
        let retention = policy.retention;
        let stale_time = policy.stale_time;
        self.sweep();

        enum Role {
            Leader(InflightGuard),
            Joiner(broadcast::Receiver<()>),
        }

        // The entry lock is held only for this synchronous decision.
        let role = match self.inflight.entry(key.clone()) {
            Entry::Occupied(entry) => Role::Joiner(entry.get().subscribe()),
            Entry::Vacant(entry) => {
                let (tx, _) = broadcast::channel(1);
                entry.insert(tx.clone());
                Role::Leader(InflightGuard {
                    inflight: Arc::clone(&self.inflight),
                    key: key.clone(),
                    tx,
                })
            }
        };

        match role {
            Role::Joiner(mut rx) => {
                tracing::debug!(%key, "joining in-flight fetch");
                // Err(Closed) also means the leader settled (or was dropped);
                // either way the cache now holds the latest state.
                let _ = rx.recv().await;
                self.read_settled(key)
            }
            Role::Leader(guard) => {
                self.with_slot(key, retention, |slot| {
                    slot.status = EntryStatus::Fetching;
                    slot.touch();
                });

                // The fetch runs on its own task: cancelling the leader's
                // caller must not cancel the network call, and the result
                // still lands in the cache for joiners and future mounts.
                let client = self.clone();
                let owned_key = key.clone();
                let fetch = fetcher(mode);
                let settle = tokio::spawn(async move {
                    let result = match fetch.await {
                        Ok(value) => {
                            Ok(client.store_shared(&owned_key, retention, stale_time, value))
                        }
                        Err(err) => {
                            client.with_slot(&owned_key, retention, |slot| {
                                slot.mark_error(err.clone());
                            });
                            Err(err)
                        }
                    };
                    // Removes the in-flight marker and wakes joiners only
                    // once the cache has settled.
                    drop(guard);
                    result
                });

                match settle.await {
                    Ok(result) => result,
                    // The fetcher panicked; the guard already woke joiners.
                    Err(err) => {
                        tracing::warn!(%key, error = %err, "fetch task failed");
                        Err(ApiError::network(GENERIC_MESSAGE))
                    }
                }
            }
        }
    }

    pub(crate) fn is_stale(&self, key: &QueryKey, stale_time: Duration) -> bool {
        self.cache
            .get(key)
            .is_none_or(|slot| slot.is_stale(stale_time))
    }

    pub(crate) fn has_data(&self, key: &QueryKey) -> bool {
        self.cache.get(key).is_some_and(|slot| slot.has_data())
    }

    /// Registers a live subscriber for `key`, pinning the entry against
    /// eviction until the guard drops.
    pub(crate) fn register(&self, key: &QueryKey, retention: Duration) -> SubscriberGuard {
        self.with_slot(key, retention, |slot| {
            slot.subscribers += 1;
            slot.touch();
        });
        SubscriberGuard {
            cache: Arc::clone(&self.cache),
            key: key.clone(),
        }
    }

    pub(crate) fn subscribe_invalidation(&self) -> broadcast::Receiver<QueryKey> {
        self.invalidation_tx.subscribe()
    }

    pub(crate) fn subscribe_focus(&self) -> broadcast::Receiver<()> {
        self.focus_tx.subscribe()
    }

    /// The current state of `key` as a snapshot, or `None` when no entry
    /// exists. Counts as a use.
    pub(crate) fn snapshot<V>(&self, key: &QueryKey, stale_time: Duration) -> Option<QuerySnapshot<V>>
    where
        V: Send + Sync + 'static,
    {
        let mut slot = self.cache.get_mut(key)?;
        slot.touch();
        let data = slot.typed::<V>();
        let state = match slot.status {
            EntryStatus::Error => QueryState::Failed {
                error: slot
                    .error
                    .clone()
                    .unwrap_or_else(|| ApiError::network(GENERIC_MESSAGE)),
                data,
            },
            _ => match data {
                Some(data) => QueryState::Ready {
                    is_stale: slot.is_stale(stale_time),
                    data,
                },
                None => return None,
            },
        };
        Some(QuerySnapshot { state })
    }

    /// Evicts entries past their retention window with no live subscriber.
    pub(crate) fn sweep(&self) {
        self.cache.retain(|key, slot| {
            let evict = slot.should_evict();
            if evict {
                tracing::debug!(%key, "evicting unused cache entry");
            }
            !evict
        });
    }

    /// Stores a fetch result with structural sharing: a value deep-equal to
    /// the cached one keeps the existing `Arc`, so consumers relying on
    /// pointer identity see no spurious change.
    fn store_shared<V>(
        &self,
        key: &QueryKey,
        retention: Duration,
        stale_time: Duration,
        value: V,
    ) -> Arc<V>
    where
        V: PartialEq + Send + Sync + 'static,
    {
        let mut slot = self
            .cache
            .entry(key.clone())
            .or_insert_with(|| CacheSlot::empty(retention));
        let arc = match slot.typed::<V>() {
            Some(existing) if *existing == value => existing,
            _ => Arc::new(value),
        };
        slot.store(arc.clone(), retention, stale_time);
        arc
    }

    fn read_settled<V>(&self, key: &QueryKey) -> Result<Arc<V>, ApiError>
    where
        V: Send + Sync + 'static,
    {
        let Some(mut slot) = self.cache.get_mut(key) else {
            return Err(ApiError::network(GENERIC_MESSAGE));
        };
        slot.touch();
        if slot.status == EntryStatus::Error {
            if let Some(err) = slot.error.clone() {
                return Err(err);
            }
        }
        slot.typed::<V>()
            .ok_or_else(|| ApiError::network(GENERIC_MESSAGE))
    }

    fn with_slot(&self, key: &QueryKey, retention: Duration, f: impl FnOnce(&mut CacheSlot)) {
        let mut slot = self
            .cache
            .entry(key.clone())
            .or_insert_with(|| CacheSlot::empty(retention));
        f(&mut slot);
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the in-flight marker and wakes joiners when the fetch task
/// settles, including by panic.
struct InflightGuard {
    inflight: Arc<DashMap<QueryKey, broadcast::Sender<()>>>,
    key: QueryKey,
    tx: broadcast::Sender<()>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inflight.remove(&self.key);
        let _ = self.tx.send(());
    }
}

/// Pins a cache entry while a query stream is mounted.
pub(crate) struct SubscriberGuard {
    cache: Arc<DashMap<QueryKey, CacheSlot>>,
    key: QueryKey,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        if let Some(mut slot) = self.cache.get_mut(&self.key) {
            slot.subscribers = slot.subscribers.saturating_sub(1);
            slot.touch();
        }
    }
}
