//! Cache entry internals.
//!
//! Entries store their value type-erased (an `Arc<V>` behind `dyn Any`) so
//! one map can hold heterogeneous query results; typed access goes through
//! [`CacheSlot::typed`]. The slot also tracks the bookkeeping the eviction
//! and staleness decisions need: fetch timestamp, last use, live subscriber
//! count, and the retention window it was created under.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::ApiError;

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Data present and within its freshness window.
    Fresh,
    /// Data present but past its freshness window or invalidated.
    Stale,
    /// A fetch for this key is in flight.
    Fetching,
    /// The last fetch failed; previous data (if any) is retained.
    Error,
}

pub(crate) struct CacheSlot {
    data: Option<Box<dyn Any + Send + Sync>>,
    pub error: Option<ApiError>,
    pub status: EntryStatus,
    fetched_at: Option<Instant>,
    last_used: Instant,
    pub subscribers: usize,
    retention: Duration,
    stale_time: Duration,
}

impl CacheSlot {
    pub fn empty(retention: Duration) -> Self {
        Self {
            data: None,
            error: None,
            status: EntryStatus::Stale,
            fetched_at: None,
            last_used: Instant::now(),
            subscribers: 0,
            retention,
            stale_time: Duration::ZERO,
        }
    }

    /// Typed read of the stored value. Returns `None` when the slot is empty
    /// or holds a different type (a key reused across types). Named to stay
    /// clear of the map guards' inherent `value` accessors.
    pub fn typed<V: Send + Sync + 'static>(&self) -> Option<Arc<V>> {
        self.data
            .as_ref()
            .and_then(|data| data.downcast_ref::<Arc<V>>().cloned())
    }

    /// Stores a successful fetch result, resetting staleness and error state.
    /// The policy windows are recorded so eviction can judge freshness later.
    pub fn store<V: Send + Sync + 'static>(
        &mut self,
        value: Arc<V>,
        retention: Duration,
        stale_time: Duration,
    ) {
        self.data = Some(Box::new(value));
        self.error = None;
        self.status = EntryStatus::Fresh;
        self.fetched_at = Some(Instant::now());
        self.last_used = Instant::now();
        self.retention = retention;
        self.stale_time = stale_time;
    }

    /// Records a failed fetch. Previous data is retained for display.
    pub fn mark_error(&mut self, error: ApiError) {
        self.error = Some(error);
        self.status = EntryStatus::Error;
        self.last_used = Instant::now();
    }

    /// Marks the entry stale (imperative invalidation).
    pub fn mark_stale(&mut self) {
        if self.status != EntryStatus::Fetching {
            self.status = EntryStatus::Stale;
        }
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// `true` when the data is past its freshness window (or absent, errored,
    /// or explicitly invalidated).
    pub fn is_stale(&self, stale_time: Duration) -> bool {
        if matches!(self.status, EntryStatus::Stale | EntryStatus::Error) {
            return true;
        }
        match self.fetched_at {
            None => true,
            Some(at) => stale_time.is_zero() || at.elapsed() > stale_time,
        }
    }

    /// Records a use, deferring eviction.
    pub fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    /// An entry is evicted once it has no live subscriber, has gone unused
    /// for its retention window, and is no longer fresh under the stale time
    /// it was stored with.
    pub fn should_evict(&self) -> bool {
        self.subscribers == 0
            && self.last_used.elapsed() > self.retention
            && self.is_stale(self.stale_time)
    }
}

impl fmt::Debug for CacheSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSlot")
            .field("has_data", &self.data.is_some())
            .field("status", &self.status)
            .field("error", &self.error)
            .field("subscribers", &self.subscribers)
            .finish_non_exhaustive()
    }
}
