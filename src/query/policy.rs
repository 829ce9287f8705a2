//! Per-query freshness policy.

use std::time::Duration;

/// Controls when a query's cached data is refetched and how long an unused
/// entry survives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPolicy {
    /// When `false` the query never fetches; cached data (if any) is still
    /// emitted.
    pub enabled: bool,
    /// How long after a fetch the data counts as fresh. Fresh data is served
    /// from cache on mount with no network call.
    pub stale_time: Duration,
    /// How long an unused entry (no live subscriber) survives before
    /// eviction.
    pub retention: Duration,
    /// Fixed polling period while a subscriber is mounted. `None` disables
    /// polling.
    pub refetch_interval: Option<Duration>,
    /// Refetch stale entries when the host application signals focus.
    pub refetch_on_focus: bool,
    /// Refetch a stale entry on mount. When `false`, a stale mount serves
    /// cached data and relies on polling or invalidation to refresh it.
    pub refetch_on_mount: bool,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_time: Duration::ZERO,          // immediately stale
            retention: Duration::from_secs(300), // 5 minutes
            refetch_interval: None,
            refetch_on_focus: false,
            refetch_on_mount: true,
        }
    }
}

impl QueryPolicy {
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    #[must_use]
    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    #[must_use]
    pub fn refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = Some(interval);
        self
    }

    #[must_use]
    pub fn no_polling(mut self) -> Self {
        self.refetch_interval = None;
        self
    }

    #[must_use]
    pub fn refetch_on_focus(mut self, refetch: bool) -> Self {
        self.refetch_on_focus = refetch;
        self
    }

    #[must_use]
    pub fn refetch_on_mount(mut self, refetch: bool) -> Self {
        self.refetch_on_mount = refetch;
        self
    }
}
