//! The query subscription: a stream of snapshots for one cache key.
//!
//! Mounting a [`Query`] (calling [`Query::stream`]) registers a live
//! subscriber for its key and drives the fetch lifecycle:
//!
//! 1. cached fresh data is emitted synchronously with no network call;
//! 2. a missing entry emits `Loading` and triggers a foreground fetch; a
//!    stale entry emits the stale data first, then refetches if the policy's
//!    `refetch_on_mount` says so;
//! 3. after settling, the stream waits on invalidation, focus, and the
//!    polling interval; every refetch from there on is a background fetch
//!    that never touches the global busy signal.
//!
//! Concurrent mounts of the same key coalesce into one in-flight fetch via
//! [`QueryClient::fetch_with`].

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::sync::broadcast;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::error::ApiError;

use super::{FetchMode, Fetcher, QueryClient, QueryKey, QueryPolicy, SubscriberGuard};

/// Observable state of a query.
#[derive(Debug)]
pub enum QueryState<V> {
    /// Disabled with nothing cached.
    Idle,
    /// First fetch in flight, nothing cached yet.
    Loading,
    /// Cached data available. `is_stale` flags data past its freshness
    /// window (a background refetch may be under way).
    Ready { data: Arc<V>, is_stale: bool },
    /// The last fetch failed. Previously cached data, when present, is
    /// retained for display.
    Failed { error: ApiError, data: Option<Arc<V>> },
}

impl<V> Clone for QueryState<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Idle => Self::Idle,
            Self::Loading => Self::Loading,
            Self::Ready { data, is_stale } => Self::Ready {
                data: Arc::clone(data),
                is_stale: *is_stale,
            },
            Self::Failed { error, data } => Self::Failed {
                error: error.clone(),
                data: data.as_ref().map(Arc::clone),
            },
        }
    }
}

/// One emission of a [`Query`] stream.
#[derive(Debug)]
pub struct QuerySnapshot<V> {
    pub state: QueryState<V>,
}

impl<V> Clone for QuerySnapshot<V> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<V> QuerySnapshot<V> {
    pub(crate) fn idle() -> Self {
        Self {
            state: QueryState::Idle,
        }
    }

    pub(crate) fn loading() -> Self {
        Self {
            state: QueryState::Loading,
        }
    }

    pub(crate) fn ready(data: Arc<V>, is_stale: bool) -> Self {
        Self {
            state: QueryState::Ready { data, is_stale },
        }
    }

    pub(crate) fn failed(error: ApiError, data: Option<Arc<V>>) -> Self {
        Self {
            state: QueryState::Failed { error, data },
        }
    }

    /// The displayable data, retained through errors and refetches.
    #[must_use]
    pub fn data(&self) -> Option<Arc<V>> {
        match &self.state {
            QueryState::Ready { data, .. } => Some(Arc::clone(data)),
            QueryState::Failed { data, .. } => data.as_ref().map(Arc::clone),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&ApiError> {
        match &self.state {
            QueryState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self.state, QueryState::Loading)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.state, QueryState::Ready { .. })
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.state, QueryState::Failed { .. })
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self.state, QueryState::Ready { is_stale: true, .. })
    }
}

/// A cached, policy-driven subscription to one key.
pub struct Query<V> {
    key: QueryKey,
    fetcher: Fetcher<V>,
    client: QueryClient,
    policy: QueryPolicy,
}

impl<V> Query<V>
where
    V: PartialEq + Send + Sync + 'static,
{
    pub fn new(key: QueryKey, fetcher: Fetcher<V>, client: QueryClient, policy: QueryPolicy) -> Self {
        Self {
            key,
            fetcher,
            client,
            policy,
        }
    }

    #[must_use]
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    #[must_use]
    pub fn policy(&self) -> &QueryPolicy {
        &self.policy
    }

    /// Imperative refetch: invalidates this query's key, which wakes every
    /// mounted stream for it (including this one).
    pub fn refetch(&self) {
        self.client.invalidate(self.key.clone());
    }

    /// Mounts the query, yielding a snapshot for every state change.
    ///
    /// Dropping the stream unregisters the subscriber; an in-flight fetch is
    /// not cancelled and its result still lands in the cache.
    pub fn stream(&self) -> BoxStream<'static, QuerySnapshot<V>> {
        let key = self.key.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let client = self.client.clone();
        let policy = self.policy.clone();

        let flow = Flow {
            phase: Phase::Init,
            inv_rx: client.subscribe_invalidation(),
            focus_rx: client.subscribe_focus(),
            ticker: policy.refetch_interval.map(|period| {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                ticker
            }),
            _subscriber: client.register(&key, policy.retention),
        };

        stream::unfold(Some(flow), move |state| {
            let key = key.clone();
            let fetcher = Arc::clone(&fetcher);
            let client = client.clone();
            let policy = policy.clone();

            async move {
                let mut flow = state?;
                loop {
                    match flow.phase {
                        Phase::Init => {
                            client.sweep();
                            let snap = client.snapshot::<V>(&key, policy.stale_time);

                            if !policy.enabled {
                                // Disabled queries never fetch; emit whatever
                                // is cached, then end.
                                flow.phase = Phase::Finished;
                                let snap = snap.unwrap_or_else(QuerySnapshot::idle);
                                return Some((snap, Some(flow)));
                            }

                            match snap {
                                Some(snap) => {
                                    let stale = client.is_stale(&key, policy.stale_time);
                                    flow.phase = if stale && policy.refetch_on_mount {
                                        Phase::Fetch(FetchMode::Foreground)
                                    } else {
                                        Phase::Settled
                                    };
                                    return Some((snap, Some(flow)));
                                }
                                None => {
                                    flow.phase = Phase::Fetch(FetchMode::Foreground);
                                    return Some((QuerySnapshot::loading(), Some(flow)));
                                }
                            }
                        }

                        Phase::Fetch(mode) => {
                            let result = client.fetch_with(&key, &policy, &fetcher, mode).await;
                            flow.phase = Phase::Settled;

                            // The cache is authoritative; the fetch result
                            // only fills in if the entry vanished meanwhile.
                            let snap = match (client.snapshot::<V>(&key, policy.stale_time), result)
                            {
                                (Some(snap), _) => snap,
                                (None, Ok(data)) => QuerySnapshot::ready(data, false),
                                (None, Err(error)) => QuerySnapshot::failed(error, None),
                            };
                            return Some((snap, Some(flow)));
                        }

                        Phase::Settled => {
                            if wait_for_wake(&mut flow, &key, &policy, &client).await.is_none() {
                                return None;
                            }
                            // Refetches of a mounted query are background:
                            // data is already rendered, the global busy
                            // signal stays quiet.
                            flow.phase = Phase::Fetch(FetchMode::Background);
                        }

                        Phase::Finished => return None,
                    }
                }
            }
        })
        .boxed()
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Init,
    Fetch(FetchMode),
    Settled,
    Finished,
}

struct Flow {
    phase: Phase,
    inv_rx: broadcast::Receiver<QueryKey>,
    focus_rx: broadcast::Receiver<()>,
    ticker: Option<Interval>,
    _subscriber: SubscriberGuard,
}

/// Waits for the next reason to refetch. Returns `None` when the client is
/// gone and the stream should end.
async fn wait_for_wake(
    flow: &mut Flow,
    key: &QueryKey,
    policy: &QueryPolicy,
    client: &QueryClient,
) -> Option<()> {
    let Flow {
        inv_rx,
        focus_rx,
        ticker,
        ..
    } = flow;

    loop {
        let tick = async {
            match ticker.as_mut() {
                Some(ticker) => {
                    ticker.tick().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            invalidated = inv_rx.recv() => match invalidated {
                Ok(prefix) if key.starts_with(&prefix) => return Some(()),
                Ok(_) => {}
                // Lagging may have dropped an invalidation for this key;
                // refetching is the safe recovery.
                Err(broadcast::error::RecvError::Lagged(_)) => return Some(()),
                Err(broadcast::error::RecvError::Closed) => return None,
            },
            focused = focus_rx.recv() => match focused {
                Ok(()) if policy.refetch_on_focus
                    && client.is_stale(key, policy.stale_time) => return Some(()),
                Ok(()) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {}
            },
            () = tick => return Some(()),
        }
    }
}
