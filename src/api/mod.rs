//! The assembled client: transport, query cache, and the typed services
//! built on top of them.
//!
//! [`ApiClient`] wires one [`Transport`] to one [`QueryClient`] and exposes
//! both to the service modules ([`users`], [`posts`], [`comments`]), which
//! define the concrete queries and mutations for each endpoint. Everything
//! hangs off the one client: the busy signal, notices, and the stored token
//! are all reachable from it, so a host application holds a single handle.

pub mod comments;
pub mod endpoints;
pub mod models;
pub mod posts;
pub mod users;

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::loading::LoadingGate;
use crate::notify::Notifier;
use crate::query::{Fetcher, QueryClient};
use crate::token::{MemoryTokenStore, TokenStore};
use crate::transport::{Request, Transport};

/// One handle to the whole data layer. Cloning is cheap and all clones share
/// state.
#[derive(Debug, Clone)]
pub struct ApiClient {
    transport: Arc<Transport>,
    queries: QueryClient,
}

impl ApiClient {
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let transport = Transport::new(config, tokens, LoadingGate::new(), Notifier::new())?;
        Ok(Self {
            transport: Arc::new(transport),
            queries: QueryClient::new(),
        })
    }

    /// Builds a client from environment configuration with in-memory token
    /// storage.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::new(ClientConfig::from_env(), Arc::new(MemoryTokenStore::new()))
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    pub fn gate(&self) -> &LoadingGate {
        self.transport.gate()
    }

    pub fn notifier(&self) -> &Notifier {
        self.transport.notifier()
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        self.transport.tokens()
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.tokens().is_logged_in()
    }

    /// Clears the stored token and empties the query cache.
    pub fn logout(&self) {
        tracing::debug!("logging out, clearing token and cache");
        self.tokens().clear();
        self.queries.clear();
    }

    /// A GET fetcher for `path`. Background fetches mark the request
    /// suppressed so refetches never flash the global busy signal.
    pub(crate) fn get_fetcher<T>(&self, path: String) -> Fetcher<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let transport = Arc::clone(&self.transport);
        Arc::new(move |mode| {
            let transport = Arc::clone(&transport);
            let path = path.clone();
            Box::pin(async move {
                transport
                    .send(Request::get(path).suppress_loading(mode.suppresses_loading()))
                    .await
            })
        })
    }
}
