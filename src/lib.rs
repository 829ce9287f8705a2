//! # Linkfeed - Social Feed Client Data Layer
//!
//! Linkfeed is the headless data layer of a social feed client: a configured
//! HTTP transport, a query cache with request de-duplication and background
//! refetching, declarative mutations with cache invalidation, and the typed
//! services for the feed API (auth, posts, comments) built on top.
//!
//! ## Architecture
//!
//! The layer is built from five cooperating pieces:
//!
//! 1. **Transport**: One configured HTTP client that attaches the stored
//!    bearer token, normalizes failures, and drives the busy signal
//! 2. **Queries**: Cached, policy-driven subscriptions where fresh data is
//!    served from cache, concurrent fetches of one key coalesce, and
//!    invalidation triggers background refetches
//! 3. **Mutations**: Declarative writes that invalidate cache prefixes and
//!    emit success notices when they land
//! 4. **Loading**: A ref-counted busy signal that flips only at the empty
//!    and non-empty boundary, so overlapping requests produce one indicator
//! 5. **Notices**: A broadcast channel of success/error messages for the
//!    host UI to toast
//!
//! ## Core Components
//!
//! - [`ApiClient`](api::ApiClient): The single handle wiring everything
//!   together
//! - [`QueryClient`](query::QueryClient): The cache and invalidation hub
//! - [`Query`](query::Query): A subscription to one cached key, consumed as
//!   a stream of snapshots
//! - [`Mutation`](mutation::Mutation): A reusable write operation
//!
//! ## Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use linkfeed::api::{self, ApiClient};
//! use linkfeed::api::models::Credentials;
//!
//! # async fn run() -> Result<(), linkfeed::error::ApiError> {
//! let client = ApiClient::from_env()?;
//!
//! api::users::sign_in(&client, Credentials {
//!     email: "mina@example.com".into(),
//!     password: "secret123".into(),
//! })
//! .await?;
//!
//! let mut feed = api::posts::all_posts(&client).stream();
//! while let Some(snapshot) = feed.next().await {
//!     if let Some(posts) = snapshot.data() {
//!         println!("{} posts", posts.posts.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod loading;
pub mod mutation;
pub mod notify;
pub mod prelude;
pub mod query;
pub mod token;
pub mod transport;
