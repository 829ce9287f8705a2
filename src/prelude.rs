//! Prelude module for convenient imports.
//!
//! ```
//! use linkfeed::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`ApiClient`] - The assembled client handle
//! - [`ApiError`] - The normalized error type
//! - [`Query`], [`QueryClient`], [`QueryKey`], [`QueryPolicy`] - The query cache
//! - [`Mutation`] - Declarative write operations
//! - [`LoadingGate`] - The global busy signal
//! - [`Notice`], [`Notifier`] - User-facing notices

pub use crate::api::ApiClient;
pub use crate::error::ApiError;
pub use crate::loading::LoadingGate;
pub use crate::mutation::Mutation;
pub use crate::notify::{Notice, NoticeKind, Notifier};
pub use crate::query::{Query, QueryClient, QueryKey, QueryPolicy, QuerySnapshot, QueryState};
pub use crate::token::TokenStore;
pub use crate::transport::{Request, Transport};
