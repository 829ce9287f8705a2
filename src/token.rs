//! Persisted auth token storage.
//!
//! One token string lives under a fixed key ([`TOKEN_KEY`]); its presence is
//! the sole "logged in" signal. The [`TokenStore`] trait abstracts where the
//! token lives so the transport and tests can share an in-memory store while
//! real deployments persist to disk.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Fixed storage key for the auth token.
pub const TOKEN_KEY: &str = "access_token";

/// Storage for the single auth token.
pub trait TokenStore: Send + Sync + fmt::Debug {
    /// The stored token, if any.
    fn get(&self) -> Option<String>;

    /// Stores (or replaces) the token.
    fn set(&self, token: &str);

    /// Removes the token. Clearing an empty store is a no-op.
    fn clear(&self);

    /// Presence of the token is the "logged in" signal.
    fn is_logged_in(&self) -> bool {
        self.get().is_some()
    }
}

/// In-memory token store. The default for tests and short-lived clients.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set(&self, token: &str) {
        let mut guard = match self.token.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(token.to_string());
    }

    fn clear(&self) {
        let mut guard = match self.token.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = None;
    }
}

/// File-backed token store: the token is a single file named [`TOKEN_KEY`]
/// inside the given directory.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(TOKEN_KEY),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<String> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        let token = contents.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }

    fn set(&self, token: &str) {
        if let Err(err) = std::fs::write(&self.path, token) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to persist token");
        }
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to clear token");
            }
        }
    }
}
