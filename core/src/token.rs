//! Bearer token resolution.
//!
//! The pipeline asks a `TokenProvider` for the current session token on each
//! request that has no explicit override. It never writes the token.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::config::{ClientConfig, DEFAULT_TOKEN_KEY};
use crate::store::KeyValueStore;

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// The current token, or `None` to send the request unauthenticated.
    async fn token(&self) -> Option<String>;
}

/// A fixed token, or none at all.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Option<String> {
        self.0.clone().filter(|t| !t.is_empty())
    }
}

/// Reads the token from a `KeyValueStore` under a fixed key.
pub struct StoredToken<S: ?Sized> {
    store: Arc<S>,
    key: String,
}

impl<S: KeyValueStore + ?Sized> StoredToken<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_key(store, DEFAULT_TOKEN_KEY)
    }

    pub fn with_key(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Reads the key named by `config.token_key`.
    pub fn for_config(store: Arc<S>, config: &ClientConfig) -> Self {
        Self::with_key(store, config.token_key.clone())
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> TokenProvider for StoredToken<S> {
    async fn token(&self) -> Option<String> {
        match self.store.get_item(&self.key).await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                // An unreadable store means "not logged in", not a failed request.
                warn!(key = %self.key, error = %e, "failed to read session token");
                None
            }
        }
    }
}
