//! Token store: the single source of truth for session credentials.
//!
//! The access token lives in memory behind a `watch` channel so readers can
//! get it synchronously or subscribe to changes. Every mutation is written
//! through to a [`TokenStorage`] backend first, so memory never runs ahead
//! of what was persisted.

mod crypto;
mod file;
mod storage;
mod types;

pub use file::FileStorage;
pub use storage::{MemoryStorage, TokenStorage};
pub use types::{TokenResponse, ACCESS_TOKEN_KEY, EXPIRES_AT_KEY, REFRESH_TOKEN_KEY, TOKEN_KEYS};

pub(crate) use types::{parse_token_response, unix_now_millis};

use std::sync::Arc;
use tokio::sync::watch;

use crate::error::StoreError;

/// Process-wide holder of the current access token.
pub struct TokenStore {
    access: watch::Sender<Option<String>>,
    storage: Arc<dyn TokenStorage>,
}

impl TokenStore {
    /// In-memory store; tokens are lost when the process exits.
    pub fn in_memory() -> Self {
        let (access, _) = watch::channel(None);
        Self {
            access,
            storage: Arc::new(MemoryStorage::new()),
        }
    }

    /// Store backed by `storage`, seeded with whatever access token it holds.
    pub fn with_storage(storage: Arc<dyn TokenStorage>) -> Result<Self, StoreError> {
        let initial = storage.get_item(ACCESS_TOKEN_KEY)?;
        let (access, _) = watch::channel(initial);
        Ok(Self { access, storage })
    }

    /// Current access token, if any.
    pub fn get(&self) -> Option<String> {
        self.access.borrow().clone()
    }

    /// Replace the access token. Subscribers are only notified on change.
    pub fn set(&self, token: Option<String>) -> Result<(), StoreError> {
        if *self.access.borrow() == token {
            return Ok(());
        }
        match token.as_deref() {
            Some(value) => self.storage.set_items(&[(ACCESS_TOKEN_KEY, value)])?,
            None => self.storage.remove_items(&[ACCESS_TOKEN_KEY])?,
        }
        self.publish(token);
        Ok(())
    }

    /// Receive every access-token change from now on.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.access.subscribe()
    }

    /// Store a full token response: access token, refresh token, and expiry.
    ///
    /// A response without a refresh token keeps the one already stored.
    pub fn set_tokens(&self, tokens: &TokenResponse) -> Result<(), StoreError> {
        let expires_at = unix_now_millis()
            .saturating_add(tokens.expires_in_secs().saturating_mul(1000))
            .to_string();
        let mut items = vec![
            (ACCESS_TOKEN_KEY, tokens.access_token.as_str()),
            (EXPIRES_AT_KEY, expires_at.as_str()),
        ];
        if let Some(refresh) = tokens.refresh_token.as_deref() {
            items.push((REFRESH_TOKEN_KEY, refresh));
        }
        self.storage.set_items(&items)?;
        self.publish(Some(tokens.access_token.clone()));
        Ok(())
    }

    /// Drop every stored credential and publish the logged-out state.
    pub fn clear(&self) -> Result<(), StoreError> {
        let removed = self.storage.remove_items(&TOKEN_KEYS);
        // Readers must observe the logout even if storage could not be updated.
        self.publish(None);
        removed
    }

    pub fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        self.storage.get_item(REFRESH_TOKEN_KEY)
    }

    /// Access-token expiry in epoch milliseconds. Unparseable values read as absent.
    pub fn expires_at(&self) -> Result<Option<i64>, StoreError> {
        Ok(self
            .storage
            .get_item(EXPIRES_AT_KEY)?
            .and_then(|value| value.trim().parse::<i64>().ok()))
    }

    /// `now >= expires_at`; a missing or unreadable expiry counts as expired.
    pub fn is_expired(&self) -> bool {
        match self.expires_at() {
            Ok(Some(expires_at)) => unix_now_millis() >= expires_at,
            _ => true,
        }
    }

    /// A token is held and has not expired.
    pub fn is_authenticated(&self) -> bool {
        self.get().is_some() && !self.is_expired()
    }

    fn publish(&self, token: Option<String>) {
        self.access.send_if_modified(|current| {
            if *current == token {
                return false;
            }
            *current = token;
            true
        });
    }
}
