//! Session bootstrap for a client view.
//!
//! Mounting a [`Session`] restores login state once: if the token store is
//! empty, one silent refresh is attempted with whatever refresh credential is
//! on hand. `loading` is true only while that attempt runs.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::manager::TokenManager;

/// Authenticated session details exposed to views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub access_token: String,
}

/// `{ data, loading }` snapshot; `data` is `None` when logged out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub data: Option<SessionData>,
    pub loading: bool,
}

/// One mounted session view.
pub struct Session {
    manager: TokenManager,
    loading: watch::Receiver<bool>,
}

impl Session {
    /// Start the session bootstrap. Must be called within a Tokio runtime.
    pub fn mount(manager: TokenManager) -> Self {
        if manager.store().get().is_some() {
            let (_, loading) = watch::channel(false);
            return Self { manager, loading };
        }

        let (loading_tx, loading) = watch::channel(true);
        let bootstrap = manager.clone();
        tokio::spawn(async move {
            match bootstrap.refresh().await {
                Ok(_) => info!("session restored by silent refresh"),
                Err(SessionError::NoRefreshToken) => {
                    debug!("no refresh credential on hand; starting logged out")
                }
                Err(err) => warn!(error = %err, "silent refresh failed; starting logged out"),
            }
            let _ = loading_tx.send(false);
        });
        Self { manager, loading }
    }

    /// Current `{ data, loading }` view. `data` tracks the live token store.
    pub fn state(&self) -> SessionState {
        snapshot(&self.manager, *self.loading.borrow())
    }

    /// Wait for the bootstrap to settle, then return the state.
    pub async fn ready(&self) -> SessionState {
        let mut loading = self.loading.clone();
        // A closed channel means the bootstrap task is gone; nothing left to wait for.
        let _ = loading.wait_for(|busy| !*busy).await;
        SessionState {
            loading: false,
            ..self.state()
        }
    }

    /// Change feed over session state.
    pub fn watch(&self) -> SessionWatcher {
        SessionWatcher {
            manager: self.manager.clone(),
            token: self.manager.store().subscribe(),
            loading: self.loading.clone(),
            loading_open: true,
        }
    }
}

/// Yields a fresh [`SessionState`] whenever the token or loading flag changes.
pub struct SessionWatcher {
    manager: TokenManager,
    token: watch::Receiver<Option<String>>,
    loading: watch::Receiver<bool>,
    loading_open: bool,
}

impl SessionWatcher {
    /// Wait for the next change. Returns `None` once the token store is gone.
    pub async fn changed(&mut self) -> Option<SessionState> {
        loop {
            tokio::select! {
                changed = self.token.changed() => {
                    changed.ok()?;
                    break;
                }
                changed = self.loading.changed(), if self.loading_open => {
                    if changed.is_ok() {
                        break;
                    }
                    // Bootstrap finished and its sender is gone; only the token can change now.
                    self.loading_open = false;
                }
            }
        }
        let loading = self.loading_open && *self.loading.borrow();
        Some(snapshot(&self.manager, loading))
    }
}

fn snapshot(manager: &TokenManager, loading: bool) -> SessionState {
    SessionState {
        data: manager
            .store()
            .get()
            .map(|access_token| SessionData { access_token }),
        loading,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::RefreshCredential;
    use crate::store::TokenStore;
    use reqwest::Url;
    use std::sync::Arc;

    fn manager_with(store: TokenStore) -> TokenManager {
        TokenManager::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9/refresh-token").unwrap(),
            RefreshCredential::StoredToken,
            Arc::new(store),
        )
    }

    #[tokio::test]
    async fn existing_token_skips_bootstrap() {
        let store = TokenStore::in_memory();
        store.set(Some("a0".into())).unwrap();
        let session = Session::mount(manager_with(store));

        assert_eq!(
            session.state(),
            SessionState {
                data: Some(SessionData {
                    access_token: "a0".into()
                }),
                loading: false,
            }
        );
    }

    #[tokio::test]
    async fn empty_store_without_credential_settles_logged_out() {
        let session = Session::mount(manager_with(TokenStore::in_memory()));
        let state = session.ready().await;
        assert_eq!(
            state,
            SessionState {
                data: None,
                loading: false
            }
        );
        assert!(!session.state().loading);
    }

    #[tokio::test]
    async fn watcher_sees_logout() {
        let store = TokenStore::in_memory();
        store.set(Some("a0".into())).unwrap();
        let manager = manager_with(store);
        let session = Session::mount(manager.clone());
        let mut watcher = session.watch();

        manager.clear().unwrap();
        let state = watcher.changed().await.expect("state");
        assert_eq!(state.data, None);
        assert!(!state.loading);
    }
}
