//! Token manager: refreshes the access token at most once at a time.
//!
//! Concurrent callers share a single in-flight refresh through an explicit
//! pending slot. The first caller spawns the refresh and parks a
//! `watch::Receiver` in the slot; later callers clone that receiver and wait
//! on the same outcome. The slot is emptied as soon as the refresh settles, so
//! the next call after that starts a new network round trip.

use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::transport::error_message;
use crate::error::SessionError;
use crate::store::{parse_token_response, TokenResponse, TokenStore};

type RefreshOutcome = Result<String, SessionError>;
type PendingRefresh = watch::Receiver<Option<RefreshOutcome>>;

/// Where the refresh credential lives.
#[derive(Clone)]
pub enum RefreshCredential {
    /// Refresh token kept in the token store and sent as `{ "refreshToken": … }`.
    StoredToken,
    /// HTTP-only cookie held by the client's cookie jar; the request has no body.
    Cookie { jar: Arc<Jar>, name: String },
}

impl std::fmt::Debug for RefreshCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoredToken => f.write_str("StoredToken"),
            Self::Cookie { name, .. } => f.debug_struct("Cookie").field("name", name).finish(),
        }
    }
}

/// Credential captured when a refresh starts.
enum CredentialValue {
    Body(String),
    Cookie,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Coordinates access-token refresh for one session.
///
/// Cheap to clone; clones share the store and the pending slot.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    endpoint: Url,
    credential: RefreshCredential,
    store: Arc<TokenStore>,
    pending: Mutex<Option<PendingRefresh>>,
}

impl TokenManager {
    pub fn new(
        http: reqwest::Client,
        endpoint: Url,
        credential: RefreshCredential,
        store: Arc<TokenStore>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                endpoint,
                credential,
                store,
                pending: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.inner.store
    }

    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Obtain a new access token from the refresh endpoint.
    ///
    /// Joins the in-flight refresh when there is one. Fails with
    /// `NoRefreshToken`, without touching the network, when no credential is
    /// available. Any refresh failure clears the stored tokens and yields
    /// `RefreshFailed`.
    pub async fn refresh(&self) -> Result<String, SessionError> {
        let pending = self.join_or_start()?;
        await_outcome(pending).await
    }

    /// True while a refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.pending_slot().is_some()
    }

    /// Store tokens obtained outside the refresh flow (for example, login).
    pub fn set_tokens(&self, tokens: &TokenResponse) -> Result<(), SessionError> {
        self.inner.store.set_tokens(tokens)?;
        Ok(())
    }

    /// End the local session.
    pub fn clear(&self) -> Result<(), SessionError> {
        self.inner.store.clear()?;
        Ok(())
    }

    fn join_or_start(&self) -> Result<PendingRefresh, SessionError> {
        let mut slot = self.inner.pending_slot();
        if let Some(pending) = slot.as_ref() {
            debug!("joining in-flight token refresh");
            return Ok(pending.clone());
        }

        let credential = self.inner.current_credential()?;
        let (outcome_tx, outcome_rx) = watch::channel(None);
        *slot = Some(outcome_rx.clone());
        drop(slot);

        // Runs detached so a dropped caller cannot strand the other waiters.
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let settle = SettleGuard(Arc::clone(&inner));
            let outcome = inner.perform_refresh(credential).await;
            drop(settle);
            let _ = outcome_tx.send(Some(outcome));
        });
        Ok(outcome_rx)
    }
}

impl Inner {
    fn pending_slot(&self) -> MutexGuard<'_, Option<PendingRefresh>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current_credential(&self) -> Result<CredentialValue, SessionError> {
        match &self.credential {
            RefreshCredential::StoredToken => match self.store.refresh_token()? {
                Some(token) if !token.trim().is_empty() => Ok(CredentialValue::Body(token)),
                _ => Err(SessionError::NoRefreshToken),
            },
            RefreshCredential::Cookie { jar, name } => {
                if jar_has_cookie(jar, &self.endpoint, name) {
                    Ok(CredentialValue::Cookie)
                } else {
                    Err(SessionError::NoRefreshToken)
                }
            }
        }
    }

    async fn perform_refresh(&self, credential: CredentialValue) -> RefreshOutcome {
        info!(endpoint = %self.endpoint, "refreshing access token");
        let stored = match self.request_tokens(credential).await {
            Ok(tokens) => self
                .store
                .set_tokens(&tokens)
                .map(|()| tokens.access_token)
                .map_err(|err| format!("failed to store refreshed tokens: {err}")),
            Err(reason) => Err(reason),
        };
        match stored {
            Ok(access_token) => {
                info!("access token refreshed");
                Ok(access_token)
            }
            Err(reason) => {
                warn!(%reason, "token refresh failed; clearing session");
                if let Err(err) = self.store.clear() {
                    error!(error = %err, "failed to clear token storage after refresh failure");
                }
                Err(SessionError::RefreshFailed(reason))
            }
        }
    }

    async fn request_tokens(&self, credential: CredentialValue) -> Result<TokenResponse, String> {
        let request = self.http.post(self.endpoint.clone());
        let request = match &credential {
            CredentialValue::Body(token) => request.json(&RefreshRequest {
                refresh_token: token,
            }),
            CredentialValue::Cookie => request,
        };
        let response = request
            .send()
            .await
            .map_err(|err| format!("refresh request failed: {err}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!(
                "refresh endpoint returned status {}: {}",
                status.as_u16(),
                error_message(status, &body)
            ));
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| format!("failed to read refresh response: {err}"))?;
        parse_token_response(&body)
    }
}

/// Empties the pending slot when the refresh task finishes or unwinds.
struct SettleGuard(Arc<Inner>);

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.0.pending_slot().take();
    }
}

async fn await_outcome(mut pending: PendingRefresh) -> RefreshOutcome {
    match pending.wait_for(Option::is_some).await {
        Ok(outcome) => (*outcome).clone().unwrap_or_else(|| {
            Err(SessionError::RefreshFailed(
                "refresh finished without a result".to_string(),
            ))
        }),
        Err(_) => Err(SessionError::RefreshFailed(
            "refresh task ended before settling".to_string(),
        )),
    }
}

fn jar_has_cookie(jar: &Jar, url: &Url, name: &str) -> bool {
    let Some(header) = jar.cookies(url) else {
        return false;
    };
    let Ok(header) = header.to_str() else {
        return false;
    };
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .any(|(key, value)| key == name && !value.is_empty())
}
