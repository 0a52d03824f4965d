//! Wiring from a loaded [`Config`] to a ready-to-use session stack.

use std::sync::Arc;

use reqwest::cookie::Jar;
use tracing::debug;

use crate::account::AccountClient;
use crate::api::{build_http_client, Fetcher};
use crate::config::{Config, RefreshMode, StorageKind};
use crate::error::SessionError;
use crate::manager::{RefreshCredential, TokenManager};
use crate::session::Session;
use crate::store::{FileStorage, MemoryStorage, TokenStorage, TokenStore};

/// Store, manager, fetcher, and account client sharing one HTTP client.
#[derive(Clone)]
pub struct App {
    pub store: Arc<TokenStore>,
    pub manager: TokenManager,
    pub fetcher: Fetcher,
    pub account: AccountClient,
}

impl App {
    pub fn from_config(config: &Config) -> Result<Self, SessionError> {
        let storage: Arc<dyn TokenStorage> = match config.storage.kind {
            StorageKind::Memory => Arc::new(MemoryStorage::new()),
            StorageKind::File => {
                let path = config.token_store_path().ok_or_else(|| {
                    SessionError::Invalid(
                        "no token file path configured and no config directory found".to_string(),
                    )
                })?;
                debug!(path = %path.display(), encrypt = config.storage.encrypt, "using file token storage");
                Arc::new(FileStorage::new(path, config.storage.encrypt))
            }
        };
        let store = Arc::new(TokenStore::with_storage(storage)?);

        let (jar, credential) = match config.session.mode {
            RefreshMode::Body => (None, RefreshCredential::StoredToken),
            RefreshMode::Cookie => {
                let jar = Arc::new(Jar::default());
                let credential = RefreshCredential::Cookie {
                    jar: jar.clone(),
                    name: config.session.refresh_cookie.clone(),
                };
                (Some(jar), credential)
            }
        };

        let http = build_http_client(config.timeout(), jar)?;
        let endpoint = config
            .refresh_url()
            .map_err(|err| SessionError::Invalid(err.to_string()))?;
        let manager = TokenManager::new(http.clone(), endpoint, credential, store.clone());
        let fetcher = Fetcher::new(http, &config.api.base_url, manager.clone());
        let account = AccountClient::new(fetcher.clone());

        Ok(Self {
            store,
            manager,
            fetcher,
            account,
        })
    }

    /// Mount a session view over this app's token store.
    pub fn mount_session(&self) -> Session {
        Session::mount(self.manager.clone())
    }
}
