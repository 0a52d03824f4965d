//! tokenflow: client-side session handling for bearer-token APIs.
//!
//! The crate keeps a short-lived access token and a refresh credential,
//! attaches the token to outgoing requests, and transparently recovers from
//! an expired token by refreshing once and retrying once. Concurrent
//! failures share a single refresh round trip.
//!
//! # Quick start
//!
//! ```no_run
//! use tokenflow::app::App;
//! use tokenflow::api::ApiRequest;
//! use tokenflow::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(None)?;
//! let app = App::from_config(&config)?;
//! let session = app.mount_session().ready().await;
//! if session.data.is_some() {
//!     let profile: serde_json::Value = app.fetcher.fetch(&ApiRequest::get("/me")).await?;
//!     println!("{profile}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod api;
pub mod app;
pub mod build_info;
pub mod config;
pub mod error;
pub mod manager;
pub mod session;
pub mod store;
#[cfg(test)]
pub mod testsupport;

pub use account::{AccountClient, Credentials};
pub use api::{ApiRequest, Fetcher};
pub use app::App;
pub use error::{ConfigError, SessionError, StoreError};
pub use manager::{RefreshCredential, TokenManager};
pub use session::{Session, SessionData, SessionState, SessionWatcher};
pub use store::{TokenResponse, TokenStore};
