//! Authenticated HTTP access for application code.
//!
//! - request context lives in `request`.
//! - URL resolution, client construction, and error mapping live in `transport`.
//! - token refresh is delegated to [`TokenManager`].

mod request;
pub(crate) mod transport;

pub use request::ApiRequest;
pub use transport::build_http_client;

use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::SessionError;
use crate::manager::TokenManager;

/// HTTP client that attaches the current access token and recovers from one
/// expired-token rejection.
#[derive(Clone)]
pub struct Fetcher {
    http: reqwest::Client,
    base_url: String,
    manager: TokenManager,
}

impl Fetcher {
    pub fn new(http: reqwest::Client, base_url: &str, manager: TokenManager) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            manager,
        }
    }

    pub fn manager(&self) -> &TokenManager {
        &self.manager
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `request` with the stored access token.
    ///
    /// A 401 triggers one refresh and one retry with the new token; at most two
    /// requests go out per call. Refresh errors are returned as-is. Any other
    /// non-2xx response, including a second 401, becomes `RequestFailed`.
    pub async fn request(&self, request: &ApiRequest) -> Result<reqwest::Response, SessionError> {
        let url = transport::resolve_url(&self.base_url, &request.path, &request.query)?;
        let token = self.manager.store().get();
        let response = self.send(&url, request, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return transport::ensure_success(response).await;
        }

        debug!(method = %request.method, %url, "request unauthorized; refreshing session");
        let token = self.manager.refresh().await?;
        debug!(method = %request.method, %url, "retrying request with refreshed token");
        let retried = self.send(&url, request, Some(&token)).await?;
        transport::ensure_success(retried).await
    }

    /// Send `request` and decode its JSON body as `T`.
    pub async fn fetch<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, SessionError> {
        let response = self.request(request).await?;
        decode_json(response).await
    }

    /// Send `request` without credentials or refresh handling, for public
    /// endpoints such as login where a 401 means bad input, not an expired token.
    pub async fn request_public(
        &self,
        request: &ApiRequest,
    ) -> Result<reqwest::Response, SessionError> {
        let url = transport::resolve_url(&self.base_url, &request.path, &request.query)?;
        let response = self.send(&url, request, None).await?;
        transport::ensure_success(response).await
    }

    async fn send(
        &self,
        url: &Url,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response, SessionError> {
        let mut headers = request.headers.clone();
        headers.remove(AUTHORIZATION);
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(token) = bearer {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                SessionError::Invalid("access token contains invalid header characters".into())
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        Ok(builder.send().await?)
    }
}

/// Decode a JSON body, mapping decode failures to `RequestFailed`.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, SessionError> {
    let status = response.status().as_u16();
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| {
        SessionError::request_failed(status, format!("invalid response body: {err}"))
    })
}
