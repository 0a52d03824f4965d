//! HTTP plumbing shared by the fetcher and the token manager.

use reqwest::cookie::Jar;
use reqwest::{StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;

use crate::error::SessionError;

/// Build the shared HTTP client. Every request, refreshes included, is
/// bounded by `timeout`.
pub fn build_http_client(
    timeout: Duration,
    cookies: Option<Arc<Jar>>,
) -> Result<reqwest::Client, SessionError> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(jar) = cookies {
        builder = builder.cookie_provider(jar);
    }
    builder.build().map_err(|err| {
        SessionError::Invalid(format!("failed to build HTTP client: {err}"))
    })
}

/// Resolve `path` against `base_url`; absolute `http(s)` URLs pass through.
pub(crate) fn resolve_url(
    base_url: &str,
    path: &str,
    query: &[(String, String)],
) -> Result<Url, SessionError> {
    let raw = if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else if path.is_empty() {
        base_url.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    };
    let mut url = Url::parse(&raw)
        .map_err(|err| SessionError::Invalid(format!("invalid request URL `{raw}`: {err}")))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

/// Pass 2xx responses through; turn anything else into `RequestFailed`.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, SessionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SessionError::request_failed(
        status.as_u16(),
        error_message(status, &body),
    ))
}

/// Best-effort human message from an error response body.
///
/// Prefers a JSON `message`, then `error` (string or `{ message }`), then a
/// generic line built from the status.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            value.get("message"),
            value.get("error"),
            value.get("error").and_then(|error| error.get("message")),
        ];
        let found = candidates
            .into_iter()
            .flatten()
            .filter_map(serde_json::Value::as_str)
            .map(str::trim)
            .find(|text| !text.is_empty());
        if let Some(text) = found {
            return text.to_string();
        }
    }
    let reason = status.canonical_reason().unwrap_or("");
    format!("API error: {} {reason}", status.as_u16())
        .trim_end()
        .to_string()
}
