//! Token payloads and persisted-entry keys.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Storage key for the current access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Storage key for the access-token expiry, epoch milliseconds as a decimal string.
pub const EXPIRES_AT_KEY: &str = "expires_at";

/// Every key a token store writes.
pub const TOKEN_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, EXPIRES_AT_KEY];

/// Lifetime assumed when the server omits `expiresIn`.
pub(crate) const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Tokens issued by the login and refresh endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    /// Omitted when the server keeps the refresh token in an HTTP-only cookie
    /// or does not rotate it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Access-token lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_in: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expires_in(mut self, secs: i64) -> Self {
        self.expires_in = Some(secs);
        self
    }

    /// Lifetime in seconds, falling back to one hour.
    pub fn expires_in_secs(&self) -> i64 {
        self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS).max(0)
    }
}

/// Login responses wrap tokens in `data`; refresh responses return them flat.
#[derive(Deserialize)]
#[serde(untagged)]
enum TokenEnvelope {
    Wrapped { data: TokenResponse },
    Flat(TokenResponse),
}

/// Decode a token payload from either response shape and validate it.
pub(crate) fn parse_token_response(body: &[u8]) -> Result<TokenResponse, String> {
    let envelope: TokenEnvelope = serde_json::from_slice(body)
        .map_err(|err| format!("token response is not valid JSON: {err}"))?;
    let mut tokens = match envelope {
        TokenEnvelope::Wrapped { data } => data,
        TokenEnvelope::Flat(tokens) => tokens,
    };
    tokens.access_token = tokens.access_token.trim().to_string();
    if tokens.access_token.is_empty() {
        return Err("token response did not include accessToken".to_string());
    }
    tokens.refresh_token = tokens
        .refresh_token
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    Ok(tokens)
}

pub(crate) fn unix_now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_refresh_payload() {
        let tokens =
            parse_token_response(br#"{"accessToken":"a1","refreshToken":"r1","expiresIn":3600}"#)
                .expect("tokens");
        assert_eq!(
            tokens,
            TokenResponse::new("a1")
                .with_refresh_token("r1")
                .with_expires_in(3600)
        );
    }

    #[test]
    fn parses_login_payload_wrapped_in_data() {
        let tokens = parse_token_response(br#"{"data":{"accessToken":"a9"},"message":"ok"}"#)
            .expect("tokens");
        assert_eq!(tokens.access_token, "a9");
        assert_eq!(tokens.refresh_token, None);
        assert_eq!(tokens.expires_in_secs(), DEFAULT_EXPIRES_IN_SECS);
    }

    #[test]
    fn rejects_blank_access_token() {
        let err = parse_token_response(br#"{"accessToken":"   "}"#).unwrap_err();
        assert!(err.contains("accessToken"), "got: {err}");
    }

    #[test]
    fn blank_refresh_token_is_treated_as_absent() {
        let tokens =
            parse_token_response(br#"{"accessToken":"a","refreshToken":""}"#).expect("tokens");
        assert_eq!(tokens.refresh_token, None);
    }

    #[test]
    fn rejects_non_json_body() {
        assert!(parse_token_response(b"<html>").is_err());
    }
}
