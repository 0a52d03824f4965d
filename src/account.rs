//! Registration, login, and logout against the auth server.

use serde::Serialize;
use tracing::{info, warn};

use crate::api::{ApiRequest, Fetcher};
use crate::error::SessionError;
use crate::session::SessionData;
use crate::store::parse_token_response;

const REGISTER_PATH: &str = "/register";
const LOGIN_PATH: &str = "/login";
const LOGOUT_PATH: &str = "/logout";
const CONFIRM_PATH: &str = "/registration/confirm";

const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_MAX_LEN: usize = 16;

/// Email and password as entered by the user.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Trim both fields and check them against the server's account rules.
    pub fn validated(&self) -> Result<Self, SessionError> {
        let email = self.email.trim();
        let password = self.password.trim();
        validate_email(email)?;
        validate_password(password)?;
        Ok(Self::new(email, password))
    }
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    email: &'a str,
    password: &'a str,
    consent: bool,
}

/// Account endpoints layered on a [`Fetcher`].
#[derive(Clone)]
pub struct AccountClient {
    fetcher: Fetcher,
}

impl AccountClient {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Create an account. The server emails a confirmation code.
    pub async fn register(&self, credentials: &Credentials) -> Result<serde_json::Value, SessionError> {
        let credentials = credentials.validated()?;
        let request = ApiRequest::post(REGISTER_PATH).json(&RegisterBody {
            email: &credentials.email,
            password: &credentials.password,
            consent: true,
        })?;
        let response = self.fetcher.request_public(&request).await?;
        info!(email = %credentials.email, "registration submitted");
        read_optional_json(response).await
    }

    /// Confirm a registration with the emailed token and code.
    pub async fn confirm_registration(
        &self,
        token: &str,
        code: &str,
    ) -> Result<serde_json::Value, SessionError> {
        let token = token.trim();
        if token.is_empty() || token.contains(['/', '?', '#']) || token.contains(char::is_whitespace) {
            return Err(SessionError::Invalid(
                "confirmation token is missing or malformed".to_string(),
            ));
        }
        let code = code.trim();
        if code.is_empty() {
            return Err(SessionError::Invalid("confirmation code is required".to_string()));
        }
        let request =
            ApiRequest::patch(format!("{CONFIRM_PATH}/{token}")).query_param("code", code);
        let response = self.fetcher.request_public(&request).await?;
        read_optional_json(response).await
    }

    /// Log in and store the issued tokens.
    pub async fn login(&self, credentials: &Credentials) -> Result<SessionData, SessionError> {
        let credentials = credentials.validated()?;
        let request = ApiRequest::post(LOGIN_PATH).json(&credentials)?;
        let response = self.fetcher.request_public(&request).await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        let tokens = parse_token_response(&body)
            .map_err(|reason| SessionError::request_failed(status, reason))?;
        self.fetcher.manager().set_tokens(&tokens)?;
        info!(email = %credentials.email, "logged in");
        Ok(SessionData {
            access_token: tokens.access_token,
        })
    }

    /// Tell the server to end the session, then drop local tokens.
    ///
    /// Local tokens are cleared even when the server call fails; that failure
    /// is still returned.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let remote = self.fetcher.request(&ApiRequest::put(LOGOUT_PATH)).await;
        let local = self.fetcher.manager().clear();
        if let Err(err) = &remote {
            warn!(error = %err, "server logout failed; local session cleared");
        }
        remote?;
        local?;
        info!("logged out");
        Ok(())
    }
}

/// Decode a JSON body, treating an empty body as `null`.
async fn read_optional_json(response: reqwest::Response) -> Result<serde_json::Value, SessionError> {
    let status = response.status().as_u16();
    let body = response.bytes().await?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(&body).map_err(|err| {
        SessionError::request_failed(status, format!("invalid response body: {err}"))
    })
}

fn validate_email(email: &str) -> Result<(), SessionError> {
    let invalid = || SessionError::Invalid(format!("`{email}` is not a valid email address"));
    if email.contains(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), SessionError> {
    let length = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&length) {
        return Err(SessionError::Invalid(format!(
            "password must be {PASSWORD_MIN_LEN}-{PASSWORD_MAX_LEN} characters long"
        )));
    }
    if password.contains([' ', '\n', '\r']) {
        return Err(SessionError::Invalid(
            "password must not contain spaces".to_string(),
        ));
    }
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_symbol = password
        .chars()
        .any(|c| !c.is_ascii_alphanumeric() && c != '_');
    if !(has_digit && has_lower && has_upper && has_symbol) {
        return Err(SessionError::Invalid(
            "password needs a digit, a lowercase letter, an uppercase letter, and a symbol"
                .to_string(),
        ));
    }
    Ok(())
}
