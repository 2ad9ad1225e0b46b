//! Token refresh transport
//!
//! Exchanges a refresh token for a new access token by POSTing to the auth
//! service's `/refresh-token` endpoint. The `TokenRefresher` trait is the
//! seam the refresh coordinator calls through, so tests can count or fail
//! refresh calls without a server.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::REFRESH_TOKEN_PATH;
use crate::credentials::BoxFuture;
use crate::error::{Error, Result};

/// Response body of `/refresh-token`.
///
/// `refresh_token` is only present when the server rotates refresh tokens.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    #[serde(alias = "access_token")]
    pub token: String,
    #[serde(
        rename = "refreshToken",
        alias = "refresh_token",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_token: Option<String>,
}

/// Something that can mint a new access token from a refresh token.
pub trait TokenRefresher: Send + Sync {
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, Result<TokenResponse>>;
}

/// Refresher that calls the auth service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpTokenRefresher {
    pub fn new(client: reqwest::Client, auth_base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: join_url(auth_base_url, REFRESH_TOKEN_PATH),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TokenRefresher for HttpTokenRefresher {
    fn refresh<'a>(&'a self, refresh: &'a str) -> BoxFuture<'a, Result<TokenResponse>> {
        Box::pin(refresh_token(
            &self.client,
            &self.endpoint,
            refresh,
            self.timeout,
        ))
    }
}

/// Exchange `refresh` for a new access token at `endpoint`.
///
/// 401/403 means the refresh token is revoked or expired and maps to
/// `InvalidCredentials`. Other non-2xx statuses are `TokenRefresh`;
/// transport failures and timeouts are `Http`.
pub async fn refresh_token(
    client: &reqwest::Client,
    endpoint: &str,
    refresh: &str,
    timeout: Duration,
) -> Result<TokenResponse> {
    let response = client
        .post(endpoint)
        .timeout(timeout)
        .json(&serde_json::json!({ "refreshToken": refresh }))
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenRefresh(format!(
            "refresh endpoint returned {status}: {body}"
        )));
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenRefresh(format!("invalid refresh response: {e}")))?;
    debug!(rotated = token.refresh_token.is_some(), "refresh endpoint issued new token");
    Ok(token)
}

/// Join a service base URL and an endpoint path with exactly one `/`.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
