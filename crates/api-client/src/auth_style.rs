//! How the access token travels with a request
//!
//! Backends authenticate either by `Authorization: Bearer <token>` or by an
//! `auth_token=<token>` cookie. A deployment picks one style and every
//! client built for it uses the same style.

use auth_store::DEFAULT_COOKIE_NAME;
use reqwest::header::{AUTHORIZATION, COOKIE, HeaderMap, HeaderName, HeaderValue};

use crate::error::{Error, Result};

/// Credential attachment style.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthStyle {
    #[default]
    Bearer,
    Cookie { name: String },
}

impl AuthStyle {
    /// Cookie style with the backend's default cookie name.
    pub fn cookie() -> Self {
        AuthStyle::Cookie {
            name: DEFAULT_COOKIE_NAME.to_string(),
        }
    }

    /// Header carrying the credential.
    pub fn header_name(&self) -> HeaderName {
        match self {
            AuthStyle::Bearer => AUTHORIZATION,
            AuthStyle::Cookie { .. } => COOKIE,
        }
    }

    /// Encode `token` as a header value for this style.
    pub fn header_value(&self, token: &str) -> Result<HeaderValue> {
        let raw = match self {
            AuthStyle::Bearer => format!("Bearer {token}"),
            AuthStyle::Cookie { name } => format!("{name}={token}"),
        };
        let mut value = HeaderValue::from_str(&raw).map_err(|_| {
            Error::Credential("stored access token is not a valid header value".into())
        })?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// Attach the credential, replacing any caller-supplied value for the
    /// same header.
    pub fn apply(&self, headers: &mut HeaderMap, token: &str) -> Result<()> {
        headers.insert(self.header_name(), self.header_value(token)?);
        Ok(())
    }
}
