//! Session lifecycle against the auth service
//!
//! Login and registration are sent without credentials; a 401 there means
//! bad input, not an expired session. Everything else goes through the
//! authenticated client.

use api_client::{AuthenticatedClient, Error, RequestBody, RequestOptions, Result};
use auth_store::{Credential, CredentialStore, cached_user_id};
use reqwest::Method;
use serde_json::json;
use tracing::{info, warn};

use crate::models::{AuthResponse, CurrentUser, UserCredentials};
use crate::validate;

#[derive(Clone)]
pub struct AuthService {
    client: AuthenticatedClient,
}

impl AuthService {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    fn store(&self) -> &dyn CredentialStore {
        self.client.coordinator().store().as_ref()
    }

    /// Log in and persist the returned session.
    pub async fn login(&self, credentials: &UserCredentials) -> Result<AuthResponse> {
        let response = self.submit_credentials("/login", credentials).await?;
        if response.token.is_none() {
            return Err(Error::Remote {
                status: 200,
                message: "login response did not include a token".into(),
            });
        }
        self.persist(&response).await?;
        info!(user_id = response.account_id().unwrap_or("-"), "logged in");
        Ok(response)
    }

    /// Create an account. A session is stored only if the server issues a
    /// token with the registration.
    pub async fn register(&self, credentials: &UserCredentials) -> Result<AuthResponse> {
        let response = self.submit_credentials("/register", credentials).await?;
        if response.token.is_some() {
            self.persist(&response).await?;
        }
        info!(user_id = response.account_id().unwrap_or("-"), "registered");
        Ok(response)
    }

    /// End the session. Local credentials are cleared even when the server
    /// call fails; the server's error is still returned.
    pub async fn logout(&self) -> Result<()> {
        let remote = self
            .client
            .request_unit(Method::POST, "/logout", None, RequestOptions::new())
            .await;
        self.client.coordinator().clear_session().await?;
        match &remote {
            Ok(()) => info!("logged out"),
            Err(e) => warn!(error = %e, "logout call failed, local session cleared"),
        }
        remote
    }

    /// Refresh the access token now, sharing any refresh already running.
    pub async fn refresh(&self) -> Result<()> {
        self.client.coordinator().refresh().await.map(|_| ())
    }

    pub async fn current_user(&self) -> Result<CurrentUser> {
        self.client.get("/profile").await
    }

    /// Whether the server still accepts the session.
    ///
    /// Rejections and an expired session are `Ok(false)`; transport and
    /// storage failures propagate.
    pub async fn validate_token(&self) -> Result<bool> {
        match self
            .client
            .request_unit(Method::POST, "/validate-token", None, RequestOptions::new())
            .await
        {
            Ok(()) => Ok(true),
            Err(Error::Remote { .. } | Error::AuthExpired(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let email = validate::email(email)?;
        let body = RequestBody::Json(json!({ "email": email }));
        self.client
            .request_unit(
                Method::POST,
                "/forgot-password",
                Some(body),
                RequestOptions::anonymous(),
            )
            .await
    }

    /// Set a new password using the token from a reset email.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        let token = validate::non_empty("reset token", token)?;
        let new_password = validate::password(new_password)?;
        let body = RequestBody::Json(json!({ "token": token, "newPassword": new_password }));
        self.client
            .request_unit(
                Method::POST,
                "/reset-password",
                Some(body),
                RequestOptions::anonymous(),
            )
            .await
    }

    pub async fn update_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        let old_password = validate::password(old_password)?;
        let new_password = validate::password(new_password)?;
        let body = RequestBody::Json(json!({
            "oldPassword": old_password,
            "newPassword": new_password,
        }));
        self.client
            .request_unit(
                Method::POST,
                "/update-password",
                Some(body),
                RequestOptions::new(),
            )
            .await
    }

    /// Whether an access token is stored. Does not contact the server.
    pub async fn is_logged_in(&self) -> Result<bool> {
        Ok(Credential::load(self.store()).await?.is_some())
    }

    pub async fn cached_user_id(&self) -> Result<Option<String>> {
        Ok(cached_user_id(self.store()).await?)
    }

    async fn submit_credentials(
        &self,
        path: &str,
        credentials: &UserCredentials,
    ) -> Result<AuthResponse> {
        validate::email(&credentials.email)?;
        validate::password(&credentials.password)?;
        let body = RequestBody::json(credentials)?;
        self.client
            .request_json(Method::POST, path, Some(body), RequestOptions::anonymous())
            .await
    }

    /// Hand the new session to the coordinator so it is ordered against
    /// any refresh still running for the previous one.
    async fn persist(&self, response: &AuthResponse) -> Result<()> {
        let Some(token) = &response.token else {
            return Ok(());
        };
        let credential = Credential::new(token.clone(), response.refresh_token.clone());
        self.client
            .coordinator()
            .replace_session(&credential, response.account_id())
            .await
    }
}
