//! Typed facades over the travel backends
//!
//! Each facade validates its inputs, delegates to an `AuthenticatedClient`
//! with a fixed method and path, and decodes the response into the types in
//! [`models`]. `TravelApi` wires all five facades to one refresh
//! coordinator so a 401 on any service triggers at most one refresh.

pub mod auth;
pub mod globes;
pub mod likes;
pub mod media;
pub mod models;
pub mod profile;
pub mod validate;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;
use std::time::Duration;

use api_client::{AuthStyle, AuthenticatedClient, ClientConfig, RefreshCoordinator, Result};
use auth_store::{CredentialStore, DEFAULT_TIMEOUT, HttpTokenRefresher};

pub use api_client::Error;
pub use auth::AuthService;
pub use globes::GlobesService;
pub use likes::LikesService;
pub use media::{MediaService, MediaUpload};
pub use profile::ProfileService;

/// Auth service address used by the Android emulator builds.
pub const DEFAULT_API_URL: &str = "http://10.0.2.2:8080/";

/// Base URLs and transport settings for every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub auth_url: String,
    pub profile_url: String,
    pub media_url: String,
    pub globes_url: String,
    pub likes_url: String,
    pub timeout: Duration,
    pub auth_style: AuthStyle,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_API_URL)
    }
}

impl ApiSettings {
    /// Every service behind the same gateway address.
    pub fn with_base_url(url: &str) -> Self {
        Self {
            auth_url: url.to_string(),
            profile_url: url.to_string(),
            media_url: url.to_string(),
            globes_url: url.to_string(),
            likes_url: url.to_string(),
            timeout: DEFAULT_TIMEOUT,
            auth_style: AuthStyle::default(),
        }
    }
}

/// All facades sharing one credential store and refresh coordinator.
#[derive(Clone)]
pub struct TravelApi {
    pub auth: AuthService,
    pub profile: ProfileService,
    pub media: MediaService,
    pub globes: GlobesService,
    pub likes: LikesService,
    coordinator: Arc<RefreshCoordinator>,
}

impl TravelApi {
    pub fn new(settings: &ApiSettings, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        let refresher = Arc::new(HttpTokenRefresher::new(
            http.clone(),
            &settings.auth_url,
            settings.timeout,
        ));
        let coordinator = RefreshCoordinator::new(store, refresher);
        Ok(Self::with_coordinator(http, settings, coordinator))
    }

    /// Build facades over an existing coordinator (e.g. one with a custom
    /// `TokenRefresher`).
    pub fn with_coordinator(
        http: reqwest::Client,
        settings: &ApiSettings,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Self {
        let client = |service: &str, url: &str| {
            AuthenticatedClient::new(
                http.clone(),
                ClientConfig::new(service, url)
                    .with_timeout(settings.timeout)
                    .with_auth_style(settings.auth_style.clone()),
                coordinator.clone(),
            )
        };
        Self {
            auth: AuthService::new(client("auth", &settings.auth_url)),
            profile: ProfileService::new(client("profile", &settings.profile_url)),
            media: MediaService::new(client("media", &settings.media_url)),
            globes: GlobesService::new(client("globes", &settings.globes_url)),
            likes: LikesService::new(client("likes", &settings.likes_url)),
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }
}
