//! Credential storage and token refresh transport
//!
//! Owns everything the client needs to know about a user's session:
//! where tokens live (`CredentialStore`), which keys they live under, and
//! how a refresh token is exchanged for a new access token
//! (`TokenRefresher`). The single-flight coordination that decides *when*
//! to refresh lives in `api-client`; this crate only performs the call.
//!
//! Session lifecycle:
//! 1. Login response stored via `Credential::save()`
//! 2. Every request reads the access token via `Credential::load()`
//! 3. On 401 the coordinator calls `TokenRefresher::refresh()` once
//! 4. New tokens written via `update_tokens()`
//! 5. Logout or a rejected refresh wipes the session via `clear_credentials()`

pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{
    BoxFuture, Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore,
    cached_user_id, clear_credentials, update_tokens,
};
pub use error::{Error, Result};
pub use token::{HttpTokenRefresher, TokenRefresher, TokenResponse, join_url, refresh_token};
