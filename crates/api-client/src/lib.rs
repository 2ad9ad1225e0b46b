//! Authenticated HTTP client with single-flight token refresh
//!
//! Every facade in `travel-api` talks to its backend through an
//! `AuthenticatedClient`. The client attaches the stored access token to
//! each request (bearer header or cookie, per `AuthStyle`) and, when the
//! server answers 401, hands over to the shared `RefreshCoordinator`:
//!
//! 1. First 401 while idle → one refresh call on a detached task
//! 2. Further 401s while refreshing → queued behind that call
//! 3. Refresh succeeds → every queued request replays once with the new token
//! 4. Refresh fails → credentials cleared, every queued request gets `AuthExpired`
//!
//! A replayed request never triggers another refresh.

pub mod auth_style;
pub mod client;
pub mod error;
pub mod metrics;
pub mod refresh;

pub use auth_style::AuthStyle;
pub use client::{
    ApiResponse, AuthenticatedClient, ClientConfig, FilePart, RequestBody, RequestOptions,
};
pub use error::{Error, Result};
pub use refresh::{AccessSnapshot, RefreshCoordinator, RefreshOutcome};
