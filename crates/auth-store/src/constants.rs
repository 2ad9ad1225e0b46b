//! Storage keys and auth-service defaults

use std::time::Duration;

/// Storage key for the short-lived access token.
pub const ACCESS_TOKEN_KEY: &str = "token";

/// Storage key for the long-lived refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Storage key for the locally cached id of the logged-in user.
pub const USER_ID_KEY: &str = "userId";

/// Every key a session writes. Cleared together on logout.
pub const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_ID_KEY];

/// Refresh endpoint on the auth service.
pub const REFRESH_TOKEN_PATH: &str = "/refresh-token";

/// Per-call timeout applied to every request, including refresh.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Cookie name used when the backend authenticates by cookie.
pub const DEFAULT_COOKIE_NAME: &str = "auth_token";
