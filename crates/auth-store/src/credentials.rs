//! Key-value credential storage
//!
//! The client persists its session under three keys (access token, refresh
//! token, cached user id). `CredentialStore` is the storage boundary: a
//! `get`/`set`/`delete` interface that the refresh coordinator and the auth
//! facade share through `Arc<dyn CredentialStore>`.
//!
//! Two backends ship with the crate:
//! - `MemoryCredentialStore` for tests and one-shot tools
//! - `FileCredentialStore`, a JSON object on disk written atomically
//!   (temp file + rename, mode 0600) with a tokio Mutex serialising writes

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use common::Secret;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SESSION_KEYS, USER_ID_KEY};
use crate::error::{Error, Result};

/// Boxed future used by the object-safe traits in this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistent key-value store for session credentials.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn CredentialStore>`).
pub trait CredentialStore: Send + Sync {
    /// Read a value. Absent keys return `Ok(None)`.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;

    /// Insert or replace a value.
    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>>;

    /// Remove a value. Deleting an absent key is not an error.
    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// The access/refresh token pair of the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access: Secret<String>,
    pub refresh: Option<Secret<String>>,
}

impl Credential {
    pub fn new(access: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            access: Secret::new(access.into()),
            refresh: refresh.map(Secret::new),
        }
    }

    /// Read the session from the store. `None` when no access token is stored.
    pub async fn load(store: &dyn CredentialStore) -> Result<Option<Self>> {
        let Some(access) = store.get(ACCESS_TOKEN_KEY).await? else {
            return Ok(None);
        };
        let refresh = store.get(REFRESH_TOKEN_KEY).await?;
        Ok(Some(Self::new(access, refresh)))
    }

    /// Write the session to the store.
    ///
    /// A credential without a refresh token deletes any refresh token left
    /// over from a previous session.
    pub async fn save(&self, store: &dyn CredentialStore) -> Result<()> {
        store
            .set(ACCESS_TOKEN_KEY, self.access.expose().clone())
            .await?;
        match &self.refresh {
            Some(refresh) => {
                store
                    .set(REFRESH_TOKEN_KEY, refresh.expose().clone())
                    .await?
            }
            None => store.delete(REFRESH_TOKEN_KEY).await?,
        }
        Ok(())
    }
}

/// Replace the access token after a refresh. The refresh token is only
/// replaced when the server rotated it.
pub async fn update_tokens(
    store: &dyn CredentialStore,
    access: &str,
    rotated_refresh: Option<&str>,
) -> Result<()> {
    store.set(ACCESS_TOKEN_KEY, access.to_string()).await?;
    if let Some(refresh) = rotated_refresh {
        store.set(REFRESH_TOKEN_KEY, refresh.to_string()).await?;
    }
    debug!(rotated = rotated_refresh.is_some(), "updated session tokens");
    Ok(())
}

/// Remove every session key (logout, rejected refresh).
pub async fn clear_credentials(store: &dyn CredentialStore) -> Result<()> {
    for key in SESSION_KEYS {
        store.delete(key).await?;
    }
    debug!("cleared session credentials");
    Ok(())
}

/// Id of the logged-in user, cached at login.
pub async fn cached_user_id(store: &dyn CredentialStore) -> Result<Option<String>> {
    store.get(USER_ID_KEY).await
}

/// In-process store. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryCredentialStore {
    state: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move { Ok(self.state.lock().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.state.lock().await.insert(key.to_string(), value);
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.state.lock().await.remove(key);
            Ok(())
        })
    }
}

/// JSON-file-backed store.
///
/// The Mutex serializes all writes. Reads take the lock briefly and clone
/// the value out of the in-memory map.
pub struct FileCredentialStore {
    path: PathBuf,
    state: Mutex<HashMap<String, String>>,
}

impl FileCredentialStore {
    /// Load the store from `path`.
    ///
    /// A missing file is created as `{}` (logged-out state).
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let entries: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(path = %path.display(), keys = entries.len(), "loaded credential file");
            entries
        } else {
            info!(path = %path.display(), "credential file not found, starting logged out");
            let entries = HashMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move { Ok(self.state.lock().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.insert(key.to_string(), value);
            write_atomic(&self.path, &state).await
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if state.remove(key).is_some() {
                write_atomic(&self.path, &state).await?;
            }
            Ok(())
        })
    }
}

/// Write the store to disk atomically with 0600 permissions.
async fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
