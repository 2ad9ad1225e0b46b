//! Single-flight access token refresh
//!
//! The coordinator owns the refresh state machine shared by every client
//! built from it:
//!
//! - `Idle` + 401 → `Refreshing`, one refresh call on a detached task
//! - `Refreshing` + 401 → caller queued as a pending waiter
//! - refresh done → store updated (or cleared), state back to `Idle`, every
//!   waiter receives the same `RefreshOutcome`
//!
//! An epoch counter is bumped on each successful refresh and whenever a
//! login or logout replaces the session. Requests carry the epoch of the
//! token they were sent with, so a 401 for a token that has already been
//! replaced replays with the current token instead of starting a second
//! refresh. A refresh that finishes after its session was replaced leaves
//! the store alone.
//!
//! Credential reads for outgoing requests and the post-refresh store write
//! both happen under the coordinator lock, so no request sees a
//! half-applied refresh.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use auth_store::{
    ACCESS_TOKEN_KEY, Credential, CredentialStore, REFRESH_TOKEN_KEY, TokenRefresher,
    USER_ID_KEY, clear_credentials, update_tokens,
};
use common::Secret;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Result of one refresh attempt, delivered to every waiter.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Refreshed { access: Secret<String>, epoch: u64 },
    Expired { reason: String },
}

/// Access token (if any) captured for an outgoing request, with the epoch
/// it belongs to.
#[derive(Debug, Clone)]
pub struct AccessSnapshot {
    pub token: Option<Secret<String>>,
    pub epoch: u64,
}

impl AccessSnapshot {
    /// Snapshot for requests that must not carry credentials.
    pub fn anonymous() -> Self {
        Self {
            token: None,
            epoch: 0,
        }
    }
}

/// Runtime state of the coordinator.
///
/// Transitions:
/// - Idle → Refreshing (first 401 for the current epoch, or explicit refresh)
/// - Refreshing → Idle (refresh task finished, waiters drained)
enum RefreshState {
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    },
}

struct Inner {
    state: RefreshState,
    epoch: u64,
}

/// Shared refresh coordinator.
///
/// Construct one per credential store and hand the same `Arc` to every
/// `AuthenticatedClient` that should share refresh state. Independent
/// coordinators never interact.
pub struct RefreshCoordinator {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    inner: Mutex<Inner>,
    refresh_calls: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<dyn CredentialStore>, refresher: Arc<dyn TokenRefresher>) -> Arc<Self> {
        Arc::new(Self {
            store,
            refresher,
            inner: Mutex::new(Inner {
                state: RefreshState::Idle,
                epoch: 0,
            }),
            refresh_calls: AtomicU64::new(0),
        })
    }

    /// The credential store this coordinator reads and writes.
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Number of refresh calls issued to the refresher so far.
    pub fn refresh_calls(&self) -> u64 {
        self.refresh_calls.load(Ordering::Relaxed)
    }

    /// Current credential epoch.
    pub async fn epoch(&self) -> u64 {
        self.inner.lock().await.epoch
    }

    pub async fn is_refreshing(&self) -> bool {
        matches!(self.inner.lock().await.state, RefreshState::Refreshing { .. })
    }

    /// Token to attach to a request about to be sent.
    ///
    /// While a refresh is in flight the caller waits for it and uses the
    /// refreshed token; if that refresh fails the caller gets `AuthExpired`.
    pub async fn current_access(self: &Arc<Self>) -> Result<AccessSnapshot> {
        let rx = {
            let mut inner = self.inner.lock().await;
            let epoch = inner.epoch;
            if let RefreshState::Refreshing { waiters } = &mut inner.state {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                rx
            } else {
                let token = self.store.get(ACCESS_TOKEN_KEY).await?;
                return Ok(AccessSnapshot {
                    token: token.map(Secret::new),
                    epoch,
                });
            }
        };

        debug!("refresh in flight, waiting before sending request");
        let (access, epoch) = await_outcome(rx).await?;
        Ok(AccessSnapshot {
            token: Some(access),
            epoch,
        })
    }

    /// Handle a 401 for a request sent with a token from `sent_epoch`.
    ///
    /// Returns the token to replay with, or `AuthExpired` when the session
    /// cannot be refreshed.
    pub async fn on_unauthorized(self: &Arc<Self>, sent_epoch: u64) -> Result<Secret<String>> {
        let rx = {
            let mut inner = self.inner.lock().await;
            if matches!(inner.state, RefreshState::Idle) && inner.epoch != sent_epoch {
                // The token was replaced after this request went out.
                return match self.store.get(ACCESS_TOKEN_KEY).await? {
                    Some(token) => {
                        debug!(
                            sent_epoch,
                            epoch = inner.epoch,
                            "stale token, replaying with current token"
                        );
                        Ok(Secret::new(token))
                    }
                    None => Err(Error::AuthExpired("session was cleared".into())),
                };
            }
            self.join_or_start(&mut inner)
        };
        await_outcome(rx).await.map(|(access, _)| access)
    }

    /// Refresh now, joining any refresh already in flight.
    pub async fn refresh(self: &Arc<Self>) -> Result<Secret<String>> {
        let rx = {
            let mut inner = self.inner.lock().await;
            self.join_or_start(&mut inner)
        };
        await_outcome(rx).await.map(|(access, _)| access)
    }

    /// Store a new session (login, registration) and start a new epoch.
    ///
    /// A refresh still running for the previous session will not touch it.
    pub async fn replace_session(
        &self,
        credential: &Credential,
        user_id: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        credential.save(self.store.as_ref()).await?;
        match user_id {
            Some(id) => self.store.set(USER_ID_KEY, id.to_string()).await?,
            None => self.store.delete(USER_ID_KEY).await?,
        }
        inner.epoch += 1;
        debug!(epoch = inner.epoch, "session replaced");
        Ok(())
    }

    /// Remove the session (logout) and start a new epoch.
    pub async fn clear_session(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        clear_credentials(self.store.as_ref()).await?;
        inner.epoch += 1;
        debug!(epoch = inner.epoch, "session cleared");
        Ok(())
    }

    /// Register a waiter, spawning the refresh task if none is running.
    fn join_or_start(self: &Arc<Self>, inner: &mut Inner) -> oneshot::Receiver<RefreshOutcome> {
        let (tx, rx) = oneshot::channel();
        if let RefreshState::Refreshing { waiters } = &mut inner.state {
            debug!(queued = waiters.len() + 1, "refresh in flight, queueing request");
            waiters.push(tx);
        } else {
            debug!("starting token refresh");
            inner.state = RefreshState::Refreshing { waiters: vec![tx] };
            tokio::spawn(self.clone().run_refresh(inner.epoch));
        }
        rx
    }

    /// Perform the refresh call and resolve every waiter. `started` is the
    /// epoch of the session being refreshed.
    async fn run_refresh(self: Arc<Self>, started: u64) {
        let result = match self.store.get(REFRESH_TOKEN_KEY).await {
            Ok(Some(refresh)) => {
                self.refresh_calls.fetch_add(1, Ordering::Relaxed);
                self.refresher
                    .refresh(&refresh)
                    .await
                    .map_err(|e| e.to_string())
            }
            Ok(None) => Err("no refresh token stored".to_string()),
            Err(e) => Err(format!("reading refresh token: {e}")),
        };

        let mut inner = self.inner.lock().await;
        let outcome = match result {
            _ if inner.epoch != started => self.superseded(inner.epoch).await,
            Ok(token) => {
                match update_tokens(
                    self.store.as_ref(),
                    &token.token,
                    token.refresh_token.as_deref(),
                )
                .await
                {
                    Ok(()) => {
                        inner.epoch += 1;
                        info!(epoch = inner.epoch, "token refresh succeeded");
                        crate::metrics::record_refresh("success");
                        RefreshOutcome::Refreshed {
                            access: Secret::new(token.token),
                            epoch: inner.epoch,
                        }
                    }
                    Err(e) => self.expire(format!("persisting refreshed token: {e}")).await,
                }
            }
            Err(reason) => self.expire(reason).await,
        };

        let waiters = match std::mem::replace(&mut inner.state, RefreshState::Idle) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => Vec::new(),
        };
        drop(inner);

        debug!(waiters = waiters.len(), "resolving pending requests");
        for waiter in waiters {
            // A dropped receiver means the caller went away; nothing to do.
            let _ = waiter.send(outcome.clone());
        }
    }

    /// Outcome for a refresh whose session was replaced while it ran: the
    /// result is discarded and waiters continue with whatever is stored now.
    async fn superseded(&self, epoch: u64) -> RefreshOutcome {
        debug!(epoch, "session replaced during refresh, discarding result");
        match self.store.get(ACCESS_TOKEN_KEY).await {
            Ok(Some(token)) => RefreshOutcome::Refreshed {
                access: Secret::new(token),
                epoch,
            },
            Ok(None) => RefreshOutcome::Expired {
                reason: "session was cleared".into(),
            },
            Err(e) => RefreshOutcome::Expired {
                reason: format!("reading access token: {e}"),
            },
        }
    }

    /// Clear the session after an unrecoverable refresh failure.
    async fn expire(&self, reason: String) -> RefreshOutcome {
        warn!(error = %reason, "token refresh failed, clearing credentials");
        crate::metrics::record_refresh("failure");
        if let Err(e) = clear_credentials(self.store.as_ref()).await {
            warn!(error = %e, "failed to clear credentials after refresh failure");
        }
        RefreshOutcome::Expired { reason }
    }
}

async fn await_outcome(rx: oneshot::Receiver<RefreshOutcome>) -> Result<(Secret<String>, u64)> {
    match rx.await {
        Ok(RefreshOutcome::Refreshed { access, epoch }) => Ok((access, epoch)),
        Ok(RefreshOutcome::Expired { reason }) => Err(Error::AuthExpired(reason)),
        Err(_) => Err(Error::AuthExpired("refresh task aborted".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth_store::{
        BoxFuture, Credential, MemoryCredentialStore, SESSION_KEYS, TokenResponse, USER_ID_KEY,
    };
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Refresher that counts calls and answers after `delay`.
    struct FakeRefresher {
        calls: AtomicUsize,
        delay: Duration,
        accept: bool,
        rotate: bool,
    }

    impl FakeRefresher {
        fn accepting(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                accept: true,
                rotate: false,
            })
        }

        fn rejecting(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                accept: false,
                rotate: false,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TokenRefresher for FakeRefresher {
        fn refresh<'a>(
            &'a self,
            refresh_token: &'a str,
        ) -> BoxFuture<'a, auth_store::Result<TokenResponse>> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(self.delay).await;
                if !self.accept {
                    return Err(auth_store::Error::InvalidCredentials(format!(
                        "{refresh_token} rejected"
                    )));
                }
                Ok(TokenResponse {
                    token: format!("at_refreshed_{n}"),
                    refresh_token: self.rotate.then(|| format!("rt_rotated_{n}")),
                })
            })
        }
    }

    async fn logged_in_store() -> Arc<MemoryCredentialStore> {
        let store = Arc::new(MemoryCredentialStore::new());
        Credential::new("at_stale", Some("rt_1".into()))
            .save(store.as_ref())
            .await
            .unwrap();
        store.set(USER_ID_KEY, "42".into()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn concurrent_unauthorized_share_one_refresh() {
        let store = logged_in_store().await;
        let refresher = FakeRefresher::accepting(Duration::from_millis(50));
        let coordinator = RefreshCoordinator::new(store.clone(), refresher.clone());

        let epoch = coordinator.current_access().await.unwrap().epoch;
        let mut handles = vec![];
        for _ in 0..8 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move {
                coordinator.on_unauthorized(epoch).await
            }));
        }

        for h in handles {
            let token = h.await.unwrap().unwrap();
            assert_eq!(token.expose(), "at_refreshed_1");
        }
        assert_eq!(refresher.calls(), 1);
        assert_eq!(coordinator.refresh_calls(), 1);
        assert_eq!(coordinator.epoch().await, epoch + 1);
        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(),
            Some("at_refreshed_1")
        );
        // Not rotated, so the original refresh token stays
        assert_eq!(
            store.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
            Some("rt_1")
        );
        assert!(!coordinator.is_refreshing().await);
    }

    #[tokio::test]
    async fn rejected_refresh_expires_every_waiter_and_clears_store() {
        let store = logged_in_store().await;
        let refresher = FakeRefresher::rejecting(Duration::from_millis(50));
        let coordinator = RefreshCoordinator::new(store.clone(), refresher.clone());

        let mut handles = vec![];
        for _ in 0..5 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(
                async move { coordinator.on_unauthorized(0).await },
            ));
        }

        for h in handles {
            let err = h.await.unwrap().unwrap_err();
            assert!(err.is_auth_expired(), "got: {err}");
        }
        assert_eq!(refresher.calls(), 1);
        for key in SESSION_KEYS {
            assert!(store.get(key).await.unwrap().is_none(), "{key} not cleared");
        }
        assert_eq!(coordinator.epoch().await, 0);
    }

    #[tokio::test]
    async fn stale_epoch_replays_without_refreshing() {
        let store = logged_in_store().await;
        let refresher = FakeRefresher::accepting(Duration::ZERO);
        let coordinator = RefreshCoordinator::new(store, refresher.clone());

        coordinator.on_unauthorized(0).await.unwrap();
        assert_eq!(refresher.calls(), 1);

        // A request sent before that refresh completes later with a 401
        let token = coordinator.on_unauthorized(0).await.unwrap();
        assert_eq!(token.expose(), "at_refreshed_1");
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn missing_refresh_token_expires_without_calling_refresher() {
        let store = Arc::new(MemoryCredentialStore::new());
        Credential::new("at_only", None)
            .save(store.as_ref())
            .await
            .unwrap();
        let refresher = FakeRefresher::accepting(Duration::ZERO);
        let coordinator = RefreshCoordinator::new(store.clone(), refresher.clone());

        let err = coordinator.on_unauthorized(0).await.unwrap_err();
        assert!(err.is_auth_expired());
        assert_eq!(refresher.calls(), 0);
        assert!(store.get(ACCESS_TOKEN_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn late_unauthorized_after_failed_refresh_also_expires() {
        let store = logged_in_store().await;
        let refresher = FakeRefresher::rejecting(Duration::ZERO);
        let coordinator = RefreshCoordinator::new(store, refresher.clone());

        assert!(coordinator.on_unauthorized(0).await.unwrap_err().is_auth_expired());
        // Same epoch, store now empty: no second network refresh
        assert!(coordinator.on_unauthorized(0).await.unwrap_err().is_auth_expired());
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn current_access_waits_for_in_flight_refresh() {
        let store = logged_in_store().await;
        let refresher = FakeRefresher::accepting(Duration::from_millis(100));
        let coordinator = RefreshCoordinator::new(store, refresher.clone());

        let trigger = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.on_unauthorized(0).await })
        };
        // Let the trigger move the coordinator into Refreshing
        while !coordinator.is_refreshing().await {
            tokio::task::yield_now().await;
        }

        let snapshot = coordinator.current_access().await.unwrap();
        assert_eq!(snapshot.token.unwrap().expose(), "at_refreshed_1");
        assert_eq!(snapshot.epoch, 1);
        trigger.await.unwrap().unwrap();
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn rotated_refresh_token_is_stored() {
        let store = logged_in_store().await;
        let refresher = Arc::new(FakeRefresher {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            accept: true,
            rotate: true,
        });
        let coordinator = RefreshCoordinator::new(store.clone(), refresher);

        coordinator.refresh().await.unwrap();
        assert_eq!(
            store.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
            Some("rt_rotated_1")
        );
    }

    #[tokio::test]
    async fn independent_coordinators_refresh_independently() {
        let refresher = FakeRefresher::accepting(Duration::ZERO);
        let a = RefreshCoordinator::new(logged_in_store().await, refresher.clone());
        let b = RefreshCoordinator::new(logged_in_store().await, refresher.clone());

        a.on_unauthorized(0).await.unwrap();
        b.on_unauthorized(0).await.unwrap();
        assert_eq!(refresher.calls(), 2);
        assert_eq!(a.epoch().await, 1);
        assert_eq!(b.epoch().await, 1);
    }

    #[tokio::test]
    async fn logged_out_snapshot_has_no_token() {
        let coordinator = RefreshCoordinator::new(
            Arc::new(MemoryCredentialStore::new()),
            FakeRefresher::accepting(Duration::ZERO),
        );
        let snapshot = coordinator.current_access().await.unwrap();
        assert!(snapshot.token.is_none());
        assert_eq!(snapshot.epoch, 0);
    }

    /// Wait until the spawned refresh task has registered.
    async fn until_refreshing(coordinator: &Arc<RefreshCoordinator>) {
        while !coordinator.is_refreshing().await {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn login_during_failed_refresh_survives() {
        let store = logged_in_store().await;
        let refresher = FakeRefresher::rejecting(Duration::from_millis(50));
        let coordinator = RefreshCoordinator::new(store.clone(), refresher.clone());

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.on_unauthorized(0).await })
        };
        until_refreshing(&coordinator).await;

        coordinator
            .replace_session(&Credential::new("at_login", Some("rt_login".into())), Some("7"))
            .await
            .unwrap();

        // The waiter continues with the new session instead of expiring
        let token = waiter.await.unwrap().unwrap();
        assert_eq!(token.expose(), "at_login");
        assert_eq!(refresher.calls(), 1);
        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(),
            Some("at_login")
        );
        assert_eq!(
            store.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
            Some("rt_login")
        );
        assert_eq!(store.get(USER_ID_KEY).await.unwrap().as_deref(), Some("7"));
        assert!(!coordinator.is_refreshing().await);
    }

    #[tokio::test]
    async fn login_during_successful_refresh_is_not_overwritten() {
        let store = logged_in_store().await;
        let refresher = FakeRefresher::accepting(Duration::from_millis(50));
        let coordinator = RefreshCoordinator::new(store.clone(), refresher.clone());

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.on_unauthorized(0).await })
        };
        until_refreshing(&coordinator).await;
        coordinator
            .replace_session(&Credential::new("at_login", None), None)
            .await
            .unwrap();

        assert_eq!(waiter.await.unwrap().unwrap().expose(), "at_login");
        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(),
            Some("at_login")
        );
        assert!(store.get(USER_ID_KEY).await.unwrap().is_none());
        assert_eq!(coordinator.epoch().await, 1);
    }

    #[tokio::test]
    async fn logout_during_refresh_expires_waiters() {
        let store = logged_in_store().await;
        let refresher = FakeRefresher::accepting(Duration::from_millis(50));
        let coordinator = RefreshCoordinator::new(store.clone(), refresher);

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.on_unauthorized(0).await })
        };
        until_refreshing(&coordinator).await;
        coordinator.clear_session().await.unwrap();

        let err = waiter.await.unwrap().unwrap_err();
        assert!(err.is_auth_expired(), "got: {err}");
        // The refreshed token for the old session is not written back
        for key in SESSION_KEYS {
            assert!(
                store.get(key).await.unwrap().is_none(),
                "{key} written back"
            );
        }
    }

    #[tokio::test]
    async fn replaced_session_makes_old_401s_replay() {
        let store = logged_in_store().await;
        let refresher = FakeRefresher::accepting(Duration::ZERO);
        let coordinator = RefreshCoordinator::new(store, refresher.clone());

        let sent = coordinator.current_access().await.unwrap().epoch;
        coordinator
            .replace_session(&Credential::new("at_login", None), Some("42"))
            .await
            .unwrap();

        let token = coordinator.on_unauthorized(sent).await.unwrap();
        assert_eq!(token.expose(), "at_login");
        assert_eq!(refresher.calls(), 0);
    }
}
