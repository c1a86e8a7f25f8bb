//! Session state that survives reloads and short backend outages.
//!
//! # Design
//! `SessionManager` is the only owner of the in-memory session and the only
//! writer of the persisted slot. Network calls run without any lock held, so
//! a request that never completes only stalls the call that issued it. The
//! store lock is taken afterwards for the slot read, slot write and state
//! change, which therefore never interleave between operations. Readers go
//! through a `watch` channel and never wait on that lock.
//!
//! When start-up re-validation fails, the next state comes from
//! [`reconcile`], a plain decision table over "is there a cached user" and
//! "did the server say you are not logged in".

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::store::SessionStore;
use crate::types::{LoginResponse, UserRecord};

/// Backend calls the session manager depends on.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;
    async fn logout(&self) -> Result<(), ApiError>;
    async fn register(&self, email: &str, name: &str, password: &str) -> Result<(), ApiError>;
    async fn current_user(&self) -> Result<UserRecord, ApiError>;
}

/// Render-level session state.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Start-up re-validation has not settled. `cached` is the persisted user,
    /// shown optimistically until it does.
    Initializing { cached: Option<UserRecord> },
    Authenticated(UserRecord),
    Unauthenticated,
}

impl SessionState {
    pub fn session(&self) -> Session {
        let user = match self {
            SessionState::Initializing { cached } => cached.clone(),
            SessionState::Authenticated(user) => Some(user.clone()),
            SessionState::Unauthenticated => None,
        };
        Session { user }
    }

    pub fn is_initializing(&self) -> bool {
        matches!(self, SessionState::Initializing { .. })
    }
}

/// Who is logged in, if anyone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    pub user: Option<UserRecord>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// How a failed re-validation is classified for reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 401 or 403.
    Unauthenticated,
    /// Network failure, server error, or anything else.
    Other,
}

impl FailureKind {
    pub fn of(err: &ApiError) -> Self {
        if err.is_unauthenticated() {
            FailureKind::Unauthenticated
        } else {
            FailureKind::Other
        }
    }
}

/// Outcome of reconciling a failed re-validation with the persisted slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Stay authenticated as the cached user; the slot is left as is.
    KeepCached(UserRecord),
    /// Become unauthenticated, clearing the slot when asked to.
    SignOut { clear_store: bool },
}

/// Cache-first decision table.
///
/// | cached | failure          | next state                        |
/// |--------|------------------|-----------------------------------|
/// | yes    | 401/403          | authenticated as cached           |
/// | yes    | other            | authenticated as cached           |
/// | no     | 401/403          | unauthenticated, slot cleared     |
/// | no     | other            | unauthenticated                   |
pub fn reconcile(cached: Option<UserRecord>, failure: FailureKind) -> Reconciliation {
    match (cached, failure) {
        (Some(user), FailureKind::Unauthenticated) => Reconciliation::KeepCached(user),
        (Some(user), FailureKind::Other) => Reconciliation::KeepCached(user),
        (None, FailureKind::Unauthenticated) => Reconciliation::SignOut { clear_store: true },
        (None, FailureKind::Other) => Reconciliation::SignOut { clear_store: false },
    }
}

/// Owns the current session and the persisted slot.
pub struct SessionManager<A, S> {
    auth: A,
    store: Mutex<S>,
    state: watch::Sender<SessionState>,
}

impl<A: AuthApi, S: SessionStore> SessionManager<A, S> {
    /// Read the persisted slot and enter `Initializing`. Call [`start`] to
    /// re-validate against the backend.
    ///
    /// [`start`]: SessionManager::start
    pub fn new(auth: A, store: S) -> Self {
        let cached = load_slot(&store);
        let (state, _) = watch::channel(SessionState::Initializing { cached });
        Self {
            auth,
            store: Mutex::new(store),
            state,
        }
    }

    pub fn auth(&self) -> &A {
        &self.auth
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Session {
        self.state.borrow().session()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Re-validate with the backend and settle the state.
    pub async fn start(&self) -> Session {
        let outcome = self.auth.current_user().await;

        let mut store = self.store.lock().await;
        match outcome {
            Ok(user) => {
                save_slot(&mut *store, &user);
                self.transition(SessionState::Authenticated(user));
            }
            Err(err) => {
                let failure = FailureKind::of(&err);
                match reconcile(load_slot(&*store), failure) {
                    Reconciliation::KeepCached(user) => {
                        warn!(error = %err, "session re-validation failed, using cached user");
                        self.transition(SessionState::Authenticated(user));
                    }
                    Reconciliation::SignOut { clear_store } => {
                        if clear_store {
                            clear_slot(&mut *store);
                        }
                        self.transition(SessionState::Unauthenticated);
                    }
                }
            }
        }
        drop(store);

        self.session()
    }

    /// Log in and persist the returned user. Failures propagate untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let response = self.auth.login(email, password).await?;
        self.adopt_login(response).await
    }

    /// Register, then log in with the same credentials.
    ///
    /// A registration that succeeds followed by a failed login reports the
    /// login failure and leaves the state untouched.
    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<LoginResponse, ApiError> {
        self.auth.register(email, name, password).await?;
        self.login(email, password).await
    }

    /// End the session locally whatever the backend answers.
    pub async fn logout(&self) {
        if let Err(err) = self.auth.logout().await {
            warn!(error = %err, "logout request failed, clearing local session anyway");
        }
        let mut store = self.store.lock().await;
        clear_slot(&mut *store);
        self.transition(SessionState::Unauthenticated);
    }

    async fn adopt_login(&self, response: LoginResponse) -> Result<LoginResponse, ApiError> {
        let user = response
            .user
            .clone()
            .ok_or_else(|| ApiError::Decode("login response has no user".to_string()))?;
        let mut store = self.store.lock().await;
        save_slot(&mut *store, &user);
        self.transition(SessionState::Authenticated(user));
        Ok(response)
    }

    fn transition(&self, next: SessionState) {
        match &next {
            SessionState::Authenticated(user) => {
                info!(email = user.email().unwrap_or("?"), "session authenticated")
            }
            SessionState::Unauthenticated => info!("session unauthenticated"),
            SessionState::Initializing { .. } => {}
        }
        self.state.send_replace(next);
    }
}

fn load_slot<S: SessionStore>(store: &S) -> Option<UserRecord> {
    store.load().unwrap_or_else(|err| {
        warn!(error = %err, "ignoring unreadable persisted session");
        None
    })
}

fn save_slot<S: SessionStore>(store: &mut S, user: &UserRecord) {
    if let Err(err) = store.save(user) {
        warn!(error = %err, "failed to persist session");
    }
}

fn clear_slot<S: SessionStore>(store: &mut S) {
    if let Err(err) = store.clear() {
        warn!(error = %err, "failed to clear persisted session");
    }
}
