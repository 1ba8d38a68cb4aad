use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use entity::{User, UserSession};
use parking_lot::{Mutex, RwLock};
use platform_authz::PrincipalSource;
use platform_db::{KvStore, StoreError, load_json, save_json};
use platform_directory::UserDirectory;
use platform_obs::{LogRecovery, Recovered, RecoveryObserver};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::token::{decode_token, issue_token};
use crate::{AuthPayload, AuthnError, Clock, SessionClaims, SessionConfig, SystemClock};

/// Called synchronously with the new session on login and `None` on logout.
pub type SessionListener = Arc<dyn Fn(Option<&UserSession>) + Send + Sync>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Owns the single current session of this process.
///
/// Expiry is checked lazily: a session past its expiry is only dropped when
/// [`SessionManager::is_authenticated`] (or [`SessionManager::authenticated_user`])
/// looks at it. [`SessionManager::current_user`] does not check.
pub struct SessionManager {
    store: Arc<dyn KvStore>,
    directory: Arc<UserDirectory>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    observer: Arc<dyn RecoveryObserver>,
    current: RwLock<Option<UserSession>>,
    listeners: Mutex<Vec<(SubscriptionId, SessionListener)>>,
    next_listener: AtomicU64,
}

impl SessionManager {
    /// Build the manager and adopt a previously stored session if it is
    /// still valid.
    pub fn new(
        store: Arc<dyn KvStore>,
        directory: Arc<UserDirectory>,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn RecoveryObserver>,
    ) -> Self {
        let manager = Self {
            store,
            directory,
            clock,
            config,
            observer,
            current: RwLock::new(None),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        };
        manager.restore();
        manager
    }

    pub fn with_defaults(
        store: Arc<dyn KvStore>,
        directory: Arc<UserDirectory>,
        config: SessionConfig,
    ) -> Self {
        Self::new(
            store,
            directory,
            config,
            Arc::new(SystemClock),
            Arc::new(LogRecovery),
        )
    }

    pub fn directory(&self) -> &Arc<UserDirectory> {
        &self.directory
    }

    /// Authenticate and start a new session, replacing any current one.
    ///
    /// Bad credentials and internal failures are both reported through the
    /// payload; this never panics or returns an error.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AuthPayload {
        match self.try_login(email, password).await {
            Ok(session) => AuthPayload {
                success: true,
                message: format!("Welcome back, {}", session.user.name),
                user: Some(session.user),
            },
            Err(AuthnError::InvalidCredentials) => {
                info!("login rejected");
                AuthPayload::failure("Invalid email or password")
            }
            Err(err) => {
                error!(error = %err, "login failed");
                AuthPayload::failure("Login failed due to an unexpected error")
            }
        }
    }

    async fn try_login(&self, email: &str, password: &str) -> Result<UserSession, AuthnError> {
        let candidate = self
            .directory
            .find_active_by_email(email)?
            .ok_or(AuthnError::InvalidCredentials)?;

        let credentials = Arc::clone(self.directory.credentials());
        let user_id = candidate.id.clone();
        let password = password.to_string();
        let verified =
            tokio::task::spawn_blocking(move || credentials.verify(&user_id, &password))
                .await
                .map_err(AuthnError::unexpected)??;
        if !verified {
            return Err(AuthnError::InvalidCredentials);
        }

        let now = self.clock.now();
        let expires_at = now + self.config.ttl;
        let sid = Uuid::new_v4().simple().to_string();
        let token = issue_token(&candidate.id, &sid, now, expires_at, &self.config)?;
        let mut user = candidate;
        user.last_login = Some(now);
        let session = UserSession {
            user,
            token,
            expires_at,
            login_time: now,
        };

        save_json(self.store.as_ref(), &self.config.storage_key, &session)?;
        // Only a persisted session counts as a login.
        if let Err(err) = self.directory.record_login(&session.user.id, now) {
            self.discard_stored();
            return Err(err.into());
        }
        *self.current.write() = Some(session.clone());
        info!(user = %session.user.id, %expires_at, "login succeeded");
        self.notify(Some(&session));
        Ok(session)
    }

    /// Drop the current session and its stored copy. Listeners are notified
    /// even when there was nothing to drop.
    ///
    /// The in-memory session is gone either way. An error means the stored
    /// copy is still there and the next process will restore it.
    #[instrument(skip(self))]
    pub fn logout(&self) -> Result<(), AuthnError> {
        let previous = self.current.write().take();
        let removed = self.store.remove(&self.config.storage_key);
        if let Some(session) = previous {
            info!(user = %session.user.id, "logged out");
        }
        self.notify(None);
        removed.map_err(|err| {
            error!(error = %err, "failed to remove stored session");
            AuthnError::from(err)
        })
    }

    pub fn current_user(&self) -> Option<User> {
        self.current.read().as_ref().map(|s| s.user.clone())
    }

    pub fn current_session(&self) -> Option<UserSession> {
        self.current.read().clone()
    }

    /// False when there is no session. An expired session is logged out on
    /// the spot.
    pub fn is_authenticated(&self) -> bool {
        let expired = match self.current.read().as_ref() {
            None => return false,
            Some(session) => session.is_expired_at(self.clock.now()),
        };
        if expired {
            info!("session expired");
            // An expired copy left on disk is rejected by the next restore.
            let _ = self.logout();
            return false;
        }
        true
    }

    /// The current user, after the expiry check.
    pub fn authenticated_user(&self) -> Option<User> {
        if self.is_authenticated() {
            self.current_user()
        } else {
            None
        }
    }

    /// Validate a token issued by this manager: signature and expiry.
    pub fn verify_token(&self, token: &str) -> Result<SessionClaims, AuthnError> {
        decode_token(token, &self.config, self.clock.now())
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(Option<&UserSession>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Returns false when `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn notify(&self, session: Option<&UserSession>) {
        let listeners: Vec<SessionListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(session);
        }
    }

    fn restore(&self) {
        let key = self.config.storage_key.as_str();
        match load_json::<UserSession>(self.store.as_ref(), key) {
            Ok(Some(session)) if !session.is_expired_at(self.clock.now()) => {
                info!(user = %session.user.id, expires_at = %session.expires_at, "restored stored session");
                *self.current.write() = Some(session);
            }
            Ok(Some(_)) => {
                debug!("stored session expired, discarding");
                self.discard_stored();
            }
            Ok(None) => {}
            Err(StoreError::Corrupt { reason, .. }) => {
                self.observer
                    .recovered(&Recovered::SessionDiscarded { reason });
                self.discard_stored();
            }
            Err(err) => warn!(error = %err, "could not read stored session"),
        }
    }

    fn discard_stored(&self) {
        if let Err(err) = self.store.remove(&self.config.storage_key) {
            warn!(error = %err, "failed to remove stored session");
        }
    }
}

impl PrincipalSource for SessionManager {
    fn principal(&self) -> Option<User> {
        self.authenticated_user()
    }
}
