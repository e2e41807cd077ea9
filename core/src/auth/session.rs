//! # Session Context
//!
//! The one place that knows who is signed in. Built once at startup by
//! [`SessionContext::restore`], mutated only by login, registration and
//! logout, and torn down by [`SessionContext::shutdown`]. Everything else
//! gets a [`SessionObserver`], which can read the session but not change it.
//!
//! ## Lifecycle
//!
//! ```text
//! restore ──► Anonymous ──login/register──► Authenticated ──logout──► Anonymous
//!                 ▲                              │
//!                 └──── token rejected ──────────┘
//! ```
//!
//! Locks are never held across an `.await`: state is cloned out, the
//! remote call runs, and the result is written back.

use chrono::Utc;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::guard::GuardContext;
use super::identity::{
    check_sign_up_input, AuthFailure, AuthenticatedIdentity, BearerToken, IdentityError,
    IdentityProvider, Locale,
};
use super::store::{CredentialStore, StoreError};
use crate::config::TOKEN_REFRESH_MARGIN;
use crate::ledger::{LedgerClient, LedgerError, RegisterRequest};
use crate::user::User;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A signed-in user: provider tokens plus the ledger's view of the account.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub identity: AuthenticatedIdentity,
    pub user: User,
}

/// What happened to the persisted credentials at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Nothing was stored.
    Anonymous,
    Restored,
    /// Stored credentials were rejected and have been discarded.
    Expired,
    /// The account behind the stored credentials is deactivated.
    Disabled,
    /// A service was unreachable. Credentials are kept for the next start.
    Offline(String),
}

impl fmt::Display for RestoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreOutcome::Anonymous => write!(f, "anonymous"),
            RestoreOutcome::Restored => write!(f, "restored"),
            RestoreOutcome::Expired => write!(f, "expired"),
            RestoreOutcome::Disabled => write!(f, "disabled"),
            RestoreOutcome::Offline(reason) => write!(f, "offline ({reason})"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not signed in")]
    NotAuthenticated,

    /// The ledger reports the account as deactivated.
    #[error("account {0} is disabled")]
    AccountDisabled(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    pub fn user_message(&self, locale: Locale) -> String {
        match self {
            SessionError::NotAuthenticated => match locale {
                Locale::Fr => "Veuillez vous connecter".to_string(),
                Locale::En => "Please sign in".to_string(),
            },
            SessionError::AccountDisabled(_) => {
                AuthFailure::AccountDisabled.message(locale).to_string()
            }
            SessionError::Identity(e) => e.user_message(locale).to_string(),
            SessionError::Ledger(e) => e.user_message(),
            SessionError::Store(e) => e.to_string(),
        }
    }
}

fn rejected(e: &IdentityError) -> bool {
    matches!(e, IdentityError::Rejected(_))
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Owner of the process-wide session.
pub struct SessionContext {
    state: Arc<RwLock<Option<Session>>>,
    identity: Arc<dyn IdentityProvider>,
    ledger: LedgerClient,
    store: Arc<dyn CredentialStore>,
    refresh_margin: Duration,
    outcome: RestoreOutcome,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("authenticated", &self.state.read().is_some())
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    /// Loads persisted credentials and re-validates them against the
    /// identity provider and the ledger.
    ///
    /// Rejected or disabled credentials are deleted. Network failures leave
    /// the context anonymous but keep the file, so an offline start does not
    /// sign the user out. Only a store I/O failure is an error.
    pub async fn restore(
        identity: Arc<dyn IdentityProvider>,
        ledger: LedgerClient,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, SessionError> {
        let mut ctx = Self {
            state: Arc::new(RwLock::new(None)),
            identity,
            ledger,
            store,
            refresh_margin: TOKEN_REFRESH_MARGIN,
            outcome: RestoreOutcome::Anonymous,
        };

        let stored = match ctx.store.load().await {
            Ok(stored) => stored,
            Err(StoreError::Corrupt { path, source }) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %source,
                    "discarding unreadable credentials"
                );
                ctx.store.clear().await?;
                None
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(stored) = stored {
            ctx.outcome = ctx.revalidate(stored).await?;
        }
        tracing::info!(outcome = %ctx.outcome, "session restored");
        Ok(ctx)
    }

    async fn revalidate(
        &self,
        stored: AuthenticatedIdentity,
    ) -> Result<RestoreOutcome, SessionError> {
        let mut current = stored.clone();
        if current.is_expired(Utc::now(), self.refresh_margin) {
            match self.identity.refresh(&current).await {
                Ok(fresh) => current = fresh,
                Err(e) if rejected(&e) => {
                    tracing::info!(error = %e, "stored session expired");
                    self.store.clear().await?;
                    return Ok(RestoreOutcome::Expired);
                }
                Err(e) => return Ok(RestoreOutcome::Offline(e.to_string())),
            }
        }

        let user = match self.ledger.current_user(&current.id_token).await {
            Ok(user) => user,
            Err(LedgerError::Unauthorized { .. }) => {
                self.store.clear().await?;
                return Ok(RestoreOutcome::Expired);
            }
            Err(e) => return Ok(RestoreOutcome::Offline(e.to_string())),
        };

        if !user.is_active {
            tracing::warn!(user = %user.id, "stored session belongs to a disabled account");
            self.store.clear().await?;
            return Ok(RestoreOutcome::Disabled);
        }

        if current != stored {
            self.store.save(&current).await?;
        }
        *self.state.write() = Some(Session {
            identity: current,
            user,
        });
        Ok(RestoreOutcome::Restored)
    }

    pub fn restore_outcome(&self) -> &RestoreOutcome {
        &self.outcome
    }

    pub fn observer(&self) -> SessionObserver {
        SessionObserver {
            state: Arc::clone(&self.state),
        }
    }

    pub fn ledger(&self) -> &LedgerClient {
        &self.ledger
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.read().as_ref().map(|s| s.user.clone())
    }

    /// Signs in, loads the ledger profile and persists the credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let identity = self.identity.sign_in(email.trim(), password).await?;
        let user = self.ledger.current_user(&identity.id_token).await?;

        if !user.is_active {
            if let Err(e) = self.identity.sign_out(&identity).await {
                tracing::debug!(error = %e, "sign-out after disabled login failed");
            }
            return Err(SessionError::AccountDisabled(user.email));
        }

        self.store.save(&identity).await?;
        tracing::info!(user = %user.id, admin = user.is_admin(), "signed in");
        *self.state.write() = Some(Session {
            identity,
            user: user.clone(),
        });
        Ok(user)
    }

    /// Creates the account on the ledger, then signs in with it.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<User, SessionError> {
        let email = email.trim();
        check_sign_up_input(email, password).map_err(IdentityError::from)?;

        let req = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            full_name: full_name.trim().to_string(),
        };
        let created = self.ledger.register(&req).await?;
        tracing::info!(user = %created.user_id, "account registered");

        self.login(email, password).await
    }

    /// Ends the session and deletes persisted credentials. Signing out while
    /// anonymous only clears the store.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let previous = self.state.write().take();
        if let Some(session) = &previous {
            if let Err(e) = self.identity.sign_out(&session.identity).await {
                tracing::warn!(error = %e, "provider sign-out failed");
            }
            tracing::info!(user = %session.user.id, "signed out");
        }
        self.store.clear().await?;
        Ok(())
    }

    /// A bearer token valid for at least the refresh margin.
    pub async fn bearer_token(&self) -> Result<BearerToken, SessionError> {
        let identity = self
            .state
            .read()
            .as_ref()
            .map(|s| s.identity.clone())
            .ok_or(SessionError::NotAuthenticated)?;

        if !identity.is_expired(Utc::now(), self.refresh_margin) {
            return Ok(identity.id_token);
        }

        let fresh = match self.identity.refresh(&identity).await {
            Ok(fresh) => fresh,
            Err(e) if rejected(&e) => {
                tracing::info!(error = %e, "session expired");
                if self.take_if_current(&identity.uid) {
                    self.store.clear().await?;
                }
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        // logout may have run while the refresh was in flight
        if !self.replace_identity(&fresh) {
            tracing::debug!("session ended during token refresh");
            return Err(SessionError::NotAuthenticated);
        }
        self.store.save(&fresh).await?;
        if !self.holds(&fresh.uid) {
            // the save landed after a concurrent logout cleared the store
            self.store.clear().await?;
            return Err(SessionError::NotAuthenticated);
        }
        tracing::debug!("id token refreshed");
        Ok(fresh.id_token)
    }

    fn holds(&self, uid: &str) -> bool {
        self.state
            .read()
            .as_ref()
            .is_some_and(|s| s.identity.uid == uid)
    }

    /// Swaps in a refreshed identity if its user is still signed in.
    fn replace_identity(&self, fresh: &AuthenticatedIdentity) -> bool {
        let mut state = self.state.write();
        match state.as_mut() {
            Some(session) if session.identity.uid == fresh.uid => {
                session.identity = fresh.clone();
                true
            }
            _ => false,
        }
    }

    fn take_if_current(&self, uid: &str) -> bool {
        let mut state = self.state.write();
        if state.as_ref().is_some_and(|s| s.identity.uid == uid) {
            state.take();
            true
        } else {
            false
        }
    }

    /// Re-reads the profile from the ledger.
    pub async fn refresh_user(&self) -> Result<User, SessionError> {
        let token = self.bearer_token().await?;
        let user = self.ledger.current_user(&token).await?;
        if let Some(session) = self.state.write().as_mut() {
            session.user = user.clone();
        }
        Ok(user)
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), SessionError> {
        self.identity.reset_password(email.trim()).await?;
        Ok(())
    }

    /// Drops the in-memory session. Persisted credentials are left alone.
    pub fn shutdown(self) {
        let was_authenticated = self.state.write().take().is_some();
        tracing::debug!(was_authenticated, "session context shut down");
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Read-only handle on the session.
#[derive(Clone)]
pub struct SessionObserver {
    state: Arc<RwLock<Option<Session>>>,
}

impl SessionObserver {
    pub fn is_authenticated(&self) -> bool {
        self.state.read().is_some()
    }

    pub fn user(&self) -> Option<User> {
        self.state.read().as_ref().map(|s| s.user.clone())
    }

    pub fn is_admin(&self) -> bool {
        self.state
            .read()
            .as_ref()
            .is_some_and(|s| s.user.is_admin())
    }

    pub fn guard_context(&self) -> GuardContext {
        let state = self.state.read();
        GuardContext {
            has_token: state.is_some(),
            is_admin: state.as_ref().is_some_and(|s| s.user.is_admin()),
        }
    }
}
