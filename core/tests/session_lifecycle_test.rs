//! Session lifecycle tests: restore, login, registration and logout.
//!
//! The identity provider is a scripted fake, the ledger a wiremock server
//! and credentials live in a temporary directory, so each test can check
//! what ends up on disk.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::Notify;
use wiremock::matchers::{bearer_token, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flexsave_core::auth::{
    AuthFailure, AuthenticatedIdentity, BearerToken, CredentialStore, FileCredentialStore,
    GuardDecision, IdentityError, IdentityProvider, RefreshToken, RestoreOutcome, RouteGuard,
    SessionContext, SessionError,
};
use flexsave_core::ledger::{LedgerClient, LedgerConfig};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum RefreshMode {
    Succeed,
    Reject,
    Unreachable,
}

/// Holds a refresh until the test releases it.
#[derive(Default)]
struct RefreshGate {
    entered: Notify,
    release: Notify,
}

/// Scripted identity provider. Any password other than "wrong" signs in.
struct FakeProvider {
    refresh_mode: RefreshMode,
    sign_in_ttl: Duration,
    gate: Option<Arc<RefreshGate>>,
    sign_outs: Mutex<u32>,
}

impl FakeProvider {
    fn new(refresh_mode: RefreshMode) -> Arc<Self> {
        Arc::new(Self {
            refresh_mode,
            sign_in_ttl: Duration::hours(1),
            gate: None,
            sign_outs: Mutex::new(0),
        })
    }

    /// Signs in with a token already inside the refresh margin and parks
    /// every refresh on the returned gate.
    fn gated() -> (Arc<Self>, Arc<RefreshGate>) {
        let gate = Arc::new(RefreshGate::default());
        let provider = Arc::new(Self {
            refresh_mode: RefreshMode::Succeed,
            sign_in_ttl: Duration::seconds(5),
            gate: Some(gate.clone()),
            sign_outs: Mutex::new(0),
        });
        (provider, gate)
    }
}

fn identity(uid: &str, id_token: &str, expires_in: Duration) -> AuthenticatedIdentity {
    AuthenticatedIdentity {
        uid: uid.into(),
        email: "ana@example.com".into(),
        display_name: None,
        id_token: BearerToken::new(id_token),
        refresh_token: RefreshToken::new(format!("refresh-{uid}")),
        expires_at: Utc::now() + expires_in,
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn sign_in(
        &self,
        _email: &str,
        password: &str,
    ) -> Result<AuthenticatedIdentity, IdentityError> {
        if password == "wrong" {
            return Err(AuthFailure::InvalidCredentials.into());
        }
        Ok(identity("uid-1", "id-1", self.sign_in_ttl))
    }

    async fn sign_up(
        &self,
        _email: &str,
        _password: &str,
        _display_name: &str,
    ) -> Result<AuthenticatedIdentity, IdentityError> {
        Ok(identity("uid-1", "id-1", Duration::hours(1)))
    }

    async fn sign_out(&self, _identity: &AuthenticatedIdentity) -> Result<(), IdentityError> {
        *self.sign_outs.lock() += 1;
        Ok(())
    }

    async fn reset_password(&self, _email: &str) -> Result<(), IdentityError> {
        Ok(())
    }

    async fn refresh(
        &self,
        current: &AuthenticatedIdentity,
    ) -> Result<AuthenticatedIdentity, IdentityError> {
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        match self.refresh_mode {
            RefreshMode::Succeed => Ok(AuthenticatedIdentity {
                id_token: BearerToken::new("id-refreshed"),
                expires_at: Utc::now() + Duration::hours(1),
                ..current.clone()
            }),
            RefreshMode::Reject => Err(AuthFailure::SessionExpired.into()),
            RefreshMode::Unreachable => Err(IdentityError::Malformed("connection reset".into())),
        }
    }
}

fn user_json(active: bool, role: &str) -> serde_json::Value {
    json!({
        "id": "u-1",
        "email": "ana@example.com",
        "full_name": "Ana Costa",
        "role": role,
        "discipline_score": 50.0,
        "is_premium": false,
        "is_active": active
    })
}

async fn mount_me(server: &MockServer, token: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(bearer_token(token))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

struct Fixture {
    server: MockServer,
    _dir: TempDir,
    store: Arc<FileCredentialStore>,
}

impl Fixture {
    async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(FileCredentialStore::new(dir.path().join("session.json")));
        Self {
            server: MockServer::start().await,
            _dir: dir,
            store,
        }
    }

    fn ledger(&self) -> LedgerClient {
        LedgerClient::new(LedgerConfig::new(&self.server.uri()).unwrap()).unwrap()
    }

    async fn context(&self, provider: Arc<FakeProvider>) -> SessionContext {
        SessionContext::restore(provider, self.ledger(), self.store.clone())
            .await
            .expect("restore")
    }

    async fn stored(&self) -> Option<AuthenticatedIdentity> {
        self.store.load().await.expect("load")
    }
}

// ---------------------------------------------------------------------------
// Login & Restore
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_persists_and_next_start_restores() {
    let fx = Fixture::new().await;
    mount_me(&fx.server, "id-1", user_json(true, "user")).await;

    let ctx = fx.context(FakeProvider::new(RefreshMode::Succeed)).await;
    assert_eq!(ctx.restore_outcome(), &RestoreOutcome::Anonymous);

    let observer = ctx.observer();
    let guard = RouteGuard::default();
    assert!(!guard.check("/dashboard", observer.guard_context()).is_allowed());

    let user = ctx.login("ana@example.com", "secret12").await.unwrap();
    assert_eq!(user.full_name, "Ana Costa");
    assert!(observer.is_authenticated());
    assert!(guard.check("/dashboard", observer.guard_context()).is_allowed());
    assert_eq!(fx.stored().await.map(|i| i.uid), Some("uid-1".to_string()));
    ctx.shutdown();

    // shutdown leaves the file, so a new process picks the session up
    let restarted = fx.context(FakeProvider::new(RefreshMode::Succeed)).await;
    assert_eq!(restarted.restore_outcome(), &RestoreOutcome::Restored);
    assert_eq!(restarted.current_user().map(|u| u.full_name), Some("Ana Costa".into()));
    assert_eq!(restarted.bearer_token().await.unwrap(), BearerToken::new("id-1"));
}

#[tokio::test]
async fn failed_login_leaves_session_anonymous() {
    let fx = Fixture::new().await;
    let ctx = fx.context(FakeProvider::new(RefreshMode::Succeed)).await;

    let err = ctx.login("ana@example.com", "wrong").await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Identity(IdentityError::Rejected(AuthFailure::InvalidCredentials))
    ));
    assert!(!ctx.observer().is_authenticated());
    assert!(fx.stored().await.is_none());
}

#[tokio::test]
async fn disabled_account_cannot_log_in() {
    let fx = Fixture::new().await;
    mount_me(&fx.server, "id-1", user_json(false, "user")).await;

    let provider = FakeProvider::new(RefreshMode::Succeed);
    let ctx = fx.context(provider.clone()).await;

    let err = ctx.login("ana@example.com", "secret12").await.unwrap_err();
    assert!(matches!(err, SessionError::AccountDisabled(_)));
    assert!(!ctx.observer().is_authenticated());
    assert!(fx.stored().await.is_none());
    assert_eq!(*provider.sign_outs.lock(), 1);
}

#[tokio::test]
async fn admin_guard_follows_ledger_role() {
    let fx = Fixture::new().await;
    mount_me(&fx.server, "id-1", user_json(true, "admin")).await;

    let ctx = fx.context(FakeProvider::new(RefreshMode::Succeed)).await;
    ctx.login("ana@example.com", "secret12").await.unwrap();

    let observer = ctx.observer();
    assert!(observer.is_admin());
    assert_eq!(
        RouteGuard::default().check("/admin/users", observer.guard_context()),
        GuardDecision::Allow
    );
}

// ---------------------------------------------------------------------------
// Restore Edge Cases
// ---------------------------------------------------------------------------

#[tokio::test]
async fn restore_refreshes_expired_token_and_persists_it() {
    let fx = Fixture::new().await;
    fx.store
        .save(&identity("uid-1", "id-stale", -Duration::minutes(10)))
        .await
        .unwrap();
    mount_me(&fx.server, "id-refreshed", user_json(true, "user")).await;

    let ctx = fx.context(FakeProvider::new(RefreshMode::Succeed)).await;
    assert_eq!(ctx.restore_outcome(), &RestoreOutcome::Restored);
    assert_eq!(
        fx.stored().await.map(|i| i.id_token),
        Some(BearerToken::new("id-refreshed"))
    );
}

#[tokio::test]
async fn restore_with_revoked_refresh_token_clears_store() {
    let fx = Fixture::new().await;
    fx.store
        .save(&identity("uid-1", "id-stale", -Duration::minutes(10)))
        .await
        .unwrap();

    let ctx = fx.context(FakeProvider::new(RefreshMode::Reject)).await;
    assert_eq!(ctx.restore_outcome(), &RestoreOutcome::Expired);
    assert!(!ctx.observer().is_authenticated());
    assert!(fx.stored().await.is_none());
}

#[tokio::test]
async fn restore_with_token_rejected_by_ledger_clears_store() {
    let fx = Fixture::new().await;
    fx.store
        .save(&identity("uid-1", "id-1", Duration::hours(1)))
        .await
        .unwrap();
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid token"})))
        .mount(&fx.server)
        .await;

    let ctx = fx.context(FakeProvider::new(RefreshMode::Succeed)).await;
    assert_eq!(ctx.restore_outcome(), &RestoreOutcome::Expired);
    assert!(fx.stored().await.is_none());
}

#[tokio::test]
async fn restore_while_offline_keeps_credentials() {
    let fx = Fixture::new().await;
    fx.store
        .save(&identity("uid-1", "id-1", Duration::hours(1)))
        .await
        .unwrap();
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&fx.server)
        .await;

    let ctx = fx.context(FakeProvider::new(RefreshMode::Succeed)).await;
    assert!(matches!(ctx.restore_outcome(), RestoreOutcome::Offline(_)));
    assert!(!ctx.observer().is_authenticated());
    assert!(fx.stored().await.is_some());
}

#[tokio::test]
async fn restore_with_unreachable_provider_keeps_credentials() {
    let fx = Fixture::new().await;
    fx.store
        .save(&identity("uid-1", "id-stale", -Duration::minutes(10)))
        .await
        .unwrap();

    let ctx = fx.context(FakeProvider::new(RefreshMode::Unreachable)).await;
    assert!(matches!(ctx.restore_outcome(), RestoreOutcome::Offline(_)));
    assert!(fx.stored().await.is_some());
}

#[tokio::test]
async fn restore_of_disabled_account_clears_store() {
    let fx = Fixture::new().await;
    fx.store
        .save(&identity("uid-1", "id-1", Duration::hours(1)))
        .await
        .unwrap();
    mount_me(&fx.server, "id-1", user_json(false, "user")).await;

    let ctx = fx.context(FakeProvider::new(RefreshMode::Succeed)).await;
    assert_eq!(ctx.restore_outcome(), &RestoreOutcome::Disabled);
    assert!(fx.stored().await.is_none());
}

#[tokio::test]
async fn corrupt_credentials_are_discarded() {
    let fx = Fixture::new().await;
    std::fs::write(fx.store.path(), b"{\"uid\": 42").unwrap();

    let ctx = fx.context(FakeProvider::new(RefreshMode::Succeed)).await;
    assert_eq!(ctx.restore_outcome(), &RestoreOutcome::Anonymous);
    assert!(!fx.store.path().exists());
}

// ---------------------------------------------------------------------------
// Registration & Logout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_creates_account_then_signs_in() {
    let fx = Fixture::new().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "message": "User registered successfully",
            "user_id": "u-1"
        })))
        .expect(1)
        .mount(&fx.server)
        .await;
    mount_me(&fx.server, "id-1", user_json(true, "user")).await;

    let ctx = fx.context(FakeProvider::new(RefreshMode::Succeed)).await;
    let user = ctx
        .register(" ana@example.com ", "secret12", "Ana Costa")
        .await
        .unwrap();
    assert_eq!(user.email, "ana@example.com");
    assert!(ctx.observer().is_authenticated());
    assert!(fx.stored().await.is_some());
}

#[tokio::test]
async fn logout_clears_memory_and_disk() {
    let fx = Fixture::new().await;
    mount_me(&fx.server, "id-1", user_json(true, "user")).await;

    let provider = FakeProvider::new(RefreshMode::Succeed);
    let ctx = fx.context(provider.clone()).await;
    ctx.login("ana@example.com", "secret12").await.unwrap();
    let observer = ctx.observer();

    ctx.logout().await.unwrap();
    assert!(!observer.is_authenticated());
    assert!(observer.user().is_none());
    assert!(fx.stored().await.is_none());
    assert_eq!(*provider.sign_outs.lock(), 1);
    assert!(matches!(
        ctx.bearer_token().await,
        Err(SessionError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn logout_during_token_refresh_keeps_store_empty() {
    let fx = Fixture::new().await;
    mount_me(&fx.server, "id-1", user_json(true, "user")).await;

    let (provider, gate) = FakeProvider::gated();
    let ctx = Arc::new(fx.context(provider).await);
    ctx.login("ana@example.com", "secret12").await.unwrap();
    assert!(fx.stored().await.is_some());

    let pending = tokio::spawn({
        let ctx = ctx.clone();
        async move { ctx.bearer_token().await }
    });
    gate.entered.notified().await;
    ctx.logout().await.unwrap();
    gate.release.notify_one();

    let result = pending.await.expect("join");
    assert!(matches!(result, Err(SessionError::NotAuthenticated)));
    assert!(!ctx.observer().is_authenticated());
    assert!(fx.stored().await.is_none());
}

#[tokio::test]
async fn expiring_token_is_refreshed_and_persisted() {
    let fx = Fixture::new().await;
    mount_me(&fx.server, "id-1", user_json(true, "user")).await;

    let (provider, gate) = FakeProvider::gated();
    let ctx = fx.context(provider).await;
    ctx.login("ana@example.com", "secret12").await.unwrap();

    // a stored permit lets the refresh through straight away
    gate.release.notify_one();
    assert_eq!(ctx.bearer_token().await.unwrap(), BearerToken::new("id-refreshed"));
    assert_eq!(
        fx.stored().await.map(|i| i.id_token),
        Some(BearerToken::new("id-refreshed"))
    );
}

#[tokio::test]
async fn token_inside_refresh_margin_is_refreshed_on_restore() {
    let fx = Fixture::new().await;
    fx.store
        .save(&identity("uid-1", "id-1", Duration::seconds(5)))
        .await
        .unwrap();
    mount_me(&fx.server, "id-refreshed", user_json(true, "user")).await;

    let ctx = fx.context(FakeProvider::new(RefreshMode::Succeed)).await;
    assert_eq!(ctx.restore_outcome(), &RestoreOutcome::Restored);
    assert_eq!(ctx.bearer_token().await.unwrap(), BearerToken::new("id-refreshed"));
}
