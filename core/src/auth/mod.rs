//! # Auth — Identity, Session and Route Guard
//!
//! ```text
//! identity.rs  — IdentityProvider trait, tokens, AuthFailure mapping
//! firebase.rs  — Identity Toolkit REST implementation
//! store.rs     — CredentialStore (file, memory)
//! session.rs   — SessionContext and its read-only SessionObserver
//! guard.rs     — RouteGuard: per-navigation access decisions
//! ```

pub mod firebase;
pub mod guard;
pub mod identity;
pub mod session;
pub mod store;

pub use firebase::{FirebaseConfig, FirebaseIdentity};
pub use guard::{GuardContext, GuardDecision, RedirectReason, RouteClass, RouteGuard};
pub use identity::{
    AuthFailure, AuthenticatedIdentity, BearerToken, IdentityError, IdentityProvider, Locale,
    RefreshToken,
};
pub use session::{RestoreOutcome, Session, SessionContext, SessionError, SessionObserver};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, StoreError};
