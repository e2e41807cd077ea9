//! # Identity Provider
//!
//! FlexSave does not store passwords. Sign-in, sign-up and password reset
//! go to a managed identity provider, which hands back a short-lived ID
//! token (sent to the ledger as a bearer token) and a refresh token.
//!
//! Provider error codes are folded into [`AuthFailure`], a closed set of
//! outcomes a login form knows how to explain. Both code styles are
//! understood: SDK codes (`auth/wrong-password`) and REST codes
//! (`INVALID_PASSWORD`, `WEAK_PASSWORD : Password should be ...`).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::MIN_PASSWORD_LENGTH;

// ---------------------------------------------------------------------------
// Locale
// ---------------------------------------------------------------------------

/// Language of user-facing messages. The product ships in French.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Locale {
    #[default]
    Fr,
    En,
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fr" | "fr-fr" => Ok(Locale::Fr),
            "en" | "en-us" | "en-gb" => Ok(Locale::En),
            other => Err(format!("unsupported locale '{other}' (expected fr or en)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Mapping
// ---------------------------------------------------------------------------

/// Why the identity provider refused a request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AuthFailure {
    InvalidCredentials,
    EmailInUse,
    WeakPassword,
    TooManyAttempts,
    AccountDisabled,
    UserNotFound,
    InvalidEmail,
    OperationNotAllowed,
    /// The stored session can no longer be refreshed.
    SessionExpired,
    /// Any code not listed above, kept verbatim for logs.
    Unknown(String),
}

impl AuthFailure {
    /// Maps a provider error code to a failure.
    pub fn from_code(code: &str) -> Self {
        // "WEAK_PASSWORD : Password should be at least 6 characters"
        let head = code.split(" : ").next().unwrap_or(code).trim();
        let normalized = head
            .strip_prefix("auth/")
            .unwrap_or(head)
            .to_ascii_lowercase()
            .replace('_', "-");

        match normalized.as_str() {
            "wrong-password" | "invalid-password" | "invalid-credential"
            | "invalid-login-credentials" => AuthFailure::InvalidCredentials,
            "email-already-in-use" | "email-exists" => AuthFailure::EmailInUse,
            "weak-password" => AuthFailure::WeakPassword,
            "too-many-requests" | "too-many-attempts-try-later" => AuthFailure::TooManyAttempts,
            "user-disabled" => AuthFailure::AccountDisabled,
            "user-not-found" | "email-not-found" => AuthFailure::UserNotFound,
            "invalid-email" | "missing-email" => AuthFailure::InvalidEmail,
            "operation-not-allowed" | "password-login-disabled" => {
                AuthFailure::OperationNotAllowed
            }
            "token-expired" | "invalid-refresh-token" | "invalid-id-token"
            | "user-token-expired" => AuthFailure::SessionExpired,
            _ => AuthFailure::Unknown(code.to_string()),
        }
    }

    /// The message shown on the form.
    pub fn message(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::Fr => match self {
                AuthFailure::InvalidCredentials => "Email ou mot de passe incorrect",
                AuthFailure::EmailInUse => "Cet email est déjà utilisé",
                AuthFailure::WeakPassword => "Le mot de passe doit contenir au moins 6 caractères",
                AuthFailure::TooManyAttempts => "Trop de tentatives, réessayez plus tard",
                AuthFailure::AccountDisabled => "Ce compte a été désactivé",
                AuthFailure::UserNotFound => "Aucun compte trouvé avec cet email",
                AuthFailure::InvalidEmail => "Email invalide",
                AuthFailure::OperationNotAllowed => "Opération non autorisée",
                AuthFailure::SessionExpired => "Votre session a expiré, veuillez vous reconnecter",
                AuthFailure::Unknown(_) => "Une erreur est survenue",
            },
            Locale::En => match self {
                AuthFailure::InvalidCredentials => "Incorrect email or password",
                AuthFailure::EmailInUse => "This email is already in use",
                AuthFailure::WeakPassword => "Password must be at least 6 characters long",
                AuthFailure::TooManyAttempts => "Too many attempts, please try again later",
                AuthFailure::AccountDisabled => "This account has been disabled",
                AuthFailure::UserNotFound => "No account found with this email",
                AuthFailure::InvalidEmail => "Invalid email",
                AuthFailure::OperationNotAllowed => "Operation not allowed",
                AuthFailure::SessionExpired => "Your session has expired, please sign in again",
                AuthFailure::Unknown(_) => "Something went wrong",
            },
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthFailure::Unknown(code) => write!(f, "identity provider error ({code})"),
            other => f.write_str(other.message(Locale::En)),
        }
    }
}

/// Checks sign-up input locally, before a provider round trip.
pub fn check_sign_up_input(email: &str, password: &str) -> Result<(), AuthFailure> {
    let email = email.trim();
    let valid_email = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };
    if !valid_email {
        return Err(AuthFailure::InvalidEmail);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthFailure::WeakPassword);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider answered and said no.
    #[error("{0}")]
    Rejected(AuthFailure),

    /// The provider could not be reached.
    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with something unexpected.
    #[error("unexpected identity provider response: {0}")]
    Malformed(String),
}

impl IdentityError {
    pub fn user_message(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (IdentityError::Rejected(failure), _) => failure.message(locale),
            (IdentityError::Transport(_), Locale::Fr) => {
                "Service d'authentification injoignable, réessayez plus tard"
            }
            (IdentityError::Transport(_), Locale::En) => {
                "Authentication service unreachable, please try again later"
            }
            (IdentityError::Malformed(_), _) => AuthFailure::Unknown(String::new()).message(locale),
        }
    }

    pub fn failure(&self) -> Option<&AuthFailure> {
        match self {
            IdentityError::Rejected(f) => Some(f),
            _ => None,
        }
    }
}

impl From<AuthFailure> for IdentityError {
    fn from(f: AuthFailure) -> Self {
        IdentityError::Rejected(f)
    }
}

// ---------------------------------------------------------------------------
// Tokens & Identity
// ---------------------------------------------------------------------------

/// A provider ID token, sent to the ledger as `Authorization: Bearer`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        BearerToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

/// Long-lived token used to mint new ID tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(String);

impl RefreshToken {
    pub fn new(token: impl Into<String>) -> Self {
        RefreshToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshToken([REDACTED])")
    }
}

/// A signed-in provider account. This is what the credential store persists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    /// Provider user id.
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub id_token: BearerToken,
    pub refresh_token: RefreshToken,
    pub expires_at: DateTime<Utc>,
}

impl AuthenticatedIdentity {
    /// Whether the ID token is expired, or will be within `margin`.
    pub fn is_expired(&self, now: DateTime<Utc>, margin: std::time::Duration) -> bool {
        let margin = Duration::from_std(margin).unwrap_or_else(|_| Duration::zero());
        now + margin >= self.expires_at
    }
}

// ---------------------------------------------------------------------------
// Provider Trait
// ---------------------------------------------------------------------------

/// A managed identity service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str)
        -> Result<AuthenticatedIdentity, IdentityError>;

    /// Creates an account and sets its display name.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthenticatedIdentity, IdentityError>;

    /// Ends the provider-side session, if the provider keeps one.
    async fn sign_out(&self, identity: &AuthenticatedIdentity) -> Result<(), IdentityError>;

    /// Sends a password-reset email.
    async fn reset_password(&self, email: &str) -> Result<(), IdentityError>;

    /// Trades the refresh token for a fresh ID token.
    async fn refresh(
        &self,
        identity: &AuthenticatedIdentity,
    ) -> Result<AuthenticatedIdentity, IdentityError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sdk_and_rest_codes_agree() {
        let pairs = [
            ("auth/wrong-password", "INVALID_PASSWORD"),
            ("auth/invalid-credential", "INVALID_LOGIN_CREDENTIALS"),
            ("auth/email-already-in-use", "EMAIL_EXISTS"),
            ("auth/weak-password", "WEAK_PASSWORD : Password should be at least 6 characters"),
            ("auth/too-many-requests", "TOO_MANY_ATTEMPTS_TRY_LATER"),
            ("auth/user-disabled", "USER_DISABLED"),
            ("auth/user-not-found", "EMAIL_NOT_FOUND"),
            ("auth/invalid-email", "INVALID_EMAIL"),
            ("auth/operation-not-allowed", "OPERATION_NOT_ALLOWED"),
        ];
        for (sdk, rest) in pairs {
            assert_eq!(
                AuthFailure::from_code(sdk),
                AuthFailure::from_code(rest),
                "{sdk} vs {rest}"
            );
            assert!(!matches!(AuthFailure::from_code(sdk), AuthFailure::Unknown(_)), "{sdk}");
        }
    }

    #[test]
    fn test_unknown_code_kept_verbatim() {
        let failure = AuthFailure::from_code("auth/quota-exceeded");
        assert_eq!(failure, AuthFailure::Unknown("auth/quota-exceeded".into()));
        assert_eq!(failure.message(Locale::Fr), "Une erreur est survenue");
        assert!(failure.to_string().contains("quota-exceeded"));
    }

    #[test]
    fn test_messages_by_locale() {
        assert_eq!(
            AuthFailure::EmailInUse.message(Locale::Fr),
            "Cet email est déjà utilisé"
        );
        assert_eq!(
            AuthFailure::EmailInUse.message(Locale::En),
            "This email is already in use"
        );
        assert_eq!(
            IdentityError::Rejected(AuthFailure::TooManyAttempts).user_message(Locale::Fr),
            "Trop de tentatives, réessayez plus tard"
        );
        assert_eq!("EN".parse::<Locale>().unwrap(), Locale::En);
        assert_eq!(Locale::default(), Locale::Fr);
    }

    #[test]
    fn test_sign_up_input_checks() {
        assert!(check_sign_up_input("ana@example.com", "secret1").is_ok());
        assert_eq!(check_sign_up_input("ana", "secret1"), Err(AuthFailure::InvalidEmail));
        assert_eq!(check_sign_up_input("@example.com", "secret1"), Err(AuthFailure::InvalidEmail));
        assert_eq!(check_sign_up_input("ana@example.com", "12345"), Err(AuthFailure::WeakPassword));
    }

    #[test]
    fn test_tokens_are_redacted() {
        let identity = AuthenticatedIdentity {
            uid: "uid-1".into(),
            email: "ana@example.com".into(),
            display_name: None,
            id_token: BearerToken::new("eyJhbGciOi.secret"),
            refresh_token: RefreshToken::new("refresh-secret"),
            expires_at: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        };
        let debug = format!("{identity:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("uid-1"));
    }

    #[test]
    fn test_expiry_margin() {
        let expires_at = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let identity = AuthenticatedIdentity {
            uid: "u".into(),
            email: "e@x.io".into(),
            display_name: None,
            id_token: BearerToken::new("t"),
            refresh_token: RefreshToken::new("r"),
            expires_at,
        };
        let margin = std::time::Duration::from_secs(60);
        assert!(!identity.is_expired(expires_at - Duration::minutes(5), margin));
        assert!(identity.is_expired(expires_at - Duration::seconds(30), margin));
        assert!(identity.is_expired(expires_at, std::time::Duration::ZERO));
    }
}
