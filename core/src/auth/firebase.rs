//! # Firebase Identity Adapter
//!
//! [`IdentityProvider`] over the Firebase Auth REST API.
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | sign in | `POST {identity}/accounts:signInWithPassword` |
//! | sign up | `POST {identity}/accounts:signUp`, then `accounts:update` |
//! | reset password | `POST {identity}/accounts:sendOobCode` |
//! | refresh | `POST {token}/token` (form-encoded) |
//!
//! Every call carries `?key=<web API key>`. Errors come back as
//! `{"error": {"message": "EMAIL_EXISTS"}}` and are mapped through
//! [`AuthFailure::from_code`].

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::config::{DEFAULT_REQUEST_TIMEOUT, IDENTITY_TOOLKIT_URL, SECURE_TOKEN_URL};
use crate::ledger::ConfigError;

use super::identity::{
    AuthFailure, AuthenticatedIdentity, BearerToken, IdentityError, IdentityProvider, RefreshToken,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Firebase project settings.
///
/// Custom `Debug` redacts the API key.
#[derive(Clone)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub identity_url: Url,
    pub token_url: Url,
    pub timeout: std::time::Duration,
}

impl fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("api_key", &"[REDACTED]")
            .field("identity_url", &self.identity_url)
            .field("token_url", &self.token_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FirebaseConfig {
    /// Production Firebase endpoints for a project's web API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_endpoints(api_key, IDENTITY_TOOLKIT_URL, SECURE_TOKEN_URL)
    }

    /// Custom endpoints, for the Auth emulator or tests.
    pub fn with_endpoints(
        api_key: impl Into<String>,
        identity_url: &str,
        token_url: &str,
    ) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::Missing("FLEXSAVE_FIREBASE_API_KEY".into()));
        }
        let parse = |name: &str, raw: &str| {
            Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(name.to_string(), e.to_string()))
        };
        Ok(Self {
            api_key,
            identity_url: parse("identity_url", identity_url)?,
            token_url: parse("token_url", token_url)?,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `FLEXSAVE_FIREBASE_API_KEY` (required)
    /// - `FLEXSAVE_FIREBASE_IDENTITY_URL` (default: Identity Toolkit v1)
    /// - `FLEXSAVE_FIREBASE_TOKEN_URL` (default: Secure Token v1)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("FLEXSAVE_FIREBASE_API_KEY")
            .map_err(|_| ConfigError::Missing("FLEXSAVE_FIREBASE_API_KEY".into()))?;
        let identity_url = std::env::var("FLEXSAVE_FIREBASE_IDENTITY_URL")
            .unwrap_or_else(|_| IDENTITY_TOOLKIT_URL.to_string());
        let token_url = std::env::var("FLEXSAVE_FIREBASE_TOKEN_URL")
            .unwrap_or_else(|_| SECURE_TOKEN_URL.to_string());
        Self::with_endpoints(api_key, &identity_url, &token_url)
    }
}

// ---------------------------------------------------------------------------
// Wire Types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobRequest<'a> {
    request_type: &'static str,
    email: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn parse_expiry(raw: Option<&str>) -> Result<Duration, IdentityError> {
    let raw = raw.ok_or_else(|| IdentityError::Malformed("missing expiresIn".into()))?;
    raw.parse::<i64>()
        .map(Duration::seconds)
        .map_err(|_| IdentityError::Malformed(format!("bad expiresIn '{raw}'")))
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Firebase Auth over REST.
#[derive(Debug, Clone)]
pub struct FirebaseIdentity {
    http: reqwest::Client,
    config: FirebaseConfig,
}

impl FirebaseIdentity {
    pub fn new(config: FirebaseConfig) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, base: &Url, path: &str) -> Result<Url, IdentityError> {
        let raw = format!("{}/{}", base.as_str().trim_end_matches('/'), path);
        let mut url = Url::parse(&raw).map_err(|e| IdentityError::Malformed(e.to_string()))?;
        url.query_pairs_mut().append_pair("key", &self.config.api_key);
        Ok(url)
    }

    async fn read<T: DeserializeOwned>(
        &self,
        op: &'static str,
        resp: reqwest::Response,
    ) -> Result<T, IdentityError> {
        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<T>()
                .await
                .map_err(|e| IdentityError::Malformed(format!("{op}: {e}")));
        }

        let body = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => {
                let failure = AuthFailure::from_code(&envelope.error.message);
                tracing::debug!(
                    op,
                    code = %envelope.error.message,
                    "identity provider rejected request"
                );
                Err(IdentityError::Rejected(failure))
            }
            Err(_) => Err(IdentityError::Malformed(format!(
                "{op} returned {status}: {}",
                body.trim()
            ))),
        }
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        op: &'static str,
        path: &str,
        body: &B,
    ) -> Result<T, IdentityError> {
        let url = self.endpoint(&self.config.identity_url, path)?;
        let resp = self.http.post(url).json(body).send().await?;
        self.read(op, resp).await
    }

    fn identity_from(
        account: AccountResponse,
        fallback_email: &str,
    ) -> Result<AuthenticatedIdentity, IdentityError> {
        let expires_in = parse_expiry(account.expires_in.as_deref())?;
        let id_token = account
            .id_token
            .ok_or_else(|| IdentityError::Malformed("missing idToken".into()))?;
        let refresh_token = account
            .refresh_token
            .ok_or_else(|| IdentityError::Malformed("missing refreshToken".into()))?;
        Ok(AuthenticatedIdentity {
            uid: account.local_id,
            email: account.email.unwrap_or_else(|| fallback_email.to_string()),
            display_name: account.display_name.filter(|n| !n.is_empty()),
            id_token: BearerToken::new(id_token),
            refresh_token: RefreshToken::new(refresh_token),
            expires_at: Utc::now() + expires_in,
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthenticatedIdentity, IdentityError> {
        let req = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let account: AccountResponse = self
            .post_json("signInWithPassword", "accounts:signInWithPassword", &req)
            .await?;
        let identity = Self::identity_from(account, email)?;
        tracing::info!(uid = %identity.uid, "signed in");
        Ok(identity)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthenticatedIdentity, IdentityError> {
        let req = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let account: AccountResponse = self.post_json("signUp", "accounts:signUp", &req).await?;
        let mut identity = Self::identity_from(account, email)?;

        let update = UpdateProfileRequest {
            id_token: identity.id_token.as_str(),
            display_name,
            return_secure_token: true,
        };
        let updated: AccountResponse = self.post_json("update", "accounts:update", &update).await?;
        identity.display_name = updated
            .display_name
            .or_else(|| Some(display_name.to_string()))
            .filter(|n| !n.is_empty());
        // accounts:update may rotate the tokens
        if let (Some(id), Some(refresh)) = (updated.id_token, updated.refresh_token) {
            identity.id_token = BearerToken::new(id);
            identity.refresh_token = RefreshToken::new(refresh);
            if let Ok(expires_in) = parse_expiry(updated.expires_in.as_deref()) {
                identity.expires_at = Utc::now() + expires_in;
            }
        }

        tracing::info!(uid = %identity.uid, "account created");
        Ok(identity)
    }

    async fn sign_out(&self, identity: &AuthenticatedIdentity) -> Result<(), IdentityError> {
        // Firebase keeps no server-side session for password sign-in;
        // dropping the tokens is all there is to do.
        tracing::debug!(uid = %identity.uid, "signed out");
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> Result<(), IdentityError> {
        let req = OobRequest {
            request_type: "PASSWORD_RESET",
            email,
        };
        let _: serde_json::Value = self
            .post_json("sendOobCode", "accounts:sendOobCode", &req)
            .await?;
        tracing::info!("password reset email requested");
        Ok(())
    }

    async fn refresh(
        &self,
        identity: &AuthenticatedIdentity,
    ) -> Result<AuthenticatedIdentity, IdentityError> {
        let url = self.endpoint(&self.config.token_url, "token")?;
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", identity.refresh_token.as_str())
            .finish();
        let resp = self
            .http
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(form)
            .send()
            .await?;
        let token: TokenResponse = self.read("token", resp).await?;

        if token.user_id != identity.uid {
            return Err(IdentityError::Malformed(format!(
                "refresh returned user {} for session of {}",
                token.user_id, identity.uid
            )));
        }

        let expires_in = parse_expiry(Some(&token.expires_in))?;
        tracing::debug!(uid = %identity.uid, "id token refreshed");
        Ok(AuthenticatedIdentity {
            id_token: BearerToken::new(token.id_token),
            refresh_token: RefreshToken::new(token.refresh_token),
            expires_at: Utc::now() + expires_in,
            ..identity.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_requires_api_key() {
        assert!(matches!(FirebaseConfig::new("  "), Err(ConfigError::Missing(_))));
        let cfg = FirebaseConfig::new("AIza-test").unwrap();
        assert_eq!(cfg.identity_url.as_str(), "https://identitytoolkit.googleapis.com/v1");
        assert!(!format!("{cfg:?}").contains("AIza-test"));
    }

    #[test]
    fn endpoint_carries_key() {
        let cfg = FirebaseConfig::with_endpoints(
            "k1",
            "http://127.0.0.1:9099/v1",
            "http://127.0.0.1:9099/st",
        )
        .unwrap();
        let firebase = FirebaseIdentity::new(cfg.clone()).unwrap();
        let url = firebase.endpoint(&cfg.identity_url, "accounts:signUp").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9099/v1/accounts:signUp?key=k1");
    }

    #[test]
    fn expiry_parsing() {
        assert_eq!(parse_expiry(Some("3600")).unwrap(), Duration::seconds(3600));
        assert!(parse_expiry(Some("soon")).is_err());
        assert!(parse_expiry(None).is_err());
    }
}
