//! Typed client for the FlexSave ledger API.
//!
//! ## Paths
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/auth/register` | Register an account |
//! | GET    | `/users/me` | Current user |
//! | PATCH  | `/users/me` | Update own profile |
//! | GET    | `/users/me/stats` | Own savings statistics |
//! | GET    | `/vaults/?active_only=` | List vaults |
//! | POST   | `/vaults/` | Create vault |
//! | GET    | `/vaults/{id}` | Get vault |
//! | POST   | `/vaults/{id}/deposit` | Deposit |
//! | DELETE | `/vaults/{id}` | Close vault |
//! | POST   | `/withdrawals/preview` | Preview withdrawal |
//! | POST   | `/withdrawals/` | Create withdrawal |
//! | GET    | `/withdrawals/?vault_id=` | List withdrawals |
//! | GET    | `/withdrawals/{id}` | Get withdrawal |
//! | GET    | `/admin/stats` | Platform statistics |
//! | GET    | `/admin/users` | List users |
//! | GET    | `/admin/users/{id}` | Get user |
//! | PATCH  | `/admin/users/{id}` | Update user |
//! | GET    | `/admin/users/{id}/stats` | User statistics |
//! | POST   | `/admin/users/{id}/disable` | Disable user |
//! | POST   | `/admin/users/{id}/enable` | Enable user |
//!
//! Mutating calls carry a fresh `Idempotency-Key`. Nothing is retried here:
//! whether to try again is the caller's decision, see
//! [`LedgerError::is_retryable`].

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;
use uuid::Uuid;

use crate::auth::identity::BearerToken;
use crate::config::IDEMPOTENCY_KEY_HEADER;
use crate::money::Money;
use crate::user::{
    AdminUserUpdate, GlobalStats, ProfileUpdate, User, UserDetailStats, UserFilter, UserId,
    UserStats,
};
use crate::vault::{VaultDraft, VaultId, Withdrawal, WithdrawalId};

use super::config::{ConfigError, LedgerConfig};
use super::dto::{
    DepositRequest, ErrorBody, LedgerVault, RegisterRequest, RegisterResponse,
    RemoteWithdrawalPreview, WithdrawalRequest,
};
use super::error::LedgerError;

/// Client for the ledger API.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    http: reqwest::Client,
    config: LedgerConfig,
}

impl LedgerClient {
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("flexsave/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LedgerError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self { http, config })
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    // -- plumbing ------------------------------------------------------------

    fn url_with_query(&self, path: &str, query: &[(&str, String)]) -> Result<Url, LedgerError> {
        let raw = self.config.endpoint_url(path);
        let mut url =
            Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(raw.clone(), e.to_string()))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        token: Option<&BearerToken>,
    ) -> Result<RequestBuilder, LedgerError> {
        let mutating = method != Method::GET;
        let url = self.url_with_query(path, query)?;
        let mut req = self.http.request(method, url);
        if let Some(token) = token {
            req = req.bearer_auth(token.as_str());
        }
        if mutating {
            req = req.header(IDEMPOTENCY_KEY_HEADER, Uuid::new_v4().to_string());
        }
        Ok(req)
    }

    /// Sends and turns non-2xx statuses into errors.
    async fn execute(&self, endpoint: &str, req: RequestBuilder) -> Result<Response, LedgerError> {
        tracing::debug!(endpoint, "ledger request");
        let resp = req.send().await.map_err(|e| {
            tracing::warn!(endpoint, error = %e, "ledger unreachable");
            LedgerError::Http {
                endpoint: endpoint.to_string(),
                source: e,
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        match status {
            StatusCode::UNAUTHORIZED => Err(LedgerError::Unauthorized {
                endpoint: endpoint.to_string(),
            }),
            StatusCode::NOT_FOUND => Err(LedgerError::NotFound {
                endpoint: endpoint.to_string(),
            }),
            _ => {
                let body = resp
                    .text()
                    .await
                    .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));
                let detail = ErrorBody::detail_from(&body);
                tracing::warn!(
                    endpoint,
                    status = status.as_u16(),
                    %detail,
                    "ledger rejected request"
                );
                Err(LedgerError::Api {
                    endpoint: endpoint.to_string(),
                    status: status.as_u16(),
                    detail,
                })
            }
        }
    }

    async fn decode<T: DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T, LedgerError> {
        resp.json().await.map_err(|e| LedgerError::Deserialization {
            endpoint: endpoint.to_string(),
            source: e,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        path: &str,
        query: &[(&str, String)],
        token: &BearerToken,
    ) -> Result<T, LedgerError> {
        let req = self.request(Method::GET, path, query, Some(token))?;
        let resp = self.execute(endpoint, req).await?;
        Self::decode(endpoint, resp).await
    }

    async fn send_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        path: &str,
        body: &B,
        token: Option<&BearerToken>,
    ) -> Result<T, LedgerError> {
        let req = self.request(method, path, &[], token)?.json(body);
        let resp = self.execute(endpoint, req).await?;
        Self::decode(endpoint, resp).await
    }

    /// For endpoints answering 204 No Content.
    async fn send_empty(
        &self,
        method: Method,
        endpoint: &str,
        path: &str,
        token: &BearerToken,
    ) -> Result<(), LedgerError> {
        let req = self.request(method, path, &[], Some(token))?;
        self.execute(endpoint, req).await?;
        Ok(())
    }

    fn none_if_missing<T>(result: Result<T, LedgerError>) -> Result<Option<T>, LedgerError> {
        match result {
            Ok(v) => Ok(Some(v)),
            Err(LedgerError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // -- auth & profile -----------------------------------------------------

    /// Creates the ledger account and its identity-provider user. The caller
    /// signs in afterwards.
    pub async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse, LedgerError> {
        self.send_json(Method::POST, "POST /auth/register", "/auth/register", req, None)
            .await
    }

    pub async fn current_user(&self, token: &BearerToken) -> Result<User, LedgerError> {
        self.get_json("GET /users/me", "/users/me", &[], token).await
    }

    pub async fn update_profile(
        &self,
        token: &BearerToken,
        update: &ProfileUpdate,
    ) -> Result<User, LedgerError> {
        self.send_json(Method::PATCH, "PATCH /users/me", "/users/me", update, Some(token))
            .await
    }

    pub async fn user_stats(&self, token: &BearerToken) -> Result<UserStats, LedgerError> {
        self.get_json("GET /users/me/stats", "/users/me/stats", &[], token)
            .await
    }

    // -- vaults -------------------------------------------------------------

    pub async fn list_vaults(
        &self,
        token: &BearerToken,
        active_only: bool,
    ) -> Result<Vec<LedgerVault>, LedgerError> {
        self.get_json(
            "GET /vaults/",
            "/vaults/",
            &[("active_only", active_only.to_string())],
            token,
        )
        .await
    }

    pub async fn create_vault(
        &self,
        token: &BearerToken,
        draft: &VaultDraft,
    ) -> Result<LedgerVault, LedgerError> {
        self.send_json(Method::POST, "POST /vaults/", "/vaults/", draft, Some(token))
            .await
    }

    /// `Ok(None)` when the vault does not exist.
    pub async fn get_vault(
        &self,
        token: &BearerToken,
        id: &VaultId,
    ) -> Result<Option<LedgerVault>, LedgerError> {
        let endpoint = format!("GET /vaults/{id}");
        Self::none_if_missing(
            self.get_json(&endpoint, &format!("/vaults/{id}"), &[], token)
                .await,
        )
    }

    pub async fn deposit(
        &self,
        token: &BearerToken,
        id: &VaultId,
        amount: Money,
    ) -> Result<LedgerVault, LedgerError> {
        let endpoint = format!("POST /vaults/{id}/deposit");
        self.send_json(
            Method::POST,
            &endpoint,
            &format!("/vaults/{id}/deposit"),
            &DepositRequest { amount },
            Some(token),
        )
        .await
    }

    pub async fn close_vault(&self, token: &BearerToken, id: &VaultId) -> Result<(), LedgerError> {
        let endpoint = format!("DELETE /vaults/{id}");
        self.send_empty(Method::DELETE, &endpoint, &format!("/vaults/{id}"), token)
            .await
    }

    // -- withdrawals --------------------------------------------------------

    pub async fn preview_withdrawal(
        &self,
        token: &BearerToken,
        req: &WithdrawalRequest,
    ) -> Result<RemoteWithdrawalPreview, LedgerError> {
        self.send_json(
            Method::POST,
            "POST /withdrawals/preview",
            "/withdrawals/preview",
            req,
            Some(token),
        )
        .await
    }

    pub async fn create_withdrawal(
        &self,
        token: &BearerToken,
        req: &WithdrawalRequest,
    ) -> Result<Withdrawal, LedgerError> {
        self.send_json(Method::POST, "POST /withdrawals/", "/withdrawals/", req, Some(token))
            .await
    }

    pub async fn list_withdrawals(
        &self,
        token: &BearerToken,
        vault_id: Option<&VaultId>,
    ) -> Result<Vec<Withdrawal>, LedgerError> {
        let query: Vec<(&str, String)> = vault_id
            .map(|id| vec![("vault_id", id.to_string())])
            .unwrap_or_default();
        self.get_json("GET /withdrawals/", "/withdrawals/", &query, token)
            .await
    }

    pub async fn get_withdrawal(
        &self,
        token: &BearerToken,
        id: &WithdrawalId,
    ) -> Result<Option<Withdrawal>, LedgerError> {
        let endpoint = format!("GET /withdrawals/{id}");
        Self::none_if_missing(
            self.get_json(&endpoint, &format!("/withdrawals/{id}"), &[], token)
                .await,
        )
    }

    // -- admin --------------------------------------------------------------

    pub async fn global_stats(&self, token: &BearerToken) -> Result<GlobalStats, LedgerError> {
        self.get_json("GET /admin/stats", "/admin/stats", &[], token)
            .await
    }

    /// Rejects page sizes outside 1..=100 before sending.
    pub async fn list_users(
        &self,
        token: &BearerToken,
        filter: &UserFilter,
    ) -> Result<Vec<User>, LedgerError> {
        filter.validate().map_err(|e| LedgerError::Api {
            endpoint: "GET /admin/users".into(),
            status: 422,
            detail: e.to_string(),
        })?;
        self.get_json("GET /admin/users", "/admin/users", &filter.query_pairs(), token)
            .await
    }

    pub async fn get_user(
        &self,
        token: &BearerToken,
        id: &UserId,
    ) -> Result<Option<User>, LedgerError> {
        let endpoint = format!("GET /admin/users/{id}");
        Self::none_if_missing(
            self.get_json(&endpoint, &format!("/admin/users/{id}"), &[], token)
                .await,
        )
    }

    pub async fn update_user(
        &self,
        token: &BearerToken,
        id: &UserId,
        update: &AdminUserUpdate,
    ) -> Result<User, LedgerError> {
        let endpoint = format!("PATCH /admin/users/{id}");
        self.send_json(
            Method::PATCH,
            &endpoint,
            &format!("/admin/users/{id}"),
            update,
            Some(token),
        )
        .await
    }

    pub async fn user_detail_stats(
        &self,
        token: &BearerToken,
        id: &UserId,
    ) -> Result<UserDetailStats, LedgerError> {
        let endpoint = format!("GET /admin/users/{id}/stats");
        self.get_json(&endpoint, &format!("/admin/users/{id}/stats"), &[], token)
            .await
    }

    pub async fn disable_user(&self, token: &BearerToken, id: &UserId) -> Result<(), LedgerError> {
        let endpoint = format!("POST /admin/users/{id}/disable");
        self.send_empty(
            Method::POST,
            &endpoint,
            &format!("/admin/users/{id}/disable"),
            token,
        )
        .await
    }

    pub async fn enable_user(&self, token: &BearerToken, id: &UserId) -> Result<(), LedgerError> {
        let endpoint = format!("POST /admin/users/{id}/enable");
        self.send_empty(
            Method::POST,
            &endpoint,
            &format!("/admin/users/{id}/enable"),
            token,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_encoded() {
        let config = LedgerConfig::new("http://127.0.0.1:9000/api/v1").unwrap();
        let client = LedgerClient::new(config).unwrap();
        let url = client
            .url_with_query("/withdrawals/", &[("vault_id", "a b&c".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9000/api/v1/withdrawals/?vault_id=a+b%26c"
        );
        let bare = client.url_with_query("/vaults/", &[]).unwrap();
        assert_eq!(bare.query(), None);
    }
}
