//! Request and response bodies specific to the ledger wire format.
//!
//! Domain types ([`Vault`], [`Withdrawal`], [`User`](crate::user::User))
//! decode straight from responses. This module holds the envelopes around
//! them and the request bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;
use crate::user::UserId;
use crate::vault::{policy, Vault, VaultId};

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// `POST /auth/register` body.
#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("full_name", &self.full_name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: UserId,
}

// ---------------------------------------------------------------------------
// Vaults
// ---------------------------------------------------------------------------

/// A vault as the ledger returns it, with the values the ledger derived.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerVault {
    #[serde(flatten)]
    pub vault: Vault,
    #[serde(default)]
    pub flexibility_available: Money,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub progress_percentage: f64,
}

impl LedgerVault {
    /// Whether the ledger's lock state agrees with the local clock.
    ///
    /// A mismatch around midnight usually means the two clocks are in
    /// different timezones.
    pub fn lock_state_agrees(&self, now: DateTime<Utc>) -> bool {
        policy::is_locked(&self.vault, now) == self.is_locked
    }
}

impl From<LedgerVault> for Vault {
    fn from(v: LedgerVault) -> Self {
        v.vault
    }
}

/// `POST /vaults/{id}/deposit` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepositRequest {
    pub amount: Money,
}

// ---------------------------------------------------------------------------
// Withdrawals
// ---------------------------------------------------------------------------

/// Body of `POST /withdrawals/preview` and `POST /withdrawals/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawalRequest {
    pub vault_id: VaultId,
    pub amount: Money,
    pub is_early_withdrawal: bool,
}

/// The ledger's own withdrawal preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteWithdrawalPreview {
    pub amount: Money,
    pub fee: Money,
    /// Fee rate in percent (1.0 for 1%).
    pub fee_percentage: f64,
    pub net_amount: Money,
    pub flexibility_remaining: Money,
    pub can_withdraw: bool,
    #[serde(default)]
    pub message: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error body: `{"detail": "..."}`, or a list of validation errors on 422.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    /// Best-effort human text from the body, falling back to the raw body.
    pub(crate) fn detail_from(raw: &str) -> String {
        match serde_json::from_str::<ErrorBody>(raw) {
            Ok(ErrorBody {
                detail: serde_json::Value::String(s),
            }) => s,
            Ok(ErrorBody {
                detail: serde_json::Value::Array(items),
            }) => items
                .iter()
                .map(|item| {
                    item.get("msg")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| item.to_string())
                })
                .collect::<Vec<_>>()
                .join("; "),
            Ok(ErrorBody { detail }) => detail.to_string(),
            Err(_) => raw.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ledger_vault_keeps_derived_fields() {
        let json = serde_json::json!({
            "id": "v-1",
            "name": "Vacances",
            "current_amount": 1000.0,
            "target_amount": 3000.0,
            "unlock_date": "2027-01-01",
            "flexibility_percentage": 10.0,
            "flexibility_used": 50.0,
            "flexibility_available": 50.0,
            "is_locked": true,
            "is_active": true,
            "progress_percentage": 33.33,
            "created_at": "2026-01-01T00:00:00"
        });
        let lv: LedgerVault = serde_json::from_value(json).unwrap();
        assert_eq!(lv.flexibility_available, Money::from_cents(5_000));
        assert_eq!(lv.vault.flexibility_used, Money::from_cents(5_000));
        assert!(lv.lock_state_agrees(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()));
        assert!(!lv.lock_state_agrees(Utc.with_ymd_and_hms(2027, 6, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn register_request_redacts_password() {
        let req = RegisterRequest {
            email: "ana@example.com".into(),
            password: "hunter22".into(),
            full_name: "Ana".into(),
        };
        let debug = format!("{req:?}");
        assert!(!debug.contains("hunter22"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn withdrawal_request_wire_shape() {
        let req = WithdrawalRequest {
            vault_id: VaultId::from("v-1"),
            amount: Money::from_cents(4_000),
            is_early_withdrawal: true,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["vault_id"], "v-1");
        assert_eq!(value["amount"], 40.0);
        assert_eq!(value["is_early_withdrawal"], true);
    }

    #[test]
    fn error_detail_extraction() {
        assert_eq!(
            ErrorBody::detail_from(r#"{"detail":"Vault not found"}"#),
            "Vault not found"
        );
        assert_eq!(
            ErrorBody::detail_from(
                r#"{"detail":[{"loc":["body","amount"],"msg":"Input should be greater than 0"}]}"#
            ),
            "Input should be greater than 0"
        );
        assert_eq!(ErrorBody::detail_from("Bad Gateway\n"), "Bad Gateway");
    }
}
