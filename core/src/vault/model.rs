//! # Vault Model
//!
//! A [`Vault`] is a savings goal with a lock date. Until `unlock_date` the
//! money stays put, except for a small allowance (`flexibility_percentage`
//! of the current balance) that can be withdrawn early against a fee.
//!
//! The struct mirrors the ledger's JSON. Derived values the ledger also
//! sends (`is_locked`, `progress_percentage`, `flexibility_available`) are
//! deliberately not fields here: they depend on the clock and are recomputed
//! by [`super::policy`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::DEFAULT_FLEXIBILITY_PERCENTAGE;
use crate::money::{Money, Percent};
use crate::user::UserId;
use crate::wire;

/// Ledger-assigned vault identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultId(pub String);

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VaultId {
    fn from(s: &str) -> Self {
        VaultId(s.to_string())
    }
}

fn default_true() -> bool {
    true
}

/// A savings vault snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vault {
    pub id: VaultId,

    /// Owning user. The ledger omits it on user-scoped endpoints.
    #[serde(rename = "user_id", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserId>,

    pub name: String,

    /// Savings goal. Positive for every vault the ledger accepted.
    pub target_amount: Money,

    /// Current balance. May exceed the target.
    pub current_amount: Money,

    /// First day on which the vault is unlocked.
    pub unlock_date: NaiveDate,

    /// Share of `current_amount` withdrawable before the unlock date.
    pub flexibility_percentage: Percent,

    /// Cumulative amount already withdrawn early.
    #[serde(default)]
    pub flexibility_used: Money,

    /// False once closed.
    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default, with = "wire::option_timestamp")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, with = "wire::option_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Parameters for a new vault, as sent to `POST /vaults/`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VaultDraft {
    pub name: String,
    pub target_amount: Money,
    pub unlock_date: NaiveDate,
    pub flexibility_percentage: Percent,
}

impl VaultDraft {
    /// A draft with the default flexibility allowance.
    pub fn new(name: impl Into<String>, target_amount: Money, unlock_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            target_amount,
            unlock_date,
            flexibility_percentage: Percent::new(DEFAULT_FLEXIBILITY_PERCENTAGE)
                .unwrap_or(Percent::ZERO),
        }
    }

    pub fn with_flexibility(mut self, pct: Percent) -> Self {
        self.flexibility_percentage = pct;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_ledger_vault_response() {
        let json = r#"{
            "id": "v-1",
            "name": "Vacances",
            "current_amount": 1500.0,
            "target_amount": 3000.0,
            "unlock_date": "2027-07-01",
            "flexibility_percentage": 10.0,
            "flexibility_used": 25.5,
            "flexibility_available": 124.5,
            "is_locked": true,
            "is_active": true,
            "progress_percentage": 50.0,
            "created_at": "2026-01-10T08:00:00.000000"
        }"#;
        let vault: Vault = serde_json::from_str(json).unwrap();
        assert_eq!(vault.id, VaultId::from("v-1"));
        assert_eq!(vault.current_amount, Money::from_cents(150_000));
        assert_eq!(vault.flexibility_used, Money::from_cents(2_550));
        assert_eq!(vault.flexibility_percentage.value(), 10);
        assert_eq!(vault.unlock_date, NaiveDate::from_ymd_opt(2027, 7, 1).unwrap());
        assert!(vault.owner.is_none());
        assert!(vault.created_at.is_some());
    }

    #[test]
    fn test_draft_defaults_and_encoding() {
        let draft = VaultDraft::new(
            "Car",
            Money::from_cents(500_000),
            NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
        );
        assert_eq!(draft.flexibility_percentage.value(), 10);

        let draft = draft.with_flexibility(Percent::new(5).unwrap());
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["target_amount"], 5000.0);
        assert_eq!(value["unlock_date"], "2027-01-01");
        assert_eq!(value["flexibility_percentage"], 5);
    }
}
