//! # Withdrawals & Fee Rates
//!
//! Withdrawal records as stored by the ledger, the fee schedule, and the
//! preview produced by [`super::policy::preview_withdrawal`].
//!
//! Fees are basis points on the withdrawn amount, rounded half-up to the
//! cent. Only early withdrawals pay one: 1.00% on standard accounts, 0.50%
//! on premium accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{
    bps_display, BPS_DENOMINATOR, EARLY_WITHDRAWAL_FEE_BPS, PREMIUM_EARLY_WITHDRAWAL_FEE_BPS,
    UNLOCKED_WITHDRAWAL_FEE_BPS,
};
use crate::money::Money;
use crate::user::UserId;
use crate::wire;

use super::model::VaultId;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WithdrawalId(pub String);

impl fmt::Display for WithdrawalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Processing state of a withdrawal on the ledger side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl WithdrawalStatus {
    /// Whether the ledger will not move this withdrawal any further.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Completed | WithdrawalStatus::Failed | WithdrawalStatus::Cancelled
        )
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Failed => "failed",
            WithdrawalStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A recorded withdrawal. Immutable once the ledger returns it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub vault_id: VaultId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub amount: Money,
    pub fee: Money,
    pub net_amount: Money,
    pub is_early: bool,
    #[serde(default)]
    pub status: WithdrawalStatus,
    #[serde(with = "wire::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "wire::option_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Fee Rates
// ---------------------------------------------------------------------------

/// A fee rate in basis points, at most 100%.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeRate(u32);

impl FeeRate {
    pub const ZERO: FeeRate = FeeRate(UNLOCKED_WITHDRAWAL_FEE_BPS);

    /// Builds a rate, capping it at 10_000 bps.
    pub fn from_bps(bps: u32) -> Self {
        FeeRate(bps.min(BPS_DENOMINATOR as u32))
    }

    pub const fn bps(self) -> u32 {
        self.0
    }

    /// Fee charged on `amount`. Never more than the amount itself.
    pub fn fee_on(self, amount: Money) -> Money {
        amount.apply_bps(self.0).min(amount)
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bps_display(self.0))
    }
}

/// Early-withdrawal rates by account tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeSchedule {
    pub standard_early: FeeRate,
    pub premium_early: FeeRate,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            standard_early: FeeRate::from_bps(EARLY_WITHDRAWAL_FEE_BPS),
            premium_early: FeeRate::from_bps(PREMIUM_EARLY_WITHDRAWAL_FEE_BPS),
        }
    }
}

impl FeeSchedule {
    /// The early-withdrawal rate that applies to a user.
    pub fn early_rate_for(&self, is_premium: bool) -> FeeRate {
        if is_premium {
            self.premium_early
        } else {
            self.standard_early
        }
    }
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// An accepted withdrawal request with its fee worked out.
///
/// Only [`super::policy::preview_withdrawal`] builds one, which makes a
/// successful preview a prerequisite for [`super::policy::apply_withdrawal`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WithdrawalPreview {
    pub(super) vault_id: VaultId,
    pub(super) amount: Money,
    pub(super) fee: Money,
    pub(super) net_amount: Money,
    pub(super) is_early: bool,
    pub(super) fee_rate: FeeRate,
    pub(super) flexibility_remaining: Money,
}

impl WithdrawalPreview {
    pub fn vault_id(&self) -> &VaultId {
        &self.vault_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn fee(&self) -> Money {
        self.fee
    }

    /// What actually reaches the user: `amount - fee`.
    pub fn net_amount(&self) -> Money {
        self.net_amount
    }

    pub fn is_early(&self) -> bool {
        self.is_early
    }

    pub fn fee_rate(&self) -> FeeRate {
        self.fee_rate
    }

    /// Early allowance left once this withdrawal goes through.
    pub fn flexibility_remaining(&self) -> Money {
        self.flexibility_remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_by_tier() {
        let schedule = FeeSchedule::default();
        assert_eq!(schedule.early_rate_for(false).bps(), 100);
        assert_eq!(schedule.early_rate_for(true).bps(), 50);
        assert_eq!(schedule.early_rate_for(true).to_string(), "0.50%");
    }

    #[test]
    fn test_fee_never_exceeds_amount() {
        let absurd = FeeRate::from_bps(50_000);
        assert_eq!(absurd.bps(), 10_000);
        assert_eq!(absurd.fee_on(Money::from_cents(123)), Money::from_cents(123));
        assert_eq!(FeeRate::ZERO.fee_on(Money::from_cents(123)), Money::ZERO);
    }

    #[test]
    fn test_decodes_withdrawal_record() {
        let json = r#"{
            "id": "w-9",
            "vault_id": "v-1",
            "amount": 40.0,
            "fee": 0.4,
            "net_amount": 39.6,
            "is_early": true,
            "status": "completed",
            "created_at": "2026-03-01T09:15:00.500000"
        }"#;
        let w: Withdrawal = serde_json::from_str(json).unwrap();
        assert_eq!(w.fee, Money::from_cents(40));
        assert_eq!(w.net_amount, Money::from_cents(3_960));
        assert_eq!(w.status, WithdrawalStatus::Completed);
        assert!(w.status.is_final());
        assert!(w.completed_at.is_none());
        assert!(!WithdrawalStatus::Processing.is_final());
    }
}
