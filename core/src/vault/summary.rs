//! Display-ready vault snapshot.
//!
//! Every screen that shows a vault renders a [`VaultSummary`] instead of
//! recomputing progress, countdowns or allowances inline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::money::{Money, Percent};

use super::model::{Vault, VaultId};
use super::policy;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VaultSummary {
    pub id: VaultId,
    pub name: String,
    pub current_amount: Money,
    pub target_amount: Money,
    pub unlock_date: NaiveDate,
    /// Progress for progress bars, clamped to 0..=100.
    pub progress: u8,
    /// Unclamped progress; above 100 for overfunded vaults.
    pub raw_progress: u64,
    pub goal_reached: bool,
    pub is_locked: bool,
    pub is_active: bool,
    pub days_until_unlock: u64,
    pub flexibility_percentage: Percent,
    pub flexibility_ceiling: Money,
    pub flexibility_used: Money,
    pub flexibility_available: Money,
    /// Largest withdrawal accepted right now.
    pub max_withdrawal: Money,
    /// Largest early withdrawal that leaves the allowance within the
    /// lowered ceiling. Equal to `max_withdrawal` once unlocked.
    pub sustainable_early_withdrawal: Money,
}

impl VaultSummary {
    pub fn from_vault(vault: &Vault, now: DateTime<Utc>) -> Self {
        let raw_progress = policy::progress(vault);
        let is_locked = policy::is_locked(vault, now);
        Self {
            id: vault.id.clone(),
            name: vault.name.clone(),
            current_amount: vault.current_amount,
            target_amount: vault.target_amount,
            unlock_date: vault.unlock_date,
            progress: raw_progress.min(100) as u8,
            raw_progress,
            goal_reached: !vault.target_amount.is_zero()
                && vault.current_amount >= vault.target_amount,
            is_locked,
            is_active: vault.is_active,
            days_until_unlock: policy::days_until_unlock(vault, now),
            flexibility_percentage: vault.flexibility_percentage,
            flexibility_ceiling: policy::flexibility_ceiling(vault),
            flexibility_used: vault.flexibility_used,
            flexibility_available: policy::flexibility_available(vault).clamped(),
            // once unlocked there is nothing "early" to cap
            max_withdrawal: if is_locked {
                policy::flexibility_available(vault).clamped()
            } else {
                vault.current_amount
            },
            sustainable_early_withdrawal: if is_locked {
                policy::sustainable_early_withdrawal(vault)
            } else {
                vault.current_amount
            },
        }
    }
}

/// Combined progress over the active vaults, clamped to 0..=100.
pub fn portfolio_progress(vaults: &[Vault]) -> u8 {
    let (current, target) = vaults
        .iter()
        .filter(|v| v.is_active)
        .fold((0u128, 0u128), |(c, t), v| {
            (
                c + u128::from(v.current_amount.cents()),
                t + u128::from(v.target_amount.cents()),
            )
        });
    if target == 0 {
        return 0;
    }
    ((current * 200 + target) / (target * 2)).min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn vault(id: &str, current: u64, target: u64, unlock: NaiveDate) -> Vault {
        Vault {
            id: VaultId::from(id),
            owner: None,
            name: id.to_string(),
            target_amount: Money::from_cents(target),
            current_amount: Money::from_cents(current),
            unlock_date: unlock,
            flexibility_percentage: Percent::new(10).unwrap(),
            flexibility_used: Money::ZERO,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_overfunded_vault_is_clamped_for_display() {
        let unlock = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let summary = VaultSummary::from_vault(&vault("a", 45_000, 30_000, unlock), now());
        assert_eq!(summary.progress, 100);
        assert_eq!(summary.raw_progress, 150);
        assert!(summary.goal_reached);
        assert!(summary.is_locked);
        assert_eq!(summary.days_until_unlock, 16);
        assert_eq!(summary.flexibility_ceiling, Money::from_cents(4_500));
        assert_eq!(summary.flexibility_available, Money::from_cents(4_500));
        assert_eq!(summary.max_withdrawal, Money::from_cents(4_500));
        assert_eq!(summary.sustainable_early_withdrawal, Money::from_cents(4_090));
    }

    #[test]
    fn test_unlocked_vault_allows_full_withdrawal() {
        let unlock = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let summary = VaultSummary::from_vault(&vault("b", 1_000, 30_000, unlock), now());
        assert!(!summary.is_locked);
        assert_eq!(summary.days_until_unlock, 0);
        assert_eq!(summary.max_withdrawal, Money::from_cents(1_000));
        assert_eq!(summary.sustainable_early_withdrawal, Money::from_cents(1_000));
        assert!(!summary.goal_reached);
        assert_eq!(summary.progress, 3);
    }

    #[test]
    fn test_portfolio_progress_ignores_closed_vaults() {
        let unlock = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        let mut closed = vault("c", 0, 1_000_000, unlock);
        closed.is_active = false;
        let vaults = vec![
            vault("a", 10_000, 40_000, unlock),
            vault("b", 10_000, 40_000, unlock),
            closed,
        ];
        assert_eq!(portfolio_progress(&vaults), 25);
        assert_eq!(portfolio_progress(&[]), 0);
    }
}
