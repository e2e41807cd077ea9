//! Withdrawal history: ordering, filtering and totals.
//!
//! The ledger returns withdrawals in storage order. The history view wants
//! them newest first, optionally restricted to early or regular ones, with
//! the sums shown underneath.

use serde::Serialize;
use std::str::FromStr;

use crate::money::Money;

use super::model::VaultId;
use super::withdrawal::Withdrawal;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HistoryFilter {
    #[default]
    All,
    /// Withdrawals made before the unlock date.
    Early,
    /// Withdrawals made after the unlock date.
    Standard,
}

impl HistoryFilter {
    fn matches(self, w: &Withdrawal) -> bool {
        match self {
            HistoryFilter::All => true,
            HistoryFilter::Early => w.is_early,
            HistoryFilter::Standard => !w.is_early,
        }
    }
}

impl FromStr for HistoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(HistoryFilter::All),
            "early" => Ok(HistoryFilter::Early),
            "standard" => Ok(HistoryFilter::Standard),
            other => Err(format!(
                "unknown history filter '{other}' (expected all, early or standard)"
            )),
        }
    }
}

/// Sums over a set of withdrawals.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HistoryTotals {
    pub count: usize,
    pub early_count: usize,
    pub amount: Money,
    pub fees: Money,
    pub net: Money,
}

/// Withdrawals sorted newest first.
#[derive(Clone, Debug, Default)]
pub struct WithdrawalHistory {
    entries: Vec<Withdrawal>,
}

impl WithdrawalHistory {
    pub fn new(mut entries: Vec<Withdrawal>) -> Self {
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self, filter: HistoryFilter) -> impl Iterator<Item = &Withdrawal> {
        self.entries.iter().filter(move |w| filter.matches(w))
    }

    /// Entries belonging to one vault.
    pub fn for_vault<'a>(&'a self, vault_id: &'a VaultId) -> impl Iterator<Item = &'a Withdrawal> {
        self.entries.iter().filter(move |w| &w.vault_id == vault_id)
    }

    pub fn totals(&self, filter: HistoryFilter) -> HistoryTotals {
        self.iter(filter).fold(HistoryTotals::default(), |mut t, w| {
            t.count += 1;
            if w.is_early {
                t.early_count += 1;
            }
            t.amount = t.amount.saturating_add(w.amount);
            t.fees = t.fees.saturating_add(w.fee);
            t.net = t.net.saturating_add(w.net_amount);
            t
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::withdrawal::{WithdrawalId, WithdrawalStatus};
    use chrono::{TimeZone, Utc};

    fn withdrawal(id: &str, vault: &str, day: u32, cents: u64, early: bool) -> Withdrawal {
        let fee = if early { cents / 100 } else { 0 };
        Withdrawal {
            id: WithdrawalId(id.to_string()),
            vault_id: VaultId::from(vault),
            user_id: None,
            amount: Money::from_cents(cents),
            fee: Money::from_cents(fee),
            net_amount: Money::from_cents(cents - fee),
            is_early: early,
            status: WithdrawalStatus::Completed,
            created_at: Utc.with_ymd_and_hms(2026, 3, day, 10, 0, 0).unwrap(),
            completed_at: None,
        }
    }

    fn sample() -> WithdrawalHistory {
        WithdrawalHistory::new(vec![
            withdrawal("w1", "v1", 1, 4_000, true),
            withdrawal("w3", "v2", 20, 10_000, false),
            withdrawal("w2", "v1", 10, 2_000, true),
        ])
    }

    #[test]
    fn test_newest_first() {
        let ids: Vec<_> = sample().iter(HistoryFilter::All).map(|w| w.id.0.clone()).collect();
        assert_eq!(ids, vec!["w3", "w2", "w1"]);
    }

    #[test]
    fn test_totals_by_filter() {
        let history = sample();
        let all = history.totals(HistoryFilter::All);
        assert_eq!(all.count, 3);
        assert_eq!(all.early_count, 2);
        assert_eq!(all.amount, Money::from_cents(16_000));
        assert_eq!(all.fees, Money::from_cents(60));
        assert_eq!(all.net, Money::from_cents(15_940));

        let standard = history.totals(HistoryFilter::Standard);
        assert_eq!(standard.count, 1);
        assert_eq!(standard.fees, Money::ZERO);

        assert_eq!(history.totals(HistoryFilter::Early).amount, Money::from_cents(6_000));
    }

    #[test]
    fn test_per_vault_and_parsing() {
        let history = sample();
        let v1 = VaultId::from("v1");
        assert_eq!(history.for_vault(&v1).count(), 2);
        assert_eq!("EARLY".parse::<HistoryFilter>().unwrap(), HistoryFilter::Early);
        assert!("deposits".parse::<HistoryFilter>().is_err());
        assert!(WithdrawalHistory::default().is_empty());
    }
}
