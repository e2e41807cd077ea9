//! # Vault Policy Engine
//!
//! Pure functions over a [`Vault`] snapshot and a clock. Every display site
//! and every pre-submit check goes through here, so the numbers a user sees
//! and the requests the front end sends agree with each other.
//!
//! The ledger re-validates everything. A rejection from this module saves a
//! round trip; an acceptance is not a promise.
//!
//! ## Flexibility
//!
//! The early allowance is `current_amount * flexibility_percentage / 100`,
//! rounded down to the cent, minus what has already been used. An early
//! withdrawal is accepted when it fits the allowance measured *before* it is
//! taken out, which is what the ledger enforces.
//!
//! The ceiling shrinks with the balance, so a withdrawal of the full
//! allowance leaves `flexibility_used` above the new ceiling. The largest
//! amount that avoids this is
//!
//! ```text
//! used + a <= (current - a) * p / 100
//!        a <= (current * p - 100 * used) / (100 + p)
//! ```
//!
//! [`sustainable_early_withdrawal`] computes it for display. It is never
//! used to refuse a request.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use thiserror::Error;

use crate::config::{MAX_FLEXIBILITY_PERCENTAGE, MAX_VAULT_NAME_LENGTH};
use crate::money::Money;

use super::model::{Vault, VaultDraft, VaultId};
use super::withdrawal::{FeeRate, WithdrawalPreview};

const MILLIS_PER_DAY: i64 = 86_400_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why the policy engine refused an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// Zero, unparseable or overflowing amount.
    #[error("invalid amount: {reason}")]
    InvalidAmount {
        /// What was wrong with it.
        reason: String,
    },

    /// The withdrawal is larger than the vault balance.
    #[error("insufficient funds: {available} available, {requested} requested")]
    InsufficientFunds {
        /// Current vault balance.
        available: Money,
        /// Requested withdrawal.
        requested: Money,
    },

    /// An early withdrawal is larger than the remaining allowance.
    #[error("insufficient flexibility: at most {available} can be withdrawn early, {requested} requested")]
    InsufficientFlexibility {
        /// Largest early withdrawal currently allowed.
        available: Money,
        /// Requested withdrawal.
        requested: Money,
    },

    /// The vault has been closed.
    #[error("vault {0} is closed")]
    VaultInactive(VaultId),

    /// The operation needs an unlocked vault.
    #[error("vault {vault_id} is locked until {unlock_date}")]
    VaultLocked {
        vault_id: VaultId,
        unlock_date: NaiveDate,
    },

    /// Only empty vaults can be closed.
    #[error("vault {vault_id} still holds {balance}")]
    VaultNotEmpty { vault_id: VaultId, balance: Money },

    /// A new vault's parameters are out of bounds.
    #[error("invalid vault: {reason}")]
    InvalidVault { reason: String },
}

fn invalid_amount(reason: &str) -> PolicyError {
    PolicyError::InvalidAmount {
        reason: reason.to_string(),
    }
}

fn invalid_vault(reason: impl Into<String>) -> PolicyError {
    PolicyError::InvalidVault {
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Progress & Lock State
// ---------------------------------------------------------------------------

/// `round(current / target * 100)`, half-up. Zero when the target is zero.
///
/// Not clamped: an overfunded vault reports more than 100.
pub fn progress(vault: &Vault) -> u64 {
    let target = u128::from(vault.target_amount.cents());
    if target == 0 {
        return 0;
    }
    let current = u128::from(vault.current_amount.cents());
    let rounded = (current * 200 + target) / (target * 2);
    u64::try_from(rounded).unwrap_or(u64::MAX)
}

/// The instant a vault unlocks: midnight UTC at the start of `unlock_date`.
pub fn unlock_instant(vault: &Vault) -> DateTime<Utc> {
    Utc.from_utc_datetime(&vault.unlock_date.and_time(NaiveTime::MIN))
}

/// Whether the vault is still locked at `now`.
pub fn is_locked(vault: &Vault, now: DateTime<Utc>) -> bool {
    unlock_instant(vault) > now
}

/// Whole days until unlock, rounded up. Zero once unlocked.
pub fn days_until_unlock(vault: &Vault, now: DateTime<Utc>) -> u64 {
    let remaining = (unlock_instant(vault) - now).num_milliseconds();
    if remaining <= 0 {
        return 0;
    }
    // ceil without floats
    ((remaining + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY) as u64
}

// ---------------------------------------------------------------------------
// Flexibility
// ---------------------------------------------------------------------------

/// Remaining early allowance.
///
/// `Overdrawn` only shows up on inconsistent ledger data (used above the
/// ceiling). Display code should go through [`Flexibility::clamped`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flexibility {
    Available(Money),
    Overdrawn(Money),
}

impl Flexibility {
    /// The allowance with an overdraft shown as zero.
    pub fn clamped(self) -> Money {
        match self {
            Flexibility::Available(m) => m,
            Flexibility::Overdrawn(_) => Money::ZERO,
        }
    }

    pub fn is_overdrawn(self) -> bool {
        matches!(self, Flexibility::Overdrawn(_))
    }
}

/// Total early allowance: `current * pct / 100`, rounded down.
pub fn flexibility_ceiling(vault: &Vault) -> Money {
    vault.current_amount.percent_floor(vault.flexibility_percentage)
}

/// `ceiling - flexibility_used`.
pub fn flexibility_available(vault: &Vault) -> Flexibility {
    let ceiling = flexibility_ceiling(vault);
    match ceiling.checked_sub(vault.flexibility_used) {
        Some(left) => Flexibility::Available(left),
        None => Flexibility::Overdrawn(vault.flexibility_used.saturating_sub(ceiling)),
    }
}

/// Largest early withdrawal that keeps `used <= ceiling` afterwards.
///
/// A hint only; [`preview_withdrawal`] checks against
/// [`flexibility_available`].
pub fn sustainable_early_withdrawal(vault: &Vault) -> Money {
    let pct = u128::from(vault.flexibility_percentage.value());
    let current = u128::from(vault.current_amount.cents());
    let used = u128::from(vault.flexibility_used.cents());

    let headroom = (current * pct).saturating_sub(100 * used);
    let bound = headroom / (100 + pct);
    // bound <= current * pct / 100 <= current, so it fits in u64
    Money::from_cents(bound as u64)
}

// ---------------------------------------------------------------------------
// Withdrawals & Deposits
// ---------------------------------------------------------------------------

/// Validates a withdrawal and works out its fee.
///
/// Checks run in this order: closed vault, zero amount, balance, then (for a
/// locked vault) the early allowance left before this withdrawal.
/// `early_rate` is the caller's tier rate from
/// [`super::FeeSchedule::early_rate_for`]; unlocked withdrawals are free.
pub fn preview_withdrawal(
    vault: &Vault,
    amount: Money,
    early_rate: FeeRate,
    now: DateTime<Utc>,
) -> Result<WithdrawalPreview, PolicyError> {
    if !vault.is_active {
        return Err(PolicyError::VaultInactive(vault.id.clone()));
    }
    if amount.is_zero() {
        return Err(invalid_amount("withdrawal amount must be greater than zero"));
    }
    if amount > vault.current_amount {
        return Err(PolicyError::InsufficientFunds {
            available: vault.current_amount,
            requested: amount,
        });
    }

    let is_early = is_locked(vault, now);
    let fee_rate = if is_early {
        let allowed = flexibility_available(vault).clamped();
        if amount > allowed {
            return Err(PolicyError::InsufficientFlexibility {
                available: allowed,
                requested: amount,
            });
        }
        early_rate
    } else {
        FeeRate::ZERO
    };

    let fee = fee_rate.fee_on(amount);
    let after = withdrawn(vault, amount, is_early);

    Ok(WithdrawalPreview {
        vault_id: vault.id.clone(),
        amount,
        fee,
        net_amount: amount.saturating_sub(fee),
        is_early,
        fee_rate,
        flexibility_remaining: flexibility_available(&after).clamped(),
    })
}

/// The vault after a previewed withdrawal.
///
/// Re-checks the balance and allowance against `vault`, which may be a newer
/// snapshot than the one the preview was built from.
pub fn apply_withdrawal(vault: &Vault, preview: &WithdrawalPreview) -> Result<Vault, PolicyError> {
    if vault.id != preview.vault_id {
        return Err(invalid_vault(format!(
            "preview was made for vault {}, not {}",
            preview.vault_id, vault.id
        )));
    }
    if !vault.is_active {
        return Err(PolicyError::VaultInactive(vault.id.clone()));
    }
    if preview.amount > vault.current_amount {
        return Err(PolicyError::InsufficientFunds {
            available: vault.current_amount,
            requested: preview.amount,
        });
    }
    if preview.is_early {
        let allowed = flexibility_available(vault).clamped();
        if preview.amount > allowed {
            return Err(PolicyError::InsufficientFlexibility {
                available: allowed,
                requested: preview.amount,
            });
        }
    }
    Ok(withdrawn(vault, preview.amount, preview.is_early))
}

fn withdrawn(vault: &Vault, amount: Money, is_early: bool) -> Vault {
    let mut next = vault.clone();
    next.current_amount = vault.current_amount.saturating_sub(amount);
    if is_early {
        next.flexibility_used = vault.flexibility_used.saturating_add(amount);
    }
    next
}

/// The vault after a deposit.
pub fn apply_deposit(vault: &Vault, amount: Money) -> Result<Vault, PolicyError> {
    if !vault.is_active {
        return Err(PolicyError::VaultInactive(vault.id.clone()));
    }
    if amount.is_zero() {
        return Err(invalid_amount("deposit amount must be greater than zero"));
    }
    let current_amount = vault
        .current_amount
        .checked_add(amount)
        .ok_or_else(|| invalid_amount("deposit overflows the vault balance"))?;

    Ok(Vault {
        current_amount,
        ..vault.clone()
    })
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Checks a new vault's parameters before `POST /vaults/`.
pub fn validate_new_vault(draft: &VaultDraft, today: NaiveDate) -> Result<(), PolicyError> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(invalid_vault("name must not be empty"));
    }
    if name.chars().count() > MAX_VAULT_NAME_LENGTH {
        return Err(invalid_vault(format!(
            "name must be at most {MAX_VAULT_NAME_LENGTH} characters"
        )));
    }
    if draft.target_amount.is_zero() {
        return Err(invalid_amount("target amount must be greater than zero"));
    }
    if draft.unlock_date <= today {
        return Err(invalid_vault("unlock date must be in the future"));
    }
    if draft.flexibility_percentage.value() > MAX_FLEXIBILITY_PERCENTAGE {
        return Err(invalid_vault(format!(
            "flexibility must be between 0% and {MAX_FLEXIBILITY_PERCENTAGE}%"
        )));
    }
    Ok(())
}

/// A vault can be closed once it is unlocked and empty.
pub fn can_close(vault: &Vault, now: DateTime<Utc>) -> Result<(), PolicyError> {
    if !vault.is_active {
        return Err(PolicyError::VaultInactive(vault.id.clone()));
    }
    if is_locked(vault, now) {
        return Err(PolicyError::VaultLocked {
            vault_id: vault.id.clone(),
            unlock_date: vault.unlock_date,
        });
    }
    if !vault.current_amount.is_zero() {
        return Err(PolicyError::VaultNotEmpty {
            vault_id: vault.id.clone(),
            balance: vault.current_amount,
        });
    }
    Ok(())
}
