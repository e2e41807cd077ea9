//! # Vault Module — Savings Goals & Withdrawal Policy
//!
//! Vaults are where a FlexSave user's money sits until the goal date. This
//! module types them and holds the only copy of the rules that govern them:
//! progress, lock state, the early-withdrawal allowance and its fee.
//!
//! ## Architecture
//!
//! ```text
//! model.rs       — Vault, VaultId, VaultDraft
//! withdrawal.rs  — Withdrawal records, fee rates, the withdrawal preview
//! policy.rs      — Pure policy functions and PolicyError
//! summary.rs     — Display-ready snapshot built from the policy functions
//! history.rs     — Withdrawal history ordering, filters and totals
//! ```
//!
//! ## Design Principles
//!
//! 1. **Amounts are cents.** See [`crate::money`]. Fees round half-up,
//!    allowances round down.
//!
//! 2. **The clock is an argument.** Lock state depends on wall-clock time,
//!    so every function that needs it takes `now` instead of reading it.
//!
//! 3. **Advisory only.** The ledger re-checks every mutation; these
//!    functions exist for display and to fail fast.

pub mod history;
pub mod model;
pub mod policy;
pub mod summary;
pub mod withdrawal;

pub use history::{HistoryFilter, HistoryTotals, WithdrawalHistory};
pub use model::{Vault, VaultDraft, VaultId};
pub use policy::{Flexibility, PolicyError};
pub use summary::{portfolio_progress, VaultSummary};
pub use withdrawal::{
    FeeRate, FeeSchedule, Withdrawal, WithdrawalId, WithdrawalPreview, WithdrawalStatus,
};
