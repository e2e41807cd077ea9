//! # Ledger — Backend API Client
//!
//! The ledger is the FlexSave backend: it owns balances, applies fees,
//! records withdrawals and keeps discipline scores. Everything that mutates
//! money happens there, one request at a time; a call's result is trusted
//! only once it returns successfully.
//!
//! ```text
//! config.rs  — LedgerConfig (base URL, timeout), env loading
//! error.rs   — LedgerError and its retry classification
//! dto.rs     — Request bodies and response envelopes
//! client.rs  — LedgerClient, one method per endpoint
//! ```

pub mod client;
pub mod config;
pub mod dto;
pub mod error;

pub use client::LedgerClient;
pub use config::{ConfigError, LedgerConfig};
pub use dto::{
    LedgerVault, RegisterRequest, RegisterResponse, RemoteWithdrawalPreview, WithdrawalRequest,
};
pub use error::LedgerError;
