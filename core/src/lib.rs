// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # FlexSave — Core Library
//!
//! Everything a FlexSave front end needs that is not pixels: the vault
//! policy engine, the typed client for the ledger API, the identity
//! provider adapter, the process-wide session context, and the route guard.
//!
//! The backend ledger is the authority on every balance. Nothing in this
//! crate persists vaults or withdrawals; the policy functions exist so the
//! front end can show derived values and reject obviously invalid requests
//! before a round trip.
//!
//! ## Architecture
//!
//! - **money** — Integer minor-unit currency. No floats in arithmetic.
//! - **vault** — Vault model, withdrawal records, the policy engine, and
//!   display summaries built on top of it.
//! - **user** — Users, roles, discipline score, aggregate statistics.
//! - **auth** — Identity provider trait + Firebase adapter, credential
//!   store, session context, route guard.
//! - **ledger** — REST client for the backend API.
//! - **config** — Product constants: fee rates, limits, routes.
//!
//! ## Ground Rules
//!
//! 1. Amounts are `u64` cents. Two-digit strings appear only at the edges.
//! 2. Policy functions are pure: a vault snapshot and a clock go in, a value
//!    or a typed rejection comes out.
//! 3. Every rejection reaches the caller. Nothing is clamped silently.

pub mod auth;
pub mod config;
pub mod ledger;
pub mod money;
pub mod user;
pub mod vault;

mod wire;

pub use money::{Money, MoneyError, Percent};
