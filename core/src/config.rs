// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Product Configuration & Constants
//!
//! Every number that shapes FlexSave's rules lives here: fee rates, vault
//! limits, discipline deltas, route prefixes, default endpoints. The backend
//! carries its own copy of the money-related ones and has the final word;
//! these exist so the front end can show the same numbers before it asks.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// Minor units (cents) per major unit (euro).
pub const MINOR_UNITS_PER_MAJOR: u64 = 100;

/// Number of fraction digits shown for amounts.
pub const AMOUNT_DECIMALS: usize = 2;

/// Currency symbol appended to amounts in human output.
pub const CURRENCY_SYMBOL: &str = "€";

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Basis-point denominator. 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Early-withdrawal fee for standard accounts: 1.00%.
pub const EARLY_WITHDRAWAL_FEE_BPS: u32 = 100;

/// Early-withdrawal fee for premium accounts: 0.50%.
pub const PREMIUM_EARLY_WITHDRAWAL_FEE_BPS: u32 = 50;

/// Withdrawals after the unlock date are free.
pub const UNLOCKED_WITHDRAWAL_FEE_BPS: u32 = 0;

// ---------------------------------------------------------------------------
// Vault Limits
// ---------------------------------------------------------------------------

/// Flexibility offered when the user doesn't pick one.
pub const DEFAULT_FLEXIBILITY_PERCENTAGE: u8 = 10;

/// Highest flexibility a new vault may be created with.
pub const MAX_FLEXIBILITY_PERCENTAGE: u8 = 10;

/// Upper bound for any percentage value.
pub const MAX_PERCENTAGE: u8 = 100;

/// Maximum vault name length, in characters.
pub const MAX_VAULT_NAME_LENGTH: usize = 100;

// ---------------------------------------------------------------------------
// Discipline Score
// ---------------------------------------------------------------------------

/// Score assigned to a freshly registered user.
pub const DEFAULT_DISCIPLINE_SCORE: u8 = 50;

/// Ceiling of the discipline score.
pub const MAX_DISCIPLINE_SCORE: u8 = 100;

/// Reward applied by the backend for every deposit.
pub const DEPOSIT_DISCIPLINE_REWARD: i16 = 1;

/// Penalty applied by the backend for an early withdrawal from a locked vault.
pub const EARLY_WITHDRAWAL_DISCIPLINE_PENALTY: i16 = -2;

// ---------------------------------------------------------------------------
// Ledger API
// ---------------------------------------------------------------------------

/// Default base URL of the ledger API (local development backend).
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// Request timeout applied to every ledger call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default page size of the admin user listing.
pub const ADMIN_USERS_DEFAULT_LIMIT: u32 = 50;

/// Largest page size the admin user listing accepts.
pub const ADMIN_USERS_MAX_LIMIT: u32 = 100;

/// Header carrying the per-request idempotency key on mutating calls.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

// ---------------------------------------------------------------------------
// Identity Provider
// ---------------------------------------------------------------------------

/// Firebase Identity Toolkit REST endpoint.
pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Firebase Secure Token endpoint (ID token refresh).
pub const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

/// ID tokens are refreshed this long before they actually expire.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Minimum password length accepted by the identity provider.
pub const MIN_PASSWORD_LENGTH: usize = 6;

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Routes that require a session.
pub const PROTECTED_ROUTE_PREFIXES: &[&str] = &["/dashboard", "/admin"];

/// Routes that only make sense without a session.
pub const AUTH_ONLY_ROUTE_PREFIXES: &[&str] = &["/login", "/register", "/forgot-password"];

/// Routes that additionally require the admin role.
pub const ADMIN_ROUTE_PREFIXES: &[&str] = &["/admin"];

/// Where anonymous users are sent.
pub const LOGIN_ROUTE: &str = "/login";

/// Where authenticated users land by default.
pub const DEFAULT_LANDING_ROUTE: &str = "/dashboard";

/// Query parameter carrying the return path on login redirects.
pub const REDIRECT_QUERY_PARAM: &str = "redirect";

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Formats a basis-point rate as a percentage string.
///
/// Example: 50 bps -> "0.50%"
pub fn bps_display(bps: u32) -> String {
    format!("{}.{:02}%", bps / 100, bps % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_premium_fee_is_cheaper() {
        assert!(PREMIUM_EARLY_WITHDRAWAL_FEE_BPS < EARLY_WITHDRAWAL_FEE_BPS);
        assert_eq!(UNLOCKED_WITHDRAWAL_FEE_BPS, 0);
        assert!(u64::from(EARLY_WITHDRAWAL_FEE_BPS) < BPS_DENOMINATOR);
    }

    #[test]
    fn test_flexibility_bounds() {
        assert!(DEFAULT_FLEXIBILITY_PERCENTAGE <= MAX_FLEXIBILITY_PERCENTAGE);
        assert!(MAX_FLEXIBILITY_PERCENTAGE <= MAX_PERCENTAGE);
    }

    #[test]
    fn test_discipline_defaults() {
        assert!(DEFAULT_DISCIPLINE_SCORE <= MAX_DISCIPLINE_SCORE);
        assert!(DEPOSIT_DISCIPLINE_REWARD > 0);
        assert!(EARLY_WITHDRAWAL_DISCIPLINE_PENALTY < 0);
    }

    #[test]
    fn test_admin_routes_are_protected() {
        for prefix in ADMIN_ROUTE_PREFIXES {
            assert!(PROTECTED_ROUTE_PREFIXES.contains(prefix));
        }
        assert!(PROTECTED_ROUTE_PREFIXES.contains(&DEFAULT_LANDING_ROUTE));
        assert!(AUTH_ONLY_ROUTE_PREFIXES.contains(&LOGIN_ROUTE));
    }

    #[test]
    fn test_bps_display() {
        assert_eq!(bps_display(EARLY_WITHDRAWAL_FEE_BPS), "1.00%");
        assert_eq!(bps_display(PREMIUM_EARLY_WITHDRAWAL_FEE_BPS), "0.50%");
        assert_eq!(bps_display(0), "0.00%");
        assert_eq!(bps_display(1234), "12.34%");
    }
}
