//! # Users, Roles & Statistics
//!
//! The ledger owns user records; this module only types them. The shapes
//! differ between endpoints (`/users/me` omits the role and timestamps that
//! the admin listing carries), so everything not present on every endpoint
//! has a serde default.

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{
    ADMIN_USERS_DEFAULT_LIMIT, ADMIN_USERS_MAX_LIMIT, DEFAULT_DISCIPLINE_SCORE,
    DEPOSIT_DISCIPLINE_REWARD, EARLY_WITHDRAWAL_DISCIPLINE_PENALTY, MAX_DISCIPLINE_SCORE,
};
use crate::money::Money;
use crate::vault::Vault;
use crate::wire;

// ---------------------------------------------------------------------------
// Identifiers & Roles
// ---------------------------------------------------------------------------

/// Ledger-assigned user identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_string())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

impl FromStr for Role {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(UserError::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserError {
    #[error("unknown role '{0}' (expected 'user' or 'admin')")]
    UnknownRole(String),

    /// Admin listing page size outside 1..=100.
    #[error("page size {limit} is outside 1..={max}")]
    InvalidPageSize {
        /// The rejected limit.
        limit: u32,
        /// Largest accepted limit.
        max: u32,
    },
}

// ---------------------------------------------------------------------------
// Discipline Score
// ---------------------------------------------------------------------------

/// Saving-discipline score, clamped to 0..=100.
///
/// The ledger recomputes it (+1 per deposit, -2 per early withdrawal from a
/// locked vault). The adjust helpers exist for optimistic display after a
/// successful call, before the user record is refetched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DisciplineScore(u8);

impl DisciplineScore {
    pub fn new(value: u8) -> Self {
        DisciplineScore(value.min(MAX_DISCIPLINE_SCORE))
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Applies a signed delta, saturating at both ends.
    pub fn adjust(self, delta: i16) -> Self {
        let next = (i16::from(self.0) + delta).clamp(0, i16::from(MAX_DISCIPLINE_SCORE));
        DisciplineScore(next as u8)
    }

    pub fn after_deposit(self) -> Self {
        self.adjust(DEPOSIT_DISCIPLINE_REWARD)
    }

    pub fn after_early_withdrawal(self) -> Self {
        self.adjust(EARLY_WITHDRAWAL_DISCIPLINE_PENALTY)
    }
}

impl Default for DisciplineScore {
    fn default() -> Self {
        DisciplineScore(DEFAULT_DISCIPLINE_SCORE)
    }
}

impl fmt::Display for DisciplineScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, MAX_DISCIPLINE_SCORE)
    }
}

impl Serialize for DisciplineScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

// Stored as a float by the ledger; out-of-range values are clamped rather
// than rejected so one bad record cannot break a whole listing.
impl<'de> Deserialize<'de> for DisciplineScore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoreVisitor;

        impl<'de> Visitor<'de> for ScoreVisitor {
            type Value = DisciplineScore;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a discipline score between 0 and 100")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<DisciplineScore, E> {
                Ok(DisciplineScore::new(v.min(u64::from(MAX_DISCIPLINE_SCORE)) as u8))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<DisciplineScore, E> {
                self.visit_u64(v.max(0) as u64)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<DisciplineScore, E> {
                if !v.is_finite() {
                    return Err(E::custom("discipline score is not a finite number"));
                }
                let rounded = v.round().clamp(0.0, f64::from(MAX_DISCIPLINE_SCORE));
                Ok(DisciplineScore(rounded as u8))
            }
        }

        deserializer.deserialize_any(ScoreVisitor)
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// A FlexSave account as returned by the ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub discipline_score: DisciplineScore,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub notification_enabled: bool,
    #[serde(default, with = "wire::option_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "wire::option_timestamp")]
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Savings statistics for the signed-in user (`/users/me/stats`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_saved: Money,
    pub total_vaults: u32,
    #[serde(default)]
    pub active_vaults: u32,
    #[serde(default)]
    pub discipline_score: DisciplineScore,
    pub flexibility_used: Money,
}

impl UserStats {
    /// Derives the stats from a vault listing, for when the stats endpoint
    /// lags behind a mutation the user just made.
    pub fn from_vaults(vaults: &[Vault], discipline_score: DisciplineScore) -> Self {
        let mut stats = UserStats {
            discipline_score,
            ..UserStats::default()
        };
        for vault in vaults {
            stats.total_vaults += 1;
            if vault.is_active {
                stats.active_vaults += 1;
            }
            stats.total_saved = stats.total_saved.saturating_add(vault.current_amount);
            stats.flexibility_used = stats.flexibility_used.saturating_add(vault.flexibility_used);
        }
        stats
    }
}

/// Platform-wide statistics (`/admin/stats`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_users: u64,
    pub active_users: u64,
    pub premium_users: u64,
    pub total_vaults: u64,
    pub active_vaults: u64,
    pub total_saved: Money,
    pub total_withdrawals: u64,
    pub total_withdrawn: Money,
    /// Mean over all users; fractional, unlike a single score.
    pub avg_discipline_score: f64,
}

/// Per-user statistics for the admin detail view (`/admin/users/{id}/stats`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserDetailStats {
    pub user_id: UserId,
    pub email: String,
    pub full_name: String,
    pub total_vaults: u32,
    pub total_saved: Money,
    pub discipline_score: DisciplineScore,
    #[serde(default, with = "wire::option_timestamp")]
    pub last_activity: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Query for the admin user listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserFilter {
    pub skip: u32,
    pub limit: u32,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: ADMIN_USERS_DEFAULT_LIMIT,
            role: None,
            is_active: None,
        }
    }
}

impl UserFilter {
    pub fn validate(&self) -> Result<(), UserError> {
        if self.limit == 0 || self.limit > ADMIN_USERS_MAX_LIMIT {
            return Err(UserError::InvalidPageSize {
                limit: self.limit,
                max: ADMIN_USERS_MAX_LIMIT,
            });
        }
        Ok(())
    }

    /// Query-string pairs, omitting unset filters.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("skip", self.skip.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(role) = self.role {
            pairs.push(("role", role.to_string()));
        }
        if let Some(active) = self.is_active {
            pairs.push(("is_active", active.to_string()));
        }
        pairs
    }
}

/// Partial update applied by an admin. Unset fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AdminUserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_premium: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl AdminUserUpdate {
    pub fn is_empty(&self) -> bool {
        self.is_active.is_none() && self.is_premium.is_none() && self.role.is_none()
    }
}

/// Partial update of the signed-in user's own profile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_enabled: Option<bool>,
}
