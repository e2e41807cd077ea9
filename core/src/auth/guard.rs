//! # Route Guard
//!
//! Runs on every navigation, before anything is fetched for the target.
//!
//! | Route class | No session | Session, not admin | Admin |
//! |-------------|------------|--------------------|-------|
//! | public      | allow      | allow              | allow |
//! | auth-only   | allow      | → landing          | → landing |
//! | protected   | → login    | allow              | allow |
//! | admin       | → login    | → landing          | allow |
//!
//! Login redirects carry the requested path in `?redirect=` so the login
//! flow can send the user back. Prefixes match whole path segments:
//! `/admin` covers `/admin` and `/admin/users`, not `/administrator`.

use url::form_urlencoded;

use crate::config::{
    ADMIN_ROUTE_PREFIXES, AUTH_ONLY_ROUTE_PREFIXES, DEFAULT_LANDING_ROUTE, LOGIN_ROUTE,
    PROTECTED_ROUTE_PREFIXES, REDIRECT_QUERY_PARAM,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    /// Only reachable without a session (login, register, ...).
    AuthOnly,
    /// Needs a session.
    Protected,
    /// Needs a session with the admin role.
    Admin,
}

/// What the guard knows about the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GuardContext {
    pub has_token: bool,
    pub is_admin: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedirectReason {
    LoginRequired,
    AlreadyAuthenticated,
    AdminRequired,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect {
        location: String,
        reason: RedirectReason,
    },
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

#[derive(Clone, Debug)]
pub struct RouteGuard {
    protected: Vec<String>,
    auth_only: Vec<String>,
    admin: Vec<String>,
    login_route: String,
    landing_route: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        let owned = |prefixes: &[&str]| prefixes.iter().map(|p| p.to_string()).collect();
        Self {
            protected: owned(PROTECTED_ROUTE_PREFIXES),
            auth_only: owned(AUTH_ONLY_ROUTE_PREFIXES),
            admin: owned(ADMIN_ROUTE_PREFIXES),
            login_route: LOGIN_ROUTE.to_string(),
            landing_route: DEFAULT_LANDING_ROUTE.to_string(),
        }
    }
}

/// Path without query string or fragment, always starting with `/`.
fn normalize(target: &str) -> String {
    let end = target.find(['?', '#']).unwrap_or(target.len());
    let path = target[..end].trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl RouteGuard {
    pub fn classify(&self, target: &str) -> RouteClass {
        let path = normalize(target);
        let matches = |prefixes: &[String]| prefixes.iter().any(|p| under(&path, p));

        if matches(&self.admin) {
            RouteClass::Admin
        } else if matches(&self.protected) {
            RouteClass::Protected
        } else if matches(&self.auth_only) {
            RouteClass::AuthOnly
        } else {
            RouteClass::Public
        }
    }

    /// `/login?redirect=<path>`.
    pub fn login_redirect(&self, target: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair(REDIRECT_QUERY_PARAM, &normalize(target))
            .finish();
        format!("{}?{}", self.login_route, query)
    }

    pub fn landing_route(&self) -> &str {
        &self.landing_route
    }

    pub fn check(&self, target: &str, ctx: GuardContext) -> GuardDecision {
        let decision = match (self.classify(target), ctx) {
            (RouteClass::Protected | RouteClass::Admin, GuardContext { has_token: false, .. }) => {
                GuardDecision::Redirect {
                    location: self.login_redirect(target),
                    reason: RedirectReason::LoginRequired,
                }
            }
            (RouteClass::AuthOnly, GuardContext { has_token: true, .. }) => {
                GuardDecision::Redirect {
                    location: self.landing_route.clone(),
                    reason: RedirectReason::AlreadyAuthenticated,
                }
            }
            (RouteClass::Admin, GuardContext { is_admin: false, .. }) => GuardDecision::Redirect {
                location: self.landing_route.clone(),
                reason: RedirectReason::AdminRequired,
            },
            _ => GuardDecision::Allow,
        };

        if let GuardDecision::Redirect { location, reason } = &decision {
            tracing::debug!(path = target, %location, ?reason, "navigation redirected");
        }
        decision
    }
}

/// Reads the return path from a login URL's query, for after sign-in.
///
/// Only same-site paths are honoured; anything else lands on `fallback`.
pub fn redirect_target(query: &str, fallback: &str) -> String {
    form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .find(|(k, _)| k == REDIRECT_QUERY_PARAM)
        .map(|(_, v)| v.into_owned())
        .filter(|v| v.starts_with('/') && !v.starts_with("//"))
        .unwrap_or_else(|| fallback.to_string())
}
