//! Ledger API client error types.

/// Errors from ledger API calls.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// HTTP transport error (connection refused, timeout, TLS).
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The ledger rejected the request.
    #[error("ledger {endpoint} returned {status}: {detail}")]
    Api {
        endpoint: String,
        status: u16,
        /// `detail` from the error body, or the raw body.
        detail: String,
    },

    /// The bearer token was missing, expired or revoked (401).
    #[error("ledger {endpoint} rejected the session token")]
    Unauthorized { endpoint: String },

    /// The resource does not exist (404).
    #[error("ledger {endpoint} returned not found")]
    NotFound { endpoint: String },

    /// The response body did not match the expected shape.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl LedgerError {
    /// Whether the same request could succeed if the user tries again:
    /// transport failures and 5xx responses.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Http { .. } => true,
            LedgerError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status, when the ledger answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            LedgerError::Api { status, .. } => Some(*status),
            LedgerError::Unauthorized { .. } => Some(401),
            LedgerError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// A sentence a user can act on.
    pub fn user_message(&self) -> String {
        match self {
            LedgerError::Api { status, detail, .. } if *status < 500 => detail.clone(),
            LedgerError::Unauthorized { .. } => {
                "Your session has expired. Please sign in again.".to_string()
            }
            LedgerError::NotFound { .. } => "Not found.".to_string(),
            e if e.is_retryable() => {
                "The server could not be reached. Please try again in a moment.".to_string()
            }
            _ => "Unexpected response from the server.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_classified_by_status() {
        let server = LedgerError::Api {
            endpoint: "GET /vaults/".into(),
            status: 503,
            detail: "unavailable".into(),
        };
        let client = LedgerError::Api {
            endpoint: "POST /vaults/".into(),
            status: 400,
            detail: "Unlock date must be in the future".into(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert_eq!(client.user_message(), "Unlock date must be in the future");
        assert!(server.user_message().contains("try again"));
        assert_eq!(client.status(), Some(400));
    }

    #[test]
    fn auth_errors_are_not_retryable() {
        let err = LedgerError::Unauthorized {
            endpoint: "GET /users/me".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("GET /users/me"));
    }
}
