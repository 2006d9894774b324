//! Error taxonomy for admin API calls

use thiserror::Error;

/// Classified failure of an admin API request.
///
/// `status()` mirrors the HTTP-ish code callers key off: 401 forces a
/// logout, 408 is a local timeout, 0 means the request never produced an
/// HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("{0}")]
    Network(String),

    #[error("{0}")]
    Validation(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Unauthorized => 401,
            ApiError::Timeout(_) => 408,
            ApiError::Http { status, .. } => *status,
            ApiError::Network(_) | ApiError::Validation(_) | ApiError::Cancelled => 0,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Failures worth a single retry on reads.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Timeout(_))
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Unauthorized.status(), 401);
        assert_eq!(ApiError::Timeout(15_000).status(), 408);
        assert_eq!(
            ApiError::Http {
                status: 503,
                message: "down".into()
            }
            .status(),
            503
        );
        assert_eq!(ApiError::Network("reset".into()).status(), 0);
        assert_eq!(ApiError::validation("empty").status(), 0);
    }

    #[test]
    fn test_timeout_message_includes_duration() {
        assert_eq!(
            ApiError::Timeout(1500).to_string(),
            "Request timed out after 1500ms"
        );
    }
}
