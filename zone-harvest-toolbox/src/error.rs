//! Unified error types.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Toolbox error type.
///
/// Only raised for problems detected before any network traffic. Failures that
/// happen while a check runs are carried on the result instead.
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum HarvestError {
    /// Input validation error
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Toolbox Result alias.
pub type HarvestResult<T> = std::result::Result<T, HarvestError>;

/// Failure of a single DNS message exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// The server could not be reached (connect, send or receive failed).
    #[error("DNS server could not be reached: {0}")]
    Transport(String),

    /// No response within the configured deadline.
    #[error("DNS query timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The query could not be encoded or the response could not be decoded.
    #[error("Malformed DNS message: {0}")]
    Malformed(String),

    /// `SERVFAIL`
    #[error("The name server encountered an internal failure while processing this request (SERVFAIL)")]
    ServerFailure,

    /// `NXDOMAIN`
    #[error("Some name that ought to exist, does not exist (NXDOMAIN)")]
    NameError,

    /// `REFUSED`
    #[error("The name server refuses to perform the specified operation for policy or security reasons (REFUSED)")]
    Refused,

    /// A delegation level produced no server to send the query to.
    #[error("No nameserver available to query {0}")]
    NoNameserver(String),
}

impl ExchangeError {
    /// Whether the server answered with an error response code, as opposed to
    /// the exchange itself failing.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::ServerFailure | Self::NameError | Self::Refused)
    }

    /// Short category label.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(_) | Self::Timeout(_) | Self::NoNameserver(_) => "transport",
            Self::Malformed(_) => "malformed",
            Self::ServerFailure => "server failure",
            Self::NameError => "name does not exist",
            Self::Refused => "policy refusal",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_errors_are_distinguished() {
        assert!(ExchangeError::ServerFailure.is_protocol());
        assert!(ExchangeError::NameError.is_protocol());
        assert!(ExchangeError::Refused.is_protocol());
        assert!(!ExchangeError::Transport("refused".to_string()).is_protocol());
        assert!(!ExchangeError::Timeout(Duration::from_secs(1)).is_protocol());
        assert!(!ExchangeError::NoNameserver("example.com".to_string()).is_protocol());
    }

    #[test]
    fn test_categories() {
        assert_eq!(ExchangeError::ServerFailure.category(), "server failure");
        assert_eq!(ExchangeError::NameError.category(), "name does not exist");
        assert_eq!(ExchangeError::Refused.category(), "policy refusal");
        assert_eq!(
            ExchangeError::Malformed("short read".to_string()).category(),
            "malformed"
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = ExchangeError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "DNS query timed out after 1500ms");
    }

    #[test]
    fn test_harvest_error_serializes_with_code() {
        let err = HarvestError::ValidationError("bad".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "ValidationError");
        assert_eq!(json["details"], "bad");
    }
}
