//! Error definitions
//!
//! Every fallible operation in testkit-wait returns [`Result`], whose error
//! side is the single [`Error`] enum below.

use std::time::Duration;

use thiserror::Error;

/// Main error type for testkit-wait
#[derive(Error, Debug)]
pub enum Error {
    /// The expectation or the wait call was misconfigured.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A strict counting expectation received more fulfillments than expected.
    #[error("Expectation '{description}' already fulfilled ({expected} fulfillment(s) expected)")]
    AlreadyFulfilled {
        /// Description of the over-fulfilled expectation.
        description: String,
        /// The expected fulfillment count at the time of the call.
        expected: usize,
    },

    /// A wait call was given an empty expectation set.
    #[error("No expectations provided")]
    NoExpectationsProvided,

    /// The deadline passed with expectations still unfulfilled.
    #[error("Timed out after {timeout:?} waiting for: {}", quoted(.unfulfilled))]
    Timeout {
        /// The timeout the wait was called with.
        timeout: Duration,
        /// Descriptions of the unfulfilled expectations, in input order.
        unfulfilled: Vec<String>,
    },

    /// The predicate poller thread could not be started.
    #[error("Failed to spawn predicate poller: {0}")]
    Spawn(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Returns `true` for [`Error::Timeout`].
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Descriptions of the expectations a timed out wait left unfulfilled.
    ///
    /// Empty for every other variant.
    #[must_use]
    pub fn unfulfilled(&self) -> &[String] {
        match self {
            Self::Timeout { unfulfilled, .. } => unfulfilled,
            _ => &[],
        }
    }
}

fn quoted(descriptions: &[String]) -> String {
    descriptions
        .iter()
        .map(|d| format!("'{d}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_lists_descriptions_in_order() {
        let err = Error::Timeout {
            timeout: Duration::from_millis(200),
            unfulfilled: vec!["second".to_string(), "third".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 200ms waiting for: 'second', 'third'"
        );
        assert!(err.is_timeout());
        assert_eq!(err.unfulfilled(), ["second", "third"]);
    }

    #[test]
    fn test_already_fulfilled_message() {
        let err = Error::AlreadyFulfilled {
            description: "upload".to_string(),
            expected: 2,
        };
        assert_eq!(
            err.to_string(),
            "Expectation 'upload' already fulfilled (2 fulfillment(s) expected)"
        );
        assert!(!err.is_timeout());
        assert!(err.unfulfilled().is_empty());
    }

    #[test]
    fn test_invalid_configuration_constructor() {
        let err = Error::invalid_configuration("count must be at least 1");
        assert!(matches!(err, Error::InvalidConfiguration(ref m) if m == "count must be at least 1"));
        assert_eq!(
            err.to_string(),
            "Invalid configuration: count must be at least 1"
        );
    }

    #[test]
    fn test_spawn_from_io_error() {
        let io = std::io::Error::other("no threads");
        let err: Error = io.into();
        assert!(matches!(err, Error::Spawn(_)));
    }
}
