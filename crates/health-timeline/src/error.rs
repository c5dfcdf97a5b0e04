//! Error types for the health-timeline crate.
//!
//! The reconstruction engine itself never fails on malformed data; errors only
//! surface while decoding upstream payloads or validating configuration.

use thiserror::Error;

/// Errors that can occur at the decoding and configuration boundary.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// A payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// An upstream API answered with a non-success status.
    #[error("upstream returned status {status}: {reason}")]
    UpstreamStatus {
        /// The `status` field of the response envelope.
        status: String,
        /// The error message reported by the upstream, if any.
        reason: String,
    },

    /// A silence definition is invalid.
    #[error("invalid silence: {reason}")]
    InvalidSilence {
        /// The reason the silence is invalid.
        reason: String,
    },

    /// The timeline configuration is invalid.
    #[error("invalid config: {reason}")]
    InvalidConfig {
        /// The reason the configuration is invalid.
        reason: String,
    },
}

impl From<serde_json::Error> for TimelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type for timeline operations.
pub type Result<T> = std::result::Result<T, TimelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_decode() {
        let err = TimelineError::Decode("expected value".to_string());
        assert_eq!(err.to_string(), "decode error: expected value");
    }

    #[test]
    fn error_display_upstream_status() {
        let err = TimelineError::UpstreamStatus {
            status: "error".to_string(),
            reason: "bad_data".to_string(),
        };
        assert_eq!(err.to_string(), "upstream returned status error: bad_data");
    }

    #[test]
    fn error_display_invalid_config() {
        let err = TimelineError::InvalidConfig {
            reason: "default step must be positive".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config: default step must be positive"
        );
    }

    #[test]
    fn error_display_invalid_silence() {
        let err = TimelineError::InvalidSilence {
            reason: "no matchers".to_string(),
        };
        assert_eq!(err.to_string(), "invalid silence: no matchers");
    }

    #[test]
    fn error_from_serde_json() {
        let json_err = serde_json::from_str::<String>("invalid json");
        assert!(json_err.is_err());
        let err: TimelineError = json_err.unwrap_err().into();
        assert!(matches!(err, TimelineError::Decode(_)));
    }
}
