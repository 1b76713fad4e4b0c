//! Error taxonomy for trace loading, filtering and pattern construction
//!
//! Failure to match a pattern is not an error: matchers return `None` and the
//! caller moves on. Unknown DOS function or error codes are not errors either;
//! the decoder reports them inline.

use thiserror::Error;

/// Errors surfaced by the trace library
#[derive(Error, Debug)]
pub enum TraceError {
    /// Malformed persisted trace (missing fields, wrong shape)
    #[error("Malformed trace entry {position}: {message}")]
    Format { position: usize, message: String },

    /// Invalid filter bounds; the store is left unchanged
    #[error("Invalid tracepoint range: first ({first}) must be less or equal to last ({last})")]
    Range { first: u64, last: u64 },

    /// Invalid regex or repetition range for a pattern step
    #[error("Invalid pattern step: {0}")]
    Pattern(String),

    /// Rule set name not present in the registry
    #[error("Unknown substitution rule set: {0}")]
    UnknownRuleSet(String),

    /// Option source could not be parsed
    #[error("Invalid option source {source_name}: {message}")]
    Options {
        source_name: String,
        message: String,
    },

    /// Label file could not be parsed
    #[error("Invalid label file {source_name}: {message}")]
    Labels {
        source_name: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TraceError {
    pub(crate) fn format(position: usize, message: impl Into<String>) -> Self {
        Self::Format {
            position,
            message: message.into(),
        }
    }
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, TraceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_error_message() {
        let err = TraceError::Range {
            first: 20,
            last: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("20"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn test_format_error_names_position() {
        let err = TraceError::format(3, "missing field `ips`");
        assert_eq!(
            err.to_string(),
            "Malformed trace entry 3: missing field `ips`"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TraceError = io.into();
        assert!(matches!(err, TraceError::Io(_)));
    }
}
