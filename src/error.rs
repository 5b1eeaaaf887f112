//! Error types for a3s-gateway

use thiserror::Error;

/// Errors that can occur while ingesting signals and publishing events
#[derive(Debug, Error)]
pub enum GatewayError {
    /// An alert in the batch carried no fingerprint
    #[error("alert fingerprint is required (name={alert_name:?} status={status})")]
    MissingFingerprint { alert_name: String, status: String },

    /// Event failed validation before publishing
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport connection failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Publish failure
    #[error("Failed to publish event to subject '{subject}': {reason}")]
    Publish { subject: String, reason: String },

    /// Stream creation or management error
    #[error("Stream error: {0}")]
    Stream(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Deadline exceeded
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Caller cancelled the operation
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Audit record could not be written
    #[error("Audit write failed: {0}")]
    Audit(String),

    /// Control-channel message referenced an agent that never described itself
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// Agent descriptor lacks a field required for completion events
    #[error("missing {0}")]
    MissingAgentField(&'static str),

    /// Manual variable could not be resolved
    #[error("{0}")]
    Variable(#[from] crate::variables::VariableLookupError),

    /// Control-channel payload could not be decoded
    #[error("Failed to decode control message: {0}")]
    Decode(String),

    /// One error per failed pair, in publish order
    #[error("{}", join_errors(.0))]
    Multiple(Vec<GatewayError>),

    /// Some events of an ingest batch were not published
    #[error("Published {successful}/{total} events; some failed: {source}")]
    PartialPublish {
        successful: usize,
        total: usize,
        #[source]
        source: Box<GatewayError>,
    },
}

impl GatewayError {
    /// True when the error stems from cancellation or an exceeded deadline
    pub fn is_cancellation(&self) -> bool {
        match self {
            GatewayError::Cancelled(_) | GatewayError::Timeout(_) => true,
            GatewayError::Multiple(errors) => errors.iter().any(GatewayError::is_cancellation),
            GatewayError::PartialPublish { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }

    /// Combine collected errors; `None` when nothing failed
    pub fn join(mut errors: Vec<GatewayError>) -> Option<GatewayError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(GatewayError::Multiple(errors)),
        }
    }
}

fn join_errors(errors: &[GatewayError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_empty_is_none() {
        assert!(GatewayError::join(Vec::new()).is_none());
    }

    #[test]
    fn test_join_single_is_unwrapped() {
        let err = GatewayError::join(vec![GatewayError::Timeout("publish".into())]).unwrap();
        assert!(matches!(err, GatewayError::Timeout(_)));
    }

    #[test]
    fn test_join_preserves_order_in_message() {
        let err = GatewayError::join(vec![
            GatewayError::Connection("first".into()),
            GatewayError::Connection("second".into()),
        ])
        .unwrap();

        let msg = err.to_string();
        let first = msg.find("first").unwrap();
        let second = msg.find("second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_is_cancellation_looks_through_aggregates() {
        let err = GatewayError::Multiple(vec![
            GatewayError::Connection("down".into()),
            GatewayError::Cancelled("request dropped".into()),
        ]);
        assert!(err.is_cancellation());

        let partial = GatewayError::PartialPublish {
            successful: 1,
            total: 3,
            source: Box::new(err),
        };
        assert!(partial.is_cancellation());

        assert!(!GatewayError::Connection("down".into()).is_cancellation());
    }

    #[test]
    fn test_missing_fingerprint_message() {
        let err = GatewayError::MissingFingerprint {
            alert_name: "DiskUsageHigh".into(),
            status: "firing".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("fingerprint is required"));
        assert!(msg.contains("DiskUsageHigh"));
    }
}
