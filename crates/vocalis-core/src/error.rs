use thiserror::Error;

/// Top-level error type for the Vocalis system.
///
/// These are failures of the engine's own plumbing. Failures reported by the
/// platform layer or the recognition worker are data and travel as
/// [`crate::types::ErrorEnvelope`] instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VocalisError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown event topic: {0}")]
    UnknownTopic(String),

    #[error("Malformed payload for {topic}: {reason}")]
    Payload { topic: String, reason: String },

    #[error("Command rejected: {0}")]
    Command(String),

    #[error("Host error: {0}")]
    Host(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for VocalisError {
    fn from(err: toml::de::Error) -> Self {
        VocalisError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VocalisError {
    fn from(err: toml::ser::Error) -> Self {
        VocalisError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VocalisError {
    fn from(err: serde_json::Error) -> Self {
        VocalisError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Vocalis operations.
pub type Result<T> = std::result::Result<T, VocalisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VocalisError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_payload_error_display() {
        let err = VocalisError::Payload {
            topic: "model-status".into(),
            reason: "missing field `status`".into(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed payload for model-status: missing field `status`"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: VocalisError = io_err.into();
        assert!(matches!(err, VocalisError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let converted: VocalisError = err.unwrap_err().into();
        assert!(matches!(converted, VocalisError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let converted: VocalisError = err.unwrap_err().into();
        assert!(matches!(converted, VocalisError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(format!("got {}", value))
        }

        assert_eq!(inner().unwrap(), "got 42");
    }
}
