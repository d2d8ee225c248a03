//! Error types for the broker tool gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {

    // =============================
    // Startup
    // =============================

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // Broker session & tool dispatch
    // =============================

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Safety violation: {0}")]
    SafetyViolation(String),

    #[error("Broker operation {operation} failed ({category}): {message}")]
    BrokerOperationError {
        operation: String,
        category: String,
        message: String,
    },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    // =============================
    // Model backend
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl GatewayError {
    /// Only configuration problems abort the process; everything else is
    /// reported inside a turn.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::ConfigError(_))
    }

    /// Short category name used in structured tool error details.
    pub fn category(&self) -> &'static str {
        match self {
            GatewayError::ConfigError(_) => "ConfigError",
            GatewayError::AuthError(_) => "AuthError",
            GatewayError::SafetyViolation(_) => "SafetyViolation",
            GatewayError::BrokerOperationError { .. } => "BrokerOperationError",
            GatewayError::UnknownTool(_) => "UnknownToolError",
            GatewayError::InvalidToolInput(_) => "InvalidToolInput",
            GatewayError::LlmError(_) => "LlmError",
            GatewayError::SerializationError(_) => "SerializationError",
            GatewayError::HttpError(_) => "HttpError",
            GatewayError::IoError(_) => "IoError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_config_errors_are_fatal() {
        assert!(GatewayError::ConfigError("missing".into()).is_fatal());
        assert!(!GatewayError::AuthError("bad totp".into()).is_fatal());
        assert!(!GatewayError::UnknownTool("x".into()).is_fatal());
    }

    #[test]
    fn broker_error_display_names_operation() {
        let err = GatewayError::BrokerOperationError {
            operation: "place_order".into(),
            category: "Rejected".into(),
            message: "Invalid symbol".into(),
        };
        assert_eq!(
            err.to_string(),
            "Broker operation place_order failed (Rejected): Invalid symbol"
        );
        assert_eq!(err.category(), "BrokerOperationError");
    }
}
