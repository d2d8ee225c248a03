//! Core data models for the gateway

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::error::GatewayError;

/// Hint attached to broker operation failures.
pub const REMEDIATION_HINT: &str =
    "Check parameters and try again. Verify market hours for trading operations.";

//
// ================= Tool I/O =================
//

/// A tool invocation as requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Structured reason a tool call did not produce a broker result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub operation: String,
    pub category: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ErrorDetail {
    pub fn from_error(operation: &str, error: &GatewayError) -> Self {
        let (category, message, suggestion) = match error {
            GatewayError::BrokerOperationError {
                category, message, ..
            } => (
                category.clone(),
                message.clone(),
                Some(REMEDIATION_HINT.to_string()),
            ),
            GatewayError::AuthError(m)
            | GatewayError::SafetyViolation(m)
            | GatewayError::InvalidToolInput(m)
            | GatewayError::LlmError(m)
            | GatewayError::ConfigError(m) => (error.category().to_string(), m.clone(), None),
            GatewayError::UnknownTool(name) => (
                error.category().to_string(),
                format!("Tool '{}' is not available", name),
                None,
            ),
            other => (other.category().to_string(), other.to_string(), None),
        };

        Self {
            operation: operation.to_string(),
            category,
            message,
            suggestion,
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error in {} [{}]: {}",
            self.operation, self.category, self.message
        )?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Outcome of one dispatched tool call; lives for a single turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_name: String,
    pub arguments: Value,
    pub raw_result: String,
    pub succeeded: bool,
    pub error_detail: Option<ErrorDetail>,
    pub execution_time_ms: u64,
}

impl ToolCallResult {
    pub fn success(request: &ToolCallRequest, raw_result: String, execution_time_ms: u64) -> Self {
        Self {
            tool_name: request.tool_name.clone(),
            arguments: request.arguments.clone(),
            raw_result,
            succeeded: true,
            error_detail: None,
            execution_time_ms,
        }
    }

    pub fn failure(request: &ToolCallRequest, error: &GatewayError, execution_time_ms: u64) -> Self {
        let detail = ErrorDetail::from_error(&request.tool_name, error);
        Self {
            tool_name: request.tool_name.clone(),
            arguments: request.arguments.clone(),
            raw_result: detail.to_string(),
            succeeded: false,
            error_detail: Some(detail),
            execution_time_ms,
        }
    }
}

//
// ================= Chaining =================
//

/// Whether a finished call needs a dependent follow-up call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainDecision {
    pub should_chain: bool,
    pub follow_up_tool_name: Option<String>,
    pub follow_up_arguments: Option<Value>,
}

impl ChainDecision {
    pub fn no_chain() -> Self {
        Self {
            should_chain: false,
            follow_up_tool_name: None,
            follow_up_arguments: None,
        }
    }

    pub fn chain(tool_name: &str, arguments: Value) -> Self {
        Self {
            should_chain: true,
            follow_up_tool_name: Some(tool_name.to_string()),
            follow_up_arguments: Some(arguments),
        }
    }

    pub fn follow_up(&self) -> Option<ToolCallRequest> {
        if !self.should_chain {
            return None;
        }
        let name = self.follow_up_tool_name.as_ref()?;
        Some(ToolCallRequest::new(
            name.clone(),
            self.follow_up_arguments.clone().unwrap_or(Value::Null),
        ))
    }
}

//
// ================= Turn =================
//

/// Everything one user query produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResponse {
    pub turn_id: Uuid,
    pub query: String,
    pub text: String,
    pub tool_results: Vec<ToolCallResult>,
    pub reasoning_trace: Vec<String>,
    pub created_at: DateTime<Utc>,
}
