//! Broker API capability
//!
//! The gateway talks to the broker only through [`BrokerApi`]. The
//! production implementation is [`SmartApiClient`]; tests plug in stubs.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub mod requests;
pub mod smartapi;

pub use requests::BrokerRequest;
pub use smartapi::SmartApiClient;

/// Failures reported by the broker transport or the broker itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrokerError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("session rejected by broker: {0}")]
    Unauthorized(String),

    #[error("broker rejected request [{code}]: {message}")]
    Rejected { code: String, message: String },

    #[error("invalid broker response: {0}")]
    InvalidResponse(String),
}

impl BrokerError {
    pub fn category(&self) -> &'static str {
        match self {
            BrokerError::Transport(_) => "Transport",
            BrokerError::Unauthorized(_) => "Unauthorized",
            BrokerError::Rejected { .. } => "Rejected",
            BrokerError::InvalidResponse(_) => "InvalidResponse",
        }
    }

    /// True when the broker says our token is no longer accepted.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, BrokerError::Unauthorized(_))
    }
}

/// Tokens returned by a successful login.
#[derive(Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginTokens {
    pub jwt_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub feed_token: Option<String>,
}

impl std::fmt::Debug for LoginTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginTokens")
            .field("jwt_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("feed_token", &self.feed_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Login outcome as reported by the broker (`status == false` is a refusal,
/// not a transport error).
#[derive(Debug, Clone, PartialEq)]
pub struct LoginResponse {
    pub status: bool,
    pub message: Option<String>,
    pub data: Option<LoginTokens>,
}

/// The broker capability consumed by the session layer.
#[async_trait]
pub trait BrokerApi: Send + Sync {
    /// Request a new session with a one-time code.
    async fn login(
        &self,
        client_code: &str,
        password: &str,
        totp: &str,
    ) -> Result<LoginResponse, BrokerError>;

    /// Run one broker operation with a raw (non-Bearer) session token.
    async fn execute(&self, auth_token: &str, request: &BrokerRequest)
        -> Result<Value, BrokerError>;
}
