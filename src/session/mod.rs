//! Authenticated broker session
//!
//! One `BrokerSession` is shared by everything that dispatches tools. Its
//! state sits behind a tokio mutex: login and invalidation are
//! read-modify-write operations and the login holds the lock, so at most one
//! login is ever in flight.

use crate::broker::{BrokerApi, BrokerRequest};
use crate::error::GatewayError;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub mod credentials;

pub use credentials::{CredentialVault, Credentials};

const BEARER_PREFIX: &str = "Bearer ";

/// Token state for the single broker session.
#[derive(Clone, Default, PartialEq)]
pub struct SessionState {
    pub auth_token: Option<String>,
    pub refresh_token: Option<String>,
    pub feed_token: Option<String>,
    pub authenticated_at: Option<DateTime<Utc>>,
    pub is_valid: bool,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |t: &Option<String>| t.as_ref().map(|_| "<redacted>");
        f.debug_struct("SessionState")
            .field("auth_token", &redact(&self.auth_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("feed_token", &redact(&self.feed_token))
            .field("authenticated_at", &self.authenticated_at)
            .field("is_valid", &self.is_valid)
            .finish()
    }
}

/// The broker hands back `Bearer <jwt>`; authenticated calls want the raw jwt.
pub fn normalize_token(token: &str) -> String {
    token
        .strip_prefix(BEARER_PREFIX)
        .unwrap_or(token)
        .trim()
        .to_string()
}

pub struct BrokerSession {
    vault: CredentialVault,
    broker: Arc<dyn BrokerApi>,
    state: Mutex<SessionState>,
    max_age: Option<Duration>,
}

impl BrokerSession {
    pub fn new(vault: CredentialVault, broker: Arc<dyn BrokerApi>) -> Self {
        Self {
            vault,
            broker,
            state: Mutex::new(SessionState::default()),
            max_age: None,
        }
    }

    /// Force a fresh login once a session is older than `max_age`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Idempotent: a no-op while the session is valid, a full login otherwise.
    pub async fn ensure_authenticated(&self) -> Result<()> {
        self.authenticated_token().await.map(|_| ())
    }

    /// Run one broker operation behind the session.
    ///
    /// An authentication failure reported by the broker invalidates the
    /// session so the next call logs in again. Nothing is retried here.
    pub async fn execute(&self, request: &BrokerRequest) -> Result<Value> {
        let token = self.authenticated_token().await?;

        match self.broker.execute(&token, request).await {
            Ok(data) => Ok(data),
            Err(e) => {
                if e.is_auth_failure() {
                    warn!(
                        operation = request.operation(),
                        "Broker rejected session token; invalidating session"
                    );
                    self.invalidate().await;
                }
                Err(GatewayError::BrokerOperationError {
                    operation: request.operation().to_string(),
                    category: e.category().to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.is_valid = false;
    }

    pub async fn is_valid(&self) -> bool {
        self.state.lock().await.is_valid
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    fn is_expired(&self, state: &SessionState) -> bool {
        match (self.max_age, state.authenticated_at) {
            (Some(max_age), Some(at)) => Utc::now() - at >= max_age,
            _ => false,
        }
    }

    async fn authenticated_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;

        if state.is_valid && !self.is_expired(&state) {
            if let Some(token) = &state.auth_token {
                return Ok(token.clone());
            }
        }

        if state.is_valid {
            info!("Broker session exceeded its maximum age; re-authenticating");
        }
        *state = SessionState::default();

        let code = self.vault.current_code()?;

        let response = self
            .broker
            .login(self.vault.client_code(), self.vault.password(), &code)
            .await
            .map_err(|e| {
                error!(error = %e, "Broker login transport failure");
                GatewayError::AuthError(format!("Authentication error: {}", e))
            })?;

        if !response.status {
            let reason = response
                .message
                .unwrap_or_else(|| "Unknown error".to_string());
            error!(reason = %reason, "Broker login refused");
            return Err(GatewayError::AuthError(format!(
                "Authentication failed: {}",
                reason
            )));
        }

        let tokens = response.data.ok_or_else(|| {
            GatewayError::AuthError("Authentication succeeded without session tokens".to_string())
        })?;

        let auth_token = normalize_token(&tokens.jwt_token);
        *state = SessionState {
            auth_token: Some(auth_token.clone()),
            refresh_token: Some(tokens.refresh_token),
            feed_token: tokens.feed_token,
            authenticated_at: Some(Utc::now()),
            is_valid: true,
        };

        info!(
            client_code = self.vault.client_code(),
            "Successfully authenticated with broker API"
        );

        Ok(auth_token)
    }
}
