//! Stub broker and scripted model shared by the unit tests.

use crate::broker::{BrokerApi, BrokerError, BrokerRequest, LoginResponse, LoginTokens};
use crate::error::GatewayError;
use crate::llm::{CompletionModel, CompletionRequest, ModelResponse};
use crate::session::{CredentialVault, Credentials};
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// RFC 6238 test seed ("12345678901234567890").
pub(crate) const TEST_TOTP_SEED: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

pub(crate) fn test_credentials() -> Credentials {
    Credentials {
        api_key: "test-api-key".to_string(),
        client_code: "C123".to_string(),
        password: "1234".to_string(),
        totp_seed: TEST_TOTP_SEED.to_string(),
    }
}

pub(crate) fn test_vault() -> CredentialVault {
    CredentialVault::new(test_credentials()).unwrap()
}

/// In-memory `BrokerApi` that records every call.
pub(crate) struct StubBroker {
    login_calls: AtomicUsize,
    refuse_login: Option<String>,
    unauthorized_remaining: AtomicUsize,
    responses: HashMap<&'static str, Value>,
    failures: Mutex<HashMap<&'static str, BrokerError>>,
    executed: Mutex<Vec<(String, BrokerRequest)>>,
}

impl StubBroker {
    pub(crate) fn new() -> Self {
        let mut responses = HashMap::new();
        responses.insert(
            "search_scrip",
            json!([{"exchange": "NSE", "tradingsymbol": "RELIANCE-EQ", "symboltoken": "2885"}]),
        );
        responses.insert(
            "get_ltp_data",
            json!({
                "exchange": "NSE",
                "tradingsymbol": "RELIANCE-EQ",
                "symboltoken": "2885",
                "ltp": 1234.5
            }),
        );
        responses.insert("place_order", json!({"orderid": "ORD-1"}));

        Self {
            login_calls: AtomicUsize::new(0),
            refuse_login: None,
            unauthorized_remaining: AtomicUsize::new(0),
            responses,
            failures: Mutex::new(HashMap::new()),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn refusing_login(mut self, message: &str) -> Self {
        self.refuse_login = Some(message.to_string());
        self
    }

    /// The next broker operation fails with `Unauthorized`.
    pub(crate) fn unauthorized_once(self) -> Self {
        self.unauthorized_remaining.store(1, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_response(mut self, operation: &'static str, data: Value) -> Self {
        self.responses.insert(operation, data);
        self
    }

    pub(crate) fn failing(self, operation: &'static str, error: BrokerError) -> Self {
        self.failures.lock().unwrap().insert(operation, error);
        self
    }

    pub(crate) fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn execute_calls(&self) -> usize {
        self.executed.lock().unwrap().len()
    }

    /// Operation names in call order.
    pub(crate) fn executed_operations(&self) -> Vec<&'static str> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(_, request)| request.operation())
            .collect()
    }

    pub(crate) fn tokens_used(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(token, _)| token.clone())
            .collect()
    }

    /// Total network interactions: logins plus operations.
    pub(crate) fn network_calls(&self) -> usize {
        self.login_calls() + self.execute_calls()
    }
}

#[async_trait]
impl BrokerApi for StubBroker {
    async fn login(
        &self,
        _client_code: &str,
        _password: &str,
        _totp: &str,
    ) -> std::result::Result<LoginResponse, BrokerError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.refuse_login {
            return Ok(LoginResponse {
                status: false,
                message: Some(message.clone()),
                data: None,
            });
        }

        Ok(LoginResponse {
            status: true,
            message: Some("SUCCESS".to_string()),
            data: Some(LoginTokens {
                jwt_token: "Bearer raw-jwt".to_string(),
                refresh_token: "refresh-token".to_string(),
                feed_token: Some("feed-token".to_string()),
            }),
        })
    }

    async fn execute(
        &self,
        auth_token: &str,
        request: &BrokerRequest,
    ) -> std::result::Result<Value, BrokerError> {
        self.executed
            .lock()
            .unwrap()
            .push((auth_token.to_string(), request.clone()));

        if self
            .unauthorized_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BrokerError::Unauthorized("AG8001: Invalid Token".to_string()));
        }

        if let Some(error) = self.failures.lock().unwrap().get(request.operation()) {
            return Err(error.clone());
        }

        Ok(self
            .responses
            .get(request.operation())
            .cloned()
            .unwrap_or_else(|| json!({"ok": true})))
    }
}

/// `CompletionModel` that replays a script and records every request.
pub(crate) struct ScriptedModel {
    script: Mutex<VecDeque<Result<ModelResponse>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub(crate) fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn then_error(self, message: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(GatewayError::LlmError(message.to_string())));
        self
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ModelResponse::from_text("Noted.")))
    }
}
