//! Angel One SmartAPI over HTTP
//!
//! Uses a long-lived reqwest::Client for connection pooling. Every response
//! is the SmartAPI envelope `{status, message, errorcode, data}`.

use super::{BrokerApi, BrokerError, BrokerRequest, LoginResponse, LoginTokens};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

const LOGIN_PATH: &str = "/rest/auth/angelbroking/user/v1/loginByPassword";

/// Error codes SmartAPI uses for invalid, expired or missing tokens.
const TOKEN_ERROR_CODES: [&str; 3] = ["AG8001", "AG8002", "AG8003"];

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errorcode: Option<String>,
    #[serde(default)]
    data: Value,
}

/// Reusable SmartAPI client (connection-pooled)
pub struct SmartApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SmartApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, BrokerError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BrokerError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// HTTP method and route for each operation.
    fn route(request: &BrokerRequest) -> (Method, &'static str) {
        match request {
            BrokerRequest::Profile => (Method::GET, "/rest/secure/angelbroking/user/v1/getProfile"),
            BrokerRequest::Holdings => {
                (Method::GET, "/rest/secure/angelbroking/portfolio/v1/getHolding")
            }
            BrokerRequest::AllHoldings => {
                (Method::GET, "/rest/secure/angelbroking/portfolio/v1/getAllHolding")
            }
            BrokerRequest::Positions => (Method::GET, "/rest/secure/angelbroking/order/v1/getPosition"),
            BrokerRequest::RmsLimit => (Method::GET, "/rest/secure/angelbroking/user/v1/getRMS"),
            BrokerRequest::PlaceOrder(_) => {
                (Method::POST, "/rest/secure/angelbroking/order/v1/placeOrder")
            }
            BrokerRequest::ModifyOrder(_) => {
                (Method::POST, "/rest/secure/angelbroking/order/v1/modifyOrder")
            }
            BrokerRequest::CancelOrder(_) => {
                (Method::POST, "/rest/secure/angelbroking/order/v1/cancelOrder")
            }
            BrokerRequest::OrderBook => (Method::GET, "/rest/secure/angelbroking/order/v1/getOrderBook"),
            BrokerRequest::TradeBook => (Method::GET, "/rest/secure/angelbroking/order/v1/getTradeBook"),
            BrokerRequest::LtpData(_) => (Method::POST, "/rest/secure/angelbroking/order/v1/getLtpData"),
            BrokerRequest::CandleData(_) => {
                (Method::POST, "/rest/secure/angelbroking/historical/v1/getCandleData")
            }
            BrokerRequest::SearchScrip(_) => {
                (Method::POST, "/rest/secure/angelbroking/order/v1/searchScrip")
            }
            BrokerRequest::CreateGttRule(_) => {
                (Method::POST, "/gtt-service/rest/secure/angelbroking/gtt/v1/createRule")
            }
            BrokerRequest::GttList(_) => {
                (Method::POST, "/rest/secure/angelbroking/gtt/v1/ruleList")
            }
            BrokerRequest::OptionGreek(_) => {
                (Method::POST, "/rest/secure/angelbroking/marketData/v1/optionGreek")
            }
            BrokerRequest::GainersLosers(_) => {
                (Method::POST, "/rest/secure/angelbroking/marketData/v1/gainersLosers")
            }
            BrokerRequest::PutCallRatio => {
                (Method::GET, "/rest/secure/angelbroking/marketData/v1/putCallRatio")
            }
            BrokerRequest::ConvertPosition(_) => {
                (Method::POST, "/rest/secure/angelbroking/order/v1/convertPosition")
            }
            BrokerRequest::EstimateCharges(_) => {
                (Method::POST, "/rest/secure/angelbroking/brokerage/v1/estimateCharges")
            }
        }
    }

    fn request_builder(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("X-UserType", "USER")
            .header("X-SourceID", "WEB")
            .header("X-ClientLocalIP", "127.0.0.1")
            .header("X-ClientPublicIP", "127.0.0.1")
            .header("X-MACAddress", "00:00:00:00:00:00")
            .header("X-PrivateKey", &self.api_key)
    }

    async fn read_envelope(
        response: reqwest::Response,
        path: &str,
    ) -> Result<(StatusCode, Envelope), BrokerError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BrokerError::Transport(format!("{}: {}", path, e)))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BrokerError::Unauthorized(format!(
                "{} returned {}",
                path, status
            )));
        }

        let envelope: Envelope = serde_json::from_str(&text).map_err(|e| {
            error!(path, %status, "Unparseable broker response");
            BrokerError::InvalidResponse(format!("{} returned {}: {} ({})", path, status, text, e))
        })?;

        Ok((status, envelope))
    }
}

#[async_trait]
impl BrokerApi for SmartApiClient {
    async fn login(
        &self,
        client_code: &str,
        password: &str,
        totp: &str,
    ) -> Result<LoginResponse, BrokerError> {
        let response = self
            .request_builder(Method::POST, LOGIN_PATH)
            .json(&json!({
                "clientcode": client_code,
                "password": password,
                "totp": totp,
            }))
            .send()
            .await
            .map_err(|e| BrokerError::Transport(format!("login request failed: {}", e)))?;

        let (_, envelope) = Self::read_envelope(response, LOGIN_PATH).await?;

        let data = if envelope.status {
            let tokens: LoginTokens = serde_json::from_value(envelope.data).map_err(|e| {
                BrokerError::InvalidResponse(format!("login response missing tokens: {}", e))
            })?;
            Some(tokens)
        } else {
            None
        };

        Ok(LoginResponse {
            status: envelope.status,
            message: envelope.message,
            data,
        })
    }

    async fn execute(
        &self,
        auth_token: &str,
        request: &BrokerRequest,
    ) -> Result<Value, BrokerError> {
        let (method, path) = Self::route(request);
        debug!(operation = request.operation(), path, "Calling broker API");

        let mut builder = self
            .request_builder(method.clone(), path)
            .bearer_auth(auth_token);
        if method == Method::POST {
            builder = builder.json(&request.params());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BrokerError::Transport(format!("{} request failed: {}", path, e)))?;

        let (status, envelope) = Self::read_envelope(response, path).await?;

        if envelope.status && status.is_success() {
            return Ok(envelope.data);
        }

        let code = envelope.errorcode.unwrap_or_default();
        let message = envelope
            .message
            .unwrap_or_else(|| format!("HTTP {}", status));

        if TOKEN_ERROR_CODES.contains(&code.as_str()) {
            return Err(BrokerError::Unauthorized(format!("[{}] {}", code, message)));
        }

        Err(BrokerError::Rejected { code, message })
    }
}
