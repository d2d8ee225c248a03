//! Gemini API client
//!
//! Supports function calling: tool declarations go out in `tools`, and
//! `functionCall` parts come back as tool-call requests.
//! Uses a long-lived reqwest::Client for connection pooling.

use super::{CompletionModel, CompletionRequest, FunctionDeclaration, ModelPart, ModelResponse};
use crate::config::AiConfig;
use crate::error::GatewayError;
use crate::models::ToolCallRequest;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(config: &AiConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn build_request<'a>(&self, request: &'a CompletionRequest) -> GeminiRequest<'a> {
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(vec![ToolGroup {
                function_declarations: &request.tools,
            }])
        };

        GeminiRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![TextPart {
                    text: request.prompt.clone(),
                }],
            }],
            tools,
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }
}

#[async_trait]
impl CompletionModel for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelResponse> {
        if self.api_key.is_empty() {
            return Err(GatewayError::LlmError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let body = self.build_request(request);

        info!(
            model = %self.model,
            tool_count = request.tools.len(),
            "Calling Gemini API"
        );

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                GatewayError::LlmError(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(GatewayError::LlmError(format!(
                "Gemini API error ({}): {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            GatewayError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        let parts = convert_parts(gemini_response);
        info!(part_count = parts.len(), "Gemini response received");

        Ok(ModelResponse { parts })
    }
}

/// First candidate's parts, in the order the model emitted them.
fn convert_parts(response: GeminiResponse) -> Vec<ModelPart> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Vec::new();
    };
    let Some(content) = candidate.content else {
        return Vec::new();
    };

    content
        .parts
        .into_iter()
        .filter_map(|part| {
            if let Some(call) = part.function_call {
                return Some(ModelPart::ToolCall(ToolCallRequest::new(call.name, call.args)));
            }
            part.text
                .filter(|text| !text.is_empty())
                .map(ModelPart::Text)
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolGroup<'a>>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct ToolGroup<'a> {
    function_declarations: &'a [FunctionDeclaration],
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "functionCall", alias = "function_call")]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiProvider;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn config(base_url: &str) -> AiConfig {
        AiConfig {
            provider: AiProvider::Gemini,
            model: "gemini-test".to_string(),
            api_key: "test-key".to_string(),
            base_url: base_url.to_string(),
            max_tokens: 256,
            temperature: 0.1,
        }
    }

    fn declaration() -> FunctionDeclaration {
        FunctionDeclaration {
            name: "get_holdings".to_string(),
            description: "Get user's stock holdings".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    #[test]
    fn test_request_serialization() {
        let client = GeminiClient::new(&config("http://localhost")).unwrap();
        let request = CompletionRequest::with_tools("Show my holdings", vec![declaration()]);
        let json = serde_json::to_value(client.build_request(&request)).unwrap();

        assert_eq!(json["contents"][0]["parts"][0]["text"], "Show my holdings");
        assert_eq!(
            json["tools"][0]["function_declarations"][0]["name"],
            "get_holdings"
        );
        assert_eq!(json["generation_config"]["max_output_tokens"], 256);

        let text_only = serde_json::to_value(
            client.build_request(&CompletionRequest::text_only("Explain")),
        )
        .unwrap();
        assert!(text_only.get("tools").is_none());
    }

    #[tokio::test]
    async fn test_complete_parses_text_and_function_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [
                            {"text": "Let me check."},
                            {"functionCall": {"name": "search_scrip", "args": {"exchange": "NSE", "searchscrip": "TCS"}}}
                        ]
                    },
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri())).unwrap();
        let response = client
            .complete(&CompletionRequest::with_tools("price of TCS", vec![declaration()]))
            .await
            .unwrap();

        assert_eq!(
            response.parts,
            vec![
                ModelPart::Text("Let me check.".into()),
                ModelPart::ToolCall(ToolCallRequest::new(
                    "search_scrip",
                    json!({"exchange": "NSE", "searchscrip": "TCS"})
                )),
            ]
        );

        let received: Vec<Request> = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["tools"][0]["function_declarations"][0]["name"], "get_holdings");
    }

    #[tokio::test]
    async fn test_empty_candidates_yield_no_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri())).unwrap();
        let response = client
            .complete(&CompletionRequest::text_only("hello"))
            .await
            .unwrap();
        assert!(response.parts.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_llm_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri())).unwrap();
        let err = client
            .complete(&CompletionRequest::text_only("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::LlmError(ref m) if m.contains("quota exhausted")));
    }
}
