//! Main orchestrator - runs one user query to completion
//!
//! QUERY → MODEL → (text → DONE) | (tool call → DISPATCH → CHAIN CHECK →
//! [FOLLOW-UP] → NARRATE) → DONE
//!
//! Nothing is carried between queries except the shared broker session.
//! Every failure becomes a `❌` line in the turn's text.

use crate::broker::requests::compact_json;
use crate::broker::SmartApiClient;
use crate::chain::ChainDetector;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::llm::{CompletionModel, CompletionRequest, GeminiClient, ModelPart};
use crate::models::{ToolCallRequest, ToolCallResult, TurnResponse};
use crate::safety::SafetyGuard;
use crate::session::{BrokerSession, CredentialVault};
use crate::tools::ToolRegistry;
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub mod prompts;

pub const NO_RESPONSE_TEXT: &str = "🤔 No response generated from AI model";

/// Output buffer and trace for a single turn.
struct Turn<'q> {
    query: &'q str,
    lines: Vec<String>,
    tool_results: Vec<ToolCallResult>,
    reasoning_trace: Vec<String>,
}

impl<'q> Turn<'q> {
    fn new(query: &'q str) -> Self {
        Self {
            query,
            lines: Vec::new(),
            tool_results: Vec::new(),
            reasoning_trace: vec!["INPUT: Query received".to_string()],
        }
    }

    fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    fn push_error(&mut self, message: String) {
        self.lines.push(format!("❌ {}", message));
    }

    fn trace(&mut self, step: String) {
        self.reasoning_trace.push(step);
    }

    fn record_execution(&mut self, marker: &str, result: &ToolCallResult) {
        self.push(format!("\n🔧 **{}**: {}", marker, result.tool_name));
        self.push(format!(
            "📋 **Parameters**: {}",
            compact_json(&result.arguments)
        ));
    }

    fn finish(mut self) -> TurnResponse {
        if self.lines.iter().all(|line| line.trim().is_empty()) {
            self.lines.push(NO_RESPONSE_TEXT.to_string());
        }
        self.reasoning_trace.push("DONE".to_string());

        TurnResponse {
            turn_id: Uuid::new_v4(),
            query: self.query.to_string(),
            text: self.lines.join("\n"),
            tool_results: self.tool_results,
            reasoning_trace: self.reasoning_trace,
            created_at: Utc::now(),
        }
    }
}

/// Main orchestrator that coordinates model, tools and chaining
pub struct Orchestrator {
    model: Arc<dyn CompletionModel>,
    registry: Arc<ToolRegistry>,
    chain_detector: ChainDetector,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn CompletionModel>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            registry,
            chain_detector: ChainDetector::new(),
        }
    }

    /// Wire the SmartAPI broker client and the Gemini model from configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let vault = CredentialVault::new(config.broker.credentials.clone())?;
        let broker = SmartApiClient::new(&config.broker.base_url, vault.api_key())
            .map_err(|e| GatewayError::ConfigError(e.to_string()))?;

        let mut session = BrokerSession::new(vault, Arc::new(broker));
        if let Some(minutes) = config.broker.session_max_age_minutes {
            session = session.with_max_age(chrono::Duration::minutes(i64::from(minutes)));
        }

        let registry = ToolRegistry::new(Arc::new(session), SafetyGuard::new(config.trading));
        let model = GeminiClient::new(&config.ai)?;

        Ok(Self::new(Arc::new(model), Arc::new(registry)))
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run one query. Always returns text; failures are reported inline.
    pub async fn run(&self, query: &str) -> TurnResponse {
        let mut turn = Turn::new(query);
        info!(query = %query, "Orchestrator: processing query");

        let declarations = self.registry.declarations();
        turn.trace(format!(
            "MODEL: Requesting completion with {} tool declarations",
            declarations.len()
        ));

        let request = CompletionRequest::with_tools(prompts::compose_prompt(query), declarations);
        let response = match self.model.complete(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Model completion failed");
                turn.trace("MODEL: Completion failed".to_string());
                turn.push_error(format!("Error processing query: {}", e));
                return turn.finish();
            }
        };

        if !response.has_tool_calls() {
            turn.trace("MODEL: Plain text answer".to_string());
        }

        for part in response.parts {
            match part {
                ModelPart::Text(text) => {
                    if !text.trim().is_empty() {
                        turn.push(text);
                    }
                }
                ModelPart::ToolCall(call) => self.handle_tool_call(&mut turn, call).await,
            }
        }

        let turn = turn.finish();
        info!(
            turn_id = %turn.turn_id,
            tool_calls = turn.tool_results.len(),
            "Orchestrator: query complete"
        );
        turn
    }

    async fn handle_tool_call(&self, turn: &mut Turn<'_>, call: ToolCallRequest) {
        turn.trace(format!("DISPATCH: {}", call.tool_name));
        let result = self.registry.dispatch(&call).await;
        turn.tool_results.push(result.clone());

        if !result.succeeded {
            turn.trace(format!("DISPATCH: {} failed", result.tool_name));
            turn.push_error(format!("Tool execution failed: {}", result.raw_result));
            return;
        }

        turn.record_execution("Tool Executed", &result);

        let decision = self.chain_detector.detect(&result, turn.query);
        if let Some(follow_up) = decision.follow_up() {
            turn.trace(format!("CHAIN: Following up with {}", follow_up.tool_name));
            let chained = self.registry.dispatch(&follow_up).await;
            turn.tool_results.push(chained.clone());

            if chained.succeeded {
                turn.record_execution("Auto-executed", &chained);
                self.narrate_both(turn, &result, &chained).await;
                return;
            }

            warn!(
                tool_name = %chained.tool_name,
                "Chained call failed; narrating the first result alone"
            );
            turn.trace(format!("CHAIN: {} failed", chained.tool_name));
            turn.push_error(format!(
                "Auto-executed {} failed: {}",
                chained.tool_name, chained.raw_result
            ));
        } else {
            turn.trace("CHAIN: No follow-up".to_string());
        }

        self.narrate(turn, &result).await;
    }

    async fn narrate(&self, turn: &mut Turn<'_>, result: &ToolCallResult) {
        turn.trace(format!("NARRATE: {}", result.tool_name));
        let prompt = prompts::narration_prompt(result, turn.query);
        self.append_narration(turn, prompt, "Analysis").await;
    }

    async fn narrate_both(
        &self,
        turn: &mut Turn<'_>,
        primary: &ToolCallResult,
        follow_up: &ToolCallResult,
    ) {
        turn.trace(format!(
            "NARRATE: {} + {}",
            primary.tool_name, follow_up.tool_name
        ));
        let prompt = prompts::comprehensive_narration_prompt(primary, follow_up, turn.query);
        self.append_narration(turn, prompt, "Complete Analysis").await;
    }

    async fn append_narration(&self, turn: &mut Turn<'_>, prompt: String, label: &str) {
        debug!(label, "Requesting narration");
        match self.model.complete(&CompletionRequest::text_only(prompt)).await {
            Ok(response) => {
                let text = response.text();
                if !text.is_empty() {
                    turn.push(format!("\n📊 **{}**: {}", label, text));
                }
            }
            Err(e) => {
                error!(error = %e, "Narration failed");
                turn.push_error(format!("Narration failed: {}", e));
            }
        }
    }
}
