//! Tool descriptors and registry
//!
//! Every broker call made on the model's behalf goes through
//! [`ToolRegistry::dispatch`]: lookup, argument validation, safety checks,
//! then the authenticated broker call. Failures never escape as errors; they
//! come back as a failed [`ToolCallResult`].

use crate::broker::BrokerRequest;
use crate::error::GatewayError;
use crate::llm::FunctionDeclaration;
use crate::models::{ToolCallRequest, ToolCallResult};
use crate::safety::{GuardOutcome, SafetyGuard};
use crate::schema;
use crate::session::BrokerSession;
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub mod catalog;

/// Converts untyped model arguments into a typed broker request.
pub type RequestHandler = fn(&Value) -> Result<BrokerRequest>;

/// Static catalog entry for one tool.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub argument_schema: Value,
    pub handler: RequestHandler,
    pub is_mutating: bool,
}

impl ToolDescriptor {
    /// The declaration handed to the model, with a sanitized schema.
    pub fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: schema::sanitize(&self.argument_schema),
        }
    }
}

/// Tool registry for looking up and dispatching tools
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    session: Arc<BrokerSession>,
    guard: SafetyGuard,
}

impl ToolRegistry {
    /// Registry over the full broker catalog.
    pub fn new(session: Arc<BrokerSession>, guard: SafetyGuard) -> Self {
        Self::with_tools(catalog::broker_tools(), session, guard)
    }

    pub fn with_tools(
        tools: Vec<ToolDescriptor>,
        session: Arc<BrokerSession>,
        guard: SafetyGuard,
    ) -> Self {
        Self {
            tools,
            session,
            guard,
        }
    }

    /// Insertion order.
    pub fn list_tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.tools.iter().map(ToolDescriptor::declaration).collect()
    }

    pub fn guard(&self) -> &SafetyGuard {
        &self.guard
    }

    pub fn session(&self) -> &Arc<BrokerSession> {
        &self.session
    }

    pub async fn dispatch(&self, request: &ToolCallRequest) -> ToolCallResult {
        let start = Instant::now();
        debug!(tool_name = %request.tool_name, arguments = %request.arguments, "Dispatching tool call");

        let outcome = self.run(request).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(raw_result) => {
                info!(
                    tool_name = %request.tool_name,
                    succeeded = true,
                    elapsed_ms,
                    "Tool call completed"
                );
                ToolCallResult::success(request, raw_result, elapsed_ms)
            }
            Err(e) => {
                warn!(
                    tool_name = %request.tool_name,
                    succeeded = false,
                    elapsed_ms,
                    error = %e,
                    "Tool call failed"
                );
                ToolCallResult::failure(request, &e, elapsed_ms)
            }
        }
    }

    /// Guard checks come before authentication: a blocked or dry-run call
    /// makes no broker network calls at all, login included.
    async fn run(&self, request: &ToolCallRequest) -> Result<String> {
        let descriptor = self
            .get(&request.tool_name)
            .ok_or_else(|| GatewayError::UnknownTool(request.tool_name.clone()))?;

        let broker_request = (descriptor.handler)(&request.arguments)?;

        if descriptor.is_mutating {
            if let GuardOutcome::DryRun(message) = self.guard.check(&broker_request)? {
                info!(tool_name = descriptor.name, "Dry run; broker call skipped");
                return Ok(message);
            }
        }

        let data = self.session.execute(&broker_request).await?;
        Ok(broker_request.render_result(&data))
    }
}
