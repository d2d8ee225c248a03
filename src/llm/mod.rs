//! Model completion capability
//!
//! The orchestrator only needs "prompt (+ tool declarations) in, text and/or
//! tool calls out". `GeminiClient` is the production backend.

use crate::models::ToolCallRequest;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod gemini;
pub use gemini::GeminiClient;

/// A tool as declared to the model (parameters already sanitized).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub prompt: String,
    pub tools: Vec<FunctionDeclaration>,
}

impl CompletionRequest {
    pub fn text_only(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            tools: Vec::new(),
        }
    }

    pub fn with_tools(prompt: impl Into<String>, tools: Vec<FunctionDeclaration>) -> Self {
        Self {
            prompt: prompt.into(),
            tools,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelPart {
    Text(String),
    ToolCall(ToolCallRequest),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub parts: Vec<ModelPart>,
}

impl ModelResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ModelPart::Text(text.into())],
        }
    }

    /// All non-empty text parts joined by newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ModelPart::Text(text) if !text.trim().is_empty() => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_tool_calls(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, ModelPart::ToolCall(_)))
    }
}

/// Trait for the model backend
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelResponse>;
}
