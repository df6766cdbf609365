//! Reasoning-service boundary: provider abstraction over a tool-calling LLM.
//!
//! The orchestrator talks to `ReasoningClient` only. `GeminiClient` is the
//! production provider; `ScriptedClient` replays canned replies for tests and
//! local runs without an API key.

pub mod gemini;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use gemini::GeminiClient;

/// A named capability the model wants us to run, with its JSON arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Declaration of a tool the model may call (JSON-schema-ish parameters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One conversation turn. History is owned by a single pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    User(String),
    ToolCall(ToolInvocation),
    ToolResponse { name: String, response: Value },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceReply {
    pub tool_invocations: Vec<ToolInvocation>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("reasoning service unavailable: {0}")]
pub struct ServiceUnavailable(pub String);

/// Everything sent on one round trip.
#[derive(Debug, Clone, Copy)]
pub struct ConverseRequest<'a> {
    pub system_instruction: &'a str,
    pub history: &'a [Turn],
    pub tools: &'a [ToolSchema],
}

#[async_trait::async_trait]
pub trait ReasoningClient: Send + Sync {
    /// One request/response exchange. No retries.
    async fn converse(&self, req: ConverseRequest<'_>) -> Result<ServiceReply, ServiceUnavailable>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynReasoningClient = Arc<dyn ReasoningClient>;

/// Replays queued replies in order and records the history it was sent.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<ServiceReply, ServiceUnavailable>>>,
    seen: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, reply: ServiceReply) -> &Self {
        lock(&self.replies).push_back(Ok(reply));
        self
    }

    pub fn push_error(&self, message: &str) -> &Self {
        lock(&self.replies).push_back(Err(ServiceUnavailable(message.to_string())));
        self
    }

    /// Queue a single tool call.
    pub fn push_call(&self, name: &str, arguments: Value) -> &Self {
        self.push_reply(ServiceReply {
            tool_invocations: vec![ToolInvocation {
                name: name.to_string(),
                arguments,
            }],
            text: None,
        })
    }

    /// Histories received so far, one per `converse` call.
    pub fn seen(&self) -> Vec<Vec<Turn>> {
        lock(&self.seen).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }
}

#[async_trait::async_trait]
impl ReasoningClient for ScriptedClient {
    async fn converse(&self, req: ConverseRequest<'_>) -> Result<ServiceReply, ServiceUnavailable> {
        lock(&self.seen).push(req.history.to_vec());
        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Err(ServiceUnavailable("script exhausted".to_string())))
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
