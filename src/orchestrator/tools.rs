// src/orchestrator/tools.rs
//! Tool declarations, prompts, and the boundary check that maps a dynamic
//! model reply onto one of the two calls we accept.

use serde::Deserialize;
use serde_json::{json, Value};

use super::PipelineError;
use crate::reasoning::{ServiceReply, ToolInvocation, ToolSchema};

pub const FETCH_TOOL: &str = "fetch_news";
pub const PUBLISH_TOOL: &str = "post_message";

pub const SYSTEM_INSTRUCTION: &str = "You are a news processing pipeline. Your workflow is as follows:

1. Call the 'fetch_news' tool to get the latest news.
2. Analyze the news you receive. For each article, write:
   - A short summary.
   - A \"Keywords:\" line with 3-5 keywords.
   - A \"Sentiment:\" line with ONLY one of these exact words: 'Positive', 'Negative', or 'Neutral'. Do not add emojis.
3. Format all the analyzed articles into a single Markdown string.
   - The format for each article MUST be:
     *<https://example.com/news1|News title 1>*
     Summary: A summary of the first article.
     Keywords: AI, technology, innovation
     Sentiment: Positive
   - After each article, add a separator of a newline, three dashes, and another newline:
     ---
4. You MUST call the 'post_message' tool. Its 'message' parameter MUST be the Markdown string you just created.

Your final response MUST be a call to the 'post_message' tool. Do not respond with text.";

pub const USER_PROMPT: &str =
    "Fetch the latest top news items, analyze them, and post the digest to the channel.";

pub fn tool_schemas() -> Vec<ToolSchema> {
    vec![
        ToolSchema {
            name: FETCH_TOOL.to_string(),
            description: "Fetches the latest news items from the configured feeds as JSON."
                .to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "category": {
                        "type": "STRING",
                        "description": "News category to fetch. Always 'topic'."
                    },
                    "limit": {
                        "type": "INTEGER",
                        "description": "Number of items per feed. Always 5."
                    }
                }
            }),
        },
        ToolSchema {
            name: PUBLISH_TOOL.to_string(),
            description: "Posts a formatted text message to the team channel.".to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "message": {
                        "type": "STRING",
                        "description": "The formatted message body to post."
                    }
                },
                "required": ["message"]
            }),
        },
    ]
}

/// Hints declared on the fetch call. Logged only; the persisted source list
/// decides what is fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FetchRequest {
    pub category: Option<String>,
    pub limit: Option<u32>,
}

impl FetchRequest {
    fn from_arguments(args: &Value) -> Self {
        serde_json::from_value(args.clone()).unwrap_or_default()
    }
}

/// The closed set of calls the pipeline understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Fetch(FetchRequest),
    Publish { message: String },
}

fn describe(reply: &ServiceReply) -> String {
    match reply.tool_invocations.as_slice() {
        [] => match reply.text.as_deref() {
            Some(text) => format!("plain text instead of a tool call ({} chars)", text.chars().count()),
            None => "no tool call".to_string(),
        },
        [one] => format!("a call to '{}'", one.name),
        many => format!("{} tool calls", many.len()),
    }
}

/// Exactly one invocation, and it names `expected`.
fn sole_invocation<'a>(
    reply: &'a ServiceReply,
    expected: &'static str,
) -> Result<&'a ToolInvocation, PipelineError> {
    match reply.tool_invocations.as_slice() {
        [one] if one.name == expected => Ok(one),
        _ => Err(PipelineError::UnexpectedToolCall {
            expected,
            found: describe(reply),
        }),
    }
}

/// Map a single invocation onto `ToolCall`, validating the publish argument.
pub fn classify(invocation: &ToolInvocation) -> Result<ToolCall, PipelineError> {
    match invocation.name.as_str() {
        FETCH_TOOL => Ok(ToolCall::Fetch(FetchRequest::from_arguments(
            &invocation.arguments,
        ))),
        PUBLISH_TOOL => match invocation.arguments.get("message").and_then(Value::as_str) {
            Some(message) if !message.trim().is_empty() => Ok(ToolCall::Publish {
                message: message.to_string(),
            }),
            _ => Err(PipelineError::MissingPublishArgument),
        },
        other => Err(PipelineError::UnexpectedToolCall {
            expected: "a known tool",
            found: format!("a call to '{other}'"),
        }),
    }
}

/// First turn: the reply must be exactly one fetch call.
pub fn expect_fetch(reply: &ServiceReply) -> Result<(ToolInvocation, FetchRequest), PipelineError> {
    let call = sole_invocation(reply, FETCH_TOOL)?;
    match classify(call)? {
        ToolCall::Fetch(req) => Ok((call.clone(), req)),
        ToolCall::Publish { .. } => Err(PipelineError::UnexpectedToolCall {
            expected: FETCH_TOOL,
            found: describe(reply),
        }),
    }
}

/// Second turn: the reply must be exactly one publish call with a message.
pub fn expect_publish(reply: &ServiceReply) -> Result<(ToolInvocation, String), PipelineError> {
    let call = sole_invocation(reply, PUBLISH_TOOL)?;
    match classify(call)? {
        ToolCall::Publish { message } => Ok((call.clone(), message)),
        ToolCall::Fetch(_) => Err(PipelineError::UnexpectedToolCall {
            expected: PUBLISH_TOOL,
            found: describe(reply),
        }),
    }
}
