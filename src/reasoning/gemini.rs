// src/reasoning/gemini.rs
//! Gemini `generateContent` provider with function-calling tools.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ConverseRequest, ReasoningClient, ServiceReply, ServiceUnavailable, ToolInvocation, ToolSchema, Turn};
use crate::config::GeminiConfig;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(cfg: &GeminiConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("news-digest-etl/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5).min(timeout))
            .timeout(timeout)
            .build()
            .context("building gemini http client")?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionDeclaration<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tools<'a> {
    function_declarations: Vec<FunctionDeclaration<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content,
    contents: Vec<Content>,
    tools: Vec<Tools<'a>>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

fn text_part(text: &str) -> Part {
    Part {
        text: Some(text.to_string()),
        ..Part::default()
    }
}

fn to_content(turn: &Turn) -> Content {
    match turn {
        Turn::User(text) => Content {
            role: Some("user".into()),
            parts: vec![text_part(text)],
        },
        Turn::ToolCall(call) => Content {
            role: Some("model".into()),
            parts: vec![Part {
                function_call: Some(FunctionCall {
                    name: call.name.clone(),
                    args: call.arguments.clone(),
                }),
                ..Part::default()
            }],
        },
        Turn::ToolResponse { name, response } => Content {
            role: Some("user".into()),
            parts: vec![Part {
                function_response: Some(FunctionResponse {
                    name: name.clone(),
                    response: response.clone(),
                }),
                ..Part::default()
            }],
        },
    }
}

fn build_request<'a>(req: &ConverseRequest<'a>) -> GenerateRequest<'a> {
    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![text_part(req.system_instruction)],
        },
        contents: req.history.iter().map(to_content).collect(),
        tools: vec![Tools {
            function_declarations: req
                .tools
                .iter()
                .map(|t: &'a ToolSchema| FunctionDeclaration {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                })
                .collect(),
        }],
    }
}

/// Flatten the first candidate into invocations + concatenated text.
fn into_reply(resp: GenerateResponse) -> ServiceReply {
    let Some(candidate) = resp.candidates.into_iter().next() else {
        return ServiceReply::default();
    };
    let mut reply = ServiceReply::default();
    let mut text = String::new();
    for part in candidate.content.parts {
        if let Some(call) = part.function_call {
            let arguments = if call.args.is_null() {
                Value::Object(Default::default())
            } else {
                call.args
            };
            reply.tool_invocations.push(ToolInvocation {
                name: call.name,
                arguments,
            });
        }
        if let Some(t) = part.text {
            text.push_str(&t);
        }
    }
    if !text.trim().is_empty() {
        reply.text = Some(text);
    }
    reply
}

#[async_trait]
impl ReasoningClient for GeminiClient {
    async fn converse(&self, req: ConverseRequest<'_>) -> Result<ServiceReply, ServiceUnavailable> {
        if self.api_key.is_empty() {
            return Err(ServiceUnavailable("GEMINI_API_KEY is not configured".into()));
        }

        let body = build_request(&req);
        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceUnavailable(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let detail: String = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(300)
                .collect();
            return Err(ServiceUnavailable(format!("HTTP {status}: {detail}")));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| ServiceUnavailable(format!("undecodable response: {e}")))?;
        let reply = into_reply(parsed);
        tracing::debug!(
            target: "reasoning",
            calls = reply.tool_invocations.len(),
            has_text = reply.text.is_some(),
            "gemini reply"
        );
        Ok(reply)
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn history_maps_to_gemini_roles_and_parts() {
        let history = vec![
            Turn::User("go".into()),
            Turn::ToolCall(ToolInvocation {
                name: "fetch_news".into(),
                arguments: json!({"limit": 5}),
            }),
            Turn::ToolResponse {
                name: "fetch_news".into(),
                response: json!({"news": []}),
            },
        ];
        let tools = vec![ToolSchema {
            name: "fetch_news".into(),
            description: "d".into(),
            parameters: json!({"type": "OBJECT"}),
        }];
        let req = ConverseRequest {
            system_instruction: "sys",
            history: &history,
            tools: &tools,
        };
        let v = serde_json::to_value(build_request(&req)).unwrap();
        assert_eq!(v["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(v["contents"][1]["role"], "model");
        assert_eq!(v["contents"][1]["parts"][0]["functionCall"]["name"], "fetch_news");
        assert_eq!(v["contents"][2]["parts"][0]["functionResponse"]["response"]["news"], json!([]));
        assert_eq!(v["tools"][0]["functionDeclarations"][0]["name"], "fetch_news");
        assert!(v["contents"][0]["parts"][0].get("functionCall").is_none());
    }

    #[test]
    fn reply_collects_calls_and_text() {
        let resp: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "thinking"},
                        {"functionCall": {"name": "post_message", "args": {"message": "hi"}}},
                        {"functionCall": {"name": "fetch_news"}}
                    ]
                }
            }]
        }))
        .unwrap();
        let reply = into_reply(resp);
        assert_eq!(reply.tool_invocations.len(), 2);
        assert_eq!(reply.tool_invocations[0].arguments["message"], "hi");
        assert!(reply.tool_invocations[1].arguments.is_object());
        assert_eq!(reply.text.as_deref(), Some("thinking"));
    }

    #[test]
    fn empty_candidates_is_an_empty_reply() {
        let resp: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(into_reply(resp), ServiceReply::default());
    }
}
