//! Language-model providers behind one `ChatModel` trait.
//!
//! Each provider gets a request builder and a response parser as plain
//! functions over `serde_json::Value`, so the wire formats are testable
//! without a network. `HttpChatModel` glues them to reqwest.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info};
use url::Url;

use super::tools::ToolSpec;
use super::{AssistantError, ModelReply, Provider, ToolCall, Turn};

const REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_TOKENS: u32 = 1024;
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Body fragments that mean the key itself is bad, whatever the status code.
const UNAUTHORIZED_SIGNATURES: &[&str] = &[
    "API key not valid",
    "PERMISSION_DENIED",
    "Requested entity was not found",
];

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        turns: &[Turn],
        tools: &[ToolSpec],
    ) -> Result<ModelReply, AssistantError>;
}

/// A provider reached over HTTPS.
pub struct HttpChatModel {
    provider: Provider,
    model: String,
    api_key: Option<String>,
    base_url: Url,
    client: reqwest::Client,
}

/// Build a reqwest client with a 60-second timeout for LLM API calls.
fn build_api_client() -> Result<reqwest::Client, AssistantError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| AssistantError::Client(e.to_string()))
}

/// Parse a base URL, making sure relative endpoints join under it.
fn parse_base_url(provider: Provider, raw: &str) -> Result<Url, AssistantError> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).map_err(|e| AssistantError::Client(format!(
        "Invalid base URL for {}: {} ({})",
        provider, raw, e
    )))
}

impl HttpChatModel {
    /// `api_key` may be `None`; calls then fail with `MissingApiKey`.
    pub fn new(
        provider: Provider,
        model: &str,
        api_key: Option<String>,
        base_url: Option<&str>,
    ) -> Result<Self, AssistantError> {
        let base_url =
            parse_base_url(provider, base_url.unwrap_or_else(|| provider.default_base_url()))?;
        Ok(Self {
            provider,
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url,
            client: build_api_client()?,
        })
    }

    pub fn endpoint(&self) -> Result<Url, AssistantError> {
        let path = match self.provider {
            Provider::Gemini => format!("models/{}:generateContent", self.model),
            Provider::Claude => "messages".to_string(),
            Provider::OpenAi | Provider::OpenRouter => "chat/completions".to_string(),
        };
        self.base_url
            .join(&path)
            .map_err(|e| AssistantError::Client(format!("Invalid endpoint {}: {}", path, e)))
    }

    fn build_body(&self, system: &str, turns: &[Turn], tools: &[ToolSpec]) -> Value {
        match self.provider {
            Provider::Gemini => gemini_body(system, turns, tools),
            Provider::Claude => claude_body(&self.model, system, turns, tools),
            Provider::OpenAi | Provider::OpenRouter => {
                openai_body(&self.model, system, turns, tools)
            }
        }
    }

    fn parse_reply(&self, body: &Value) -> Result<ModelReply, String> {
        match self.provider {
            Provider::Gemini => parse_gemini_reply(body),
            Provider::Claude => parse_claude_reply(body),
            Provider::OpenAi | Provider::OpenRouter => parse_openai_reply(body),
        }
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn complete(
        &self,
        system: &str,
        turns: &[Turn],
        tools: &[ToolSpec],
    ) -> Result<ModelReply, AssistantError> {
        let provider = self.provider;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AssistantError::MissingApiKey(provider))?;
        let url = self.endpoint()?;
        let body = self.build_body(system, turns, tools);

        info!(
            "Calling provider '{}' model '{}' with {} turns",
            provider,
            self.model,
            turns.len()
        );

        let request = self.client.post(url).json(&body);
        let request = match provider {
            Provider::Gemini => request.header("x-goog-api-key", api_key),
            Provider::Claude => request
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            Provider::OpenAi | Provider::OpenRouter => {
                request.header("Authorization", format!("Bearer {}", api_key))
            }
        };

        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("timeout after {}s", REQUEST_TIMEOUT_SECS)
            } else {
                e.to_string()
            };
            error!("LLM API request failed for {}: {}", provider, message);
            AssistantError::Network { provider, message }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!("Failed to read API response body from {}: {}", provider, e);
            AssistantError::Network {
                provider,
                message: e.to_string(),
            }
        })?;

        if !status.is_success() {
            let err = classify_failure(provider, status.as_u16(), &text);
            error!("{}", err);
            return Err(err);
        }

        let json: Value = serde_json::from_str(&text).map_err(|e| {
            let message = format!("Failed to parse API response: {}", e);
            error!("{} ({})", message, provider);
            AssistantError::InvalidResponse { provider, message }
        })?;

        self.parse_reply(&json).map_err(|message| {
            error!("Unexpected response from {}: {}", provider, message);
            AssistantError::InvalidResponse { provider, message }
        })
    }
}

/// Map a non-2xx response to an error, separating bad keys from other failures.
pub fn classify_failure(provider: Provider, status: u16, body: &str) -> AssistantError {
    let truncated = truncate(body, 1024);
    if status == 401
        || status == 403
        || UNAUTHORIZED_SIGNATURES.iter().any(|sig| body.contains(sig))
    {
        AssistantError::Unauthorized {
            provider,
            message: format!("{} - {}", status, truncated),
        }
    } else {
        AssistantError::Api {
            provider,
            status,
            body: truncated,
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

// ---- Gemini ----------------------------------------------------------------

pub fn gemini_body(system: &str, turns: &[Turn], tools: &[ToolSpec]) -> Value {
    let contents: Vec<Value> = turns
        .iter()
        .map(|turn| match turn {
            Turn::User(text) => json!({ "role": "user", "parts": [{ "text": text }] }),
            Turn::Model(text) => json!({ "role": "model", "parts": [{ "text": text }] }),
            Turn::ToolCalls(calls) => json!({
                "role": "model",
                "parts": calls
                    .iter()
                    .map(|c| json!({ "functionCall": { "name": c.name, "args": c.args } }))
                    .collect::<Vec<_>>(),
            }),
            Turn::ToolResults(outcomes) => json!({
                "role": "user",
                "parts": outcomes
                    .iter()
                    .map(|o| json!({
                        "functionResponse": { "name": o.call.name, "response": o.result }
                    }))
                    .collect::<Vec<_>>(),
            }),
        })
        .collect();

    let declarations: Vec<Value> = tools
        .iter()
        .map(|t| json!({ "name": t.name, "description": t.description, "parameters": t.parameters }))
        .collect();

    json!({
        "systemInstruction": { "parts": [{ "text": system }] },
        "contents": contents,
        "tools": [{ "functionDeclarations": declarations }],
    })
}

pub fn parse_gemini_reply(body: &Value) -> Result<ModelReply, String> {
    let parts = body["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or("No content parts in Gemini response")?;

    let calls: Vec<ToolCall> = parts
        .iter()
        .filter_map(|p| p.get("functionCall"))
        .map(|fc| ToolCall {
            id: fc["id"].as_str().map(str::to_string),
            name: fc["name"].as_str().unwrap_or_default().to_string(),
            args: fc.get("args").cloned().unwrap_or(Value::Null),
        })
        .collect();
    if !calls.is_empty() {
        return Ok(ModelReply::ToolCalls(calls));
    }

    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    Ok(ModelReply::Text(text))
}

// ---- Claude ----------------------------------------------------------------

pub fn claude_body(model: &str, system: &str, turns: &[Turn], tools: &[ToolSpec]) -> Value {
    let messages: Vec<Value> = turns
        .iter()
        .map(|turn| match turn {
            Turn::User(text) => json!({ "role": "user", "content": text }),
            Turn::Model(text) => json!({ "role": "assistant", "content": text }),
            Turn::ToolCalls(calls) => json!({
                "role": "assistant",
                "content": calls
                    .iter()
                    .map(|c| {
                        let input = if c.args.is_null() { json!({}) } else { c.args.clone() };
                        json!({
                            "type": "tool_use",
                            "id": c.id.clone().unwrap_or_default(),
                            "name": c.name,
                            "input": input,
                        })
                    })
                    .collect::<Vec<_>>(),
            }),
            Turn::ToolResults(outcomes) => json!({
                "role": "user",
                "content": outcomes
                    .iter()
                    .map(|o| json!({
                        "type": "tool_result",
                        "tool_use_id": o.call.id.clone().unwrap_or_default(),
                        "content": o.result.to_string(),
                    }))
                    .collect::<Vec<_>>(),
            }),
        })
        .collect();

    let tools: Vec<Value> = tools
        .iter()
        .map(|t| json!({ "name": t.name, "description": t.description, "input_schema": t.parameters }))
        .collect();

    json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "system": system,
        "messages": messages,
        "tools": tools,
    })
}

pub fn parse_claude_reply(body: &Value) -> Result<ModelReply, String> {
    let content = body["content"]
        .as_array()
        .ok_or("No content in Claude API response")?;

    let calls: Vec<ToolCall> = content
        .iter()
        .filter(|block| block["type"] == "tool_use")
        .map(|block| ToolCall {
            id: block["id"].as_str().map(str::to_string),
            name: block["name"].as_str().unwrap_or_default().to_string(),
            args: block.get("input").cloned().unwrap_or(Value::Null),
        })
        .collect();
    if !calls.is_empty() {
        return Ok(ModelReply::ToolCalls(calls));
    }

    let text: String = content
        .iter()
        .filter(|block| block["type"] == "text")
        .filter_map(|block| block["text"].as_str())
        .collect();
    Ok(ModelReply::Text(text))
}

// ---- OpenAI-compatible (OpenAI, OpenRouter) --------------------------------

pub fn openai_body(model: &str, system: &str, turns: &[Turn], tools: &[ToolSpec]) -> Value {
    let mut messages = vec![json!({ "role": "system", "content": system })];
    for turn in turns {
        match turn {
            Turn::User(text) => messages.push(json!({ "role": "user", "content": text })),
            Turn::Model(text) => messages.push(json!({ "role": "assistant", "content": text })),
            Turn::ToolCalls(calls) => messages.push(json!({
                "role": "assistant",
                "content": Value::Null,
                "tool_calls": calls
                    .iter()
                    .map(|c| json!({
                        "id": c.id.clone().unwrap_or_default(),
                        "type": "function",
                        "function": { "name": c.name, "arguments": c.args.to_string() },
                    }))
                    .collect::<Vec<_>>(),
            })),
            Turn::ToolResults(outcomes) => {
                for o in outcomes {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": o.call.id.clone().unwrap_or_default(),
                        "content": o.result.to_string(),
                    }));
                }
            }
        }
    }

    let tools: Vec<Value> = tools
        .iter()
        .map(|t| json!({
            "type": "function",
            "function": { "name": t.name, "description": t.description, "parameters": t.parameters },
        }))
        .collect();

    json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "messages": messages,
        "tools": tools,
    })
}

pub fn parse_openai_reply(body: &Value) -> Result<ModelReply, String> {
    let message = body["choices"][0]
        .get("message")
        .ok_or("No message in chat completion response")?;

    if let Some(tool_calls) = message["tool_calls"].as_array().filter(|c| !c.is_empty()) {
        let calls = tool_calls
            .iter()
            .map(|c| {
                let raw_args = c["function"]["arguments"].as_str().unwrap_or("{}");
                ToolCall {
                    id: c["id"].as_str().map(str::to_string),
                    name: c["function"]["name"].as_str().unwrap_or_default().to_string(),
                    // Unparseable arguments surface as a tool error, not a failed turn.
                    args: serde_json::from_str(raw_args).unwrap_or(Value::Null),
                }
            })
            .collect();
        return Ok(ModelReply::ToolCalls(calls));
    }

    Ok(ModelReply::Text(
        message["content"].as_str().unwrap_or_default().to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::tools::tool_specs;
    use crate::assistant::ToolOutcome;

    fn sample_turns() -> Vec<Turn> {
        let call = ToolCall {
            id: Some("toolu_1".to_string()),
            name: "get_stock".to_string(),
            args: json!({}),
        };
        vec![
            Turn::User("¿Cuánto PLA blanco queda?".to_string()),
            Turn::ToolCalls(vec![call.clone()]),
            Turn::ToolResults(vec![ToolOutcome {
                call,
                result: json!({ "result": [] }),
            }]),
        ]
    }

    #[test]
    fn test_endpoints() {
        let gemini = HttpChatModel::new(Provider::Gemini, "gemini-2.5-flash", None, None).unwrap();
        assert_eq!(
            gemini.endpoint().unwrap().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );

        let claude = HttpChatModel::new(
            Provider::Claude,
            "claude-sonnet-4-20250514",
            None,
            Some("http://localhost:8080/proxy"),
        )
        .unwrap();
        assert_eq!(
            claude.endpoint().unwrap().as_str(),
            "http://localhost:8080/proxy/messages"
        );

        let router = HttpChatModel::new(Provider::OpenRouter, "x/y", None, None).unwrap();
        assert_eq!(
            router.endpoint().unwrap().as_str(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpChatModel::new(Provider::OpenAi, "gpt-4o", None, Some("not a url")).is_err());
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let model = HttpChatModel::new(Provider::Gemini, "gemini-2.5-flash", Some("  ".into()), None)
            .unwrap();
        let err = model.complete("sys", &[], &[]).await.unwrap_err();
        assert!(matches!(err, AssistantError::MissingApiKey(Provider::Gemini)));
    }

    #[test]
    fn test_classify_failure() {
        assert!(classify_failure(Provider::Claude, 401, "nope").needs_api_key());
        assert!(classify_failure(Provider::Gemini, 400, r#"{"error":{"message":"API key not valid. Please pass a valid API key."}}"#).needs_api_key());
        assert!(classify_failure(Provider::Gemini, 404, "Requested entity was not found.").needs_api_key());
        let err = classify_failure(Provider::OpenAi, 500, "boom");
        assert!(matches!(err, AssistantError::Api { status: 500, .. }));
    }

    #[test]
    fn test_gemini_body_shape() {
        let body = gemini_body("sys", &sample_turns(), &tool_specs());
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["parts"][0]["functionCall"]["name"], "get_stock");
        assert_eq!(
            body["contents"][2]["parts"][0]["functionResponse"]["response"]["result"],
            json!([])
        );
        assert_eq!(
            body["tools"][0]["functionDeclarations"].as_array().unwrap().len(),
            5
        );
    }

    #[test]
    fn test_parse_gemini_function_call() {
        let body = json!({
            "candidates": [{ "content": { "role": "model", "parts": [
                { "functionCall": { "name": "update_stock", "args": { "color": "Rojo", "type": "PLA", "closedCount": 2 } } }
            ]}}]
        });
        match parse_gemini_reply(&body).unwrap() {
            ModelReply::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "update_stock");
                assert_eq!(calls[0].args["closedCount"], 2);
                assert_eq!(calls[0].id, None);
            }
            other => panic!("unexpected {:?}", other),
        }

        let text = json!({ "candidates": [{ "content": { "parts": [{ "text": "Listo" }, { "text": "!" }] } }] });
        assert_eq!(parse_gemini_reply(&text).unwrap(), ModelReply::Text("Listo!".to_string()));
        assert!(parse_gemini_reply(&json!({})).is_err());
    }

    #[test]
    fn test_claude_round_trip_shapes() {
        let body = claude_body("claude-x", "sys", &sample_turns(), &tool_specs());
        assert_eq!(body["system"], "sys");
        assert_eq!(body["messages"][1]["content"][0]["type"], "tool_use");
        assert_eq!(body["messages"][2]["content"][0]["tool_use_id"], "toolu_1");
        assert!(body["tools"][0].get("input_schema").is_some());

        let reply = json!({ "content": [
            { "type": "text", "text": "Reviso el stock." },
            { "type": "tool_use", "id": "toolu_2", "name": "get_stock", "input": {} }
        ]});
        match parse_claude_reply(&reply).unwrap() {
            ModelReply::ToolCalls(calls) => assert_eq!(calls[0].id.as_deref(), Some("toolu_2")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_openai_shapes() {
        let body = openai_body("gpt-4o", "sys", &sample_turns(), &tool_specs());
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][2]["tool_calls"][0]["function"]["arguments"], "{}");
        assert_eq!(body["messages"][3]["role"], "tool");
        assert_eq!(body["tools"][4]["function"]["name"], "calculate_budget");

        let reply = json!({ "choices": [{ "message": { "role": "assistant", "content": null, "tool_calls": [
            { "id": "call_9", "type": "function", "function": { "name": "add_order", "arguments": "{\"customer\":\"Ana\",\"details\":\"Maceta\"}" } }
        ]}}]});
        match parse_openai_reply(&reply).unwrap() {
            ModelReply::ToolCalls(calls) => {
                assert_eq!(calls[0].args["customer"], "Ana");
            }
            other => panic!("unexpected {:?}", other),
        }

        let text = json!({ "choices": [{ "message": { "content": "Hecho" } }] });
        assert_eq!(parse_openai_reply(&text).unwrap(), ModelReply::Text("Hecho".to_string()));
    }
}
