use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// One assistant turn returned by a chat-completions endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
	pub content: Option<String>,
	pub tool_calls: Vec<ChatToolCall>,
}
impl ChatTurn {
	/// Non-blank assistant text, if any.
	pub fn text(&self) -> Option<&str> {
		self.content.as_deref().map(str::trim).filter(|text| !text.is_empty())
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatToolCall {
	pub id: String,
	pub name: String,
	/// Raw JSON text as produced by the model; it may be malformed.
	pub arguments: String,
}

pub async fn complete(
	cfg: &detective_config::LlmProviderConfig,
	messages: &[Value],
	tools: &[Value],
) -> Result<ChatTurn> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let mut body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});

	if !tools.is_empty() {
		body["tools"] = Value::Array(tools.to_vec());
		body["tool_choice"] = Value::String("auto".to_string());
	}

	let res = client
		.post(&url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let turn = parse_chat_response(json)?;

	tracing::debug!(model = %cfg.model, tool_calls = turn.tool_calls.len(), "Chat turn received.");

	Ok(turn)
}

/// Builds the assistant message that must precede tool results in the next request.
pub fn assistant_message(turn: &ChatTurn) -> Value {
	let mut message = serde_json::json!({
		"role": "assistant",
		"content": turn.content,
	});

	if !turn.tool_calls.is_empty() {
		message["tool_calls"] = turn
			.tool_calls
			.iter()
			.map(|call| {
				serde_json::json!({
					"id": call.id,
					"type": "function",
					"function": { "name": call.name, "arguments": call.arguments },
				})
			})
			.collect();
	}

	message
}

pub fn tool_message(tool_call_id: &str, content: &Value) -> Value {
	serde_json::json!({
		"role": "tool",
		"tool_call_id": tool_call_id,
		"content": content.to_string(),
	})
}

fn parse_chat_response(json: Value) -> Result<ChatTurn> {
	let message = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.ok_or_else(|| Error::InvalidResponse {
			message: "Chat response is missing choices[0].message.".to_string(),
		})?;
	let content = message.get("content").and_then(|c| c.as_str()).map(str::to_string);
	let mut tool_calls = Vec::new();

	if let Some(calls) = message.get("tool_calls").and_then(|v| v.as_array()) {
		for (index, call) in calls.iter().enumerate() {
			let function = call.get("function").ok_or_else(|| Error::InvalidResponse {
				message: "Chat tool call is missing function.".to_string(),
			})?;
			let name = function.get("name").and_then(|v| v.as_str()).ok_or_else(|| {
				Error::InvalidResponse { message: "Chat tool call is missing name.".to_string() }
			})?;
			let arguments = match function.get("arguments") {
				Some(Value::String(raw)) => raw.clone(),
				Some(other) => other.to_string(),
				None => "{}".to_string(),
			};
			let id = call
				.get("id")
				.and_then(|v| v.as_str())
				.map(str::to_string)
				.unwrap_or_else(|| format!("call_{index}"));

			tool_calls.push(ChatToolCall { id, name: name.to_string(), arguments });
		}
	}

	Ok(ChatTurn { content, tool_calls })
}
