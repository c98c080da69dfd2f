use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use sentra_core::config::LlmConfig;

use crate::messages::{ChatMessage, Role, ToolCallRequest};

/// Tool advertisement handed to the model: name, description, and a
/// JSON-schema parameter description.
#[derive(Clone, Debug, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("chat endpoint returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("transport failure talking to the chat endpoint: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not decode chat response: {0}")]
    Decode(String),
}

/// Completion capability: given a message history and a tool catalog,
/// returns either a final answer or an assistant message carrying tool-call
/// requests.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> Result<ChatMessage, LlmError>;
}

/// OpenAI-compatible chat-completions client. Any endpoint speaking that
/// wire format works (hosted or local); the base URL and model come from
/// [`LlmConfig`].
pub struct OpenAiChatModel {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl OpenAiChatModel {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> Result<ChatMessage, LlmError> {
        let request = WireRequest {
            model: self.model.clone(),
            messages: messages.iter().map(WireMessage::from).collect(),
            tools: tools.iter().map(WireTool::from).collect(),
        };

        let mut builder =
            self.http.post(format!("{}/chat/completions", self.base_url)).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status: status.as_u16(), message });
        }

        let parsed: WireResponse =
            response.json().await.map_err(|error| LlmError::Decode(error.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Decode("response contained no choices".to_string()))?;

        Ok(choice.message.into_chat_message())
    }
}

// --- wire format -----------------------------------------------------------

#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded argument object, per the chat-completions wire format.
    arguments: String,
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionDef,
}

#[derive(Serialize)]
struct WireFunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        let tool_calls = if message.tool_calls.is_empty() {
            None
        } else {
            Some(
                message
                    .tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: call.id.clone(),
                        kind: "function".to_string(),
                        function: WireFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    })
                    .collect(),
            )
        };
        Self {
            role: role.to_string(),
            content: Some(message.content.clone()),
            tool_calls,
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

impl From<&ToolSchema> for WireTool {
    fn from(schema: &ToolSchema) -> Self {
        Self {
            kind: "function",
            function: WireFunctionDef {
                name: schema.name.clone(),
                description: schema.description.clone(),
                parameters: schema.parameters.clone(),
            },
        }
    }
}

impl WireMessage {
    fn into_chat_message(self) -> ChatMessage {
        let tool_calls = self
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                let arguments =
                    serde_json::from_str(&call.function.arguments).unwrap_or_else(|error| {
                        warn!(tool = %call.function.name, %error, "tool-call arguments were not valid JSON");
                        Value::Object(Default::default())
                    });
                ToolCallRequest { id: call.id, name: call.function.name, arguments }
            })
            .collect();

        ChatMessage {
            role: Role::Assistant,
            content: self.content.unwrap_or_default(),
            tool_calls,
            tool_call_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{WireMessage, WireResponse};
    use crate::messages::ChatMessage;

    #[test]
    fn assistant_tool_calls_round_trip_from_wire_json() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "zcc_list_devices",
                            "arguments": "{\"tenant_name\":\"Acme\"}"
                        }
                    }]
                }
            }]
        });
        let parsed: WireResponse = serde_json::from_value(raw).unwrap();
        let message = parsed.choices.into_iter().next().unwrap().message.into_chat_message();
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].name, "zcc_list_devices");
        assert_eq!(message.tool_calls[0].arguments["tenant_name"], "Acme");
        assert!(message.content.is_empty());
    }

    #[test]
    fn invalid_call_arguments_degrade_to_an_empty_object() {
        let wire = WireMessage {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(vec![super::WireToolCall {
                id: "call_1".to_string(),
                kind: "function".to_string(),
                function: super::WireFunctionCall {
                    name: "t".to_string(),
                    arguments: "not-json".to_string(),
                },
            }]),
            tool_call_id: None,
        };
        let message = wire.into_chat_message();
        assert!(message.tool_calls[0].arguments.as_object().unwrap().is_empty());
    }

    #[test]
    fn outbound_message_serializes_tool_result_correlation() {
        let message = ChatMessage::tool_result("call_9", "ok");
        let wire = WireMessage::from(&message);
        let rendered = serde_json::to_value(&wire).unwrap();
        assert_eq!(rendered["role"], "tool");
        assert_eq!(rendered["tool_call_id"], "call_9");
    }
}
