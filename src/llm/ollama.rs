//! Ollama client implementation
//!
//! Async HTTP client for the Ollama chat API with tool calling. Every failure
//! is reported as a model invocation error for the calling agent.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::{value_to_text, Config, ConductorError, Message, Result, ToolCall, ToolDefinition};
use crate::llm::traits::{ModelClient, ModelContext, ModelResponse, TokenUsage};

/// Ollama API client
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    /// Used when the calling agent sets no temperature
    temperature: Option<f32>,
}

/// Ollama chat request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    stream: bool,
}

/// Ollama message format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

/// Ollama tool call format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

/// Ollama function in tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaFunction {
    name: String,
    arguments: serde_json::Value,
}

/// Ollama generation options
#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Ollama chat response (non-streaming)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: OllamaMessage,
    model: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl OllamaClient {
    /// Create a new Ollama client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.ollama.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.ollama_url(),
            temperature: config.model.temperature,
        })
    }

    /// Create a client with custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            temperature: None,
        })
    }

    /// Build the chat transcript for one invoke.
    ///
    /// The rendered instruction becomes the system message, the step input the
    /// user message, and each earlier tool round-trip an assistant/tool pair.
    fn build_messages(prompt: &str, context: &ModelContext) -> Vec<Message> {
        let mut messages = vec![
            Message::system(prompt),
            Message::user(value_to_text(&context.input)),
        ];

        for obs in &context.observations {
            let mut call = Message::assistant("");
            call.tool_calls = Some(vec![ToolCall::new(&obs.tool_name, obs.arguments.clone())]);
            messages.push(call);
            messages.push(Message::tool(value_to_text(&obs.output)));
        }

        messages
    }

    /// Convert internal Message to Ollama format
    fn to_ollama_message(msg: &Message) -> OllamaMessage {
        OllamaMessage {
            role: msg.role.clone(),
            content: msg.content.clone(),
            tool_calls: msg.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|tc| OllamaToolCall {
                        function: OllamaFunction {
                            name: tc.name.clone(),
                            arguments: tc.arguments.clone(),
                        },
                    })
                    .collect()
            }),
        }
    }

    /// Convert Ollama response to ModelResponse
    fn to_model_response(response: ChatResponse) -> ModelResponse {
        let tool_calls = response
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let usage = match (response.prompt_eval_count, response.eval_count) {
            (Some(prompt), Some(completion)) => Some(TokenUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt + completion,
            }),
            _ => None,
        };

        ModelResponse {
            content: response.message.content,
            tool_calls,
            usage,
            model: response.model,
        }
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    async fn invoke(&self, prompt: &str, context: &ModelContext) -> Result<ModelResponse> {
        let messages: Vec<OllamaMessage> = Self::build_messages(prompt, context)
            .iter()
            .map(Self::to_ollama_message)
            .collect();

        let request = ChatRequest {
            model: &context.model,
            messages,
            tools: (!context.tools.is_empty()).then_some(context.tools.as_slice()),
            options: context.temperature.or(self.temperature).map(|temperature| OllamaOptions {
                temperature: Some(temperature),
            }),
            stream: false,
        };

        tracing::debug!(agent = %context.agent, model = %context.model, "calling ollama");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ConductorError::model(
                        &context.agent,
                        format!("Cannot connect to Ollama at {}. Is it running?", self.base_url),
                    )
                } else {
                    ConductorError::model(&context.agent, e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ConductorError::model(
                &context.agent,
                format!("Ollama API error ({}): {}", status, error_text),
            ));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ConductorError::model(&context.agent, format!("Bad response: {}", e)))?;

        Ok(Self::to_model_response(chat))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::traits::Observation;
    use serde_json::json;

    #[test]
    fn test_build_messages_replays_observations() {
        let context = ModelContext {
            agent: "weather_agent".into(),
            model: "qwen3:8b".into(),
            input: json!("Berlin"),
            tools: Vec::new(),
            observations: vec![Observation::success(
                "get_weather",
                json!({"city": "Berlin"}),
                json!("sunny"),
            )],
            session: json!({}),
            temperature: None,
        };

        let messages = OllamaClient::build_messages("Report the weather", &context);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].content, "Berlin");
        assert_eq!(messages[2].tool_calls.as_ref().map(Vec::len), Some(1));
        assert_eq!(messages[3].role, "tool");
        assert_eq!(messages[3].content, "sunny");
    }

    #[test]
    fn test_parse_tool_call_response() {
        let raw = json!({
            "model": "qwen3:8b",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": "get_news", "arguments": {"topic": "rust"}}}]
            },
            "prompt_eval_count": 12,
            "eval_count": 3
        });
        let chat: ChatResponse = serde_json::from_value(raw).unwrap();
        let response = OllamaClient::to_model_response(chat);

        assert_eq!(response.tool_calls, vec![ToolCall::new("get_news", json!({"topic": "rust"}))]);
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(15));
    }
}
