use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use trellis_common::{Error, Result};

use crate::providers::{
    ChatMessage, ChatRole, ContentBlock, LlmProvider, LlmRequest, LlmResponse, MessagePart, Usage,
};

/// Provider speaking the OpenAI chat-completions protocol. Groq exposes the
/// same surface, so a second instance with a different base URL and id
/// covers it.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    provider_id: String,
    api_key: String,
    base_url: String,
    default_temperature: Option<f64>,
    default_max_tokens: Option<u32>,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self::with_id("openai", api_key, base_url)
    }

    pub fn with_id(
        provider_id: impl Into<String>,
        api_key: String,
        base_url: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            provider_id: provider_id.into(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            default_temperature: None,
            default_max_tokens: None,
        }
    }

    /// Sampling defaults applied when a request leaves them unset.
    pub fn with_sampling(mut self, temperature: Option<f64>, max_tokens: Option<u32>) -> Self {
        self.default_temperature = temperature;
        self.default_max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let openai_request = self.convert_request(request)?;

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&openai_request)
            .send()
            .await
            .map_err(|e| Error::Agent(format!("{} request failed: {e}", self.provider_id)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Agent(format!(
                "{} API error: {error_text}",
                self.provider_id
            )));
        }

        let openai_response: OpenAiResponse = response.json().await.map_err(|e| {
            Error::Agent(format!("failed to parse {} response: {e}", self.provider_id))
        })?;

        convert_response(openai_response)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await;

        match response {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

impl OpenAiProvider {
    fn convert_request(&self, request: &LlmRequest) -> Result<OpenAiRequest> {
        let mut messages = Vec::new();

        if let Some(system_prompt) = &request.system {
            messages.push(OpenAiMessage::System {
                content: system_prompt.clone(),
            });
        }

        for msg in &request.messages {
            convert_message(msg, &mut messages)?;
        }

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| OpenAiTool {
                        kind: "function".to_string(),
                        function: OpenAiFunctionDefinition {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.input_schema.clone(),
                        },
                    })
                    .collect(),
            )
        };

        let response_format = request.json_response.then(|| OpenAiResponseFormat {
            kind: "json_object".to_string(),
        });

        Ok(OpenAiRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens.or(self.default_max_tokens),
            temperature: request.temperature.or(self.default_temperature),
            tools,
            response_format,
        })
    }
}

/// A single internal message can expand into several wire messages: OpenAI
/// wants one `tool` message per tool result.
fn convert_message(msg: &ChatMessage, out: &mut Vec<OpenAiMessage>) -> Result<()> {
    match msg.role {
        ChatRole::System => {
            out.push(OpenAiMessage::System {
                content: flatten_text(&msg.content),
            });
        }
        ChatRole::User => {
            let mut tool_results = Vec::new();
            if let MessagePart::Parts(parts) = &msg.content {
                for part in parts {
                    if let ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                    } = part
                    {
                        tool_results.push((tool_use_id.clone(), content.clone()));
                    }
                }
            }
            if tool_results.is_empty() {
                out.push(OpenAiMessage::User {
                    content: flatten_text(&msg.content),
                });
            } else {
                for (tool_call_id, content) in tool_results {
                    out.push(OpenAiMessage::Tool {
                        tool_call_id,
                        content,
                    });
                }
            }
        }
        ChatRole::Assistant => {
            let mut content_str = None;
            let mut tool_calls = Vec::new();

            match &msg.content {
                MessagePart::Text(t) => content_str = Some(t.clone()),
                MessagePart::Parts(parts) => {
                    let mut text_parts = Vec::new();
                    for part in parts {
                        match part {
                            ContentBlock::Text { text } => text_parts.push(text.clone()),
                            ContentBlock::ToolUse { id, name, input } => {
                                tool_calls.push(OpenAiToolCall {
                                    id: id.clone(),
                                    kind: "function".to_string(),
                                    function: OpenAiFunctionCall {
                                        name: name.clone(),
                                        arguments: serde_json::to_string(input)
                                            .unwrap_or_default(),
                                    },
                                });
                            }
                            ContentBlock::ToolResult { .. } => {}
                        }
                    }
                    if !text_parts.is_empty() {
                        content_str = Some(text_parts.join("\n"));
                    }
                }
            }

            out.push(OpenAiMessage::Assistant {
                content: content_str,
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
            });
        }
        ChatRole::Tool => {
            let (tool_call_id, content) = match &msg.content {
                MessagePart::Parts(parts) => parts
                    .iter()
                    .find_map(|p| match p {
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                        } => Some((tool_use_id.clone(), content.clone())),
                        _ => None,
                    })
                    .ok_or_else(|| {
                        Error::Agent("tool message missing ToolResult content".to_string())
                    })?,
                _ => {
                    return Err(Error::Agent(
                        "tool message must have Parts content with ToolResult".to_string(),
                    ));
                }
            };
            out.push(OpenAiMessage::Tool {
                tool_call_id,
                content,
            });
        }
    }
    Ok(())
}

fn flatten_text(content: &MessagePart) -> String {
    match content {
        MessagePart::Text(t) => t.clone(),
        MessagePart::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn convert_response(response: OpenAiResponse) -> Result<LlmResponse> {
    let choice = response
        .choices
        .first()
        .ok_or_else(|| Error::Agent("no choices in response".to_string()))?;
    let message = &choice.message;

    let mut content_blocks = Vec::new();

    if let Some(text) = &message.content {
        if !text.is_empty() {
            content_blocks.push(ContentBlock::Text { text: text.clone() });
        }
    }

    if let Some(tool_calls) = &message.tool_calls {
        for tc in tool_calls {
            let input_json: serde_json::Value = serde_json::from_str(&tc.function.arguments)
                .unwrap_or(serde_json::Value::String(tc.function.arguments.clone()));

            content_blocks.push(ContentBlock::ToolUse {
                id: tc.id.clone(),
                name: tc.function.name.clone(),
                input: input_json,
            });
        }
    }

    Ok(LlmResponse {
        content: content_blocks,
        model: response.model.clone(),
        usage: response.usage.map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }),
        stop_reason: Some(choice.finish_reason.clone()),
    })
}

// Request types

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAiResponseFormat>,
}

#[derive(Serialize)]
struct OpenAiResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum OpenAiMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<OpenAiToolCall>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: OpenAiFunctionCall,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    kind: String,
    function: OpenAiFunctionDefinition,
}

#[derive(Serialize)]
struct OpenAiFunctionDefinition {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

// Response types

#[derive(Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: String,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
