// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::transport::{count, parse_event, sse_data, HttpTransport};
use super::ChatProvider;
use crate::domain::models::llm::{ChatRequest, ChatResponse, ModelConfig, ProviderKind, TokenUsage};
use crate::utils::errors::LlmError;
use async_trait::async_trait;
use serde_json::{json, Value};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages 接口适配器
///
/// 系统提示词放在顶层 `system` 字段
pub struct AnthropicProvider {
    config: ModelConfig,
    transport: HttpTransport,
}

impl AnthropicProvider {
    pub fn new(config: ModelConfig, transport: HttpTransport) -> Self {
        Self { config, transport }
    }

    fn request(&self, body: &Value) -> reqwest::RequestBuilder {
        let url = format!("{}/messages", self.config.endpoint());
        self.transport
            .client()
            .post(url)
            .header("x-api-key", self.config.api_key.clone().unwrap_or_default())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
    }

    fn body(&self, request: &ChatRequest, stream: bool) -> Value {
        let content = match &request.image {
            Some(image) if self.config.supports_vision => json!([
                {
                    "type": "image",
                    "source": { "type": "base64", "media_type": "image/png", "data": image }
                },
                { "type": "text", "text": request.user_content }
            ]),
            _ => json!(request.user_content),
        };

        let mut body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": content }],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });
        if !request.system_prompt.is_empty() {
            body["system"] = json!(request.system_prompt);
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = self
            .transport
            .send_json(self.request(&self.body(request, false)))
            .await?;

        let text = body["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|block| block["text"].as_str())
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| LlmError::InvalidResponse("missing content[].text".into()))?;

        Ok(ChatResponse {
            text,
            usage: TokenUsage::new(
                count(&body["usage"]["input_tokens"]),
                count(&body["usage"]["output_tokens"]),
            ),
        })
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let mut text = String::new();
        let mut input_tokens = 0;
        let mut output_tokens = 0;

        self.transport
            .send_lines(self.request(&self.body(request, true)), |line| {
                let Some(data) = sse_data(line) else {
                    return Ok(());
                };
                let event = parse_event(data)?;
                match event["type"].as_str() {
                    Some("message_start") => {
                        input_tokens = count(&event["message"]["usage"]["input_tokens"]);
                    }
                    Some("content_block_delta") => {
                        if let Some(delta) = event["delta"]["text"].as_str() {
                            text.push_str(delta);
                        }
                    }
                    Some("message_delta") => {
                        output_tokens = count(&event["usage"]["output_tokens"]);
                    }
                    Some("error") => {
                        return Err(LlmError::InvalidResponse(event["error"].to_string()));
                    }
                    _ => {}
                }
                Ok(())
            })
            .await?;

        Ok(ChatResponse {
            text,
            usage: TokenUsage::new(input_tokens, output_tokens),
        })
    }
}
