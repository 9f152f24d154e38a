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

/// Google Gemini generateContent 适配器
pub struct GeminiProvider {
    config: ModelConfig,
    transport: HttpTransport,
}

impl GeminiProvider {
    pub fn new(config: ModelConfig, transport: HttpTransport) -> Self {
        Self { config, transport }
    }

    fn request(&self, body: &Value, stream: bool) -> reqwest::RequestBuilder {
        let method = if stream {
            "streamGenerateContent"
        } else {
            "generateContent"
        };
        let url = format!(
            "{}/models/{}:{}",
            self.config.endpoint(),
            self.config.model,
            method
        );

        let mut query = vec![("key", self.config.api_key.clone().unwrap_or_default())];
        if stream {
            query.push(("alt", "sse".to_string()));
        }
        self.transport.client().post(url).query(&query).json(body)
    }

    fn body(&self, request: &ChatRequest) -> Value {
        let mut parts = vec![json!({ "text": request.user_content })];
        if let Some(image) = request.image.as_ref().filter(|_| self.config.supports_vision) {
            parts.push(json!({
                "inline_data": { "mime_type": "image/png", "data": image }
            }));
        }

        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_tokens,
            },
        });
        if !request.system_prompt.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": request.system_prompt }] });
        }
        body
    }
}

/// 拼接第一个候选的所有文本片段
fn candidate_text(body: &Value) -> Option<String> {
    let parts = body["candidates"][0]["content"]["parts"].as_array()?;
    Some(
        parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect(),
    )
}

fn parse_usage(metadata: &Value) -> TokenUsage {
    TokenUsage::new(
        count(&metadata["promptTokenCount"]),
        count(&metadata["candidatesTokenCount"]),
    )
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = self
            .transport
            .send_json(self.request(&self.body(request), false))
            .await?;

        let text = candidate_text(&body).ok_or_else(|| {
            LlmError::InvalidResponse("missing candidates[0].content.parts".into())
        })?;

        Ok(ChatResponse {
            text,
            usage: parse_usage(&body["usageMetadata"]),
        })
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let mut response = ChatResponse::default();
        self.transport
            .send_lines(self.request(&self.body(request), true), |line| {
                let Some(data) = sse_data(line) else {
                    return Ok(());
                };
                let event = parse_event(data)?;
                if let Some(text) = candidate_text(&event) {
                    response.text.push_str(&text);
                }
                // usageMetadata 是累计值，保留最后一次
                if event["usageMetadata"].is_object() {
                    response.usage = parse_usage(&event["usageMetadata"]);
                }
                Ok(())
            })
            .await?;
        Ok(response)
    }
}
