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

/// OpenAI 兼容的 chat/completions 适配器
pub struct OpenAiProvider {
    config: ModelConfig,
    transport: HttpTransport,
}

impl OpenAiProvider {
    pub fn new(config: ModelConfig, transport: HttpTransport) -> Self {
        Self { config, transport }
    }

    fn request(&self, body: &Value) -> reqwest::RequestBuilder {
        let url = format!("{}/chat/completions", self.config.endpoint());
        let mut builder = self.transport.client().post(url).json(body);
        if let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.bearer_auth(api_key);
        }
        builder
    }

    fn body(&self, request: &ChatRequest, stream: bool) -> Value {
        let user_content = match &request.image {
            Some(image) if self.config.supports_vision => json!([
                { "type": "text", "text": request.user_content },
                {
                    "type": "image_url",
                    "image_url": { "url": format!("data:image/png;base64,{}", image) }
                }
            ]),
            _ => json!(request.user_content),
        };

        let mut body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": user_content }
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });
        if stream {
            body["stream"] = json!(true);
            body["stream_options"] = json!({ "include_usage": true });
        }
        body
    }
}

fn parse_usage(usage: &Value) -> TokenUsage {
    TokenUsage::new(
        count(&usage["prompt_tokens"]),
        count(&usage["completion_tokens"]),
    )
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = self
            .transport
            .send_json(self.request(&self.body(request, false)))
            .await?;

        let text = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message.content".into()))?
            .to_string();

        Ok(ChatResponse {
            text,
            usage: parse_usage(&body["usage"]),
        })
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let mut response = ChatResponse::default();
        self.transport
            .send_lines(self.request(&self.body(request, true)), |line| {
                let Some(data) = sse_data(line) else {
                    return Ok(());
                };
                let event = parse_event(data)?;
                if let Some(delta) = event["choices"][0]["delta"]["content"].as_str() {
                    response.text.push_str(delta);
                }
                if event["usage"].is_object() {
                    response.usage = parse_usage(&event["usage"]);
                }
                Ok(())
            })
            .await?;
        Ok(response)
    }
}
