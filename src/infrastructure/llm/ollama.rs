// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::transport::{count, parse_event, HttpTransport};
use super::ChatProvider;
use crate::domain::models::llm::{ChatRequest, ChatResponse, ModelConfig, ProviderKind, TokenUsage};
use crate::utils::errors::LlmError;
use async_trait::async_trait;
use serde_json::{json, Value};

/// 本地 Ollama 推理适配器
///
/// 流式响应为逐行 JSON
pub struct OllamaProvider {
    config: ModelConfig,
    transport: HttpTransport,
}

impl OllamaProvider {
    pub fn new(config: ModelConfig, transport: HttpTransport) -> Self {
        Self { config, transport }
    }

    fn request(&self, body: &Value) -> reqwest::RequestBuilder {
        let url = format!("{}/api/chat", self.config.endpoint());
        self.transport.client().post(url).json(body)
    }

    fn body(&self, request: &ChatRequest, stream: bool) -> Value {
        let mut user = json!({ "role": "user", "content": request.user_content });
        if let Some(image) = request.image.as_ref().filter(|_| self.config.supports_vision) {
            user["images"] = json!([image]);
        }

        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                user
            ],
            "stream": stream,
            "options": {
                "temperature": self.config.temperature,
                "num_predict": self.config.max_tokens,
            },
        })
    }
}

fn parse_usage(body: &Value) -> TokenUsage {
    TokenUsage::new(count(&body["prompt_eval_count"]), count(&body["eval_count"]))
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = self
            .transport
            .send_json(self.request(&self.body(request, false)))
            .await?;

        let text = body["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::InvalidResponse("missing message.content".into()))?
            .to_string();

        Ok(ChatResponse {
            text,
            usage: parse_usage(&body),
        })
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let mut response = ChatResponse::default();
        self.transport
            .send_lines(self.request(&self.body(request, true)), |line| {
                let event = parse_event(line)?;
                if let Some(error) = event["error"].as_str() {
                    return Err(LlmError::InvalidResponse(error.to_string()));
                }
                if let Some(delta) = event["message"]["content"].as_str() {
                    response.text.push_str(delta);
                }
                if event["done"].as_bool() == Some(true) {
                    response.usage = parse_usage(&event);
                }
                Ok(())
            })
            .await?;
        Ok(response)
    }
}
