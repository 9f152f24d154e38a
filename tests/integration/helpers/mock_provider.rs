// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use scrapeflow::domain::models::llm::{
    ChatRequest, ChatResponse, ModelConfig, ProviderKind, TokenUsage,
};
use scrapeflow::infrastructure::llm::{ChatProvider, ProviderFactory};
use scrapeflow::utils::errors::LlmError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 返回固定文本的模型
pub struct MockChatProvider {
    calls: AtomicUsize,
    response: String,
}

impl MockChatProvider {
    pub fn items(response: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            response: response.to_string(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChatResponse {
            text: self.response.clone(),
            usage: TokenUsage::new(12, 8),
        })
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        self.complete(request).await
    }
}

/// 所有模型共用同一个模拟供应商
pub struct MockProviderFactory {
    provider: Arc<MockChatProvider>,
}

impl MockProviderFactory {
    pub fn new(provider: Arc<MockChatProvider>) -> Self {
        Self { provider }
    }
}

impl ProviderFactory for MockProviderFactory {
    fn provider_for(&self, _config: &ModelConfig) -> Result<Arc<dyn ChatProvider>, LlmError> {
        Ok(self.provider.clone())
    }
}
