// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod transport;

use crate::config::settings::LlmSettings;
use crate::domain::models::llm::{ChatRequest, ChatResponse, ModelConfig, ProviderKind};
use crate::utils::errors::LlmError;
use anthropic::AnthropicProvider;
use async_trait::async_trait;
use gemini::GeminiProvider;
use ollama::OllamaProvider;
use openai::OpenAiProvider;
use std::sync::Arc;
use transport::HttpTransport;

/// LLM 供应商接口
///
/// 每个适配器把供应商的响应统一为 `{text, usage}`
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// 供应商类型，用于指标标签
    fn kind(&self) -> ProviderKind;

    /// 单次请求
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;

    /// 流式请求，返回拼接后的完整文本
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;
}

/// 按供应商类型分派的适配器
pub enum LlmProvider {
    OpenAi(OpenAiProvider),
    Anthropic(AnthropicProvider),
    Google(GeminiProvider),
    Ollama(OllamaProvider),
}

impl LlmProvider {
    /// 根据模型配置创建适配器
    ///
    /// # 参数
    ///
    /// * `config` - 模型配置
    /// * `transport` - 共享的 HTTP 传输
    pub fn new(config: ModelConfig, transport: HttpTransport) -> Result<Self, LlmError> {
        if config.model.trim().is_empty() {
            return Err(LlmError::Config(format!(
                "model {} has no provider model name",
                config.id
            )));
        }

        Ok(match config.provider {
            ProviderKind::OpenAi => LlmProvider::OpenAi(OpenAiProvider::new(config, transport)),
            ProviderKind::Anthropic => {
                LlmProvider::Anthropic(AnthropicProvider::new(config, transport))
            }
            ProviderKind::Google => LlmProvider::Google(GeminiProvider::new(config, transport)),
            ProviderKind::Ollama => LlmProvider::Ollama(OllamaProvider::new(config, transport)),
        })
    }
}

#[async_trait]
impl ChatProvider for LlmProvider {
    fn kind(&self) -> ProviderKind {
        match self {
            LlmProvider::OpenAi(p) => p.kind(),
            LlmProvider::Anthropic(p) => p.kind(),
            LlmProvider::Google(p) => p.kind(),
            LlmProvider::Ollama(p) => p.kind(),
        }
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        match self {
            LlmProvider::OpenAi(p) => p.complete(request).await,
            LlmProvider::Anthropic(p) => p.complete(request).await,
            LlmProvider::Google(p) => p.complete(request).await,
            LlmProvider::Ollama(p) => p.complete(request).await,
        }
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        match self {
            LlmProvider::OpenAi(p) => p.complete_stream(request).await,
            LlmProvider::Anthropic(p) => p.complete_stream(request).await,
            LlmProvider::Google(p) => p.complete_stream(request).await,
            LlmProvider::Ollama(p) => p.complete_stream(request).await,
        }
    }
}

/// 供应商工厂
///
/// 测试中替换为返回模拟供应商的实现
pub trait ProviderFactory: Send + Sync {
    fn provider_for(&self, config: &ModelConfig) -> Result<Arc<dyn ChatProvider>, LlmError>;
}

/// 基于 HTTP 适配器的默认工厂
///
/// 远程与本地供应商各持有一个连接池，所有适配器共用
#[derive(Clone)]
pub struct HttpProviderFactory {
    remote: HttpTransport,
    local: HttpTransport,
}

impl HttpProviderFactory {
    /// 创建工厂，本地推理使用更长的超时
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        Ok(Self {
            remote: HttpTransport::new(settings.request_timeout_secs)?,
            local: HttpTransport::new(settings.local_request_timeout_secs)?,
        })
    }

    fn transport_for(&self, kind: ProviderKind) -> &HttpTransport {
        if kind.is_local() {
            &self.local
        } else {
            &self.remote
        }
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn provider_for(&self, config: &ModelConfig) -> Result<Arc<dyn ChatProvider>, LlmError> {
        let transport = self.transport_for(config.provider).clone();
        Ok(Arc::new(LlmProvider::new(config.clone(), transport)?))
    }
}
