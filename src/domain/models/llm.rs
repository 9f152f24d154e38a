// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

/// LLM 供应商类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI 风格的 chat/completions 接口，`custom` 也映射到这里
    #[serde(alias = "custom")]
    OpenAi,
    /// Anthropic messages 接口
    Anthropic,
    /// Google generateContent 接口
    Google,
    /// 本地 Ollama 推理
    Ollama,
}

impl ProviderKind {
    /// 是否为本地推理，本地推理使用更长的超时
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderKind::Ollama)
    }

    /// 供应商默认接口地址
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
            ProviderKind::Google => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::Ollama => "http://localhost:11434",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::Google => write!(f, "google"),
            ProviderKind::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" | "custom" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "google" | "gemini" => Ok(ProviderKind::Google),
            "ollama" => Ok(ProviderKind::Ollama),
            _ => Err(()),
        }
    }
}

/// 模型配置
///
/// 一次提取调用期间不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub name: String,
    pub provider: ProviderKind,
    /// 接口地址，为空时使用供应商默认地址
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// 供应商侧的模型标识
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub supports_vision: bool,
    pub supports_stream: bool,
    /// 调用失败时的总尝试次数
    pub max_retries: u32,
    pub is_default: bool,
    pub is_enabled: bool,
}

impl ModelConfig {
    /// 去掉末尾斜杠后的接口地址
    pub fn endpoint(&self) -> String {
        self.base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }
}

/// 发送给供应商的一次对话请求
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_content: String,
    /// base64 编码的截图，仅在模型支持视觉时携带
    pub image: Option<String>,
}

/// 供应商响应的统一形态
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub text: String,
    pub usage: TokenUsage,
}

/// Token 用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
        self.total_tokens += rhs.total_tokens;
    }
}

/// AI 提取状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Pending,
    Processing,
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AgentStatus::Pending => write!(f, "pending"),
            AgentStatus::Processing => write!(f, "processing"),
            AgentStatus::Success => write!(f, "success"),
            AgentStatus::Failed => write!(f, "failed"),
            AgentStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// 单个分块的处理信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub index: usize,
    pub status: AgentStatus,
    pub item_count: usize,
    pub cached: bool,
    pub error: Option<String>,
}

/// 并行分块提取的汇总信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParallelInfo {
    pub total_chunks: usize,
    pub batch_size: usize,
    pub cache_hits: usize,
    pub chunks: Vec<ChunkInfo>,
}

/// AI 提取结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub status: AgentStatus,
    pub model_id: String,
    pub model_name: Option<String>,
    pub user_prompt: String,
    pub system_prompt: Option<String>,
    /// 解析出的记录列表，无法解析时为空
    pub extracted_items: Option<Vec<Value>>,
    pub raw_response: Option<String>,
    pub usage: TokenUsage,
    /// 处理耗时（秒）
    pub processing_time: f64,
    pub error: Option<String>,
    /// 是否来自提取缓存
    #[serde(default)]
    pub cached: bool,
    pub parallel_info: Option<ParallelInfo>,
    pub created_at: DateTime<FixedOffset>,
    pub completed_at: Option<DateTime<FixedOffset>>,
}

impl AgentResult {
    /// 以待处理状态创建结果
    pub fn pending(model_id: &str, user_prompt: &str, system_prompt: Option<&str>) -> Self {
        Self {
            status: AgentStatus::Pending,
            model_id: model_id.to_string(),
            model_name: None,
            user_prompt: user_prompt.to_string(),
            system_prompt: system_prompt.map(str::to_string),
            extracted_items: None,
            raw_response: None,
            usage: TokenUsage::default(),
            processing_time: 0.0,
            error: None,
            cached: false,
            parallel_info: None,
            created_at: Utc::now().into(),
            completed_at: None,
        }
    }

    /// 标记失败
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.status = AgentStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now().into());
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == AgentStatus::Failed
    }
}
