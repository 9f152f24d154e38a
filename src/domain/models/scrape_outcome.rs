// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::llm::AgentResult;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// 视觉内容中分隔多个容器区域的分隔行
pub const BLOCK_SEPARATOR: &str = "\n---\n";

/// 捕获到的接口响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterceptedResponse {
    pub url: String,
    pub method: String,
    pub status: i64,
    pub headers: BTreeMap<String, String>,
    /// 能解析为 JSON 时为 JSON，否则为原始文本
    pub body: Value,
}

/// 页面元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    /// 请求的 URL
    pub url: String,
    /// 重定向后的实际 URL
    pub actual_url: Option<String>,
    pub status_code: Option<i64>,
    /// 耗时（秒）
    pub load_time: f64,
    pub timestamp: DateTime<FixedOffset>,
}

/// 成功的抓取结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub html: String,
    /// base64 编码的截图
    pub screenshot: Option<String>,
    pub metadata: PageMetadata,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub intercepted_apis: BTreeMap<String, Vec<InterceptedResponse>>,
    /// 交互步骤返回值，键为 `{action}_{index}`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub skill_results: BTreeMap<String, Value>,
    /// 视觉提取文本，失败时为失败描述
    pub visual_content: String,
    #[serde(default)]
    pub visual_extraction_failed: bool,
    pub agent_result: Option<AgentResult>,
    #[serde(default)]
    pub html_cached: bool,
    #[serde(default)]
    pub agent_cached: bool,
}

impl ScrapeResult {
    /// 用于写入渲染缓存的副本，不含 AI 提取结果
    pub fn render_only(&self) -> Self {
        Self {
            agent_result: None,
            html_cached: false,
            agent_cached: false,
            ..self.clone()
        }
    }

    /// AI 提取使用的文本：技能结果在前，视觉内容在后
    pub fn agent_content(&self) -> String {
        if self.skill_results.is_empty() {
            return self.visual_content.clone();
        }

        let mut content = String::from("### Skill Results ###\n");
        for (key, value) in &self.skill_results {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            content.push_str(&format!("{}: {}\n", key, rendered));
        }
        content.push_str("#####################\n\n");
        content.push_str(&self.visual_content);
        content
    }
}

/// 失败详情
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeFailure {
    pub error: super::task::TaskError,
    pub metadata: PageMetadata,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub intercepted_apis: BTreeMap<String, Vec<InterceptedResponse>>,
}

/// 抓取流水线的结构化输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScrapeOutcome {
    Success(Box<ScrapeResult>),
    Failed(ScrapeFailure),
}

impl ScrapeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScrapeOutcome::Success(_))
    }
}
