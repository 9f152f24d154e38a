// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::LlmSettings;
use crate::domain::models::llm::{AgentResult, AgentStatus, ChatRequest, ModelConfig};
use crate::infrastructure::llm::ChatProvider;
use crate::infrastructure::metrics;
use crate::utils::retry_policy::RetryPolicy;
use chrono::Utc;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

/// 内置的提取指令模板
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a web content extraction assistant. The user gives you the visible text of a rendered web page and describes the data they need. Extract every matching record from the page.

Rules:
1. Look for repeated structures such as list entries, cards or table rows.
2. Extract every field the user asks for.
3. Use null for a field that cannot be found on the page.
4. Keep values exactly as they appear; do not invent data.
5. Answer with JSON only.

Output format:
```json
{
  "items": [
    {"title": "Title 1", "price": "100", "link": "https://..."},
    {"title": "Title 2", "price": "200", "link": "https://..."}
  ]
}
```"#;

const TRUNCATION_MARKER: &str = "\n... [content truncated]";

/// 单次提取的输入
#[derive(Debug, Clone, Copy)]
pub struct AgentInput<'a> {
    /// 视觉内容（可能带技能结果前缀）
    pub content: &'a str,
    /// base64 截图
    pub screenshot: Option<&'a str>,
    pub user_prompt: &'a str,
    /// 自定义系统提示词，为空时使用内置模板
    pub system_prompt: Option<&'a str>,
    /// 抓取时用到的技能描述
    pub skills: &'a [String],
}

/// 构建系统提示词
///
/// # 参数
///
/// * `custom` - 自定义提示词，非空时替换内置模板
/// * `skills` - 技能描述，追加在末尾
pub fn build_system_prompt(custom: Option<&str>, skills: &[String]) -> String {
    let mut prompt = custom
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .to_string();

    if !skills.is_empty() {
        prompt.push_str("\n\nThe page was prepared with these actions:\n");
        for skill in skills {
            prompt.push_str("- ");
            prompt.push_str(skill);
            prompt.push('\n');
        }
    }
    prompt
}

/// 构建用户消息
///
/// 内容超过 `max_chars` 个字符时截断并追加标记
pub fn build_user_message(user_prompt: &str, content: &str, max_chars: usize) -> String {
    let content = match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &content[..cut], TRUNCATION_MARKER),
        None => content.to_string(),
    };

    format!(
        "Extraction request:\n{}\n\nPage content:\n```text\n{}\n```\n\nExtract the requested data and answer with JSON.",
        user_prompt, content
    )
}

/// 解析模型输出中的记录列表
///
/// 支持代码块包裹、裸数组、带 `items`/`data`/`results` 键的对象和单个对象。
/// 无法解析时返回 `None`
pub fn parse_extracted_items(text: &str) -> Option<Vec<Value>> {
    let body = strip_code_fence(text);
    let data: Value = match serde_json::from_str(body) {
        Ok(data) => data,
        Err(e) => {
            warn!("Model output is not valid JSON: {}", e);
            return None;
        }
    };

    match data {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => {
            for key in ["items", "data", "results"] {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return Some(items);
                }
            }
            Some(vec![Value::Object(map)])
        }
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let (start, skip) = if let Some(pos) = text.find("```json") {
        (pos, 7)
    } else if let Some(pos) = text.find("```") {
        (pos, 3)
    } else {
        return text.trim();
    };

    let inner = &text[start + skip..];
    match inner.find("```") {
        Some(end) => inner[..end].trim(),
        None => text.trim(),
    }
}

/// LLM 提取代理
///
/// 对一段内容执行一次（带重试的）模型调用
#[derive(Clone)]
pub struct LlmAgent {
    settings: LlmSettings,
}

impl LlmAgent {
    pub fn new(settings: LlmSettings) -> Self {
        Self { settings }
    }

    /// 调用模型提取结构化数据
    ///
    /// 失败时按模型的重试预算指数退避重试，只记录最后一次的错误
    ///
    /// # 参数
    ///
    /// * `model` - 已解析的模型配置
    /// * `provider` - 模型对应的供应商适配器
    /// * `input` - 提取输入
    ///
    /// # 返回值
    ///
    /// 成功或失败状态的提取结果，不会返回错误
    pub async fn run(
        &self,
        model: &ModelConfig,
        provider: &dyn ChatProvider,
        input: AgentInput<'_>,
    ) -> AgentResult {
        let started = Instant::now();
        let mut result = AgentResult::pending(&model.id, input.user_prompt, input.system_prompt);
        result.model_name = Some(model.name.clone());
        result.status = AgentStatus::Processing;

        let request = ChatRequest {
            system_prompt: build_system_prompt(input.system_prompt, input.skills),
            user_content: build_user_message(
                input.user_prompt,
                input.content,
                self.settings.max_content_chars,
            ),
            image: input
                .screenshot
                .filter(|_| model.supports_vision)
                .map(str::to_string),
        };

        let policy = RetryPolicy::for_llm(model.max_retries);
        let request = &request;
        let response = policy
            .execute(|attempt| async move {
                debug!(
                    "Calling model {} (attempt {}, stream: {})",
                    model.id, attempt, model.supports_stream
                );
                let outcome = if model.supports_stream {
                    provider.complete_stream(request).await
                } else {
                    provider.complete(request).await
                };
                let tokens = outcome.as_ref().map(|r| r.usage.total_tokens).unwrap_or(0);
                metrics::record_llm_request(&provider.kind().to_string(), outcome.is_ok(), tokens);
                outcome
            })
            .await;

        result.processing_time = started.elapsed().as_secs_f64();
        match response {
            Ok(response) => {
                result.extracted_items = parse_extracted_items(&response.text);
                result.raw_response = Some(response.text);
                result.usage = response.usage;
                result.status = AgentStatus::Success;
                result.completed_at = Some(Utc::now().into());
                info!(
                    "Model {} extracted {} items in {:.2}s",
                    model.id,
                    result.extracted_items.as_ref().map_or(0, Vec::len),
                    result.processing_time
                );
                result
            }
            Err(e) => {
                warn!("Model {} extraction failed: {}", model.id, e);
                result.fail(e.to_string())
            }
        }
    }
}
