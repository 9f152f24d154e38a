// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::scrape_outcome::ScrapeResult;
use crate::domain::models::scrape_params::ScrapeParams;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 工作节点停止时写入被重置任务的错误信息
pub const NODE_STOPPED_MESSAGE: &str = "Node stopped during processing";

/// 任务实体
///
/// 一次抓取（可附带 AI 提取）的工作单元。入队前归提交方所有，
/// 入队后只由领取它的工作节点修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 目标URL
    pub url: String,
    /// 抓取参数
    pub params: ScrapeParams,
    /// 任务优先级，数值越大越先处理
    pub priority: i32,
    /// 缓存策略
    pub cache: CacheConfig,
    /// 任务状态
    pub status: TaskStatus,
    /// 成功时的抓取结果
    pub result: Option<ScrapeResult>,
    /// 失败时的错误信息
    pub error: Option<TaskError>,
    /// 处理该任务的节点
    pub node_id: Option<String>,
    /// 是否直接命中渲染缓存
    pub cached: bool,
    pub html_cached: bool,
    pub agent_cached: bool,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    pub completed_at: Option<DateTime<FixedOffset>>,
}

/// 缓存策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    /// 过期时间（秒），为空时使用全局默认值
    pub ttl: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Some(3600),
        }
    }
}

/// 任务错误信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub message: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
        }
    }

    pub fn with_kind(message: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: Some(kind.into()),
        }
    }
}

/// 任务状态枚举
///
/// Pending → Processing → Success/Failed，重试与节点停止会回到 Pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// 等待处理
    #[default]
    Pending,
    /// 正在被某个节点处理
    Processing,
    /// 成功
    Success,
    /// 失败
    Failed,
}

impl TaskStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "success" => Ok(TaskStatus::Success),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(()),
        }
    }
}

impl Task {
    /// 创建一个新的待处理任务
    ///
    /// # 参数
    ///
    /// * `url` - 目标URL
    /// * `params` - 抓取参数
    /// * `cache` - 缓存策略
    /// * `priority` - 优先级
    pub fn new(url: String, params: ScrapeParams, cache: CacheConfig, priority: i32) -> Self {
        let now: DateTime<FixedOffset> = Utc::now().into();
        Self {
            id: Uuid::new_v4(),
            url,
            params,
            priority,
            cache,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            node_id: None,
            cached: false,
            html_cached: false,
            agent_cached: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// 构造投递到队列的消息
    pub fn to_message(&self) -> QueueMessage {
        QueueMessage {
            task_id: self.id,
            url: self.url.clone(),
            params: self.params.clone(),
            cache: self.cache,
            priority: self.priority,
        }
    }
}

/// 队列消息
///
/// `{task_id, url, params, cache:{enabled,ttl}, priority}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub task_id: Uuid,
    pub url: String,
    pub params: ScrapeParams,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    1
}

/// 任务字段级更新
///
/// 未设置的字段保持不变；`Some(None)` 表示清空
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub params: Option<ScrapeParams>,
    pub result: Option<Option<ScrapeResult>>,
    pub error: Option<Option<TaskError>>,
    pub node_id: Option<Option<String>>,
    pub cached: Option<bool>,
    pub html_cached: Option<bool>,
    pub agent_cached: Option<bool>,
    pub completed_at: Option<Option<DateTime<FixedOffset>>>,
}

impl TaskUpdate {
    /// 标记为处理中
    pub fn processing(node_id: &str) -> Self {
        Self {
            status: Some(TaskStatus::Processing),
            node_id: Some(Some(node_id.to_string())),
            ..Default::default()
        }
    }

    /// 标记为成功
    pub fn success(result: ScrapeResult, cached: bool) -> Self {
        Self {
            status: Some(TaskStatus::Success),
            html_cached: Some(result.html_cached),
            agent_cached: Some(result.agent_cached),
            result: Some(Some(result)),
            error: Some(None),
            cached: Some(cached),
            completed_at: Some(Some(Utc::now().into())),
            ..Default::default()
        }
    }

    /// 标记为失败
    pub fn failed(error: TaskError) -> Self {
        Self {
            status: Some(TaskStatus::Failed),
            error: Some(Some(error)),
            completed_at: Some(Some(Utc::now().into())),
            ..Default::default()
        }
    }

    /// 重置为待处理，清空结果、错误和节点
    pub fn reset() -> Self {
        Self {
            status: Some(TaskStatus::Pending),
            result: Some(None),
            error: Some(None),
            node_id: Some(None),
            cached: Some(false),
            html_cached: Some(false),
            agent_cached: Some(false),
            completed_at: Some(None),
            ..Default::default()
        }
    }

    /// 把更新应用到内存中的任务
    pub fn apply(self, task: &mut Task) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(params) = self.params {
            task.params = params;
        }
        if let Some(result) = self.result {
            task.result = result;
        }
        if let Some(error) = self.error {
            task.error = error;
        }
        if let Some(node_id) = self.node_id {
            task.node_id = node_id;
        }
        if let Some(cached) = self.cached {
            task.cached = cached;
        }
        if let Some(html_cached) = self.html_cached {
            task.html_cached = html_cached;
        }
        if let Some(agent_cached) = self.agent_cached {
            task.agent_cached = agent_cached;
        }
        if let Some(completed_at) = self.completed_at {
            task.completed_at = completed_at;
        }
        task.updated_at = Utc::now().into();
    }
}
