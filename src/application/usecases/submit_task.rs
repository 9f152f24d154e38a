// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::SubmitSettings;
use crate::domain::models::scrape_params::ScrapeParams;
use crate::domain::models::task::{CacheConfig, Task, TaskError, TaskUpdate};
use crate::domain::repositories::task_repository::{RepositoryError, TaskRepository};
use crate::infrastructure::cache::cache_service::CacheService;
use crate::queue::task_queue::{QueueError, TaskQueue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

/// 同步等待时参数未给出超时时的默认值（毫秒）
const DEFAULT_AWAIT_TIMEOUT_MS: u64 = 30_000;

/// 提交错误类型
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// 投递失败，任务已被标记为失败
    #[error("Failed to queue task {task_id}: {source}")]
    Queue {
        task_id: Uuid,
        #[source]
        source: QueueError,
    },

    #[error("Task not found: {0}")]
    NotFound(Uuid),

    /// 同步等待超时，任务仍在处理
    #[error("Task {0} did not finish in time")]
    Timeout(Uuid),

    #[error("Invalid request: {0}")]
    Validation(String),
}

/// 抓取提交请求
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SubmitRequest {
    #[validate(url)]
    pub url: String,
    #[serde(default)]
    pub params: ScrapeParams,
    #[serde(default)]
    pub cache: CacheConfig,
    #[validate(range(min = 0, max = 10))]
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    1
}

impl SubmitRequest {
    pub fn new(url: impl Into<String>, params: ScrapeParams) -> Self {
        Self {
            url: url.into(),
            params,
            cache: CacheConfig::default(),
            priority: default_priority(),
        }
    }
}

/// 任务提交器
///
/// 负责创建任务记录并投递到队列，可选地轮询等待结果
#[derive(Clone)]
pub struct TaskSubmitter {
    tasks: Arc<dyn TaskRepository>,
    queue: Arc<dyn TaskQueue>,
    settings: SubmitSettings,
    cache: Option<CacheService>,
}

impl TaskSubmitter {
    /// 创建任务提交器
    ///
    /// # 参数
    ///
    /// * `tasks` - 任务仓库
    /// * `queue` - 任务队列
    /// * `settings` - 提交配置
    pub fn new(tasks: Arc<dyn TaskRepository>, queue: Arc<dyn TaskQueue>, settings: SubmitSettings) -> Self {
        Self {
            tasks,
            queue,
            settings,
            cache: None,
        }
    }

    /// 启用同步提交的渲染缓存快速路径
    pub fn with_cache(mut self, cache: CacheService) -> Self {
        self.cache = Some(cache);
        self
    }

    /// 创建并投递任务
    ///
    /// # 返回值
    ///
    /// * `Ok(Task)` - 已入队的待处理任务
    /// * `Err(SubmitError)` - 校验、存储或投递失败；投递失败时任务记录已标记为失败
    pub async fn submit(&self, request: SubmitRequest) -> Result<Task, SubmitError> {
        request
            .validate()
            .map_err(|e| SubmitError::Validation(e.to_string()))?;

        let task = Task::new(request.url, request.params, request.cache, request.priority);
        let task = self.tasks.insert(&task).await?;
        self.publish(&task).await?;
        info!("Submitted task {} for {}", task.id, task.url);
        Ok(task)
    }

    /// 提交任务并等待其到达终态
    ///
    /// 渲染缓存命中且无需 AI 提取时直接记录一条成功任务，不经过队列。
    /// 等待时长取任务的 `timeout` 参数，超时返回 `SubmitError::Timeout`
    pub async fn submit_and_await(&self, request: SubmitRequest) -> Result<Task, SubmitError> {
        request
            .validate()
            .map_err(|e| SubmitError::Validation(e.to_string()))?;
        if let Some(task) = self.complete_from_cache(&request).await? {
            return Ok(task);
        }

        let timeout_ms = match request.params.timeout {
            0 => DEFAULT_AWAIT_TIMEOUT_MS,
            ms => ms,
        };
        let task = self.submit(request).await?;
        self.await_terminal(task.id, Duration::from_millis(timeout_ms)).await
    }

    async fn complete_from_cache(&self, request: &SubmitRequest) -> Result<Option<Task>, SubmitError> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        // AI 提取仍交给工作节点执行
        if !request.cache.enabled || request.params.agent_requested() {
            return Ok(None);
        }
        let Some(mut result) = cache.get_render(&request.url, &request.params).await else {
            return Ok(None);
        };
        result.html_cached = true;

        let task = Task::new(
            request.url.clone(),
            request.params.clone(),
            request.cache,
            request.priority,
        );
        let task = self.tasks.insert(&task).await?;
        let task = self
            .tasks
            .update(task.id, TaskUpdate::success(result, true))
            .await?;
        info!("Served task {} for {} from render cache", task.id, task.url);
        Ok(Some(task))
    }

    /// 轮询直到任务进入终态
    ///
    /// 最后一次查询恰好落在截止时间上
    pub async fn await_terminal(&self, task_id: Uuid, timeout: Duration) -> Result<Task, SubmitError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let interval = Duration::from_millis(self.settings.poll_interval_ms.max(1));
        loop {
            let task = self
                .tasks
                .find_one(task_id)
                .await?
                .ok_or(SubmitError::NotFound(task_id))?;
            if task.status.is_terminal() {
                return Ok(task);
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(SubmitError::Timeout(task_id));
            }
            tokio::time::sleep(interval.min(remaining)).await;
        }
    }

    /// 重试任务
    ///
    /// 清空结果、错误和节点后重新投递，可同时替换 AI 模型。
    /// 重新投递失败时任务再次被标记为失败，以任务而非错误的形式返回
    ///
    /// # 参数
    ///
    /// * `task_id` - 任务ID
    /// * `model_id` - 新的模型ID
    pub async fn retry(&self, task_id: Uuid, model_id: Option<String>) -> Result<Task, SubmitError> {
        let existing = self
            .tasks
            .find_one(task_id)
            .await?
            .ok_or(SubmitError::NotFound(task_id))?;

        let mut update = TaskUpdate::reset();
        if let Some(model_id) = model_id.filter(|id| !id.trim().is_empty()) {
            let mut params = existing.params.clone();
            params.agent_model_id = Some(model_id);
            update.params = Some(params);
        }

        let task = self.tasks.update(task_id, update).await?;
        match self.publish(&task).await {
            Ok(()) => {
                info!("Requeued task {}", task_id);
                Ok(task)
            }
            Err(SubmitError::Queue { .. }) => {
                warn!("Retry of task {} could not be queued", task_id);
                self.tasks
                    .find_one(task_id)
                    .await?
                    .ok_or(SubmitError::NotFound(task_id))
            }
            Err(e) => Err(e),
        }
    }

    /// 批量提交
    ///
    /// 每个请求独立处理，返回值与输入一一对应
    pub async fn submit_batch(&self, requests: Vec<SubmitRequest>) -> Vec<Result<Uuid, SubmitError>> {
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            outcomes.push(self.submit(request).await.map(|task| task.id));
        }
        outcomes
    }

    async fn publish(&self, task: &Task) -> Result<(), SubmitError> {
        if let Err(source) = self.queue.publish(&task.to_message()).await {
            error!("Failed to queue task {}: {}", task.id, source);
            self.tasks
                .update(
                    task.id,
                    TaskUpdate::failed(TaskError::with_kind(
                        format!("Failed to queue task: {}", source),
                        "QueueError",
                    )),
                )
                .await?;
            return Err(SubmitError::Queue {
                task_id: task.id,
                source,
            });
        }
        Ok(())
    }
}
