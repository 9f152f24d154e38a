// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{CacheConfig, Task, TaskError, TaskStatus, TaskUpdate};
use crate::domain::repositories::task_repository::{RepositoryError, TaskRepository};
use crate::infrastructure::database::entities::task as task_entity;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 任务仓库实现
///
/// 基于SeaORM实现的任务数据访问层
#[derive(Clone)]
pub struct TaskRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl TaskRepositoryImpl {
    /// 创建新的任务仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<task_entity::Model> for Task {
    type Error = RepositoryError;

    fn try_from(model: task_entity::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            url: model.url,
            params: serde_json::from_value(model.params)?,
            priority: model.priority,
            cache: CacheConfig {
                enabled: model.cache_enabled,
                ttl: model.cache_ttl.map(|ttl| ttl.max(0) as u64),
            },
            status: model.status.parse().unwrap_or_default(),
            result: model.result.map(serde_json::from_value).transpose()?,
            error: model.error.map(serde_json::from_value).transpose()?,
            node_id: model.node_id,
            cached: model.cached,
            html_cached: model.html_cached,
            agent_cached: model.agent_cached,
            created_at: model.created_at,
            updated_at: model.updated_at,
            completed_at: model.completed_at,
        })
    }
}

impl TryFrom<&Task> for task_entity::ActiveModel {
    type Error = RepositoryError;

    fn try_from(task: &Task) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Set(task.id),
            url: Set(task.url.clone()),
            params: Set(serde_json::to_value(&task.params)?),
            priority: Set(task.priority),
            cache_enabled: Set(task.cache.enabled),
            cache_ttl: Set(task.cache.ttl.map(|ttl| ttl as i64)),
            status: Set(task.status.to_string()),
            result: Set(task.result.as_ref().map(serde_json::to_value).transpose()?),
            error: Set(task.error.as_ref().map(serde_json::to_value).transpose()?),
            node_id: Set(task.node_id.clone()),
            cached: Set(task.cached),
            html_cached: Set(task.html_cached),
            agent_cached: Set(task.agent_cached),
            created_at: Set(task.created_at),
            updated_at: Set(task.updated_at),
            completed_at: Set(task.completed_at),
        })
    }
}

/// 把补丁中出现的字段写入活动模型，并刷新更新时间
fn set_fields(
    active: &mut task_entity::ActiveModel,
    update: TaskUpdate,
) -> Result<(), RepositoryError> {
    if let Some(status) = update.status {
        active.status = Set(status.to_string());
    }
    if let Some(params) = update.params {
        active.params = Set(serde_json::to_value(params)?);
    }
    if let Some(result) = update.result {
        active.result = Set(result.map(serde_json::to_value).transpose()?);
    }
    if let Some(error) = update.error {
        active.error = Set(error.map(serde_json::to_value).transpose()?);
    }
    if let Some(node_id) = update.node_id {
        active.node_id = Set(node_id);
    }
    if let Some(cached) = update.cached {
        active.cached = Set(cached);
    }
    if let Some(html_cached) = update.html_cached {
        active.html_cached = Set(html_cached);
    }
    if let Some(agent_cached) = update.agent_cached {
        active.agent_cached = Set(agent_cached);
    }
    if let Some(completed_at) = update.completed_at {
        active.completed_at = Set(completed_at);
    }
    active.updated_at = Set(Utc::now().into());
    Ok(())
}

#[async_trait]
impl TaskRepository for TaskRepositoryImpl {
    async fn insert(&self, task: &Task) -> Result<Task, RepositoryError> {
        let model = task_entity::ActiveModel::try_from(task)?;
        model.insert(self.db.as_ref()).await?;
        Ok(task.clone())
    }

    async fn find_one(&self, id: Uuid) -> Result<Option<Task>, RepositoryError> {
        task_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(Task::try_from)
            .transpose()
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Task>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        task_entity::Entity::find()
            .filter(task_entity::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(Task::try_from)
            .collect()
    }

    async fn update(&self, id: Uuid, update: TaskUpdate) -> Result<Task, RepositoryError> {
        let model = task_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let mut active: task_entity::ActiveModel = model.into();
        set_fields(&mut active, update)?;
        let updated = active.update(self.db.as_ref()).await?;
        Task::try_from(updated)
    }

    async fn update_if_owned(
        &self,
        id: Uuid,
        node_id: &str,
        update: TaskUpdate,
    ) -> Result<Option<Task>, RepositoryError> {
        let mut active = <task_entity::ActiveModel as ActiveModelTrait>::default();
        set_fields(&mut active, update)?;

        let result = task_entity::Entity::update_many()
            .set(active)
            .filter(task_entity::Column::Id.eq(id))
            .filter(task_entity::Column::Status.eq(TaskStatus::Processing.to_string()))
            .filter(task_entity::Column::NodeId.eq(node_id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_one(id).await
    }

    async fn reset_to_pending(
        &self,
        ids: &[Uuid],
        error: TaskError,
    ) -> Result<u64, RepositoryError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Pending.to_string()),
            )
            .col_expr(
                task_entity::Column::Error,
                Expr::value(serde_json::to_value(error)?),
            )
            .col_expr(
                task_entity::Column::NodeId,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                task_entity::Column::UpdatedAt,
                Expr::value(chrono::DateTime::<chrono::FixedOffset>::from(Utc::now())),
            )
            .filter(task_entity::Column::Id.is_in(ids.to_vec()))
            .filter(task_entity::Column::Status.is_in([
                TaskStatus::Pending.to_string(),
                TaskStatus::Processing.to_string(),
            ]))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, RepositoryError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = task_entity::Entity::delete_many()
            .filter(task_entity::Column::Id.is_in(ids.to_vec()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }

    async fn count(&self, status: Option<TaskStatus>) -> Result<u64, RepositoryError> {
        let mut query = task_entity::Entity::find();
        if let Some(status) = status {
            query = query.filter(task_entity::Column::Status.eq(status.to_string()));
        }
        Ok(query.count(self.db.as_ref()).await?)
    }
}
