// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Task, TaskError, TaskStatus, TaskUpdate};
use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 任务仓库特质
///
/// 任务记录存储接口，所有修改都是按任务ID的整字段替换
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 插入新任务
    async fn insert(&self, task: &Task) -> Result<Task, RepositoryError>;
    /// 根据ID查找任务
    async fn find_one(&self, id: Uuid) -> Result<Option<Task>, RepositoryError>;
    /// 批量查找任务
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Task>, RepositoryError>;
    /// 更新任务字段
    ///
    /// # 返回值
    ///
    /// * `Ok(Task)` - 更新后的任务
    /// * `Err(RepositoryError::NotFound)` - 任务不存在
    async fn update(&self, id: Uuid, update: TaskUpdate) -> Result<Task, RepositoryError>;
    /// 仅当任务仍处于处理中且归属该节点时写入更新
    ///
    /// 判断与写入在同一条语句内完成，停止流程的重置不会被覆盖
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(Task))` - 更新后的任务
    /// * `Ok(None)` - 任务已被重置、转交其他节点或删除，未写入
    async fn update_if_owned(
        &self,
        id: Uuid,
        node_id: &str,
        update: TaskUpdate,
    ) -> Result<Option<Task>, RepositoryError>;
    /// 把一批任务重置为待处理，写入错误说明并清空节点
    ///
    /// 只影响仍处于非终态的任务，返回受影响的行数
    async fn reset_to_pending(&self, ids: &[Uuid], error: TaskError)
        -> Result<u64, RepositoryError>;
    /// 批量删除任务
    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, RepositoryError>;
    /// 统计任务数量，可按状态过滤
    async fn count(&self, status: Option<TaskStatus>) -> Result<u64, RepositoryError>;
}
