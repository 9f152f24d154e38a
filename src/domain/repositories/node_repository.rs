// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::node::Node;
use crate::domain::repositories::task_repository::RepositoryError;
use async_trait::async_trait;

/// 节点仓库特质
#[async_trait]
pub trait NodeRepository: Send + Sync {
    /// 写入心跳，节点不存在时创建为运行状态
    async fn heartbeat(&self, node_id: &str) -> Result<(), RepositoryError>;
    /// 标记节点已停止
    async fn mark_stopped(&self, node_id: &str) -> Result<(), RepositoryError>;
    /// 查找节点
    async fn find(&self, node_id: &str) -> Result<Option<Node>, RepositoryError>;
}
