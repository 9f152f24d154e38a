// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::node::{Node, NodeStatus};
use crate::domain::repositories::node_repository::NodeRepository;
use crate::domain::repositories::task_repository::RepositoryError;
use crate::infrastructure::database::entities::node as node_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;

/// 节点仓库实现
#[derive(Clone)]
pub struct NodeRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl NodeRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<node_entity::Model> for Node {
    fn from(model: node_entity::Model) -> Self {
        Self {
            node_id: model.node_id,
            status: model.status.parse().unwrap_or_default(),
            started_at: model.started_at,
            last_seen: model.last_seen,
        }
    }
}

#[async_trait]
impl NodeRepository for NodeRepositoryImpl {
    async fn heartbeat(&self, node_id: &str) -> Result<(), RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();
        let existing = node_entity::Entity::find_by_id(node_id.to_string())
            .one(self.db.as_ref())
            .await?;

        match existing {
            Some(model) => {
                let mut active: node_entity::ActiveModel = model.into();
                active.status = Set(NodeStatus::Running.to_string());
                active.last_seen = Set(now);
                active.update(self.db.as_ref()).await?;
            }
            None => {
                node_entity::ActiveModel {
                    node_id: Set(node_id.to_string()),
                    status: Set(NodeStatus::Running.to_string()),
                    started_at: Set(now),
                    last_seen: Set(now),
                }
                .insert(self.db.as_ref())
                .await?;
            }
        }
        Ok(())
    }

    async fn mark_stopped(&self, node_id: &str) -> Result<(), RepositoryError> {
        let model = node_entity::Entity::find_by_id(node_id.to_string())
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let mut active: node_entity::ActiveModel = model.into();
        active.status = Set(NodeStatus::Stopped.to_string());
        active.last_seen = Set(Utc::now().into());
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn find(&self, node_id: &str) -> Result<Option<Node>, RepositoryError> {
        Ok(node_entity::Entity::find_by_id(node_id.to_string())
            .one(self.db.as_ref())
            .await?
            .map(Into::into))
    }
}
