// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 内存版仓库实现
//!
//! 用于单进程运行和测试，语义与数据库实现保持一致

use crate::domain::models::llm::ModelConfig;
use crate::domain::models::node::{Node, NodeStatus};
use crate::domain::models::skill::SkillDefinition;
use crate::domain::models::task::{Task, TaskError, TaskStatus, TaskUpdate};
use crate::domain::repositories::model_config_repository::ModelConfigRepository;
use crate::domain::repositories::node_repository::NodeRepository;
use crate::domain::repositories::skill_repository::SkillRepository;
use crate::domain::repositories::task_repository::{RepositoryError, TaskRepository};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

/// 内存任务仓库
#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: DashMap<Uuid, Task>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn insert(&self, task: &Task) -> Result<Task, RepositoryError> {
        self.tasks.insert(task.id, task.clone());
        Ok(task.clone())
    }

    async fn find_one(&self, id: Uuid) -> Result<Option<Task>, RepositoryError> {
        Ok(self.tasks.get(&id).map(|t| t.clone()))
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Task>, RepositoryError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.tasks.get(id).map(|t| t.clone()))
            .collect())
    }

    async fn update(&self, id: Uuid, update: TaskUpdate) -> Result<Task, RepositoryError> {
        let mut entry = self.tasks.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        update.apply(entry.value_mut());
        Ok(entry.clone())
    }

    async fn update_if_owned(
        &self,
        id: Uuid,
        node_id: &str,
        update: TaskUpdate,
    ) -> Result<Option<Task>, RepositoryError> {
        let Some(mut entry) = self.tasks.get_mut(&id) else {
            return Ok(None);
        };
        let task = entry.value_mut();
        if task.status != TaskStatus::Processing || task.node_id.as_deref() != Some(node_id) {
            return Ok(None);
        }
        update.apply(task);
        Ok(Some(task.clone()))
    }

    async fn reset_to_pending(
        &self,
        ids: &[Uuid],
        error: TaskError,
    ) -> Result<u64, RepositoryError> {
        let mut affected = 0;
        for id in ids {
            if let Some(mut task) = self.tasks.get_mut(id) {
                if task.status.is_terminal() {
                    continue;
                }
                task.status = TaskStatus::Pending;
                task.error = Some(error.clone());
                task.node_id = None;
                task.updated_at = Utc::now().into();
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, RepositoryError> {
        Ok(ids
            .iter()
            .filter(|id| self.tasks.remove(*id).is_some())
            .count() as u64)
    }

    async fn count(&self, status: Option<TaskStatus>) -> Result<u64, RepositoryError> {
        Ok(self
            .tasks
            .iter()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .count() as u64)
    }
}

/// 内存节点仓库
#[derive(Default)]
pub struct InMemoryNodeRepository {
    nodes: DashMap<String, Node>,
}

impl InMemoryNodeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NodeRepository for InMemoryNodeRepository {
    async fn heartbeat(&self, node_id: &str) -> Result<(), RepositoryError> {
        let now = Utc::now().into();
        self.nodes
            .entry(node_id.to_string())
            .and_modify(|node| {
                node.status = NodeStatus::Running;
                node.last_seen = now;
            })
            .or_insert_with(|| Node {
                node_id: node_id.to_string(),
                status: NodeStatus::Running,
                started_at: now,
                last_seen: now,
            });
        Ok(())
    }

    async fn mark_stopped(&self, node_id: &str) -> Result<(), RepositoryError> {
        let mut node = self
            .nodes
            .get_mut(node_id)
            .ok_or(RepositoryError::NotFound)?;
        node.status = NodeStatus::Stopped;
        node.last_seen = Utc::now().into();
        Ok(())
    }

    async fn find(&self, node_id: &str) -> Result<Option<Node>, RepositoryError> {
        Ok(self.nodes.get(node_id).map(|n| n.clone()))
    }
}

/// 内存模型配置仓库
#[derive(Default)]
pub struct InMemoryModelConfigRepository {
    models: DashMap<String, ModelConfig>,
}

impl InMemoryModelConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(self, model: ModelConfig) -> Self {
        self.models.insert(model.id.clone(), model);
        self
    }
}

#[async_trait]
impl ModelConfigRepository for InMemoryModelConfigRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<ModelConfig>, RepositoryError> {
        Ok(self.models.get(id).map(|m| m.clone()))
    }
}

/// 内存技能库
#[derive(Default)]
pub struct InMemorySkillRepository {
    skills: DashMap<String, SkillDefinition>,
}

impl InMemorySkillRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skill(self, skill: SkillDefinition) -> Self {
        self.skills.insert(skill.name.clone(), skill);
        self
    }
}

#[async_trait]
impl SkillRepository for InMemorySkillRepository {
    async fn find_enabled_by_name(
        &self,
        name: &str,
    ) -> Result<Option<SkillDefinition>, RepositoryError> {
        Ok(self
            .skills
            .get(name)
            .filter(|s| s.is_enabled)
            .map(|s| s.clone()))
    }
}
