// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::llm::ModelConfig;
use crate::domain::repositories::task_repository::RepositoryError;
use async_trait::async_trait;

/// 模型配置仓库特质，只读
#[async_trait]
pub trait ModelConfigRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<ModelConfig>, RepositoryError>;
}
