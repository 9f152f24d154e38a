// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::llm::{ModelConfig, ProviderKind};
use crate::domain::repositories::model_config_repository::ModelConfigRepository;
use crate::domain::repositories::task_repository::RepositoryError;
use crate::infrastructure::database::entities::llm_model;
use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;
use tracing::warn;

/// 模型配置仓库实现
#[derive(Clone)]
pub struct ModelConfigRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl ModelConfigRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<llm_model::Model> for ModelConfig {
    fn from(model: llm_model::Model) -> Self {
        let provider = model.provider.parse().unwrap_or_else(|_| {
            warn!(
                "Unknown provider '{}' for model {}, treating as OpenAI-compatible",
                model.provider, model.id
            );
            ProviderKind::OpenAi
        });

        Self {
            id: model.id,
            name: model.name,
            provider,
            base_url: model.base_url,
            api_key: model.api_key,
            model: model.model_name,
            temperature: model.temperature,
            max_tokens: model.max_tokens.max(1) as u32,
            supports_vision: model.supports_vision,
            supports_stream: model.supports_stream,
            max_retries: model.max_retries.max(0) as u32,
            is_default: model.is_default,
            is_enabled: model.is_enabled,
        }
    }
}

#[async_trait]
impl ModelConfigRepository for ModelConfigRepositoryImpl {
    async fn find_by_id(&self, id: &str) -> Result<Option<ModelConfig>, RepositoryError> {
        Ok(llm_model::Entity::find_by_id(id.to_string())
            .one(self.db.as_ref())
            .await?
            .map(Into::into))
    }
}
