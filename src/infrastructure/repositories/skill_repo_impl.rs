// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::skill::{SkillCategory, SkillDefinition};
use crate::domain::repositories::skill_repository::SkillRepository;
use crate::domain::repositories::task_repository::RepositoryError;
use crate::infrastructure::database::entities::skill;
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;

/// 技能库实现
#[derive(Clone)]
pub struct SkillRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl SkillRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<skill::Model> for SkillDefinition {
    fn from(model: skill::Model) -> Self {
        Self {
            name: model.name,
            display_name: model.display_name,
            category: model
                .skill_type
                .parse()
                .unwrap_or(SkillCategory::Interaction),
            description: model.description,
            script: model.js_code,
            params_schema: model.params_schema,
            is_enabled: model.is_enabled,
            is_builtin: model.is_builtin,
        }
    }
}

#[async_trait]
impl SkillRepository for SkillRepositoryImpl {
    async fn find_enabled_by_name(
        &self,
        name: &str,
    ) -> Result<Option<SkillDefinition>, RepositoryError> {
        Ok(skill::Entity::find_by_id(name.to_string())
            .filter(skill::Column::IsEnabled.eq(true))
            .one(self.db.as_ref())
            .await?
            .map(Into::into))
    }
}
