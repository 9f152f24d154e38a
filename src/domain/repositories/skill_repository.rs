// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::skill::SkillDefinition;
use crate::domain::repositories::task_repository::RepositoryError;
use async_trait::async_trait;

/// 技能库特质，只读
#[async_trait]
pub trait SkillRepository: Send + Sync {
    /// 按名称查找已启用的技能
    async fn find_enabled_by_name(
        &self,
        name: &str,
    ) -> Result<Option<SkillDefinition>, RepositoryError>;
}
