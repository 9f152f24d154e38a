// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LlmModels::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LlmModels::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(LlmModels::Name).string().not_null())
                    .col(ColumnDef::new(LlmModels::Provider).string().not_null())
                    .col(ColumnDef::new(LlmModels::BaseUrl).string())
                    .col(ColumnDef::new(LlmModels::ApiKey).string())
                    .col(ColumnDef::new(LlmModels::ModelName).string().not_null())
                    .col(
                        ColumnDef::new(LlmModels::Temperature)
                            .double()
                            .not_null()
                            .default(0.1),
                    )
                    .col(
                        ColumnDef::new(LlmModels::MaxTokens)
                            .integer()
                            .not_null()
                            .default(4096),
                    )
                    .col(
                        ColumnDef::new(LlmModels::SupportsVision)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(LlmModels::SupportsStream)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(LlmModels::MaxRetries)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(
                        ColumnDef::new(LlmModels::IsDefault)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(LlmModels::IsEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(LlmModels::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LlmModels::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LlmModels {
    Table,
    Id,
    Name,
    Provider,
    BaseUrl,
    ApiKey,
    ModelName,
    Temperature,
    MaxTokens,
    SupportsVision,
    SupportsStream,
    MaxRetries,
    IsDefault,
    IsEnabled,
    CreatedAt,
}
