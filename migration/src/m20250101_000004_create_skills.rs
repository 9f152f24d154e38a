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
                    .table(Skills::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Skills::Name).string().not_null().primary_key())
                    .col(ColumnDef::new(Skills::DisplayName).string().not_null())
                    .col(ColumnDef::new(Skills::SkillType).string().not_null())
                    .col(ColumnDef::new(Skills::Description).text().not_null().default(""))
                    .col(ColumnDef::new(Skills::JsCode).text().not_null())
                    .col(ColumnDef::new(Skills::ParamsSchema).json().not_null())
                    .col(
                        ColumnDef::new(Skills::IsBuiltin)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Skills::IsEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Skills::UpdatedAt)
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
            .drop_table(Table::drop().table(Skills::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Skills {
    Table,
    Name,
    DisplayName,
    SkillType,
    Description,
    JsCode,
    ParamsSchema,
    IsBuiltin,
    IsEnabled,
    UpdatedAt,
}
