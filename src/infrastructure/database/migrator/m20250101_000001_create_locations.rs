//! Create locations table
//!
//! Catalog of parking facilities. Rows are provisioned from configuration
//! and only read by the reservation core.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Locations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Locations::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Locations::Name).string().not_null())
                    .col(ColumnDef::new(Locations::Address).string().not_null())
                    .col(ColumnDef::new(Locations::TotalSpots).integer().not_null())
                    .col(
                        ColumnDef::new(Locations::PricePerHour)
                            .string()
                            .not_null()
                            .default("0"),
                    )
                    .col(ColumnDef::new(Locations::Rows).integer().not_null())
                    .col(ColumnDef::new(Locations::SpotsPerRow).integer().not_null())
                    .col(
                        ColumnDef::new(Locations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Locations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Locations {
    Table,
    Id,
    Name,
    Address,
    TotalSpots,
    PricePerHour,
    Rows,
    SpotsPerRow,
    UpdatedAt,
}
