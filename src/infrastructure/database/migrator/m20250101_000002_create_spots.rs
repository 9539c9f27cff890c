//! Create spots table
//!
//! One row per (location, spot number). Occupancy columns are only written
//! through conditional UPDATEs.

use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_locations::Locations;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Spots::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Spots::LocationId).integer().not_null())
                    .col(ColumnDef::new(Spots::SpotNumber).integer().not_null())
                    .col(
                        ColumnDef::new(Spots::IsOccupied)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Spots::BookedBy).string())
                    .col(ColumnDef::new(Spots::BookingStart).timestamp_with_time_zone())
                    .primary_key(
                        Index::create()
                            .col(Spots::LocationId)
                            .col(Spots::SpotNumber),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_spots_location")
                            .from(Spots::Table, Spots::LocationId)
                            .to(Locations::Table, Locations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_spots_booked_by")
                    .table(Spots::Table)
                    .col(Spots::BookedBy)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Spots::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Spots {
    Table,
    LocationId,
    SpotNumber,
    IsOccupied,
    BookedBy,
    BookingStart,
}
