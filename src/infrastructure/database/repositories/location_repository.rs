//! SeaORM implementation of LocationRepository

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, Set};
use tracing::debug;

use crate::domain::location::{Location, LocationRepository};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::location;

pub struct SeaOrmLocationRepository {
    db: DatabaseConnection,
}

impl SeaOrmLocationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: location::Model) -> DomainResult<Location> {
    let price_per_hour = Decimal::from_str(&m.price_per_hour).map_err(|e| {
        DomainError::Validation(format!(
            "location {} has unreadable price '{}': {}",
            m.id, m.price_per_hour, e
        ))
    })?;

    Ok(Location {
        id: m.id,
        name: m.name,
        address: m.address,
        total_spots: m.total_spots.max(0) as u32,
        price_per_hour,
        rows: m.rows.max(0) as u32,
        spots_per_row: m.spots_per_row.max(0) as u32,
    })
}

// ── LocationRepository impl ─────────────────────────────────────

#[async_trait]
impl LocationRepository for SeaOrmLocationRepository {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Location>> {
        let model = location::Entity::find_by_id(id).one(&self.db).await?;
        model.map(model_to_domain).transpose()
    }

    async fn find_all(&self) -> DomainResult<Vec<Location>> {
        let models = location::Entity::find()
            .order_by_asc(location::Column::Id)
            .all(&self.db)
            .await?;
        models.into_iter().map(model_to_domain).collect()
    }

    async fn upsert(&self, l: Location) -> DomainResult<()> {
        l.validate()?;
        debug!(location_id = l.id, name = %l.name, "Upserting location");

        let model = location::ActiveModel {
            id: Set(l.id),
            name: Set(l.name),
            address: Set(l.address),
            total_spots: Set(l.total_spots as i32),
            price_per_hour: Set(l.price_per_hour.normalize().to_string()),
            rows: Set(l.rows as i32),
            spots_per_row: Set(l.spots_per_row as i32),
            updated_at: Set(Utc::now()),
        };

        location::Entity::insert(model)
            .on_conflict(
                OnConflict::column(location::Column::Id)
                    .update_columns([
                        location::Column::Name,
                        location::Column::Address,
                        location::Column::TotalSpots,
                        location::Column::PricePerHour,
                        location::Column::Rows,
                        location::Column::SpotsPerRow,
                        location::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }
}
