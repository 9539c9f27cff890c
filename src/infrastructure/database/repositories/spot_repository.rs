//! SeaORM implementation of SpotRepository
//!
//! Both occupancy writes are a single `UPDATE ... WHERE <precondition>`;
//! `rows_affected` tells whether the precondition held. There is no read
//! between the check and the write.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, UpdateResult,
};
use tracing::debug;

use crate::domain::location::Location;
use crate::domain::spot::{Spot, SpotRepository};
use crate::domain::DomainResult;
use crate::infrastructure::database::entities::spot;

/// Rows per INSERT when provisioning, well under SQLite's bind limit.
const PROVISION_CHUNK: usize = 100;

pub struct SeaOrmSpotRepository {
    db: DatabaseConnection,
}

impl SeaOrmSpotRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: spot::Model) -> Spot {
    Spot {
        location_id: m.location_id,
        spot_number: m.spot_number as u32,
        is_occupied: m.is_occupied,
        booked_by: m.booked_by,
        booking_start: m.booking_start,
    }
}

fn new_spot(location_id: i32, spot_number: u32) -> spot::ActiveModel {
    spot::ActiveModel {
        location_id: Set(location_id),
        spot_number: Set(spot_number as i32),
        is_occupied: Set(false),
        booked_by: Set(None),
        booking_start: Set(None),
    }
}

// ── SpotRepository impl ─────────────────────────────────────────

#[async_trait]
impl SpotRepository for SeaOrmSpotRepository {
    async fn find_by_location(&self, location_id: i32) -> DomainResult<Vec<Spot>> {
        let models = spot::Entity::find()
            .filter(spot::Column::LocationId.eq(location_id))
            .order_by_asc(spot::Column::SpotNumber)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn find(&self, location_id: i32, spot_number: u32) -> DomainResult<Option<Spot>> {
        let model = spot::Entity::find_by_id((location_id, spot_number as i32))
            .one(&self.db)
            .await?;
        Ok(model.map(model_to_domain))
    }

    async fn find_booked_by(&self, user_id: &str) -> DomainResult<Vec<Spot>> {
        let models = spot::Entity::find()
            .filter(spot::Column::BookedBy.eq(user_id))
            .order_by_asc(spot::Column::LocationId)
            .order_by_asc(spot::Column::SpotNumber)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn count_occupied(&self, location_id: i32) -> DomainResult<u32> {
        let count = spot::Entity::find()
            .filter(spot::Column::LocationId.eq(location_id))
            .filter(spot::Column::IsOccupied.eq(true))
            .count(&self.db)
            .await?;
        Ok(count as u32)
    }

    async fn try_occupy(
        &self,
        location_id: i32,
        spot_number: u32,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let result: UpdateResult = spot::Entity::update_many()
            .col_expr(spot::Column::IsOccupied, Expr::value(true))
            .col_expr(spot::Column::BookedBy, Expr::value(user_id.to_string()))
            .col_expr(spot::Column::BookingStart, Expr::value(at))
            .filter(spot::Column::LocationId.eq(location_id))
            .filter(spot::Column::SpotNumber.eq(spot_number as i32))
            .filter(spot::Column::IsOccupied.eq(false))
            .exec(&self.db)
            .await?;

        debug!(
            location_id,
            spot_number,
            user_id,
            rows = result.rows_affected,
            "Conditional occupy"
        );
        Ok(result.rows_affected == 1)
    }

    async fn try_release(
        &self,
        location_id: i32,
        spot_number: u32,
        user_id: &str,
    ) -> DomainResult<bool> {
        let result: UpdateResult = spot::Entity::update_many()
            .col_expr(spot::Column::IsOccupied, Expr::value(false))
            .col_expr(spot::Column::BookedBy, Expr::value(Option::<String>::None))
            .col_expr(
                spot::Column::BookingStart,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(spot::Column::LocationId.eq(location_id))
            .filter(spot::Column::SpotNumber.eq(spot_number as i32))
            .filter(spot::Column::BookedBy.eq(user_id))
            .exec(&self.db)
            .await?;

        debug!(
            location_id,
            spot_number,
            user_id,
            rows = result.rows_affected,
            "Conditional release"
        );
        Ok(result.rows_affected == 1)
    }

    async fn provision(&self, location: &Location) -> DomainResult<u32> {
        let existing: HashSet<i32> = spot::Entity::find()
            .select_only()
            .column(spot::Column::SpotNumber)
            .filter(spot::Column::LocationId.eq(location.id))
            .into_tuple::<i32>()
            .all(&self.db)
            .await?
            .into_iter()
            .collect();

        let missing: Vec<spot::ActiveModel> = location
            .spot_numbers()
            .filter(|n| !existing.contains(&(*n as i32)))
            .map(|n| new_spot(location.id, n))
            .collect();

        let mut created = 0u64;
        for chunk in missing.chunks(PROVISION_CHUNK) {
            created += spot::Entity::insert_many(chunk.to_vec())
                .on_conflict(
                    OnConflict::columns([spot::Column::LocationId, spot::Column::SpotNumber])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&self.db)
                .await?;
        }

        if created > 0 {
            debug!(location_id = location.id, created, "Provisioned spots");
        }
        Ok(created as u32)
    }
}
