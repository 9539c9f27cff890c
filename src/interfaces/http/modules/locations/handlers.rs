//! Location, lot and booking handlers

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use super::dto::*;
use crate::application::{LotService, ReservationService};
use crate::interfaces::http::common::{ApiError, ApiResponse, ValidatedQuery};
use crate::interfaces::http::middleware::CurrentUser;

/// State for location and booking handlers
#[derive(Clone)]
pub struct LocationAppState {
    pub lots: Arc<LotService>,
    pub reservations: Arc<ReservationService>,
}

#[utoipa::path(
    get,
    path = "/api/v1/locations",
    tag = "Locations",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All locations with availability", body = ApiResponse<Vec<LocationDto>>),
        (status = 401, description = "Missing or invalid token"),
        (status = 503, description = "Store temporarily unavailable")
    )
)]
pub async fn list_locations(
    State(state): State<LocationAppState>,
    _user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<LocationDto>>>, ApiError> {
    let overviews = state.lots.list_locations_with_availability().await?;
    let data = overviews.iter().map(LocationDto::from).collect();
    Ok(Json(ApiResponse::success(data)))
}

#[utoipa::path(
    get,
    path = "/api/v1/locations/{location_id}",
    tag = "Locations",
    security(("bearer_auth" = [])),
    params(
        ("location_id" = i32, Path, description = "Location ID"),
        LotQuery
    ),
    responses(
        (status = 200, description = "Lot with every spot", body = ApiResponse<LotDto>),
        (status = 404, description = "Location not found"),
        (status = 422, description = "Invalid selected spot")
    )
)]
pub async fn get_lot(
    State(state): State<LocationAppState>,
    Path(location_id): Path<i32>,
    ValidatedQuery(query): ValidatedQuery<LotQuery>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<LotDto>>, ApiError> {
    let lot = state.lots.get_lot(location_id).await?;
    Ok(Json(ApiResponse::success(LotDto::new(
        &lot,
        &user.user_id,
        query.selected,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/locations/{location_id}/spots/{spot_number}",
    tag = "Locations",
    security(("bearer_auth" = [])),
    params(
        ("location_id" = i32, Path, description = "Location ID"),
        ("spot_number" = u32, Path, description = "Spot number (1-based)")
    ),
    responses(
        (status = 200, description = "Current state of the spot", body = ApiResponse<SpotDto>),
        (status = 404, description = "Location or spot not found")
    )
)]
pub async fn get_spot(
    State(state): State<LocationAppState>,
    Path((location_id, spot_number)): Path<(i32, u32)>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<SpotDto>>, ApiError> {
    let location = state.lots.get_location(location_id).await?;
    let spot = state.lots.get_spot(location_id, spot_number).await?;
    Ok(Json(ApiResponse::success(SpotDto::new(
        &location,
        &spot,
        &user.user_id,
        None,
    ))))
}

#[utoipa::path(
    post,
    path = "/api/v1/locations/{location_id}/spots/{spot_number}/booking",
    tag = "Bookings",
    security(("bearer_auth" = [])),
    params(
        ("location_id" = i32, Path, description = "Location ID"),
        ("spot_number" = u32, Path, description = "Spot number (1-based)")
    ),
    responses(
        (status = 201, description = "Spot booked for the caller", body = ApiResponse<SpotDto>),
        (status = 404, description = "Location or spot not found"),
        (status = 409, description = "Spot already booked; refresh and pick another"),
        (status = 503, description = "Store temporarily unavailable; retry"),
        (status = 504, description = "Outcome unknown; re-read the spot before retrying")
    )
)]
pub async fn book_spot(
    State(state): State<LocationAppState>,
    Path((location_id, spot_number)): Path<(i32, u32)>,
    user: CurrentUser,
) -> Result<(StatusCode, Json<ApiResponse<SpotDto>>), ApiError> {
    let location = state.lots.get_location(location_id).await?;
    let spot = state
        .reservations
        .book(location_id, spot_number, &user.user_id)
        .await?;

    info!(location_id, spot_number, user_id = %user.user_id, "Booking confirmed");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(SpotDto::new(
            &location,
            &spot,
            &user.user_id,
            None,
        ))),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/locations/{location_id}/spots/{spot_number}/booking",
    tag = "Bookings",
    security(("bearer_auth" = [])),
    params(
        ("location_id" = i32, Path, description = "Location ID"),
        ("spot_number" = u32, Path, description = "Spot number (1-based)")
    ),
    responses(
        (status = 200, description = "Booking cancelled; spot available", body = ApiResponse<SpotDto>),
        (status = 403, description = "Caller does not hold this booking"),
        (status = 404, description = "Location or spot not found"),
        (status = 504, description = "Outcome unknown; re-read the spot before retrying")
    )
)]
pub async fn cancel_booking(
    State(state): State<LocationAppState>,
    Path((location_id, spot_number)): Path<(i32, u32)>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<SpotDto>>, ApiError> {
    let location = state.lots.get_location(location_id).await?;
    let spot = state
        .reservations
        .cancel(location_id, spot_number, &user.user_id)
        .await?;

    info!(location_id, spot_number, user_id = %user.user_id, "Booking cancelled");
    Ok(Json(ApiResponse::success(SpotDto::new(
        &location,
        &spot,
        &user.user_id,
        None,
    ))))
}
