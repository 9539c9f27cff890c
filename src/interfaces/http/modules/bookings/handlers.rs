//! Bookings handler: the caller's own reservations across all locations

use axum::extract::State;
use axum::Json;

use super::dto::BookingDto;
use crate::interfaces::http::common::{ApiError, ApiResponse};
use crate::interfaces::http::middleware::CurrentUser;
use crate::interfaces::http::modules::locations::LocationAppState;

#[utoipa::path(
    get,
    path = "/api/v1/bookings",
    tag = "Bookings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's bookings across all locations", body = ApiResponse<Vec<BookingDto>>),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn list_my_bookings(
    State(state): State<LocationAppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<BookingDto>>>, ApiError> {
    let spots = state.reservations.bookings_for(&user.user_id).await?;
    Ok(Json(ApiResponse::success(
        spots.iter().map(BookingDto::from).collect(),
    )))
}
