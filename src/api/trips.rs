//! Trip API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{success, ApiResult, DataResponse, JsonBody};
use crate::errors::AppError;
use crate::models::{AddPhotoRequest, CreateTripRequest, PhotosResponse, Trip, TripStatistics};
use crate::AppState;

/// GET /trips - List all trips.
pub async fn list_trips(State(state): State<AppState>) -> ApiResult<DataResponse<Vec<Trip>>> {
    success(state.repo.list_trips().await)
}

/// GET /trips/:id - Get a single trip.
pub async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DataResponse<Trip>> {
    match state.repo.get_trip(&id).await {
        Some(trip) => success(trip),
        None => Err(AppError::trip_not_found()),
    }
}

/// POST /trips - Create a new trip.
pub async fn create_trip(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateTripRequest>,
) -> ApiResult<(StatusCode, Json<Trip>)> {
    let trip = state.repo.create_trip(&request).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

/// POST /trips/:id/photos - Append a photo reference to a trip.
pub async fn add_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<AddPhotoRequest>,
) -> ApiResult<Json<PhotosResponse>> {
    let photos = state.repo.add_photo(&id, request.uri.as_deref()).await?;
    Ok(Json(PhotosResponse { ok: true, photos }))
}

/// GET /trips-upcoming - The first three trips in stored order.
pub async fn upcoming_trips(State(state): State<AppState>) -> ApiResult<DataResponse<Vec<Trip>>> {
    success(state.repo.upcoming_trips().await)
}

/// GET /stats - Statistics recomputed from the current trips.
pub async fn get_statistics(
    State(state): State<AppState>,
) -> ApiResult<DataResponse<TripStatistics>> {
    success(state.repo.statistics().await)
}
