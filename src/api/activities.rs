//! Activity API endpoints.

use axum::extract::State;

use super::{success, ApiResult, DataResponse};
use crate::models::Activity;
use crate::AppState;

/// GET /activities - List the activity feed.
pub async fn list_activities(
    State(state): State<AppState>,
) -> ApiResult<DataResponse<Vec<Activity>>> {
    success(state.repo.list_activities())
}
