use crate::{services::tracking::TrackingInfo, ApiResponse, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    response::Json,
};

/// Public tracking lookup. No authentication; the response carries the
/// status history without actor identities.
#[utoipa::path(
    get,
    path = "/api/v1/tracking/{tracking_number}",
    params(("tracking_number" = String, Path, description = "Tracking number, case-insensitive")),
    responses(
        (status = 200, description = "Package status and history", body = ApiResponse<TrackingInfo>),
        (status = 404, description = "Unknown tracking number", body = crate::errors::ErrorResponse)
    ),
    tag = "tracking"
)]
pub async fn track_package(
    State(state): State<AppState>,
    Path(tracking_number): Path<String>,
) -> ApiResult<TrackingInfo> {
    let info = state.tracking_service().track(&tracking_number).await?;
    Ok(Json(ApiResponse::success(info)))
}
