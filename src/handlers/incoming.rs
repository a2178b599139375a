use crate::{
    auth::AuthUser,
    handlers::deliveries::{
        CancelShipmentRequest, ScheduledShipment, ShipmentListQuery, ShipmentSummary,
    },
    handlers::packages::PackageSummary,
    services::incoming::CreateIncomingRequest,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Extension, Path, Query, State},
    response::Json,
};
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/api/v1/incoming",
    params(ShipmentListQuery),
    responses(
        (status = 200, description = "Incoming shipments listed", body = ApiResponse<PaginatedResponse<ShipmentSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "incoming"
)]
pub async fn list_incoming(
    State(state): State<AppState>,
    Query(query): Query<ShipmentListQuery>,
) -> ApiResult<PaginatedResponse<ShipmentSummary>> {
    let (filter, page, per_page) = query.decode()?;
    let (records, total) = state
        .incoming_service()
        .list(filter, page, per_page)
        .await?;
    let items: Vec<ShipmentSummary> = records.into_iter().map(ShipmentSummary::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, per_page,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/incoming/{id}",
    params(("id" = Uuid, Path, description = "Incoming shipment ID")),
    responses(
        (status = 200, description = "Incoming shipment fetched", body = ApiResponse<ShipmentSummary>),
        (status = 404, description = "Incoming shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "incoming"
)]
pub async fn get_incoming(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentSummary> {
    let model = state.incoming_service().get(id).await?;
    Ok(Json(ApiResponse::success(ShipmentSummary::from(model))))
}

#[utoipa::path(
    get,
    path = "/api/v1/incoming/{id}/packages",
    params(("id" = Uuid, Path, description = "Incoming shipment ID")),
    responses(
        (status = 200, description = "Expected packages on the shipment", body = ApiResponse<Vec<PackageSummary>>),
        (status = 404, description = "Incoming shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "incoming"
)]
pub async fn get_incoming_packages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<PackageSummary>> {
    let packages = state.incoming_service().packages_on(id).await?;
    let items: Vec<PackageSummary> = packages.into_iter().map(PackageSummary::from).collect();
    Ok(Json(ApiResponse::success(items)))
}

/// Announces inbound freight ahead of arrival. The packages must
/// already be registered with status INCOMING.
#[utoipa::path(
    post,
    path = "/api/v1/incoming",
    request_body = CreateIncomingRequest,
    responses(
        (status = 200, description = "Incoming shipment announced", body = ApiResponse<ScheduledShipment>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Warehouse or package not found", body = crate::errors::ErrorResponse)
    ),
    tag = "incoming"
)]
pub async fn create_incoming(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Json(payload): Json<CreateIncomingRequest>,
) -> ApiResult<ScheduledShipment> {
    let (shipment, packages) = state
        .incoming_service()
        .create(payload, actor.user_id)
        .await?;
    Ok(Json(ApiResponse::success(ScheduledShipment::from_parts(
        shipment, packages,
    ))))
}

#[utoipa::path(
    post,
    path = "/api/v1/incoming/{id}/dispatch",
    params(("id" = Uuid, Path, description = "Incoming shipment ID")),
    responses(
        (status = 200, description = "Marked in transit from origin", body = ApiResponse<ShipmentSummary>),
        (status = 400, description = "Not in a dispatchable state", body = crate::errors::ErrorResponse),
        (status = 404, description = "Incoming shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "incoming"
)]
pub async fn dispatch_incoming(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentSummary> {
    let updated = state.incoming_service().dispatch(id, actor.user_id).await?;
    Ok(Json(ApiResponse::success(ShipmentSummary::from(updated))))
}

#[utoipa::path(
    post,
    path = "/api/v1/incoming/{id}/mark-arrived",
    params(("id" = Uuid, Path, description = "Incoming shipment ID")),
    responses(
        (status = 200, description = "Arrival at the destination gate recorded", body = ApiResponse<ShipmentSummary>),
        (status = 400, description = "Not in transit", body = crate::errors::ErrorResponse),
        (status = 404, description = "Incoming shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "incoming"
)]
pub async fn mark_incoming_arrived(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentSummary> {
    let updated = state
        .incoming_service()
        .mark_arrived(id, actor.user_id)
        .await?;
    Ok(Json(ApiResponse::success(ShipmentSummary::from(updated))))
}

/// Accepts an arrived shipment into the destination warehouse. Fails
/// with 409 when the intake would push the warehouse past its target
/// utilization; the packages move to IN_WAREHOUSE only on success.
#[utoipa::path(
    post,
    path = "/api/v1/incoming/{id}/accept",
    params(("id" = Uuid, Path, description = "Incoming shipment ID")),
    responses(
        (status = 200, description = "Packages accepted into the warehouse", body = ApiResponse<ShipmentSummary>),
        (status = 400, description = "Not arrived yet", body = crate::errors::ErrorResponse),
        (status = 404, description = "Incoming shipment not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Warehouse capacity exceeded", body = crate::errors::ErrorResponse)
    ),
    tag = "incoming"
)]
pub async fn accept_incoming(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentSummary> {
    let updated = state.incoming_service().accept(id, actor.user_id).await?;
    Ok(Json(ApiResponse::success(ShipmentSummary::from(updated))))
}

#[utoipa::path(
    post,
    path = "/api/v1/incoming/{id}/cancel",
    params(("id" = Uuid, Path, description = "Incoming shipment ID")),
    request_body = CancelShipmentRequest,
    responses(
        (status = 200, description = "Incoming shipment cancelled", body = ApiResponse<ShipmentSummary>),
        (status = 400, description = "Not cancellable from its current status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Incoming shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "incoming"
)]
pub async fn cancel_incoming(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelShipmentRequest>,
) -> ApiResult<ShipmentSummary> {
    let updated = state
        .incoming_service()
        .cancel(id, payload.reason, actor.user_id)
        .await?;
    Ok(Json(ApiResponse::success(ShipmentSummary::from(updated))))
}
