use crate::{
    auth::AuthUser,
    handlers::deliveries::{
        CancelShipmentRequest, ScheduledShipment, ShipmentListQuery, ShipmentSummary,
    },
    handlers::packages::PackageSummary,
    services::transfers::CreateTransferRequest,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Extension, Path, Query, State},
    response::Json,
};
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/api/v1/transfers",
    params(ShipmentListQuery),
    responses(
        (status = 200, description = "Warehouse transfers listed", body = ApiResponse<PaginatedResponse<ShipmentSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn list_transfers(
    State(state): State<AppState>,
    Query(query): Query<ShipmentListQuery>,
) -> ApiResult<PaginatedResponse<ShipmentSummary>> {
    let (filter, page, per_page) = query.decode()?;
    let (records, total) = state
        .transfer_service()
        .list(filter, page, per_page)
        .await?;
    let items: Vec<ShipmentSummary> = records.into_iter().map(ShipmentSummary::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, per_page,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/transfers/{id}",
    params(("id" = Uuid, Path, description = "Transfer shipment ID")),
    responses(
        (status = 200, description = "Transfer fetched", body = ApiResponse<ShipmentSummary>),
        (status = 404, description = "Transfer not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentSummary> {
    let model = state.transfer_service().get(id).await?;
    Ok(Json(ApiResponse::success(ShipmentSummary::from(model))))
}

#[utoipa::path(
    get,
    path = "/api/v1/transfers/{id}/packages",
    params(("id" = Uuid, Path, description = "Transfer shipment ID")),
    responses(
        (status = 200, description = "Packages staged on the transfer", body = ApiResponse<Vec<PackageSummary>>),
        (status = 404, description = "Transfer not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn get_transfer_packages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<PackageSummary>> {
    let packages = state.transfer_service().packages_on(id).await?;
    let items: Vec<PackageSummary> = packages.into_iter().map(PackageSummary::from).collect();
    Ok(Json(ApiResponse::success(items)))
}

/// Schedules a transfer between two of our warehouses. Selected
/// packages are staged TRANSFERRING_WAREHOUSE immediately.
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = CreateTransferRequest,
    responses(
        (status = 200, description = "Transfer scheduled", body = ApiResponse<ScheduledShipment>),
        (status = 400, description = "Invalid selection", body = crate::errors::ErrorResponse),
        (status = 409, description = "Over vehicle capacity", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn create_transfer(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Json(payload): Json<CreateTransferRequest>,
) -> ApiResult<ScheduledShipment> {
    let (shipment, packages) = state
        .transfer_service()
        .create(payload, actor.user_id)
        .await?;
    Ok(Json(ApiResponse::success(ScheduledShipment::from_parts(
        shipment, packages,
    ))))
}

#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/dispatch",
    params(("id" = Uuid, Path, description = "Transfer shipment ID")),
    responses(
        (status = 200, description = "Transfer on the road; packages SHIPPING", body = ApiResponse<ShipmentSummary>),
        (status = 400, description = "Not in a dispatchable state", body = crate::errors::ErrorResponse),
        (status = 404, description = "Transfer not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn dispatch_transfer(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentSummary> {
    let updated = state.transfer_service().dispatch(id, actor.user_id).await?;
    Ok(Json(ApiResponse::success(ShipmentSummary::from(updated))))
}

#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/mark-arrived",
    params(("id" = Uuid, Path, description = "Transfer shipment ID")),
    responses(
        (status = 200, description = "Arrival at the destination recorded", body = ApiResponse<ShipmentSummary>),
        (status = 400, description = "Not in transit", body = crate::errors::ErrorResponse),
        (status = 404, description = "Transfer not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn mark_transfer_arrived(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentSummary> {
    let updated = state
        .transfer_service()
        .mark_arrived(id, actor.user_id)
        .await?;
    Ok(Json(ApiResponse::success(ShipmentSummary::from(updated))))
}

/// Books the packages into the destination warehouse and closes the
/// transfer.
#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/complete",
    params(("id" = Uuid, Path, description = "Transfer shipment ID")),
    responses(
        (status = 200, description = "Packages IN_WAREHOUSE at the destination", body = ApiResponse<ShipmentSummary>),
        (status = 400, description = "Not arrived yet", body = crate::errors::ErrorResponse),
        (status = 404, description = "Transfer not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn complete_transfer(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentSummary> {
    let updated = state.transfer_service().complete(id, actor.user_id).await?;
    Ok(Json(ApiResponse::success(ShipmentSummary::from(updated))))
}

#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/cancel",
    params(("id" = Uuid, Path, description = "Transfer shipment ID")),
    request_body = CancelShipmentRequest,
    responses(
        (status = 200, description = "Transfer cancelled; packages back in the sorting pool", body = ApiResponse<ShipmentSummary>),
        (status = 400, description = "Not cancellable from its current status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Transfer not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn cancel_transfer(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelShipmentRequest>,
) -> ApiResult<ShipmentSummary> {
    let updated = state
        .transfer_service()
        .cancel(id, payload.reason, actor.user_id)
        .await?;
    Ok(Json(ApiResponse::success(ShipmentSummary::from(updated))))
}
