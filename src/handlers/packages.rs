use crate::{
    auth::AuthUser,
    entities::{package, package_status_log},
    errors::ServiceError,
    handlers::common::{parse_enum_param, PaginationParams},
    services::packages::{CreatePackageRequest, PackageFilter, UpdatePackageRequest},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Extension, Path, Query, State},
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PackageListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Lifecycle status filter (e.g. IN_WAREHOUSE, SORTING, DELIVERED)
    pub status: Option<String>,
    /// Restrict to packages currently held at one warehouse
    pub warehouse_id: Option<Uuid>,
    /// Omitted hides archived packages; pass true to see only them
    pub archived: Option<bool>,
    /// Matches tracking number or receiver name
    pub search: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "8f14c3a0-4af1-4e0c-9967-3a1a72c5a9d2",
    "tracking_number": "MNL-2024-001287",
    "status": "IN_WAREHOUSE",
    "shipping_party": "AGENT",
    "shipping_mode": "SEA",
    "shipping_type": "STANDARD",
    "reception_mode": "DOOR_TO_DOOR",
    "weight_kg": "12.5",
    "volume_m3": "0.04",
    "contents": "Assorted clothing",
    "pieces": 2,
    "receiver_name": "Maria Santos",
    "receiver_province": "Cebu",
    "receiver_city": "Cebu City",
    "created_at": "2024-11-09T10:30:00Z"
}))]
pub struct PackageSummary {
    /// Package UUID
    pub id: Uuid,
    /// Unique tracking number
    #[schema(example = "MNL-2024-001287")]
    pub tracking_number: String,
    /// Lifecycle status
    #[schema(example = "IN_WAREHOUSE")]
    pub status: String,
    pub shipping_party: String,
    pub shipping_mode: String,
    pub shipping_type: String,
    pub reception_mode: String,
    pub weight_kg: Decimal,
    pub volume_m3: Decimal,
    pub contents: String,
    pub pieces: i32,
    pub sender_name: String,
    pub sender_phone: String,
    pub sender_address: String,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_province: String,
    pub receiver_city: String,
    pub receiver_barangay: String,
    pub receiver_street: String,
    pub is_fragile: bool,
    pub declared_value: Option<Decimal>,
    pub container_no: Option<String>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Warehouse currently holding the package, when any
    pub warehouse_id: Option<Uuid>,
    /// Manifest the package was imported from, when any
    pub manifest_id: Option<Uuid>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<package::Model> for PackageSummary {
    fn from(model: package::Model) -> Self {
        Self {
            id: model.id,
            tracking_number: model.tracking_number,
            status: model.status.to_string(),
            shipping_party: model.shipping_party.to_string(),
            shipping_mode: model.shipping_mode.to_string(),
            shipping_type: model.shipping_type.to_string(),
            reception_mode: model.reception_mode.to_string(),
            weight_kg: model.weight_kg,
            volume_m3: model.volume_m3,
            contents: model.contents,
            pieces: model.pieces,
            sender_name: model.sender_name,
            sender_phone: model.sender_phone,
            sender_address: model.sender_address,
            receiver_name: model.receiver_name,
            receiver_phone: model.receiver_phone,
            receiver_province: model.receiver_province,
            receiver_city: model.receiver_city,
            receiver_barangay: model.receiver_barangay,
            receiver_street: model.receiver_street,
            is_fragile: model.is_fragile,
            declared_value: model.declared_value,
            container_no: model.container_no,
            expected_delivery_date: model.expected_delivery_date,
            notes: model.notes,
            warehouse_id: model.warehouse_id,
            manifest_id: model.manifest_id,
            is_archived: model.is_archived,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// One audit-trail entry on the package history screen.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusLogEntry {
    #[schema(example = "SORTING")]
    pub status: String,
    #[schema(example = "Moved to sorting pool")]
    pub description: String,
    pub actor_id: Uuid,
    pub recorded_at: DateTime<Utc>,
}

impl From<package_status_log::Model> for StatusLogEntry {
    fn from(model: package_status_log::Model) -> Self {
        Self {
            status: model.status.to_string(),
            description: model.description,
            actor_id: model.actor_id,
            recorded_at: model.recorded_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "SORTING",
    "description": "Pulled for afternoon sort"
}))]
pub struct UpdatePackageStatusRequest {
    /// Target status; must be a legal transition from the current one
    #[schema(example = "SORTING")]
    pub status: String,
    /// Free-text note for the audit trail; defaulted when omitted
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "package_ids": ["8f14c3a0-4af1-4e0c-9967-3a1a72c5a9d2"],
    "forwarder": "TransCargo Express"
}))]
pub struct ForwarderTransferRequest {
    pub package_ids: Vec<Uuid>,
    /// Partner forwarder receiving the packages
    #[validate(length(min = 1, max = 120))]
    pub forwarder: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForwarderConfirmRequest {
    pub package_ids: Vec<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/v1/packages",
    params(PackageListQuery),
    responses(
        (status = 200, description = "Packages listed", body = ApiResponse<PaginatedResponse<PackageSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "packages"
)]
pub async fn list_packages(
    State(state): State<AppState>,
    Query(query): Query<PackageListQuery>,
) -> ApiResult<PaginatedResponse<PackageSummary>> {
    let (page, per_page) = PaginationParams {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    }
    .clamped();

    let status = query
        .status
        .as_deref()
        .map(|raw| parse_enum_param(raw, "status"))
        .transpose()?;

    let filter = PackageFilter {
        status,
        warehouse_id: query.warehouse_id,
        // Archived packages stay out of working lists unless asked for
        archived: Some(query.archived.unwrap_or(false)),
        search: query.search,
    };

    let (records, total) = state.package_service().list(filter, page, per_page).await?;
    let items: Vec<PackageSummary> = records.into_iter().map(PackageSummary::from).collect();

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, per_page,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/packages/{id}",
    params(("id" = Uuid, Path, description = "Package ID")),
    responses(
        (status = 200, description = "Package fetched", body = ApiResponse<PackageSummary>),
        (status = 404, description = "Package not found", body = crate::errors::ErrorResponse)
    ),
    tag = "packages"
)]
pub async fn get_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<PackageSummary> {
    let model = state.package_service().get(id).await?;
    Ok(Json(ApiResponse::success(PackageSummary::from(model))))
}

#[utoipa::path(
    post,
    path = "/api/v1/packages",
    request_body = CreatePackageRequest,
    responses(
        (status = 200, description = "Package registered", body = ApiResponse<PackageSummary>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Tracking number already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "packages"
)]
pub async fn create_package(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Json(payload): Json<CreatePackageRequest>,
) -> ApiResult<PackageSummary> {
    let created = state
        .package_service()
        .create(payload, actor.user_id)
        .await?;
    Ok(Json(ApiResponse::success(PackageSummary::from(created))))
}

#[utoipa::path(
    put,
    path = "/api/v1/packages/{id}",
    params(("id" = Uuid, Path, description = "Package ID")),
    request_body = UpdatePackageRequest,
    responses(
        (status = 200, description = "Package updated", body = ApiResponse<PackageSummary>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Package not found", body = crate::errors::ErrorResponse)
    ),
    tag = "packages"
)]
pub async fn update_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePackageRequest>,
) -> ApiResult<PackageSummary> {
    let updated = state.package_service().update(id, payload).await?;
    Ok(Json(ApiResponse::success(PackageSummary::from(updated))))
}

#[utoipa::path(
    post,
    path = "/api/v1/packages/{id}/status",
    params(("id" = Uuid, Path, description = "Package ID")),
    request_body = UpdatePackageStatusRequest,
    responses(
        (status = 200, description = "Status changed and logged", body = ApiResponse<PackageSummary>),
        (status = 400, description = "Illegal transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Package not found", body = crate::errors::ErrorResponse)
    ),
    tag = "packages"
)]
pub async fn update_package_status(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePackageStatusRequest>,
) -> ApiResult<PackageSummary> {
    let new_status = parse_enum_param(&payload.status, "status")?;
    let updated = state
        .package_service()
        .update_status(id, new_status, payload.description, actor.user_id)
        .await?;
    Ok(Json(ApiResponse::success(PackageSummary::from(updated))))
}

#[utoipa::path(
    get,
    path = "/api/v1/packages/{id}/history",
    params(("id" = Uuid, Path, description = "Package ID")),
    responses(
        (status = 200, description = "Status history, oldest first", body = ApiResponse<Vec<StatusLogEntry>>),
        (status = 404, description = "Package not found", body = crate::errors::ErrorResponse)
    ),
    tag = "packages"
)]
pub async fn get_package_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<StatusLogEntry>> {
    let logs = state.package_service().history(id).await?;
    let entries: Vec<StatusLogEntry> = logs.into_iter().map(StatusLogEntry::from).collect();
    Ok(Json(ApiResponse::success(entries)))
}

#[utoipa::path(
    post,
    path = "/api/v1/packages/{id}/archive",
    params(("id" = Uuid, Path, description = "Package ID")),
    responses(
        (status = 200, description = "Package archived", body = ApiResponse<PackageSummary>),
        (status = 404, description = "Package not found", body = crate::errors::ErrorResponse)
    ),
    tag = "packages"
)]
pub async fn archive_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<PackageSummary> {
    let updated = state.package_service().set_archived(id, true).await?;
    Ok(Json(ApiResponse::success(PackageSummary::from(updated))))
}

#[utoipa::path(
    post,
    path = "/api/v1/packages/{id}/unarchive",
    params(("id" = Uuid, Path, description = "Package ID")),
    responses(
        (status = 200, description = "Package restored to working lists", body = ApiResponse<PackageSummary>),
        (status = 404, description = "Package not found", body = crate::errors::ErrorResponse)
    ),
    tag = "packages"
)]
pub async fn unarchive_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<PackageSummary> {
    let updated = state.package_service().set_archived(id, false).await?;
    Ok(Json(ApiResponse::success(PackageSummary::from(updated))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/packages/{id}",
    params(("id" = Uuid, Path, description = "Package ID")),
    responses(
        (status = 200, description = "Package deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Package not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Package has shipment history", body = crate::errors::ErrorResponse)
    ),
    tag = "packages"
)]
pub async fn delete_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.package_service().delete(id).await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": id }))))
}

/// Stages a batch of packages for handoff to a partner forwarder.
#[utoipa::path(
    post,
    path = "/api/v1/packages/transfer-forwarder",
    request_body = ForwarderTransferRequest,
    responses(
        (status = 200, description = "Packages staged for forwarder handoff", body = ApiResponse<Vec<PackageSummary>>),
        (status = 400, description = "Illegal transition for some package", body = crate::errors::ErrorResponse),
        (status = 404, description = "Some package not found", body = crate::errors::ErrorResponse)
    ),
    tag = "packages"
)]
pub async fn transfer_to_forwarder(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Json(payload): Json<ForwarderTransferRequest>,
) -> ApiResult<Vec<PackageSummary>> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let updated = state
        .package_service()
        .transfer_to_forwarder(payload.package_ids, payload.forwarder, actor.user_id)
        .await?;
    let items: Vec<PackageSummary> = updated.into_iter().map(PackageSummary::from).collect();
    Ok(Json(ApiResponse::success(items)))
}

/// Confirms a forwarder handoff, closing the packages out of the network.
#[utoipa::path(
    post,
    path = "/api/v1/packages/confirm-forwarder",
    request_body = ForwarderConfirmRequest,
    responses(
        (status = 200, description = "Handoff confirmed", body = ApiResponse<Vec<PackageSummary>>),
        (status = 400, description = "Illegal transition for some package", body = crate::errors::ErrorResponse),
        (status = 404, description = "Some package not found", body = crate::errors::ErrorResponse)
    ),
    tag = "packages"
)]
pub async fn confirm_forwarder_transfer(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Json(payload): Json<ForwarderConfirmRequest>,
) -> ApiResult<Vec<PackageSummary>> {
    let updated = state
        .package_service()
        .confirm_forwarder_transfer(payload.package_ids, actor.user_id)
        .await?;
    let items: Vec<PackageSummary> = updated.into_iter().map(PackageSummary::from).collect();
    Ok(Json(ApiResponse::success(items)))
}
