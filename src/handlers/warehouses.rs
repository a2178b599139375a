use crate::{
    entities::warehouse,
    handlers::common::PaginationParams,
    services::warehouses::{CreateWarehouseRequest, UpdateWarehouseRequest, WarehouseUtilization},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WarehouseListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub archived: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WarehouseSummary {
    pub id: Uuid,
    #[schema(example = "Cebu Hub")]
    pub name: String,
    pub province: String,
    pub city: String,
    pub barangay: String,
    pub street: String,
    pub phone: Option<String>,
    pub weight_capacity_kg: Decimal,
    pub volume_capacity_m3: Decimal,
    /// Percent of capacity incoming acceptance may fill
    #[schema(example = 80)]
    pub target_utilization_pct: i32,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<warehouse::Model> for WarehouseSummary {
    fn from(model: warehouse::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            province: model.province,
            city: model.city,
            barangay: model.barangay,
            street: model.street,
            phone: model.phone,
            weight_capacity_kg: model.weight_capacity_kg,
            volume_capacity_m3: model.volume_capacity_m3,
            target_utilization_pct: model.target_utilization_pct,
            is_archived: model.is_archived,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/warehouses",
    params(WarehouseListQuery),
    responses(
        (status = 200, description = "Warehouses listed", body = ApiResponse<PaginatedResponse<WarehouseSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouses"
)]
pub async fn list_warehouses(
    State(state): State<AppState>,
    Query(query): Query<WarehouseListQuery>,
) -> ApiResult<PaginatedResponse<WarehouseSummary>> {
    let (page, per_page) = PaginationParams {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    }
    .clamped();

    let (records, total) = state
        .warehouse_service()
        .list(Some(query.archived.unwrap_or(false)), page, per_page)
        .await?;
    let items: Vec<WarehouseSummary> = records.into_iter().map(WarehouseSummary::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, per_page,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/warehouses/{id}",
    params(("id" = Uuid, Path, description = "Warehouse ID")),
    responses(
        (status = 200, description = "Warehouse fetched", body = ApiResponse<WarehouseSummary>),
        (status = 404, description = "Warehouse not found", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouses"
)]
pub async fn get_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<WarehouseSummary> {
    let model = state.warehouse_service().get(id).await?;
    Ok(Json(ApiResponse::success(WarehouseSummary::from(model))))
}

/// Stored load versus capacity, as shown on the facilities screen.
#[utoipa::path(
    get,
    path = "/api/v1/warehouses/{id}/utilization",
    params(("id" = Uuid, Path, description = "Warehouse ID")),
    responses(
        (status = 200, description = "Current fill level", body = ApiResponse<WarehouseUtilization>),
        (status = 404, description = "Warehouse not found", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouses"
)]
pub async fn get_warehouse_utilization(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<WarehouseUtilization> {
    let utilization = state.warehouse_service().utilization(id).await?;
    Ok(Json(ApiResponse::success(utilization)))
}

#[utoipa::path(
    post,
    path = "/api/v1/warehouses",
    request_body = CreateWarehouseRequest,
    responses(
        (status = 200, description = "Warehouse created", body = ApiResponse<WarehouseSummary>),
        (status = 400, description = "Invalid capacities", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouses"
)]
pub async fn create_warehouse(
    State(state): State<AppState>,
    Json(payload): Json<CreateWarehouseRequest>,
) -> ApiResult<WarehouseSummary> {
    let created = state.warehouse_service().create(payload).await?;
    Ok(Json(ApiResponse::success(WarehouseSummary::from(created))))
}

#[utoipa::path(
    put,
    path = "/api/v1/warehouses/{id}",
    params(("id" = Uuid, Path, description = "Warehouse ID")),
    request_body = UpdateWarehouseRequest,
    responses(
        (status = 200, description = "Warehouse updated", body = ApiResponse<WarehouseSummary>),
        (status = 400, description = "Invalid capacities", body = crate::errors::ErrorResponse),
        (status = 404, description = "Warehouse not found", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouses"
)]
pub async fn update_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWarehouseRequest>,
) -> ApiResult<WarehouseSummary> {
    let updated = state.warehouse_service().update(id, payload).await?;
    Ok(Json(ApiResponse::success(WarehouseSummary::from(updated))))
}

#[utoipa::path(
    post,
    path = "/api/v1/warehouses/{id}/archive",
    params(("id" = Uuid, Path, description = "Warehouse ID")),
    responses(
        (status = 200, description = "Warehouse archived", body = ApiResponse<WarehouseSummary>),
        (status = 404, description = "Warehouse not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Warehouse still holds packages", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouses"
)]
pub async fn archive_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<WarehouseSummary> {
    let updated = state.warehouse_service().set_archived(id, true).await?;
    Ok(Json(ApiResponse::success(WarehouseSummary::from(updated))))
}

#[utoipa::path(
    post,
    path = "/api/v1/warehouses/{id}/unarchive",
    params(("id" = Uuid, Path, description = "Warehouse ID")),
    responses(
        (status = 200, description = "Warehouse restored", body = ApiResponse<WarehouseSummary>),
        (status = 404, description = "Warehouse not found", body = crate::errors::ErrorResponse)
    ),
    tag = "warehouses"
)]
pub async fn unarchive_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<WarehouseSummary> {
    let updated = state.warehouse_service().set_archived(id, false).await?;
    Ok(Json(ApiResponse::success(WarehouseSummary::from(updated))))
}
