use crate::{
    entities::vehicle,
    handlers::common::{parse_enum_param, PaginationParams},
    services::vehicles::{CreateVehicleRequest, UpdateVehicleRequest, VehicleFilter},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VehicleListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// VAN or TRUCK
    pub vehicle_type: Option<String>,
    pub archived: Option<bool>,
    /// True returns only vehicles assignable right now (not archived,
    /// not in maintenance)
    pub assignable: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "d2b5a6f4-98a5-49a4-95a6-67a1cf4e2b55",
    "plate_number": "NCR-1482",
    "name": "Metro Van 2",
    "vehicle_type": "VAN",
    "weight_capacity_kg": "800",
    "is_express": true,
    "in_maintenance": false,
    "is_archived": false
}))]
pub struct VehicleSummary {
    pub id: Uuid,
    #[schema(example = "NCR-1482")]
    pub plate_number: String,
    pub name: Option<String>,
    pub vehicle_type: String,
    pub weight_capacity_kg: Decimal,
    /// Whether the vehicle may carry EXPRESS packages
    pub is_express: bool,
    pub in_maintenance: bool,
    pub notes: Option<String>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<vehicle::Model> for VehicleSummary {
    fn from(model: vehicle::Model) -> Self {
        Self {
            id: model.id,
            plate_number: model.plate_number,
            name: model.name,
            vehicle_type: model.vehicle_type.to_string(),
            weight_capacity_kg: model.weight_capacity_kg,
            is_express: model.is_express,
            in_maintenance: model.in_maintenance,
            notes: model.notes,
            is_archived: model.is_archived,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetMaintenanceRequest {
    pub in_maintenance: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/vehicles",
    params(VehicleListQuery),
    responses(
        (status = 200, description = "Fleet listed", body = ApiResponse<PaginatedResponse<VehicleSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "vehicles"
)]
pub async fn list_vehicles(
    State(state): State<AppState>,
    Query(query): Query<VehicleListQuery>,
) -> ApiResult<PaginatedResponse<VehicleSummary>> {
    let (page, per_page) = PaginationParams {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    }
    .clamped();

    let vehicle_type = query
        .vehicle_type
        .as_deref()
        .map(|raw| parse_enum_param(raw, "vehicle_type"))
        .transpose()?;

    let filter = VehicleFilter {
        vehicle_type,
        archived: Some(query.archived.unwrap_or(false)),
        assignable: query.assignable,
    };

    let (records, total) = state.vehicle_service().list(filter, page, per_page).await?;
    let items: Vec<VehicleSummary> = records.into_iter().map(VehicleSummary::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, per_page,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/vehicles/{id}",
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Vehicle fetched", body = ApiResponse<VehicleSummary>),
        (status = 404, description = "Vehicle not found", body = crate::errors::ErrorResponse)
    ),
    tag = "vehicles"
)]
pub async fn get_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<VehicleSummary> {
    let model = state.vehicle_service().get(id).await?;
    Ok(Json(ApiResponse::success(VehicleSummary::from(model))))
}

/// Registers a vehicle. Capacity must fall inside the range for its
/// type (VAN 50-1500 kg, TRUCK 1000-20000 kg).
#[utoipa::path(
    post,
    path = "/api/v1/vehicles",
    request_body = CreateVehicleRequest,
    responses(
        (status = 200, description = "Vehicle registered", body = ApiResponse<VehicleSummary>),
        (status = 400, description = "Capacity out of range for the type", body = crate::errors::ErrorResponse),
        (status = 409, description = "Plate number already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "vehicles"
)]
pub async fn create_vehicle(
    State(state): State<AppState>,
    Json(payload): Json<CreateVehicleRequest>,
) -> ApiResult<VehicleSummary> {
    let created = state.vehicle_service().create(payload).await?;
    Ok(Json(ApiResponse::success(VehicleSummary::from(created))))
}

#[utoipa::path(
    put,
    path = "/api/v1/vehicles/{id}",
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    request_body = UpdateVehicleRequest,
    responses(
        (status = 200, description = "Vehicle updated", body = ApiResponse<VehicleSummary>),
        (status = 400, description = "Capacity out of range for the type", body = crate::errors::ErrorResponse),
        (status = 404, description = "Vehicle not found", body = crate::errors::ErrorResponse)
    ),
    tag = "vehicles"
)]
pub async fn update_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateVehicleRequest>,
) -> ApiResult<VehicleSummary> {
    let updated = state.vehicle_service().update(id, payload).await?;
    Ok(Json(ApiResponse::success(VehicleSummary::from(updated))))
}

/// Takes a vehicle in or out of maintenance. Vehicles in maintenance
/// cannot be assigned to new shipments.
#[utoipa::path(
    post,
    path = "/api/v1/vehicles/{id}/maintenance",
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    request_body = SetMaintenanceRequest,
    responses(
        (status = 200, description = "Maintenance flag updated", body = ApiResponse<VehicleSummary>),
        (status = 404, description = "Vehicle not found", body = crate::errors::ErrorResponse)
    ),
    tag = "vehicles"
)]
pub async fn set_vehicle_maintenance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetMaintenanceRequest>,
) -> ApiResult<VehicleSummary> {
    let updated = state
        .vehicle_service()
        .set_maintenance(id, payload.in_maintenance)
        .await?;
    Ok(Json(ApiResponse::success(VehicleSummary::from(updated))))
}

#[utoipa::path(
    post,
    path = "/api/v1/vehicles/{id}/archive",
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Vehicle archived", body = ApiResponse<VehicleSummary>),
        (status = 404, description = "Vehicle not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Vehicle has an active shipment", body = crate::errors::ErrorResponse)
    ),
    tag = "vehicles"
)]
pub async fn archive_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<VehicleSummary> {
    let updated = state.vehicle_service().set_archived(id, true).await?;
    Ok(Json(ApiResponse::success(VehicleSummary::from(updated))))
}

#[utoipa::path(
    post,
    path = "/api/v1/vehicles/{id}/unarchive",
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Vehicle restored", body = ApiResponse<VehicleSummary>),
        (status = 404, description = "Vehicle not found", body = crate::errors::ErrorResponse)
    ),
    tag = "vehicles"
)]
pub async fn unarchive_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<VehicleSummary> {
    let updated = state.vehicle_service().set_archived(id, false).await?;
    Ok(Json(ApiResponse::success(VehicleSummary::from(updated))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/vehicles/{id}",
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Vehicle deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Vehicle not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Vehicle has shipment history", body = crate::errors::ErrorResponse)
    ),
    tag = "vehicles"
)]
pub async fn delete_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.vehicle_service().delete(id).await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": id }))))
}
