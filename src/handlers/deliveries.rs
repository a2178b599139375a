use crate::{
    auth::AuthUser,
    capacity::{self, LoadSummary},
    entities::{package, shipment, vehicle},
    errors::ServiceError,
    handlers::common::{parse_enum_param, PaginationParams},
    handlers::packages::PackageSummary,
    services::deliveries::{CreateDeliveryRequest, PackageOutcome, ShipmentFilter},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Extension, Path, Query, State},
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShipmentListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Shipment status filter (PREPARING, IN_TRANSIT, ARRIVED, COMPLETED, CANCELLED)
    pub status: Option<String>,
    pub archived: Option<bool>,
}

impl ShipmentListQuery {
    /// Shared decode into service filter + clamped pagination, used by
    /// all three shipment-kind routers.
    pub(crate) fn decode(&self) -> Result<(ShipmentFilter, u64, u64), ServiceError> {
        let (page, per_page) = PaginationParams {
            page: self.page.unwrap_or(1),
            per_page: self.per_page.unwrap_or(20),
        }
        .clamped();

        let status = self
            .status
            .as_deref()
            .map(|raw| parse_enum_param(raw, "status"))
            .transpose()?;

        let filter = ShipmentFilter {
            status,
            archived: Some(self.archived.unwrap_or(false)),
        };
        Ok((filter, page, per_page))
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "5b0d1c22-9dd3-47c1-b0a8-61a50672f1c0",
    "reference": "DLV-7F3A21C9",
    "kind": "DELIVERY",
    "status": "PREPARING",
    "origin_warehouse_id": "f6a2e7ab-5c14-4a3e-9a36-6da2f1b6e001",
    "driver_id": "0b9a2a11-83f4-4f0b-9a17-02f3a34f9d10",
    "vehicle_id": "d2b5a6f4-98a5-49a4-95a6-67a1cf4e2b55",
    "scheduled_date": "2024-11-12",
    "created_at": "2024-11-09T10:30:00Z"
}))]
pub struct ShipmentSummary {
    /// Shipment UUID
    pub id: Uuid,
    /// Human-facing reference code
    #[schema(example = "DLV-7F3A21C9")]
    pub reference: String,
    /// DELIVERY, INCOMING or WAREHOUSE_TRANSFER
    pub kind: String,
    #[schema(example = "PREPARING")]
    pub status: String,
    pub origin_warehouse_id: Option<Uuid>,
    pub destination_warehouse_id: Option<Uuid>,
    /// Free-form origin for incoming shipments (agent, port)
    pub origin_label: Option<String>,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub manifest_id: Option<Uuid>,
    pub scheduled_date: Option<NaiveDate>,
    pub departed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<shipment::Model> for ShipmentSummary {
    fn from(model: shipment::Model) -> Self {
        Self {
            id: model.id,
            reference: model.reference,
            kind: model.kind.to_string(),
            status: model.status.to_string(),
            origin_warehouse_id: model.origin_warehouse_id,
            destination_warehouse_id: model.destination_warehouse_id,
            origin_label: model.origin_label,
            driver_id: model.driver_id,
            vehicle_id: model.vehicle_id,
            manifest_id: model.manifest_id,
            scheduled_date: model.scheduled_date,
            departed_at: model.departed_at,
            completed_at: model.completed_at,
            notes: model.notes,
            is_archived: model.is_archived,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// A freshly scheduled shipment together with the packages placed on it.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScheduledShipment {
    pub shipment: ShipmentSummary,
    pub packages: Vec<PackageSummary>,
}

impl ScheduledShipment {
    pub(crate) fn from_parts(shipment: shipment::Model, packages: Vec<package::Model>) -> Self {
        Self {
            shipment: ShipmentSummary::from(shipment),
            packages: packages.into_iter().map(PackageSummary::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelShipmentRequest {
    /// Recorded on the CANCELLED log entry
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "outcomes": [
        {"package_id": "8f14c3a0-4af1-4e0c-9967-3a1a72c5a9d2", "delivered": true},
        {"package_id": "97b0e1d4-0b61-47e0-8f3e-f6a5be4f8f31", "delivered": false}
    ]
}))]
pub struct CompleteDeliveryRequest {
    /// One entry per member package; returned ones go back to sorting
    pub outcomes: Vec<PackageOutcome>,
}

/// Manual-selection preview request, recomputed by the portal on every
/// toggle.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoadSummaryRequest {
    pub package_ids: Vec<Uuid>,
    /// Omitted while no vehicle is chosen yet; capacity reads "N/A"
    pub vehicle_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries",
    params(ShipmentListQuery),
    responses(
        (status = 200, description = "Delivery runs listed", body = ApiResponse<PaginatedResponse<ShipmentSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn list_deliveries(
    State(state): State<AppState>,
    Query(query): Query<ShipmentListQuery>,
) -> ApiResult<PaginatedResponse<ShipmentSummary>> {
    let (filter, page, per_page) = query.decode()?;
    let (records, total) = state
        .delivery_service()
        .list(filter, page, per_page)
        .await?;
    let items: Vec<ShipmentSummary> = records.into_iter().map(ShipmentSummary::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, per_page,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries/{id}",
    params(("id" = Uuid, Path, description = "Delivery shipment ID")),
    responses(
        (status = 200, description = "Delivery fetched", body = ApiResponse<ShipmentSummary>),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn get_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentSummary> {
    let model = state.delivery_service().get(id).await?;
    Ok(Json(ApiResponse::success(ShipmentSummary::from(model))))
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries/{id}/packages",
    params(("id" = Uuid, Path, description = "Delivery shipment ID")),
    responses(
        (status = 200, description = "Packages riding on the delivery", body = ApiResponse<Vec<PackageSummary>>),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn get_delivery_packages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<PackageSummary>> {
    let packages = state.delivery_service().packages_on(id).await?;
    let items: Vec<PackageSummary> = packages.into_iter().map(PackageSummary::from).collect();
    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    post,
    path = "/api/v1/deliveries",
    request_body = CreateDeliveryRequest,
    responses(
        (status = 200, description = "Delivery scheduled", body = ApiResponse<ScheduledShipment>),
        (status = 400, description = "Invalid selection", body = crate::errors::ErrorResponse),
        (status = 409, description = "Over vehicle capacity", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn create_delivery(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Json(payload): Json<CreateDeliveryRequest>,
) -> ApiResult<ScheduledShipment> {
    let (shipment, packages) = state
        .delivery_service()
        .create(payload, actor.user_id)
        .await?;
    Ok(Json(ApiResponse::success(ScheduledShipment::from_parts(
        shipment, packages,
    ))))
}

/// Reports the toggled set's total weight against the chosen vehicle.
/// Over-selection is flagged, never blocked; creation enforces it.
#[utoipa::path(
    post,
    path = "/api/v1/deliveries/load-summary",
    request_body = LoadSummaryRequest,
    responses(
        (status = 200, description = "Load summary for the toggled set", body = ApiResponse<LoadSummary>),
        (status = 404, description = "Package or vehicle not found", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn load_summary(
    State(state): State<AppState>,
    Json(payload): Json<LoadSummaryRequest>,
) -> ApiResult<LoadSummary> {
    let db = state.db.as_ref();

    let packages = package::Entity::find()
        .filter(package::Column::Id.is_in(payload.package_ids.clone()))
        .all(db)
        .await?;
    if packages.len() != payload.package_ids.len() {
        return Err(ServiceError::NotFound(
            "some selected packages do not exist".to_string(),
        ));
    }
    let weights: Vec<_> = packages.iter().map(|p| p.weight_kg).collect();

    let capacity_kg = match payload.vehicle_id {
        Some(vehicle_id) => Some(
            vehicle::Entity::find_by_id(vehicle_id)
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Vehicle {} not found", vehicle_id))
                })?
                .weight_capacity_kg,
        ),
        None => None,
    };

    Ok(Json(ApiResponse::success(capacity::summarize(
        &weights,
        capacity_kg,
    ))))
}

#[utoipa::path(
    post,
    path = "/api/v1/deliveries/{id}/dispatch",
    params(("id" = Uuid, Path, description = "Delivery shipment ID")),
    responses(
        (status = 200, description = "Delivery dispatched; packages out for delivery", body = ApiResponse<ShipmentSummary>),
        (status = 400, description = "Not in a dispatchable state", body = crate::errors::ErrorResponse),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn dispatch_delivery(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentSummary> {
    let updated = state.delivery_service().dispatch(id, actor.user_id).await?;
    Ok(Json(ApiResponse::success(ShipmentSummary::from(updated))))
}

#[utoipa::path(
    post,
    path = "/api/v1/deliveries/{id}/complete",
    params(("id" = Uuid, Path, description = "Delivery shipment ID")),
    request_body = CompleteDeliveryRequest,
    responses(
        (status = 200, description = "Run closed out", body = ApiResponse<ShipmentSummary>),
        (status = 400, description = "Outcomes do not cover the member packages", body = crate::errors::ErrorResponse),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn complete_delivery(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteDeliveryRequest>,
) -> ApiResult<ShipmentSummary> {
    let updated = state
        .delivery_service()
        .complete(id, payload.outcomes, actor.user_id)
        .await?;
    Ok(Json(ApiResponse::success(ShipmentSummary::from(updated))))
}

#[utoipa::path(
    post,
    path = "/api/v1/deliveries/{id}/cancel",
    params(("id" = Uuid, Path, description = "Delivery shipment ID")),
    request_body = CancelShipmentRequest,
    responses(
        (status = 200, description = "Delivery cancelled", body = ApiResponse<ShipmentSummary>),
        (status = 400, description = "Not cancellable from its current status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn cancel_delivery(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelShipmentRequest>,
) -> ApiResult<ShipmentSummary> {
    let updated = state
        .delivery_service()
        .cancel(id, payload.reason, actor.user_id)
        .await?;
    Ok(Json(ApiResponse::success(ShipmentSummary::from(updated))))
}
