use crate::{
    entities::service_area,
    handlers::common::PaginationParams,
    services::service_areas::{AddressCheck, AddressTriple, UpsertServiceAreaRequest},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AreaListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Restrict to one province, matched case-insensitively
    pub province: Option<String>,
}

/// Cascade query: no parameters lists provinces, `province` lists its
/// cities, `province` + `city` lists barangays.
#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CascadeQuery {
    pub province: Option<String>,
    pub city: Option<String>,
}

/// One level of the served-area cascade, as consumed by the address
/// dropdowns on the intake form.
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "level": "cities",
    "values": ["Cebu City", "Lapu-Lapu", "Mandaue"]
}))]
pub struct CascadeLevel {
    /// provinces, cities or barangays
    pub level: String,
    pub values: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "addresses": [
        {"province": "Cebu", "city": "Cebu City", "barangay": "Lahug"},
        {"province": "Cebu", "city": "Cebu City", "barangay": "Atlantis"}
    ]
}))]
pub struct ValidateAddressesRequest {
    pub addresses: Vec<AddressTriple>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceAreaSummary {
    pub id: Uuid,
    #[schema(example = "Cebu")]
    pub province: String,
    #[schema(example = "Cebu City")]
    pub city: String,
    #[schema(example = "Lahug")]
    pub barangay: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<service_area::Model> for ServiceAreaSummary {
    fn from(model: service_area::Model) -> Self {
        Self {
            id: model.id,
            province: model.province,
            city: model.city,
            barangay: model.barangay,
            is_active: model.is_active,
            created_at: model.created_at,
        }
    }
}

/// Served-area cascade for address dropdowns.
#[utoipa::path(
    get,
    path = "/api/v1/service-areas",
    params(CascadeQuery),
    responses(
        (status = 200, description = "One cascade level", body = ApiResponse<CascadeLevel>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "service-areas"
)]
pub async fn list_cascade(
    State(state): State<AppState>,
    Query(query): Query<CascadeQuery>,
) -> ApiResult<CascadeLevel> {
    let service = state.service_area_service();
    let level = match (query.province.as_deref(), query.city.as_deref()) {
        (Some(province), Some(city)) => CascadeLevel {
            level: "barangays".to_string(),
            values: service.barangays(province, city).await?,
        },
        (Some(province), None) => CascadeLevel {
            level: "cities".to_string(),
            values: service.cities(province).await?,
        },
        _ => CascadeLevel {
            level: "provinces".to_string(),
            values: service.provinces().await?,
        },
    };
    Ok(Json(ApiResponse::success(level)))
}

/// Full gazetteer rows for the admin screen, active and inactive alike.
#[utoipa::path(
    get,
    path = "/api/v1/service-areas/all",
    params(AreaListQuery),
    responses(
        (status = 200, description = "Areas listed", body = ApiResponse<PaginatedResponse<ServiceAreaSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "service-areas"
)]
pub async fn list_areas(
    State(state): State<AppState>,
    Query(query): Query<AreaListQuery>,
) -> ApiResult<PaginatedResponse<ServiceAreaSummary>> {
    let (page, per_page) = PaginationParams {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    }
    .clamped();

    let (records, total) = state
        .service_area_service()
        .list(query.province, page, per_page)
        .await?;
    let items: Vec<ServiceAreaSummary> =
        records.into_iter().map(ServiceAreaSummary::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, per_page,
    ))))
}

/// Checks a batch of receiver addresses against the gazetteer. Each
/// failing triple names the shallowest unknown level.
#[utoipa::path(
    post,
    path = "/api/v1/service-areas/validate",
    request_body = ValidateAddressesRequest,
    responses(
        (status = 200, description = "Per-address results", body = ApiResponse<Vec<AddressCheck>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "service-areas"
)]
pub async fn validate_addresses(
    State(state): State<AppState>,
    Json(payload): Json<ValidateAddressesRequest>,
) -> ApiResult<Vec<AddressCheck>> {
    let checks = state
        .service_area_service()
        .validate(payload.addresses)
        .await?;
    Ok(Json(ApiResponse::success(checks)))
}

/// Adds or revives a served area. Matching is by normalized triple, so
/// re-submitting with different casing updates the stored display form.
#[utoipa::path(
    post,
    path = "/api/v1/service-areas",
    request_body = UpsertServiceAreaRequest,
    responses(
        (status = 200, description = "Area upserted", body = ApiResponse<ServiceAreaSummary>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "service-areas"
)]
pub async fn upsert_area(
    State(state): State<AppState>,
    Json(payload): Json<UpsertServiceAreaRequest>,
) -> ApiResult<ServiceAreaSummary> {
    let area = state.service_area_service().upsert(payload).await?;
    Ok(Json(ApiResponse::success(ServiceAreaSummary::from(area))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/service-areas/{id}",
    params(("id" = Uuid, Path, description = "Service area ID")),
    responses(
        (status = 200, description = "Area removed", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Area not found", body = crate::errors::ErrorResponse)
    ),
    tag = "service-areas"
)]
pub async fn delete_area(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.service_area_service().delete(id).await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": id }))))
}
