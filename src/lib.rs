//! FreightDesk API Library
//!
//! This crate provides the core functionality for the FreightDesk API
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod capacity;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod logging;
pub mod manifest;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;
pub mod workflow;

use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::AuthRouterExt;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn package_service(&self) -> Arc<services::packages::PackageService> {
        self.services.packages.clone()
    }

    pub fn delivery_service(&self) -> Arc<services::deliveries::DeliveryService> {
        self.services.deliveries.clone()
    }

    pub fn incoming_service(&self) -> Arc<services::incoming::IncomingShipmentService> {
        self.services.incoming.clone()
    }

    pub fn transfer_service(&self) -> Arc<services::transfers::WarehouseTransferService> {
        self.services.transfers.clone()
    }

    pub fn vehicle_service(&self) -> Arc<services::vehicles::VehicleService> {
        self.services.vehicles.clone()
    }

    pub fn warehouse_service(&self) -> Arc<services::warehouses::WarehouseService> {
        self.services.warehouses.clone()
    }

    pub fn user_service(&self) -> Arc<services::users::UserService> {
        self.services.users.clone()
    }

    pub fn manifest_service(&self) -> Arc<services::manifests::ManifestService> {
        self.services.manifests.clone()
    }

    pub fn service_area_service(&self) -> Arc<services::service_areas::ServiceAreaService> {
        self.services.service_areas.clone()
    }

    pub fn tracking_service(&self) -> Arc<services::tracking::TrackingService> {
        self.services.tracking.clone()
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, per_page: u64) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }

    #[test]
    fn pagination_rounds_total_pages_up() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 7, 1, 3);
        assert_eq!(page.total_pages, 3);

        let exact = PaginatedResponse::new(vec![1, 2], 4, 2, 2);
        assert_eq!(exact.total_pages, 2);

        let empty: PaginatedResponse<i32> = PaginatedResponse::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

// Enhanced API routes function
pub fn api_v1_routes() -> Router<AppState> {
    // Package routes with permission gating
    let packages_read = Router::new()
        .route("/packages", get(handlers::packages::list_packages))
        .route("/packages/:id", get(handlers::packages::get_package))
        .route(
            "/packages/:id/history",
            get(handlers::packages::get_package_history),
        )
        .with_permission(perm::PACKAGES_READ);

    let packages_create = Router::new()
        .route(
            "/packages",
            axum::routing::post(handlers::packages::create_package),
        )
        .with_permission(perm::PACKAGES_CREATE);

    let packages_update = Router::new()
        .route(
            "/packages/:id",
            axum::routing::put(handlers::packages::update_package),
        )
        .with_permission(perm::PACKAGES_UPDATE);

    let packages_status = Router::new()
        .route(
            "/packages/:id/status",
            axum::routing::post(handlers::packages::update_package_status),
        )
        .route(
            "/packages/transfer-forwarder",
            axum::routing::post(handlers::packages::transfer_to_forwarder),
        )
        .route(
            "/packages/confirm-forwarder",
            axum::routing::post(handlers::packages::confirm_forwarder_transfer),
        )
        .with_permission(perm::PACKAGES_STATUS);

    let packages_archive = Router::new()
        .route(
            "/packages/:id/archive",
            axum::routing::post(handlers::packages::archive_package),
        )
        .route(
            "/packages/:id/unarchive",
            axum::routing::post(handlers::packages::unarchive_package),
        )
        .with_permission(perm::PACKAGES_ARCHIVE);

    let packages_delete = Router::new()
        .route(
            "/packages/:id",
            axum::routing::delete(handlers::packages::delete_package),
        )
        .with_permission(perm::PACKAGES_DELETE);

    // Shipment routes (deliveries, incoming, transfers) with permission gating
    let shipments_read = Router::new()
        .route("/deliveries", get(handlers::deliveries::list_deliveries))
        .route(
            "/deliveries/load-summary",
            axum::routing::post(handlers::deliveries::load_summary),
        )
        .route("/deliveries/:id", get(handlers::deliveries::get_delivery))
        .route(
            "/deliveries/:id/packages",
            get(handlers::deliveries::get_delivery_packages),
        )
        .route("/incoming", get(handlers::incoming::list_incoming))
        .route("/incoming/:id", get(handlers::incoming::get_incoming))
        .route(
            "/incoming/:id/packages",
            get(handlers::incoming::get_incoming_packages),
        )
        .route("/transfers", get(handlers::transfers::list_transfers))
        .route("/transfers/:id", get(handlers::transfers::get_transfer))
        .route(
            "/transfers/:id/packages",
            get(handlers::transfers::get_transfer_packages),
        )
        .with_permission(perm::SHIPMENTS_READ);

    let shipments_create = Router::new()
        .route(
            "/deliveries",
            axum::routing::post(handlers::deliveries::create_delivery),
        )
        .route(
            "/incoming",
            axum::routing::post(handlers::incoming::create_incoming),
        )
        .route(
            "/transfers",
            axum::routing::post(handlers::transfers::create_transfer),
        )
        .with_permission(perm::SHIPMENTS_CREATE);

    let shipments_dispatch = Router::new()
        .route(
            "/deliveries/:id/dispatch",
            axum::routing::post(handlers::deliveries::dispatch_delivery),
        )
        .route(
            "/incoming/:id/dispatch",
            axum::routing::post(handlers::incoming::dispatch_incoming),
        )
        .route(
            "/transfers/:id/dispatch",
            axum::routing::post(handlers::transfers::dispatch_transfer),
        )
        .with_permission(perm::SHIPMENTS_DISPATCH);

    let shipments_update = Router::new()
        .route(
            "/incoming/:id/mark-arrived",
            axum::routing::post(handlers::incoming::mark_incoming_arrived),
        )
        .route(
            "/transfers/:id/mark-arrived",
            axum::routing::post(handlers::transfers::mark_transfer_arrived),
        )
        .with_permission(perm::SHIPMENTS_UPDATE);

    let shipments_complete = Router::new()
        .route(
            "/deliveries/:id/complete",
            axum::routing::post(handlers::deliveries::complete_delivery),
        )
        .route(
            "/incoming/:id/accept",
            axum::routing::post(handlers::incoming::accept_incoming),
        )
        .route(
            "/transfers/:id/complete",
            axum::routing::post(handlers::transfers::complete_transfer),
        )
        .with_permission(perm::SHIPMENTS_COMPLETE);

    let shipments_cancel = Router::new()
        .route(
            "/deliveries/:id/cancel",
            axum::routing::post(handlers::deliveries::cancel_delivery),
        )
        .route(
            "/incoming/:id/cancel",
            axum::routing::post(handlers::incoming::cancel_incoming),
        )
        .route(
            "/transfers/:id/cancel",
            axum::routing::post(handlers::transfers::cancel_transfer),
        )
        .with_permission(perm::SHIPMENTS_CANCEL);

    // Fleet routes with permission gating
    let vehicles_read = Router::new()
        .route("/vehicles", get(handlers::vehicles::list_vehicles))
        .route("/vehicles/:id", get(handlers::vehicles::get_vehicle))
        .with_permission(perm::VEHICLES_READ);

    let vehicles_manage = Router::new()
        .route(
            "/vehicles",
            axum::routing::post(handlers::vehicles::create_vehicle),
        )
        .route(
            "/vehicles/:id",
            axum::routing::put(handlers::vehicles::update_vehicle),
        )
        .route(
            "/vehicles/:id",
            axum::routing::delete(handlers::vehicles::delete_vehicle),
        )
        .route(
            "/vehicles/:id/archive",
            axum::routing::post(handlers::vehicles::archive_vehicle),
        )
        .route(
            "/vehicles/:id/unarchive",
            axum::routing::post(handlers::vehicles::unarchive_vehicle),
        )
        .route(
            "/vehicles/:id/maintenance",
            axum::routing::post(handlers::vehicles::set_vehicle_maintenance),
        )
        .with_permission(perm::VEHICLES_MANAGE);

    // Warehouse routes with permission gating
    let warehouses_read = Router::new()
        .route("/warehouses", get(handlers::warehouses::list_warehouses))
        .route("/warehouses/:id", get(handlers::warehouses::get_warehouse))
        .route(
            "/warehouses/:id/utilization",
            get(handlers::warehouses::get_warehouse_utilization),
        )
        .with_permission(perm::WAREHOUSES_READ);

    let warehouses_manage = Router::new()
        .route(
            "/warehouses",
            axum::routing::post(handlers::warehouses::create_warehouse),
        )
        .route(
            "/warehouses/:id",
            axum::routing::put(handlers::warehouses::update_warehouse),
        )
        .route(
            "/warehouses/:id/archive",
            axum::routing::post(handlers::warehouses::archive_warehouse),
        )
        .route(
            "/warehouses/:id/unarchive",
            axum::routing::post(handlers::warehouses::unarchive_warehouse),
        )
        .with_permission(perm::WAREHOUSES_MANAGE);

    // User administration routes with permission gating
    let users_read = Router::new()
        .route("/users", get(handlers::users::list_users))
        .route("/users/:id", get(handlers::users::get_user))
        .with_permission(perm::USERS_READ);

    let users_manage = Router::new()
        .route("/users", axum::routing::post(handlers::users::create_user))
        .route(
            "/users/:id",
            axum::routing::put(handlers::users::update_user),
        )
        .route(
            "/users/:id",
            axum::routing::delete(handlers::users::delete_user),
        )
        .route(
            "/users/:id/activate",
            axum::routing::post(handlers::users::activate_user),
        )
        .route(
            "/users/:id/deactivate",
            axum::routing::post(handlers::users::deactivate_user),
        )
        .with_permission(perm::USERS_MANAGE);

    // Manifest routes with permission gating. Uploads carry whole files, so
    // the body limit is raised well past axum's 2 MB default; the exact cap
    // from the config is enforced in the handler.
    let manifests_read = Router::new()
        .route("/manifests", get(handlers::manifests::list_manifests))
        .route("/manifests/:id", get(handlers::manifests::get_manifest))
        .with_permission(perm::MANIFESTS_READ);

    let manifests_upload = Router::new()
        .route(
            "/manifests",
            axum::routing::post(handlers::manifests::upload_manifest),
        )
        .route(
            "/manifests/:id/file",
            axum::routing::put(handlers::manifests::replace_manifest_file),
        )
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
        .with_permission(perm::MANIFESTS_UPLOAD);

    let manifests_import = Router::new()
        .route(
            "/manifests/:id/import",
            axum::routing::post(handlers::manifests::import_manifest),
        )
        .with_permission(perm::MANIFESTS_IMPORT);

    // Service area routes with permission gating
    let areas_read = Router::new()
        .route("/service-areas", get(handlers::service_areas::list_cascade))
        .route(
            "/service-areas/all",
            get(handlers::service_areas::list_areas),
        )
        .route(
            "/service-areas/validate",
            axum::routing::post(handlers::service_areas::validate_addresses),
        )
        .with_permission(perm::AREAS_READ);

    let areas_manage = Router::new()
        .route(
            "/service-areas",
            axum::routing::post(handlers::service_areas::upsert_area),
        )
        .route(
            "/service-areas/:id",
            axum::routing::delete(handlers::service_areas::delete_area),
        )
        .with_permission(perm::AREAS_MANAGE);

    // Public tracking lookup (no auth: customers query by tracking number)
    let tracking_public = Router::new().route(
        "/tracking/:tracking_number",
        get(handlers::tracking::track_package),
    );

    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        // Packages API (auth + permissions)
        .merge(packages_read)
        .merge(packages_create)
        .merge(packages_update)
        .merge(packages_status)
        .merge(packages_archive)
        .merge(packages_delete)
        // Shipments API: deliveries, incoming, transfers (auth + permissions)
        .merge(shipments_read)
        .merge(shipments_create)
        .merge(shipments_dispatch)
        .merge(shipments_update)
        .merge(shipments_complete)
        .merge(shipments_cancel)
        // Fleet API (auth + permissions)
        .merge(vehicles_read)
        .merge(vehicles_manage)
        // Warehouses API (auth + permissions)
        .merge(warehouses_read)
        .merge(warehouses_manage)
        // Users API (auth + permissions)
        .merge(users_read)
        .merge(users_manage)
        // Manifests API (auth + permissions)
        .merge(manifests_read)
        .merge(manifests_upload)
        .merge(manifests_import)
        // Service areas API (auth + permissions)
        .merge(areas_read)
        .merge(areas_manage)
        // Tracking API (public)
        .merge(tracking_public)
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let version = env!("CARGO_PKG_VERSION");
    let git = option_env!("GIT_HASH").unwrap_or("unknown");
    let build_time = option_env!("BUILD_TIME").unwrap_or("unknown");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "git": git,
        "build_time": build_time,
        "service": "freightdesk-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    // Check database connectivity
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

pub mod prelude {
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::openapi::*;
    pub use crate::tracing::*;
}
