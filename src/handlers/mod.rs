pub mod common;
pub mod deliveries;
pub mod incoming;
pub mod manifests;
pub mod packages;
pub mod service_areas;
pub mod tracking;
pub mod transfers;
pub mod users;
pub mod vehicles;
pub mod warehouses;

use crate::db::DbPool;
use crate::events::EventSender;
use slog::{o, Logger};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub packages: Arc<crate::services::packages::PackageService>,
    pub deliveries: Arc<crate::services::deliveries::DeliveryService>,
    pub incoming: Arc<crate::services::incoming::IncomingShipmentService>,
    pub transfers: Arc<crate::services::transfers::WarehouseTransferService>,
    pub vehicles: Arc<crate::services::vehicles::VehicleService>,
    pub warehouses: Arc<crate::services::warehouses::WarehouseService>,
    pub users: Arc<crate::services::users::UserService>,
    pub manifests: Arc<crate::services::manifests::ManifestService>,
    pub service_areas: Arc<crate::services::service_areas::ServiceAreaService>,
    pub tracking: Arc<crate::services::tracking::TrackingService>,
}

impl AppServices {
    /// Builds the full service container, one component logger per
    /// service off the shared base logger.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        base_logger: Logger,
        manifest_max_rows: usize,
    ) -> Self {
        let packages = Arc::new(crate::services::packages::PackageService::new(
            db_pool.clone(),
            event_sender.clone(),
            base_logger.new(o!("component" => "package_service")),
        ));
        let deliveries = Arc::new(crate::services::deliveries::DeliveryService::new(
            db_pool.clone(),
            event_sender.clone(),
            base_logger.new(o!("component" => "delivery_service")),
        ));
        let incoming = Arc::new(crate::services::incoming::IncomingShipmentService::new(
            db_pool.clone(),
            event_sender.clone(),
            base_logger.new(o!("component" => "incoming_service")),
        ));
        let transfers = Arc::new(crate::services::transfers::WarehouseTransferService::new(
            db_pool.clone(),
            event_sender.clone(),
            base_logger.new(o!("component" => "transfer_service")),
        ));
        let vehicles = Arc::new(crate::services::vehicles::VehicleService::new(
            db_pool.clone(),
            event_sender.clone(),
            base_logger.new(o!("component" => "vehicle_service")),
        ));
        let warehouses = Arc::new(crate::services::warehouses::WarehouseService::new(
            db_pool.clone(),
            base_logger.new(o!("component" => "warehouse_service")),
        ));
        let users = Arc::new(crate::services::users::UserService::new(
            db_pool.clone(),
            event_sender.clone(),
            base_logger.new(o!("component" => "user_service")),
        ));
        let manifests = Arc::new(crate::services::manifests::ManifestService::new(
            db_pool.clone(),
            event_sender,
            base_logger.new(o!("component" => "manifest_service")),
            manifest_max_rows,
        ));
        let service_areas = Arc::new(crate::services::service_areas::ServiceAreaService::new(
            db_pool.clone(),
            base_logger.new(o!("component" => "service_area_service")),
        ));
        let tracking = Arc::new(crate::services::tracking::TrackingService::new(
            db_pool,
            base_logger.new(o!("component" => "tracking_service")),
        ));

        Self {
            packages,
            deliveries,
            incoming,
            transfers,
            vehicles,
            warehouses,
            users,
            manifests,
            service_areas,
            tracking,
        }
    }
}
