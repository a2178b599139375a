use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "FreightDesk API",
        version = "1.0.0",
        description = r#"
# FreightDesk Forwarding API

Back office for a sea/air consolidation forwarder: package intake,
manifest import, warehouse and fleet management, delivery and transfer
scheduling, and public package tracking.

## Authentication

Portal endpoints require a JWT bearer token from `POST /auth/login`:

```
Authorization: Bearer <your-jwt-token>
```

The public tracking endpoint is the one exception and takes no token.

## Error Handling

Errors use a consistent envelope with appropriate HTTP status codes:

```json
{
  "error": "Conflict",
  "message": "selected packages weigh 812.5 kg, over the vehicle limit of 800 kg",
  "request_id": "b2f0b5c6-7a01-4b8e-8723-7e1d26a91c55",
  "timestamp": "2024-11-09T10:30:00Z"
}
```

Manifest schema failures are 422 with a `details` array of per-row
field errors.

## Pagination

List endpoints take `page` (default 1) and `per_page` (default 20,
max 100) plus endpoint-specific filters.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "packages", description = "Package intake and lifecycle"),
        (name = "deliveries", description = "Delivery runs out to recipients"),
        (name = "incoming", description = "Inbound shipments from agents"),
        (name = "transfers", description = "Warehouse-to-warehouse transfers"),
        (name = "vehicles", description = "Fleet management"),
        (name = "warehouses", description = "Facilities and utilization"),
        (name = "users", description = "Portal accounts"),
        (name = "manifests", description = "Agent manifest upload and import"),
        (name = "service-areas", description = "Served address gazetteer"),
        (name = "tracking", description = "Public package tracking")
    ),
    paths(
        // Packages
        crate::handlers::packages::list_packages,
        crate::handlers::packages::get_package,
        crate::handlers::packages::create_package,
        crate::handlers::packages::update_package,
        crate::handlers::packages::update_package_status,
        crate::handlers::packages::get_package_history,
        crate::handlers::packages::archive_package,
        crate::handlers::packages::unarchive_package,
        crate::handlers::packages::delete_package,
        crate::handlers::packages::transfer_to_forwarder,
        crate::handlers::packages::confirm_forwarder_transfer,

        // Deliveries
        crate::handlers::deliveries::list_deliveries,
        crate::handlers::deliveries::get_delivery,
        crate::handlers::deliveries::get_delivery_packages,
        crate::handlers::deliveries::create_delivery,
        crate::handlers::deliveries::load_summary,
        crate::handlers::deliveries::dispatch_delivery,
        crate::handlers::deliveries::complete_delivery,
        crate::handlers::deliveries::cancel_delivery,

        // Incoming shipments
        crate::handlers::incoming::list_incoming,
        crate::handlers::incoming::get_incoming,
        crate::handlers::incoming::get_incoming_packages,
        crate::handlers::incoming::create_incoming,
        crate::handlers::incoming::dispatch_incoming,
        crate::handlers::incoming::mark_incoming_arrived,
        crate::handlers::incoming::accept_incoming,
        crate::handlers::incoming::cancel_incoming,

        // Warehouse transfers
        crate::handlers::transfers::list_transfers,
        crate::handlers::transfers::get_transfer,
        crate::handlers::transfers::get_transfer_packages,
        crate::handlers::transfers::create_transfer,
        crate::handlers::transfers::dispatch_transfer,
        crate::handlers::transfers::mark_transfer_arrived,
        crate::handlers::transfers::complete_transfer,
        crate::handlers::transfers::cancel_transfer,

        // Fleet
        crate::handlers::vehicles::list_vehicles,
        crate::handlers::vehicles::get_vehicle,
        crate::handlers::vehicles::create_vehicle,
        crate::handlers::vehicles::update_vehicle,
        crate::handlers::vehicles::set_vehicle_maintenance,
        crate::handlers::vehicles::archive_vehicle,
        crate::handlers::vehicles::unarchive_vehicle,
        crate::handlers::vehicles::delete_vehicle,

        // Warehouses
        crate::handlers::warehouses::list_warehouses,
        crate::handlers::warehouses::get_warehouse,
        crate::handlers::warehouses::get_warehouse_utilization,
        crate::handlers::warehouses::create_warehouse,
        crate::handlers::warehouses::update_warehouse,
        crate::handlers::warehouses::archive_warehouse,
        crate::handlers::warehouses::unarchive_warehouse,

        // Users
        crate::handlers::users::list_users,
        crate::handlers::users::get_user,
        crate::handlers::users::create_user,
        crate::handlers::users::update_user,
        crate::handlers::users::activate_user,
        crate::handlers::users::deactivate_user,
        crate::handlers::users::delete_user,

        // Manifests
        crate::handlers::manifests::list_manifests,
        crate::handlers::manifests::get_manifest,
        crate::handlers::manifests::upload_manifest,
        crate::handlers::manifests::replace_manifest_file,
        crate::handlers::manifests::import_manifest,

        // Service areas
        crate::handlers::service_areas::list_cascade,
        crate::handlers::service_areas::list_areas,
        crate::handlers::service_areas::validate_addresses,
        crate::handlers::service_areas::upsert_area,
        crate::handlers::service_areas::delete_area,

        // Public tracking
        crate::handlers::tracking::track_package,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,

            // Package types
            crate::handlers::packages::PackageSummary,
            crate::handlers::packages::StatusLogEntry,
            crate::handlers::packages::UpdatePackageStatusRequest,
            crate::handlers::packages::ForwarderTransferRequest,
            crate::handlers::packages::ForwarderConfirmRequest,
            crate::services::packages::CreatePackageRequest,
            crate::services::packages::UpdatePackageRequest,
            crate::entities::package::PackageStatus,
            crate::entities::package::ShippingParty,
            crate::entities::package::ShippingMode,
            crate::entities::package::ShippingType,
            crate::entities::package::ReceptionMode,

            // Shipment types
            crate::handlers::deliveries::ShipmentSummary,
            crate::handlers::deliveries::ScheduledShipment,
            crate::handlers::deliveries::CancelShipmentRequest,
            crate::handlers::deliveries::CompleteDeliveryRequest,
            crate::handlers::deliveries::LoadSummaryRequest,
            crate::services::deliveries::CreateDeliveryRequest,
            crate::services::deliveries::PackageSelection,
            crate::services::deliveries::PackageOutcome,
            crate::services::incoming::CreateIncomingRequest,
            crate::services::transfers::CreateTransferRequest,
            crate::entities::shipment::ShipmentKind,
            crate::entities::shipment::ShipmentStatus,
            crate::capacity::LoadSummary,

            // Fleet and facilities
            crate::handlers::vehicles::VehicleSummary,
            crate::handlers::vehicles::SetMaintenanceRequest,
            crate::services::vehicles::CreateVehicleRequest,
            crate::services::vehicles::UpdateVehicleRequest,
            crate::entities::vehicle::VehicleType,
            crate::handlers::warehouses::WarehouseSummary,
            crate::services::warehouses::CreateWarehouseRequest,
            crate::services::warehouses::UpdateWarehouseRequest,
            crate::services::warehouses::WarehouseUtilization,

            // Accounts
            crate::handlers::users::UserSummary,
            crate::services::users::CreateUserRequest,
            crate::services::users::UpdateUserRequest,
            crate::entities::user::UserRole,

            // Manifests
            crate::handlers::manifests::ManifestSummary,
            crate::handlers::manifests::ManifestDetail,
            crate::handlers::manifests::ManifestImportResult,
            crate::handlers::manifests::UploadManifestForm,
            crate::services::manifests::UploadManifestRequest,
            crate::services::manifests::ManifestRowView,
            crate::manifest::ManifestRecord,
            crate::manifest::FieldError,
            crate::manifest::RowErrors,
            crate::entities::manifest::ManifestStatus,

            // Service areas
            crate::handlers::service_areas::CascadeLevel,
            crate::handlers::service_areas::ValidateAddressesRequest,
            crate::handlers::service_areas::ServiceAreaSummary,
            crate::services::service_areas::UpsertServiceAreaRequest,
            crate::services::service_areas::AddressTriple,
            crate::services::service_areas::AddressCheck,

            // Tracking
            crate::services::tracking::TrackingInfo,
            crate::services::tracking::TrackingEvent,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_generates() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("FreightDesk API"));
        assert!(json.contains("/api/v1/packages"));
        assert!(json.contains("/api/v1/tracking/{tracking_number}"));
    }
}
