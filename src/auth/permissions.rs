/*!
 * # Permissions Module
 *
 * Defines the permission vocabulary for the API. Permissions are
 * `resource:action` strings; roles map onto sets of them in the rbac
 * module.
 */

/// Permission actions
pub struct Actions;

impl Actions {
    pub const READ: &'static str = "read";
    pub const CREATE: &'static str = "create";
    pub const UPDATE: &'static str = "update";
    pub const DELETE: &'static str = "delete";
    pub const MANAGE: &'static str = "manage";
    pub const ALL: &'static str = "*";
}

/// Resource types
pub struct Resources;

impl Resources {
    pub const PACKAGES: &'static str = "packages";
    pub const SHIPMENTS: &'static str = "shipments";
    pub const VEHICLES: &'static str = "vehicles";
    pub const WAREHOUSES: &'static str = "warehouses";
    pub const USERS: &'static str = "users";
    pub const MANIFESTS: &'static str = "manifests";
    pub const AREAS: &'static str = "areas";
}

/// Common permission string constants for compile-time safety
pub mod consts {
    // Packages
    pub const PACKAGES_READ: &str = "packages:read";
    pub const PACKAGES_CREATE: &str = "packages:create";
    pub const PACKAGES_UPDATE: &str = "packages:update";
    pub const PACKAGES_STATUS: &str = "packages:status";
    pub const PACKAGES_ARCHIVE: &str = "packages:archive";
    pub const PACKAGES_DELETE: &str = "packages:delete";

    // Shipments (deliveries, incoming runs, warehouse transfers)
    pub const SHIPMENTS_READ: &str = "shipments:read";
    pub const SHIPMENTS_CREATE: &str = "shipments:create";
    pub const SHIPMENTS_UPDATE: &str = "shipments:update";
    pub const SHIPMENTS_DISPATCH: &str = "shipments:dispatch";
    pub const SHIPMENTS_COMPLETE: &str = "shipments:complete";
    pub const SHIPMENTS_CANCEL: &str = "shipments:cancel";

    // Fleet
    pub const VEHICLES_READ: &str = "vehicles:read";
    pub const VEHICLES_MANAGE: &str = "vehicles:manage";

    // Warehouses
    pub const WAREHOUSES_READ: &str = "warehouses:read";
    pub const WAREHOUSES_MANAGE: &str = "warehouses:manage";

    // Users
    pub const USERS_READ: &str = "users:read";
    pub const USERS_MANAGE: &str = "users:manage";

    // Manifests
    pub const MANIFESTS_READ: &str = "manifests:read";
    pub const MANIFESTS_UPLOAD: &str = "manifests:upload";
    pub const MANIFESTS_IMPORT: &str = "manifests:import";

    // Service areas
    pub const AREAS_READ: &str = "areas:read";
    pub const AREAS_MANAGE: &str = "areas:manage";
}

/// Format a permission string
pub fn format_permission(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}
