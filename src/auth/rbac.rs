/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Maps the three account roles onto permission sets. The mapping is
 * data here rather than branching scattered through handlers, so adding
 * a role or widening one is a single edit.
 */

use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::warn;

use super::permissions::consts;

/// Role definition with associated permissions
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
}

// Define standard roles and their permissions
lazy_static! {
    pub static ref ROLES: HashMap<String, Role> = {
        let mut roles = HashMap::new();

        // Admin role - has all permissions
        roles.insert(
            "admin".to_string(),
            Role {
                name: "admin".to_string(),
                description: "Administrator with full access".to_string(),
                permissions: vec!["*".to_string()],
            },
        );

        // Staff role - day-to-day warehouse and scheduling operations
        roles.insert(
            "staff".to_string(),
            Role {
                name: "staff".to_string(),
                description: "Warehouse staff running intake, sorting and scheduling".to_string(),
                permissions: vec![
                    "packages:*".to_string(),
                    "shipments:*".to_string(),
                    "manifests:*".to_string(),
                    consts::VEHICLES_READ.to_string(),
                    consts::WAREHOUSES_READ.to_string(),
                    consts::AREAS_READ.to_string(),
                ],
            },
        );

        // Driver role - sees assigned runs and confirms completion
        roles.insert(
            "driver".to_string(),
            Role {
                name: "driver".to_string(),
                description: "Driver confirming pickups and completed runs".to_string(),
                permissions: vec![
                    consts::SHIPMENTS_READ.to_string(),
                    consts::SHIPMENTS_COMPLETE.to_string(),
                    consts::PACKAGES_READ.to_string(),
                ],
            },
        );

        roles
    };
}

/// Get a role by name
pub fn get_role(role_name: &str) -> Option<&'static Role> {
    ROLES.get(role_name)
}

/// Get all permissions for a role
pub fn permissions_for_role(role_name: &str) -> Vec<String> {
    match ROLES.get(role_name) {
        Some(role) => role.permissions.clone(),
        None => {
            warn!("Role not found: {}", role_name);
            vec![]
        }
    }
}

/// Check if a granted permission satisfies a required permission
pub fn check_permission(user_permission: &str, required_permission: &str) -> bool {
    // Direct match
    if user_permission == required_permission {
        return true;
    }

    // Wildcard match, e.g. "packages:*" grants "packages:status"
    if user_permission.ends_with(":*") {
        let prefix = user_permission.trim_end_matches('*');
        if required_permission.starts_with(prefix) {
            return true;
        }
    }

    // Super wildcard (admin)
    if user_permission == "*" {
        return true;
    }

    false
}

/// Check whether any granted permission satisfies the requirement
pub fn grants(user_permissions: &[String], required_permission: &str) -> bool {
    user_permissions
        .iter()
        .any(|p| check_permission(p, required_permission))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_gets_everything() {
        let perms = permissions_for_role("admin");
        assert!(grants(&perms, consts::USERS_MANAGE));
        assert!(grants(&perms, consts::PACKAGES_DELETE));
        assert!(grants(&perms, "anything:at-all"));
    }

    #[test]
    fn staff_runs_operations_but_not_accounts() {
        let perms = permissions_for_role("staff");
        assert!(grants(&perms, consts::PACKAGES_STATUS));
        assert!(grants(&perms, consts::SHIPMENTS_DISPATCH));
        assert!(grants(&perms, consts::MANIFESTS_IMPORT));
        assert!(grants(&perms, consts::VEHICLES_READ));
        assert!(!grants(&perms, consts::VEHICLES_MANAGE));
        assert!(!grants(&perms, consts::USERS_MANAGE));
        assert!(!grants(&perms, consts::WAREHOUSES_MANAGE));
    }

    #[test]
    fn driver_can_complete_but_not_dispatch() {
        let perms = permissions_for_role("driver");
        assert!(grants(&perms, consts::SHIPMENTS_COMPLETE));
        assert!(grants(&perms, consts::SHIPMENTS_READ));
        assert!(!grants(&perms, consts::SHIPMENTS_DISPATCH));
        assert!(!grants(&perms, consts::PACKAGES_STATUS));
    }

    #[test]
    fn unknown_role_has_no_permissions() {
        assert!(permissions_for_role("auditor").is_empty());
    }

    #[test]
    fn wildcard_does_not_leak_across_resources() {
        assert!(check_permission("packages:*", "packages:read"));
        assert!(!check_permission("packages:*", "shipments:read"));
    }
}
