use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

/// Pagination parameters for list operations
#[derive(Debug, Deserialize, Serialize, IntoParams)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationParams {
    /// Page clamped to 1-based, per_page to a sane window.
    pub fn clamped(&self) -> (u64, u64) {
        (self.page.max(1), self.per_page.clamp(1, 100))
    }
}

/// Parses a SCREAMING_SNAKE query or form value into one of the
/// status/kind enums, with a readable error naming the parameter.
pub fn parse_enum_param<T>(value: &str, what: &str) -> Result<T, ServiceError>
where
    T: std::str::FromStr,
{
    value
        .trim()
        .to_uppercase()
        .parse::<T>()
        .map_err(|_| ServiceError::InvalidInput(format!("invalid {}: '{}'", what, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::package::PackageStatus;

    #[test]
    fn pagination_clamps_out_of_range_values() {
        let params = PaginationParams {
            page: 0,
            per_page: 5000,
        };
        assert_eq!(params.clamped(), (1, 100));

        let params = PaginationParams::default();
        assert_eq!(params.clamped(), (1, 20));
    }

    #[test]
    fn enum_params_parse_case_insensitively() {
        let status: PackageStatus = parse_enum_param("sorting", "status").unwrap();
        assert_eq!(status, PackageStatus::Sorting);

        let status: PackageStatus = parse_enum_param(" In_Warehouse ", "status").unwrap();
        assert_eq!(status, PackageStatus::InWarehouse);

        let err = parse_enum_param::<PackageStatus>("TELEPORTING", "status").unwrap_err();
        assert!(err.to_string().contains("invalid status"));
    }
}
