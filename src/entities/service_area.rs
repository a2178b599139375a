use async_trait::async_trait;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Gazetteer row: one province/city/barangay triple the company serves.
/// Receiver addresses on manifests and packages must resolve here.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "service_areas")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub province: String,
    pub city: String,
    pub barangay: String,
    /// Normalized `province|city|barangay` key, unique, used for
    /// case-insensitive lookups.
    pub slug: String,
    pub is_active: bool,

    pub created_at: DateTimeUtc,
}

/// Builds the normalized lookup key for an address triple: lowercased,
/// trimmed, inner whitespace collapsed.
pub fn area_slug(province: &str, city: &str, barangay: &str) -> String {
    fn norm(part: &str) -> String {
        part.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
    format!("{}|{}|{}", norm(province), norm(city), norm(barangay))
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if insert {
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::area_slug;

    #[test]
    fn slug_normalizes_case_and_whitespace() {
        assert_eq!(
            area_slug("Cebu", "Cebu City", "Lahug"),
            "cebu|cebu city|lahug"
        );
        assert_eq!(
            area_slug("  CEBU ", "cebu   city", " LAHUG"),
            "cebu|cebu city|lahug"
        );
    }
}
