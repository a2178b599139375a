use crate::{
    db::DbPool,
    entities::service_area::{self, area_slug},
    errors::ServiceError,
    manifest::FieldError,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpsertServiceAreaRequest {
    #[validate(length(min = 1, message = "province is required"))]
    pub province: String,
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "barangay is required"))]
    pub barangay: String,
    /// Defaults to true; false keeps the row but stops serving it.
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddressTriple {
    pub province: String,
    pub city: String,
    pub barangay: String,
}

/// One element of a batch validation response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddressCheck {
    #[serde(flatten)]
    pub address: AddressTriple,
    pub valid: bool,
    /// Which level failed, when invalid.
    pub error: Option<FieldError>,
}

/// In-memory snapshot of the active gazetteer, keyed at the three
/// cascade levels so a lookup can say which level broke.
#[derive(Debug, Default)]
pub struct AreaLookup {
    provinces: HashSet<String>,
    cities: HashSet<String>,
    areas: HashSet<String>,
}

impl AreaLookup {
    pub async fn load<C: ConnectionTrait>(conn: &C) -> Result<Self, ServiceError> {
        let slugs: Vec<String> = service_area::Entity::find()
            .filter(service_area::Column::IsActive.eq(true))
            .select_only()
            .column(service_area::Column::Slug)
            .into_tuple::<String>()
            .all(conn)
            .await?;

        let mut lookup = AreaLookup::default();
        for slug in slugs {
            let mut parts = slug.splitn(3, '|');
            if let (Some(province), Some(city), Some(_)) =
                (parts.next(), parts.next(), parts.next())
            {
                lookup.provinces.insert(province.to_string());
                lookup.cities.insert(format!("{}|{}", province, city));
                lookup.areas.insert(slug.clone());
            }
        }
        Ok(lookup)
    }

    /// None when the triple is served; otherwise a field error naming
    /// the shallowest unknown level.
    pub fn check(&self, province: &str, city: &str, barangay: &str) -> Option<FieldError> {
        let slug = area_slug(province, city, barangay);
        if self.areas.contains(&slug) {
            return None;
        }

        let mut parts = slug.splitn(3, '|');
        let province_key = parts.next().unwrap_or_default().to_string();
        let city_key = format!("{}|{}", province_key, parts.next().unwrap_or_default());

        if !self.provinces.contains(&province_key) {
            Some(FieldError::new(
                "Receiver Province",
                format!("province '{}' is outside our service areas", province.trim()),
            ))
        } else if !self.cities.contains(&city_key) {
            Some(FieldError::new(
                "Receiver City",
                format!("city '{}' is not served in this province", city.trim()),
            ))
        } else {
            Some(FieldError::new(
                "Receiver Barangay",
                format!("barangay '{}' is not served in this city", barangay.trim()),
            ))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

/// Service for the province/city/barangay gazetteer backing address
/// validation.
#[derive(Clone)]
pub struct ServiceAreaService {
    db_pool: Arc<DbPool>,
    logger: Logger,
}

impl ServiceAreaService {
    pub fn new(db_pool: Arc<DbPool>, logger: Logger) -> Self {
        Self { db_pool, logger }
    }

    /// Distinct provinces with at least one active area.
    #[instrument(skip(self))]
    pub async fn provinces(&self) -> Result<Vec<String>, ServiceError> {
        let provinces = service_area::Entity::find()
            .filter(service_area::Column::IsActive.eq(true))
            .select_only()
            .column(service_area::Column::Province)
            .distinct()
            .order_by_asc(service_area::Column::Province)
            .into_tuple::<String>()
            .all(self.db_pool.as_ref())
            .await?;
        Ok(provinces)
    }

    /// Distinct cities under one province, matched case-insensitively.
    #[instrument(skip(self))]
    pub async fn cities(&self, province: &str) -> Result<Vec<String>, ServiceError> {
        let prefix = slug_prefix(&[province]);
        let cities = service_area::Entity::find()
            .filter(service_area::Column::IsActive.eq(true))
            .filter(service_area::Column::Slug.starts_with(&prefix))
            .select_only()
            .column(service_area::Column::City)
            .distinct()
            .order_by_asc(service_area::Column::City)
            .into_tuple::<String>()
            .all(self.db_pool.as_ref())
            .await?;
        Ok(cities)
    }

    #[instrument(skip(self))]
    pub async fn barangays(
        &self,
        province: &str,
        city: &str,
    ) -> Result<Vec<String>, ServiceError> {
        let prefix = slug_prefix(&[province, city]);
        let barangays = service_area::Entity::find()
            .filter(service_area::Column::IsActive.eq(true))
            .filter(service_area::Column::Slug.starts_with(&prefix))
            .select_only()
            .column(service_area::Column::Barangay)
            .distinct()
            .order_by_asc(service_area::Column::Barangay)
            .into_tuple::<String>()
            .all(self.db_pool.as_ref())
            .await?;
        Ok(barangays)
    }

    /// Checks a batch of address triples in one pass, for the intake
    /// form and for re-checking manifest files client-side.
    #[instrument(skip(self, addresses))]
    pub async fn validate(
        &self,
        addresses: Vec<AddressTriple>,
    ) -> Result<Vec<AddressCheck>, ServiceError> {
        let lookup = AreaLookup::load(self.db_pool.as_ref()).await?;
        Ok(addresses
            .into_iter()
            .map(|address| {
                let error = lookup.check(&address.province, &address.city, &address.barangay);
                AddressCheck {
                    valid: error.is_none(),
                    error,
                    address,
                }
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        province: Option<String>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<service_area::Model>, u64), ServiceError> {
        let mut query = service_area::Entity::find();
        if let Some(province) = province.filter(|p| !p.trim().is_empty()) {
            let prefix = slug_prefix(&[province.as_str()]);
            query = query.filter(service_area::Column::Slug.starts_with(&prefix));
        }

        let paginator = query
            .order_by_asc(service_area::Column::Slug)
            .paginate(self.db_pool.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let areas = paginator.fetch_page(page.max(1) - 1).await?;
        Ok((areas, total))
    }

    /// Inserts or revives an area. Matching is by normalized slug, so
    /// re-submitting a triple with different casing updates the stored
    /// display form instead of duplicating the row.
    #[instrument(skip(self, request))]
    pub async fn upsert(
        &self,
        request: UpsertServiceAreaRequest,
    ) -> Result<service_area::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;
        let db = self.db_pool.as_ref();

        let slug = area_slug(&request.province, &request.city, &request.barangay);
        let is_active = request.is_active.unwrap_or(true);
        let existing = service_area::Entity::find()
            .filter(service_area::Column::Slug.eq(&slug))
            .one(db)
            .await?;

        let area = match existing {
            Some(existing) => {
                let mut active: service_area::ActiveModel = existing.into();
                active.province = Set(request.province.trim().to_string());
                active.city = Set(request.city.trim().to_string());
                active.barangay = Set(request.barangay.trim().to_string());
                active.is_active = Set(is_active);
                active.update(db).await?
            }
            None => {
                service_area::ActiveModel {
                    province: Set(request.province.trim().to_string()),
                    city: Set(request.city.trim().to_string()),
                    barangay: Set(request.barangay.trim().to_string()),
                    slug: Set(slug),
                    is_active: Set(is_active),
                    ..Default::default()
                }
                .insert(db)
                .await?
            }
        };

        slog::info!(self.logger, "service area upserted";
            "slug" => &area.slug,
            "active" => area.is_active,
        );
        Ok(area)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, area_id: Uuid) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        service_area::Entity::find_by_id(area_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Service area {} not found", area_id)))?;
        service_area::Entity::delete_by_id(area_id).exec(db).await?;
        Ok(())
    }
}

/// Normalized slug prefix for cascade queries, e.g. `["Cebu"]` gives
/// `"cebu|"`.
fn slug_prefix(parts: &[&str]) -> String {
    let mut prefix = parts
        .iter()
        .map(|part| {
            part.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase()
        })
        .collect::<Vec<_>>()
        .join("|");
    prefix.push('|');
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_with(rows: &[(&str, &str, &str)]) -> AreaLookup {
        let mut lookup = AreaLookup::default();
        for (province, city, barangay) in rows {
            let slug = area_slug(province, city, barangay);
            let mut parts = slug.splitn(3, '|');
            let p = parts.next().unwrap().to_string();
            let c = format!("{}|{}", p, parts.next().unwrap());
            lookup.provinces.insert(p);
            lookup.cities.insert(c);
            lookup.areas.insert(slug);
        }
        lookup
    }

    #[test]
    fn served_triples_pass() {
        let lookup = lookup_with(&[("Cebu", "Cebu City", "Lahug")]);
        assert!(lookup.check("Cebu", "Cebu City", "Lahug").is_none());
        assert!(lookup.check("  cebu ", "CEBU  CITY", "lahug").is_none());
    }

    #[test]
    fn unknown_level_is_named_in_the_error() {
        let lookup = lookup_with(&[("Cebu", "Cebu City", "Lahug")]);

        let err = lookup.check("Bohol", "Tagbilaran", "Poblacion").unwrap();
        assert_eq!(err.field, "Receiver Province");

        let err = lookup.check("Cebu", "Mandaue", "Centro").unwrap();
        assert_eq!(err.field, "Receiver City");

        let err = lookup.check("Cebu", "Cebu City", "Talamban").unwrap();
        assert_eq!(err.field, "Receiver Barangay");
    }

    #[test]
    fn slug_prefixes_normalize_like_slugs() {
        assert_eq!(slug_prefix(&["Cebu"]), "cebu|");
        assert_eq!(slug_prefix(&[" CEBU ", "Cebu   City"]), "cebu|cebu city|");
    }
}
