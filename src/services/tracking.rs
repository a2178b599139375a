use crate::{
    db::DbPool,
    entities::package::{self, PackageStatus, ShippingMode, ShippingType},
    entities::package_status_log,
    errors::ServiceError,
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

/// One public history entry. Carries no actor information; audit
/// identities stay inside the portal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackingEvent {
    pub status: PackageStatus,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

/// Public view of one package, as returned by the unauthenticated
/// tracking endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackingInfo {
    pub tracking_number: String,
    pub status: PackageStatus,
    pub shipping_mode: ShippingMode,
    pub shipping_type: ShippingType,
    pub pieces: i32,
    pub receiver_province: String,
    pub receiver_city: String,
    pub expected_delivery_date: Option<NaiveDate>,
    pub history: Vec<TrackingEvent>,
}

/// Read-only service behind the public tracking page.
#[derive(Clone)]
pub struct TrackingService {
    db_pool: Arc<DbPool>,
    logger: Logger,
}

impl TrackingService {
    pub fn new(db_pool: Arc<DbPool>, logger: Logger) -> Self {
        Self { db_pool, logger }
    }

    /// Looks a package up by tracking number, case-insensitively.
    /// Archived packages are invisible here.
    #[instrument(skip(self))]
    pub async fn track(&self, tracking_number: &str) -> Result<TrackingInfo, ServiceError> {
        let db = self.db_pool.as_ref();
        let needle = tracking_number.trim().to_uppercase();

        let package = package::Entity::find()
            .filter(package::Column::TrackingNumber.eq(&needle))
            .one(db)
            .await?
            .filter(|p| !p.is_archived)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No package with tracking number {}", needle))
            })?;

        let history = package_status_log::Entity::find()
            .filter(package_status_log::Column::PackageId.eq(package.id))
            .order_by_asc(package_status_log::Column::RecordedAt)
            .all(db)
            .await?
            .into_iter()
            .map(|log| TrackingEvent {
                status: log.status,
                description: log.description,
                recorded_at: log.recorded_at,
            })
            .collect();

        slog::debug!(self.logger, "tracking lookup"; "tracking_number" => &needle);
        Ok(TrackingInfo {
            tracking_number: package.tracking_number,
            status: package.status,
            shipping_mode: package.shipping_mode,
            shipping_type: package.shipping_type,
            pieces: package.pieces,
            receiver_province: package.receiver_province,
            receiver_city: package.receiver_city,
            expected_delivery_date: package.expected_delivery_date,
            history,
        })
    }
}
