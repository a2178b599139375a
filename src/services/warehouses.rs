use crate::{
    db::DbPool,
    entities::{package, warehouse},
    errors::ServiceError,
    services::{stored_totals, STORED_PACKAGE_STATUSES},
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateWarehouseRequest {
    #[validate(length(min = 1, max = 120, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "province is required"))]
    pub province: String,
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "barangay is required"))]
    pub barangay: String,
    #[validate(length(min = 1, message = "street is required"))]
    pub street: String,
    pub phone: Option<String>,
    pub weight_capacity_kg: Decimal,
    pub volume_capacity_m3: Decimal,
    /// Percent of capacity incoming acceptance may fill, 1-100.
    pub target_utilization_pct: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateWarehouseRequest {
    pub name: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub barangay: Option<String>,
    pub street: Option<String>,
    pub phone: Option<String>,
    pub weight_capacity_kg: Option<Decimal>,
    pub volume_capacity_m3: Option<Decimal>,
    pub target_utilization_pct: Option<i32>,
}

/// Current fill level of one warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WarehouseUtilization {
    pub warehouse_id: Uuid,
    pub name: String,
    pub stored_weight_kg: Decimal,
    pub stored_volume_m3: Decimal,
    pub weight_capacity_kg: Decimal,
    pub volume_capacity_m3: Decimal,
    /// Capacity scaled by the target utilization percent; what
    /// incoming acceptance actually checks against.
    pub effective_weight_limit_kg: Decimal,
    pub effective_volume_limit_m3: Decimal,
    pub target_utilization_pct: i32,
    pub stored_package_count: u64,
}

/// Service for warehouse facilities.
#[derive(Clone)]
pub struct WarehouseService {
    db_pool: Arc<DbPool>,
    logger: Logger,
}

impl WarehouseService {
    pub fn new(db_pool: Arc<DbPool>, logger: Logger) -> Self {
        Self { db_pool, logger }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        archived: Option<bool>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<warehouse::Model>, u64), ServiceError> {
        let mut query = warehouse::Entity::find();
        if let Some(archived) = archived {
            query = query.filter(warehouse::Column::IsArchived.eq(archived));
        }

        let paginator = query
            .order_by_asc(warehouse::Column::Name)
            .paginate(self.db_pool.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let warehouses = paginator.fetch_page(page.max(1) - 1).await?;
        Ok((warehouses, total))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, warehouse_id: Uuid) -> Result<warehouse::Model, ServiceError> {
        warehouse::Entity::find_by_id(warehouse_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Warehouse {} not found", warehouse_id)))
    }

    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        request: CreateWarehouseRequest,
    ) -> Result<warehouse::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;
        ensure_capacities(
            request.weight_capacity_kg,
            request.volume_capacity_m3,
            request.target_utilization_pct,
        )?;

        let db = self.db_pool.as_ref();
        ensure_name_free(db, &request.name, None).await?;

        let warehouse = warehouse::ActiveModel {
            name: Set(request.name),
            province: Set(request.province),
            city: Set(request.city),
            barangay: Set(request.barangay),
            street: Set(request.street),
            phone: Set(request.phone),
            weight_capacity_kg: Set(request.weight_capacity_kg),
            volume_capacity_m3: Set(request.volume_capacity_m3),
            target_utilization_pct: Set(request.target_utilization_pct),
            is_archived: Set(false),
            ..Default::default()
        }
        .insert(db)
        .await?;

        slog::info!(self.logger, "warehouse created";
            "warehouse_id" => %warehouse.id,
            "name" => &warehouse.name,
        );
        Ok(warehouse)
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        warehouse_id: Uuid,
        request: UpdateWarehouseRequest,
    ) -> Result<warehouse::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let existing = self.get(warehouse_id).await?;
        if existing.is_archived {
            return Err(ServiceError::InvalidOperation(
                "archived warehouses cannot be edited".to_string(),
            ));
        }

        ensure_capacities(
            request
                .weight_capacity_kg
                .unwrap_or(existing.weight_capacity_kg),
            request
                .volume_capacity_m3
                .unwrap_or(existing.volume_capacity_m3),
            request
                .target_utilization_pct
                .unwrap_or(existing.target_utilization_pct),
        )?;

        let mut active: warehouse::ActiveModel = existing.into();
        if let Some(name) = request.name {
            ensure_name_free(db, &name, Some(warehouse_id)).await?;
            active.name = Set(name);
        }
        if let Some(province) = request.province {
            active.province = Set(province);
        }
        if let Some(city) = request.city {
            active.city = Set(city);
        }
        if let Some(barangay) = request.barangay {
            active.barangay = Set(barangay);
        }
        if let Some(street) = request.street {
            active.street = Set(street);
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(weight_capacity_kg) = request.weight_capacity_kg {
            active.weight_capacity_kg = Set(weight_capacity_kg);
        }
        if let Some(volume_capacity_m3) = request.volume_capacity_m3 {
            active.volume_capacity_m3 = Set(volume_capacity_m3);
        }
        if let Some(target_utilization_pct) = request.target_utilization_pct {
            active.target_utilization_pct = Set(target_utilization_pct);
        }

        Ok(active.update(db).await?)
    }

    /// Archiving is refused while packages are still stored in the
    /// building; unarchiving is always allowed.
    #[instrument(skip(self))]
    pub async fn set_archived(
        &self,
        warehouse_id: Uuid,
        archived: bool,
    ) -> Result<warehouse::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let existing = self.get(warehouse_id).await?;
        if existing.is_archived == archived {
            return Ok(existing);
        }

        if archived {
            let stored = stored_package_count(db, warehouse_id).await?;
            if stored > 0 {
                return Err(ServiceError::Conflict(format!(
                    "warehouse still stores {} package(s) and cannot be archived",
                    stored
                )));
            }
        }

        let mut active: warehouse::ActiveModel = existing.into();
        active.is_archived = Set(archived);
        let updated = active.update(db).await?;

        slog::info!(self.logger, "warehouse archive flag changed";
            "warehouse_id" => %updated.id,
            "archived" => archived,
        );
        Ok(updated)
    }

    /// Stored load versus capacity, as shown on the facilities screen.
    #[instrument(skip(self))]
    pub async fn utilization(
        &self,
        warehouse_id: Uuid,
    ) -> Result<WarehouseUtilization, ServiceError> {
        let db = self.db_pool.as_ref();
        let warehouse = self.get(warehouse_id).await?;

        let (stored_weight, stored_volume) = stored_totals(db, warehouse_id).await?;
        let stored_package_count = stored_package_count(db, warehouse_id).await?;
        let (effective_weight, effective_volume) = warehouse.effective_limits();

        Ok(WarehouseUtilization {
            warehouse_id: warehouse.id,
            name: warehouse.name,
            stored_weight_kg: stored_weight,
            stored_volume_m3: stored_volume,
            weight_capacity_kg: warehouse.weight_capacity_kg,
            volume_capacity_m3: warehouse.volume_capacity_m3,
            effective_weight_limit_kg: effective_weight,
            effective_volume_limit_m3: effective_volume,
            target_utilization_pct: warehouse.target_utilization_pct,
            stored_package_count,
        })
    }
}

async fn stored_package_count(db: &DbPool, warehouse_id: Uuid) -> Result<u64, ServiceError> {
    let count = package::Entity::find()
        .filter(package::Column::WarehouseId.eq(warehouse_id))
        .filter(package::Column::Status.is_in(STORED_PACKAGE_STATUSES))
        .filter(package::Column::IsArchived.eq(false))
        .count(db)
        .await?;
    Ok(count)
}

fn ensure_capacities(
    weight_capacity_kg: Decimal,
    volume_capacity_m3: Decimal,
    target_utilization_pct: i32,
) -> Result<(), ServiceError> {
    if weight_capacity_kg <= Decimal::ZERO || volume_capacity_m3 <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "warehouse capacities must be positive".to_string(),
        ));
    }
    if !(1..=100).contains(&target_utilization_pct) {
        return Err(ServiceError::ValidationError(
            "target utilization must be between 1 and 100 percent".to_string(),
        ));
    }
    Ok(())
}

async fn ensure_name_free(
    db: &DbPool,
    name: &str,
    exclude: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut query = warehouse::Entity::find().filter(warehouse::Column::Name.eq(name));
    if let Some(id) = exclude {
        query = query.filter(warehouse::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(ServiceError::Conflict(format!(
            "warehouse named {} already exists",
            name
        )));
    }
    Ok(())
}
