use crate::{
    db::DbPool,
    entities::shipment,
    entities::vehicle::{self, VehicleType},
    errors::ServiceError,
    events::{Event, EventSender},
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateVehicleRequest {
    pub plate_number: String,
    pub name: Option<String>,
    pub vehicle_type: VehicleType,
    pub weight_capacity_kg: Decimal,
    #[serde(default)]
    pub is_express: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateVehicleRequest {
    pub plate_number: Option<String>,
    pub name: Option<String>,
    pub vehicle_type: Option<VehicleType>,
    pub weight_capacity_kg: Option<Decimal>,
    pub is_express: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VehicleFilter {
    pub vehicle_type: Option<VehicleType>,
    pub archived: Option<bool>,
    /// True returns only vehicles assignable right now.
    pub assignable: Option<bool>,
}

/// Service for the delivery fleet.
#[derive(Clone)]
pub struct VehicleService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl VehicleService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            db_pool,
            event_sender,
            logger,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: VehicleFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<vehicle::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = vehicle::Entity::find();
        if let Some(vehicle_type) = filter.vehicle_type {
            query = query.filter(vehicle::Column::VehicleType.eq(vehicle_type));
        }
        if let Some(archived) = filter.archived {
            query = query.filter(vehicle::Column::IsArchived.eq(archived));
        }
        if filter.assignable == Some(true) {
            query = query
                .filter(vehicle::Column::IsArchived.eq(false))
                .filter(vehicle::Column::InMaintenance.eq(false));
        }

        let paginator = query
            .order_by_asc(vehicle::Column::PlateNumber)
            .paginate(db, per_page);
        let total = paginator.num_items().await?;
        let vehicles = paginator.fetch_page(page.max(1) - 1).await?;
        Ok((vehicles, total))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, vehicle_id: Uuid) -> Result<vehicle::Model, ServiceError> {
        vehicle::Entity::find_by_id(vehicle_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Vehicle {} not found", vehicle_id)))
    }

    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        request: CreateVehicleRequest,
    ) -> Result<vehicle::Model, ServiceError> {
        let db = self.db_pool.as_ref();

        let plate = normalize_plate(&request.plate_number)?;
        ensure_capacity_in_range(request.vehicle_type, request.weight_capacity_kg)?;
        ensure_plate_free(db, &plate, None).await?;

        let vehicle = vehicle::ActiveModel {
            plate_number: Set(plate),
            name: Set(request.name),
            vehicle_type: Set(request.vehicle_type),
            weight_capacity_kg: Set(request.weight_capacity_kg),
            is_express: Set(request.is_express),
            in_maintenance: Set(false),
            notes: Set(request.notes),
            is_archived: Set(false),
            ..Default::default()
        }
        .insert(db)
        .await?;

        slog::info!(self.logger, "vehicle registered";
            "vehicle_id" => %vehicle.id,
            "plate" => &vehicle.plate_number,
        );
        Ok(vehicle)
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        vehicle_id: Uuid,
        request: UpdateVehicleRequest,
    ) -> Result<vehicle::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let existing = self.get(vehicle_id).await?;
        if existing.is_archived {
            return Err(ServiceError::InvalidOperation(
                "archived vehicles cannot be edited".to_string(),
            ));
        }

        // The capacity range is checked against whichever type the
        // vehicle will have after this update.
        let next_type = request.vehicle_type.unwrap_or(existing.vehicle_type);
        let next_capacity = request
            .weight_capacity_kg
            .unwrap_or(existing.weight_capacity_kg);
        ensure_capacity_in_range(next_type, next_capacity)?;

        let mut active: vehicle::ActiveModel = existing.into();
        if let Some(plate_number) = request.plate_number {
            let plate = normalize_plate(&plate_number)?;
            ensure_plate_free(db, &plate, Some(vehicle_id)).await?;
            active.plate_number = Set(plate);
        }
        if let Some(name) = request.name {
            active.name = Set(Some(name));
        }
        if let Some(vehicle_type) = request.vehicle_type {
            active.vehicle_type = Set(vehicle_type);
        }
        if let Some(weight_capacity_kg) = request.weight_capacity_kg {
            active.weight_capacity_kg = Set(weight_capacity_kg);
        }
        if let Some(is_express) = request.is_express {
            active.is_express = Set(is_express);
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }

        Ok(active.update(db).await?)
    }

    /// Flags the vehicle in or out of the shop. Vehicles in maintenance
    /// stay on their current shipments but cannot join new ones.
    #[instrument(skip(self))]
    pub async fn set_maintenance(
        &self,
        vehicle_id: Uuid,
        in_maintenance: bool,
    ) -> Result<vehicle::Model, ServiceError> {
        let existing = self.get(vehicle_id).await?;
        if existing.in_maintenance == in_maintenance {
            return Ok(existing);
        }

        let mut active: vehicle::ActiveModel = existing.into();
        active.in_maintenance = Set(in_maintenance);
        let updated = active.update(self.db_pool.as_ref()).await?;

        slog::info!(self.logger, "vehicle maintenance flag changed";
            "vehicle_id" => %updated.id,
            "plate" => &updated.plate_number,
            "in_maintenance" => in_maintenance,
        );
        if let Err(e) = self
            .event_sender
            .send(Event::VehicleMaintenanceChanged {
                vehicle_id,
                in_maintenance,
            })
            .await
        {
            warn!("failed to publish VehicleMaintenanceChanged: {}", e);
        }
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn set_archived(
        &self,
        vehicle_id: Uuid,
        archived: bool,
    ) -> Result<vehicle::Model, ServiceError> {
        let existing = self.get(vehicle_id).await?;
        if existing.is_archived == archived {
            return Ok(existing);
        }

        let mut active: vehicle::ActiveModel = existing.into();
        active.is_archived = Set(archived);
        Ok(active.update(self.db_pool.as_ref()).await?)
    }

    /// Hard delete, only for vehicles that never carried a shipment.
    #[instrument(skip(self))]
    pub async fn delete(&self, vehicle_id: Uuid) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let existing = self.get(vehicle_id).await?;

        let assignments = shipment::Entity::find()
            .filter(shipment::Column::VehicleId.eq(vehicle_id))
            .count(db)
            .await?;
        if assignments > 0 {
            return Err(ServiceError::Conflict(
                "vehicle has shipment history and can only be archived".to_string(),
            ));
        }

        vehicle::Entity::delete_by_id(existing.id).exec(db).await?;
        slog::info!(self.logger, "vehicle deleted"; "vehicle_id" => %vehicle_id);
        Ok(())
    }
}

fn normalize_plate(raw: &str) -> Result<String, ServiceError> {
    let plate = raw.trim().to_uppercase();
    if plate.is_empty() {
        return Err(ServiceError::InvalidInput(
            "plate number is required".to_string(),
        ));
    }
    Ok(plate)
}

fn ensure_capacity_in_range(
    vehicle_type: VehicleType,
    capacity: Decimal,
) -> Result<(), ServiceError> {
    if !vehicle_type.capacity_in_range(capacity) {
        let (min, max) = vehicle_type.capacity_range();
        return Err(ServiceError::ValidationError(format!(
            "weight capacity for a {} must be between {} and {} kg",
            vehicle_type, min, max
        )));
    }
    Ok(())
}

async fn ensure_plate_free(
    db: &DbPool,
    plate: &str,
    exclude: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut query = vehicle::Entity::find().filter(vehicle::Column::PlateNumber.eq(plate));
    if let Some(id) = exclude {
        query = query.filter(vehicle::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(ServiceError::Conflict(format!(
            "vehicle with plate {} already exists",
            plate
        )));
    }
    Ok(())
}
