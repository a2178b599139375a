use crate::{
    db::DbPool,
    entities::package::{self, PackageStatus, ShippingType},
    entities::shipment::{self, ShipmentKind, ShipmentStatus},
    entities::{shipment_package, shipment_status_log, warehouse},
    errors::ServiceError,
    events::{Event, EventSender},
    services::deliveries::{
        auto_select_from, ensure_active_driver, get_shipment_of_kind, list_shipments_of_kind,
        load_assignable_vehicle, load_manual_selection, packages_on_shipment, PackageSelection,
        ShipmentFilter,
    },
    services::{busy_package_ids, member_package_ids, new_reference},
    workflow,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateTransferRequest {
    pub origin_warehouse_id: Uuid,
    pub destination_warehouse_id: Uuid,
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub scheduled_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub selection: PackageSelection,
}

/// Service for moving packages between our own warehouses.
///
/// Unlike a delivery, staging a transfer moves the packages to
/// TRANSFERRING_WAREHOUSE immediately, so the sorting screen stops
/// offering them the moment the run is scheduled.
#[derive(Clone)]
pub struct WarehouseTransferService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl WarehouseTransferService {
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
        filter: ShipmentFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<shipment::Model>, u64), ServiceError> {
        list_shipments_of_kind(
            self.db_pool.as_ref(),
            ShipmentKind::WarehouseTransfer,
            filter,
            page,
            per_page,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, shipment_id: Uuid) -> Result<shipment::Model, ServiceError> {
        get_shipment_of_kind(
            self.db_pool.as_ref(),
            ShipmentKind::WarehouseTransfer,
            shipment_id,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn packages_on(&self, shipment_id: Uuid) -> Result<Vec<package::Model>, ServiceError> {
        self.get(shipment_id).await?;
        packages_on_shipment(self.db_pool.as_ref(), shipment_id).await
    }

    /// Schedules a transfer and stages its packages in one transaction:
    /// shipment row, PREPARING log, join rows, and every package moved
    /// SORTING -> TRANSFERRING_WAREHOUSE with its own log entry.
    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        request: CreateTransferRequest,
        actor_id: Uuid,
    ) -> Result<(shipment::Model, Vec<package::Model>), ServiceError> {
        let db = self.db_pool.as_ref();

        if request.origin_warehouse_id == request.destination_warehouse_id {
            return Err(ServiceError::InvalidInput(
                "origin and destination warehouse must differ".to_string(),
            ));
        }

        let origin = load_open_warehouse(db, request.origin_warehouse_id).await?;
        let destination = load_open_warehouse(db, request.destination_warehouse_id).await?;

        let vehicle = load_assignable_vehicle(db, request.vehicle_id).await?;
        ensure_active_driver(db, request.driver_id).await?;

        let selected = match request.selection {
            PackageSelection::Manual { ref package_ids } => {
                let packages = load_manual_selection(
                    db,
                    package_ids,
                    request.origin_warehouse_id,
                    &vehicle,
                )
                .await?;
                let total: rust_decimal::Decimal =
                    packages.iter().map(|p| p.weight_kg).sum();
                if total > vehicle.weight_capacity_kg {
                    return Err(ServiceError::CapacityExceeded(format!(
                        "selected packages weigh {} kg, over the vehicle limit of {} kg",
                        total, vehicle.weight_capacity_kg
                    )));
                }
                packages
            }
            PackageSelection::Auto => {
                let pool =
                    transfer_pool(db, request.origin_warehouse_id, vehicle.is_express).await?;
                auto_select_from(pool, vehicle.weight_capacity_kg)?
            }
        };

        let reference = new_reference(ShipmentKind::WarehouseTransfer);
        let destination_name = destination.name.clone();
        let (shipment, staged) = self
            .db_pool
            .transaction::<_, (shipment::Model, Vec<package::Model>), ServiceError>(|txn| {
                Box::pin(async move {
                    let shipment = shipment::ActiveModel {
                        reference: Set(reference),
                        kind: Set(ShipmentKind::WarehouseTransfer),
                        status: Set(ShipmentStatus::Preparing),
                        origin_warehouse_id: Set(Some(request.origin_warehouse_id)),
                        destination_warehouse_id: Set(Some(request.destination_warehouse_id)),
                        origin_label: Set(None),
                        driver_id: Set(Some(request.driver_id)),
                        vehicle_id: Set(Some(request.vehicle_id)),
                        manifest_id: Set(None),
                        scheduled_date: Set(request.scheduled_date),
                        departed_at: Set(None),
                        completed_at: Set(None),
                        notes: Set(request.notes),
                        is_archived: Set(false),
                        created_by: Set(Some(actor_id)),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    shipment_status_log::ActiveModel {
                        shipment_id: Set(shipment.id),
                        status: Set(ShipmentStatus::Preparing),
                        description: Set(format!("Transfer to {} scheduled", destination_name)),
                        actor_id: Set(actor_id),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    let mut staged = Vec::with_capacity(selected.len());
                    for package in selected {
                        shipment_package::ActiveModel {
                            shipment_id: Set(shipment.id),
                            package_id: Set(package.id),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;

                        let package = workflow::set_package_status(
                            txn,
                            package,
                            PackageStatus::TransferringWarehouse,
                            format!("Staged for transfer to {}", destination_name),
                            actor_id,
                        )
                        .await?;
                        staged.push(package);
                    }

                    Ok((shipment, staged))
                })
            })
            .await?;

        slog::info!(self.logger, "warehouse transfer scheduled";
            "shipment_id" => %shipment.id,
            "reference" => &shipment.reference,
            "origin" => &origin.name,
            "destination" => &destination.name,
            "packages" => staged.len(),
        );
        if let Err(e) = self
            .event_sender
            .send(Event::ShipmentCreated {
                shipment_id: shipment.id,
                kind: ShipmentKind::WarehouseTransfer.to_string(),
            })
            .await
        {
            warn!("failed to publish ShipmentCreated: {}", e);
        }

        Ok((shipment, staged))
    }

    /// Puts the transfer on the road: shipment to IN_TRANSIT, packages
    /// to SHIPPING.
    #[instrument(skip(self))]
    pub async fn dispatch(
        &self,
        shipment_id: Uuid,
        actor_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let existing = self.get(shipment_id).await?;
        let old_status = existing.status;
        let destination_name = self.destination_name(&existing).await?;

        let updated = self
            .db_pool
            .transaction::<_, shipment::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let updated = workflow::set_shipment_status(
                        txn,
                        existing,
                        ShipmentStatus::InTransit,
                        "Transfer dispatched",
                        actor_id,
                    )
                    .await?;

                    let mut active: shipment::ActiveModel = updated.into();
                    active.departed_at = Set(Some(Utc::now()));
                    let updated = active.update(txn).await?;

                    for package_id in member_package_ids(txn, shipment_id).await? {
                        workflow::transition_package_by_id(
                            txn,
                            package_id,
                            PackageStatus::Shipping,
                            format!("In transit to {}", destination_name),
                            actor_id,
                        )
                        .await?;
                    }

                    Ok(updated)
                })
            })
            .await?;

        self.publish_status_change(shipment_id, old_status, updated.status)
            .await;
        Ok(updated)
    }

    /// Records arrival at the destination gate. Packages stay SHIPPING
    /// until the receiving crew confirms them in.
    #[instrument(skip(self))]
    pub async fn mark_arrived(
        &self,
        shipment_id: Uuid,
        actor_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let existing = self.get(shipment_id).await?;
        let old_status = existing.status;
        let destination_name = self.destination_name(&existing).await?;

        let updated = self
            .db_pool
            .transaction::<_, shipment::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    workflow::set_shipment_status(
                        txn,
                        existing,
                        ShipmentStatus::Arrived,
                        format!("Arrived at {}", destination_name),
                        actor_id,
                    )
                    .await
                })
            })
            .await?;

        self.publish_status_change(shipment_id, old_status, updated.status)
            .await;
        Ok(updated)
    }

    /// Receives the transfer into the destination warehouse: shipment
    /// to COMPLETED, packages to IN_WAREHOUSE with their stored
    /// location switched to the destination.
    #[instrument(skip(self))]
    pub async fn complete(
        &self,
        shipment_id: Uuid,
        actor_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let existing = self.get(shipment_id).await?;
        let old_status = existing.status;
        let destination_id = existing.destination_warehouse_id.ok_or_else(|| {
            ServiceError::InvalidOperation("transfer has no destination warehouse".to_string())
        })?;
        let destination_name = self.destination_name(&existing).await?;

        let updated = self
            .db_pool
            .transaction::<_, shipment::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let updated = workflow::set_shipment_status(
                        txn,
                        existing,
                        ShipmentStatus::Completed,
                        format!("Received at {}", destination_name),
                        actor_id,
                    )
                    .await?;

                    let mut active: shipment::ActiveModel = updated.into();
                    active.completed_at = Set(Some(Utc::now()));
                    let updated = active.update(txn).await?;

                    for package_id in member_package_ids(txn, shipment_id).await? {
                        let package = workflow::transition_package_by_id(
                            txn,
                            package_id,
                            PackageStatus::InWarehouse,
                            format!("Received at {}", destination_name),
                            actor_id,
                        )
                        .await?;

                        let mut active: package::ActiveModel = package.into();
                        active.warehouse_id = Set(Some(destination_id));
                        active.update(txn).await?;
                    }

                    Ok(updated)
                })
            })
            .await?;

        self.publish_status_change(shipment_id, old_status, updated.status)
            .await;
        Ok(updated)
    }

    /// Abandons a staged transfer, returning its packages to the
    /// sorting pool at the origin. Only PREPARING transfers cancel.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        shipment_id: Uuid,
        reason: Option<String>,
        actor_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let existing = self.get(shipment_id).await?;

        let description = match reason {
            Some(reason) => format!("Transfer cancelled: {}", reason),
            None => "Transfer cancelled".to_string(),
        };

        let updated = self
            .db_pool
            .transaction::<_, shipment::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let updated = workflow::set_shipment_status(
                        txn,
                        existing,
                        ShipmentStatus::Cancelled,
                        description,
                        actor_id,
                    )
                    .await?;

                    for package_id in member_package_ids(txn, shipment_id).await? {
                        workflow::transition_package_by_id(
                            txn,
                            package_id,
                            PackageStatus::Sorting,
                            "Transfer cancelled, returned to sorting",
                            actor_id,
                        )
                        .await?;
                    }

                    Ok(updated)
                })
            })
            .await?;

        if let Err(e) = self
            .event_sender
            .send(Event::ShipmentCancelled(shipment_id))
            .await
        {
            warn!("failed to publish ShipmentCancelled: {}", e);
        }
        Ok(updated)
    }

    async fn destination_name(&self, shipment: &shipment::Model) -> Result<String, ServiceError> {
        let destination_id = shipment.destination_warehouse_id.ok_or_else(|| {
            ServiceError::InvalidOperation("transfer has no destination warehouse".to_string())
        })?;
        let destination = warehouse::Entity::find_by_id(destination_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Warehouse {} not found", destination_id))
            })?;
        Ok(destination.name)
    }

    async fn publish_status_change(
        &self,
        shipment_id: Uuid,
        old_status: ShipmentStatus,
        new_status: ShipmentStatus,
    ) {
        if let Err(e) = self
            .event_sender
            .send(Event::ShipmentStatusChanged {
                shipment_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await
        {
            warn!("failed to publish ShipmentStatusChanged: {}", e);
        }
    }
}

async fn load_open_warehouse(
    db: &DbPool,
    warehouse_id: Uuid,
) -> Result<warehouse::Model, ServiceError> {
    let warehouse = warehouse::Entity::find_by_id(warehouse_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Warehouse {} not found", warehouse_id)))?;
    if warehouse.is_archived {
        return Err(ServiceError::InvalidOperation(format!(
            "warehouse {} is archived",
            warehouse.name
        )));
    }
    Ok(warehouse)
}

/// Transfer candidates load in tracking-number order; transfers have
/// no per-package delivery deadline to prioritize by.
async fn transfer_pool(
    db: &DbPool,
    origin_warehouse_id: Uuid,
    vehicle_is_express: bool,
) -> Result<Vec<package::Model>, ServiceError> {
    let busy = busy_package_ids(db).await?;

    let mut query = package::Entity::find()
        .filter(package::Column::Status.eq(PackageStatus::Sorting))
        .filter(package::Column::WarehouseId.eq(origin_warehouse_id))
        .filter(package::Column::IsArchived.eq(false))
        .filter(package::Column::Id.is_not_in(busy))
        .order_by_asc(package::Column::TrackingNumber);
    if !vehicle_is_express {
        query = query.filter(package::Column::ShippingType.eq(ShippingType::Standard));
    }

    Ok(query.all(db).await?)
}
