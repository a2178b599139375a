use crate::{
    db::DbPool,
    entities::package::{self, PackageStatus},
    entities::shipment::{self, ShipmentKind, ShipmentStatus},
    entities::{shipment_package, shipment_status_log, warehouse},
    errors::ServiceError,
    events::{Event, EventSender},
    services::deliveries::{get_shipment_of_kind, list_shipments_of_kind, packages_on_shipment, ShipmentFilter},
    services::{busy_package_ids, member_package_ids, new_reference, stored_totals},
    workflow,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateIncomingRequest {
    /// Free-text origin: an overseas agent or port, not one of our
    /// warehouses.
    #[validate(length(min = 1, max = 160, message = "origin label is required"))]
    pub origin_label: String,
    pub destination_warehouse_id: Uuid,
    pub scheduled_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Expected packages, registered at intake with status INCOMING.
    pub package_ids: Vec<Uuid>,
}

/// Service for inbound freight announced ahead of arrival.
///
/// Incoming shipments carry no vehicle or driver of ours and their
/// packages stay INCOMING through the whole journey; only acceptance
/// at the destination gate moves them to IN_WAREHOUSE, and only after
/// the warehouse capacity check passes.
#[derive(Clone)]
pub struct IncomingShipmentService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl IncomingShipmentService {
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
            ShipmentKind::Incoming,
            filter,
            page,
            per_page,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, shipment_id: Uuid) -> Result<shipment::Model, ServiceError> {
        get_shipment_of_kind(self.db_pool.as_ref(), ShipmentKind::Incoming, shipment_id).await
    }

    #[instrument(skip(self))]
    pub async fn packages_on(&self, shipment_id: Uuid) -> Result<Vec<package::Model>, ServiceError> {
        self.get(shipment_id).await?;
        packages_on_shipment(self.db_pool.as_ref(), shipment_id).await
    }

    /// Registers an expected inbound shipment over packages already
    /// announced at intake.
    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        request: CreateIncomingRequest,
        actor_id: Uuid,
    ) -> Result<(shipment::Model, Vec<package::Model>), ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;
        let db = self.db_pool.as_ref();

        let destination = warehouse::Entity::find_by_id(request.destination_warehouse_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Warehouse {} not found",
                    request.destination_warehouse_id
                ))
            })?;
        if destination.is_archived {
            return Err(ServiceError::InvalidOperation(format!(
                "warehouse {} is archived",
                destination.name
            )));
        }

        let packages = load_expected_packages(db, &request.package_ids).await?;

        let reference = new_reference(ShipmentKind::Incoming);
        let origin_label = request.origin_label.clone();
        let shipment = self
            .db_pool
            .transaction::<_, shipment::Model, ServiceError>(|txn| {
                let package_ids: Vec<Uuid> = packages.iter().map(|p| p.id).collect();
                Box::pin(async move {
                    let shipment = shipment::ActiveModel {
                        reference: Set(reference),
                        kind: Set(ShipmentKind::Incoming),
                        status: Set(ShipmentStatus::Preparing),
                        origin_warehouse_id: Set(None),
                        destination_warehouse_id: Set(Some(request.destination_warehouse_id)),
                        origin_label: Set(Some(request.origin_label)),
                        driver_id: Set(None),
                        vehicle_id: Set(None),
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
                        description: Set(format!(
                            "Incoming shipment registered from {}",
                            origin_label
                        )),
                        actor_id: Set(actor_id),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    for package_id in package_ids {
                        shipment_package::ActiveModel {
                            shipment_id: Set(shipment.id),
                            package_id: Set(package_id),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;
                    }

                    Ok(shipment)
                })
            })
            .await?;

        slog::info!(self.logger, "incoming shipment registered";
            "shipment_id" => %shipment.id,
            "reference" => &shipment.reference,
            "destination" => &destination.name,
            "packages" => packages.len(),
        );
        if let Err(e) = self
            .event_sender
            .send(Event::ShipmentCreated {
                shipment_id: shipment.id,
                kind: ShipmentKind::Incoming.to_string(),
            })
            .await
        {
            warn!("failed to publish ShipmentCreated: {}", e);
        }

        Ok((shipment, packages))
    }

    /// Marks the freight as having left its origin.
    #[instrument(skip(self))]
    pub async fn dispatch(
        &self,
        shipment_id: Uuid,
        actor_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let existing = self.get(shipment_id).await?;
        let old_status = existing.status;
        let description = match existing.origin_label.as_deref() {
            Some(origin) => format!("In transit from {}", origin),
            None => "In transit".to_string(),
        };

        let updated = self
            .db_pool
            .transaction::<_, shipment::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let updated = workflow::set_shipment_status(
                        txn,
                        existing,
                        ShipmentStatus::InTransit,
                        description,
                        actor_id,
                    )
                    .await?;

                    let mut active: shipment::ActiveModel = updated.into();
                    active.departed_at = Set(Some(Utc::now()));
                    Ok(active.update(txn).await?)
                })
            })
            .await?;

        self.publish_status_change(shipment_id, old_status, updated.status)
            .await;
        Ok(updated)
    }

    /// Records arrival at the destination gate. Packages stay INCOMING
    /// until the crew accepts them.
    #[instrument(skip(self))]
    pub async fn mark_arrived(
        &self,
        shipment_id: Uuid,
        actor_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let existing = self.get(shipment_id).await?;
        let old_status = existing.status;
        let destination = self.destination(&existing).await?;

        let updated = self
            .db_pool
            .transaction::<_, shipment::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    workflow::set_shipment_status(
                        txn,
                        existing,
                        ShipmentStatus::Arrived,
                        format!("Arrived at {}", destination.name),
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

    /// Accepts the freight into the destination warehouse. Refused
    /// outright when the load would push the facility past its
    /// target-utilization limits; otherwise completes the shipment and
    /// moves every package to IN_WAREHOUSE in one transaction.
    #[instrument(skip(self))]
    pub async fn accept(
        &self,
        shipment_id: Uuid,
        actor_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let existing = self.get(shipment_id).await?;
        let old_status = existing.status;
        let destination = self.destination(&existing).await?;

        let members = packages_on_shipment(db, shipment_id).await?;
        let incoming_weight: Decimal = members.iter().map(|p| p.weight_kg).sum();
        let incoming_volume: Decimal = members.iter().map(|p| p.volume_m3).sum();

        let (stored_weight, stored_volume) = stored_totals(db, destination.id).await?;
        let (weight_limit, volume_limit) = destination.effective_limits();
        if stored_weight + incoming_weight > weight_limit {
            return Err(ServiceError::CapacityExceeded(format!(
                "accepting would bring {} to {} kg, over its limit of {} kg",
                destination.name,
                stored_weight + incoming_weight,
                weight_limit
            )));
        }
        if stored_volume + incoming_volume > volume_limit {
            return Err(ServiceError::CapacityExceeded(format!(
                "accepting would bring {} to {} m3, over its limit of {} m3",
                destination.name,
                stored_volume + incoming_volume,
                volume_limit
            )));
        }

        let destination_id = destination.id;
        let destination_name = destination.name.clone();
        let updated = self
            .db_pool
            .transaction::<_, shipment::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let updated = workflow::set_shipment_status(
                        txn,
                        existing,
                        ShipmentStatus::Completed,
                        format!("Received into {}", destination_name),
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

        slog::info!(self.logger, "incoming shipment accepted";
            "shipment_id" => %shipment_id,
            "warehouse" => &destination.name,
            "packages" => members.len(),
        );
        self.publish_status_change(shipment_id, old_status, updated.status)
            .await;
        Ok(updated)
    }

    /// Cancels an expected shipment that never materialized. Packages
    /// stay INCOMING and can be attached to a new shipment.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        shipment_id: Uuid,
        reason: Option<String>,
        actor_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let existing = self.get(shipment_id).await?;

        let description = match reason {
            Some(reason) => format!("Incoming shipment cancelled: {}", reason),
            None => "Incoming shipment cancelled".to_string(),
        };

        let updated = self
            .db_pool
            .transaction::<_, shipment::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    workflow::set_shipment_status(
                        txn,
                        existing,
                        ShipmentStatus::Cancelled,
                        description,
                        actor_id,
                    )
                    .await
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

    async fn destination(
        &self,
        shipment: &shipment::Model,
    ) -> Result<warehouse::Model, ServiceError> {
        let destination_id = shipment.destination_warehouse_id.ok_or_else(|| {
            ServiceError::InvalidOperation(
                "incoming shipment has no destination warehouse".to_string(),
            )
        })?;
        warehouse::Entity::find_by_id(destination_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Warehouse {} not found", destination_id))
            })
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

/// Loads and validates the package set for a new incoming shipment:
/// all must exist, be unarchived, still INCOMING and not already on a
/// live shipment.
async fn load_expected_packages(
    db: &DbPool,
    package_ids: &[Uuid],
) -> Result<Vec<package::Model>, ServiceError> {
    if package_ids.is_empty() {
        return Err(ServiceError::InvalidInput(
            "no packages selected".to_string(),
        ));
    }

    let packages = package::Entity::find()
        .filter(package::Column::Id.is_in(package_ids.to_vec()))
        .all(db)
        .await?;
    if packages.len() != package_ids.len() {
        let found: HashSet<Uuid> = packages.iter().map(|p| p.id).collect();
        let missing = package_ids.iter().find(|id| !found.contains(id));
        return Err(ServiceError::NotFound(format!(
            "Package {} not found",
            missing.map(|id| id.to_string()).unwrap_or_default()
        )));
    }

    let busy: HashSet<Uuid> = busy_package_ids(db).await?.into_iter().collect();
    for package in &packages {
        if package.is_archived {
            return Err(ServiceError::InvalidOperation(format!(
                "package {} is archived",
                package.tracking_number
            )));
        }
        if package.status != PackageStatus::Incoming {
            return Err(ServiceError::InvalidOperation(format!(
                "package {} is {}, only INCOMING packages can be expected",
                package.tracking_number, package.status
            )));
        }
        if busy.contains(&package.id) {
            return Err(ServiceError::Conflict(format!(
                "package {} is already on an active shipment",
                package.tracking_number
            )));
        }
    }

    Ok(packages)
}
