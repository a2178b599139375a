use crate::{
    capacity::{self, Candidate, SelectionError},
    db::DbPool,
    entities::package::{self, PackageStatus, ShippingType},
    entities::shipment::{self, ShipmentKind, ShipmentStatus},
    entities::user::{self, UserRole},
    entities::{shipment_package, shipment_status_log, vehicle, warehouse},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{busy_package_ids, member_package_ids, new_reference},
    workflow,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// How the packages for a new shipment are chosen.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PackageSelection {
    /// Operator toggled a set by hand; over-capacity selections are
    /// rejected here even though the summary endpoint only flags them.
    Manual { package_ids: Vec<Uuid> },
    /// Greedy first-fit over the sorting pool, in priority order.
    Auto,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateDeliveryRequest {
    pub origin_warehouse_id: Uuid,
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub scheduled_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub selection: PackageSelection,
}

/// Per-package outcome reported when a delivery run finishes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PackageOutcome {
    pub package_id: Uuid,
    /// False sends the package back to the sorting pool.
    pub delivered: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ShipmentFilter {
    pub status: Option<ShipmentStatus>,
    pub archived: Option<bool>,
}

/// Service for delivery runs from a warehouse out to recipients
#[derive(Clone)]
pub struct DeliveryService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl DeliveryService {
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
            ShipmentKind::Delivery,
            filter,
            page,
            per_page,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, shipment_id: Uuid) -> Result<shipment::Model, ServiceError> {
        get_shipment_of_kind(self.db_pool.as_ref(), ShipmentKind::Delivery, shipment_id).await
    }

    /// Packages riding on this delivery.
    #[instrument(skip(self))]
    pub async fn packages_on(&self, shipment_id: Uuid) -> Result<Vec<package::Model>, ServiceError> {
        self.get(shipment_id).await?;
        packages_on_shipment(self.db_pool.as_ref(), shipment_id).await
    }

    /// Schedules a delivery run. Validates the vehicle, the driver and
    /// every selected package, then creates the shipment, its PREPARING
    /// log and the join rows in one transaction. Packages stay SORTING
    /// until dispatch.
    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        request: CreateDeliveryRequest,
        actor_id: Uuid,
    ) -> Result<(shipment::Model, Vec<package::Model>), ServiceError> {
        let db = self.db_pool.as_ref();

        let origin = warehouse::Entity::find_by_id(request.origin_warehouse_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Warehouse {} not found",
                    request.origin_warehouse_id
                ))
            })?;
        if origin.is_archived {
            return Err(ServiceError::InvalidOperation(format!(
                "warehouse {} is archived",
                origin.name
            )));
        }

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
                    delivery_pool(db, request.origin_warehouse_id, vehicle.is_express).await?;
                auto_select_from(pool, vehicle.weight_capacity_kg)?
            }
        };

        let reference = new_reference(ShipmentKind::Delivery);
        let shipment = self
            .db_pool
            .transaction::<_, shipment::Model, ServiceError>(|txn| {
                let selected_ids: Vec<Uuid> = selected.iter().map(|p| p.id).collect();
                Box::pin(async move {
                    let shipment = shipment::ActiveModel {
                        reference: Set(reference),
                        kind: Set(ShipmentKind::Delivery),
                        status: Set(ShipmentStatus::Preparing),
                        origin_warehouse_id: Set(Some(request.origin_warehouse_id)),
                        destination_warehouse_id: Set(None),
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
                        description: Set("Delivery scheduled".to_string()),
                        actor_id: Set(actor_id),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    for package_id in selected_ids {
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

        slog::info!(self.logger, "delivery scheduled";
            "shipment_id" => %shipment.id,
            "reference" => &shipment.reference,
            "packages" => selected.len(),
        );
        if let Err(e) = self
            .event_sender
            .send(Event::ShipmentCreated {
                shipment_id: shipment.id,
                kind: ShipmentKind::Delivery.to_string(),
            })
            .await
        {
            warn!("failed to publish ShipmentCreated: {}", e);
        }

        Ok((shipment, selected))
    }

    /// Sends the run onto the road: shipment to IN_TRANSIT, every
    /// member package to DELIVERING, all in one transaction.
    #[instrument(skip(self))]
    pub async fn dispatch(
        &self,
        shipment_id: Uuid,
        actor_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let existing = self.get(shipment_id).await?;
        let old_status = existing.status;
        let reference = existing.reference.clone();

        let updated = self
            .db_pool
            .transaction::<_, shipment::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let updated = workflow::set_shipment_status(
                        txn,
                        existing,
                        ShipmentStatus::InTransit,
                        "Delivery dispatched",
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
                            PackageStatus::Delivering,
                            format!("Out for delivery on {}", reference),
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

    /// Closes out a run. Every member package must be accounted for:
    /// delivered ones leave the network, returned ones go back to the
    /// sorting pool at the origin warehouse.
    #[instrument(skip(self, outcomes))]
    pub async fn complete(
        &self,
        shipment_id: Uuid,
        outcomes: Vec<PackageOutcome>,
        actor_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let existing = self.get(shipment_id).await?;
        let old_status = existing.status;

        let members: HashSet<Uuid> = member_package_ids(self.db_pool.as_ref(), shipment_id)
            .await?
            .into_iter()
            .collect();
        let reported: HashSet<Uuid> = outcomes.iter().map(|o| o.package_id).collect();
        if reported.len() != outcomes.len() {
            return Err(ServiceError::InvalidInput(
                "duplicate package in outcomes".to_string(),
            ));
        }

        let missing: Vec<_> = members.difference(&reported).collect();
        if !missing.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "missing outcome for {} package(s) on this delivery",
                missing.len()
            )));
        }
        let unknown: Vec<_> = reported.difference(&members).collect();
        if !unknown.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "{} package(s) in outcomes are not on this delivery",
                unknown.len()
            )));
        }

        let delivered = outcomes.iter().filter(|o| o.delivered).count();
        let returned = outcomes.len() - delivered;

        let updated = self
            .db_pool
            .transaction::<_, shipment::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let updated = workflow::set_shipment_status(
                        txn,
                        existing,
                        ShipmentStatus::Completed,
                        format!(
                            "Delivery completed: {} delivered, {} returned",
                            delivered, returned
                        ),
                        actor_id,
                    )
                    .await?;

                    let mut active: shipment::ActiveModel = updated.into();
                    active.completed_at = Set(Some(Utc::now()));
                    let updated = active.update(txn).await?;

                    for outcome in outcomes {
                        if outcome.delivered {
                            let package = workflow::transition_package_by_id(
                                txn,
                                outcome.package_id,
                                PackageStatus::Delivered,
                                "Delivered to recipient",
                                actor_id,
                            )
                            .await?;
                            // Delivered packages are no longer stored anywhere
                            let mut active: package::ActiveModel = package.into();
                            active.warehouse_id = Set(None);
                            active.update(txn).await?;
                        } else {
                            workflow::transition_package_by_id(
                                txn,
                                outcome.package_id,
                                PackageStatus::Sorting,
                                "Returned to sorting after failed delivery attempt",
                                actor_id,
                            )
                            .await?;
                        }
                    }

                    Ok(updated)
                })
            })
            .await?;

        self.publish_status_change(shipment_id, old_status, updated.status)
            .await;
        Ok(updated)
    }

    /// Abandons a run before dispatch. Member packages never left the
    /// sorting pool, so only the shipment moves.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        shipment_id: Uuid,
        reason: Option<String>,
        actor_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let existing = self.get(shipment_id).await?;

        let description = match reason {
            Some(reason) => format!("Delivery cancelled: {}", reason),
            None => "Delivery cancelled".to_string(),
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

// Helpers shared with the warehouse-transfer service.

pub(crate) async fn list_shipments_of_kind(
    db: &DbPool,
    kind: ShipmentKind,
    filter: ShipmentFilter,
    page: u64,
    per_page: u64,
) -> Result<(Vec<shipment::Model>, u64), ServiceError> {
    let mut query = shipment::Entity::find().filter(shipment::Column::Kind.eq(kind));
    if let Some(status) = filter.status {
        query = query.filter(shipment::Column::Status.eq(status));
    }
    if let Some(archived) = filter.archived {
        query = query.filter(shipment::Column::IsArchived.eq(archived));
    }

    let paginator = query
        .order_by_desc(shipment::Column::CreatedAt)
        .paginate(db, per_page);
    let total = paginator.num_items().await?;
    let shipments = paginator.fetch_page(page.max(1) - 1).await?;
    Ok((shipments, total))
}

/// Kind-scoped fetch: a delivery endpoint asked for a transfer id gets
/// a 404, not someone else's shipment.
pub(crate) async fn get_shipment_of_kind(
    db: &DbPool,
    kind: ShipmentKind,
    shipment_id: Uuid,
) -> Result<shipment::Model, ServiceError> {
    shipment::Entity::find_by_id(shipment_id)
        .one(db)
        .await?
        .filter(|s| s.kind == kind)
        .ok_or_else(|| ServiceError::NotFound(format!("Shipment {} not found", shipment_id)))
}

pub(crate) async fn packages_on_shipment(
    db: &DbPool,
    shipment_id: Uuid,
) -> Result<Vec<package::Model>, ServiceError> {
    let ids = member_package_ids(db, shipment_id).await?;
    let packages = package::Entity::find()
        .filter(package::Column::Id.is_in(ids))
        .order_by_asc(package::Column::TrackingNumber)
        .all(db)
        .await?;
    Ok(packages)
}

pub(crate) async fn load_assignable_vehicle(
    db: &DbPool,
    vehicle_id: Uuid,
) -> Result<vehicle::Model, ServiceError> {
    let vehicle = vehicle::Entity::find_by_id(vehicle_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Vehicle {} not found", vehicle_id)))?;

    if vehicle.is_archived {
        return Err(ServiceError::InvalidOperation(format!(
            "vehicle {} is archived",
            vehicle.plate_number
        )));
    }
    if vehicle.in_maintenance {
        return Err(ServiceError::InvalidOperation(format!(
            "vehicle {} is in maintenance",
            vehicle.plate_number
        )));
    }
    Ok(vehicle)
}

pub(crate) async fn ensure_active_driver(db: &DbPool, driver_id: Uuid) -> Result<(), ServiceError> {
    let driver = user::Entity::find_by_id(driver_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Driver {} not found", driver_id)))?;

    if driver.role != UserRole::Driver {
        return Err(ServiceError::InvalidOperation(format!(
            "{} is not a driver account",
            driver.name
        )));
    }
    if !driver.is_active {
        return Err(ServiceError::InvalidOperation(format!(
            "driver {} is deactivated",
            driver.name
        )));
    }
    Ok(())
}

/// Validates a hand-picked package set for a shipment leaving
/// `origin_warehouse_id` on `vehicle`.
pub(crate) async fn load_manual_selection(
    db: &DbPool,
    package_ids: &[Uuid],
    origin_warehouse_id: Uuid,
    vehicle: &vehicle::Model,
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
        if package.status != PackageStatus::Sorting {
            return Err(ServiceError::InvalidOperation(format!(
                "package {} is {} and not in the sorting pool",
                package.tracking_number, package.status
            )));
        }
        if package.warehouse_id != Some(origin_warehouse_id) {
            return Err(ServiceError::InvalidOperation(format!(
                "package {} is not at the origin warehouse",
                package.tracking_number
            )));
        }
        if busy.contains(&package.id) {
            return Err(ServiceError::Conflict(format!(
                "package {} is already on an active shipment",
                package.tracking_number
            )));
        }
        if package.shipping_type == ShippingType::Express && !vehicle.is_express {
            return Err(ServiceError::InvalidOperation(format!(
                "package {} is EXPRESS but vehicle {} is not express-eligible",
                package.tracking_number, vehicle.plate_number
            )));
        }
    }

    Ok(packages)
}

/// The delivery sorting pool, ordered by delivery priority: dated
/// packages first by ascending expected date, then by intake time.
async fn delivery_pool(
    db: &DbPool,
    origin_warehouse_id: Uuid,
    vehicle_is_express: bool,
) -> Result<Vec<package::Model>, ServiceError> {
    let busy = busy_package_ids(db).await?;

    let mut query = package::Entity::find()
        .filter(package::Column::Status.eq(PackageStatus::Sorting))
        .filter(package::Column::WarehouseId.eq(origin_warehouse_id))
        .filter(package::Column::IsArchived.eq(false))
        .filter(package::Column::Id.is_not_in(busy));
    if !vehicle_is_express {
        query = query.filter(package::Column::ShippingType.eq(ShippingType::Standard));
    }

    let mut pool = query.all(db).await?;
    pool.sort_by(|a, b| {
        match (a.expected_delivery_date, b.expected_delivery_date) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.created_at.cmp(&b.created_at)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.created_at.cmp(&b.created_at),
        }
    });
    Ok(pool)
}

/// Runs the greedy selector over an ordered pool and keeps the
/// selected models, in pool order.
pub(crate) fn auto_select_from(
    pool: Vec<package::Model>,
    capacity_kg: rust_decimal::Decimal,
) -> Result<Vec<package::Model>, ServiceError> {
    let candidates: Vec<Candidate> = pool
        .iter()
        .map(|p| Candidate {
            id: p.id,
            weight_kg: p.weight_kg,
        })
        .collect();

    let picked = capacity::auto_select(&candidates, capacity_kg).map_err(|e| match e {
        SelectionError::NoCandidates | SelectionError::NothingFits => {
            ServiceError::InvalidOperation(e.to_string())
        }
    })?;

    let selected: HashSet<Uuid> = picked.selected.into_iter().collect();
    Ok(pool
        .into_iter()
        .filter(|p| selected.contains(&p.id))
        .collect())
}
