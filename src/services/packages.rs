use crate::{
    db::DbPool,
    entities::package::{
        self, PackageStatus, ReceptionMode, ShippingMode, ShippingParty, ShippingType,
    },
    entities::{package_status_log, shipment_package},
    errors::ServiceError,
    events::{Event, EventSender},
    workflow,
};
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref TRACKING_NUMBER_RE: Regex = Regex::new(r"^[A-Z0-9-]{6,32}$").unwrap();
}

/// Manual package intake form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePackageRequest {
    #[validate(length(min = 6, max = 32))]
    pub tracking_number: String,
    pub shipping_party: ShippingParty,
    pub shipping_mode: ShippingMode,
    pub shipping_type: ShippingType,
    pub reception_mode: ReceptionMode,
    pub weight_kg: Decimal,
    pub volume_m3: Decimal,
    #[validate(length(min = 1, max = 500))]
    pub contents: String,
    pub pieces: Option<i32>,
    #[validate(length(min = 1))]
    pub sender_name: String,
    #[validate(length(min = 1))]
    pub sender_phone: String,
    #[validate(length(min = 1))]
    pub sender_address: String,
    #[validate(length(min = 1))]
    pub receiver_name: String,
    #[validate(length(min = 1))]
    pub receiver_phone: String,
    #[validate(length(min = 1))]
    pub receiver_province: String,
    #[validate(length(min = 1))]
    pub receiver_city: String,
    #[validate(length(min = 1))]
    pub receiver_barangay: String,
    #[validate(length(min = 1))]
    pub receiver_street: String,
    pub is_fragile: Option<bool>,
    pub declared_value: Option<Decimal>,
    pub container_no: Option<String>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Set when the package was physically received over the counter;
    /// the package then starts IN_WAREHOUSE instead of INCOMING.
    pub received_at_warehouse_id: Option<Uuid>,
}

/// Detail edits; every field optional, absent fields stay untouched.
/// Status is never edited here, it moves through the workflow endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdatePackageRequest {
    pub contents: Option<String>,
    pub pieces: Option<i32>,
    pub weight_kg: Option<Decimal>,
    pub volume_m3: Option<Decimal>,
    pub is_fragile: Option<bool>,
    pub declared_value: Option<Decimal>,
    pub container_no: Option<String>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub sender_name: Option<String>,
    pub sender_phone: Option<String>,
    pub sender_address: Option<String>,
    pub receiver_name: Option<String>,
    pub receiver_phone: Option<String>,
    pub receiver_province: Option<String>,
    pub receiver_city: Option<String>,
    pub receiver_barangay: Option<String>,
    pub receiver_street: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    pub status: Option<PackageStatus>,
    pub warehouse_id: Option<Uuid>,
    /// None lists everything; the API defaults to Some(false).
    pub archived: Option<bool>,
    /// Matches tracking number or receiver name.
    pub search: Option<String>,
}

/// Service for package intake and lifecycle
#[derive(Clone)]
pub struct PackageService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl PackageService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            db_pool,
            event_sender,
            logger,
        }
    }

    /// Lists packages with pagination and optional filters
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: PackageFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<package::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = package::Entity::find();
        if let Some(status) = filter.status {
            query = query.filter(package::Column::Status.eq(status));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(package::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(archived) = filter.archived {
            query = query.filter(package::Column::IsArchived.eq(archived));
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let needle = format!("%{}%", search.trim());
            query = query.filter(
                Condition::any()
                    .add(package::Column::TrackingNumber.like(needle.clone()))
                    .add(package::Column::ReceiverName.like(needle)),
            );
        }

        let paginator = query
            .order_by_desc(package::Column::CreatedAt)
            .paginate(db, per_page);
        let total = paginator.num_items().await?;
        let packages = paginator.fetch_page(page.max(1) - 1).await?;

        Ok((packages, total))
    }

    /// Gets a package by ID
    #[instrument(skip(self))]
    pub async fn get(&self, package_id: Uuid) -> Result<package::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        package::Entity::find_by_id(package_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Package {} not found", package_id)))
    }

    /// Registers a package over the counter. The row and its initial
    /// status-log entry commit in one transaction.
    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        request: CreatePackageRequest,
        actor_id: Uuid,
    ) -> Result<package::Model, ServiceError> {
        request.validate()?;

        let tracking_number = request.tracking_number.trim().to_uppercase();
        if !TRACKING_NUMBER_RE.is_match(&tracking_number) {
            return Err(ServiceError::ValidationError(
                "tracking number must be 6-32 characters of A-Z, 0-9 or '-'".to_string(),
            ));
        }
        if request.weight_kg < Decimal::ZERO || request.volume_m3 < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "weight and volume must not be negative".to_string(),
            ));
        }
        if request.pieces.is_some_and(|p| p < 1) {
            return Err(ServiceError::ValidationError(
                "pieces must be at least 1".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();
        let exists = package::Entity::find()
            .filter(package::Column::TrackingNumber.eq(tracking_number.clone()))
            .count(db)
            .await?;
        if exists > 0 {
            return Err(ServiceError::Conflict(format!(
                "tracking number {} already exists",
                tracking_number
            )));
        }

        let (initial_status, description) = match request.received_at_warehouse_id {
            Some(_) => (
                PackageStatus::InWarehouse,
                "Package received at warehouse".to_string(),
            ),
            None => (PackageStatus::Incoming, "Package registered".to_string()),
        };

        let created = db
            .transaction::<_, package::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let model = package::ActiveModel {
                        tracking_number: Set(tracking_number),
                        shipping_party: Set(request.shipping_party),
                        shipping_mode: Set(request.shipping_mode),
                        shipping_type: Set(request.shipping_type),
                        reception_mode: Set(request.reception_mode),
                        weight_kg: Set(request.weight_kg),
                        volume_m3: Set(request.volume_m3),
                        contents: Set(request.contents),
                        pieces: Set(request.pieces.unwrap_or(1)),
                        sender_name: Set(request.sender_name),
                        sender_phone: Set(request.sender_phone),
                        sender_address: Set(request.sender_address),
                        receiver_name: Set(request.receiver_name),
                        receiver_phone: Set(request.receiver_phone),
                        receiver_province: Set(request.receiver_province),
                        receiver_city: Set(request.receiver_city),
                        receiver_barangay: Set(request.receiver_barangay),
                        receiver_street: Set(request.receiver_street),
                        is_fragile: Set(request.is_fragile.unwrap_or(false)),
                        declared_value: Set(request.declared_value),
                        container_no: Set(request.container_no),
                        expected_delivery_date: Set(request.expected_delivery_date),
                        notes: Set(request.notes),
                        status: Set(initial_status),
                        warehouse_id: Set(request.received_at_warehouse_id),
                        manifest_id: Set(None),
                        is_archived: Set(false),
                        created_by: Set(Some(actor_id)),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    package_status_log::ActiveModel {
                        package_id: Set(model.id),
                        status: Set(initial_status),
                        description: Set(description),
                        actor_id: Set(actor_id),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    Ok(model)
                })
            })
            .await?;

        slog::info!(self.logger, "package created";
            "package_id" => %created.id,
            "tracking_number" => &created.tracking_number,
        );
        if let Err(e) = self.event_sender.send(Event::PackageCreated(created.id)).await {
            warn!("failed to publish PackageCreated: {}", e);
        }

        Ok(created)
    }

    /// Edits package details. Archived packages are read-only.
    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        package_id: Uuid,
        request: UpdatePackageRequest,
    ) -> Result<package::Model, ServiceError> {
        request.validate()?;

        let existing = self.get(package_id).await?;
        if existing.is_archived {
            return Err(ServiceError::InvalidOperation(
                "archived packages cannot be edited".to_string(),
            ));
        }
        if let Some(weight) = request.weight_kg {
            if weight < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "weight must not be negative".to_string(),
                ));
            }
        }
        if let Some(pieces) = request.pieces {
            if pieces < 1 {
                return Err(ServiceError::ValidationError(
                    "pieces must be at least 1".to_string(),
                ));
            }
        }

        let mut active: package::ActiveModel = existing.into();
        if let Some(v) = request.contents {
            active.contents = Set(v);
        }
        if let Some(v) = request.pieces {
            active.pieces = Set(v);
        }
        if let Some(v) = request.weight_kg {
            active.weight_kg = Set(v);
        }
        if let Some(v) = request.volume_m3 {
            active.volume_m3 = Set(v);
        }
        if let Some(v) = request.is_fragile {
            active.is_fragile = Set(v);
        }
        if let Some(v) = request.declared_value {
            active.declared_value = Set(Some(v));
        }
        if let Some(v) = request.container_no {
            active.container_no = Set(Some(v));
        }
        if let Some(v) = request.expected_delivery_date {
            active.expected_delivery_date = Set(Some(v));
        }
        if let Some(v) = request.notes {
            active.notes = Set(Some(v));
        }
        if let Some(v) = request.sender_name {
            active.sender_name = Set(v);
        }
        if let Some(v) = request.sender_phone {
            active.sender_phone = Set(v);
        }
        if let Some(v) = request.sender_address {
            active.sender_address = Set(v);
        }
        if let Some(v) = request.receiver_name {
            active.receiver_name = Set(v);
        }
        if let Some(v) = request.receiver_phone {
            active.receiver_phone = Set(v);
        }
        if let Some(v) = request.receiver_province {
            active.receiver_province = Set(v);
        }
        if let Some(v) = request.receiver_city {
            active.receiver_city = Set(v);
        }
        if let Some(v) = request.receiver_barangay {
            active.receiver_barangay = Set(v);
        }
        if let Some(v) = request.receiver_street {
            active.receiver_street = Set(v);
        }

        let updated = active.update(self.db_pool.as_ref()).await?;
        Ok(updated)
    }

    /// Moves a package through the workflow. The column update and the
    /// log row commit together; an illegal transition changes nothing.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        package_id: Uuid,
        new_status: PackageStatus,
        description: Option<String>,
        actor_id: Uuid,
    ) -> Result<package::Model, ServiceError> {
        let existing = self.get(package_id).await?;
        let old_status = existing.status;
        let description =
            description.unwrap_or_else(|| format!("Status changed to {}", new_status));

        let updated = self
            .db_pool
            .transaction::<_, package::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    workflow::set_package_status(txn, existing, new_status, description, actor_id)
                        .await
                })
            })
            .await?;

        if let Err(e) = self
            .event_sender
            .send(Event::PackageStatusChanged {
                package_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await
        {
            warn!("failed to publish PackageStatusChanged: {}", e);
        }

        Ok(updated)
    }

    /// Full audit trail of a package, oldest first.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        package_id: Uuid,
    ) -> Result<Vec<package_status_log::Model>, ServiceError> {
        // 404 for unknown ids rather than an empty history
        self.get(package_id).await?;

        let db = self.db_pool.as_ref();
        let logs = package_status_log::Entity::find()
            .filter(package_status_log::Column::PackageId.eq(package_id))
            .order_by_asc(package_status_log::Column::RecordedAt)
            .all(db)
            .await?;
        Ok(logs)
    }

    /// Archival hides a package from working lists. It does not touch
    /// status or the audit trail.
    #[instrument(skip(self))]
    pub async fn set_archived(
        &self,
        package_id: Uuid,
        archived: bool,
    ) -> Result<package::Model, ServiceError> {
        let existing = self.get(package_id).await?;
        if existing.is_archived == archived {
            return Ok(existing);
        }

        let mut active: package::ActiveModel = existing.into();
        active.is_archived = Set(archived);
        let updated = active.update(self.db_pool.as_ref()).await?;

        let event = if archived {
            Event::PackageArchived(package_id)
        } else {
            Event::PackageUnarchived(package_id)
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!("failed to publish archive event: {}", e);
        }

        Ok(updated)
    }

    /// Hard delete, allowed only while the package has never been placed
    /// on a shipment. Audit rows go with it.
    #[instrument(skip(self))]
    pub async fn delete(&self, package_id: Uuid) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        self.get(package_id).await?;

        let memberships = shipment_package::Entity::find()
            .filter(shipment_package::Column::PackageId.eq(package_id))
            .count(db)
            .await?;
        if memberships > 0 {
            return Err(ServiceError::Conflict(
                "package has shipment history and can only be archived".to_string(),
            ));
        }

        db.transaction::<_, (), ServiceError>(|txn| {
            Box::pin(async move {
                package_status_log::Entity::delete_many()
                    .filter(package_status_log::Column::PackageId.eq(package_id))
                    .exec(txn)
                    .await?;
                package::Entity::delete_by_id(package_id).exec(txn).await?;
                Ok(())
            })
        })
        .await?;

        if let Err(e) = self.event_sender.send(Event::PackageDeleted(package_id)).await {
            warn!("failed to publish PackageDeleted: {}", e);
        }
        Ok(())
    }

    /// Stages a batch of packages for handoff to a partner forwarder.
    /// All of them move or none do.
    #[instrument(skip(self))]
    pub async fn transfer_to_forwarder(
        &self,
        package_ids: Vec<Uuid>,
        forwarder: String,
        actor_id: Uuid,
    ) -> Result<Vec<package::Model>, ServiceError> {
        self.batch_transition(
            package_ids,
            PackageStatus::TransferringForwarder,
            format!("Handoff to forwarder {} initiated", forwarder),
            actor_id,
        )
        .await
    }

    /// Confirms a forwarder handoff, closing out the packages.
    #[instrument(skip(self))]
    pub async fn confirm_forwarder_transfer(
        &self,
        package_ids: Vec<Uuid>,
        actor_id: Uuid,
    ) -> Result<Vec<package::Model>, ServiceError> {
        self.batch_transition(
            package_ids,
            PackageStatus::TransferredForwarder,
            "Forwarder handoff confirmed".to_string(),
            actor_id,
        )
        .await
    }

    async fn batch_transition(
        &self,
        package_ids: Vec<Uuid>,
        new_status: PackageStatus,
        description: String,
        actor_id: Uuid,
    ) -> Result<Vec<package::Model>, ServiceError> {
        if package_ids.is_empty() {
            return Err(ServiceError::InvalidInput(
                "no packages selected".to_string(),
            ));
        }

        let updated = self
            .db_pool
            .transaction::<_, Vec<(PackageStatus, package::Model)>, ServiceError>(|txn| {
                Box::pin(async move {
                    let mut updated = Vec::with_capacity(package_ids.len());
                    for package_id in package_ids {
                        let existing = package::Entity::find_by_id(package_id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!("Package {} not found", package_id))
                            })?;
                        let old_status = existing.status;
                        let model = workflow::set_package_status(
                            txn,
                            existing,
                            new_status,
                            description.clone(),
                            actor_id,
                        )
                        .await?;
                        updated.push((old_status, model));
                    }
                    Ok(updated)
                })
            })
            .await?;

        let mut packages = Vec::with_capacity(updated.len());
        for (old_status, package) in updated {
            if let Err(e) = self
                .event_sender
                .send(Event::PackageStatusChanged {
                    package_id: package.id,
                    old_status: old_status.to_string(),
                    new_status: new_status.to_string(),
                })
                .await
            {
                warn!("failed to publish PackageStatusChanged: {}", e);
            }
            packages.push(package);
        }

        Ok(packages)
    }
}
