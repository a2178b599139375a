use crate::{
    db::DbPool,
    entities::manifest::{self, ManifestStatus},
    entities::package::{self, PackageStatus, ShippingMode},
    entities::shipment::{self, ShipmentKind, ShipmentStatus},
    entities::{manifest_row, package_status_log, shipment_package, shipment_status_log, warehouse},
    errors::ServiceError,
    events::{Event, EventSender},
    manifest::{
        missing_columns, parse_spreadsheet, validate_rows, FieldError, ManifestRecord, RowErrors,
    },
    services::{new_reference, service_areas::AreaLookup},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UploadManifestRequest {
    #[validate(length(min = 1, max = 120, message = "agent name is required"))]
    pub agent_name: String,
    /// Free-text origin port or city, shown on the incoming shipment.
    pub origin: Option<String>,
    pub shipping_mode: ShippingMode,
    /// Destination warehouse for the eventual import.
    pub warehouse_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct ManifestFilter {
    pub status: Option<ManifestStatus>,
    pub warehouse_id: Option<Uuid>,
}

/// One stored row, payload decoded, for the manifest detail screen.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ManifestRowView {
    pub row_number: i32,
    pub tracking_number: String,
    pub record: ManifestRecord,
    /// Address errors that block import; empty for clean rows.
    pub errors: Vec<FieldError>,
}

/// Outcome of running a file through parsing, schema validation and
/// the address gazetteer. Schema failures never get this far; address
/// failures do, as blocked rows.
struct CheckedFile {
    rows: Vec<CheckedRow>,
    blocked_rows: usize,
}

struct CheckedRow {
    row_number: usize,
    record: ManifestRecord,
    errors: Vec<FieldError>,
}

impl CheckedFile {
    fn status(&self) -> ManifestStatus {
        if self.blocked_rows > 0 {
            ManifestStatus::Blocked
        } else {
            ManifestStatus::Ready
        }
    }
}

/// Service for agent manifest files: upload, inspection, replacement
/// and the import that turns a READY manifest into an incoming
/// shipment with its packages.
#[derive(Clone)]
pub struct ManifestService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    logger: Logger,
    max_rows: usize,
}

impl ManifestService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        logger: Logger,
        max_rows: usize,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            logger,
            max_rows,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: ManifestFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<manifest::Model>, u64), ServiceError> {
        let mut query = manifest::Entity::find();
        if let Some(status) = filter.status {
            query = query.filter(manifest::Column::Status.eq(status));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(manifest::Column::WarehouseId.eq(warehouse_id));
        }

        let paginator = query
            .order_by_desc(manifest::Column::CreatedAt)
            .paginate(self.db_pool.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let manifests = paginator.fetch_page(page.max(1) - 1).await?;
        Ok((manifests, total))
    }

    #[instrument(skip(self))]
    pub async fn get(
        &self,
        manifest_id: Uuid,
    ) -> Result<(manifest::Model, Vec<ManifestRowView>), ServiceError> {
        let db = self.db_pool.as_ref();
        let manifest = self.find(manifest_id).await?;

        let rows = manifest_row::Entity::find()
            .filter(manifest_row::Column::ManifestId.eq(manifest_id))
            .order_by_asc(manifest_row::Column::RowNumber)
            .all(db)
            .await?
            .into_iter()
            .map(row_view)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((manifest, rows))
    }

    /// Stores an uploaded file. The whole batch is rejected on any
    /// schema failure; address failures are stored per-row and mark
    /// the manifest BLOCKED instead.
    #[instrument(skip(self, bytes, request))]
    pub async fn upload(
        &self,
        file_name: String,
        bytes: &[u8],
        request: UploadManifestRequest,
        actor_id: Uuid,
    ) -> Result<manifest::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;
        let db = self.db_pool.as_ref();

        let destination = warehouse::Entity::find_by_id(request.warehouse_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Warehouse {} not found", request.warehouse_id))
            })?;
        if destination.is_archived {
            return Err(ServiceError::InvalidOperation(format!(
                "warehouse {} is archived",
                destination.name
            )));
        }

        let checked = self.check_file(&file_name, bytes).await?;
        let row_count = checked.rows.len();
        let blocked_rows = checked.blocked_rows;
        let status = checked.status();

        let created = self
            .db_pool
            .transaction::<_, manifest::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let created = manifest::ActiveModel {
                        file_name: Set(file_name),
                        agent_name: Set(request.agent_name),
                        origin: Set(request.origin),
                        shipping_mode: Set(request.shipping_mode),
                        warehouse_id: Set(request.warehouse_id),
                        row_count: Set(row_count as i32),
                        blocked_row_count: Set(blocked_rows as i32),
                        status: Set(status),
                        shipment_id: Set(None),
                        uploaded_by: Set(Some(actor_id)),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    insert_rows(txn, created.id, checked.rows).await?;
                    Ok(created)
                })
            })
            .await?;

        slog::info!(self.logger, "manifest uploaded";
            "manifest_id" => %created.id,
            "file" => &created.file_name,
            "rows" => row_count,
            "blocked_rows" => blocked_rows,
        );
        if let Err(e) = self
            .event_sender
            .send(Event::ManifestUploaded {
                manifest_id: created.id,
                rows: row_count,
                blocked_rows,
            })
            .await
        {
            warn!("failed to publish ManifestUploaded: {}", e);
        }

        Ok(created)
    }

    /// Swaps in a corrected file. The stored rows are replaced
    /// wholesale and the manifest re-scored; only unimported manifests
    /// can be replaced.
    #[instrument(skip(self, bytes))]
    pub async fn replace_file(
        &self,
        manifest_id: Uuid,
        file_name: String,
        bytes: &[u8],
        actor_id: Uuid,
    ) -> Result<manifest::Model, ServiceError> {
        let existing = self.find(manifest_id).await?;
        if existing.status == ManifestStatus::Imported {
            return Err(ServiceError::InvalidOperation(
                "manifest has already been imported".to_string(),
            ));
        }

        let checked = self.check_file(&file_name, bytes).await?;
        let row_count = checked.rows.len();
        let blocked_rows = checked.blocked_rows;
        let status = checked.status();

        let updated = self
            .db_pool
            .transaction::<_, manifest::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    manifest_row::Entity::delete_many()
                        .filter(manifest_row::Column::ManifestId.eq(manifest_id))
                        .exec(txn)
                        .await?;
                    insert_rows(txn, manifest_id, checked.rows).await?;

                    let mut active: manifest::ActiveModel = existing.into();
                    active.file_name = Set(file_name);
                    active.row_count = Set(row_count as i32);
                    active.blocked_row_count = Set(blocked_rows as i32);
                    active.status = Set(status);
                    Ok(active.update(txn).await?)
                })
            })
            .await?;

        slog::info!(self.logger, "manifest file replaced";
            "manifest_id" => %manifest_id,
            "file" => &updated.file_name,
            "rows" => row_count,
            "blocked_rows" => blocked_rows,
        );
        if let Err(e) = self
            .event_sender
            .send(Event::ManifestUploaded {
                manifest_id,
                rows: row_count,
                blocked_rows,
            })
            .await
        {
            warn!("failed to publish ManifestUploaded: {}", e);
        }

        Ok(updated)
    }

    /// Turns a READY manifest into one incoming shipment plus one
    /// package per row, each with its initial INCOMING log, in a
    /// single transaction.
    #[instrument(skip(self))]
    pub async fn import(
        &self,
        manifest_id: Uuid,
        actor_id: Uuid,
    ) -> Result<(manifest::Model, shipment::Model), ServiceError> {
        let db = self.db_pool.as_ref();
        let existing = self.find(manifest_id).await?;
        match existing.status {
            ManifestStatus::Ready => {}
            ManifestStatus::Blocked => {
                return Err(ServiceError::InvalidOperation(
                    "manifest has blocked rows; replace the file with corrected addresses"
                        .to_string(),
                ));
            }
            ManifestStatus::Imported => {
                return Err(ServiceError::Conflict(
                    "manifest has already been imported".to_string(),
                ));
            }
        }

        let destination = warehouse::Entity::find_by_id(existing.warehouse_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Warehouse {} not found", existing.warehouse_id))
            })?;
        if destination.is_archived {
            return Err(ServiceError::InvalidOperation(format!(
                "warehouse {} is archived",
                destination.name
            )));
        }

        let rows = manifest_row::Entity::find()
            .filter(manifest_row::Column::ManifestId.eq(manifest_id))
            .order_by_asc(manifest_row::Column::RowNumber)
            .all(db)
            .await?;
        if rows.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "manifest has no rows to import".to_string(),
            ));
        }

        let records = rows
            .iter()
            .map(|row| {
                serde_json::from_str::<ManifestRecord>(&row.payload)
                    .map_err(|e| ServiceError::SerializationError(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Tracking numbers may have been registered between upload and
        // import; re-check before committing anything.
        let numbers: Vec<String> = records.iter().map(|r| r.tracking_number.clone()).collect();
        let taken: Vec<String> = package::Entity::find()
            .filter(package::Column::TrackingNumber.is_in(numbers))
            .select_only()
            .column(package::Column::TrackingNumber)
            .into_tuple::<String>()
            .all(db)
            .await?;
        if let Some(tracking_number) = taken.first() {
            return Err(ServiceError::Conflict(format!(
                "tracking number {} was registered after this manifest was uploaded; replace the file",
                tracking_number
            )));
        }

        let reference = new_reference(ShipmentKind::Incoming);
        let agent_name = existing.agent_name.clone();
        let file_name = existing.file_name.clone();
        let origin_label = existing.origin.clone().unwrap_or_else(|| agent_name.clone());
        let package_count = records.len();

        let (updated_manifest, created_shipment) = self
            .db_pool
            .transaction::<_, (manifest::Model, shipment::Model), ServiceError>(|txn| {
                Box::pin(async move {
                    let created_shipment = shipment::ActiveModel {
                        reference: Set(reference),
                        kind: Set(ShipmentKind::Incoming),
                        status: Set(ShipmentStatus::Preparing),
                        origin_warehouse_id: Set(None),
                        destination_warehouse_id: Set(Some(existing.warehouse_id)),
                        origin_label: Set(Some(origin_label)),
                        driver_id: Set(None),
                        vehicle_id: Set(None),
                        manifest_id: Set(Some(existing.id)),
                        scheduled_date: Set(None),
                        departed_at: Set(None),
                        completed_at: Set(None),
                        notes: Set(None),
                        is_archived: Set(false),
                        created_by: Set(Some(actor_id)),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    shipment_status_log::ActiveModel {
                        shipment_id: Set(created_shipment.id),
                        status: Set(ShipmentStatus::Preparing),
                        description: Set(format!("Created from manifest {}", file_name)),
                        actor_id: Set(actor_id),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    for record in records {
                        let created = package::ActiveModel {
                            tracking_number: Set(record.tracking_number),
                            shipping_party: Set(record.shipping_party),
                            shipping_mode: Set(record.shipping_mode),
                            shipping_type: Set(record.shipping_type),
                            reception_mode: Set(record.reception_mode),
                            weight_kg: Set(record.weight_kg),
                            volume_m3: Set(record.volume_m3),
                            contents: Set(record.contents),
                            pieces: Set(record.pieces),
                            sender_name: Set(record.sender_name),
                            sender_phone: Set(record.sender_phone),
                            sender_address: Set(record.sender_address),
                            receiver_name: Set(record.receiver_name),
                            receiver_phone: Set(record.receiver_phone),
                            receiver_province: Set(record.receiver_province),
                            receiver_city: Set(record.receiver_city),
                            receiver_barangay: Set(record.receiver_barangay),
                            receiver_street: Set(record.receiver_street),
                            is_fragile: Set(record.is_fragile),
                            declared_value: Set(record.declared_value),
                            container_no: Set(record.container_no),
                            expected_delivery_date: Set(record.expected_delivery_date),
                            notes: Set(record.delivery_instructions),
                            status: Set(PackageStatus::Incoming),
                            warehouse_id: Set(None),
                            manifest_id: Set(Some(existing.id)),
                            is_archived: Set(false),
                            created_by: Set(Some(actor_id)),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;

                        package_status_log::ActiveModel {
                            package_id: Set(created.id),
                            status: Set(PackageStatus::Incoming),
                            description: Set(format!("Manifested by {}", agent_name)),
                            actor_id: Set(actor_id),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;

                        shipment_package::ActiveModel {
                            shipment_id: Set(created_shipment.id),
                            package_id: Set(created.id),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;
                    }

                    let mut active: manifest::ActiveModel = existing.into();
                    active.status = Set(ManifestStatus::Imported);
                    active.shipment_id = Set(Some(created_shipment.id));
                    let updated_manifest = active.update(txn).await?;

                    Ok((updated_manifest, created_shipment))
                })
            })
            .await?;

        slog::info!(self.logger, "manifest imported";
            "manifest_id" => %manifest_id,
            "shipment_id" => %created_shipment.id,
            "packages" => package_count,
        );
        if let Err(e) = self
            .event_sender
            .send(Event::ManifestImported {
                manifest_id,
                shipment_id: created_shipment.id,
                packages: package_count,
            })
            .await
        {
            warn!("failed to publish ManifestImported: {}", e);
        }

        Ok((updated_manifest, created_shipment))
    }

    async fn find(&self, manifest_id: Uuid) -> Result<manifest::Model, ServiceError> {
        manifest::Entity::find_by_id(manifest_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Manifest {} not found", manifest_id)))
    }

    /// Parses and validates a file. Schema problems reject the whole
    /// batch; address problems come back as per-row errors on the
    /// surviving rows.
    async fn check_file(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<CheckedFile, ServiceError> {
        let sheet = parse_spreadsheet(file_name, bytes)
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;

        let missing = missing_columns(&sheet.headers);
        if !missing.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "manifest is missing required columns: {}",
                missing.join(", ")
            )));
        }
        if sheet.rows.is_empty() {
            return Err(ServiceError::InvalidInput(
                "manifest has no data rows".to_string(),
            ));
        }
        if sheet.rows.len() > self.max_rows {
            return Err(ServiceError::InvalidInput(format!(
                "manifest has {} rows, the limit is {}",
                sheet.rows.len(),
                self.max_rows
            )));
        }

        let total = sheet.rows.len();
        let parsed = validate_rows(&sheet.rows).map_err(|rows| {
            let failed = rows.len();
            ServiceError::ManifestRejected {
                message: format!("{} of {} rows failed schema validation", failed, total),
                rows,
            }
        })?;

        // Tracking numbers must be unique within the file and unknown
        // to the package table; either failure rejects the batch.
        let mut schema_errors: BTreeMap<usize, Vec<FieldError>> = BTreeMap::new();
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for row in &parsed {
            match seen.get(row.record.tracking_number.as_str()) {
                Some(first_row) => {
                    schema_errors.entry(row.row_number).or_default().push(
                        FieldError::new(
                            "Tracking Number",
                            format!("duplicate of row {}", first_row),
                        ),
                    );
                }
                None => {
                    seen.insert(row.record.tracking_number.as_str(), row.row_number);
                }
            }
        }

        let numbers: Vec<String> = seen.keys().map(|s| s.to_string()).collect();
        let existing: HashSet<String> = package::Entity::find()
            .filter(package::Column::TrackingNumber.is_in(numbers))
            .select_only()
            .column(package::Column::TrackingNumber)
            .into_tuple::<String>()
            .all(self.db_pool.as_ref())
            .await?
            .into_iter()
            .collect();
        for row in &parsed {
            if existing.contains(&row.record.tracking_number) {
                schema_errors
                    .entry(row.row_number)
                    .or_default()
                    .push(FieldError::new(
                        "Tracking Number",
                        "is already registered in the system",
                    ));
            }
        }

        if !schema_errors.is_empty() {
            let failed = schema_errors.len();
            let rows = schema_errors
                .into_iter()
                .map(|(row, errors)| RowErrors { row, errors })
                .collect();
            return Err(ServiceError::ManifestRejected {
                message: format!("{} of {} rows failed schema validation", failed, total),
                rows,
            });
        }

        // Address validation does not reject; it blocks import.
        let lookup = AreaLookup::load(self.db_pool.as_ref()).await?;
        let mut blocked_rows = 0;
        let rows = parsed
            .into_iter()
            .map(|row| {
                let errors: Vec<FieldError> = lookup
                    .check(
                        &row.record.receiver_province,
                        &row.record.receiver_city,
                        &row.record.receiver_barangay,
                    )
                    .into_iter()
                    .collect();
                if !errors.is_empty() {
                    blocked_rows += 1;
                }
                CheckedRow {
                    row_number: row.row_number,
                    record: row.record,
                    errors,
                }
            })
            .collect();

        Ok(CheckedFile { rows, blocked_rows })
    }
}

async fn insert_rows<C: sea_orm::ConnectionTrait>(
    conn: &C,
    manifest_id: Uuid,
    rows: Vec<CheckedRow>,
) -> Result<(), ServiceError> {
    for row in rows {
        let payload = serde_json::to_string(&row.record)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        let validation_errors = if row.errors.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&row.errors)
                    .map_err(|e| ServiceError::SerializationError(e.to_string()))?,
            )
        };

        manifest_row::ActiveModel {
            manifest_id: Set(manifest_id),
            row_number: Set(row.row_number as i32),
            tracking_number: Set(row.record.tracking_number),
            payload: Set(payload),
            validation_errors: Set(validation_errors),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

fn row_view(row: manifest_row::Model) -> Result<ManifestRowView, ServiceError> {
    let record = serde_json::from_str(&row.payload)
        .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
    let errors = match row.validation_errors.as_deref() {
        Some(json) => serde_json::from_str(json)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?,
        None => Vec::new(),
    };
    Ok(ManifestRowView {
        row_number: row.row_number,
        tracking_number: row.tracking_number,
        record,
        errors,
    })
}
