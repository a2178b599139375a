// Package intake and lifecycle
pub mod packages;

// Shipment scheduling, one module per kind
pub mod deliveries;
pub mod incoming;
pub mod transfers;

// Fleet and facilities
pub mod vehicles;
pub mod warehouses;

// Accounts
pub mod users;

// Manifest uploads and the service-area gazetteer
pub mod manifests;
pub mod service_areas;

// Public tracking lookups
pub mod tracking;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, JoinType, QueryFilter, QuerySelect};
use sea_orm::{FromQueryResult, RelationTrait};
use uuid::Uuid;

use crate::entities::package::{self, PackageStatus};
use crate::entities::shipment::{ShipmentKind, ShipmentStatus};
use crate::entities::{shipment, shipment_package};
use crate::errors::ServiceError;

/// Generates a human-facing shipment reference, e.g. `DLV-7F3A21C9`.
pub(crate) fn new_reference(kind: ShipmentKind) -> String {
    let tail = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("{}-{}", kind.reference_prefix(), tail)
}

/// Shipment statuses that keep their member packages off the selection
/// pools.
pub(crate) const ACTIVE_SHIPMENT_STATUSES: [ShipmentStatus; 3] = [
    ShipmentStatus::Preparing,
    ShipmentStatus::InTransit,
    ShipmentStatus::Arrived,
];

/// Ids of packages currently sitting on a live shipment. A package may
/// be on at most one live shipment; selection queries exclude these.
pub(crate) async fn busy_package_ids<C: ConnectionTrait>(
    conn: &C,
) -> Result<Vec<Uuid>, ServiceError> {
    let ids = shipment_package::Entity::find()
        .join(JoinType::InnerJoin, shipment_package::Relation::Shipment.def())
        .filter(shipment::Column::Status.is_in(ACTIVE_SHIPMENT_STATUSES))
        .select_only()
        .column(shipment_package::Column::PackageId)
        .into_tuple::<Uuid>()
        .all(conn)
        .await?;
    Ok(ids)
}

/// Ids of the packages joined to one shipment.
pub(crate) async fn member_package_ids<C: ConnectionTrait>(
    conn: &C,
    shipment_id: Uuid,
) -> Result<Vec<Uuid>, ServiceError> {
    let ids = shipment_package::Entity::find()
        .filter(shipment_package::Column::ShipmentId.eq(shipment_id))
        .select_only()
        .column(shipment_package::Column::PackageId)
        .into_tuple::<Uuid>()
        .all(conn)
        .await?;
    Ok(ids)
}

/// Package statuses counted as physically present in a warehouse.
pub(crate) const STORED_PACKAGE_STATUSES: [PackageStatus; 3] = [
    PackageStatus::InWarehouse,
    PackageStatus::Sorting,
    PackageStatus::TransferringWarehouse,
];

#[derive(Debug, FromQueryResult)]
struct StoredTotals {
    weight: Option<Decimal>,
    volume: Option<Decimal>,
}

/// Total weight and volume currently stored at a warehouse. SUM over
/// zero rows is NULL, which reads back as zero here.
pub(crate) async fn stored_totals<C: ConnectionTrait>(
    conn: &C,
    warehouse_id: Uuid,
) -> Result<(Decimal, Decimal), ServiceError> {
    let totals = package::Entity::find()
        .filter(package::Column::WarehouseId.eq(warehouse_id))
        .filter(package::Column::Status.is_in(STORED_PACKAGE_STATUSES))
        .filter(package::Column::IsArchived.eq(false))
        .select_only()
        .column_as(package::Column::WeightKg.sum(), "weight")
        .column_as(package::Column::VolumeM3.sum(), "volume")
        .into_model::<StoredTotals>()
        .one(conn)
        .await?;

    Ok(totals
        .map(|t| (t.weight.unwrap_or_default(), t.volume.unwrap_or_default()))
        .unwrap_or((Decimal::ZERO, Decimal::ZERO)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_carry_the_kind_prefix() {
        assert!(new_reference(ShipmentKind::Delivery).starts_with("DLV-"));
        assert!(new_reference(ShipmentKind::Incoming).starts_with("INC-"));
        assert!(new_reference(ShipmentKind::WarehouseTransfer).starts_with("TRF-"));

        let reference = new_reference(ShipmentKind::Delivery);
        let tail = reference.strip_prefix("DLV-").unwrap();
        assert_eq!(tail.len(), 8);
        assert!(tail.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
