//! Status workflow engine for packages and shipments.
//!
//! Every status change in the system goes through this module so that
//! the two-row contract holds: the status column update and exactly one
//! append-only status-log row commit together. The functions are
//! generic over [`ConnectionTrait`], so callers hand in either the pool
//! (single-step changes) or an open transaction (multi-entity
//! operations like dispatch, acceptance, or manifest import). If the
//! log insert fails, the status update rolls back with it; there are no
//! retries.

use sea_orm::{ActiveModelTrait, ActiveValue::Set, ConnectionTrait, EntityTrait};
use tracing::info;
use uuid::Uuid;

use crate::entities::package::{self, PackageStatus};
use crate::entities::shipment::{self, ShipmentStatus};
use crate::entities::{package_status_log, shipment_status_log};
use crate::errors::ServiceError;

/// Validates a package transition against the legal-transition table.
/// Same-status updates are rejected so the audit trail never carries
/// no-op rows.
pub fn ensure_package_transition(
    from: PackageStatus,
    to: PackageStatus,
) -> Result<(), ServiceError> {
    if from == to {
        return Err(ServiceError::InvalidOperation(format!(
            "package is already in status {from}"
        )));
    }
    if !from.can_transition_to(to) {
        return Err(ServiceError::InvalidOperation(format!(
            "cannot move package from {from} to {to}"
        )));
    }
    Ok(())
}

pub fn ensure_shipment_transition(
    from: ShipmentStatus,
    to: ShipmentStatus,
) -> Result<(), ServiceError> {
    if from == to {
        return Err(ServiceError::InvalidOperation(format!(
            "shipment is already in status {from}"
        )));
    }
    if !from.can_transition_to(to) {
        return Err(ServiceError::InvalidOperation(format!(
            "cannot move shipment from {from} to {to}"
        )));
    }
    Ok(())
}

/// Applies a validated status change to a package and appends its log
/// row on the same connection.
pub async fn set_package_status<C>(
    conn: &C,
    package: package::Model,
    new_status: PackageStatus,
    description: impl Into<String>,
    actor_id: Uuid,
) -> Result<package::Model, ServiceError>
where
    C: ConnectionTrait,
{
    ensure_package_transition(package.status, new_status)?;

    let package_id = package.id;
    let old_status = package.status;

    let mut active: package::ActiveModel = package.into();
    active.status = Set(new_status);
    let updated = active.update(conn).await?;

    let log = package_status_log::ActiveModel {
        package_id: Set(package_id),
        status: Set(new_status),
        description: Set(description.into()),
        actor_id: Set(actor_id),
        ..Default::default()
    };
    log.insert(conn).await?;

    info!(
        package_id = %package_id,
        from = %old_status,
        to = %new_status,
        "package status changed"
    );

    Ok(updated)
}

/// Fetches a package by id and applies [`set_package_status`].
pub async fn transition_package_by_id<C>(
    conn: &C,
    package_id: Uuid,
    new_status: PackageStatus,
    description: impl Into<String>,
    actor_id: Uuid,
) -> Result<package::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let package = package::Entity::find_by_id(package_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Package {package_id} not found")))?;

    set_package_status(conn, package, new_status, description, actor_id).await
}

/// Applies a validated status change to a shipment and appends its log
/// row on the same connection.
pub async fn set_shipment_status<C>(
    conn: &C,
    shipment: shipment::Model,
    new_status: ShipmentStatus,
    description: impl Into<String>,
    actor_id: Uuid,
) -> Result<shipment::Model, ServiceError>
where
    C: ConnectionTrait,
{
    ensure_shipment_transition(shipment.status, new_status)?;

    let shipment_id = shipment.id;
    let old_status = shipment.status;

    let mut active: shipment::ActiveModel = shipment.into();
    active.status = Set(new_status);
    let updated = active.update(conn).await?;

    let log = shipment_status_log::ActiveModel {
        shipment_id: Set(shipment_id),
        status: Set(new_status),
        description: Set(description.into()),
        actor_id: Set(actor_id),
        ..Default::default()
    };
    log.insert(conn).await?;

    info!(
        shipment_id = %shipment_id,
        from = %old_status,
        to = %new_status,
        "shipment status changed"
    );

    Ok(updated)
}

/// Fetches a shipment by id and applies [`set_shipment_status`].
pub async fn transition_shipment_by_id<C>(
    conn: &C,
    shipment_id: Uuid,
    new_status: ShipmentStatus,
    description: impl Into<String>,
    actor_id: Uuid,
) -> Result<shipment::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let shipment = shipment::Entity::find_by_id(shipment_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Shipment {shipment_id} not found")))?;

    set_shipment_status(conn, shipment, new_status, description, actor_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use test_case::test_case;

    #[test_case(PackageStatus::Incoming, PackageStatus::InWarehouse => true; "incoming arrives")]
    #[test_case(PackageStatus::InWarehouse, PackageStatus::Sorting => true; "into sorting")]
    #[test_case(PackageStatus::Sorting, PackageStatus::Delivering => true; "out for delivery")]
    #[test_case(PackageStatus::Sorting, PackageStatus::TransferringWarehouse => true; "staged for transfer")]
    #[test_case(PackageStatus::TransferringWarehouse, PackageStatus::Shipping => true; "transfer dispatched")]
    #[test_case(PackageStatus::Shipping, PackageStatus::InWarehouse => true; "transfer arrived")]
    #[test_case(PackageStatus::Delivering, PackageStatus::Delivered => true; "delivered")]
    #[test_case(PackageStatus::Delivering, PackageStatus::Sorting => true; "failed attempt returns to pool")]
    #[test_case(PackageStatus::TransferringForwarder, PackageStatus::TransferredForwarder => true; "forwarder handoff confirmed")]
    #[test_case(PackageStatus::Incoming, PackageStatus::Delivered => false; "no skipping to delivered")]
    #[test_case(PackageStatus::Incoming, PackageStatus::Sorting => false; "incoming must be received first")]
    #[test_case(PackageStatus::Delivered, PackageStatus::Sorting => false; "delivered is terminal")]
    #[test_case(PackageStatus::TransferredForwarder, PackageStatus::InWarehouse => false; "transferred is terminal")]
    #[test_case(PackageStatus::Shipping, PackageStatus::Delivering => false; "transit cannot fan out to recipients")]
    fn package_transition_table(from: PackageStatus, to: PackageStatus) -> bool {
        from.can_transition_to(to)
    }

    #[test_case(ShipmentStatus::Preparing, ShipmentStatus::InTransit => true; "dispatch")]
    #[test_case(ShipmentStatus::Preparing, ShipmentStatus::Cancelled => true; "cancel before dispatch")]
    #[test_case(ShipmentStatus::InTransit, ShipmentStatus::Arrived => true; "arrival")]
    #[test_case(ShipmentStatus::InTransit, ShipmentStatus::Completed => true; "delivery completes directly")]
    #[test_case(ShipmentStatus::Arrived, ShipmentStatus::Completed => true; "accepted")]
    #[test_case(ShipmentStatus::Preparing, ShipmentStatus::Completed => false; "cannot complete undeparted")]
    #[test_case(ShipmentStatus::Completed, ShipmentStatus::InTransit => false; "completed is terminal")]
    #[test_case(ShipmentStatus::Cancelled, ShipmentStatus::Preparing => false; "cancelled is terminal")]
    fn shipment_transition_table(from: ShipmentStatus, to: ShipmentStatus) -> bool {
        from.can_transition_to(to)
    }

    #[test]
    fn same_status_is_rejected_not_logged() {
        let err = ensure_package_transition(PackageStatus::Sorting, PackageStatus::Sorting)
            .expect_err("same-status update must be rejected");
        assert_matches!(err, ServiceError::InvalidOperation(msg) => {
            assert!(msg.contains("already"), "got: {msg}");
        });
    }

    #[test]
    fn illegal_jump_names_both_statuses() {
        let err = ensure_package_transition(PackageStatus::Incoming, PackageStatus::Delivered)
            .expect_err("INCOMING -> DELIVERED must be rejected");
        assert_matches!(err, ServiceError::InvalidOperation(msg) => {
            assert!(msg.contains("INCOMING"), "got: {msg}");
            assert!(msg.contains("DELIVERED"), "got: {msg}");
        });
    }

    #[test]
    fn terminal_statuses() {
        assert!(PackageStatus::Delivered.is_terminal());
        assert!(PackageStatus::TransferredForwarder.is_terminal());
        assert!(!PackageStatus::Sorting.is_terminal());
        assert!(ShipmentStatus::Completed.is_terminal());
        assert!(ShipmentStatus::Cancelled.is_terminal());
        assert!(!ShipmentStatus::Arrived.is_terminal());
    }
}
