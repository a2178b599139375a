use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// The events the system emits after state changes are committed. Delivery is
// best-effort: a dropped event never rolls back the write that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Package events
    PackageCreated(Uuid),
    PackageStatusChanged {
        package_id: Uuid,
        old_status: String,
        new_status: String,
    },
    PackageArchived(Uuid),
    PackageUnarchived(Uuid),
    PackageDeleted(Uuid),

    // Shipment events
    ShipmentCreated {
        shipment_id: Uuid,
        kind: String,
    },
    ShipmentStatusChanged {
        shipment_id: Uuid,
        old_status: String,
        new_status: String,
    },
    ShipmentCancelled(Uuid),

    // Manifest events
    ManifestUploaded {
        manifest_id: Uuid,
        rows: usize,
        blocked_rows: usize,
    },
    ManifestImported {
        manifest_id: Uuid,
        shipment_id: Uuid,
        packages: usize,
    },

    // Fleet events
    VehicleMaintenanceChanged {
        vehicle_id: Uuid,
        in_maintenance: bool,
    },

    // User events
    UserCreated(Uuid),
}

// Consumes the event channel and reacts to each event. Currently the
// reactions are log lines and metrics counters; webhook fan-out would hang
// off this loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::PackageStatusChanged {
                package_id,
                ref old_status,
                ref new_status,
            } => {
                counter!("freightdesk_events.package_status_changes", 1);
                info!(
                    "Package {} moved from {} to {}",
                    package_id, old_status, new_status
                );
            }
            Event::ShipmentStatusChanged {
                shipment_id,
                ref old_status,
                ref new_status,
            } => {
                counter!("freightdesk_events.shipment_status_changes", 1);
                info!(
                    "Shipment {} moved from {} to {}",
                    shipment_id, old_status, new_status
                );
            }
            Event::ManifestUploaded {
                manifest_id,
                rows,
                blocked_rows,
            } => {
                if let Err(e) = handle_manifest_uploaded(manifest_id, rows, blocked_rows).await {
                    warn!(
                        "Failed to handle manifest uploaded event: manifest_id={}, error={}",
                        manifest_id, e
                    );
                }
            }
            Event::ManifestImported {
                manifest_id,
                shipment_id,
                packages,
            } => {
                counter!("freightdesk_events.manifests_imported", 1);
                info!(
                    "Manifest {} imported as shipment {} with {} packages",
                    manifest_id, shipment_id, packages
                );
            }
            Event::VehicleMaintenanceChanged {
                vehicle_id,
                in_maintenance,
            } => {
                if in_maintenance {
                    warn!("Vehicle {} entered maintenance", vehicle_id);
                } else {
                    info!("Vehicle {} left maintenance", vehicle_id);
                }
            }
            other => {
                info!("No specific handler for event: {:?}", other);
            }
        }
    }

    warn!("Event processing loop has ended");
}

async fn handle_manifest_uploaded(
    manifest_id: Uuid,
    rows: usize,
    blocked_rows: usize,
) -> Result<(), String> {
    counter!("freightdesk_events.manifests_uploaded", 1);

    if blocked_rows > 0 {
        warn!(
            "Manifest {} uploaded with {} of {} rows blocked by address validation",
            manifest_id, blocked_rows, rows
        );
    } else {
        info!("Manifest {} uploaded with {} clean rows", manifest_id, rows);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_delivers_to_the_loop() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        let package_id = Uuid::new_v4();
        sender
            .send(Event::PackageCreated(package_id))
            .await
            .unwrap();

        match rx.recv().await {
            Some(Event::PackageCreated(id)) => assert_eq!(id, package_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_after_receiver_drops() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let sender = EventSender::new(tx);
        let result = sender.send(Event::PackageCreated(Uuid::new_v4())).await;
        assert!(result.is_err());
    }
}
