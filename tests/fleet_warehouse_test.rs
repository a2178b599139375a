//! Integration tests for fleet and warehouse administration:
//! capacity-range validation, plate/name uniqueness, maintenance and
//! archive rules, and the warehouse utilization readout.

mod common;

use axum::{body, http::Method, response::Response};
use common::TestApp;
use freightdesk_api::entities::vehicle::VehicleType;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Decimal fields serialize as strings; compare them numerically so
/// trailing zeros never matter.
fn dec_f64(value: &Value) -> f64 {
    value
        .as_str()
        .expect("decimal string")
        .parse()
        .expect("decimal value")
}

fn vehicle_payload(plate: &str, vehicle_type: &str, capacity: &str) -> Value {
    json!({
        "plate_number": plate,
        "name": "Test Unit",
        "vehicle_type": vehicle_type,
        "weight_capacity_kg": capacity,
        "is_express": false
    })
}

fn warehouse_payload(name: &str, weight: &str, volume: &str, target_pct: i32) -> Value {
    json!({
        "name": name,
        "province": "Metro Manila",
        "city": "Quezon City",
        "barangay": "Bagumbayan",
        "street": "12 Industria Ave",
        "weight_capacity_kg": weight,
        "volume_capacity_m3": volume,
        "target_utilization_pct": target_pct
    })
}

// ==================== Vehicle Tests ====================

#[tokio::test]
async fn vehicle_capacity_must_fit_its_type() {
    let app = TestApp::new().await;

    let too_big = app
        .request_authenticated(
            Method::POST,
            "/api/v1/vehicles",
            Some(vehicle_payload("VAN-9001", "VAN", "2000")),
        )
        .await;
    assert_eq!(too_big.status(), 400);
    let body = response_json(too_big).await;
    assert!(body["message"].as_str().unwrap().contains("between"));

    let too_small = app
        .request_authenticated(
            Method::POST,
            "/api/v1/vehicles",
            Some(vehicle_payload("TRK-9001", "TRUCK", "900")),
        )
        .await;
    assert_eq!(too_small.status(), 400);

    // The range is inclusive at both ends
    let van_max = app
        .request_authenticated(
            Method::POST,
            "/api/v1/vehicles",
            Some(vehicle_payload("VAN-9002", "VAN", "1500")),
        )
        .await;
    assert_eq!(van_max.status(), 200);

    let truck_min = app
        .request_authenticated(
            Method::POST,
            "/api/v1/vehicles",
            Some(vehicle_payload("TRK-9002", "TRUCK", "1000")),
        )
        .await;
    assert_eq!(truck_min.status(), 200);
}

#[tokio::test]
async fn plate_numbers_are_normalized_and_unique() {
    let app = TestApp::new().await;

    let created = app
        .request_authenticated(
            Method::POST,
            "/api/v1/vehicles",
            Some(vehicle_payload("  ncr-1482  ", "VAN", "800")),
        )
        .await;
    assert_eq!(created.status(), 200);
    let body = response_json(created).await;
    assert_eq!(body["data"]["plate_number"], "NCR-1482");

    // Same plate in any casing collides
    let duplicate = app
        .request_authenticated(
            Method::POST,
            "/api/v1/vehicles",
            Some(vehicle_payload("NCR-1482", "TRUCK", "5000")),
        )
        .await;
    assert_eq!(duplicate.status(), 409);
}

#[tokio::test]
async fn assignable_filter_tracks_maintenance() {
    let app = TestApp::new().await;
    let first = app
        .seed_vehicle("FLT-0001", VehicleType::Van, dec!(800), false)
        .await;
    app.seed_vehicle("FLT-0002", VehicleType::Van, dec!(800), false)
        .await;

    let flagged = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/vehicles/{}/maintenance", first.id),
            Some(json!({ "in_maintenance": true })),
        )
        .await;
    assert_eq!(flagged.status(), 200);
    assert_eq!(response_json(flagged).await["data"]["in_maintenance"], true);

    let assignable = app
        .request_authenticated(Method::GET, "/api/v1/vehicles?assignable=true", None)
        .await;
    let body = response_json(assignable).await;
    let plates: Vec<&str> = body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["plate_number"].as_str().unwrap())
        .collect();
    assert!(!plates.contains(&"FLT-0001"));
    assert!(plates.contains(&"FLT-0002"));

    // Back from the shop
    app.request_authenticated(
        Method::POST,
        &format!("/api/v1/vehicles/{}/maintenance", first.id),
        Some(json!({ "in_maintenance": false })),
    )
    .await;
    let assignable = app
        .request_authenticated(Method::GET, "/api/v1/vehicles?assignable=true", None)
        .await;
    let body = response_json(assignable).await;
    assert_eq!(body["data"]["total"], 2);
}

#[tokio::test]
async fn vehicles_with_history_archive_instead_of_delete() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse("Metro Hub").await;
    let vehicle = app
        .seed_vehicle("FLT-0003", VehicleType::Van, dec!(800), false)
        .await;
    let driver = app.seed_driver("driver20@test.local").await;
    let package = app
        .seed_sorting_package("PKG-VDEL-001", warehouse.id, dec!(10), dec!(0.05))
        .await;

    let scheduled = app
        .request_authenticated(
            Method::POST,
            "/api/v1/deliveries",
            Some(json!({
                "origin_warehouse_id": warehouse.id,
                "vehicle_id": vehicle.id,
                "driver_id": driver.id,
                "selection": { "mode": "manual", "package_ids": [package.id] }
            })),
        )
        .await;
    assert_eq!(scheduled.status(), 200);

    // Deletion is blocked by shipment history; archiving is the way out
    let delete = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/vehicles/{}", vehicle.id),
            None,
        )
        .await;
    assert_eq!(delete.status(), 409);

    let archive = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/vehicles/{}/archive", vehicle.id),
            None,
        )
        .await;
    assert_eq!(archive.status(), 200);
    assert_eq!(response_json(archive).await["data"]["is_archived"], true);

    // A vehicle that never carried anything deletes outright
    let fresh = app
        .seed_vehicle("FLT-0004", VehicleType::Van, dec!(800), false)
        .await;
    let delete = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/vehicles/{}", fresh.id),
            None,
        )
        .await;
    assert_eq!(delete.status(), 200);

    let gone = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/vehicles/{}", fresh.id),
            None,
        )
        .await;
    assert_eq!(gone.status(), 404);
}

#[tokio::test]
async fn archived_vehicles_cannot_be_edited() {
    let app = TestApp::new().await;
    let vehicle = app
        .seed_vehicle("FLT-0005", VehicleType::Van, dec!(800), false)
        .await;

    app.request_authenticated(
        Method::POST,
        &format!("/api/v1/vehicles/{}/archive", vehicle.id),
        None,
    )
    .await;

    let update = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/vehicles/{}", vehicle.id),
            Some(json!({ "name": "Renamed Unit" })),
        )
        .await;
    assert_eq!(update.status(), 400);

    app.request_authenticated(
        Method::POST,
        &format!("/api/v1/vehicles/{}/unarchive", vehicle.id),
        None,
    )
    .await;

    let update = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/vehicles/{}", vehicle.id),
            Some(json!({ "name": "Renamed Unit" })),
        )
        .await;
    assert_eq!(update.status(), 200);
    assert_eq!(response_json(update).await["data"]["name"], "Renamed Unit");
}

// ==================== Warehouse Tests ====================

#[tokio::test]
async fn warehouse_capacities_and_target_are_validated() {
    let app = TestApp::new().await;

    let zero_weight = app
        .request_authenticated(
            Method::POST,
            "/api/v1/warehouses",
            Some(warehouse_payload("Bad Hub", "0", "500", 80)),
        )
        .await;
    assert_eq!(zero_weight.status(), 400);

    let zero_target = app
        .request_authenticated(
            Method::POST,
            "/api/v1/warehouses",
            Some(warehouse_payload("Bad Hub", "10000", "500", 0)),
        )
        .await;
    assert_eq!(zero_target.status(), 400);

    let over_target = app
        .request_authenticated(
            Method::POST,
            "/api/v1/warehouses",
            Some(warehouse_payload("Bad Hub", "10000", "500", 101)),
        )
        .await;
    assert_eq!(over_target.status(), 400);

    let full_target = app
        .request_authenticated(
            Method::POST,
            "/api/v1/warehouses",
            Some(warehouse_payload("Full Hub", "10000", "500", 100)),
        )
        .await;
    assert_eq!(full_target.status(), 200);
    let body = response_json(full_target).await;
    assert_eq!(body["data"]["target_utilization_pct"], 100);
}

#[tokio::test]
async fn warehouse_names_stay_unique() {
    let app = TestApp::new().await;

    let first = app
        .request_authenticated(
            Method::POST,
            "/api/v1/warehouses",
            Some(warehouse_payload("Pasig Hub", "10000", "500", 80)),
        )
        .await;
    assert_eq!(first.status(), 200);

    let second = app
        .request_authenticated(
            Method::POST,
            "/api/v1/warehouses",
            Some(warehouse_payload("Pasig Hub", "8000", "400", 70)),
        )
        .await;
    assert_eq!(second.status(), 409);
}

#[tokio::test]
async fn utilization_tracks_stored_freight() {
    let app = TestApp::new().await;
    let warehouse = app
        .seed_warehouse_with_capacity("Cavite Hub", dec!(1000), dec!(100))
        .await;
    app.seed_package("PKG-UTL-001", Some(warehouse.id), dec!(70), dec!(0.4))
        .await;
    app.seed_package("PKG-UTL-002", Some(warehouse.id), dec!(60), dec!(0.3))
        .await;
    let archived = app
        .seed_package("PKG-UTL-003", Some(warehouse.id), dec!(50), dec!(0.2))
        .await;
    app.request_authenticated(
        Method::POST,
        &format!("/api/v1/packages/{}/archive", archived.id),
        None,
    )
    .await;

    let response = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/warehouses/{}/utilization", warehouse.id),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    let data = &body["data"];
    assert_eq!(data["name"], "Cavite Hub");
    assert_eq!(data["target_utilization_pct"], 80);
    // Archived freight does not count toward the fill level
    assert_eq!(data["stored_package_count"], 2);
    assert_eq!(dec_f64(&data["stored_weight_kg"]), 130.0);
    assert_eq!(dec_f64(&data["stored_volume_m3"]), 0.7);
    assert_eq!(dec_f64(&data["weight_capacity_kg"]), 1000.0);
    assert_eq!(dec_f64(&data["effective_weight_limit_kg"]), 800.0);
    assert_eq!(dec_f64(&data["effective_volume_limit_m3"]), 80.0);
}

#[tokio::test]
async fn stocked_warehouses_cannot_be_archived() {
    let app = TestApp::new().await;
    let stocked = app.seed_warehouse("Stocked Hub").await;
    app.seed_package("PKG-ARW-001", Some(stocked.id), dec!(5), dec!(0.02))
        .await;

    let refused = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/warehouses/{}/archive", stocked.id),
            None,
        )
        .await;
    assert_eq!(refused.status(), 409);

    let empty = app.seed_warehouse("Empty Hub").await;
    let archived = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/warehouses/{}/archive", empty.id),
            None,
        )
        .await;
    assert_eq!(archived.status(), 200);
    assert_eq!(response_json(archived).await["data"]["is_archived"], true);

    // Archived facilities are read-only until restored
    let update = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/warehouses/{}", empty.id),
            Some(json!({ "phone": "+63-2-5550123" })),
        )
        .await;
    assert_eq!(update.status(), 400);

    let restored = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/warehouses/{}/unarchive", empty.id),
            None,
        )
        .await;
    assert_eq!(restored.status(), 200);
    assert_eq!(response_json(restored).await["data"]["is_archived"], false);
}
