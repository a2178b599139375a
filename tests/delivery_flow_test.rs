//! End-to-end tests for delivery runs.
//!
//! Tests cover:
//! - Manual scheduling with capacity enforcement
//! - The load-summary preview endpoint
//! - Greedy auto-selection from the sorting pool
//! - Dispatch, completion with mixed outcomes, and cancellation
//! - Vehicle and driver eligibility checks

mod common;

use axum::{body, http::Method, response::Response};
use common::TestApp;
use freightdesk_api::entities::package::ShippingType;
use freightdesk_api::entities::vehicle::VehicleType;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

// ==================== Scheduling Tests ====================

#[tokio::test]
async fn manual_selection_schedules_a_delivery() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse("Metro Hub").await;
    let vehicle = app
        .seed_vehicle("NAB-1201", VehicleType::Van, dec!(800), false)
        .await;
    let driver = app.seed_driver("driver1@test.local").await;
    let first = app
        .seed_sorting_package("PKG-DLV-001", warehouse.id, dec!(10), dec!(0.05))
        .await;
    let second = app
        .seed_sorting_package("PKG-DLV-002", warehouse.id, dec!(20), dec!(0.08))
        .await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/deliveries",
            Some(json!({
                "origin_warehouse_id": warehouse.id,
                "vehicle_id": vehicle.id,
                "driver_id": driver.id,
                "selection": { "mode": "manual", "package_ids": [first.id, second.id] }
            })),
        )
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["data"]["shipment"]["kind"], "DELIVERY");
    assert_eq!(body["data"]["shipment"]["status"], "PREPARING");
    assert_eq!(body["data"]["packages"].as_array().unwrap().len(), 2);

    // Members leave the sorting pool only on dispatch for deliveries;
    // they must still not be schedulable twice.
    let again = app
        .request_authenticated(
            Method::POST,
            "/api/v1/deliveries",
            Some(json!({
                "origin_warehouse_id": warehouse.id,
                "vehicle_id": vehicle.id,
                "driver_id": driver.id,
                "selection": { "mode": "manual", "package_ids": [first.id] }
            })),
        )
        .await;
    assert_eq!(again.status(), 409);
}

#[tokio::test]
async fn manual_over_capacity_is_rejected() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse("Metro Hub").await;
    let vehicle = app
        .seed_vehicle("NAB-1202", VehicleType::Van, dec!(100), false)
        .await;
    let driver = app.seed_driver("driver2@test.local").await;
    let heavy = app
        .seed_sorting_package("PKG-HVY-001", warehouse.id, dec!(90), dec!(0.5))
        .await;
    let heavier = app
        .seed_sorting_package("PKG-HVY-002", warehouse.id, dec!(30), dec!(0.5))
        .await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/deliveries",
            Some(json!({
                "origin_warehouse_id": warehouse.id,
                "vehicle_id": vehicle.id,
                "driver_id": driver.id,
                "selection": { "mode": "manual", "package_ids": [heavy.id, heavier.id] }
            })),
        )
        .await;
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn express_packages_need_express_vehicles() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse("Metro Hub").await;
    let plain_van = app
        .seed_vehicle("NAB-1203", VehicleType::Van, dec!(800), false)
        .await;
    let driver = app.seed_driver("driver3@test.local").await;
    let express = app
        .seed_sorting_package_of_type(
            "PKG-EXP-001",
            warehouse.id,
            dec!(5),
            dec!(0.02),
            ShippingType::Express,
        )
        .await;

    let manual = app
        .request_authenticated(
            Method::POST,
            "/api/v1/deliveries",
            Some(json!({
                "origin_warehouse_id": warehouse.id,
                "vehicle_id": plain_van.id,
                "driver_id": driver.id,
                "selection": { "mode": "manual", "package_ids": [express.id] }
            })),
        )
        .await;
    assert_eq!(manual.status(), 400);

    // Auto mode quietly leaves express freight behind instead
    let standard = app
        .seed_sorting_package("PKG-EXP-002", warehouse.id, dec!(5), dec!(0.02))
        .await;
    let auto = app
        .request_authenticated(
            Method::POST,
            "/api/v1/deliveries",
            Some(json!({
                "origin_warehouse_id": warehouse.id,
                "vehicle_id": plain_van.id,
                "driver_id": driver.id,
                "selection": { "mode": "auto" }
            })),
        )
        .await;
    assert_eq!(auto.status(), 200);
    let picked = response_json(auto).await;
    let trackings: Vec<String> = picked["data"]["packages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["tracking_number"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(trackings, vec![standard.tracking_number.clone()]);
}

#[tokio::test]
async fn auto_selection_fills_greedily_and_skips_overflow() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse("Metro Hub").await;
    let vehicle = app
        .seed_vehicle("NAB-1204", VehicleType::Van, dec!(100), false)
        .await;
    let driver = app.seed_driver("driver4@test.local").await;

    // 60 + 50 overflows at the second, 30 still fits after skipping it
    app.seed_sorting_package("PKG-AUT-001", warehouse.id, dec!(60), dec!(0.1))
        .await;
    app.seed_sorting_package("PKG-AUT-002", warehouse.id, dec!(50), dec!(0.1))
        .await;
    app.seed_sorting_package("PKG-AUT-003", warehouse.id, dec!(30), dec!(0.1))
        .await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/deliveries",
            Some(json!({
                "origin_warehouse_id": warehouse.id,
                "vehicle_id": vehicle.id,
                "driver_id": driver.id,
                "selection": { "mode": "auto" }
            })),
        )
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    let picked: Vec<&str> = body["data"]["packages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["tracking_number"].as_str().unwrap())
        .collect();
    assert_eq!(picked, vec!["PKG-AUT-001", "PKG-AUT-003"]);
}

// ==================== Load Summary Tests ====================

#[tokio::test]
async fn load_summary_flags_overweight_selections() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse("Metro Hub").await;
    let vehicle = app
        .seed_vehicle("NAB-1205", VehicleType::Van, dec!(100), false)
        .await;
    let a = app
        .seed_sorting_package("PKG-SUM-001", warehouse.id, dec!(70), dec!(0.1))
        .await;
    let b = app
        .seed_sorting_package("PKG-SUM-002", warehouse.id, dec!(60), dec!(0.1))
        .await;

    let overweight = app
        .request_authenticated(
            Method::POST,
            "/api/v1/deliveries/load-summary",
            Some(json!({ "package_ids": [a.id, b.id], "vehicle_id": vehicle.id })),
        )
        .await;
    assert_eq!(overweight.status(), 200);
    let body = response_json(overweight).await;
    assert_eq!(body["data"]["total_weight_kg"], "130");
    assert_eq!(body["data"]["exceeded"], true);

    // Without a vehicle the capacity column reads unknown
    let unknown = app
        .request_authenticated(
            Method::POST,
            "/api/v1/deliveries/load-summary",
            Some(json!({ "package_ids": [a.id] })),
        )
        .await;
    let unknown_body = response_json(unknown).await;
    assert_eq!(unknown_body["data"]["capacity_kg"], Value::Null);
    assert_eq!(unknown_body["data"]["exceeded"], Value::Null);
}

// ==================== Dispatch / Complete / Cancel Tests ====================

#[tokio::test]
async fn full_run_dispatch_complete_with_mixed_outcomes() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse("Metro Hub").await;
    let vehicle = app
        .seed_vehicle("NAB-1206", VehicleType::Van, dec!(800), false)
        .await;
    let driver = app.seed_driver("driver5@test.local").await;
    let delivered = app
        .seed_sorting_package("PKG-RUN-001", warehouse.id, dec!(10), dec!(0.05))
        .await;
    let returned = app
        .seed_sorting_package("PKG-RUN-002", warehouse.id, dec!(15), dec!(0.05))
        .await;

    let create = app
        .request_authenticated(
            Method::POST,
            "/api/v1/deliveries",
            Some(json!({
                "origin_warehouse_id": warehouse.id,
                "vehicle_id": vehicle.id,
                "driver_id": driver.id,
                "selection": { "mode": "manual", "package_ids": [delivered.id, returned.id] }
            })),
        )
        .await;
    let shipment_id = response_json(create).await["data"]["shipment"]["id"]
        .as_str()
        .expect("shipment id")
        .to_string();

    // Dispatch: shipment IN_TRANSIT, members DELIVERING
    let dispatch = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/deliveries/{}/dispatch", shipment_id),
            None,
        )
        .await;
    assert_eq!(dispatch.status(), 200);
    assert_eq!(
        response_json(dispatch).await["data"]["status"],
        "IN_TRANSIT"
    );

    let member = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/packages/{}", delivered.id),
            None,
        )
        .await;
    assert_eq!(response_json(member).await["data"]["status"], "DELIVERING");

    // Dispatching twice is not legal
    let re_dispatch = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/deliveries/{}/dispatch", shipment_id),
            None,
        )
        .await;
    assert_eq!(re_dispatch.status(), 400);

    // Complete with one failure: that package returns to sorting
    let complete = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/deliveries/{}/complete", shipment_id),
            Some(json!({
                "outcomes": [
                    { "package_id": delivered.id, "delivered": true },
                    { "package_id": returned.id, "delivered": false }
                ]
            })),
        )
        .await;
    assert_eq!(complete.status(), 200);
    assert_eq!(response_json(complete).await["data"]["status"], "COMPLETED");

    let done = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/packages/{}", delivered.id),
            None,
        )
        .await;
    assert_eq!(response_json(done).await["data"]["status"], "DELIVERED");

    let back = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/packages/{}", returned.id),
            None,
        )
        .await;
    assert_eq!(response_json(back).await["data"]["status"], "SORTING");
}

#[tokio::test]
async fn completion_requires_an_outcome_per_member() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse("Metro Hub").await;
    let vehicle = app
        .seed_vehicle("NAB-1207", VehicleType::Van, dec!(800), false)
        .await;
    let driver = app.seed_driver("driver6@test.local").await;
    let a = app
        .seed_sorting_package("PKG-OUT-001", warehouse.id, dec!(10), dec!(0.05))
        .await;
    let b = app
        .seed_sorting_package("PKG-OUT-002", warehouse.id, dec!(15), dec!(0.05))
        .await;

    let create = app
        .request_authenticated(
            Method::POST,
            "/api/v1/deliveries",
            Some(json!({
                "origin_warehouse_id": warehouse.id,
                "vehicle_id": vehicle.id,
                "driver_id": driver.id,
                "selection": { "mode": "manual", "package_ids": [a.id, b.id] }
            })),
        )
        .await;
    let shipment_id = response_json(create).await["data"]["shipment"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    app.request_authenticated(
        Method::POST,
        &format!("/api/v1/deliveries/{}/dispatch", shipment_id),
        None,
    )
    .await;

    let partial = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/deliveries/{}/complete", shipment_id),
            Some(json!({
                "outcomes": [{ "package_id": a.id, "delivered": true }]
            })),
        )
        .await;
    assert_eq!(partial.status(), 400);
}

#[tokio::test]
async fn cancelling_a_prepared_run_frees_the_packages() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse("Metro Hub").await;
    let vehicle = app
        .seed_vehicle("NAB-1208", VehicleType::Van, dec!(800), false)
        .await;
    let driver = app.seed_driver("driver7@test.local").await;
    let package = app
        .seed_sorting_package("PKG-CXL-001", warehouse.id, dec!(10), dec!(0.05))
        .await;

    let create = app
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
    let shipment_id = response_json(create).await["data"]["shipment"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let cancel = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/deliveries/{}/cancel", shipment_id),
            Some(json!({ "reason": "vehicle reassigned" })),
        )
        .await;
    assert_eq!(cancel.status(), 200);
    assert_eq!(response_json(cancel).await["data"]["status"], "CANCELLED");

    // Freed package is schedulable again
    let reschedule = app
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
    assert_eq!(reschedule.status(), 200);
}

// ==================== Eligibility Tests ====================

#[tokio::test]
async fn vehicles_in_maintenance_cannot_be_assigned() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse("Metro Hub").await;
    let vehicle = app
        .seed_vehicle("NAB-1209", VehicleType::Van, dec!(800), false)
        .await;
    let driver = app.seed_driver("driver8@test.local").await;
    let package = app
        .seed_sorting_package("PKG-MNT-001", warehouse.id, dec!(10), dec!(0.05))
        .await;

    let flag = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/vehicles/{}/maintenance", vehicle.id),
            Some(json!({ "in_maintenance": true })),
        )
        .await;
    assert_eq!(flag.status(), 200);

    let response = app
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
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn non_driver_accounts_cannot_drive() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse("Metro Hub").await;
    let vehicle = app
        .seed_vehicle("NAB-1210", VehicleType::Van, dec!(800), false)
        .await;
    let package = app
        .seed_sorting_package("PKG-DRV-001", warehouse.id, dec!(10), dec!(0.05))
        .await;

    // The admin actor is not a DRIVER account
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/deliveries",
            Some(json!({
                "origin_warehouse_id": warehouse.id,
                "vehicle_id": vehicle.id,
                "driver_id": app.admin_id(),
                "selection": { "mode": "manual", "package_ids": [package.id] }
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
}
