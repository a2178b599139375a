//! Integration tests for the public tracking endpoint and the served
//! area gazetteer behind address validation.

mod common;

use axum::{body, http::Method, response::Response};
use common::TestApp;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

// ==================== Tracking Tests ====================

#[tokio::test]
async fn tracking_is_public_and_case_insensitive() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse("Metro Hub").await;
    app.seed_package("PKG-TRK-001", Some(warehouse.id), dec!(2), dec!(0.01))
        .await;

    // No bearer token on purpose
    let response = app
        .request(Method::GET, "/api/v1/tracking/pkg-trk-001", None, None)
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["data"]["tracking_number"], "PKG-TRK-001");
    assert_eq!(body["data"]["status"], "IN_WAREHOUSE");

    let history = body["data"]["history"].as_array().expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["status"], "IN_WAREHOUSE");
    // Audit identities stay internal
    assert!(history[0].get("actor_id").is_none());
}

#[tokio::test]
async fn tracking_follows_status_moves_in_order() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse("Metro Hub").await;
    let package = app
        .seed_package("PKG-TRK-002", Some(warehouse.id), dec!(2), dec!(0.01))
        .await;

    let moved = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/packages/{}/status", package.id),
            Some(json!({ "status": "SORTING" })),
        )
        .await;
    assert_eq!(moved.status(), 200);

    let response = app
        .request(Method::GET, "/api/v1/tracking/PKG-TRK-002", None, None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "SORTING");

    let history = body["data"]["history"].as_array().expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["status"], "IN_WAREHOUSE");
    assert_eq!(history[1]["status"], "SORTING");
}

#[tokio::test]
async fn unknown_and_archived_numbers_are_not_found() {
    let app = TestApp::new().await;

    let unknown = app
        .request(Method::GET, "/api/v1/tracking/PKG-NOPE-404", None, None)
        .await;
    assert_eq!(unknown.status(), 404);

    let package = app
        .seed_package("PKG-TRK-003", None, dec!(2), dec!(0.01))
        .await;
    app.request_authenticated(
        Method::POST,
        &format!("/api/v1/packages/{}/archive", package.id),
        None,
    )
    .await;

    let archived = app
        .request(Method::GET, "/api/v1/tracking/PKG-TRK-003", None, None)
        .await;
    assert_eq!(archived.status(), 404);
}

// ==================== Service Area Tests ====================

#[tokio::test]
async fn cascade_walks_province_city_barangay() {
    let app = TestApp::new().await;
    app.seed_area("Cebu", "Cebu City", "Lahug").await;
    app.seed_area("Cebu", "Cebu City", "Talamban").await;
    app.seed_area("Cebu", "Mandaue", "Centro").await;
    app.seed_area("Bohol", "Tagbilaran", "Poblacion").await;

    let provinces = app
        .request_authenticated(Method::GET, "/api/v1/service-areas", None)
        .await;
    let body = response_json(provinces).await;
    assert_eq!(body["data"]["level"], "provinces");
    assert_eq!(body["data"]["values"], json!(["Bohol", "Cebu"]));

    let cities = app
        .request_authenticated(Method::GET, "/api/v1/service-areas?province=Cebu", None)
        .await;
    let body = response_json(cities).await;
    assert_eq!(body["data"]["level"], "cities");
    assert_eq!(body["data"]["values"], json!(["Cebu City", "Mandaue"]));

    let barangays = app
        .request_authenticated(
            Method::GET,
            "/api/v1/service-areas?province=Cebu&city=Cebu%20City",
            None,
        )
        .await;
    let body = response_json(barangays).await;
    assert_eq!(body["data"]["level"], "barangays");
    assert_eq!(body["data"]["values"], json!(["Lahug", "Talamban"]));
}

#[tokio::test]
async fn validate_names_the_failing_level() {
    let app = TestApp::new().await;
    app.seed_area("Cebu", "Cebu City", "Lahug").await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/service-areas/validate",
            Some(json!({
                "addresses": [
                    {"province": "Cebu", "city": "Cebu City", "barangay": "Lahug"},
                    {"province": "Bohol", "city": "Tagbilaran", "barangay": "Poblacion"},
                    {"province": "Cebu", "city": "Cebu City", "barangay": "Atlantis"}
                ]
            })),
        )
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    let checks = body["data"].as_array().expect("checks");
    assert_eq!(checks.len(), 3);

    assert_eq!(checks[0]["valid"], true);
    assert_eq!(checks[0]["error"], Value::Null);
    assert_eq!(checks[0]["barangay"], "Lahug");

    assert_eq!(checks[1]["valid"], false);
    assert_eq!(checks[1]["error"]["field"], "Receiver Province");

    assert_eq!(checks[2]["valid"], false);
    assert_eq!(checks[2]["error"]["field"], "Receiver Barangay");
}

#[tokio::test]
async fn upsert_recases_and_revives_areas() {
    let app = TestApp::new().await;

    let created = app
        .request_authenticated(
            Method::POST,
            "/api/v1/service-areas",
            Some(json!({ "province": "cebu", "city": "cebu city", "barangay": "lahug" })),
        )
        .await;
    assert_eq!(created.status(), 200);
    let body = response_json(created).await;
    let area_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["is_active"], true);

    // Same triple re-submitted with display casing, deactivated
    let updated = app
        .request_authenticated(
            Method::POST,
            "/api/v1/service-areas",
            Some(json!({
                "province": "Cebu",
                "city": "Cebu City",
                "barangay": "Lahug",
                "is_active": false
            })),
        )
        .await;
    assert_eq!(updated.status(), 200);
    let body = response_json(updated).await;
    assert_eq!(body["data"]["id"], area_id.as_str());
    assert_eq!(body["data"]["province"], "Cebu");
    assert_eq!(body["data"]["is_active"], false);

    // Inactive rows drop out of the cascade but stay on the admin list
    let provinces = app
        .request_authenticated(Method::GET, "/api/v1/service-areas", None)
        .await;
    let body = response_json(provinces).await;
    assert_eq!(body["data"]["values"], json!([]));

    let all = app
        .request_authenticated(Method::GET, "/api/v1/service-areas/all", None)
        .await;
    let body = response_json(all).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["is_active"], false);
}

#[tokio::test]
async fn delete_removes_the_area() {
    let app = TestApp::new().await;

    let created = app
        .request_authenticated(
            Method::POST,
            "/api/v1/service-areas",
            Some(json!({ "province": "Cebu", "city": "Cebu City", "barangay": "Lahug" })),
        )
        .await;
    let area_id = response_json(created).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let deleted = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/service-areas/{}", area_id),
            None,
        )
        .await;
    assert_eq!(deleted.status(), 200);

    let again = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/service-areas/{}", area_id),
            None,
        )
        .await;
    assert_eq!(again.status(), 404);
}
