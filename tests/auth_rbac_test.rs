//! Integration tests for authentication and role-based access:
//! login/refresh/logout round trips, token revocation, the permission
//! split between admin, staff and driver accounts, and the account
//! administration endpoints.

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

async fn login(app: &TestApp, email: &str, password: &str) -> Response {
    app.request(
        Method::POST,
        "/auth/login",
        Some(json!({ "email": email, "password": password })),
        None,
    )
    .await
}

// ==================== Token Tests ====================

#[tokio::test]
async fn login_returns_a_working_token_pair() {
    let app = TestApp::new().await;

    let response = login(&app, "admin@test.local", "integration-secret1").await;
    assert_eq!(response.status(), 200);

    let pair = response_json(response).await;
    assert_eq!(pair["token_type"], "Bearer");
    assert_eq!(pair["expires_in"], 3600);
    let access = pair["access_token"].as_str().unwrap().to_string();
    assert!(!access.is_empty());
    assert!(!pair["refresh_token"].as_str().unwrap().is_empty());

    // The issued token opens the admin API
    let listed = app
        .request(Method::GET, "/api/v1/packages", None, Some(&access))
        .await;
    assert_eq!(listed.status(), 200);
}

#[tokio::test]
async fn bad_credentials_are_rejected() {
    let app = TestApp::new().await;

    let wrong_password = login(&app, "admin@test.local", "not-the-password").await;
    assert_eq!(wrong_password.status(), 401);
    let body = response_json(wrong_password).await;
    assert_eq!(body["error"]["code"], "AUTH_INVALID_CREDENTIALS");

    // Unknown accounts fail the same way, without enumeration
    let unknown = login(&app, "nobody@test.local", "whatever-secret").await;
    assert_eq!(unknown.status(), 401);
    let body = response_json(unknown).await;
    assert_eq!(body["error"]["code"], "AUTH_INVALID_CREDENTIALS");
}

#[tokio::test]
async fn me_returns_the_stored_profile() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/auth/me", None, Some(app.token()))
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["email"], "admin@test.local");
    assert_eq!(body["name"], "Test Admin");
    assert_eq!(body["role"], "admin");
}

#[tokio::test]
async fn missing_or_garbage_tokens_are_unauthorized() {
    let app = TestApp::new().await;

    let missing = app.request(Method::GET, "/api/v1/packages", None, None).await;
    assert_eq!(missing.status(), 401);

    let garbage = app
        .request(Method::GET, "/api/v1/packages", None, Some("not-a-jwt"))
        .await;
    assert_eq!(garbage.status(), 401);
}

#[tokio::test]
async fn refresh_rotates_and_burns_the_old_token() {
    let app = TestApp::new().await;

    let pair = response_json(login(&app, "admin@test.local", "integration-secret1").await).await;
    let refresh = pair["refresh_token"].as_str().unwrap().to_string();

    let rotated = app
        .request(
            Method::POST,
            "/auth/refresh",
            Some(json!({ "refresh_token": refresh })),
            None,
        )
        .await;
    assert_eq!(rotated.status(), 200);
    let new_pair = response_json(rotated).await;
    assert!(!new_pair["access_token"].as_str().unwrap().is_empty());

    // The spent refresh token cannot be replayed
    let replay = app
        .request(
            Method::POST,
            "/auth/refresh",
            Some(json!({ "refresh_token": refresh })),
            None,
        )
        .await;
    assert_eq!(replay.status(), 401);
}

#[tokio::test]
async fn tokens_do_not_cross_roles() {
    let app = TestApp::new().await;
    let pair = response_json(login(&app, "admin@test.local", "integration-secret1").await).await;

    // An access token is not accepted by the refresh endpoint
    let refresh_with_access = app
        .request(
            Method::POST,
            "/auth/refresh",
            Some(json!({ "refresh_token": pair["access_token"] })),
            None,
        )
        .await;
    assert_eq!(refresh_with_access.status(), 401);

    // A refresh token is not accepted as a bearer credential
    let bearer_with_refresh = app
        .request(
            Method::GET,
            "/api/v1/packages",
            None,
            Some(pair["refresh_token"].as_str().unwrap()),
        )
        .await;
    assert_eq!(bearer_with_refresh.status(), 401);
}

#[tokio::test]
async fn logout_revokes_the_access_token() {
    let app = TestApp::new().await;
    let pair = response_json(login(&app, "admin@test.local", "integration-secret1").await).await;
    let access = pair["access_token"].as_str().unwrap().to_string();

    let logout = app
        .request(Method::POST, "/auth/logout", None, Some(&access))
        .await;
    assert_eq!(logout.status(), 200);

    let after = app
        .request(Method::GET, "/api/v1/packages", None, Some(&access))
        .await;
    assert_eq!(after.status(), 401);
    let body = response_json(after).await;
    assert_eq!(body["error"]["code"], "AUTH_REVOKED_TOKEN");
}

#[tokio::test]
async fn deactivated_accounts_cannot_login_or_refresh() {
    let app = TestApp::new().await;
    let driver = app.seed_driver("gate1@test.local").await;

    let before = login(&app, "gate1@test.local", "driver-secret-1").await;
    assert_eq!(before.status(), 200);
    let pair = response_json(before).await;

    let deactivated = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/users/{}/deactivate", driver.id),
            None,
        )
        .await;
    assert_eq!(deactivated.status(), 200);
    assert_eq!(response_json(deactivated).await["data"]["is_active"], false);

    let locked_out = login(&app, "gate1@test.local", "driver-secret-1").await;
    assert_eq!(locked_out.status(), 403);
    let body = response_json(locked_out).await;
    assert_eq!(body["error"]["code"], "AUTH_USER_DISABLED");

    // Tokens issued before the lockout cannot be refreshed either
    let refresh = app
        .request(
            Method::POST,
            "/auth/refresh",
            Some(json!({ "refresh_token": pair["refresh_token"] })),
            None,
        )
        .await;
    assert_eq!(refresh.status(), 403);

    // Reactivation restores access
    app.request_authenticated(
        Method::POST,
        &format!("/api/v1/users/{}/activate", driver.id),
        None,
    )
    .await;
    let back = login(&app, "gate1@test.local", "driver-secret-1").await;
    assert_eq!(back.status(), 200);
}

// ==================== Permission Tests ====================

#[tokio::test]
async fn drivers_read_but_do_not_schedule() {
    let app = TestApp::new().await;
    let token = app.token_for_role("driver");

    let deliveries = app
        .request(Method::GET, "/api/v1/deliveries", None, Some(&token))
        .await;
    assert_eq!(deliveries.status(), 200);

    let packages = app
        .request(Method::GET, "/api/v1/packages", None, Some(&token))
        .await;
    assert_eq!(packages.status(), 200);

    let intake = app
        .request(Method::POST, "/api/v1/packages", None, Some(&token))
        .await;
    assert_eq!(intake.status(), 403);
    let body = response_json(intake).await;
    assert_eq!(body["error"]["code"], "AUTH_INSUFFICIENT_PERMISSIONS");

    let schedule = app
        .request(Method::POST, "/api/v1/deliveries", None, Some(&token))
        .await;
    assert_eq!(schedule.status(), 403);

    let dispatch = app
        .request(
            Method::POST,
            &format!("/api/v1/deliveries/{}/dispatch", uuid::Uuid::new_v4()),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(dispatch.status(), 403);

    // Completing runs is in the driver's remit; the permission gate
    // passes and the lookup itself 404s.
    let complete = app
        .request(
            Method::POST,
            &format!("/api/v1/deliveries/{}/complete", uuid::Uuid::new_v4()),
            Some(json!({ "outcomes": [] })),
            Some(&token),
        )
        .await;
    assert_eq!(complete.status(), 404);
}

#[tokio::test]
async fn staff_run_operations_but_not_administration() {
    let app = TestApp::new().await;
    let token = app.token_for_role("staff");

    let vehicles = app
        .request(Method::GET, "/api/v1/vehicles", None, Some(&token))
        .await;
    assert_eq!(vehicles.status(), 200);

    let register_vehicle = app
        .request(Method::POST, "/api/v1/vehicles", None, Some(&token))
        .await;
    assert_eq!(register_vehicle.status(), 403);

    let warehouses = app
        .request(Method::GET, "/api/v1/warehouses", None, Some(&token))
        .await;
    assert_eq!(warehouses.status(), 200);

    let create_warehouse = app
        .request(Method::POST, "/api/v1/warehouses", None, Some(&token))
        .await;
    assert_eq!(create_warehouse.status(), 403);

    let accounts = app
        .request(Method::GET, "/api/v1/users", None, Some(&token))
        .await;
    assert_eq!(accounts.status(), 403);

    let edit_areas = app
        .request(Method::POST, "/api/v1/service-areas", None, Some(&token))
        .await;
    assert_eq!(edit_areas.status(), 403);

    let manifests = app
        .request(Method::GET, "/api/v1/manifests", None, Some(&token))
        .await;
    assert_eq!(manifests.status(), 200);
}

// ==================== Account Administration Tests ====================

#[tokio::test]
async fn account_lifecycle_with_password_reset() {
    let app = TestApp::new().await;

    let created = app
        .request_authenticated(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "name": "Ana Reyes",
                "email": "ana.reyes@ops.local",
                "password": "first-secret-99",
                "role": "STAFF"
            })),
        )
        .await;
    assert_eq!(created.status(), 200);
    let body = response_json(created).await;
    assert_eq!(body["data"]["role"], "STAFF");
    assert_eq!(body["data"]["is_active"], true);
    let user_id = body["data"]["id"].as_str().unwrap().to_string();

    // Emails are case-insensitive unique
    let duplicate = app
        .request_authenticated(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "name": "Ana Again",
                "email": "Ana.Reyes@Ops.Local",
                "password": "other-secret-99",
                "role": "STAFF"
            })),
        )
        .await;
    assert_eq!(duplicate.status(), 409);

    // Admin password reset takes effect on the next login
    let updated = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/users/{}", user_id),
            Some(json!({ "name": "Ana R. Reyes", "password": "second-secret-99" })),
        )
        .await;
    assert_eq!(updated.status(), 200);
    assert_eq!(response_json(updated).await["data"]["name"], "Ana R. Reyes");

    let old_password = login(&app, "ana.reyes@ops.local", "first-secret-99").await;
    assert_eq!(old_password.status(), 401);
    let new_password = login(&app, "ana.reyes@ops.local", "second-secret-99").await;
    assert_eq!(new_password.status(), 200);

    // Role filter and search find the account
    let listed = app
        .request_authenticated(
            Method::GET,
            "/api/v1/users?role=STAFF&search=reyes",
            None,
        )
        .await;
    let listed = response_json(listed).await;
    assert_eq!(listed["data"]["total"], 1);
    assert_eq!(listed["data"]["items"][0]["email"], "ana.reyes@ops.local");
}

#[tokio::test]
async fn account_validation_rules() {
    let app = TestApp::new().await;

    let short_password = app
        .request_authenticated(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "name": "Shorty",
                "email": "shorty@ops.local",
                "password": "short",
                "role": "STAFF"
            })),
        )
        .await;
    assert_eq!(short_password.status(), 400);

    let bad_email = app
        .request_authenticated(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "name": "No Email",
                "email": "not-an-email",
                "password": "long-enough-99",
                "role": "STAFF"
            })),
        )
        .await;
    assert_eq!(bad_email.status(), 400);

    // Home warehouse must exist
    let ghost_warehouse = app
        .request_authenticated(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "name": "Lost Staff",
                "email": "lost@ops.local",
                "password": "long-enough-99",
                "role": "STAFF",
                "warehouse_id": uuid::Uuid::new_v4()
            })),
        )
        .await;
    assert_eq!(ghost_warehouse.status(), 404);
}

#[tokio::test]
async fn self_lockout_is_prevented() {
    let app = TestApp::new().await;

    let deactivate = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/users/{}/deactivate", app.admin_id()),
            None,
        )
        .await;
    assert_eq!(deactivate.status(), 400);

    let delete = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/users/{}", app.admin_id()),
            None,
        )
        .await;
    assert_eq!(delete.status(), 400);
}

#[tokio::test]
async fn accounts_with_history_deactivate_instead_of_delete() {
    let app = TestApp::new().await;
    let warehouse = app.seed_warehouse("Metro Hub").await;
    let vehicle = app
        .seed_vehicle("USR-0001", VehicleType::Van, dec!(800), false)
        .await;
    let driver = app.seed_driver("driver30@test.local").await;
    let package = app
        .seed_sorting_package("PKG-USR-001", warehouse.id, dec!(5), dec!(0.02))
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

    let delete = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/users/{}", driver.id),
            None,
        )
        .await;
    assert_eq!(delete.status(), 409);

    let deactivate = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/users/{}/deactivate", driver.id),
            None,
        )
        .await;
    assert_eq!(deactivate.status(), 200);

    // Accounts that never touched anything delete outright
    let fresh = app
        .request_authenticated(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "name": "Temp Staff",
                "email": "temp@ops.local",
                "password": "temp-secret-99",
                "role": "STAFF"
            })),
        )
        .await;
    let fresh_id = response_json(fresh).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let delete = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/users/{}", fresh_id), None)
        .await;
    assert_eq!(delete.status(), 200);

    let gone = app
        .request_authenticated(Method::GET, &format!("/api/v1/users/{}", fresh_id), None)
        .await;
    assert_eq!(gone.status(), 404);
}
