use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    middleware, Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use freightdesk_api::{
    auth::{self, AuthService, Claims},
    config::AppConfig,
    db,
    entities::{
        package,
        user::{self, UserRole},
        vehicle::{self, VehicleType},
        warehouse,
    },
    events::{self, EventSender},
    handlers::AppServices,
    services::{
        packages::CreatePackageRequest,
        service_areas::UpsertServiceAreaRequest,
        vehicles::CreateVehicleRequest,
        warehouses::CreateWarehouseRequest,
    },
    AppState,
};

/// Helper harness for spinning up an application state backed by a
/// file-based SQLite database in a temporary directory.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    token: String,
    admin_id: Uuid,
    auth_service: Arc<AuthService>,
    _db_dir: tempfile::TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = tempfile::TempDir::new().expect("create temp dir for test database");
        let db_file = db_dir.path().join("freightdesk_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file.display()),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            86_400,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_cfg = auth::AuthConfig::from_app_config(&cfg);
        let auth_service = Arc::new(AuthService::new(auth_cfg, db_arc.clone()));

        let base_logger = freightdesk_api::logging::setup_logger(
            freightdesk_api::logging::LoggerConfig::default(),
        );
        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            base_logger,
            cfg.manifest_max_rows,
        );

        let state = AppState {
            db: db_arc.clone(),
            config: cfg.clone(),
            event_sender,
            services,
        };

        // A real admin row so /auth endpoints and actor-id checks see a
        // user that exists.
        let admin_id = Uuid::new_v4();
        user::ActiveModel {
            id: Set(admin_id),
            name: Set("Test Admin".to_string()),
            email: Set("admin@test.local".to_string()),
            password_hash: Set(
                auth::hash_password("integration-secret1").expect("hash admin password"),
            ),
            role: Set(UserRole::Admin),
            warehouse_id: Set(None),
            phone: Set(None),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db_arc.as_ref())
        .await
        .expect("insert admin user for tests");

        let token = mint_token(&cfg, admin_id, "Test Admin", "admin@test.local", "admin");

        let auth_service_for_layer = auth_service.clone();
        let api_router =
            freightdesk_api::api_v1_routes().layer(middleware::from_fn_with_state(
                auth_service_for_layer,
                |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
                 mut req: Request<Body>,
                 next: axum::middleware::Next| async move {
                    req.extensions_mut().insert(auth);
                    next.run(req).await
                },
            ));

        let router = Router::new()
            .nest("/api/v1", api_router)
            .nest(
                "/auth",
                freightdesk_api::auth::auth_routes().with_state(auth_service.clone()),
            )
            .with_state(state.clone());

        Self {
            router,
            state,
            token,
            admin_id,
            auth_service,
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    /// Access the auth service used by the test application.
    #[allow(dead_code)]
    pub fn auth_service(&self) -> Arc<AuthService> {
        self.auth_service.clone()
    }

    /// Access the bearer token for the default admin user.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The id of the seeded admin account.
    #[allow(dead_code)]
    pub fn admin_id(&self) -> Uuid {
        self.admin_id
    }

    /// Mint a token for an arbitrary role; used by permission tests.
    #[allow(dead_code)]
    pub fn token_for_role(&self, role: &str) -> String {
        mint_token(
            &self.state.config,
            Uuid::new_v4(),
            "Role Holder",
            "role@test.local",
            role,
        )
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for authenticated JSON requests.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    /// Send an authenticated multipart request carrying one file part
    /// plus the given text fields.
    #[allow(dead_code)]
    pub async fn request_multipart(
        &self,
        method: Method,
        uri: &str,
        fields: &[(&str, &str)],
        file: (&str, &str, &[u8]),
    ) -> axum::response::Response {
        let boundary = "freightdesk-test-boundary";
        let mut body = Vec::new();

        for (name, value) in fields {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            );
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }

        let (field_name, file_name, bytes) = file;
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field_name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: text/csv\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", self.token()))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .expect("failed to build multipart request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Seed a warehouse through the service layer.
    #[allow(dead_code)]
    pub async fn seed_warehouse(&self, name: &str) -> warehouse::Model {
        self.seed_warehouse_with_capacity(name, dec!(10000), dec!(500))
            .await
    }

    #[allow(dead_code)]
    pub async fn seed_warehouse_with_capacity(
        &self,
        name: &str,
        weight_capacity_kg: Decimal,
        volume_capacity_m3: Decimal,
    ) -> warehouse::Model {
        self.state
            .services
            .warehouses
            .create(CreateWarehouseRequest {
                name: name.to_string(),
                province: "Metro Manila".to_string(),
                city: "Quezon City".to_string(),
                barangay: "Bagumbayan".to_string(),
                street: "12 Industria Ave".to_string(),
                phone: None,
                weight_capacity_kg,
                volume_capacity_m3,
                target_utilization_pct: 80,
            })
            .await
            .expect("seed warehouse for tests")
    }

    /// Seed a vehicle through the service layer.
    #[allow(dead_code)]
    pub async fn seed_vehicle(
        &self,
        plate: &str,
        vehicle_type: VehicleType,
        weight_capacity_kg: Decimal,
        is_express: bool,
    ) -> vehicle::Model {
        self.state
            .services
            .vehicles
            .create(CreateVehicleRequest {
                plate_number: plate.to_string(),
                name: None,
                vehicle_type,
                weight_capacity_kg,
                is_express,
                notes: None,
            })
            .await
            .expect("seed vehicle for tests")
    }

    /// Seed an active driver account and return it.
    #[allow(dead_code)]
    pub async fn seed_driver(&self, email: &str) -> user::Model {
        self.state
            .services
            .users
            .create(freightdesk_api::services::users::CreateUserRequest {
                name: "Test Driver".to_string(),
                email: email.to_string(),
                password: "driver-secret-1".to_string(),
                role: UserRole::Driver,
                warehouse_id: None,
                phone: None,
            })
            .await
            .expect("seed driver for tests")
    }

    /// Seed one serviceable address into the gazetteer.
    #[allow(dead_code)]
    pub async fn seed_area(&self, province: &str, city: &str, barangay: &str) {
        self.state
            .services
            .service_areas
            .upsert(UpsertServiceAreaRequest {
                province: province.to_string(),
                city: city.to_string(),
                barangay: barangay.to_string(),
                is_active: None,
            })
            .await
            .expect("seed service area for tests");
    }

    /// Seed a package. With a warehouse id it starts IN_WAREHOUSE,
    /// without one it starts INCOMING.
    #[allow(dead_code)]
    pub async fn seed_package(
        &self,
        tracking_number: &str,
        warehouse_id: Option<Uuid>,
        weight_kg: Decimal,
        volume_m3: Decimal,
    ) -> package::Model {
        self.seed_package_of_type(
            tracking_number,
            warehouse_id,
            weight_kg,
            volume_m3,
            package::ShippingType::Standard,
        )
        .await
    }

    #[allow(dead_code)]
    pub async fn seed_package_of_type(
        &self,
        tracking_number: &str,
        warehouse_id: Option<Uuid>,
        weight_kg: Decimal,
        volume_m3: Decimal,
        shipping_type: package::ShippingType,
    ) -> package::Model {
        self.state
            .services
            .packages
            .create(
                CreatePackageRequest {
                    tracking_number: tracking_number.to_string(),
                    shipping_party: package::ShippingParty::Direct,
                    shipping_mode: package::ShippingMode::Air,
                    shipping_type,
                    reception_mode: package::ReceptionMode::DoorToDoor,
                    weight_kg,
                    volume_m3,
                    contents: "Integration test freight".to_string(),
                    pieces: Some(1),
                    sender_name: "Send Co".to_string(),
                    sender_phone: "+63-2-5550100".to_string(),
                    sender_address: "1 Origin Road".to_string(),
                    receiver_name: "Recv Er".to_string(),
                    receiver_phone: "+63-917-5550111".to_string(),
                    receiver_province: "Metro Manila".to_string(),
                    receiver_city: "Quezon City".to_string(),
                    receiver_barangay: "Bagumbayan".to_string(),
                    receiver_street: "7 Receiver St".to_string(),
                    is_fragile: None,
                    declared_value: None,
                    container_no: None,
                    expected_delivery_date: None,
                    notes: None,
                    received_at_warehouse_id: warehouse_id,
                },
                self.admin_id,
            )
            .await
            .expect("seed package for tests")
    }

    /// Seed a package straight into the sorting pool of a warehouse.
    #[allow(dead_code)]
    pub async fn seed_sorting_package(
        &self,
        tracking_number: &str,
        warehouse_id: Uuid,
        weight_kg: Decimal,
        volume_m3: Decimal,
    ) -> package::Model {
        self.seed_sorting_package_of_type(
            tracking_number,
            warehouse_id,
            weight_kg,
            volume_m3,
            package::ShippingType::Standard,
        )
        .await
    }

    #[allow(dead_code)]
    pub async fn seed_sorting_package_of_type(
        &self,
        tracking_number: &str,
        warehouse_id: Uuid,
        weight_kg: Decimal,
        volume_m3: Decimal,
        shipping_type: package::ShippingType,
    ) -> package::Model {
        let created = self
            .seed_package_of_type(
                tracking_number,
                Some(warehouse_id),
                weight_kg,
                volume_m3,
                shipping_type,
            )
            .await;
        self.state
            .services
            .packages
            .update_status(
                created.id,
                package::PackageStatus::Sorting,
                None,
                self.admin_id,
            )
            .await
            .expect("move seeded package to sorting")
    }
}

/// Mint an access token the way the auth service would, with the
/// expanded permission set for the given role.
fn mint_token(cfg: &AppConfig, user_id: Uuid, name: &str, email: &str, role: &str) -> String {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        name: Some(name.to_string()),
        email: Some(email.to_string()),
        role: role.to_string(),
        permissions: auth::permissions_for_role(role),
        warehouse_id: None,
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(1)).timestamp(),
        nbf: now.timestamp(),
        iss: cfg.auth_issuer.clone(),
        aud: cfg.auth_audience.clone(),
        scope: None,
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
    )
    .expect("encode access token")
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}
