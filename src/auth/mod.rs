/*!
 * # Authentication and Authorization Module
 *
 * JWT issuance and validation for the admin API, with role-based access
 * control. Access tokens carry the account's role and its expanded
 * permission set; refresh tokens are scoped JWTs that can only be spent
 * on the refresh endpoint. Revocation is an in-memory blacklist keyed
 * by token id, pruned as entries expire.
 */

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::AppConfig;
use crate::entities::user;

mod permissions;
mod rbac;

// Re-exports
pub use permissions::*;
pub use rbac::*;

/// Scope value carried by refresh tokens so they cannot double as
/// access tokens.
const REFRESH_SCOPE: &str = "refresh";

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,                  // Subject (user ID)
    pub name: Option<String>,         // User's name
    pub email: Option<String>,        // User's email
    pub role: String,                 // Account role
    pub permissions: Vec<String>,     // Expanded permission set
    pub warehouse_id: Option<String>, // Home warehouse, if assigned
    pub jti: String,                  // JWT ID (unique identifier for this token)
    pub iat: i64,                     // Issued at time
    pub exp: i64,                     // Expiration time
    pub nbf: i64,                     // Not valid before time
    pub iss: String,                  // Issuer
    pub aud: String,                  // Audience
    pub scope: Option<String>,        // Token scope (set on refresh tokens)
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub permissions: Vec<String>,
    pub warehouse_id: Option<Uuid>,
    pub token_id: String,
}

impl AuthUser {
    /// Check if the user has a specific role
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    /// Check if the user's grants satisfy a required permission
    pub fn has_permission(&self, permission: &str) -> bool {
        rbac::grants(&self.permissions, permission)
    }

    /// Check if the user is an admin
    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
    pub refresh_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
        refresh_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
            refresh_token_expiration,
        }
    }

    /// Build auth configuration from the application config
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            jwt_audience: cfg.auth_audience.clone(),
            jwt_issuer: cfg.auth_issuer.clone(),
            access_token_expiration: Duration::from_secs(cfg.jwt_expiration as u64),
            refresh_token_expiration: Duration::from_secs(cfg.refresh_token_expiration as u64),
        }
    }
}

/// Token blacklist entry
#[derive(Clone, Debug)]
struct BlacklistedToken {
    jti: String,
    expiry: DateTime<Utc>,
}

/// Authentication service that handles token issuance and validation
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
    blacklisted_tokens: Arc<RwLock<Vec<BlacklistedToken>>>,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self {
            config,
            db,
            blacklisted_tokens: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Authenticate an account by email and password
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let account = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;

        if !account.is_active {
            return Err(AuthError::UserDisabled);
        }

        if !verify_password(password, &account.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        debug!("Login succeeded for user {}", account.id);
        self.generate_token_pair(&account).await
    }

    /// Generate an access/refresh token pair for a user
    pub async fn generate_token_pair(&self, account: &user::Model) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let access_exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;
        let refresh_exp = now
            + ChronoDuration::from_std(self.config.refresh_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let access_jti = Uuid::new_v4().to_string();
        let refresh_jti = Uuid::new_v4().to_string();

        let role = account.role.rbac_name().to_string();
        let permissions = rbac::permissions_for_role(&role);

        let access_claims = Claims {
            sub: account.id.to_string(),
            name: Some(account.name.clone()),
            email: Some(account.email.clone()),
            role: role.clone(),
            permissions,
            warehouse_id: account.warehouse_id.map(|id| id.to_string()),
            jti: access_jti,
            iat: now.timestamp(),
            exp: access_exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            scope: None,
        };

        // Refresh token carries no permissions; it can only be exchanged
        let refresh_claims = Claims {
            sub: account.id.to_string(),
            name: None,
            email: None,
            role,
            permissions: vec![],
            warehouse_id: None,
            jti: refresh_jti,
            iat: now.timestamp(),
            exp: refresh_exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            scope: Some(REFRESH_SCOPE.to_string()),
        };

        let encoding_key = EncodingKey::from_secret(self.config.jwt_secret.as_bytes());

        let access_token = encode(&Header::new(Algorithm::HS256), &access_claims, &encoding_key)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        let refresh_token = encode(&Header::new(Algorithm::HS256), &refresh_claims, &encoding_key)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
            refresh_expires_in: self.config.refresh_token_expiration.as_secs() as i64,
        })
    }

    /// Validate a JWT token and extract the claims
    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.clone()]);
        validation.set_issuer(&[self.config.jwt_issuer.clone()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        if self.is_token_blacklisted(&claims.jti).await {
            return Err(AuthError::RevokedToken);
        }

        Ok(claims)
    }

    /// Validate a token and reject refresh tokens
    pub async fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.validate_token(token).await?;
        if claims.scope.as_deref() == Some(REFRESH_SCOPE) {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }

    /// Exchange a refresh token for a new token pair
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.validate_token(refresh_token).await?;

        if claims.scope.as_deref() != Some(REFRESH_SCOPE) {
            return Err(AuthError::InvalidToken);
        }

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let account = self.load_user(user_id).await?;

        if !account.is_active {
            return Err(AuthError::UserDisabled);
        }

        // The spent refresh token is dead from here on
        let expiry = DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
        self.blacklist_jti(claims.jti, expiry).await;

        self.generate_token_pair(&account).await
    }

    /// Revoke a token (add it to the blacklist)
    pub async fn revoke_token(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.validate_token(token).await?;
        let expiry = DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
        self.blacklist_jti(claims.jti, expiry).await;
        Ok(())
    }

    /// Load an account by id
    pub async fn load_user(&self, user_id: Uuid) -> Result<user::Model, AuthError> {
        user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::UserNotFound)
    }

    async fn blacklist_jti(&self, jti: String, expiry: DateTime<Utc>) {
        let mut blacklist = self.blacklisted_tokens.write().await;
        blacklist.push(BlacklistedToken { jti, expiry });

        let now = Utc::now();
        blacklist.retain(|t| t.expiry > now);
    }

    async fn is_token_blacklisted(&self, token_id: &str) -> bool {
        let blacklist = self.blacklisted_tokens.read().await;
        blacklist.iter().any(|t| t.jti == token_id)
    }
}

/// Hash a password with Argon2id and a fresh salt
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
    use argon2::Argon2;

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::InternalError(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored Argon2 hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    use argon2::password_hash::{PasswordHash, PasswordVerifier};
    use argon2::Argon2;

    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::InternalError(format!("Stored password hash is invalid: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Token pair response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
}

/// Login credentials
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginCredentials {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Profile returned by the `/auth/me` endpoint
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub warehouse_id: Option<Uuid>,
    pub phone: Option<String>,
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    RevokedToken,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Account is disabled")]
    UserDisabled,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message): (StatusCode, &str, String) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required".to_string(),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            Self::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING_TOKEN",
                "No authentication token provided".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::RevokedToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REVOKED_TOKEN",
                "Authentication token has been revoked".to_string(),
            ),
            Self::TokenCreation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_TOKEN_CREATION_FAILED",
                "Could not issue token".to_string(),
            ),
            Self::UserNotFound => (
                StatusCode::UNAUTHORIZED,
                "AUTH_USER_NOT_FOUND",
                "Account not found".to_string(),
            ),
            Self::UserDisabled => (
                StatusCode::FORBIDDEN,
                "AUTH_USER_DISABLED",
                "Account is disabled".to_string(),
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Insufficient permissions".to_string(),
            ),
            Self::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_DATABASE_ERROR",
                "Authentication backend error".to_string(),
            ),
            Self::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                "Internal authentication error".to_string(),
            ),
        };

        if status.is_server_error() {
            warn!("Auth failure surfaced as {}: {}", status, self);
        }

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

/// Authentication middleware that extracts and validates bearer tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let headers = request.headers().clone();

    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication service not available",
            )
                .into_response();
        }
    };

    match extract_auth_from_headers(&headers, &auth_service).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Extract authentication info from request headers
async fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::MissingAuth)?;
    let claims = auth_service.validate_access_token(token).await?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
    let warehouse_id = claims
        .warehouse_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw).ok());

    Ok(AuthUser {
        user_id,
        name: claims.name.unwrap_or_default(),
        email: claims.email.unwrap_or_default(),
        role: claims.role,
        permissions: claims.permissions,
        warehouse_id,
        token_id: claims.jti,
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Permission middleware to check if a user has the required permission
pub async fn permission_middleware(
    State(required_permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = match request.extensions().get::<AuthUser>() {
        Some(user) => user.clone(),
        None => return Err(AuthError::MissingAuth),
    };

    if user.is_admin() {
        return Ok(next.run(request).await);
    }

    if !user.has_permission(&required_permission) {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }
}

/// Authentication routes
pub fn auth_routes() -> axum::Router<Arc<AuthService>> {
    axum::Router::new()
        .route("/login", axum::routing::post(login_handler))
        .route("/refresh", axum::routing::post(refresh_token_handler))
        .route("/logout", axum::routing::post(logout_handler))
        .route("/me", axum::routing::get(me_handler))
        .layer(DefaultBodyLimit::max(1024 * 64)) // 64KB limit
}

/// Login handler
pub async fn login_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Json<TokenPair>, AuthError> {
    if credentials.validate().is_err() {
        return Err(AuthError::InvalidCredentials);
    }

    let token_pair = auth_service
        .login(&credentials.email, &credentials.password)
        .await?;

    Ok(Json(token_pair))
}

/// Refresh token handler
pub async fn refresh_token_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(refresh_request): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let token_pair = auth_service
        .refresh_token(&refresh_request.refresh_token)
        .await?;

    Ok(Json(token_pair))
}

/// Logout handler: revokes the presented access token
async fn logout_handler(
    State(auth_service): State<Arc<AuthService>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AuthError> {
    let token = bearer_token(&headers).ok_or(AuthError::MissingToken)?;
    auth_service.revoke_token(token).await?;

    Ok(Json(
        serde_json::json!({ "message": "Successfully logged out" }),
    ))
}

/// Current account profile, loaded fresh from the database
async fn me_handler(
    State(auth_service): State<Arc<AuthService>>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, AuthError> {
    let token = bearer_token(&headers).ok_or(AuthError::MissingToken)?;
    let claims = auth_service.validate_access_token(token).await?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
    let account = auth_service.load_user(user_id).await?;

    Ok(Json(MeResponse {
        id: account.id,
        name: account.name,
        email: account.email,
        role: account.role.rbac_name().to_string(),
        warehouse_id: account.warehouse_id,
        phone: account.phone,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::UserRole;

    fn test_service() -> AuthService {
        let config = AuthConfig::new(
            "unit_test_secret_key_for_auth_tokens_0123456789".into(),
            "freightdesk-admin".into(),
            "freightdesk-api".into(),
            Duration::from_secs(3600),
            Duration::from_secs(86_400),
        );
        AuthService::new(config, Arc::new(DatabaseConnection::Disconnected))
    }

    fn staff_account() -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            name: "Ana Reyes".into(),
            email: "ana@freightdesk.example".into(),
            password_hash: String::new(),
            role: UserRole::Staff,
            warehouse_id: Some(Uuid::new_v4()),
            phone: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[tokio::test]
    async fn access_token_round_trips_with_role_permissions() {
        let service = test_service();
        let account = staff_account();

        let pair = service.generate_token_pair(&account).await.unwrap();
        let claims = service
            .validate_access_token(&pair.access_token)
            .await
            .unwrap();

        assert_eq!(claims.sub, account.id.to_string());
        assert_eq!(claims.role, "staff");
        assert!(claims
            .permissions
            .iter()
            .any(|p| p == "packages:*" || p == consts::PACKAGES_READ));
        assert!(claims.scope.is_none());
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let service = test_service();
        let pair = service
            .generate_token_pair(&staff_account())
            .await
            .unwrap();

        assert!(matches!(
            service.validate_access_token(&pair.refresh_token).await,
            Err(AuthError::InvalidToken)
        ));
        // but it still validates as a plain token
        let claims = service.validate_token(&pair.refresh_token).await.unwrap();
        assert_eq!(claims.scope.as_deref(), Some(REFRESH_SCOPE));
    }

    #[tokio::test]
    async fn revoked_token_is_rejected() {
        let service = test_service();
        let pair = service
            .generate_token_pair(&staff_account())
            .await
            .unwrap();

        service.revoke_token(&pair.access_token).await.unwrap();
        assert!(matches!(
            service.validate_token(&pair.access_token).await,
            Err(AuthError::RevokedToken)
        ));
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let service = test_service();
        assert!(matches!(
            service.validate_token("not-a-jwt").await,
            Err(AuthError::InvalidToken)
        ));
    }
}
