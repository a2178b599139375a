use crate::{
    auth::AuthUser,
    entities::user::{self, UserRole},
    handlers::common::{parse_enum_param, PaginationParams},
    services::users::{CreateUserRequest, UpdateUserRequest, UserFilter},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Extension, Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Role filter (ADMIN, STAFF, DRIVER)
    pub role: Option<String>,
    /// Omitted lists active and deactivated accounts alike
    pub active: Option<bool>,
    /// Matches name or email
    pub search: Option<String>,
}

/// Account as shown to administrators. Never carries the password hash.
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "3f0b9aee-6a6f-4f5e-8e44-6a3c1f2a90aa",
    "name": "Ana Reyes",
    "email": "ana.reyes@example.com",
    "role": "STAFF",
    "is_active": true
}))]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    #[schema(example = "ana.reyes@example.com")]
    pub email: String,
    pub role: UserRole,
    /// Home warehouse, mainly for STAFF accounts
    pub warehouse_id: Option<Uuid>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<user::Model> for UserSummary {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            role: model.role,
            warehouse_id: model.warehouse_id,
            phone: model.phone,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Accounts listed", body = ApiResponse<PaginatedResponse<UserSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<PaginatedResponse<UserSummary>> {
    let (page, per_page) = PaginationParams {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    }
    .clamped();

    let role = query
        .role
        .as_deref()
        .map(|raw| parse_enum_param(raw, "role"))
        .transpose()?;

    let filter = UserFilter {
        role,
        active: query.active,
        search: query.search,
    };

    let (records, total) = state.user_service().list(filter, page, per_page).await?;
    let items: Vec<UserSummary> = records.into_iter().map(UserSummary::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, per_page,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account fetched", body = ApiResponse<UserSummary>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<UserSummary> {
    let model = state.user_service().get(id).await?;
    Ok(Json(ApiResponse::success(UserSummary::from(model))))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "Account created", body = ApiResponse<UserSummary>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<UserSummary> {
    let created = state.user_service().create(payload).await?;
    Ok(Json(ApiResponse::success(UserSummary::from(created))))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Account updated", body = ApiResponse<UserSummary>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<UserSummary> {
    let updated = state.user_service().update(id, payload).await?;
    Ok(Json(ApiResponse::success(UserSummary::from(updated))))
}

/// Re-enables a deactivated account.
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/activate",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account activated", body = ApiResponse<UserSummary>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn activate_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<UserSummary> {
    let updated = state
        .user_service()
        .set_active(id, true, actor.user_id)
        .await?;
    Ok(Json(ApiResponse::success(UserSummary::from(updated))))
}

/// Locks an account out of login and token refresh. Self-deactivation
/// is rejected so an administrator cannot strand the portal.
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/deactivate",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account deactivated", body = ApiResponse<UserSummary>),
        (status = 400, description = "Cannot deactivate own account", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn deactivate_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<UserSummary> {
    let updated = state
        .user_service()
        .set_active(id, false, actor.user_id)
        .await?;
    Ok(Json(ApiResponse::success(UserSummary::from(updated))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Account has activity history", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.user_service().delete(id, actor.user_id).await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": id }))))
}
