use crate::{
    auth::hash_password,
    db::DbPool,
    entities::user::{self, UserRole},
    entities::{package_status_log, shipment, shipment_status_log, warehouse},
    errors::ServiceError,
    events::{Event, EventSender},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 120, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "a valid email address is required"))]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    pub role: UserRole,
    /// Home warehouse, mainly for STAFF accounts.
    pub warehouse_id: Option<Uuid>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    #[validate(email(message = "a valid email address is required"))]
    pub email: Option<String>,
    /// Admin password reset; hashed before storage.
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub warehouse_id: Option<Uuid>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub active: Option<bool>,
    pub search: Option<String>,
}

/// Service for portal accounts. Password hashes never leave this
/// module; the user entity skips them on serialization as well.
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            db_pool,
            event_sender,
            logger,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: UserFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<user::Model>, u64), ServiceError> {
        let mut query = user::Entity::find();
        if let Some(role) = filter.role {
            query = query.filter(user::Column::Role.eq(role));
        }
        if let Some(active) = filter.active {
            query = query.filter(user::Column::IsActive.eq(active));
        }
        if let Some(search) = filter.search.filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim());
            query = query.filter(
                Condition::any()
                    .add(user::Column::Name.like(&pattern))
                    .add(user::Column::Email.like(&pattern)),
            );
        }

        let paginator = query
            .order_by_asc(user::Column::Name)
            .paginate(self.db_pool.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(page.max(1) - 1).await?;
        Ok((users, total))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(user_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }

    #[instrument(skip(self, request))]
    pub async fn create(&self, request: CreateUserRequest) -> Result<user::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;
        let db = self.db_pool.as_ref();

        let email = request.email.trim().to_lowercase();
        ensure_email_free(db, &email, None).await?;
        if let Some(warehouse_id) = request.warehouse_id {
            ensure_warehouse_exists(db, warehouse_id).await?;
        }

        let password_hash = hash_password(&request.password)
            .map_err(|e| ServiceError::HashError(e.to_string()))?;

        let created = user::ActiveModel {
            name: Set(request.name),
            email: Set(email),
            password_hash: Set(password_hash),
            role: Set(request.role),
            warehouse_id: Set(request.warehouse_id),
            phone: Set(request.phone),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await?;

        slog::info!(self.logger, "user created";
            "user_id" => %created.id,
            "role" => %created.role,
        );
        if let Err(e) = self.event_sender.send(Event::UserCreated(created.id)).await {
            warn!("failed to publish UserCreated: {}", e);
        }
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        user_id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<user::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;
        let db = self.db_pool.as_ref();
        let existing = self.get(user_id).await?;

        let mut active: user::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(email) = request.email {
            let email = email.trim().to_lowercase();
            ensure_email_free(db, &email, Some(user_id)).await?;
            active.email = Set(email);
        }
        if let Some(password) = request.password {
            let password_hash =
                hash_password(&password).map_err(|e| ServiceError::HashError(e.to_string()))?;
            active.password_hash = Set(password_hash);
        }
        if let Some(role) = request.role {
            active.role = Set(role);
        }
        if let Some(warehouse_id) = request.warehouse_id {
            ensure_warehouse_exists(db, warehouse_id).await?;
            active.warehouse_id = Set(Some(warehouse_id));
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }

        Ok(active.update(db).await?)
    }

    /// Activates or deactivates an account. Deactivated accounts fail
    /// login and token refresh. Operators cannot lock themselves out.
    #[instrument(skip(self))]
    pub async fn set_active(
        &self,
        user_id: Uuid,
        active: bool,
        actor_id: Uuid,
    ) -> Result<user::Model, ServiceError> {
        if user_id == actor_id && !active {
            return Err(ServiceError::InvalidOperation(
                "you cannot deactivate your own account".to_string(),
            ));
        }

        let existing = self.get(user_id).await?;
        if existing.is_active == active {
            return Ok(existing);
        }

        let mut model: user::ActiveModel = existing.into();
        model.is_active = Set(active);
        let updated = model.update(self.db_pool.as_ref()).await?;

        slog::info!(self.logger, "user active flag changed";
            "user_id" => %updated.id,
            "active" => active,
        );
        Ok(updated)
    }

    /// Hard delete, only for accounts that never touched anything.
    /// Accounts with audit history deactivate instead.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: Uuid, actor_id: Uuid) -> Result<(), ServiceError> {
        if user_id == actor_id {
            return Err(ServiceError::InvalidOperation(
                "you cannot delete your own account".to_string(),
            ));
        }
        let db = self.db_pool.as_ref();
        let existing = self.get(user_id).await?;

        let package_logs = package_status_log::Entity::find()
            .filter(package_status_log::Column::ActorId.eq(user_id))
            .count(db)
            .await?;
        let shipment_logs = shipment_status_log::Entity::find()
            .filter(shipment_status_log::Column::ActorId.eq(user_id))
            .count(db)
            .await?;
        let driven = shipment::Entity::find()
            .filter(shipment::Column::DriverId.eq(user_id))
            .count(db)
            .await?;
        if package_logs + shipment_logs + driven > 0 {
            return Err(ServiceError::Conflict(
                "user has activity history and can only be deactivated".to_string(),
            ));
        }

        user::Entity::delete_by_id(existing.id).exec(db).await?;
        slog::info!(self.logger, "user deleted"; "user_id" => %user_id);
        Ok(())
    }
}

async fn ensure_email_free(
    db: &DbPool,
    email: &str,
    exclude: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut query = user::Entity::find().filter(user::Column::Email.eq(email));
    if let Some(id) = exclude {
        query = query.filter(user::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(ServiceError::Conflict(format!(
            "a user with email {} already exists",
            email
        )));
    }
    Ok(())
}

async fn ensure_warehouse_exists(db: &DbPool, warehouse_id: Uuid) -> Result<(), ServiceError> {
    warehouse::Entity::find_by_id(warehouse_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Warehouse {} not found", warehouse_id)))?;
    Ok(())
}
