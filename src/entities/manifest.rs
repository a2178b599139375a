use async_trait::async_trait;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use super::package::ShippingMode;

/// Import eligibility of an uploaded manifest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ManifestStatus {
    /// Every row parsed and every address resolved; import allowed.
    #[sea_orm(string_value = "READY")]
    Ready,

    /// Stored, but one or more addresses failed gazetteer validation;
    /// import stays blocked until a corrected file replaces this one.
    #[sea_orm(string_value = "BLOCKED")]
    Blocked,

    #[sea_orm(string_value = "IMPORTED")]
    Imported,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "manifests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub file_name: String,
    pub agent_name: String,
    pub origin: Option<String>,
    pub shipping_mode: ShippingMode,
    /// Destination facility the resulting incoming shipment targets.
    pub warehouse_id: Uuid,

    pub row_count: i32,
    /// Rows whose receiver address failed gazetteer validation.
    pub blocked_row_count: i32,
    pub status: ManifestStatus,

    /// Incoming shipment created by the import, once it has run.
    pub shipment_id: Option<Uuid>,
    pub uploaded_by: Option<Uuid>,

    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::manifest_row::Entity")]
    Rows,

    #[sea_orm(
        belongs_to = "super::warehouse::Entity",
        from = "Column::WarehouseId",
        to = "super::warehouse::Column::Id"
    )]
    Warehouse,
}

impl Related<super::manifest_row::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rows.def()
    }
}

impl Related<super::warehouse::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouse.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(Some(now));

        Ok(active_model)
    }
}
