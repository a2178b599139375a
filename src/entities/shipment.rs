use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

/// The three movements the company schedules.
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
pub enum ShipmentKind {
    /// Warehouse to recipients, on one of our vehicles.
    #[sea_orm(string_value = "DELIVERY")]
    Delivery,

    /// Inbound from an overseas agent to one of our warehouses.
    #[sea_orm(string_value = "INCOMING")]
    Incoming,

    /// Between two of our warehouses.
    #[sea_orm(string_value = "WAREHOUSE_TRANSFER")]
    WarehouseTransfer,
}

impl ShipmentKind {
    /// Prefix used when generating human-facing reference codes.
    pub fn reference_prefix(self) -> &'static str {
        match self {
            ShipmentKind::Delivery => "DLV",
            ShipmentKind::Incoming => "INC",
            ShipmentKind::WarehouseTransfer => "TRF",
        }
    }
}

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
pub enum ShipmentStatus {
    #[sea_orm(string_value = "PREPARING")]
    Preparing,

    #[sea_orm(string_value = "IN_TRANSIT")]
    InTransit,

    /// At the destination facility, awaiting acceptance/unloading.
    #[sea_orm(string_value = "ARRIVED")]
    Arrived,

    #[sea_orm(string_value = "COMPLETED")]
    Completed,

    /// Abandoned before dispatch; member packages return to the pool.
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl ShipmentStatus {
    pub fn can_transition_to(self, next: ShipmentStatus) -> bool {
        use ShipmentStatus::*;
        match (self, next) {
            (Preparing, InTransit | Cancelled) => true,
            // Deliveries complete directly; incoming/transfer arrive first
            (InTransit, Arrived | Completed) => true,
            (Arrived, Completed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ShipmentStatus::Completed | ShipmentStatus::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human-facing code, e.g. `DLV-7F3A21C9`.
    pub reference: String,
    pub kind: ShipmentKind,
    pub status: ShipmentStatus,

    /// None for incoming shipments (they originate overseas).
    pub origin_warehouse_id: Option<Uuid>,
    /// None for deliveries (they fan out to recipients).
    pub destination_warehouse_id: Option<Uuid>,
    /// Free-form origin for incoming shipments (agent, port).
    pub origin_label: Option<String>,

    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub manifest_id: Option<Uuid>,

    pub scheduled_date: Option<NaiveDate>,
    pub departed_at: Option<DateTimeUtc>,
    pub completed_at: Option<DateTimeUtc>,
    pub notes: Option<String>,

    pub is_archived: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vehicle::Entity",
        from = "Column::VehicleId",
        to = "super::vehicle::Column::Id"
    )]
    Vehicle,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::DriverId",
        to = "super::user::Column::Id"
    )]
    Driver,

    #[sea_orm(has_many = "super::shipment_status_log::Entity")]
    StatusLogs,

    #[sea_orm(has_many = "super::shipment_package::Entity")]
    ShipmentPackages,
}

impl Related<super::vehicle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicle.def()
    }
}

impl Related<super::shipment_status_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusLogs.def()
    }
}

impl Related<super::shipment_package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShipmentPackages.def()
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
