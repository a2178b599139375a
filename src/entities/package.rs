use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Lifecycle status of a package. Stored as text using the published
/// SCREAMING_SNAKE names; legality of moves between statuses is defined
/// by [`PackageStatus::can_transition_to`].
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
pub enum PackageStatus {
    #[sea_orm(string_value = "INCOMING")]
    Incoming,

    #[sea_orm(string_value = "IN_WAREHOUSE")]
    InWarehouse,

    #[sea_orm(string_value = "SORTING")]
    Sorting,

    /// On the road between two of our warehouses.
    #[sea_orm(string_value = "SHIPPING")]
    Shipping,

    /// Out for delivery to the recipient.
    #[sea_orm(string_value = "DELIVERING")]
    Delivering,

    #[sea_orm(string_value = "DELIVERED")]
    Delivered,

    /// Staged on a warehouse-transfer shipment, not yet dispatched.
    #[sea_orm(string_value = "TRANSFERRING_WAREHOUSE")]
    TransferringWarehouse,

    /// Handoff to a partner forwarder initiated.
    #[sea_orm(string_value = "TRANSFERRING_FORWARDER")]
    TransferringForwarder,

    #[sea_orm(string_value = "TRANSFERRED_FORWARDER")]
    TransferredForwarder,
}

impl PackageStatus {
    /// Legal-transition table. Same-status moves are not listed; the
    /// workflow layer rejects them before consulting this table.
    pub fn can_transition_to(self, next: PackageStatus) -> bool {
        use PackageStatus::*;
        match (self, next) {
            (Incoming, InWarehouse) => true,
            (InWarehouse, Sorting | TransferringForwarder) => true,
            (Sorting, InWarehouse | Delivering | TransferringWarehouse | TransferringForwarder) => {
                true
            }
            // Failed delivery attempts return the package to the sorting pool
            (Delivering, Delivered | Sorting) => true,
            (TransferringWarehouse, Shipping | Sorting) => true,
            (Shipping, InWarehouse) => true,
            (TransferringForwarder, TransferredForwarder | Sorting) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PackageStatus::Delivered | PackageStatus::TransferredForwarder
        )
    }
}

/// Who tendered the package to us.
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
pub enum ShippingParty {
    /// Consolidated by an overseas agent and manifested in bulk.
    #[sea_orm(string_value = "AGENT")]
    Agent,

    /// Walk-in or direct corporate intake at one of our warehouses.
    #[sea_orm(string_value = "DIRECT")]
    Direct,
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
pub enum ShippingMode {
    #[sea_orm(string_value = "AIR")]
    Air,

    #[sea_orm(string_value = "SEA")]
    Sea,
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
pub enum ShippingType {
    #[sea_orm(string_value = "STANDARD")]
    Standard,

    /// Express packages may only ride express-eligible vehicles.
    #[sea_orm(string_value = "EXPRESS")]
    Express,
}

/// How the receiver gets the package at the destination end.
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
pub enum ReceptionMode {
    #[sea_orm(string_value = "DOOR_TO_DOOR")]
    DoorToDoor,

    #[sea_orm(string_value = "PICKUP")]
    Pickup,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "packages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(
        min = 1,
        max = 64,
        message = "Tracking number must be between 1 and 64 characters"
    ))]
    pub tracking_number: String,

    pub shipping_party: ShippingParty,
    pub shipping_mode: ShippingMode,
    pub shipping_type: ShippingType,
    pub reception_mode: ReceptionMode,

    pub weight_kg: Decimal,
    pub volume_m3: Decimal,

    #[validate(length(min = 1, max = 500))]
    pub contents: String,
    pub pieces: i32,

    pub sender_name: String,
    pub sender_phone: String,
    /// Free-form overseas address; not validated against the gazetteer.
    pub sender_address: String,

    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_province: String,
    pub receiver_city: String,
    pub receiver_barangay: String,
    pub receiver_street: String,

    pub is_fragile: bool,
    pub declared_value: Option<Decimal>,
    pub container_no: Option<String>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,

    pub status: PackageStatus,
    /// Last warehouse known to hold the package; None while overseas or
    /// once handed to a recipient/forwarder.
    pub warehouse_id: Option<Uuid>,
    /// Set when the package was created through a manifest import.
    pub manifest_id: Option<Uuid>,

    pub is_archived: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::warehouse::Entity",
        from = "Column::WarehouseId",
        to = "super::warehouse::Column::Id"
    )]
    Warehouse,

    #[sea_orm(has_many = "super::package_status_log::Entity")]
    StatusLogs,

    #[sea_orm(has_many = "super::shipment_package::Entity")]
    ShipmentPackages,
}

impl Related<super::warehouse::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouse.def()
    }
}

impl Related<super::package_status_log::Entity> for Entity {
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
