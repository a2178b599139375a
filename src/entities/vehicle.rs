use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

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
pub enum VehicleType {
    #[sea_orm(string_value = "VAN")]
    Van,

    #[sea_orm(string_value = "TRUCK")]
    Truck,
}

impl VehicleType {
    /// Inclusive weight-capacity range (kg) a vehicle of this type may
    /// be registered with.
    pub fn capacity_range(self) -> (Decimal, Decimal) {
        match self {
            VehicleType::Van => (dec!(50), dec!(1500)),
            VehicleType::Truck => (dec!(1000), dec!(20000)),
        }
    }

    pub fn capacity_in_range(self, capacity: Decimal) -> bool {
        let (min, max) = self.capacity_range();
        capacity >= min && capacity <= max
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vehicles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub plate_number: String,
    pub name: Option<String>,
    pub vehicle_type: VehicleType,
    pub weight_capacity_kg: Decimal,

    /// Whether the vehicle may carry EXPRESS packages.
    pub is_express: bool,
    pub in_maintenance: bool,
    pub notes: Option<String>,

    pub is_archived: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

impl Model {
    /// A vehicle can be put on a new shipment only when it is neither
    /// archived nor in the shop.
    pub fn is_assignable(&self) -> bool {
        !self.is_archived && !self.in_maintenance
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::shipment::Entity")]
    Shipments,
}

impl Related<super::shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipments.def()
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
