use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::booking::pricing::PricingBreakdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "booking_status")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Expired
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "payment_status")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "insurance_type")]
#[serde(rename_all = "lowercase")]
pub enum InsuranceType {
    #[default]
    #[sea_orm(string_value = "basic")]
    Basic,
    #[sea_orm(string_value = "standard")]
    Standard,
    #[sea_orm(string_value = "premium")]
    Premium,
    #[sea_orm(string_value = "none")]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "fuel_level")]
#[serde(rename_all = "kebab-case")]
pub enum FuelLevel {
    #[sea_orm(string_value = "empty")]
    Empty,
    #[sea_orm(string_value = "quarter")]
    Quarter,
    #[sea_orm(string_value = "half")]
    Half,
    #[sea_orm(string_value = "three-quarters")]
    ThreeQuarters,
    #[sea_orm(string_value = "full")]
    Full,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addon {
    pub name: String,
    pub price: Decimal,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct AddonList(pub Vec<Addon>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageSeverity {
    Minor,
    Moderate,
    Severe,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageReport {
    pub description: String,
    pub severity: DamageSeverity,
    pub cost: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
    pub reported_at: DateTimeUtc,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct DamageReports(pub Vec<DamageReport>);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalCharge {
    pub description: String,
    pub amount: Decimal,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct AdditionalCharges(pub Vec<AdditionalCharge>);

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "booking")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub booking_number: String,
    pub user_id: Uuid,
    pub car_id: Uuid,
    pub start_date: DateTimeUtc,
    pub end_date: DateTimeUtc,
    pub pickup_location_id: Uuid,
    pub dropoff_location_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub daily_rate: Decimal,
    pub number_of_days: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub subtotal: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub insurance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub addons_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub taxes: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub discount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total: Decimal,
    #[sea_orm(column_type = "JsonBinary")]
    pub addons: AddonList,
    pub insurance_type: InsuranceType,
    pub promo_code: Option<String>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub actual_pickup_time: Option<DateTimeUtc>,
    pub actual_dropoff_time: Option<DateTimeUtc>,
    pub mileage_start: Option<i32>,
    pub mileage_end: Option<i32>,
    pub fuel_level_start: Option<FuelLevel>,
    pub fuel_level_end: Option<FuelLevel>,
    pub pickup_notes: Option<String>,
    pub dropoff_notes: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub damage_reports: DamageReports,
    #[sea_orm(column_type = "JsonBinary")]
    pub additional_charges: AdditionalCharges,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: Option<DateTimeUtc>,
    pub cancellation_reason: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub refund_amount: Option<Decimal>,
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn pricing(&self) -> PricingBreakdown {
        PricingBreakdown {
            daily_rate: self.daily_rate,
            number_of_days: self.number_of_days,
            subtotal: self.subtotal,
            insurance: self.insurance,
            addons: self.addons_total,
            taxes: self.taxes,
            discount: self.discount,
            total: self.total,
        }
    }

    /// Charges raised at return on top of the booked total.
    pub fn extra_charges(&self) -> Decimal {
        let charges: Decimal = self.additional_charges.0.iter().map(|c| c.amount).sum();
        let damage: Decimal = self.damage_reports.0.iter().map(|d| d.cost).sum();
        charges + damage
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::car::Entity",
        from = "Column::CarId",
        to = "super::car::Column::Id"
    )]
    Car,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::car::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Car.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
