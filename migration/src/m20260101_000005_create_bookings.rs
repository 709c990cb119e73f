use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

use super::m20260101_000001_create_users::User;
use super::m20260101_000002_create_locations::Location;
use super::m20260101_000003_create_cars::Car;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(BookingStatus::Enum)
                    .values([
                        BookingStatus::Pending,
                        BookingStatus::Confirmed,
                        BookingStatus::Active,
                        BookingStatus::Completed,
                        BookingStatus::Cancelled,
                        BookingStatus::Expired,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(PaymentStatus::Enum)
                    .values([
                        PaymentStatus::Pending,
                        PaymentStatus::Paid,
                        PaymentStatus::Failed,
                        PaymentStatus::Refunded,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(InsuranceType::Enum)
                    .values([
                        InsuranceType::Basic,
                        InsuranceType::Standard,
                        InsuranceType::Premium,
                        InsuranceType::None,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(FuelLevel::Enum)
                    .values([
                        FuelLevel::Empty,
                        FuelLevel::Quarter,
                        FuelLevel::Half,
                        FuelLevel::ThreeQuarters,
                        FuelLevel::Full,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Booking::Table)
                    .if_not_exists()
                    .col(uuid(Booking::Id).primary_key())
                    .col(string_len(Booking::BookingNumber, 32).not_null().unique_key())
                    .col(uuid(Booking::UserId).not_null())
                    .col(uuid(Booking::CarId).not_null())
                    .col(timestamp_with_time_zone(Booking::StartDate).not_null())
                    .col(timestamp_with_time_zone(Booking::EndDate).not_null())
                    .col(uuid(Booking::PickupLocationId).not_null())
                    .col(uuid(Booking::DropoffLocationId).not_null())
                    .col(decimal_len(Booking::DailyRate, 12, 2).not_null())
                    .col(integer(Booking::NumberOfDays).not_null())
                    .col(decimal_len(Booking::Subtotal, 12, 2).not_null())
                    .col(decimal_len(Booking::Insurance, 12, 2).not_null().default(0))
                    .col(decimal_len(Booking::AddonsTotal, 12, 2).not_null().default(0))
                    .col(decimal_len(Booking::Taxes, 12, 2).not_null().default(0))
                    .col(decimal_len(Booking::Discount, 12, 2).not_null().default(0))
                    .col(decimal_len(Booking::Total, 12, 2).not_null())
                    .col(
                        json_binary(Booking::Addons)
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Booking::InsuranceType)
                            .custom(InsuranceType::Enum)
                            .not_null()
                            .default("basic"),
                    )
                    .col(string_len_null(Booking::PromoCode, 32))
                    .col(
                        ColumnDef::new(Booking::Status)
                            .custom(BookingStatus::Enum)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Booking::PaymentStatus)
                            .custom(PaymentStatus::Enum)
                            .not_null()
                            .default("pending"),
                    )
                    .col(string_len_null(Booking::PaymentReference, 100))
                    .col(timestamp_with_time_zone_null(Booking::ActualPickupTime))
                    .col(timestamp_with_time_zone_null(Booking::ActualDropoffTime))
                    .col(integer_null(Booking::MileageStart))
                    .col(integer_null(Booking::MileageEnd))
                    .col(ColumnDef::new(Booking::FuelLevelStart).custom(FuelLevel::Enum).null())
                    .col(ColumnDef::new(Booking::FuelLevelEnd).custom(FuelLevel::Enum).null())
                    .col(text_null(Booking::PickupNotes))
                    .col(text_null(Booking::DropoffNotes))
                    .col(
                        json_binary(Booking::DamageReports)
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        json_binary(Booking::AdditionalCharges)
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(uuid_null(Booking::CancelledBy))
                    .col(timestamp_with_time_zone_null(Booking::CancelledAt))
                    .col(text_null(Booking::CancellationReason))
                    .col(decimal_len_null(Booking::RefundAmount, 12, 2))
                    .col(text_null(Booking::Notes))
                    .col(
                        timestamp_with_time_zone(Booking::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Booking::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_user")
                            .from(Booking::Table, Booking::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_car")
                            .from(Booking::Table, Booking::CarId)
                            .to(Car::Table, Car::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_pickup_location")
                            .from(Booking::Table, Booking::PickupLocationId)
                            .to(Location::Table, Location::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_dropoff_location")
                            .from(Booking::Table, Booking::DropoffLocationId)
                            .to(Location::Table, Location::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .check(Expr::col(Booking::EndDate).gt(Expr::col(Booking::StartDate)))
                    .to_owned(),
            )
            .await?;

        // Availability checks scan by car and date range
        manager
            .create_index(
                Index::create()
                    .name("idx_booking_car_dates")
                    .table(Booking::Table)
                    .col(Booking::CarId)
                    .col(Booking::StartDate)
                    .col(Booking::EndDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_booking_user")
                    .table(Booking::Table)
                    .col(Booking::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_booking_status_created")
                    .table(Booking::Table)
                    .col(Booking::Status)
                    .col(Booking::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Booking::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(FuelLevel::Enum).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(InsuranceType::Enum).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(PaymentStatus::Enum).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(BookingStatus::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Booking {
    Table,
    Id,
    BookingNumber,
    UserId,
    CarId,
    StartDate,
    EndDate,
    PickupLocationId,
    DropoffLocationId,
    DailyRate,
    NumberOfDays,
    Subtotal,
    Insurance,
    AddonsTotal,
    Taxes,
    Discount,
    Total,
    Addons,
    InsuranceType,
    PromoCode,
    Status,
    PaymentStatus,
    PaymentReference,
    ActualPickupTime,
    ActualDropoffTime,
    MileageStart,
    MileageEnd,
    FuelLevelStart,
    FuelLevelEnd,
    PickupNotes,
    DropoffNotes,
    DamageReports,
    AdditionalCharges,
    CancelledBy,
    CancelledAt,
    CancellationReason,
    RefundAmount,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum BookingStatus {
    #[sea_orm(iden = "booking_status")]
    Enum,
    #[sea_orm(iden = "pending")]
    Pending,
    #[sea_orm(iden = "confirmed")]
    Confirmed,
    #[sea_orm(iden = "active")]
    Active,
    #[sea_orm(iden = "completed")]
    Completed,
    #[sea_orm(iden = "cancelled")]
    Cancelled,
    #[sea_orm(iden = "expired")]
    Expired,
}

#[derive(DeriveIden)]
pub enum PaymentStatus {
    #[sea_orm(iden = "payment_status")]
    Enum,
    #[sea_orm(iden = "pending")]
    Pending,
    #[sea_orm(iden = "paid")]
    Paid,
    #[sea_orm(iden = "failed")]
    Failed,
    #[sea_orm(iden = "refunded")]
    Refunded,
}

#[derive(DeriveIden)]
pub enum InsuranceType {
    #[sea_orm(iden = "insurance_type")]
    Enum,
    #[sea_orm(iden = "basic")]
    Basic,
    #[sea_orm(iden = "standard")]
    Standard,
    #[sea_orm(iden = "premium")]
    Premium,
    #[sea_orm(iden = "none")]
    None,
}

#[derive(DeriveIden)]
pub enum FuelLevel {
    #[sea_orm(iden = "fuel_level")]
    Enum,
    #[sea_orm(iden = "empty")]
    Empty,
    #[sea_orm(iden = "quarter")]
    Quarter,
    #[sea_orm(iden = "half")]
    Half,
    #[sea_orm(iden = "three-quarters")]
    ThreeQuarters,
    #[sea_orm(iden = "full")]
    Full,
}
