use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

use super::m20260101_000002_create_locations::Location;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(CarStatus::Enum)
                    .values([
                        CarStatus::Available,
                        CarStatus::Rented,
                        CarStatus::Maintenance,
                        CarStatus::Unavailable,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Car::Table)
                    .if_not_exists()
                    .col(uuid(Car::Id).primary_key())
                    .col(string_len(Car::Make, 50).not_null())
                    .col(string_len(Car::Model, 50).not_null())
                    .col(integer(Car::Year).not_null())
                    .col(string_len(Car::Category, 30).not_null())
                    .col(string_len(Car::Transmission, 20).not_null())
                    .col(string_len(Car::FuelType, 20).not_null())
                    .col(integer(Car::Seats).not_null())
                    .col(integer(Car::Doors).not_null())
                    .col(string_len(Car::Color, 30).not_null())
                    .col(string_len(Car::LicensePlate, 20).not_null().unique_key())
                    .col(string_len(Car::Vin, 17).not_null().unique_key())
                    .col(integer(Car::Mileage).not_null().default(0))
                    .col(decimal_len(Car::PricePerDay, 12, 2).not_null())
                    .col(uuid(Car::LocationId).not_null())
                    .col(
                        ColumnDef::new(Car::Status)
                            .custom(CarStatus::Enum)
                            .not_null()
                            .default("available"),
                    )
                    .col(boolean(Car::IsActive).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(Car::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_car_location")
                            .from(Car::Table, Car::LocationId)
                            .to(Location::Table, Location::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_car_location")
                    .table(Car::Table)
                    .col(Car::LocationId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Car::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(CarStatus::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Car {
    Table,
    Id,
    Make,
    Model,
    Year,
    Category,
    Transmission,
    FuelType,
    Seats,
    Doors,
    Color,
    LicensePlate,
    Vin,
    Mileage,
    PricePerDay,
    LocationId,
    Status,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum CarStatus {
    #[sea_orm(iden = "car_status")]
    Enum,
    #[sea_orm(iden = "available")]
    Available,
    #[sea_orm(iden = "rented")]
    Rented,
    #[sea_orm(iden = "maintenance")]
    Maintenance,
    #[sea_orm(iden = "unavailable")]
    Unavailable,
}
