use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Location::Table)
                    .if_not_exists()
                    .col(uuid(Location::Id).primary_key())
                    .col(string_len(Location::Name, 100).not_null())
                    .col(string_len(Location::Address, 255).not_null())
                    .col(string_len(Location::City, 100).not_null())
                    .col(string_len(Location::Country, 100).not_null())
                    .col(boolean(Location::IsActive).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(Location::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Location::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Location {
    Table,
    Id,
    Name,
    Address,
    City,
    Country,
    IsActive,
    CreatedAt,
}
