use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PromoCode::Table)
                    .if_not_exists()
                    .col(string_len(PromoCode::Code, 32).primary_key())
                    .col(decimal_len(PromoCode::Discount, 12, 2).not_null())
                    .col(boolean(PromoCode::IsActive).not_null().default(true))
                    .col(timestamp_with_time_zone_null(PromoCode::ExpiresAt))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PromoCode::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum PromoCode {
    Table,
    Code,
    Discount,
    IsActive,
    ExpiresAt,
}
