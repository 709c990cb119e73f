use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Rejects a second confirmed or active booking whose inclusive date range
/// intersects another one for the same car.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("CREATE EXTENSION IF NOT EXISTS btree_gist")
            .await?;

        db.execute_unprepared(
            "ALTER TABLE booking ADD CONSTRAINT booking_no_overlap \
             EXCLUDE USING gist (car_id WITH =, tstzrange(start_date, end_date, '[]') WITH &&) \
             WHERE (status IN ('confirmed', 'active'))",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("ALTER TABLE booking DROP CONSTRAINT IF EXISTS booking_no_overlap")
            .await?;

        Ok(())
    }
}
