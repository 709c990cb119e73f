pub use sea_orm_migration::prelude::*;

mod m20260101_000001_create_users;
mod m20260101_000002_create_locations;
mod m20260101_000003_create_cars;
mod m20260101_000004_create_promo_codes;
mod m20260101_000005_create_bookings;
mod m20260101_000006_add_booking_overlap_guard;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_users::Migration),
            Box::new(m20260101_000002_create_locations::Migration),
            Box::new(m20260101_000003_create_cars::Migration),
            Box::new(m20260101_000004_create_promo_codes::Migration),
            Box::new(m20260101_000005_create_bookings::Migration),
            Box::new(m20260101_000006_add_booking_overlap_guard::Migration),
        ]
    }
}
