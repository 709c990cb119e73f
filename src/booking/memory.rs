//! In-memory implementation of every store capability, for tests and
//! local experiments. One mutex guards all tables so each check-and-write
//! is atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::booking::availability::overlaps;
use crate::booking::error::{StoreError, StoreResult};
use crate::booking::store::{
    BookingStore, CarStore, CarUpdate, LocationStore, PromoStore, UserStore,
};
use crate::entities::booking::{self, BookingStatus};
use crate::entities::car;
use crate::entities::{location, promo_code, user};

#[derive(Default)]
struct Tables {
    cars: HashMap<Uuid, car::Model>,
    users: HashMap<Uuid, user::Model>,
    locations: HashMap<Uuid, location::Model>,
    promos: HashMap<String, promo_code::Model>,
    bookings: HashMap<Uuid, booking::Model>,
}

impl Tables {
    fn overlapping(
        &self,
        car_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: &[BookingStatus],
        exclude: Option<Uuid>,
    ) -> Vec<booking::Model> {
        self.bookings
            .values()
            .filter(|b| b.car_id == car_id)
            .filter(|b| Some(b.id) != exclude)
            .filter(|b| statuses.contains(&b.status))
            .filter(|b| overlaps(b.start_date, b.end_date, start, end))
            .cloned()
            .collect()
    }

    fn check_update(
        &self,
        booking: &booking::Model,
        expected: BookingStatus,
        blocking: Option<&[BookingStatus]>,
    ) -> StoreResult<()> {
        match self.bookings.get(&booking.id) {
            Some(stored) if stored.status == expected => {}
            _ => return Err(StoreError::Stale),
        }
        if let Some(blocking) = blocking {
            let conflicts = self.overlapping(
                booking.car_id,
                booking.start_date,
                booking.end_date,
                blocking,
                Some(booking.id),
            );
            if !conflicts.is_empty() {
                return Err(StoreError::Overlap);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_car(&self, car: car::Model) {
        self.tables.lock().await.cars.insert(car.id, car);
    }

    pub async fn put_user(&self, user: user::Model) {
        self.tables.lock().await.users.insert(user.id, user);
    }

    pub async fn put_location(&self, location: location::Model) {
        self.tables.lock().await.locations.insert(location.id, location);
    }

    pub async fn put_promo(&self, promo: promo_code::Model) {
        self.tables
            .lock()
            .await
            .promos
            .insert(promo.code.clone(), promo);
    }

    #[cfg(test)]
    pub(crate) async fn remove_car(&self, id: Uuid) {
        self.tables.lock().await.cars.remove(&id);
    }
}

#[async_trait]
impl CarStore for InMemoryStore {
    async fn get_car(&self, id: Uuid) -> StoreResult<Option<car::Model>> {
        Ok(self.tables.lock().await.cars.get(&id).cloned())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<user::Model>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl LocationStore for InMemoryStore {
    async fn get_location(&self, id: Uuid) -> StoreResult<Option<location::Model>> {
        Ok(self.tables.lock().await.locations.get(&id).cloned())
    }
}

#[async_trait]
impl PromoStore for InMemoryStore {
    async fn get_promo(&self, code: &str) -> StoreResult<Option<promo_code::Model>> {
        Ok(self.tables.lock().await.promos.get(code).cloned())
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<booking::Model>> {
        Ok(self.tables.lock().await.bookings.get(&id).cloned())
    }

    async fn find_overlapping(
        &self,
        car_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: &[BookingStatus],
        exclude: Option<Uuid>,
    ) -> StoreResult<Vec<booking::Model>> {
        let tables = self.tables.lock().await;
        Ok(tables.overlapping(car_id, start, end, statuses, exclude))
    }

    async fn count_all(&self) -> StoreResult<u64> {
        Ok(self.tables.lock().await.bookings.len() as u64)
    }

    async fn insert(
        &self,
        booking: booking::Model,
        blocking: &[BookingStatus],
    ) -> StoreResult<booking::Model> {
        let mut tables = self.tables.lock().await;

        if tables
            .bookings
            .values()
            .any(|b| b.booking_number == booking.booking_number)
        {
            return Err(StoreError::DuplicateNumber);
        }
        if !tables
            .overlapping(booking.car_id, booking.start_date, booking.end_date, blocking, None)
            .is_empty()
        {
            return Err(StoreError::Overlap);
        }

        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn update(
        &self,
        booking: booking::Model,
        expected: BookingStatus,
        blocking: Option<&[BookingStatus]>,
    ) -> StoreResult<booking::Model> {
        let mut tables = self.tables.lock().await;
        tables.check_update(&booking, expected, blocking)?;

        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn update_with_car(
        &self,
        booking: booking::Model,
        expected: BookingStatus,
        update: CarUpdate,
    ) -> StoreResult<booking::Model> {
        let mut tables = self.tables.lock().await;
        tables.check_update(&booking, expected, None)?;

        let car = tables
            .cars
            .get_mut(&update.car_id)
            .ok_or_else(|| StoreError::Backend(format!("car {} missing", update.car_id)))?;
        car.status = update.status;
        if let Some(mileage) = update.mileage {
            car.mileage = car.mileage.max(mileage);
        }

        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<booking::Model>> {
        let tables = self.tables.lock().await;
        let mut found: Vec<_> = tables
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn list_all(&self, status: Option<BookingStatus>) -> StoreResult<Vec<booking::Model>> {
        let tables = self.tables.lock().await;
        let mut found: Vec<_> = tables
            .bookings
            .values()
            .filter(|b| status.is_none_or(|s| b.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn find_pending_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<booking::Model>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending && b.created_at < cutoff)
            .cloned()
            .collect())
    }
}
