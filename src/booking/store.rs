//! Capabilities the booking core consumes. Production wiring uses the
//! sea-orm implementations in `crate::db::store`; tests use
//! `crate::booking::memory`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::booking::error::StoreResult;
use crate::entities::booking::{self, BookingStatus};
use crate::entities::car::{self, CarStatus};
use crate::entities::{location, promo_code, user};

/// Car-side effect of a pickup or return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarUpdate {
    pub car_id: Uuid,
    pub status: CarStatus,
    /// Odometer reading; only ever moves forward.
    pub mileage: Option<i32>,
}

#[async_trait]
pub trait CarStore: Send + Sync {
    async fn get_car(&self, id: Uuid) -> StoreResult<Option<car::Model>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<user::Model>>;
}

#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn get_location(&self, id: Uuid) -> StoreResult<Option<location::Model>>;
}

#[async_trait]
pub trait PromoStore: Send + Sync {
    async fn get_promo(&self, code: &str) -> StoreResult<Option<promo_code::Model>>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<booking::Model>>;

    /// Bookings for `car_id` in any of `statuses` whose range overlaps
    /// `[start, end]` inclusively, optionally ignoring one booking.
    async fn find_overlapping(
        &self,
        car_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: &[BookingStatus],
        exclude: Option<Uuid>,
    ) -> StoreResult<Vec<booking::Model>>;

    async fn count_all(&self) -> StoreResult<u64>;

    /// Insert `booking` unless another booking in `blocking` overlaps it.
    /// The check and the write are one atomic unit.
    async fn insert(
        &self,
        booking: booking::Model,
        blocking: &[BookingStatus],
    ) -> StoreResult<booking::Model>;

    /// Persist `booking` only if its stored status is still `expected`.
    /// With `blocking`, the overlap rule is re-checked in the same unit.
    async fn update(
        &self,
        booking: booking::Model,
        expected: BookingStatus,
        blocking: Option<&[BookingStatus]>,
    ) -> StoreResult<booking::Model>;

    /// Like `update`, and applies `car` in the same unit. Neither write
    /// lands unless both do.
    async fn update_with_car(
        &self,
        booking: booking::Model,
        expected: BookingStatus,
        car: CarUpdate,
    ) -> StoreResult<booking::Model>;

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<booking::Model>>;

    async fn list_all(&self, status: Option<BookingStatus>) -> StoreResult<Vec<booking::Model>>;

    async fn find_pending_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<booking::Model>>;
}
