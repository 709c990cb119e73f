//! sea-orm implementation of the booking store capabilities.
//!
//! Every check-and-write runs in a SERIALIZABLE transaction; status
//! updates are compare-and-set on the prior status. The overlap exclusion
//! constraint and the unique booking number index back both up.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IsolationLevel, PaginatorTrait, QueryFilter, QueryOrder, QueryTrait, Select, Set, SqlErr,
    TransactionTrait,
};
use uuid::Uuid;

use crate::booking::error::{StoreError, StoreResult};
use crate::booking::store::{
    BookingStore, CarStore, CarUpdate, LocationStore, PromoStore, UserStore,
};
use crate::entities::booking::{self, BookingStatus};
use crate::entities::car;
use crate::entities::{location, promo_code, user};

/// Name of the exclusion constraint created by the migrations.
const OVERLAP_CONSTRAINT: &str = "booking_no_overlap";

#[derive(Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn classify(e: DbErr) -> StoreError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = e.sql_err() {
        if detail.contains("booking_number") {
            return StoreError::DuplicateNumber;
        }
    }

    let message = e.to_string();
    if message.contains(OVERLAP_CONSTRAINT) {
        StoreError::Overlap
    } else if message.contains("could not serialize access") {
        StoreError::Serialization
    } else {
        StoreError::Backend(message)
    }
}

fn overlapping(
    car_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    statuses: &[BookingStatus],
    exclude: Option<Uuid>,
) -> Select<booking::Entity> {
    booking::Entity::find()
        .filter(booking::Column::CarId.eq(car_id))
        .filter(booking::Column::Status.is_in(statuses.iter().copied()))
        .filter(booking::Column::StartDate.lte(end))
        .filter(booking::Column::EndDate.gte(start))
        .apply_if(exclude, |q, id| q.filter(booking::Column::Id.ne(id)))
}

async fn has_overlap<C: ConnectionTrait>(
    conn: &C,
    booking: &booking::Model,
    blocking: &[BookingStatus],
    exclude: Option<Uuid>,
) -> StoreResult<bool> {
    let conflicts = overlapping(
        booking.car_id,
        booking.start_date,
        booking.end_date,
        blocking,
        exclude,
    )
    .count(conn)
    .await
    .map_err(classify)?;
    Ok(conflicts > 0)
}

/// Compare-and-set write of `booking` on its prior status.
async fn guarded_update<C: ConnectionTrait>(
    conn: &C,
    booking: &booking::Model,
    expected: BookingStatus,
    blocking: Option<&[BookingStatus]>,
) -> StoreResult<()> {
    if let Some(blocking) = blocking {
        if has_overlap(conn, booking, blocking, Some(booking.id)).await? {
            return Err(StoreError::Overlap);
        }
    }

    let result = booking::Entity::update_many()
        .set(booking::ActiveModel::from(booking.clone()).reset_all())
        .filter(booking::Column::Id.eq(booking.id))
        .filter(booking::Column::Status.eq(expected))
        .exec(conn)
        .await
        .map_err(classify)?;

    if result.rows_affected == 0 {
        return Err(StoreError::Stale);
    }
    Ok(())
}

async fn apply_car_update<C: ConnectionTrait>(conn: &C, update: CarUpdate) -> StoreResult<()> {
    let car = car::Entity::find_by_id(update.car_id)
        .one(conn)
        .await
        .map_err(classify)?
        .ok_or_else(|| StoreError::Backend(format!("Car {} not found", update.car_id)))?;

    let mileage = update.mileage.map_or(car.mileage, |m| m.max(car.mileage));
    let mut active: car::ActiveModel = car.into();
    active.status = Set(update.status);
    active.mileage = Set(mileage);
    active.update(conn).await.map_err(classify)?;
    Ok(())
}

#[async_trait]
impl CarStore for SeaOrmStore {
    async fn get_car(&self, id: Uuid) -> StoreResult<Option<car::Model>> {
        Ok(car::Entity::find_by_id(id).one(&self.db).await?)
    }
}

#[async_trait]
impl UserStore for SeaOrmStore {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<user::Model>> {
        Ok(user::Entity::find_by_id(id).one(&self.db).await?)
    }
}

#[async_trait]
impl LocationStore for SeaOrmStore {
    async fn get_location(&self, id: Uuid) -> StoreResult<Option<location::Model>> {
        Ok(location::Entity::find_by_id(id).one(&self.db).await?)
    }
}

#[async_trait]
impl PromoStore for SeaOrmStore {
    async fn get_promo(&self, code: &str) -> StoreResult<Option<promo_code::Model>> {
        Ok(promo_code::Entity::find_by_id(code.to_string())
            .one(&self.db)
            .await?)
    }
}

#[async_trait]
impl BookingStore for SeaOrmStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<booking::Model>> {
        Ok(booking::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_overlapping(
        &self,
        car_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: &[BookingStatus],
        exclude: Option<Uuid>,
    ) -> StoreResult<Vec<booking::Model>> {
        Ok(overlapping(car_id, start, end, statuses, exclude)
            .all(&self.db)
            .await?)
    }

    async fn count_all(&self) -> StoreResult<u64> {
        Ok(booking::Entity::find().count(&self.db).await?)
    }

    async fn insert(
        &self,
        booking: booking::Model,
        blocking: &[BookingStatus],
    ) -> StoreResult<booking::Model> {
        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::Serializable), None)
            .await
            .map_err(classify)?;

        if has_overlap(&txn, &booking, blocking, None).await? {
            txn.rollback().await?;
            return Err(StoreError::Overlap);
        }

        let created = booking::ActiveModel::from(booking)
            .reset_all()
            .insert(&txn)
            .await
            .map_err(classify)?;
        txn.commit().await.map_err(classify)?;

        tracing::debug!(booking_number = %created.booking_number, "Booking row inserted");
        Ok(created)
    }

    async fn update(
        &self,
        booking: booking::Model,
        expected: BookingStatus,
        blocking: Option<&[BookingStatus]>,
    ) -> StoreResult<booking::Model> {
        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::Serializable), None)
            .await
            .map_err(classify)?;

        if let Err(e) = guarded_update(&txn, &booking, expected, blocking).await {
            txn.rollback().await?;
            return Err(e);
        }
        txn.commit().await.map_err(classify)?;

        tracing::debug!(
            booking_number = %booking.booking_number,
            from = ?expected,
            to = ?booking.status,
            "Booking row updated"
        );
        Ok(booking)
    }

    async fn update_with_car(
        &self,
        booking: booking::Model,
        expected: BookingStatus,
        update: CarUpdate,
    ) -> StoreResult<booking::Model> {
        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::Serializable), None)
            .await
            .map_err(classify)?;

        let written = async {
            guarded_update(&txn, &booking, expected, None).await?;
            apply_car_update(&txn, update).await
        }
        .await;
        if let Err(e) = written {
            txn.rollback().await?;
            return Err(e);
        }
        txn.commit().await.map_err(classify)?;

        tracing::debug!(
            booking_number = %booking.booking_number,
            from = ?expected,
            to = ?booking.status,
            car_id = %update.car_id,
            car_status = ?update.status,
            "Booking and car rows updated"
        );
        Ok(booking)
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<booking::Model>> {
        Ok(booking::Entity::find()
            .filter(booking::Column::UserId.eq(user_id))
            .order_by_desc(booking::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn list_all(&self, status: Option<BookingStatus>) -> StoreResult<Vec<booking::Model>> {
        Ok(booking::Entity::find()
            .apply_if(status, |q, s| q.filter(booking::Column::Status.eq(s)))
            .order_by_desc(booking::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn find_pending_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<booking::Model>> {
        Ok(booking::Entity::find()
            .filter(booking::Column::Status.eq(BookingStatus::Pending))
            .filter(booking::Column::CreatedAt.lt(cutoff))
            .all(&self.db)
            .await?)
    }
}
