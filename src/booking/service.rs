use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::booking::availability::{self, BLOCKING_STATUSES};
use crate::booking::error::{BookingError, BookingResult};
use crate::booking::lifecycle::{self, BookingEvent};
use crate::booking::number;
use crate::booking::payment::{PaymentAuthorization, PaymentGateway};
use crate::booking::pricing::{self, PricingPolicy};
use crate::booking::store::{
    BookingStore, CarStore, CarUpdate, LocationStore, PromoStore, UserStore,
};
use crate::entities::booking::{
    self, AddonList, AdditionalCharges, Addon, BookingStatus, DamageReports, InsuranceType,
    PaymentStatus,
};
use crate::entities::car::CarStatus;
use crate::entities::user::UserRole;

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub car_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub pickup_location_id: Uuid,
    pub dropoff_location_id: Uuid,
    #[serde(default)]
    pub addons: Vec<Addon>,
    #[serde(default)]
    pub insurance_type: InsuranceType,
    pub promo_code: Option<String>,
    pub notes: Option<String>,
}

/// Who is acting on a booking.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
}

impl Actor {
    pub fn may_manage(&self, booking: &booking::Model) -> bool {
        booking.user_id == self.id || self.role.is_staff()
    }
}

#[derive(Debug, Clone)]
pub struct Cancellation {
    pub booking: booking::Model,
    pub refund_amount: Decimal,
}

/// The Booking Lifecycle Manager.
#[derive(Clone)]
pub struct BookingService {
    cars: Arc<dyn CarStore>,
    users: Arc<dyn UserStore>,
    locations: Arc<dyn LocationStore>,
    promos: Arc<dyn PromoStore>,
    bookings: Arc<dyn BookingStore>,
    payments: Arc<dyn PaymentGateway>,
    policy: PricingPolicy,
    write_attempts: u32,
}

impl BookingService {
    /// Wire every capability from one store value.
    pub fn new<S>(
        store: Arc<S>,
        payments: Arc<dyn PaymentGateway>,
        policy: PricingPolicy,
        write_attempts: u32,
    ) -> Self
    where
        S: CarStore + UserStore + LocationStore + PromoStore + BookingStore + 'static,
    {
        Self {
            cars: store.clone(),
            users: store.clone(),
            locations: store.clone(),
            promos: store.clone(),
            bookings: store,
            payments,
            policy,
            write_attempts: write_attempts.max(1),
        }
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    pub async fn is_available(
        &self,
        car_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BookingResult<bool> {
        availability::is_available(
            self.cars.as_ref(),
            self.bookings.as_ref(),
            car_id,
            start,
            end,
            Utc::now(),
        )
        .await
    }

    pub async fn get_booking(&self, id: Uuid) -> BookingResult<booking::Model> {
        self.bookings
            .find_by_id(id)
            .await?
            .ok_or_else(|| BookingError::not_found("Booking"))
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> BookingResult<Vec<booking::Model>> {
        Ok(self.bookings.list_for_user(user_id).await?)
    }

    pub async fn list_all(
        &self,
        status: Option<BookingStatus>,
    ) -> BookingResult<Vec<booking::Model>> {
        Ok(self.bookings.list_all(status).await?)
    }

    pub async fn create_booking(
        &self,
        user_id: Uuid,
        request: NewBooking,
    ) -> BookingResult<booking::Model> {
        let now = Utc::now();
        availability::validate_range(request.start_date, request.end_date, now)?;

        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or_else(|| BookingError::not_found("User"))?;
        if !user.is_active {
            return Err(BookingError::NotEligible("Account is not active".to_string()));
        }
        if !user.is_eligible_to_rent(now) {
            return Err(BookingError::NotEligible(
                "You must be at least 21 years old to rent a car".to_string(),
            ));
        }

        let car = self
            .cars
            .get_car(request.car_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Car"))?;
        if !car.is_rentable() {
            return Err(BookingError::Conflict(
                "Car is not available for rental".to_string(),
            ));
        }

        for (id, entity) in [
            (request.pickup_location_id, "Pickup location"),
            (request.dropoff_location_id, "Dropoff location"),
        ] {
            match self.locations.get_location(id).await? {
                Some(location) if location.is_active => {}
                _ => return Err(BookingError::not_found(entity)),
            }
        }

        let (promo_code, promo_discount) = match request.promo_code.as_deref() {
            Some(code) => {
                let code = code.trim().to_uppercase();
                let promo = self
                    .promos
                    .get_promo(&code)
                    .await?
                    .filter(|p| p.is_redeemable(now))
                    .ok_or_else(|| {
                        BookingError::Validation("Invalid or expired promo code".to_string())
                    })?;
                (Some(code), promo.discount)
            }
            None => (None, Decimal::ZERO),
        };

        let pricing = pricing::compute_pricing(
            car.price_per_day,
            request.start_date,
            request.end_date,
            &request.addons,
            request.insurance_type,
            promo_discount,
            &self.policy,
        )?;

        let mut draft = booking::Model {
            id: Uuid::new_v4(),
            booking_number: String::new(),
            user_id: user.id,
            car_id: car.id,
            start_date: request.start_date,
            end_date: request.end_date,
            pickup_location_id: request.pickup_location_id,
            dropoff_location_id: request.dropoff_location_id,
            daily_rate: pricing.daily_rate,
            number_of_days: pricing.number_of_days,
            subtotal: pricing.subtotal,
            insurance: pricing.insurance,
            addons_total: pricing.addons,
            taxes: pricing.taxes,
            discount: pricing.discount,
            total: pricing.total,
            addons: AddonList(request.addons),
            insurance_type: request.insurance_type,
            promo_code,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_reference: None,
            actual_pickup_time: None,
            actual_dropoff_time: None,
            mileage_start: None,
            mileage_end: None,
            fuel_level_start: None,
            fuel_level_end: None,
            pickup_notes: None,
            dropoff_notes: None,
            damage_reports: DamageReports::default(),
            additional_charges: AdditionalCharges::default(),
            cancelled_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            refund_amount: None,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };

        let mut attempt = 1;
        loop {
            let count = self.bookings.count_all().await?;
            draft.booking_number = number::generate(count, Utc::now());

            match self.bookings.insert(draft.clone(), &BLOCKING_STATUSES).await {
                Ok(created) => {
                    tracing::info!(
                        booking_number = %created.booking_number,
                        car_id = %created.car_id,
                        user_id = %created.user_id,
                        total = %created.total,
                        "Booking created"
                    );
                    return Ok(created);
                }
                Err(e) if e.is_retryable() && attempt < self.write_attempts => {
                    tracing::warn!(attempt, error = %e, "Retrying booking insert");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn transition(
        &self,
        booking_id: Uuid,
        event: BookingEvent,
    ) -> BookingResult<booking::Model> {
        let mut booking = self.get_booking(booking_id).await?;
        let from = booking.status;
        let to = lifecycle::next_status(from, &event).inspect_err(|e| {
            tracing::warn!(booking_number = %booking.booking_number, error = %e, "Transition rejected");
        })?;

        let now = Utc::now();
        booking.updated_at = now;

        let saved = match &event {
            BookingEvent::Confirm => return self.confirm(booking, now).await,
            BookingEvent::Pickup(report) => {
                booking.record_pickup(report, now)?;
                booking.status = to;
                let car = CarUpdate {
                    car_id: booking.car_id,
                    status: CarStatus::Rented,
                    mileage: None,
                };
                self.bookings.update_with_car(booking, from, car).await?
            }
            BookingEvent::Return(report) => {
                booking.record_return(report, now)?;
                booking.status = to;
                let car = CarUpdate {
                    car_id: booking.car_id,
                    status: CarStatus::Available,
                    mileage: Some(report.mileage_end),
                };
                self.bookings.update_with_car(booking, from, car).await?
            }
            BookingEvent::Expire => {
                booking.status = to;
                self.bookings.update(booking, from, None).await?
            }
        };

        tracing::info!(
            booking_number = %saved.booking_number,
            from = ?from,
            to = ?saved.status,
            "Booking transitioned"
        );
        Ok(saved)
    }

    /// Confirm on the renter's behalf. Only the owner may, since it charges them.
    pub async fn confirm_booking(
        &self,
        booking_id: Uuid,
        actor: Actor,
    ) -> BookingResult<booking::Model> {
        let booking = self.get_booking(booking_id).await?;
        if booking.user_id != actor.id {
            return Err(BookingError::Forbidden(
                "Only the renter can confirm and pay for a booking".to_string(),
            ));
        }
        self.transition(booking_id, BookingEvent::Confirm).await
    }

    async fn confirm(
        &self,
        mut booking: booking::Model,
        now: DateTime<Utc>,
    ) -> BookingResult<booking::Model> {
        let conflicting = self
            .bookings
            .find_overlapping(
                booking.car_id,
                booking.start_date,
                booking.end_date,
                &BLOCKING_STATUSES,
                Some(booking.id),
            )
            .await?;
        if !conflicting.is_empty() {
            return Err(BookingError::Conflict(
                "Car is already reserved for the requested dates".to_string(),
            ));
        }

        match self.payments.authorize(&booking).await? {
            PaymentAuthorization::Declined { reason } => {
                tracing::warn!(booking_number = %booking.booking_number, %reason, "Payment declined");
                booking.payment_status = PaymentStatus::Failed;
                self.bookings
                    .update(booking, BookingStatus::Pending, None)
                    .await?;
                Err(BookingError::PaymentDeclined(reason))
            }
            PaymentAuthorization::Approved { reference } => {
                booking.status = BookingStatus::Confirmed;
                booking.payment_status = PaymentStatus::Paid;
                booking.payment_reference = Some(reference);
                booking.updated_at = now;

                match self
                    .bookings
                    .update(booking.clone(), BookingStatus::Pending, Some(&BLOCKING_STATUSES))
                    .await
                {
                    Ok(saved) => {
                        tracing::info!(
                            booking_number = %saved.booking_number,
                            "Booking confirmed"
                        );
                        Ok(saved)
                    }
                    Err(e) => {
                        // Charged but lost the race for the dates; hand the money back.
                        tracing::warn!(
                            booking_number = %booking.booking_number,
                            error = %e,
                            "Confirmation lost, refunding authorization"
                        );
                        self.payments.refund(&booking, booking.total).await?;
                        Err(e.into())
                    }
                }
            }
        }
    }

    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        actor: Actor,
        reason: Option<String>,
    ) -> BookingResult<Cancellation> {
        let mut booking = self.get_booking(booking_id).await?;
        if !actor.may_manage(&booking) {
            return Err(BookingError::Forbidden(
                "You can only cancel your own bookings".to_string(),
            ));
        }
        lifecycle::ensure_cancellable(booking.status)?;

        let now = Utc::now();
        let from = booking.status;
        let paid = booking.payment_status == PaymentStatus::Paid;
        let refund_amount = if paid {
            booking.calculate_refund(now)
        } else {
            Decimal::ZERO
        };

        booking.status = BookingStatus::Cancelled;
        booking.cancelled_by = Some(actor.id);
        booking.cancelled_at = Some(now);
        booking.cancellation_reason = reason;
        booking.refund_amount = Some(refund_amount);
        booking.updated_at = now;
        if paid && refund_amount > Decimal::ZERO {
            booking.payment_status = PaymentStatus::Refunded;
        }

        let saved = self.bookings.update(booking, from, None).await?;

        if refund_amount > Decimal::ZERO {
            self.payments.refund(&saved, refund_amount).await.map_err(|e| {
                tracing::error!(
                    booking_number = %saved.booking_number,
                    %refund_amount,
                    error = %e,
                    "Booking cancelled but refund failed"
                );
                BookingError::Store(format!("Refund failed: {}", e))
            })?;
        }

        tracing::info!(
            booking_number = %saved.booking_number,
            cancelled_by = %actor.id,
            %refund_amount,
            "Booking cancelled"
        );
        Ok(Cancellation {
            booking: saved,
            refund_amount,
        })
    }

    /// Expire pending bookings left unconfirmed longer than `window`.
    /// Returns how many were expired.
    pub async fn expire_pending(&self, window: Duration) -> BookingResult<usize> {
        let cutoff = Utc::now() - window;
        let stale = self.bookings.find_pending_created_before(cutoff).await?;

        let mut expired = 0;
        for booking in stale {
            match self.transition(booking.id, BookingEvent::Expire).await {
                Ok(_) => expired += 1,
                // Confirmed or cancelled since it was listed.
                Err(BookingError::Conflict(_)) | Err(BookingError::InvalidTransition { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        if expired > 0 {
            tracing::info!(expired, "Expired unconfirmed bookings");
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use crate::booking::error::{StoreError, StoreResult};
    use crate::booking::lifecycle::{PickupReport, ReturnReport};
    use crate::booking::memory::InMemoryStore;
    use crate::booking::payment::CounterPaymentGateway;
    use crate::booking::pricing::InsuranceRates;
    use crate::entities::booking::{AdditionalCharge, FuelLevel};
    use crate::entities::user::tests::sample_user;
    use crate::entities::{car, location, promo_code};

    struct DecliningGateway;

    #[async_trait]
    impl PaymentGateway for DecliningGateway {
        async fn authorize(&self, _: &booking::Model) -> StoreResult<PaymentAuthorization> {
            Ok(PaymentAuthorization::Declined {
                reason: "insufficient funds".to_string(),
            })
        }

        async fn refund(&self, _: &booking::Model, _: Decimal) -> StoreResult<()> {
            Ok(())
        }
    }

    /// Booking store where another writer takes the drafted booking number
    /// just before each of the first `collisions` inserts.
    struct CollidingInserts {
        inner: Arc<InMemoryStore>,
        collisions: AtomicU32,
        attempts: AtomicU32,
    }

    impl CollidingInserts {
        fn new(inner: Arc<InMemoryStore>, collisions: u32) -> Self {
            Self {
                inner,
                collisions: AtomicU32::new(collisions),
                attempts: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl BookingStore for CollidingInserts {
        async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<booking::Model>> {
            self.inner.find_by_id(id).await
        }

        async fn find_overlapping(
            &self,
            car_id: Uuid,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            statuses: &[BookingStatus],
            exclude: Option<Uuid>,
        ) -> StoreResult<Vec<booking::Model>> {
            self.inner
                .find_overlapping(car_id, start, end, statuses, exclude)
                .await
        }

        async fn count_all(&self) -> StoreResult<u64> {
            self.inner.count_all().await
        }

        async fn insert(
            &self,
            booking: booking::Model,
            blocking: &[BookingStatus],
        ) -> StoreResult<booking::Model> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let remaining = self.collisions.load(Ordering::SeqCst);
            if remaining > 0 {
                self.collisions.store(remaining - 1, Ordering::SeqCst);
                let mut rival = booking;
                rival.id = Uuid::new_v4();
                self.inner.insert(rival, blocking).await?;
                return Err(StoreError::DuplicateNumber);
            }
            self.inner.insert(booking, blocking).await
        }

        async fn update(
            &self,
            booking: booking::Model,
            expected: BookingStatus,
            blocking: Option<&[BookingStatus]>,
        ) -> StoreResult<booking::Model> {
            self.inner.update(booking, expected, blocking).await
        }

        async fn update_with_car(
            &self,
            booking: booking::Model,
            expected: BookingStatus,
            car: CarUpdate,
        ) -> StoreResult<booking::Model> {
            self.inner.update_with_car(booking, expected, car).await
        }

        async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<booking::Model>> {
            self.inner.list_for_user(user_id).await
        }

        async fn list_all(
            &self,
            status: Option<BookingStatus>,
        ) -> StoreResult<Vec<booking::Model>> {
            self.inner.list_all(status).await
        }

        async fn find_pending_created_before(
            &self,
            cutoff: DateTime<Utc>,
        ) -> StoreResult<Vec<booking::Model>> {
            self.inner.find_pending_created_before(cutoff).await
        }
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        service: BookingService,
        car_id: Uuid,
        renter: Uuid,
        location_id: Uuid,
    }

    fn policy() -> PricingPolicy {
        PricingPolicy {
            tax_rate: Decimal::new(10, 2),
            insurance: InsuranceRates {
                basic: Decimal::from(10),
                standard: Decimal::from(20),
                premium: Decimal::from(35),
            },
        }
    }

    fn sample_car(status: CarStatus) -> car::Model {
        car::Model {
            id: Uuid::new_v4(),
            make: "Toyota".to_string(),
            model: "Corolla".to_string(),
            year: 2023,
            category: "compact".to_string(),
            transmission: "automatic".to_string(),
            fuel_type: "hybrid".to_string(),
            seats: 5,
            doors: 4,
            color: "white".to_string(),
            license_plate: "ABC123".to_string(),
            vin: "JTDBR32E520000001".to_string(),
            mileage: 1000,
            price_per_day: Decimal::from(50),
            location_id: Uuid::new_v4(),
            status,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    async fn fixture_with(payments: Arc<dyn PaymentGateway>) -> Fixture {
        let store = Arc::new(InMemoryStore::new());

        let car = sample_car(CarStatus::Available);
        let renter = sample_user(NaiveDate::from_ymd_opt(1990, 5, 17).unwrap());
        let location = location::Model {
            id: Uuid::new_v4(),
            name: "Airport".to_string(),
            address: "1 Terminal Rd".to_string(),
            city: "Springfield".to_string(),
            country: "US".to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        let fixture = Fixture {
            car_id: car.id,
            renter: renter.id,
            location_id: location.id,
            service: BookingService::new(store.clone(), payments, policy(), 3),
            store,
        };
        fixture.store.put_car(car).await;
        fixture.store.put_user(renter).await;
        fixture.store.put_location(location).await;
        fixture
    }

    async fn fixture() -> Fixture {
        fixture_with(Arc::new(CounterPaymentGateway)).await
    }

    /// Midnight UTC `days` from today.
    fn day(days: i64) -> DateTime<Utc> {
        let today = Utc::now().date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
        today + Duration::days(days)
    }

    impl Fixture {
        fn service_over(
            &self,
            bookings: Arc<dyn BookingStore>,
            write_attempts: u32,
        ) -> BookingService {
            BookingService {
                cars: self.store.clone(),
                users: self.store.clone(),
                locations: self.store.clone(),
                promos: self.store.clone(),
                bookings,
                payments: Arc::new(CounterPaymentGateway),
                policy: policy(),
                write_attempts,
            }
        }

        fn request(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> NewBooking {
            NewBooking {
                car_id: self.car_id,
                start_date: start,
                end_date: end,
                pickup_location_id: self.location_id,
                dropoff_location_id: self.location_id,
                addons: vec![],
                insurance_type: InsuranceType::None,
                promo_code: None,
                notes: None,
            }
        }

        fn renter(&self) -> Actor {
            Actor { id: self.renter, role: UserRole::User }
        }

        async fn confirmed(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> booking::Model {
            let created = self
                .service
                .create_booking(self.renter, self.request(start, end))
                .await
                .unwrap();
            self.service
                .transition(created.id, BookingEvent::Confirm)
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_create_prices_and_numbers_booking() {
        let f = fixture().await;

        let first = f
            .service
            .create_booking(f.renter, f.request(day(30), day(33)))
            .await
            .unwrap();

        assert_eq!(first.status, BookingStatus::Pending);
        assert_eq!(first.payment_status, PaymentStatus::Pending);
        assert_eq!(first.number_of_days, 3);
        assert_eq!(first.subtotal, Decimal::from(150));
        assert_eq!(first.taxes, Decimal::from(15));
        assert_eq!(first.total, Decimal::from(165));
        assert!(first.booking_number.starts_with("BK"));
        assert!(first.booking_number.ends_with("0001"));

        let second = f
            .service
            .create_booking(f.renter, f.request(day(40), day(41)))
            .await
            .unwrap();
        assert!(second.booking_number.ends_with("0002"));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_range() {
        let f = fixture().await;

        for (start, end) in [(day(10), day(10)), (day(10), day(9)), (day(-3), day(2))] {
            let result = f.service.create_booking(f.renter, f.request(start, end)).await;
            assert!(matches!(result, Err(BookingError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_create_checks_renter_eligibility() {
        let f = fixture().await;

        let young = sample_user(Utc::now().date_naive() - Duration::days(365 * 19));
        let young_id = young.id;
        f.store.put_user(young).await;
        let result = f.service.create_booking(young_id, f.request(day(5), day(6))).await;
        assert!(matches!(result, Err(BookingError::NotEligible(_))));

        let mut inactive = sample_user(NaiveDate::from_ymd_opt(1980, 1, 1).unwrap());
        inactive.is_active = false;
        let inactive_id = inactive.id;
        f.store.put_user(inactive).await;
        let result = f.service.create_booking(inactive_id, f.request(day(5), day(6))).await;
        assert!(matches!(result, Err(BookingError::NotEligible(_))));

        let result = f.service.create_booking(Uuid::new_v4(), f.request(day(5), day(6))).await;
        assert!(matches!(result, Err(BookingError::NotFound { entity: "User" })));
    }

    #[tokio::test]
    async fn test_create_requires_existing_rentable_car() {
        let f = fixture().await;

        let mut request = f.request(day(5), day(6));
        request.car_id = Uuid::new_v4();
        let result = f.service.create_booking(f.renter, request).await;
        assert!(matches!(result, Err(BookingError::NotFound { entity: "Car" })));

        let workshop = sample_car(CarStatus::Maintenance);
        let mut request = f.request(day(5), day(6));
        request.car_id = workshop.id;
        f.store.put_car(workshop).await;
        let result = f.service.create_booking(f.renter, request).await;
        assert!(matches!(result, Err(BookingError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_overlapping_request_conflicts_with_confirmed_booking() {
        let f = fixture().await;
        f.confirmed(day(20), day(24)).await;

        let result = f
            .service
            .create_booking(f.renter, f.request(day(23), day(27)))
            .await;
        assert!(matches!(result, Err(BookingError::Conflict(_))));

        // Touching boundary days conflict as well.
        let result = f
            .service
            .create_booking(f.renter, f.request(day(24), day(27)))
            .await;
        assert!(matches!(result, Err(BookingError::Conflict(_))));

        let result = f
            .service
            .create_booking(f.renter, f.request(day(25), day(27)))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_only_one_overlapping_pending_booking_reaches_confirmed() {
        let f = fixture().await;

        let a = f
            .service
            .create_booking(f.renter, f.request(day(20), day(24)))
            .await
            .unwrap();
        let b = f
            .service
            .create_booking(f.renter, f.request(day(23), day(27)))
            .await
            .unwrap();

        f.service.transition(a.id, BookingEvent::Confirm).await.unwrap();
        let second = f.service.transition(b.id, BookingEvent::Confirm).await;
        assert!(matches!(second, Err(BookingError::Conflict(_))));

        let b = f.service.get_booking(b.id).await.unwrap();
        assert_eq!(b.status, BookingStatus::Pending);
        assert!(f.service.is_available(f.car_id, day(28), day(30)).await.unwrap());
        assert!(!f.service.is_available(f.car_id, day(21), day(22)).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_confirmations_admit_one() {
        let f = fixture().await;

        let a = f
            .service
            .create_booking(f.renter, f.request(day(20), day(24)))
            .await
            .unwrap();
        let b = f
            .service
            .create_booking(f.renter, f.request(day(23), day(27)))
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            tokio::spawn({
                let service = f.service.clone();
                async move { service.transition(a.id, BookingEvent::Confirm).await }
            }),
            tokio::spawn({
                let service = f.service.clone();
                async move { service.transition(b.id, BookingEvent::Confirm).await }
            }),
        );
        let outcomes = [first.unwrap(), second.unwrap()];

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(BookingError::Conflict(_)))));
    }

    #[tokio::test]
    async fn test_full_rental_lifecycle_updates_car() {
        let f = fixture().await;
        let booking = f.confirmed(day(0), day(2)).await;
        assert_eq!(booking.payment_status, PaymentStatus::Paid);
        assert!(booking.payment_reference.is_some());

        let active = f
            .service
            .transition(
                booking.id,
                BookingEvent::Pickup(PickupReport {
                    mileage_start: 1000,
                    fuel_level_start: FuelLevel::Full,
                    notes: None,
                }),
            )
            .await
            .unwrap();
        assert_eq!(active.status, BookingStatus::Active);
        assert!(active.actual_pickup_time.is_some());
        let car = f.store.get_car(f.car_id).await.unwrap().unwrap();
        assert_eq!(car.status, CarStatus::Rented);

        let completed = f
            .service
            .transition(
                booking.id,
                BookingEvent::Return(ReturnReport {
                    mileage_end: 1350,
                    fuel_level_end: FuelLevel::Quarter,
                    notes: None,
                    damage_reports: vec![],
                    additional_charges: vec![AdditionalCharge {
                        description: "Refuel".to_string(),
                        amount: Decimal::from(40),
                        reason: Some("fuel shortfall".to_string()),
                    }],
                }),
            )
            .await
            .unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);
        assert_eq!(completed.additional_charges.0.len(), 1);
        assert_eq!(completed.total, booking.total);

        let car = f.store.get_car(f.car_id).await.unwrap().unwrap();
        assert_eq!(car.status, CarStatus::Available);
        assert_eq!(car.mileage, 1350);

        let again = f
            .service
            .transition(
                booking.id,
                BookingEvent::Pickup(PickupReport {
                    mileage_start: 1350,
                    fuel_level_start: FuelLevel::Full,
                    notes: None,
                }),
            )
            .await;
        assert!(matches!(again, Err(BookingError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_declined_payment_keeps_booking_pending() {
        let f = fixture_with(Arc::new(DecliningGateway)).await;
        let booking = f
            .service
            .create_booking(f.renter, f.request(day(10), day(12)))
            .await
            .unwrap();

        let result = f.service.transition(booking.id, BookingEvent::Confirm).await;
        assert!(matches!(result, Err(BookingError::PaymentDeclined(_))));

        let stored = f.service.get_booking(booking.id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
        assert_eq!(stored.payment_status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_cancel_paid_booking_refunds_by_policy() {
        let f = fixture().await;
        let booking = f.confirmed(day(10), day(13)).await;

        let cancellation = f
            .service
            .cancel_booking(booking.id, f.renter(), Some("plans changed".to_string()))
            .await
            .unwrap();

        assert_eq!(cancellation.refund_amount, booking.total * Decimal::new(90, 2));
        assert_eq!(cancellation.booking.status, BookingStatus::Cancelled);
        assert_eq!(cancellation.booking.payment_status, PaymentStatus::Refunded);
        assert_eq!(cancellation.booking.cancelled_by, Some(f.renter));
        assert_eq!(
            cancellation.booking.cancellation_reason.as_deref(),
            Some("plans changed")
        );

        let again = f.service.cancel_booking(booking.id, f.renter(), None).await;
        assert!(matches!(
            again,
            Err(BookingError::AlreadyTerminal(BookingStatus::Cancelled))
        ));

        // Cancelled bookings stop blocking the car.
        assert!(f.service.is_available(f.car_id, day(10), day(13)).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_unpaid_booking_refunds_nothing() {
        let f = fixture().await;
        let booking = f
            .service
            .create_booking(f.renter, f.request(day(10), day(13)))
            .await
            .unwrap();

        let cancellation = f
            .service
            .cancel_booking(booking.id, f.renter(), None)
            .await
            .unwrap();
        assert_eq!(cancellation.refund_amount, Decimal::ZERO);
        assert_eq!(cancellation.booking.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_permissions_and_active_guard() {
        let f = fixture().await;
        let booking = f.confirmed(day(0), day(3)).await;

        let stranger = Actor { id: Uuid::new_v4(), role: UserRole::User };
        let result = f.service.cancel_booking(booking.id, stranger, None).await;
        assert!(matches!(result, Err(BookingError::Forbidden(_))));

        f.service
            .transition(
                booking.id,
                BookingEvent::Pickup(PickupReport {
                    mileage_start: 1000,
                    fuel_level_start: FuelLevel::Full,
                    notes: None,
                }),
            )
            .await
            .unwrap();

        let admin = Actor { id: Uuid::new_v4(), role: UserRole::Admin };
        let result = f.service.cancel_booking(booking.id, admin, None).await;
        assert!(matches!(result, Err(BookingError::InvalidTransition { .. })));

        let missing = f.service.cancel_booking(Uuid::new_v4(), admin, None).await;
        assert!(matches!(missing, Err(BookingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_staff_may_cancel_for_renter() {
        let f = fixture().await;
        let booking = f.confirmed(day(2), day(4)).await;

        let manager = Actor { id: Uuid::new_v4(), role: UserRole::Manager };
        let cancellation = f
            .service
            .cancel_booking(booking.id, manager, None)
            .await
            .unwrap();
        assert_eq!(cancellation.booking.cancelled_by, Some(manager.id));
    }

    #[tokio::test]
    async fn test_promo_code_discount() {
        let f = fixture().await;
        f.store
            .put_promo(promo_code::Model {
                code: "SPRING20".to_string(),
                discount: Decimal::from(20),
                is_active: true,
                expires_at: None,
            })
            .await;

        let mut request = f.request(day(10), day(13));
        request.promo_code = Some("spring20".to_string());
        let booking = f.service.create_booking(f.renter, request).await.unwrap();
        assert_eq!(booking.discount, Decimal::from(20));
        assert_eq!(booking.total, Decimal::from(145));
        assert_eq!(booking.promo_code.as_deref(), Some("SPRING20"));

        let mut request = f.request(day(20), day(23));
        request.promo_code = Some("NOPE".to_string());
        let result = f.service.create_booking(f.renter, request).await;
        assert!(matches!(result, Err(BookingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_expire_pending_past_window() {
        let f = fixture().await;

        let fresh = f
            .service
            .create_booking(f.renter, f.request(day(10), day(12)))
            .await
            .unwrap();

        let mut stale = fresh.clone();
        stale.id = Uuid::new_v4();
        stale.booking_number = "BK10000000000009999".to_string();
        stale.start_date = day(20);
        stale.end_date = day(22);
        stale.created_at = Utc::now() - Duration::hours(2);
        f.store.insert(stale.clone(), &BLOCKING_STATUSES).await.unwrap();

        let expired = f.service.expire_pending(Duration::hours(1)).await.unwrap();
        assert_eq!(expired, 1);

        let stale = f.service.get_booking(stale.id).await.unwrap();
        assert_eq!(stale.status, BookingStatus::Expired);
        let fresh = f.service.get_booking(fresh.id).await.unwrap();
        assert_eq!(fresh.status, BookingStatus::Pending);

        let confirm = f.service.transition(stale.id, BookingEvent::Confirm).await;
        assert!(matches!(confirm, Err(BookingError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_number_is_retried_with_fresh_count() {
        let f = fixture().await;
        let store = Arc::new(CollidingInserts::new(f.store.clone(), 1));
        let service = f.service_over(store.clone(), 3);

        let created = service
            .create_booking(f.renter, f.request(day(30), day(33)))
            .await
            .unwrap();

        assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
        assert!(created.booking_number.ends_with("0002"));

        let all = f.store.list_all(None).await.unwrap();
        assert_eq!(all.len(), 2);
        let rival = all.iter().find(|b| b.id != created.id).unwrap();
        assert!(rival.booking_number.ends_with("0001"));
        assert_ne!(rival.booking_number, created.booking_number);
    }

    #[tokio::test]
    async fn test_retries_give_up_after_write_attempts() {
        let f = fixture().await;
        let store = Arc::new(CollidingInserts::new(f.store.clone(), u32::MAX));
        let service = f.service_over(store.clone(), 3);

        let result = service
            .create_booking(f.renter, f.request(day(30), day(33)))
            .await;

        assert!(matches!(result, Err(BookingError::Store(_))));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_car_write_leaves_booking_untouched() {
        let f = fixture().await;
        let booking = f.confirmed(day(0), day(2)).await;
        let car = f.store.get_car(f.car_id).await.unwrap().unwrap();
        f.store.remove_car(f.car_id).await;

        let pickup = BookingEvent::Pickup(PickupReport {
            mileage_start: 1000,
            fuel_level_start: FuelLevel::Full,
            notes: None,
        });
        let result = f.service.transition(booking.id, pickup.clone()).await;
        assert!(matches!(result, Err(BookingError::Store(_))));

        let stored = f.service.get_booking(booking.id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
        assert_eq!(stored.actual_pickup_time, None);

        // The same request succeeds once the car row is back.
        f.store.put_car(car).await;
        let active = f.service.transition(booking.id, pickup).await.unwrap();
        assert_eq!(active.status, BookingStatus::Active);
        let car = f.store.get_car(f.car_id).await.unwrap().unwrap();
        assert_eq!(car.status, CarStatus::Rented);

        f.store.remove_car(f.car_id).await;
        let result = f
            .service
            .transition(
                booking.id,
                BookingEvent::Return(ReturnReport {
                    mileage_end: 1200,
                    fuel_level_end: FuelLevel::Full,
                    notes: None,
                    damage_reports: vec![],
                    additional_charges: vec![],
                }),
            )
            .await;
        assert!(matches!(result, Err(BookingError::Store(_))));
        let stored = f.service.get_booking(booking.id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Active);
        assert_eq!(stored.mileage_end, None);
    }

    #[tokio::test]
    async fn test_only_the_renter_may_confirm() {
        let f = fixture().await;
        let booking = f
            .service
            .create_booking(f.renter, f.request(day(10), day(12)))
            .await
            .unwrap();

        for role in [UserRole::Admin, UserRole::Manager, UserRole::User] {
            let other = Actor { id: Uuid::new_v4(), role };
            let result = f.service.confirm_booking(booking.id, other).await;
            assert!(matches!(result, Err(BookingError::Forbidden(_))));
        }
        let stored = f.service.get_booking(booking.id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
        assert_eq!(stored.payment_status, PaymentStatus::Pending);

        let confirmed = f.service.confirm_booking(booking.id, f.renter()).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
    }
}
