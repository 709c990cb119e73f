//! Booking status transitions and the cancellation refund policy.
//!
//! ```text
//! pending -> confirmed -> active -> completed
//!    |           |
//!    +-----------+--> cancelled
//!    |
//!    +--> expired
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::booking::error::{BookingError, BookingResult};
use crate::booking::pricing::{ceil_days, MAX_AMOUNT};
use crate::entities::booking::{
    self, AdditionalCharge, BookingStatus, DamageReport, FuelLevel,
};

#[derive(Debug, Clone, Deserialize)]
pub struct PickupReport {
    pub mileage_start: i32,
    pub fuel_level_start: FuelLevel,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReturnReport {
    pub mileage_end: i32,
    pub fuel_level_end: FuelLevel,
    pub notes: Option<String>,
    #[serde(default)]
    pub damage_reports: Vec<DamageReport>,
    #[serde(default)]
    pub additional_charges: Vec<AdditionalCharge>,
}

#[derive(Debug, Clone)]
pub enum BookingEvent {
    /// Payment was authorized.
    Confirm,
    Pickup(PickupReport),
    Return(ReturnReport),
    /// Left unconfirmed past the policy window.
    Expire,
}

impl BookingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BookingEvent::Confirm => "confirm",
            BookingEvent::Pickup(_) => "pickup",
            BookingEvent::Return(_) => "return",
            BookingEvent::Expire => "expire",
        }
    }
}

pub fn next_status(from: BookingStatus, event: &BookingEvent) -> BookingResult<BookingStatus> {
    use BookingStatus::*;

    match (from, event) {
        (Pending, BookingEvent::Confirm) => Ok(Confirmed),
        (Confirmed, BookingEvent::Pickup(_)) => Ok(Active),
        (Active, BookingEvent::Return(_)) => Ok(Completed),
        (Pending, BookingEvent::Expire) => Ok(Expired),
        (from, event) => Err(BookingError::InvalidTransition {
            from,
            event: event.name(),
        }),
    }
}

/// Cancellation is open to pending and confirmed bookings only.
pub fn ensure_cancellable(status: BookingStatus) -> BookingResult<()> {
    if status.is_terminal() {
        return Err(BookingError::AlreadyTerminal(status));
    }
    match status {
        BookingStatus::Active => Err(BookingError::InvalidTransition {
            from: status,
            event: "cancel",
        }),
        _ => Ok(()),
    }
}

pub fn days_until_start(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    ceil_days((start - now).num_milliseconds())
}

/// Refund share of the total by whole days left before the rental starts.
pub fn refund_rate(days_until_start: i64) -> Decimal {
    match days_until_start {
        d if d >= 7 => Decimal::new(90, 2),
        d if d >= 3 => Decimal::new(50, 2),
        d if d >= 1 => Decimal::new(25, 2),
        _ => Decimal::ZERO,
    }
}

impl booking::Model {
    pub fn calculate_refund(&self, now: DateTime<Utc>) -> Decimal {
        let rate = refund_rate(days_until_start(self.start_date, now));
        (self.total * rate).round_dp(2)
    }

    /// Checked-out, or confirmed and inside its rental window.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Active
            || (self.status == BookingStatus::Confirmed
                && self.start_date <= now
                && now <= self.end_date)
    }

    pub(crate) fn record_pickup(&mut self, report: &PickupReport, now: DateTime<Utc>) -> BookingResult<()> {
        if report.mileage_start < 0 {
            return Err(BookingError::Validation("Mileage cannot be negative".to_string()));
        }

        self.actual_pickup_time = Some(now);
        self.mileage_start = Some(report.mileage_start);
        self.fuel_level_start = Some(report.fuel_level_start);
        self.pickup_notes = report.notes.clone();
        Ok(())
    }

    pub(crate) fn record_return(&mut self, report: &ReturnReport, now: DateTime<Utc>) -> BookingResult<()> {
        let start = self.mileage_start.unwrap_or(0);
        if report.mileage_end < start {
            return Err(BookingError::Validation(format!(
                "Return mileage {} is below pickup mileage {}",
                report.mileage_end, start
            )));
        }
        let amounts = report
            .additional_charges
            .iter()
            .map(|c| c.amount)
            .chain(report.damage_reports.iter().map(|d| d.cost));
        for amount in amounts {
            if amount.is_sign_negative() {
                return Err(BookingError::Validation("Charges cannot be negative".to_string()));
            }
            if amount > MAX_AMOUNT {
                return Err(BookingError::Validation("Charge is too large".to_string()));
            }
        }

        self.actual_dropoff_time = Some(now);
        self.mileage_end = Some(report.mileage_end);
        self.fuel_level_end = Some(report.fuel_level_end);
        self.dropoff_notes = report.notes.clone();
        self.damage_reports.0.extend(report.damage_reports.iter().cloned());
        self.additional_charges
            .0
            .extend(report.additional_charges.iter().cloned());
        Ok(())
    }
}
