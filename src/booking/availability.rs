use chrono::{DateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::booking::error::{BookingError, BookingResult};
use crate::booking::store::{BookingStore, CarStore};
use crate::entities::booking::BookingStatus;

/// Statuses that hold a car against other reservations.
pub const BLOCKING_STATUSES: [BookingStatus; 2] = [BookingStatus::Confirmed, BookingStatus::Active];

/// Inclusive overlap: touching boundaries conflict.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start <= b_end && a_end >= b_start
}

/// Reject empty, inverted or retroactive ranges. A range may start
/// any time on the current day.
pub fn validate_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> BookingResult<()> {
    if end <= start {
        return Err(BookingError::Validation(
            "End date must be after start date".to_string(),
        ));
    }

    let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    if start < today {
        return Err(BookingError::Validation(
            "Start date cannot be in the past".to_string(),
        ));
    }

    Ok(())
}

pub async fn is_available(
    cars: &dyn CarStore,
    bookings: &dyn BookingStore,
    car_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> BookingResult<bool> {
    validate_range(start, end, now)?;

    cars.get_car(car_id)
        .await?
        .ok_or_else(|| BookingError::not_found("Car"))?;

    let conflicting = bookings
        .find_overlapping(car_id, start, end, &BLOCKING_STATUSES, None)
        .await?;

    Ok(conflicting.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_touching_boundaries_conflict() {
        assert!(overlaps(day(1), day(5), day(5), day(8)));
        assert!(overlaps(day(5), day(8), day(1), day(5)));
    }

    #[test]
    fn test_disjoint_ranges_do_not_conflict() {
        assert!(!overlaps(day(1), day(4), day(5), day(8)));
        assert!(!overlaps(day(10), day(12), day(1), day(9)));
    }

    #[test]
    fn test_contained_range_conflicts() {
        assert!(overlaps(day(1), day(10), day(3), day(4)));
    }

    #[test]
    fn test_validate_range() {
        let now = day(2) + Duration::hours(15);

        assert!(validate_range(day(2), day(3), now).is_ok());
        assert!(matches!(
            validate_range(day(4), day(4), now),
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            validate_range(day(5), day(4), now),
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            validate_range(day(1), day(4), now),
            Err(BookingError::Validation(_))
        ));
    }
}
