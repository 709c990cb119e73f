use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::booking::error::{BookingError, BookingResult};
use crate::entities::booking::{Addon, InsuranceType};

pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Largest amount a NUMERIC(12,2) money column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub daily_rate: Decimal,
    pub number_of_days: i32,
    pub subtotal: Decimal,
    pub insurance: Decimal,
    pub addons: Decimal,
    pub taxes: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// Per-day insurance surcharge for each cover level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsuranceRates {
    pub basic: Decimal,
    pub standard: Decimal,
    pub premium: Decimal,
}

impl InsuranceRates {
    pub fn per_day(&self, insurance_type: InsuranceType) -> Decimal {
        match insurance_type {
            InsuranceType::Basic => self.basic,
            InsuranceType::Standard => self.standard,
            InsuranceType::Premium => self.premium,
            InsuranceType::None => Decimal::ZERO,
        }
    }
}

/// Rate tables the calculator reads but does not own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    pub tax_rate: Decimal,
    pub insurance: InsuranceRates,
}

/// Whole rental days between two instants, rounded up, never below one.
pub fn rental_days(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let millis = (end - start).num_milliseconds().abs();
    ceil_days(millis).max(1)
}

/// Ceiling division of a signed millisecond span into days.
pub(crate) fn ceil_days(millis: i64) -> i64 {
    let days = millis.div_euclid(MILLIS_PER_DAY);
    if millis.rem_euclid(MILLIS_PER_DAY) > 0 {
        days + 1
    } else {
        days
    }
}

fn too_large() -> BookingError {
    BookingError::Validation("Price is too large".to_string())
}

/// Reject amounts that overflow or would not fit a money column.
fn bounded(amount: Option<Decimal>) -> BookingResult<Decimal> {
    amount.filter(|a| *a <= MAX_AMOUNT).ok_or_else(too_large)
}

pub fn addons_total(addons: &[Addon]) -> BookingResult<Decimal> {
    let total = addons.iter().try_fold(Decimal::ZERO, |acc, a| {
        a.price
            .checked_mul(Decimal::from(a.quantity))
            .and_then(|line| acc.checked_add(line))
    });
    bounded(total)
}

/// Price a rental. Pure: the result depends only on the arguments.
pub fn compute_pricing(
    daily_rate: Decimal,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    addons: &[Addon],
    insurance_type: InsuranceType,
    promo_discount: Decimal,
    policy: &PricingPolicy,
) -> BookingResult<PricingBreakdown> {
    if daily_rate.is_sign_negative() {
        return Err(BookingError::Validation("Daily rate cannot be negative".to_string()));
    }
    if promo_discount.is_sign_negative() {
        return Err(BookingError::Validation("Discount cannot be negative".to_string()));
    }
    if policy.tax_rate.is_sign_negative() {
        return Err(BookingError::Validation("Tax rate cannot be negative".to_string()));
    }
    for addon in addons {
        if addon.price.is_sign_negative() {
            return Err(BookingError::Validation(format!(
                "Addon '{}' has a negative price",
                addon.name
            )));
        }
        if addon.quantity < 1 {
            return Err(BookingError::Validation(format!(
                "Addon '{}' must have a quantity of at least 1",
                addon.name
            )));
        }
    }

    let days = rental_days(start, end);
    let number_of_days = i32::try_from(days)
        .map_err(|_| BookingError::Validation("Rental period is too long".to_string()))?;
    let days = Decimal::from(days);

    let subtotal = bounded(daily_rate.checked_mul(days))?;
    let insurance = bounded(policy.insurance.per_day(insurance_type).checked_mul(days))?;
    let addons = addons_total(addons)?;
    let taxable = bounded(
        subtotal
            .checked_add(insurance)
            .and_then(|sum| sum.checked_add(addons)),
    )?;
    let taxes = bounded(taxable.checked_mul(policy.tax_rate).map(|t| t.round_dp(2)))?;
    let gross = bounded(taxable.checked_add(taxes))?;
    let discount = promo_discount.min(gross);

    Ok(PricingBreakdown {
        daily_rate,
        number_of_days,
        subtotal,
        insurance,
        addons,
        taxes,
        discount,
        total: gross - discount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn policy(tax_percent: i64) -> PricingPolicy {
        PricingPolicy {
            tax_rate: Decimal::new(tax_percent, 2),
            insurance: InsuranceRates {
                basic: Decimal::from(10),
                standard: Decimal::from(20),
                premium: Decimal::from(35),
            },
        }
    }

    fn jan(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, day, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_three_day_rental_with_tax() {
        let pricing = compute_pricing(
            Decimal::from(50),
            jan(1),
            jan(4),
            &[],
            InsuranceType::None,
            Decimal::ZERO,
            &policy(10),
        )
        .unwrap();

        assert_eq!(pricing.number_of_days, 3);
        assert_eq!(pricing.subtotal, Decimal::from(150));
        assert_eq!(pricing.taxes, Decimal::from(15));
        assert_eq!(pricing.total, Decimal::from(165));
    }

    #[test]
    fn test_partial_days_round_up_and_minimum_one() {
        assert_eq!(rental_days(jan(1), jan(1) + Duration::hours(2)), 1);
        assert_eq!(rental_days(jan(1), jan(1)), 1);
        assert_eq!(rental_days(jan(1), jan(3) + Duration::minutes(1)), 3);
    }

    #[test]
    fn test_total_is_sum_of_parts() {
        let addons = vec![
            Addon { name: "gps".to_string(), price: Decimal::new(550, 2), quantity: 1 },
            Addon { name: "child_seat".to_string(), price: Decimal::from(8), quantity: 2 },
        ];
        let pricing = compute_pricing(
            Decimal::new(4999, 2),
            jan(1),
            jan(6),
            &addons,
            InsuranceType::Standard,
            Decimal::from(25),
            &policy(8),
        )
        .unwrap();

        assert_eq!(pricing.insurance, Decimal::from(100));
        assert_eq!(pricing.addons, Decimal::new(2150, 2));
        assert_eq!(
            pricing.total,
            pricing.subtotal + pricing.insurance + pricing.addons + pricing.taxes - pricing.discount
        );
    }

    #[test]
    fn test_identical_inputs_give_identical_output() {
        let run = || {
            compute_pricing(
                Decimal::from(42),
                jan(2),
                jan(9),
                &[],
                InsuranceType::Premium,
                Decimal::from(5),
                &policy(10),
            )
            .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_discount_cannot_push_total_below_zero() {
        let pricing = compute_pricing(
            Decimal::from(10),
            jan(1),
            jan(2),
            &[],
            InsuranceType::None,
            Decimal::from(1000),
            &policy(10),
        )
        .unwrap();

        assert_eq!(pricing.discount, Decimal::from(11));
        assert_eq!(pricing.total, Decimal::ZERO);
    }

    #[test]
    fn test_rejects_negative_inputs() {
        let negative_rate = compute_pricing(
            Decimal::from(-1),
            jan(1),
            jan(2),
            &[],
            InsuranceType::None,
            Decimal::ZERO,
            &policy(10),
        );
        assert!(matches!(negative_rate, Err(BookingError::Validation(_))));

        let zero_quantity = compute_pricing(
            Decimal::from(10),
            jan(1),
            jan(2),
            &[Addon { name: "gps".to_string(), price: Decimal::ONE, quantity: 0 }],
            InsuranceType::None,
            Decimal::ZERO,
            &policy(10),
        );
        assert!(matches!(zero_quantity, Err(BookingError::Validation(_))));
    }

    #[test]
    fn test_max_amount_is_numeric_12_2_ceiling() {
        assert_eq!(MAX_AMOUNT, Decimal::new(999_999_999_999, 2));
    }

    #[test]
    fn test_oversized_amounts_are_rejected_not_panicking() {
        let huge_addon = compute_pricing(
            Decimal::from(50),
            jan(1),
            jan(4),
            &[Addon { name: "gold_trim".to_string(), price: Decimal::MAX, quantity: 2 }],
            InsuranceType::None,
            Decimal::ZERO,
            &policy(10),
        );
        assert!(matches!(huge_addon, Err(BookingError::Validation(_))));

        let huge_rate = compute_pricing(
            Decimal::MAX,
            jan(1),
            jan(4),
            &[],
            InsuranceType::Basic,
            Decimal::ZERO,
            &policy(10),
        );
        assert!(matches!(huge_rate, Err(BookingError::Validation(_))));

        // Fits Decimal but not the money columns.
        let too_wide = compute_pricing(
            MAX_AMOUNT,
            jan(1),
            jan(3),
            &[],
            InsuranceType::None,
            Decimal::ZERO,
            &policy(0),
        );
        assert!(matches!(too_wide, Err(BookingError::Validation(_))));

        assert!(addons_total(&[
            Addon { name: "a".to_string(), price: MAX_AMOUNT, quantity: 1 },
            Addon { name: "b".to_string(), price: MAX_AMOUNT, quantity: 1 },
        ])
        .is_err());
    }
}
