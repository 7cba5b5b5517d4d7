//! Fee computation and bill codes.
//!
//! A park charges a flat fee for its first `fixed_first_period` minutes, then
//! `hourly_cost` for every started hour after that. The discount is taken off
//! the total and the result is not clamped, so a large discount yields a
//! negative amount.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::types::{SlotId, ValidationError};

const MINUTES_PER_HOUR: i64 = 60;

/// Number of fractional digits carried by every stored amount.
pub const MONEY_SCALE: u32 = 2;

/// Pricing rules of a park.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    /// Length of the flat-rate period, in minutes.
    pub fixed_first_period: i64,
    /// Flat fee covering the first period.
    pub fixed_first_period_cost: Decimal,
    /// Charged for each started hour past the first period.
    pub hourly_cost: Decimal,
}

impl FeePolicy {
    /// Creates a policy after validation.
    pub fn new(
        fixed_first_period: i64,
        fixed_first_period_cost: Decimal,
        hourly_cost: Decimal,
    ) -> Result<Self, ValidationError> {
        let policy = Self {
            fixed_first_period,
            fixed_first_period_cost,
            hourly_cost,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Checks that no component of the policy is negative.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.fixed_first_period < 0 {
            return Err(ValidationError::NegativeMinutes {
                field: "fixed first period",
                value: self.fixed_first_period,
            });
        }
        if self.fixed_first_period_cost.is_sign_negative() {
            return Err(ValidationError::NegativeAmount {
                field: "fixed first period cost",
                value: self.fixed_first_period_cost,
            });
        }
        if self.hourly_cost.is_sign_negative() {
            return Err(ValidationError::NegativeAmount {
                field: "hourly cost",
                value: self.hourly_cost,
            });
        }
        Ok(())
    }

    /// Hours billed past the flat-rate period. Partial hours count as full hours.
    pub const fn billable_hours(&self, elapsed_minutes: i64) -> i64 {
        let over = elapsed_minutes - self.fixed_first_period;
        if over <= 0 {
            0
        } else {
            (over + MINUTES_PER_HOUR - 1) / MINUTES_PER_HOUR
        }
    }

    /// Charge for a session before any discount.
    pub fn charge(&self, elapsed_minutes: i64) -> Decimal {
        let variable = Decimal::from(self.billable_hours(elapsed_minutes)) * self.hourly_cost;
        self.fixed_first_period_cost + variable
    }

    /// Final amount of a session. May be negative.
    pub fn amount(&self, elapsed_minutes: i64, discount: Decimal) -> Decimal {
        money(self.charge(elapsed_minutes) - discount)
    }
}

/// Whole minutes between check-in and check-out; partial minutes are dropped.
pub fn elapsed_minutes(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> i64 {
    check_out.signed_duration_since(check_in).num_minutes()
}

/// Rounds half away from zero to cents and fixes the scale, so amounts always
/// render with two decimals.
pub fn money(value: Decimal) -> Decimal {
    let mut value =
        value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    value.rescale(MONEY_SCALE);
    value
}

/// Human-facing bill code: zero-padded slot id and the check-in instant in
/// Unix milliseconds, e.g. `00000042-1719111325482`.
pub fn bill_code(slot_id: SlotId, checked_in_at: DateTime<Utc>) -> String {
    format!("{:08}-{}", slot_id.get(), checked_in_at.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn policy() -> FeePolicy {
        FeePolicy::new(60, dec!(20), dec!(10)).unwrap()
    }

    #[test]
    fn within_first_period_pays_flat_fee() {
        assert_eq!(policy().amount(30, Decimal::ZERO), dec!(20));
        assert_eq!(policy().amount(60, Decimal::ZERO), dec!(20));
    }

    #[test]
    fn one_minute_over_bills_a_full_hour() {
        assert_eq!(policy().amount(61, Decimal::ZERO), dec!(30));
    }

    #[test]
    fn partial_hours_round_up() {
        assert_eq!(policy().amount(130, Decimal::ZERO), dec!(40));
        assert_eq!(policy().amount(180, Decimal::ZERO), dec!(40));
        assert_eq!(policy().amount(181, Decimal::ZERO), dec!(50));
    }

    #[test]
    fn discount_is_subtracted() {
        assert_eq!(policy().amount(130, dec!(5.5)), dec!(34.50));
    }

    #[test]
    fn large_discount_goes_negative() {
        assert_eq!(policy().amount(30, dec!(1000)), dec!(-980));
    }

    #[test]
    fn zero_first_period_bills_from_the_first_minute() {
        let policy = FeePolicy::new(0, dec!(0), dec!(15)).unwrap();
        assert_eq!(policy.amount(0, Decimal::ZERO), dec!(0));
        assert_eq!(policy.amount(1, Decimal::ZERO), dec!(15));
        assert_eq!(policy.amount(60, Decimal::ZERO), dec!(15));
    }

    #[test]
    fn amounts_render_with_two_decimals() {
        assert_eq!(policy().amount(61, Decimal::ZERO).to_string(), "30.00");
        assert_eq!(money(dec!(1.005)).to_string(), "1.01");
        assert_eq!(money(dec!(1.015)).to_string(), "1.02");
    }

    #[test]
    fn negative_policy_values_are_rejected() {
        assert!(FeePolicy::new(-1, dec!(0), dec!(0)).is_err());
        assert!(FeePolicy::new(0, dec!(-1), dec!(0)).is_err());
        assert!(FeePolicy::new(0, dec!(0), dec!(-0.01)).is_err());
    }

    #[test]
    fn elapsed_minutes_truncates_seconds() {
        let check_in = Utc.with_ymd_and_hms(2025, 1, 5, 8, 0, 0).unwrap();
        let check_out = Utc.with_ymd_and_hms(2025, 1, 5, 9, 1, 59).unwrap();
        assert_eq!(elapsed_minutes(check_in, check_out), 61);
    }

    #[test]
    fn bill_code_pads_slot_id() {
        let at = Utc.timestamp_millis_opt(1_719_111_325_482).unwrap();
        assert_eq!(bill_code(SlotId::new(42), at), "00000042-1719111325482");
    }
}
