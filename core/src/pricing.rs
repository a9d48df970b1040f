//! Advance and platform fee arithmetic.
//!
//! Amounts are whole units; rounding is half-up, so `round(x * 0.10)` is
//! computed as `(x + 5) / 10` and `round(x * 0.05)` as `(x + 10) / 20`.

use crate::types::Money;
use serde::{Deserialize, Serialize};

/// Advance share of the total, in percent.
pub const ADVANCE_PERCENT: u64 = 10;

/// Platform fee share of the advance, in percent.
pub const PLATFORM_FEE_PERCENT: u64 = 5;

/// How a booking's total splits between the advance and the remainder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceBreakdown {
    /// Full venue price
    pub total_amount: Money,
    /// Paid upfront through the gateway
    pub advance_amount: Money,
    /// Marketplace fee on the advance
    pub platform_fee: Money,
    /// Settled out-of-band at the venue
    pub remaining_amount: Money,
}

/// Rounds `amount * percent / 100` half-up.
const fn percent_of(amount: u64, percent: u64) -> u64 {
    // u128 keeps the intermediate product exact for any u64 amount.
    ((amount as u128 * percent as u128 + 50) / 100) as u64
}

impl AdvanceBreakdown {
    /// Splits `total` into advance, fee and remainder.
    ///
    /// ```
    /// # use venue_market_core::{AdvanceBreakdown, Money};
    /// let split = AdvanceBreakdown::for_total(Money::new(10_000));
    /// assert_eq!(split.advance_amount, Money::new(1_000));
    /// assert_eq!(split.platform_fee, Money::new(50));
    /// assert_eq!(split.remaining_amount, Money::new(9_000));
    /// ```
    #[must_use]
    pub const fn for_total(total: Money) -> Self {
        let advance = percent_of(total.units(), ADVANCE_PERCENT);
        let fee = percent_of(advance, PLATFORM_FEE_PERCENT);
        Self {
            total_amount: total,
            advance_amount: Money::new(advance),
            platform_fee: Money::new(fee),
            remaining_amount: Money::new(total.units() - advance),
        }
    }
}
