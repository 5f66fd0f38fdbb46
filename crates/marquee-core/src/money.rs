//! # Money Module
//!
//! Provides the `Money` and `Rate` types for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  In a rental quote:                                                     │
//! │    600.00 × 0.15 × 1.21 = 108.89999999...  → Lost cents on every order │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents + Basis-Point Rates                        │
//! │    60000 cents × 1500 bps × (10000 + 2100) bps = 10890 cents exactly   │
//! │    Rounding happens ONCE, half-up, and is fully deterministic          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use marquee_core::money::{Money, Rate};
//!
//! // Create from cents (preferred)
//! let per_day = Money::from_cents(10000); // 100.00/day
//!
//! // Line total: price × quantity × days
//! let line = per_day * 2i64 * 3i64;       // 600.00
//!
//! // Guarantee: 15% taxed at 21%, one rounding step
//! let guarantee = line.apply_taxed_rate(Rate::from_bps(1500), Rate::from_bps(2100));
//! assert_eq!(guarantee.cents(), 10890);   // 108.90
//!
//! // NEVER do this:
//! // let bad = Money::from_float(108.90); // NO SUCH METHOD EXISTS!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for corrections, write-offs
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
///
/// ## Where Money Flows
/// ```text
/// Product.base_price_cents ──► CartItem.price_per_day_cents (frozen)
///                                    │
///                                    ▼
/// Pricing Engine ──► subtotal / logistics / guarantee / total
///                                    │
///                                    ▼
/// Order.*_cents (immutable snapshot) ──► return adjustments
///
/// EVERY monetary value in the system flows through this type
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use marquee_core::money::Money;
    ///
    /// let price = Money::from_cents(22000); // Represents 220.00
    /// assert_eq!(price.cents(), 22000);
    /// ```
    ///
    /// ## Why Cents?
    /// Using the smallest unit eliminates all floating-point concerns.
    /// The database, calculations, and API all use cents. Cents ARE the
    /// two-decimal representation the totals are quoted in; only the UI
    /// converts to major units for display.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns the larger of two Money values.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    /// Returns the smaller of two Money values.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    /// Saturating subtraction clamped at zero.
    ///
    /// Used for guarantee burn-down on returns: the remaining guarantee can
    /// never go negative, the excess flows into the outstanding balance.
    #[inline]
    pub fn saturating_sub_zero(self, other: Self) -> Self {
        Money((self.0 - other.0).max(0))
    }

    /// Applies a basis-point rate with half-up rounding.
    ///
    /// ## Implementation
    /// We use integer math: `(amount * bps + 5000) / 10000`
    /// The +5000 provides the half-up rounding (5000/10000 = 0.5).
    /// i128 intermediates prevent overflow on large amounts.
    ///
    /// ## Example
    /// ```rust
    /// use marquee_core::money::{Money, Rate};
    ///
    /// let total = Money::from_cents(92890);       // 928.90
    /// let deposit_ratio = Rate::from_bps(5000);   // 50%
    ///
    /// let reservation = total.apply_rate(deposit_ratio);
    /// assert_eq!(reservation.cents(), 46445);     // 464.45
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let cents = (self.0 as i128 * rate.bps() as i128 + 5_000) / 10_000;
        Money::from_cents(cents as i64)
    }

    /// Applies a basis-point rate grossed up by a tax rate, rounding ONCE.
    ///
    /// `amount × rate × (1 + tax)` in a single integer expression:
    /// `(cents × rate_bps × (10000 + tax_bps) + 5·10^7) / 10^8`.
    ///
    /// ## Why a single rounding step?
    /// Rounding after the rate and again after the tax can drift a cent from
    /// the exact product. Guarantee amounts feed order totals and deposits,
    /// so the chained percentage must round exactly once.
    ///
    /// ## Example
    /// ```rust
    /// use marquee_core::money::{Money, Rate};
    ///
    /// let base = Money::from_cents(60000); // 600.00 of guarantee-flagged lines
    /// let amount = base.apply_taxed_rate(Rate::from_bps(1500), Rate::from_bps(2100));
    /// assert_eq!(amount.cents(), 10890);   // 600 × 0.15 × 1.21 = 108.90
    /// ```
    pub fn apply_taxed_rate(&self, rate: Rate, tax: Rate) -> Money {
        let numerator =
            self.0 as i128 * rate.bps() as i128 * (10_000 + tax.bps() as i128);
        let cents = (numerator + 50_000_000) / 100_000_000;
        Money::from_cents(cents as i64)
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use marquee_core::money::Money;
    ///
    /// let per_day = Money::from_cents(5000); // 50.00/day
    /// let line_total = per_day.multiply_quantity(4);
    /// assert_eq!(line_total.cents(), 20000); // 200.00
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Rate Type
// =============================================================================

/// A percentage rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1500 bps = 15% (guarantee percentage)
/// 2100 bps = 21% (guarantee tax rate)
/// 5000 bps = 0.5 deposit ratio (high-season reservation)
///
/// One type covers all three rate kinds in the pricing engine; they are
/// all dimensionless multipliers applied to Money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        Rate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for logs and debugging. Use frontend formatting for actual UI
/// display to handle localization properly.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.cents_part())
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

/// Addition of two Money values.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

/// Addition assignment (+=).
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Subtraction of two Money values.
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Subtraction assignment (-=).
impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by integer (for quantity/day calculations).
impl Mul<i32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i32) -> Self {
        Money(self.0 * qty as i64)
    }
}

/// Multiplication by i64.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(10890);
        assert_eq!(money.cents(), 10890);
        assert_eq!(money.major(), 108);
        assert_eq!(money.cents_part(), 90);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(10890)), "108.90");
        assert_eq!(format!("{}", Money::from_cents(500)), "5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        let result: Money = a * 3;
        assert_eq!(result.cents(), 3000);
    }

    #[test]
    fn test_apply_rate_basic() {
        // 100.00 at 10% = 10.00
        let amount = Money::from_cents(10000);
        let rate = Rate::from_bps(1000);
        assert_eq!(amount.apply_rate(rate).cents(), 1000);
    }

    #[test]
    fn test_apply_rate_rounds_half_up() {
        // 928.90 × 0.5 = 464.45 exactly
        let total = Money::from_cents(92890);
        assert_eq!(total.apply_rate(Rate::from_bps(5000)).cents(), 46445);

        // 0.01 × 50% = 0.005 → rounds up to 0.01
        let cent = Money::from_cents(1);
        assert_eq!(cent.apply_rate(Rate::from_bps(5000)).cents(), 1);
    }

    #[test]
    fn test_apply_taxed_rate_single_rounding() {
        // 600 × 0.15 × 1.21 = 108.90 exactly
        let base = Money::from_cents(60000);
        let amount = base.apply_taxed_rate(Rate::from_bps(1500), Rate::from_bps(2100));
        assert_eq!(amount.cents(), 10890);

        // 3.33 × 0.15 × 1.21 = 0.6044895 → 0.60
        // (rounding each factor separately would give 0.61)
        let base = Money::from_cents(333);
        let amount = base.apply_taxed_rate(Rate::from_bps(1500), Rate::from_bps(2100));
        assert_eq!(amount.cents(), 60);
    }

    #[test]
    fn test_apply_taxed_rate_zero_tax() {
        let base = Money::from_cents(60000);
        let amount = base.apply_taxed_rate(Rate::from_bps(1500), Rate::zero());
        assert_eq!(amount.cents(), base.apply_rate(Rate::from_bps(1500)).cents());
    }

    #[test]
    fn test_saturating_sub_zero() {
        let guarantee = Money::from_cents(10890);
        let small = Money::from_cents(890);
        let large = Money::from_cents(20000);

        assert_eq!(guarantee.saturating_sub_zero(small).cents(), 10000);
        assert_eq!(guarantee.saturating_sub_zero(large).cents(), 0);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let positive = Money::from_cents(100);
        assert!(positive.is_positive());

        let negative = Money::from_cents(-100);
        assert!(negative.is_negative());
    }

    #[test]
    fn test_multiply_quantity() {
        let per_day = Money::from_cents(10000);
        // quantity 2, days 3
        let line_total = per_day.multiply_quantity(2).multiply_quantity(3);
        assert_eq!(line_total.cents(), 60000);
    }

    #[test]
    fn test_rate_from_percentage() {
        assert_eq!(Rate::from_percentage(15.0).bps(), 1500);
        assert_eq!(Rate::from_percentage(21.0).bps(), 2100);
        assert!((Rate::from_bps(1500).percentage() - 15.0).abs() < 0.001);
    }
}
