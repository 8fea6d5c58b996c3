//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Pesos                                            │
//! │    Chilean pesos have NO minor unit, so every amount in the system is   │
//! │    a whole-number i64. Line totals, shift arithmetic, and card amounts  │
//! │    are all exact integer math.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use almacen_core::money::Money;
//!
//! let price = Money::from_clp(1290); // $1.290 CLP
//! let line = price * 3;              // $3.870 CLP
//! assert_eq!(line.clp(), 3870);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in whole Chilean pesos.
///
/// ## Design Decisions
/// - **i64 (signed)**: allows negative values for shift differences
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **sqlx transparent**: stored as a plain INTEGER column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole pesos.
    #[inline]
    pub const fn from_clp(pesos: i64) -> Self {
        Money(pesos)
    }

    /// Returns the value in whole pesos.
    #[inline]
    pub const fn clp(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is strictly positive.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Line total for a snapshot price and a quantity.
    ///
    /// Integer pesos times an integer quantity is exact, so the currency
    /// convention "round to the minor-unit-free integer" is a no-op here.
    #[inline]
    pub const fn line_total(&self, quantity: i64) -> Self {
        Money(self.0 * quantity)
    }

    /// IVA portion contained in a gross amount, at `rate_bps` basis points.
    ///
    /// Chilean prices are tax-inclusive; reporting wants the IVA slice of a
    /// gross total: `gross - gross / (1 + rate)`. Uses i128 to avoid overflow
    /// and rounds to the nearest peso.
    pub fn tax_portion(&self, rate_bps: u32) -> Money {
        let gross = self.0 as i128;
        let denom = 10_000 + rate_bps as i128;
        let net = (gross * 10_000 + denom / 2) / denom;
        Money((gross - net) as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows the Chilean convention: `$` plus thousands-dotted pesos.
///
/// For debugging and seed/demo output; report layout is a presentation
/// concern outside this crate.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let digits = self.0.abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }
        write!(f, "{}${}", sign, grouped)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_clp() {
        let money = Money::from_clp(1290);
        assert_eq!(money.clp(), 1290);
    }

    #[test]
    fn test_display_thousands_grouping() {
        assert_eq!(format!("{}", Money::from_clp(1290)), "$1.290");
        assert_eq!(format!("{}", Money::from_clp(500)), "$500");
        assert_eq!(format!("{}", Money::from_clp(1_234_567)), "$1.234.567");
        assert_eq!(format!("{}", Money::from_clp(-550)), "-$550");
        assert_eq!(format!("{}", Money::from_clp(0)), "$0");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_clp(1000);
        let b = Money::from_clp(500);

        assert_eq!((a + b).clp(), 1500);
        assert_eq!((a - b).clp(), 500);
        assert_eq!((a * 3).clp(), 3000);
    }

    #[test]
    fn test_line_total() {
        let price = Money::from_clp(990);
        assert_eq!(price.line_total(3).clp(), 2970);
    }

    #[test]
    fn test_sum() {
        let total: Money = [1000, 2500, 500]
            .iter()
            .map(|&p| Money::from_clp(p))
            .sum();
        assert_eq!(total.clp(), 4000);
    }

    #[test]
    fn test_tax_portion_standard_iva() {
        // $1.190 gross at 19% IVA: net $1.000, IVA $190
        let gross = Money::from_clp(1190);
        assert_eq!(gross.tax_portion(1900).clp(), 190);
    }

    #[test]
    fn test_tax_portion_zero_rate() {
        assert_eq!(Money::from_clp(5000).tax_portion(0).clp(), 0);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        assert!(Money::from_clp(100).is_positive());
        assert!(Money::from_clp(-100).is_negative());
    }
}
