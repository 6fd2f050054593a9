//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    199.9 * 0.7 = 139.92999999999998                                     │
//! │                                                                         │
//! │  Splitting a R$ 1000,00 invoice in three:                               │
//! │    333.33 × 3 = 999.99  → one centavo vanished                          │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Centavos                                         │
//! │    100000 / 3 = 33333 (×3 = 99999), remainder 1 goes to the last part  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use ebd_core::money::Money;
//!
//! let price = Money::from_cents(1099); // R$ 10,99
//! let doubled = price * 2;             // R$ 21,98
//! let total = price + Money::from_cents(500);
//! assert_eq!(total.cents(), 1599);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::Percent;

// =============================================================================
// Rounding
// =============================================================================

/// Divides `numerator` by `denominator` rounding half away from zero.
///
/// This is the single rounding rule of the pipeline: every value that leaves
/// sub-centavo precision goes through here.
pub(crate) fn div_round_half_up(numerator: i128, denominator: i128) -> i64 {
    debug_assert!(denominator > 0);
    let half = denominator / 2;
    let rounded = if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    };
    rounded as i64
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in centavos (1/100 of a real).
///
/// ## Design Decisions
/// - **i64 (signed)**: subtraction results (discounts) never need a separate type
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
///
/// ## Where Money is Used
/// ```text
/// LineItem.unit_price ──► priced original ──► discounted subtotal
///                                                   │
/// ShippingOption.cost ──────────────────────────────┤
///                                                   ▼
///                                             grand total ──► installments
///                                                   │
///                                                   ▼
///                                             commission base
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from centavos.
    ///
    /// ## Example
    /// ```rust
    /// use ebd_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // R$ 10,99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from reais and centavos.
    ///
    /// ## Example
    /// ```rust
    /// use ebd_core::money::Money;
    ///
    /// assert_eq!(Money::from_reais(199, 90).cents(), 19990);
    /// assert_eq!(Money::from_reais(-5, 50).cents(), -550);
    /// ```
    ///
    /// ## Note
    /// For negative amounts only the reais part carries the sign.
    #[inline]
    pub const fn from_reais(reais: i64, centavos: i64) -> Self {
        if reais < 0 {
            Money(reais * 100 - centavos)
        } else {
            Money(reais * 100 + centavos)
        }
    }

    /// Returns the value in centavos.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole reais portion.
    #[inline]
    pub const fn reais(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the centavos portion (always 0-99).
    #[inline]
    pub const fn centavos_part(&self) -> i64 {
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

    /// Clamps negative values to zero.
    #[inline]
    pub const fn non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use ebd_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(2490); // R$ 24,90
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 7470);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `rate` of this amount, rounded half-up to the centavo.
    ///
    /// ## Example
    /// ```rust
    /// use ebd_core::money::Money;
    /// use ebd_core::types::Percent;
    ///
    /// let base = Money::from_cents(90000);   // R$ 900,00
    /// let five = Percent::from_bps(500);     // 5%
    /// assert_eq!(base.percent_of(five).cents(), 4500);
    /// ```
    pub fn percent_of(&self, rate: Percent) -> Money {
        // i128 keeps large invoices from overflowing the intermediate product
        let cents = div_round_half_up(self.0 as i128 * rate.bps() as i128, 10_000);
        Money::from_cents(cents)
    }

    /// Applies a percentage discount and returns the discounted amount.
    ///
    /// ## Example
    /// ```rust
    /// use ebd_core::money::Money;
    /// use ebd_core::types::Percent;
    ///
    /// let subtotal = Money::from_cents(10000);
    /// let discounted = subtotal.apply_percentage_discount(Percent::from_bps(3000));
    /// assert_eq!(discounted.cents(), 7000);
    /// ```
    pub fn apply_percentage_discount(&self, discount: Percent) -> Money {
        *self - self.percent_of(discount)
    }

    /// Splits the amount into `parts` equal shares.
    ///
    /// Every share gets the floor of the division; the leftover centavos go
    /// to the last share, so the shares always sum back to the original.
    ///
    /// ## Example
    /// ```rust
    /// use ebd_core::money::Money;
    ///
    /// let shares = Money::from_cents(100000).split_evenly(3);
    /// let cents: Vec<i64> = shares.iter().map(|m| m.cents()).collect();
    /// assert_eq!(cents, vec![33333, 33333, 33334]);
    /// ```
    pub fn split_evenly(&self, parts: u32) -> Vec<Money> {
        if parts == 0 {
            return Vec::new();
        }
        let parts_i = parts as i64;
        let share = self.0 / parts_i;
        let remainder = self.0 - share * parts_i;

        let mut shares = vec![Money(share); parts as usize];
        if let Some(last) = shares.last_mut() {
            last.0 += remainder;
        }
        shares
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Brazilian real formatting: `R$ 1.234,56`.
///
/// ## Note
/// This is for logs and seller-facing messages. The front-end does its own
/// locale formatting from the raw centavos.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let reais = self.reais().abs().to_string();

        // Group the integer part in thousands with '.'
        let mut grouped = String::with_capacity(reais.len() + reais.len() / 3);
        for (i, ch) in reais.chars().enumerate() {
            if i > 0 && (reais.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }

        write!(f, "{}R$ {},{:02}", sign, grouped, self.centavos_part())
    }
}

/// Default money is zero.
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

/// Multiplication by integer (for quantity calculations).
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

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
