//! Arbitrary-precision decimal numbers.
//!
//! [`Decimal`] wraps a [`BigDecimal`] whose scale is kept non-negative, so
//! `mantissa = 12345, scale = 2` is `123.45`. It backs decimal columns whose
//! values do not fit a native type (`Decimal(76, 20)` and friends).
//!
//! Addition, subtraction and multiplication are exact. Division keeps at most
//! [`MAX_DIVISION_PRECISION`] significant digits and truncates the rest.
//! Equality, ordering and hashing follow the numeric value, so `1.50 == 1.5`.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use bigdecimal::{BigDecimal, ParseBigDecimalError};
use num_bigint::{BigInt, Sign};
use num_traits::{ToPrimitive, Zero};

/// Maximum number of significant digits kept by [`Decimal::checked_div`].
pub const MAX_DIVISION_PRECISION: u32 = 50;

/// Arbitrary-precision decimal (mantissa and base-10 scale).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal(BigDecimal);

impl Decimal {
    /// Create from a mantissa and a scale.
    #[must_use]
    pub fn new(mantissa: BigInt, scale: u32) -> Self {
        Self(BigDecimal::new(mantissa, i64::from(scale)))
    }

    /// Zero with scale 0.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// One with scale 0.
    #[must_use]
    pub fn one() -> Self {
        Self::new(BigInt::from(1), 0)
    }

    /// Returns the unscaled integer value.
    #[must_use]
    pub fn mantissa(&self) -> BigInt {
        self.0.as_bigint_and_exponent().0
    }

    /// Returns the number of digits after the decimal point.
    #[must_use]
    pub fn scale(&self) -> u32 {
        self.0.fractional_digit_count() as u32
    }

    /// Returns -1, 0 or 1.
    #[must_use]
    pub fn signum(&self) -> i32 {
        match self.0.sign() {
            Sign::Minus => -1,
            Sign::NoSign => 0,
            Sign::Plus => 1,
        }
    }

    /// Mantissa expressed at `target` scale.
    ///
    /// Growing the scale is exact. Shrinking it drops digits, truncating
    /// toward zero.
    #[must_use]
    pub fn scale_mantissa(&self, target: u32) -> BigInt {
        self.0.with_scale(i64::from(target)).into_bigint_and_exponent().0
    }

    /// Same value at another scale, truncating toward zero.
    #[must_use]
    pub fn rescale(&self, target: u32) -> Self {
        Self(self.0.with_scale(i64::from(target)))
    }

    /// Drop least significant fractional digits until at most `precision`
    /// digits remain. Integer digits are never removed.
    #[must_use]
    pub fn truncate(&self, precision: u32) -> Self {
        let digits = number_of_digits(&self.mantissa());
        let remove = digits.saturating_sub(precision).min(self.scale());
        if remove == 0 {
            return self.clone();
        }
        self.rescale(self.scale() - remove)
    }

    /// Remove trailing zeros from the fractional part.
    #[must_use]
    pub fn normalize(&self) -> Self {
        Self::from(self.0.normalized())
    }

    /// Divide, keeping [`MAX_DIVISION_PRECISION`] significant digits.
    ///
    /// Returns `None` when `rhs` is zero.
    #[must_use]
    pub fn checked_div(&self, rhs: &Self) -> Option<Self> {
        if rhs.0.is_zero() {
            return None;
        }
        let quotient = Self::from(&self.0 / &rhs.0);
        Some(quotient.truncate(MAX_DIVISION_PRECISION).normalize())
    }

    /// Convert from a float using its shortest round-trip representation.
    ///
    /// Returns `None` for NaN and infinities.
    #[must_use]
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        value.to_string().parse().ok()
    }

    /// Lossy conversion to `f64`.
    #[must_use]
    pub fn to_f64(&self) -> Option<f64> {
        self.0.to_f64()
    }

    /// The underlying [`BigDecimal`].
    #[must_use]
    pub const fn as_big_decimal(&self) -> &BigDecimal {
        &self.0
    }
}

/// Number of decimal digits in `value`, ignoring sign. Zero has no digits.
#[must_use]
pub fn number_of_digits(value: &BigInt) -> u32 {
    if value.is_zero() {
        return 0;
    }
    value.magnitude().to_str_radix(10).len() as u32
}

pub(crate) fn pow10(exponent: u32) -> BigInt {
    num_traits::pow(BigInt::from(10), exponent as usize)
}

impl Add for Decimal {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Decimal {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul for Decimal {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self(self.0 * rhs.0)
    }
}

impl Add for &Decimal {
    type Output = Decimal;

    fn add(self, rhs: Self) -> Decimal {
        Decimal(&self.0 + &rhs.0)
    }
}

impl Sub for &Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Self) -> Decimal {
        Decimal(&self.0 - &rhs.0)
    }
}

impl Mul for &Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Self) -> Decimal {
        Decimal(&self.0 * &rhs.0)
    }
}

impl Neg for Decimal {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Decimal {
                fn from(value: $ty) -> Self {
                    Self::new(BigInt::from(value), 0)
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128);

impl From<BigInt> for Decimal {
    fn from(value: BigInt) -> Self {
        Self::new(value, 0)
    }
}

/// Negative scales (`1e3`) are expanded to scale 0.
impl From<BigDecimal> for Decimal {
    fn from(value: BigDecimal) -> Self {
        if value.fractional_digit_count() < 0 {
            Self(value.with_scale(0))
        } else {
            Self(value)
        }
    }
}

impl From<Decimal> for BigDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl FromStr for Decimal {
    type Err = ParseBigDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigDecimal::from_str(s.trim()).map(Self::from)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.write_plain_string(f)
    }
}
