//! Unbounded non-negative head counts.
//!
//! Cohorts can grow past any machine word over long horizons, so every count
//! the engine touches is a [`BigCount`]. The type is unsigned: a negative
//! population cannot be represented, and subtraction is either checked or
//! saturating.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use num_bigint::{BigUint, ParseBigIntError};
use num_traits::{FromPrimitive, ToPrimitive, Zero};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BigCount(BigUint);

impl BigCount {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn from_u64(value: u64) -> Self {
        Self(BigUint::from(value))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Number of significant bits; zero for an empty count.
    pub fn bits(&self) -> u64 {
        self.0.bits()
    }

    pub fn to_u64(&self) -> Option<u64> {
        self.0.to_u64()
    }

    /// Nearest `f64`, saturating to infinity for counts wider than the
    /// floating-point range.
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::INFINITY)
    }

    /// Converts a finite, non-negative float by truncation. Anything else maps
    /// to zero.
    pub fn from_f64_floor(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Self::zero();
        }
        Self(BigUint::from_f64(value.floor()).unwrap_or_default())
    }

    /// True when the count is strictly smaller than `threshold`.
    pub fn is_below(&self, threshold: u64) -> bool {
        self.0 < BigUint::from(threshold)
    }

    pub fn checked_sub(&self, other: &BigCount) -> Option<BigCount> {
        if self.0 >= other.0 {
            Some(Self(&self.0 - &other.0))
        } else {
            None
        }
    }

    pub fn saturating_sub(&self, other: &BigCount) -> BigCount {
        self.checked_sub(other).unwrap_or_default()
    }

    pub fn mul_small(&self, factor: u64) -> BigCount {
        Self(&self.0 * factor)
    }

    /// `floor(self * factor)`, computed exactly from the binary expansion of
    /// `factor`. Negative or non-finite factors yield zero.
    pub fn scale(&self, factor: f64) -> BigCount {
        if !factor.is_finite() || factor <= 0.0 || self.is_zero() {
            return Self::zero();
        }
        let bits = factor.to_bits();
        let biased_exponent = ((bits >> 52) & 0x7ff) as i64;
        let fraction = bits & 0x000f_ffff_ffff_ffff;
        let (mantissa, exponent) = if biased_exponent == 0 {
            (fraction, -1074)
        } else {
            (fraction | 0x0010_0000_0000_0000, biased_exponent - 1075)
        };
        let product = &self.0 * mantissa;
        if exponent >= 0 {
            Self(product << exponent as u64)
        } else {
            Self(product >> (-exponent) as u64)
        }
    }

    /// `round(self * numerator / denominator)`, zero when `denominator` is.
    pub fn mul_div_round(&self, numerator: &BigCount, denominator: &BigCount) -> BigCount {
        if denominator.is_zero() {
            return Self::zero();
        }
        let twice = &self.0 * &numerator.0 * 2u32;
        Self((twice + &denominator.0) / (&denominator.0 * 2u32))
    }

    /// Integer square root, rounded down.
    pub fn isqrt(&self) -> BigCount {
        Self(self.0.sqrt())
    }
}

impl From<u64> for BigCount {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl Add for BigCount {
    type Output = BigCount;

    fn add(self, rhs: BigCount) -> BigCount {
        Self(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a BigCount> for &'a BigCount {
    type Output = BigCount;

    fn add(self, rhs: &'a BigCount) -> BigCount {
        BigCount(&self.0 + &rhs.0)
    }
}

impl AddAssign<&BigCount> for BigCount {
    fn add_assign(&mut self, rhs: &BigCount) {
        self.0 += &rhs.0;
    }
}

impl AddAssign<BigCount> for BigCount {
    fn add_assign(&mut self, rhs: BigCount) {
        self.0 += rhs.0;
    }
}

impl AddAssign<u64> for BigCount {
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

impl Sum for BigCount {
    fn sum<I: Iterator<Item = BigCount>>(iter: I) -> Self {
        iter.fold(BigCount::zero(), |acc, value| acc + value)
    }
}

impl<'a> Sum<&'a BigCount> for BigCount {
    fn sum<I: Iterator<Item = &'a BigCount>>(iter: I) -> Self {
        let mut total = BigCount::zero();
        for value in iter {
            total += value;
        }
        total
    }
}

impl fmt::Display for BigCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BigCount {
    type Err = ParseBigIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigUint::from_str(s.trim()).map(Self)
    }
}

impl Serialize for BigCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// Accepts native integers as well as decimal strings, so small counts can be
/// written unquoted in scenario files.
impl<'de> Deserialize<'de> for BigCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CountVisitor;

        impl<'de> de::Visitor<'de> for CountVisitor {
            type Value = BigCount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or a decimal string")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<BigCount, E> {
                Ok(BigCount::from_u64(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<BigCount, E> {
                u64::try_from(value)
                    .map(BigCount::from_u64)
                    .map_err(|_| E::custom(format!("negative count {value}")))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<BigCount, E> {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(CountVisitor)
    }
}
