//! Resource quantities (`500m`, `2`, `1Gi`, `1e3`).
//!
//! A `Quantity` is stored as a signed count of milli-units so that CPU
//! (usually fractional cores) and memory (usually whole bytes) share one
//! representation. Parsing rounds fractional milli-units up, the same way
//! the cluster API does.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, CoreResult};

const BINARY_SUFFIXES: [(&str, i64); 4] = [
    ("Ti", 1 << 40),
    ("Gi", 1 << 30),
    ("Mi", 1 << 20),
    ("Ki", 1 << 10),
];

const DECIMAL_SUFFIXES: [(&str, i64); 4] = [
    ("T", 1_000_000_000_000),
    ("G", 1_000_000_000),
    ("M", 1_000_000),
    ("k", 1_000),
];

/// An opaque resource amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity {
    milli: i64,
}

impl Quantity {
    pub const ZERO: Quantity = Quantity { milli: 0 };

    pub fn from_milli(milli: i64) -> Self {
        Self { milli }
    }

    pub fn from_value(value: i64) -> Self {
        Self {
            milli: value.saturating_mul(1000),
        }
    }

    /// Amount in milli-units (millicores for CPU).
    pub fn milli_value(&self) -> i64 {
        self.milli
    }

    /// Amount in whole units, rounded up (bytes for memory).
    pub fn value(&self) -> i64 {
        let whole = self.milli / 1000;
        if self.milli % 1000 > 0 { whole + 1 } else { whole }
    }

    pub fn is_zero(&self) -> bool {
        self.milli == 0
    }

    pub fn parse(input: &str) -> CoreResult<Self> {
        let err = || CoreError::Quantity(input.to_string());
        let s = input.trim();

        let (negative, s) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (number, suffix) = s.split_at(split);
        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') {
            return Err(err());
        }
        if int_part.len() + frac_part.len() > 30 || frac_part.len() > 18 {
            return Err(err());
        }

        let digits: u128 = format!("{int_part}{frac_part}")
            .parse()
            .map_err(|_| err())?;
        let scale = 10u128.pow(frac_part.len() as u32);

        let (mul, div): (u128, u128) = match suffix {
            "" => (1, 1),
            "m" => (1, 1000),
            "Ki" | "Mi" | "Gi" | "Ti" | "Pi" | "Ei" => {
                let shift = match suffix {
                    "Ki" => 10,
                    "Mi" => 20,
                    "Gi" => 30,
                    "Ti" => 40,
                    "Pi" => 50,
                    _ => 60,
                };
                (1u128 << shift, 1)
            }
            "k" => (10u128.pow(3), 1),
            "M" => (10u128.pow(6), 1),
            "G" => (10u128.pow(9), 1),
            "T" => (10u128.pow(12), 1),
            "P" => (10u128.pow(15), 1),
            "E" => (10u128.pow(18), 1),
            other => {
                let exp: i32 = other
                    .strip_prefix(['e', 'E'])
                    .and_then(|e| e.parse().ok())
                    .ok_or_else(err)?;
                if exp.unsigned_abs() > 18 {
                    return Err(err());
                }
                if exp >= 0 {
                    (10u128.pow(exp as u32), 1)
                } else {
                    (1, 10u128.pow(exp.unsigned_abs()))
                }
            }
        };

        let numerator = digits
            .checked_mul(mul)
            .and_then(|n| n.checked_mul(1000))
            .ok_or_else(err)?;
        let denominator = scale * div;
        let milli = numerator.div_ceil(denominator);
        let milli = i64::try_from(milli).map_err(|_| err())?;

        Ok(Self {
            milli: if negative { -milli } else { milli },
        })
    }
}

impl FromStr for Quantity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.milli % 1000 != 0 {
            return write!(f, "{}m", self.milli);
        }
        let value = self.milli / 1000;
        if value == 0 {
            return write!(f, "0");
        }
        for (suffix, unit) in BINARY_SUFFIXES.iter().chain(DECIMAL_SUFFIXES.iter()) {
            if value % unit == 0 {
                return write!(f, "{}{suffix}", value / unit);
            }
        }
        write!(f, "{value}")
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity {
            milli: self.milli.saturating_add(rhs.milli),
        }
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        self.milli = self.milli.saturating_add(rhs.milli);
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Quantity {
        iter.fold(Quantity::ZERO, |acc, q| acc + q)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Manifests write `cpu: 2` as often as `cpu: "2"`.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
            Float(f64),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Int(i) => i.to_string(),
            Raw::Float(x) => x.to_string(),
        };
        Quantity::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity {
        Quantity::parse(s).unwrap()
    }

    #[test]
    fn parses_cpu_forms() {
        assert_eq!(q("500m").milli_value(), 500);
        assert_eq!(q("2").milli_value(), 2000);
        assert_eq!(q("0.1").milli_value(), 100);
        assert_eq!(q("1.5").milli_value(), 1500);
    }

    #[test]
    fn parses_memory_forms() {
        assert_eq!(q("1Gi").value(), 1 << 30);
        assert_eq!(q("512Mi").value(), 512 << 20);
        assert_eq!(q("1.5Gi").value(), 3 << 29);
        assert_eq!(q("1G").value(), 1_000_000_000);
        assert_eq!(q("128974848").value(), 128_974_848);
        assert_eq!(q("1e3").value(), 1000);
    }

    #[test]
    fn fractional_milli_rounds_up() {
        assert_eq!(q("0.0001").milli_value(), 1);
        assert_eq!(q("1.5m").milli_value(), 2);
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "abc", "1Zi", "1.2.3", ".", "1e", "m"] {
            assert!(Quantity::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn display_picks_compact_form() {
        assert_eq!(q("500m").to_string(), "500m");
        assert_eq!(q("4").to_string(), "4");
        assert_eq!(q("1Gi").to_string(), "1Gi");
        assert_eq!(q("1G").to_string(), "1G");
        assert_eq!(q("0").to_string(), "0");
        assert_eq!((q("1500m") + q("500m")).to_string(), "2");
    }

    #[test]
    fn sums_quantities() {
        let total: Quantity = ["250m", "250m", "1"].iter().map(|s| q(s)).sum();
        assert_eq!(total.milli_value(), 1500);
    }

    #[test]
    fn deserializes_numbers_and_strings() {
        let from_int: Quantity = serde_json::from_str("2").unwrap();
        let from_float: Quantity = serde_json::from_str("0.5").unwrap();
        let from_str: Quantity = serde_json::from_str("\"64Mi\"").unwrap();
        assert_eq!(from_int.milli_value(), 2000);
        assert_eq!(from_float.milli_value(), 500);
        assert_eq!(from_str.value(), 64 << 20);
        assert_eq!(serde_json::to_string(&from_str).unwrap(), "\"64Mi\"");
    }
}
