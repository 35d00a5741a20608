//! Fixed-point arithmetic for precise decimal prices without floating point errors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scale factor for 8 decimal places (100,000,000)
pub const SCALE: i64 = 100_000_000;

/// Fixed-point decimal representation using i64 with 8 decimal precision
///
/// Prices and per-tick values are stored as integers scaled by [`SCALE`],
/// which keeps the add/subtract arithmetic of the rolling windows exact:
/// combining and uncombining the same operand is a strict no-op.
///
/// Example:
/// - 50000.12345678 → 5000012345678
/// - 1.5 → 150000000
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct FixedPoint(pub i64);

impl FixedPoint {
    /// Create FixedPoint from a decimal string (e.g., "50000.12345678")
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, FixedPointError> {
        if s.is_empty() {
            return Err(FixedPointError::InvalidFormat);
        }

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() > 2 {
            return Err(FixedPointError::InvalidFormat);
        }

        let integer_part: i64 = parts[0]
            .parse()
            .map_err(|_| FixedPointError::InvalidFormat)?;

        // Fractional digits are scaled by 10^(8-len); no string padding
        let fractional_part = if parts.len() == 2 {
            let frac_str = parts[1];
            let frac_len = frac_str.len();
            if frac_len > 8 {
                return Err(FixedPointError::TooManyDecimals);
            }

            let frac_digits: i64 = frac_str
                .parse()
                .map_err(|_| FixedPointError::InvalidFormat)?;

            const POWERS: [i64; 9] = [
                100_000_000,
                10_000_000,
                1_000_000,
                100_000,
                10_000,
                1_000,
                100,
                10,
                1,
            ];
            frac_digits * POWERS[frac_len]
        } else {
            0
        };

        let result = if integer_part >= 0 {
            integer_part * SCALE + fractional_part
        } else {
            integer_part * SCALE - fractional_part
        };

        Ok(FixedPoint(result))
    }

    /// Build from an integer number of whole units (e.g. dollars)
    pub const fn from_units(units: i64) -> Self {
        FixedPoint(units * SCALE)
    }

    /// Convert to f64 for user-facing output
    #[inline]
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    /// Raw scaled value widened for overflow-free products
    #[inline]
    pub fn raw_i128(&self) -> i128 {
        self.0 as i128
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs_value = self.0.abs();
        let integer_part = abs_value / SCALE;
        let fractional_part = abs_value % SCALE;
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:08}", sign, integer_part, fractional_part)
    }
}

impl FromStr for FixedPoint {
    type Err = FixedPointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FixedPoint::from_str(s)
    }
}

/// Fixed-point parse errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixedPointError {
    /// Invalid number format
    InvalidFormat,
    /// Too many decimal places (>8)
    TooManyDecimals,
}

impl fmt::Display for FixedPointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixedPointError::InvalidFormat => write!(f, "Invalid number format"),
            FixedPointError::TooManyDecimals => write!(f, "Too many decimal places (max 8)"),
        }
    }
}

impl std::error::Error for FixedPointError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_string() {
        assert_eq!(FixedPoint::from_str("0").unwrap().0, 0);
        assert_eq!(FixedPoint::from_str("1").unwrap().0, SCALE);
        assert_eq!(FixedPoint::from_str("1.5").unwrap().0, SCALE + SCALE / 2);
        assert_eq!(
            FixedPoint::from_str("50000.12345678").unwrap().0,
            5000012345678
        );
        assert_eq!(FixedPoint::from_str("-1.5").unwrap().0, -SCALE - SCALE / 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(FixedPoint(0).to_string(), "0.00000000");
        assert_eq!(FixedPoint(SCALE).to_string(), "1.00000000");
        assert_eq!(FixedPoint(5000012345678).to_string(), "50000.12345678");
        assert_eq!(FixedPoint(-SCALE).to_string(), "-1.00000000");
    }

    #[test]
    fn test_round_trip() {
        for val in ["0", "1", "1.5", "50000.12345678", "-50000.12345678"] {
            let fp = FixedPoint::from_str(val).unwrap();
            let back = FixedPoint::from_str(&fp.to_string()).unwrap();
            assert_eq!(fp, back, "round trip failed for {}", val);
        }
    }

    #[test]
    fn test_from_units() {
        assert_eq!(FixedPoint::from_units(100), FixedPoint::from_str("100").unwrap());
        assert_eq!(FixedPoint::from_units(100).to_f64(), 100.0);
    }

    #[test]
    fn test_error_cases() {
        assert!(FixedPoint::from_str("").is_err());
        assert!(FixedPoint::from_str("not_a_number").is_err());
        assert!(FixedPoint::from_str("1.123456789").is_err());
        assert!(FixedPoint::from_str("1.2.3").is_err());
    }
}
