//! Fixed-point decimal arithmetic on a scaled 128-bit integer.
//!
//! A value is `unscaled * 10^-scale`, carrying an explicit declared
//! precision. Arithmetic computes the result precision and scale per
//! standard SQL decimal promotion rules and signals
//! `NUMERIC_VALUE_OUT_OF_RANGE` when a result does not fit its declared
//! precision. Rounding on any scale reduction is half-away-from-zero.

use std::cmp::Ordering;

use crate::expression::error::{EvalError, EvalResult};
use crate::types::MAX_DECIMAL_PRECISION;

/// A fixed-point decimal value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    pub unscaled: i128,
    pub precision: u8,
    pub scale: u8,
}

impl Decimal {
    /// Create a decimal, verifying the unscaled value fits the precision
    pub fn new(unscaled: i128, precision: u8, scale: u8) -> EvalResult<Self> {
        if precision == 0 || precision > MAX_DECIMAL_PRECISION || scale > precision {
            return Err(EvalError::NumericValueOutOfRange(format!(
                "invalid decimal shape DECIMAL({},{})",
                precision, scale
            )));
        }
        let value = Decimal {
            unscaled,
            precision,
            scale,
        };
        value.check_fits(precision)?;
        Ok(value)
    }

    /// Zero with the given precision and scale
    pub fn zero(precision: u8, scale: u8) -> Self {
        Decimal {
            unscaled: 0,
            precision,
            scale,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.unscaled == 0
    }

    /// Number of significant digits in the unscaled value (at least 1)
    fn digits(unscaled: i128) -> u8 {
        let mut n = unscaled.unsigned_abs();
        let mut count = 1u8;
        while n >= 10 {
            n /= 10;
            count += 1;
        }
        count
    }

    fn check_fits(&self, precision: u8) -> EvalResult<()> {
        if Self::digits(self.unscaled) > precision {
            return Err(EvalError::NumericValueOutOfRange(format!(
                "value {} does not fit DECIMAL({},{})",
                self.render(),
                precision,
                self.scale
            )));
        }
        Ok(())
    }

    fn pow10(exp: u8) -> Option<i128> {
        if exp > MAX_DECIMAL_PRECISION {
            return None;
        }
        10i128.checked_pow(exp as u32)
    }

    /// Integer division rounding half away from zero
    fn div_round(numerator: i128, denominator: i128) -> i128 {
        debug_assert!(denominator > 0);
        let quotient = numerator / denominator;
        let remainder = numerator % denominator;
        if remainder.unsigned_abs() * 2 >= denominator.unsigned_abs() {
            quotient + numerator.signum()
        } else {
            quotient
        }
    }

    /// The unscaled value re-expressed at `target_scale`, or `None` when
    /// scaling up overflows i128
    fn unscaled_at(&self, target_scale: u8) -> Option<i128> {
        match target_scale.cmp(&self.scale) {
            Ordering::Equal => Some(self.unscaled),
            Ordering::Greater => {
                let factor = Self::pow10(target_scale - self.scale)?;
                self.unscaled.checked_mul(factor)
            }
            Ordering::Less => {
                let factor = Self::pow10(self.scale - target_scale)?;
                Some(Self::div_round(self.unscaled, factor))
            }
        }
    }

    /// Re-express this value at a new scale, rounding half away from zero
    /// when the scale shrinks. The precision is adjusted to hold the result.
    pub fn rescale(&self, target_scale: u8) -> EvalResult<Decimal> {
        let unscaled = self.unscaled_at(target_scale).ok_or_else(|| {
            EvalError::NumericValueOutOfRange(format!(
                "cannot rescale {} to scale {}",
                self.render(),
                target_scale
            ))
        })?;
        let integral = self.precision.saturating_sub(self.scale);
        let precision = (integral + target_scale)
            .max(Self::digits(unscaled))
            .clamp(1, MAX_DECIMAL_PRECISION);
        Ok(Decimal {
            unscaled,
            precision,
            scale: target_scale,
        })
    }

    pub fn negate(&self) -> Decimal {
        Decimal {
            unscaled: -self.unscaled,
            precision: self.precision,
            scale: self.scale,
        }
    }

    pub fn abs(&self) -> Decimal {
        Decimal {
            unscaled: self.unscaled.abs(),
            precision: self.precision,
            scale: self.scale,
        }
    }

    /// Result shape for addition/subtraction: max scale, widened by one
    /// integral digit
    fn sum_shape(a: &Decimal, b: &Decimal) -> (u8, u8) {
        let scale = a.scale.max(b.scale);
        let integral = (a.precision - a.scale).max(b.precision - b.scale);
        let precision = (integral + scale + 1).min(MAX_DECIMAL_PRECISION);
        (precision, scale)
    }

    pub fn add(a: &Decimal, b: &Decimal) -> EvalResult<Decimal> {
        let (precision, scale) = Self::sum_shape(a, b);
        let overflow =
            || EvalError::NumericValueOutOfRange("decimal addition overflow".to_string());
        let x = a.unscaled_at(scale).ok_or_else(overflow)?;
        let y = b.unscaled_at(scale).ok_or_else(overflow)?;
        let unscaled = x.checked_add(y).ok_or_else(overflow)?;
        let result = Decimal {
            unscaled,
            precision,
            scale,
        };
        result.check_fits(precision)?;
        Ok(result)
    }

    pub fn subtract(a: &Decimal, b: &Decimal) -> EvalResult<Decimal> {
        Self::add(a, &b.negate())
    }

    pub fn multiply(a: &Decimal, b: &Decimal) -> EvalResult<Decimal> {
        let scale = a.scale.checked_add(b.scale).filter(|s| *s <= MAX_DECIMAL_PRECISION);
        let scale = scale.ok_or_else(|| {
            EvalError::NumericValueOutOfRange("decimal multiplication scale overflow".to_string())
        })?;
        let precision = (a.precision.saturating_add(b.precision)).min(MAX_DECIMAL_PRECISION);
        let unscaled = a.unscaled.checked_mul(b.unscaled).ok_or_else(|| {
            EvalError::NumericValueOutOfRange("decimal multiplication overflow".to_string())
        })?;
        let result = Decimal {
            unscaled,
            precision,
            scale,
        };
        result.check_fits(precision)?;
        Ok(result)
    }

    pub fn divide(a: &Decimal, b: &Decimal) -> EvalResult<Decimal> {
        if b.unscaled == 0 {
            return Err(EvalError::division_by_zero());
        }
        let scale = a.scale.max(b.scale);
        let precision = (a.precision as u16 + b.scale as u16
            + b.scale.saturating_sub(a.scale) as u16)
            .min(MAX_DECIMAL_PRECISION as u16) as u8;
        // a/b at scale rs: round(a.unscaled * 10^(rs - s1 + s2) / b.unscaled)
        let shift = scale - a.scale + b.scale;
        let overflow =
            || EvalError::NumericValueOutOfRange("decimal division overflow".to_string());
        let factor = Self::pow10(shift).ok_or_else(overflow)?;
        let numerator = a.unscaled.checked_mul(factor).ok_or_else(overflow)?;
        let unscaled = if b.unscaled > 0 {
            Self::div_round(numerator, b.unscaled)
        } else {
            Self::div_round(-numerator, -b.unscaled)
        };
        let result = Decimal {
            unscaled,
            precision: precision.max(1),
            scale,
        };
        result.check_fits(result.precision)?;
        Ok(result)
    }

    pub fn modulo(a: &Decimal, b: &Decimal) -> EvalResult<Decimal> {
        if b.unscaled == 0 {
            return Err(EvalError::division_by_zero());
        }
        let scale = a.scale.max(b.scale);
        let overflow =
            || EvalError::NumericValueOutOfRange("decimal remainder overflow".to_string());
        let x = a.unscaled_at(scale).ok_or_else(overflow)?;
        let y = b.unscaled_at(scale).ok_or_else(overflow)?;
        let integral = (a.precision - a.scale).min(b.precision - b.scale);
        let precision = (integral + scale).clamp(1, MAX_DECIMAL_PRECISION);
        Ok(Decimal {
            unscaled: x % y,
            precision,
            scale,
        })
    }

    /// Compare two decimals by value, across differing scales
    pub fn compare(a: &Decimal, b: &Decimal) -> Ordering {
        let scale = a.scale.max(b.scale);
        match (a.unscaled_at(scale), b.unscaled_at(scale)) {
            (Some(x), Some(y)) => x.cmp(&y),
            // A side that overflows the common scale has the larger
            // magnitude; its sign decides.
            (None, Some(_)) => {
                if a.unscaled >= 0 {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (Some(_), None) => {
                if b.unscaled >= 0 {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (None, None) => a
                .to_f64()
                .partial_cmp(&b.to_f64())
                .unwrap_or(Ordering::Equal),
        }
    }

    pub fn to_f64(&self) -> f64 {
        self.unscaled as f64 / 10f64.powi(self.scale as i32)
    }

    /// The value rounded to an integer, half away from zero
    pub fn to_integral(&self) -> i128 {
        match Self::pow10(self.scale) {
            Some(factor) => Self::div_round(self.unscaled, factor),
            None => 0,
        }
    }

    /// Parse decimal literal syntax: optional sign, digits, optional
    /// fraction. Precision counts every written digit, including leading
    /// zeros, the way declared decimal literals do.
    pub fn parse(text: &str) -> EvalResult<Decimal> {
        let text = text.trim();
        let malformed = || EvalError::InvalidCastArgument(format!("malformed decimal '{}'", text));

        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (integral, fraction) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        if integral.is_empty() && fraction.is_empty() {
            return Err(malformed());
        }
        if !integral.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(malformed());
        }

        let digit_count = integral.len() + fraction.len();
        if digit_count > MAX_DECIMAL_PRECISION as usize {
            return Err(EvalError::NumericValueOutOfRange(format!(
                "decimal '{}' exceeds {} digits",
                text, MAX_DECIMAL_PRECISION
            )));
        }

        let mut unscaled: i128 = 0;
        for b in integral.bytes().chain(fraction.bytes()) {
            unscaled = unscaled * 10 + (b - b'0') as i128;
        }
        if negative {
            unscaled = -unscaled;
        }
        Ok(Decimal {
            unscaled,
            precision: digit_count.max(1) as u8,
            scale: fraction.len() as u8,
        })
    }

    /// Render back to literal syntax that re-parses to an equal value
    pub fn render(&self) -> String {
        let digits = self.unscaled.unsigned_abs().to_string();
        let sign = if self.unscaled < 0 { "-" } else { "" };
        if self.scale == 0 {
            return format!("{}{}", sign, digits);
        }
        let scale = self.scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale - digits.len() + 1), digits)
        } else {
            digits
        };
        let split = padded.len() - scale;
        format!("{}{}.{}", sign, &padded[..split], &padded[split..])
    }
}
