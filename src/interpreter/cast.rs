//! CAST/TRY_CAST dispatch.
//!
//! The conversion table is keyed by (source value kind, target type); a
//! missing entry is a `TYPE_MISMATCH`. TRY_CAST wraps the same table and
//! converts any conversion failure into the typed null marker — the only
//! place a runtime error is silently swallowed.

use chrono::NaiveTime;

use crate::expression::error::{EvalError, EvalResult};
use crate::expression::expr::{Expr, ExprKind};
use crate::types::SqlType;
use crate::value::literal::{parse_boolean, render_double};
use crate::value::{parse_literal, render_literal, ScalarValue};

use super::core::{Folded, Folder};

impl Folder<'_> {
    pub(crate) fn fold_cast(
        &self,
        node: &Expr,
        operand: &Expr,
        target: &SqlType,
        safe: bool,
    ) -> EvalResult<Folded> {
        match self.fold(operand)? {
            Folded::Value(value) => match cast_value(&value, target) {
                Ok(out) => Ok(Folded::Value(out)),
                Err(_) if safe => Ok(Folded::Value(ScalarValue::Null(target.clone()))),
                Err(e) => Err(e),
            },
            Folded::Residual(residual) => {
                // A cast to the operand's own type cannot change or fail;
                // drop it from the residual.
                if self.types.resolve(&residual)? == *target {
                    return Ok(Folded::Residual(residual));
                }
                Ok(Folded::Residual(Expr::new(
                    node.id,
                    ExprKind::Cast {
                        operand: Box::new(residual),
                        target: target.clone(),
                        safe,
                    },
                )))
            }
        }
    }
}

/// Convert a concrete value to the target type per the coercion table
pub fn cast_value(value: &ScalarValue, target: &SqlType) -> EvalResult<ScalarValue> {
    use ScalarValue::*;

    if value.is_null() {
        return Ok(Null(target.clone()));
    }
    if value.sql_type() == *target {
        return Ok(value.clone());
    }

    match target {
        SqlType::Boolean => match value {
            Integer(n) => Ok(Boolean(*n != 0)),
            Bigint(n) => Ok(Boolean(*n != 0)),
            Double(d) => Ok(Boolean(*d != 0.0)),
            Decimal(d) => Ok(Boolean(!d.is_zero())),
            Varchar(bytes) => parse_boolean(&utf8(bytes, target)?).map(Boolean),
            _ => Err(no_entry(value, target)),
        },

        SqlType::Integer => {
            let wide = cast_to_i128(value, target)?;
            i32::try_from(wide).map(Integer).map_err(|_| out_of_range(value, target))
        }

        SqlType::Bigint => {
            let wide = cast_to_i128(value, target)?;
            i64::try_from(wide).map(Bigint).map_err(|_| out_of_range(value, target))
        }

        SqlType::Double => match value {
            Boolean(b) => Ok(Double(if *b { 1.0 } else { 0.0 })),
            Integer(n) => Ok(Double(*n as f64)),
            Bigint(n) => Ok(Double(*n as f64)),
            Decimal(d) => Ok(Double(d.to_f64())),
            Varchar(bytes) => parse_literal(target, &utf8(bytes, target)?),
            _ => Err(no_entry(value, target)),
        },

        SqlType::Decimal { precision, scale } => {
            let rescaled = match value {
                Boolean(b) => scaled_integral(if *b { 1 } else { 0 }, *scale)?,
                Integer(n) => scaled_integral(*n as i128, *scale)?,
                Bigint(n) => scaled_integral(*n as i128, *scale)?,
                Double(d) => {
                    if !d.is_finite() {
                        return Err(EvalError::InvalidCastArgument(format!(
                            "cannot cast DOUBLE {} to {}",
                            render_double(*d),
                            target
                        )));
                    }
                    let scaled = d * 10f64.powi(*scale as i32);
                    if scaled.abs() >= i128::MAX as f64 {
                        return Err(out_of_range(value, target));
                    }
                    round_half_away(scaled)
                }
                Decimal(d) => d.rescale(*scale)?.unscaled,
                Varchar(bytes) => {
                    return parse_literal(target, &utf8(bytes, target)?);
                }
                _ => return Err(no_entry(value, target)),
            };
            crate::value::Decimal::new(rescaled, *precision, *scale)
                .map(ScalarValue::Decimal)
                .map_err(|_| out_of_range(value, target))
        }

        SqlType::Varchar => match value {
            Boolean(_) | Integer(_) | Bigint(_) | Double(_) | Decimal(_) | Date(_) | Time(_)
            | Timestamp(_) => Ok(ScalarValue::Varchar(render_literal(value).into_bytes())),
            _ => Err(no_entry(value, target)),
        },

        SqlType::Date => match value {
            Varchar(bytes) => parse_literal(target, &utf8(bytes, target)?),
            Timestamp(ts) => Ok(Date(ts.date())),
            _ => Err(no_entry(value, target)),
        },

        SqlType::Time => match value {
            Varchar(bytes) => parse_literal(target, &utf8(bytes, target)?),
            Timestamp(ts) => Ok(Time(ts.time())),
            _ => Err(no_entry(value, target)),
        },

        SqlType::Timestamp => match value {
            Varchar(bytes) => parse_literal(target, &utf8(bytes, target)?),
            Date(d) => Ok(Timestamp(d.and_time(NaiveTime::MIN))),
            _ => Err(no_entry(value, target)),
        },

        SqlType::Array(_) | SqlType::Row(_) | SqlType::Map(_, _) => Err(no_entry(value, target)),
    }
}

/// Exact-integer conversion shared by the INTEGER and BIGINT targets;
/// doubles and decimals round half away from zero
fn cast_to_i128(value: &ScalarValue, target: &SqlType) -> EvalResult<i128> {
    use ScalarValue::*;
    match value {
        Boolean(b) => Ok(if *b { 1 } else { 0 }),
        Integer(n) => Ok(*n as i128),
        Bigint(n) => Ok(*n as i128),
        Double(d) => {
            if !d.is_finite() {
                return Err(EvalError::InvalidCastArgument(format!(
                    "cannot cast DOUBLE {} to {}",
                    render_double(*d),
                    target
                )));
            }
            if d.abs() >= i128::MAX as f64 {
                return Err(out_of_range(value, target));
            }
            Ok(round_half_away(*d))
        }
        Decimal(d) => Ok(d.to_integral()),
        Varchar(bytes) => match parse_literal(target, &utf8(bytes, target)?)? {
            Integer(n) => Ok(n as i128),
            Bigint(n) => Ok(n as i128),
            _ => Err(no_entry(value, target)),
        },
        _ => Err(no_entry(value, target)),
    }
}

fn round_half_away(value: f64) -> i128 {
    let rounded = if value >= 0.0 {
        (value + 0.5).floor()
    } else {
        (value - 0.5).ceil()
    };
    rounded as i128
}

fn scaled_integral(n: i128, scale: u8) -> EvalResult<i128> {
    let factor = 10i128
        .checked_pow(scale as u32)
        .ok_or_else(|| EvalError::NumericValueOutOfRange("decimal scale overflow".to_string()))?;
    n.checked_mul(factor)
        .ok_or_else(|| EvalError::NumericValueOutOfRange(format!("{} overflows at scale {}", n, scale)))
}

fn utf8(bytes: &[u8], target: &SqlType) -> EvalResult<String> {
    let text = std::str::from_utf8(bytes).map_err(|_| {
        EvalError::InvalidCastArgument(format!("invalid UTF-8 input for cast to {}", target))
    })?;
    // The word "null" is a literal spelling, not a castable string.
    if text.trim().eq_ignore_ascii_case("null") {
        return Err(EvalError::InvalidCastArgument(format!(
            "cannot cast '{}' to {}",
            text, target
        )));
    }
    Ok(text.to_string())
}

fn no_entry(value: &ScalarValue, target: &SqlType) -> EvalError {
    EvalError::cannot_coerce(&value.sql_type(), target)
}

fn out_of_range(value: &ScalarValue, target: &SqlType) -> EvalError {
    EvalError::NumericValueOutOfRange(format!("{} out of range for {}", value, target))
}
