//! Three-valued equality and ordering over scalar values.
//!
//! Equality follows SQL null semantics: a null operand makes the outcome
//! unknown (`None`). Container equality is element-wise with a definite
//! mismatch dominating unknown. `identical_values` is the IS DISTINCT FROM
//! comparison, which treats null as an ordinary comparable value.

use std::cmp::Ordering;

use crate::expression::error::{EvalError, EvalResult};
use crate::value::{Decimal, ScalarValue};

/// Three-valued equality: `None` means unknown.
pub fn equal_values(a: &ScalarValue, b: &ScalarValue) -> EvalResult<Option<bool>> {
    if a.is_null() || b.is_null() {
        return Ok(None);
    }
    use ScalarValue::*;
    match (a, b) {
        (Boolean(x), Boolean(y)) => Ok(Some(x == y)),
        (Varchar(x), Varchar(y)) => Ok(Some(x == y)),
        (Date(x), Date(y)) => Ok(Some(x == y)),
        (Time(x), Time(y)) => Ok(Some(x == y)),
        (Timestamp(x), Timestamp(y)) => Ok(Some(x == y)),
        (x, y) if x.is_numeric() && y.is_numeric() => Ok(Some(numeric_compare(x, y) == Ordering::Equal)),
        (
            Array { elements: xs, .. },
            Array { elements: ys, .. },
        ) => elements_equal(xs, ys),
        (Row(xs), Row(ys)) => elements_equal(xs, ys),
        (
            Map { entries: xs, .. },
            Map { entries: ys, .. },
        ) => maps_equal(xs, ys),
        _ => Err(EvalError::incompatible_operands(
            "=",
            &a.sql_type(),
            &b.sql_type(),
        )),
    }
}

/// Three-valued ordering for relational operators: `None` means unknown.
pub fn order_values(a: &ScalarValue, b: &ScalarValue) -> EvalResult<Option<Ordering>> {
    if a.is_null() || b.is_null() {
        return Ok(None);
    }
    use ScalarValue::*;
    match (a, b) {
        (Boolean(x), Boolean(y)) => Ok(Some(x.cmp(y))),
        (Varchar(x), Varchar(y)) => Ok(Some(x.cmp(y))),
        (Date(x), Date(y)) => Ok(Some(x.cmp(y))),
        (Time(x), Time(y)) => Ok(Some(x.cmp(y))),
        (Timestamp(x), Timestamp(y)) => Ok(Some(x.cmp(y))),
        (x, y) if x.is_numeric() && y.is_numeric() => Ok(Some(numeric_compare(x, y))),
        _ => Err(EvalError::incompatible_operands(
            "comparison",
            &a.sql_type(),
            &b.sql_type(),
        )),
    }
}

/// Identity comparison for IS [NOT] DISTINCT FROM, COALESCE deduplication
/// and map-key matching. Null is an ordinary value here: null is identical
/// to null and distinct from everything else.
pub fn identical_values(a: &ScalarValue, b: &ScalarValue) -> EvalResult<bool> {
    use ScalarValue::*;
    match (a, b) {
        (Null(_), Null(_)) => Ok(true),
        (Null(_), _) | (_, Null(_)) => Ok(false),
        (
            Array { elements: xs, .. },
            Array { elements: ys, .. },
        ) => elements_identical(xs, ys),
        (Row(xs), Row(ys)) => elements_identical(xs, ys),
        (
            Map { entries: xs, .. },
            Map { entries: ys, .. },
        ) => {
            if xs.len() != ys.len() {
                return Ok(false);
            }
            for (k, v) in xs {
                match map_lookup(ys, k)? {
                    Some(other) if identical_values(v, other)? => {}
                    _ => return Ok(false),
                }
            }
            Ok(true)
        }
        _ => Ok(equal_values(a, b)? == Some(true)),
    }
}

/// Find the value for an identical key in a map entry list
pub fn map_lookup<'a>(
    entries: &'a [(ScalarValue, ScalarValue)],
    key: &ScalarValue,
) -> EvalResult<Option<&'a ScalarValue>> {
    for (k, v) in entries {
        if identical_values(k, key)? {
            return Ok(Some(v));
        }
    }
    Ok(None)
}

/// Numeric comparison across kinds via the promotion lattice
fn numeric_compare(a: &ScalarValue, b: &ScalarValue) -> Ordering {
    if let (Some(x), Some(y)) = (as_exact_decimal(a), as_exact_decimal(b)) {
        return Decimal::compare(&x, &y);
    }
    let x = as_double(a);
    let y = as_double(b);
    x.total_cmp(&y)
}

fn as_exact_decimal(v: &ScalarValue) -> Option<Decimal> {
    match v {
        ScalarValue::Integer(n) => Some(Decimal {
            unscaled: *n as i128,
            precision: 10,
            scale: 0,
        }),
        ScalarValue::Bigint(n) => Some(Decimal {
            unscaled: *n as i128,
            precision: 19,
            scale: 0,
        }),
        ScalarValue::Decimal(d) => Some(*d),
        _ => None,
    }
}

fn as_double(v: &ScalarValue) -> f64 {
    match v {
        ScalarValue::Integer(n) => *n as f64,
        ScalarValue::Bigint(n) => *n as f64,
        ScalarValue::Double(d) => *d,
        ScalarValue::Decimal(d) => d.to_f64(),
        _ => f64::NAN,
    }
}

/// Element-wise three-valued equality: mismatch dominates unknown
fn elements_equal(xs: &[ScalarValue], ys: &[ScalarValue]) -> EvalResult<Option<bool>> {
    if xs.len() != ys.len() {
        return Ok(Some(false));
    }
    let mut saw_unknown = false;
    for (x, y) in xs.iter().zip(ys.iter()) {
        match equal_values(x, y)? {
            Some(false) => return Ok(Some(false)),
            Some(true) => {}
            None => saw_unknown = true,
        }
    }
    Ok(if saw_unknown { None } else { Some(true) })
}

fn elements_identical(xs: &[ScalarValue], ys: &[ScalarValue]) -> EvalResult<bool> {
    if xs.len() != ys.len() {
        return Ok(false);
    }
    for (x, y) in xs.iter().zip(ys.iter()) {
        if !identical_values(x, y)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Map equality: key sets must match exactly; values compare three-valued
fn maps_equal(
    xs: &[(ScalarValue, ScalarValue)],
    ys: &[(ScalarValue, ScalarValue)],
) -> EvalResult<Option<bool>> {
    if xs.len() != ys.len() {
        return Ok(Some(false));
    }
    let mut saw_unknown = false;
    for (k, v) in xs {
        match map_lookup(ys, k)? {
            None => return Ok(Some(false)),
            Some(other) => match equal_values(v, other)? {
                Some(false) => return Ok(Some(false)),
                Some(true) => {}
                None => saw_unknown = true,
            },
        }
    }
    Ok(if saw_unknown { None } else { Some(true) })
}
