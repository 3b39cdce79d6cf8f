//! Literal-syntax parsing and rendering for scalar values.
//!
//! Every literal produced by folding must re-parse to an equal value, so
//! `render_literal` and `parse_literal` are kept in lockstep.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::num::IntErrorKind;

use crate::expression::error::{EvalError, EvalResult};
use crate::types::SqlType;
use crate::value::{Decimal, ScalarValue};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Parse literal body text into a value of the given type.
///
/// The text is the bare literal body (no quotes, no type prefix). The
/// case-insensitive word `null` parses to the typed null marker.
pub fn parse_literal(ty: &SqlType, text: &str) -> EvalResult<ScalarValue> {
    if text.trim().eq_ignore_ascii_case("null") {
        return Ok(ScalarValue::Null(ty.clone()));
    }
    match ty {
        SqlType::Boolean => parse_boolean(text.trim()).map(ScalarValue::Boolean),
        SqlType::Integer => match text.trim().parse::<i32>() {
            Ok(n) => Ok(ScalarValue::Integer(n)),
            Err(e) => Err(integer_parse_error(text, "INTEGER", e.kind())),
        },
        SqlType::Bigint => match text.trim().parse::<i64>() {
            Ok(n) => Ok(ScalarValue::Bigint(n)),
            Err(e) => Err(integer_parse_error(text, "BIGINT", e.kind())),
        },
        SqlType::Double => text
            .trim()
            .parse::<f64>()
            .map(ScalarValue::Double)
            .map_err(|_| {
                EvalError::InvalidCastArgument(format!("malformed DOUBLE literal '{}'", text))
            }),
        SqlType::Decimal { precision, scale } => {
            let parsed = Decimal::parse(text)?;
            let rescaled = parsed.rescale(*scale)?;
            Decimal::new(rescaled.unscaled, *precision, *scale).map(ScalarValue::Decimal)
        }
        SqlType::Varchar => Ok(ScalarValue::Varchar(text.as_bytes().to_vec())),
        SqlType::Date => NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
            .map(ScalarValue::Date)
            .map_err(|_| {
                EvalError::InvalidCastArgument(format!("malformed DATE literal '{}'", text))
            }),
        SqlType::Time => NaiveTime::parse_from_str(text.trim(), TIME_FORMAT)
            .map(ScalarValue::Time)
            .map_err(|_| {
                EvalError::InvalidCastArgument(format!("malformed TIME literal '{}'", text))
            }),
        SqlType::Timestamp => NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT)
            .map(ScalarValue::Timestamp)
            .map_err(|_| {
                EvalError::InvalidCastArgument(format!("malformed TIMESTAMP literal '{}'", text))
            }),
        SqlType::Array(_) | SqlType::Row(_) | SqlType::Map(_, _) => Err(
            EvalError::InvalidCastArgument(format!("no literal syntax for {}", ty)),
        ),
    }
}

/// Render the canonical literal body for a scalar value.
///
/// Inverse of [`parse_literal`] for every scalar type; container values have
/// constructor syntax instead (see the `Display` impl on `ScalarValue`).
pub fn render_literal(value: &ScalarValue) -> String {
    match value {
        ScalarValue::Null(_) => "null".to_string(),
        ScalarValue::Boolean(b) => b.to_string(),
        ScalarValue::Integer(n) => n.to_string(),
        ScalarValue::Bigint(n) => n.to_string(),
        ScalarValue::Double(d) => render_double(*d),
        ScalarValue::Decimal(d) => d.render(),
        ScalarValue::Varchar(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ScalarValue::Date(d) => d.format(DATE_FORMAT).to_string(),
        ScalarValue::Time(t) => t.format(TIME_FORMAT).to_string(),
        ScalarValue::Timestamp(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
        other => other.to_string(),
    }
}

/// Boolean text per the string-cast rule: {true, t, 1} / {false, f, 0},
/// case-insensitive
pub fn parse_boolean(text: &str) -> EvalResult<bool> {
    let lowered = text.to_ascii_lowercase();
    match lowered.as_str() {
        "true" | "t" | "1" => Ok(true),
        "false" | "f" | "0" => Ok(false),
        _ => Err(EvalError::InvalidCastArgument(format!(
            "malformed BOOLEAN literal '{}'",
            text
        ))),
    }
}

/// Scientific-notation rendering that f64 parsing round-trips
pub fn render_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        format!("{:E}", value)
    }
}

fn integer_parse_error(text: &str, type_name: &str, kind: &IntErrorKind) -> EvalError {
    match kind {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => EvalError::NumericValueOutOfRange(
            format!("literal '{}' out of range for {}", text.trim(), type_name),
        ),
        _ => EvalError::InvalidCastArgument(format!(
            "malformed {} literal '{}'",
            type_name,
            text.trim()
        )),
    }
}
