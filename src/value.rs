//! Scalar value model.
//!
//! This module provides:
//! - The tagged `ScalarValue` union, one variant per SQL type plus a
//!   type-tagged null marker
//! - Fixed-point decimal arithmetic
//! - Literal-syntax parsing and rendering
//! - Three-valued equality and ordering, including nested containers

pub mod compare;
pub mod decimal;
pub mod literal;

pub use compare::{equal_values, identical_values, map_lookup, order_values};
pub use decimal::Decimal;
pub use literal::{parse_literal, render_literal};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

use crate::types::SqlType;

/// A concrete SQL value, or the unknown/null marker.
///
/// Null carries the type of the position it occupies, so a value bound to
/// null stays distinguishable from an unbound variable and folding remains
/// type-preserving.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null(SqlType),
    Boolean(bool),
    Integer(i32),
    Bigint(i64),
    Double(f64),
    Decimal(Decimal),
    Varchar(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Array {
        elements: Vec<ScalarValue>,
        element_type: SqlType,
    },
    Row(Vec<ScalarValue>),
    Map {
        entries: Vec<(ScalarValue, ScalarValue)>,
        key_type: SqlType,
        value_type: SqlType,
    },
}

impl ScalarValue {
    /// Varchar value from UTF-8 text
    pub fn varchar(text: impl AsRef<str>) -> Self {
        ScalarValue::Varchar(text.as_ref().as_bytes().to_vec())
    }

    /// Varchar value from raw bytes (invalid UTF-8 tolerated)
    pub fn varchar_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        ScalarValue::Varchar(bytes.into())
    }

    pub fn decimal(unscaled: i128, precision: u8, scale: u8) -> Self {
        ScalarValue::Decimal(Decimal {
            unscaled,
            precision,
            scale,
        })
    }

    pub fn array(element_type: SqlType, elements: Vec<ScalarValue>) -> Self {
        ScalarValue::Array {
            elements,
            element_type,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null(_))
    }

    /// The SQL type of this value
    pub fn sql_type(&self) -> SqlType {
        match self {
            ScalarValue::Null(ty) => ty.clone(),
            ScalarValue::Boolean(_) => SqlType::Boolean,
            ScalarValue::Integer(_) => SqlType::Integer,
            ScalarValue::Bigint(_) => SqlType::Bigint,
            ScalarValue::Double(_) => SqlType::Double,
            ScalarValue::Decimal(d) => SqlType::Decimal {
                precision: d.precision,
                scale: d.scale,
            },
            ScalarValue::Varchar(_) => SqlType::Varchar,
            ScalarValue::Date(_) => SqlType::Date,
            ScalarValue::Time(_) => SqlType::Time,
            ScalarValue::Timestamp(_) => SqlType::Timestamp,
            ScalarValue::Array { element_type, .. } => SqlType::Array(Box::new(element_type.clone())),
            ScalarValue::Row(fields) => SqlType::Row(fields.iter().map(|f| f.sql_type()).collect()),
            ScalarValue::Map {
                key_type,
                value_type,
                ..
            } => SqlType::Map(Box::new(key_type.clone()), Box::new(value_type.clone())),
        }
    }

    /// True when the value is a numeric kind (null excluded)
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarValue::Integer(_)
                | ScalarValue::Bigint(_)
                | ScalarValue::Double(_)
                | ScalarValue::Decimal(_)
        )
    }
}

impl fmt::Display for ScalarValue {
    /// SQL literal syntax for the value, usable in a rendered residual
    /// expression.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null(_) => write!(f, "NULL"),
            ScalarValue::Boolean(b) => write!(f, "{}", b),
            ScalarValue::Integer(n) => write!(f, "{}", n),
            ScalarValue::Bigint(n) => write!(f, "BIGINT '{}'", n),
            ScalarValue::Double(d) => write!(f, "{}", literal::render_double(*d)),
            ScalarValue::Decimal(d) => write!(f, "DECIMAL '{}'", d.render()),
            ScalarValue::Varchar(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                write!(f, "'{}'", text.replace('\'', "''"))
            }
            ScalarValue::Date(d) => write!(f, "DATE '{}'", d.format("%Y-%m-%d")),
            ScalarValue::Time(t) => write!(f, "TIME '{}'", t.format("%H:%M:%S%.f")),
            ScalarValue::Timestamp(ts) => {
                write!(f, "TIMESTAMP '{}'", ts.format("%Y-%m-%d %H:%M:%S%.f"))
            }
            ScalarValue::Array { elements, .. } => {
                write!(f, "ARRAY[")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "]")
            }
            ScalarValue::Row(fields) => {
                write!(f, "ROW(")?;
                for (i, e) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            ScalarValue::Map { entries, .. } => {
                write!(f, "MAP(ARRAY[")?;
                for (i, (k, _)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", k)?;
                }
                write!(f, "], ARRAY[")?;
                for (i, (_, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "])")
            }
        }
    }
}
