//! Built-in scalar functions.
//!
//! A deliberately small registry: enough for realistic folding scenarios
//! (deterministic math and string functions, plus the non-deterministic
//! `random()`), with SQL null propagation on every argument.

use crate::expression::error::{EvalError, EvalResult};
use crate::functions::{FunctionCatalog, ResolvedFunction};
use crate::types::SqlType;
use crate::value::ScalarValue;

/// Catalog of the built-in scalar functions
#[derive(Debug, Clone, Default)]
pub struct BuiltinCatalog;

impl BuiltinCatalog {
    pub fn new() -> Self {
        BuiltinCatalog
    }
}

impl FunctionCatalog for BuiltinCatalog {
    fn resolve(&self, name: &str, arg_types: &[SqlType]) -> Option<ResolvedFunction> {
        let name = name.to_ascii_lowercase();
        match (name.as_str(), arg_types) {
            ("abs", [ty]) if ty.is_numeric() => Some(scalar(&name, ty.clone(), abs_impl)),

            ("length", [SqlType::Varchar]) => {
                Some(scalar(&name, SqlType::Bigint, |args| match &args[0] {
                    ScalarValue::Varchar(bytes) => Ok(ScalarValue::Bigint(
                        String::from_utf8_lossy(bytes).chars().count() as i64,
                    )),
                    other => Err(bad_argument("length", other)),
                }))
            }

            ("upper", [SqlType::Varchar]) => {
                Some(scalar(&name, SqlType::Varchar, |args| {
                    recode(&args[0], "upper", |s| s.to_uppercase())
                }))
            }

            ("lower", [SqlType::Varchar]) => {
                Some(scalar(&name, SqlType::Varchar, |args| {
                    recode(&args[0], "lower", |s| s.to_lowercase())
                }))
            }

            ("concat", args_ty)
                if !args_ty.is_empty() && args_ty.iter().all(|t| *t == SqlType::Varchar) =>
            {
                Some(scalar(&name, SqlType::Varchar, |args| {
                    let mut out = Vec::new();
                    for arg in args {
                        match arg {
                            ScalarValue::Varchar(bytes) => out.extend_from_slice(bytes),
                            other => return Err(bad_argument("concat", other)),
                        }
                    }
                    Ok(ScalarValue::Varchar(out))
                }))
            }

            ("random", []) => Some(ResolvedFunction::new(
                "random",
                SqlType::Double,
                false,
                |_args| Ok(ScalarValue::Double(rand::random::<f64>())),
            )),

            _ => None,
        }
    }
}

/// Wrap an implementation with standard null propagation
fn scalar(
    name: &str,
    return_type: SqlType,
    body: impl Fn(&[ScalarValue]) -> EvalResult<ScalarValue> + Send + Sync + 'static,
) -> ResolvedFunction {
    let null_result = ScalarValue::Null(return_type.clone());
    ResolvedFunction::new(name, return_type, true, move |args| {
        if args.iter().any(|a| a.is_null()) {
            return Ok(null_result.clone());
        }
        body(args)
    })
}

fn abs_impl(args: &[ScalarValue]) -> EvalResult<ScalarValue> {
    match &args[0] {
        ScalarValue::Integer(n) => n
            .checked_abs()
            .map(ScalarValue::Integer)
            .ok_or_else(|| EvalError::NumericValueOutOfRange("abs(INTEGER) overflow".to_string())),
        ScalarValue::Bigint(n) => n
            .checked_abs()
            .map(ScalarValue::Bigint)
            .ok_or_else(|| EvalError::NumericValueOutOfRange("abs(BIGINT) overflow".to_string())),
        ScalarValue::Double(d) => Ok(ScalarValue::Double(d.abs())),
        ScalarValue::Decimal(d) => Ok(ScalarValue::Decimal(d.abs())),
        other => Err(bad_argument("abs", other)),
    }
}

fn recode(
    value: &ScalarValue,
    name: &str,
    transform: impl Fn(&str) -> String,
) -> EvalResult<ScalarValue> {
    match value {
        ScalarValue::Varchar(bytes) => Ok(ScalarValue::Varchar(
            transform(&String::from_utf8_lossy(bytes)).into_bytes(),
        )),
        other => Err(bad_argument(name, other)),
    }
}

fn bad_argument(name: &str, value: &ScalarValue) -> EvalError {
    EvalError::InvalidFunctionArgument(format!(
        "{} does not accept {}",
        name,
        value.sql_type()
    ))
}
