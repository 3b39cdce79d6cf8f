//! Error types for expression evaluation.

use thiserror::Error;

use crate::types::SqlType;

/// Errors that can occur while folding or evaluating an expression.
///
/// Each variant is one error kind; the payload is a human-readable detail.
/// Errors are cheap to clone because deferred-failure markers carry the
/// suppressed error inside the expression tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// The coercion table has no entry for a (source, target) pair, or an
    /// operator was applied to operands with no common type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A cast received a malformed input value.
    #[error("invalid cast argument: {0}")]
    InvalidCastArgument(String),

    /// A function (or the LIKE pattern compiler) received a bad argument.
    #[error("invalid function argument: {0}")]
    InvalidFunctionArgument(String),

    /// Decimal overflow, division by zero, or an out-of-range numeric cast.
    #[error("numeric value out of range: {0}")]
    NumericValueOutOfRange(String),

    /// Array subscript that is not a valid 1-based in-bounds position.
    #[error("invalid array index: {0}")]
    InvalidArrayIndex(String),

    /// Map subscript with a key absent from the map, or a NULL map key.
    #[error("invalid map key: {0}")]
    InvalidMapKey(String),

    /// `evaluate` requires a total binder; a variable had no binding.
    #[error("unbound variable: {0}")]
    UnboundVariable(String),
}

impl EvalError {
    /// Coercion-table miss between two types.
    pub fn cannot_coerce(from: &SqlType, to: &SqlType) -> Self {
        EvalError::TypeMismatch(format!("cannot coerce {} to {}", from, to))
    }

    /// Operator applied to incompatible operand types.
    pub fn incompatible_operands(operator: &str, left: &SqlType, right: &SqlType) -> Self {
        EvalError::TypeMismatch(format!(
            "cannot apply {} to {} and {}",
            operator, left, right
        ))
    }

    pub fn division_by_zero() -> Self {
        EvalError::NumericValueOutOfRange("division by zero".to_string())
    }
}

/// Result type for expression operations
pub type EvalResult<T> = Result<T, EvalError>;
