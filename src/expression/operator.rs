//! Operator definitions for expressions.

use crate::types::{SqlType, MAX_DECIMAL_PRECISION};

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
}

impl ArithmeticOp {
    /// Result type for two operand types, or `None` when no entry exists.
    ///
    /// Integer kinds promote through the lattice; decimal shapes follow the
    /// standard promotion rules (max scale for add/subtract, sum of scales
    /// for multiply).
    pub fn result_type(&self, left: &SqlType, right: &SqlType) -> Option<SqlType> {
        use SqlType::*;
        match (left, right) {
            (Integer, Integer) => Some(Integer),
            (Integer, Bigint) | (Bigint, Integer) | (Bigint, Bigint) => Some(Bigint),
            (Double, other) | (other, Double) if other.is_numeric() => Some(Double),
            (a, b) if a.is_exact_numeric() && b.is_exact_numeric() => {
                let (p1, s1) = decimal_shape(a)?;
                let (p2, s2) = decimal_shape(b)?;
                let (precision, scale) = match self {
                    ArithmeticOp::Add | ArithmeticOp::Subtract => {
                        let scale = s1.max(s2);
                        ((p1 - s1).max(p2 - s2) + scale + 1, scale)
                    }
                    ArithmeticOp::Multiply => (p1.saturating_add(p2), s1.checked_add(s2)?),
                    ArithmeticOp::Divide => {
                        let scale = s1.max(s2);
                        (
                            p1.saturating_add(s2)
                                .saturating_add(s2.saturating_sub(s1)),
                            scale,
                        )
                    }
                    ArithmeticOp::Modulus => {
                        let scale = s1.max(s2);
                        ((p1 - s1).min(p2 - s2) + scale, scale)
                    }
                };
                if scale > MAX_DECIMAL_PRECISION {
                    return None;
                }
                Some(SqlType::decimal(
                    precision.clamp(1, MAX_DECIMAL_PRECISION),
                    scale,
                ))
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
            ArithmeticOp::Modulus => "%",
        }
    }
}

fn decimal_shape(ty: &SqlType) -> Option<(u8, u8)> {
    match ty.as_decimal()? {
        SqlType::Decimal { precision, scale } => Some((precision, scale)),
        _ => None,
    }
}

/// Comparison operators; all return BOOLEAN under three-valued logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
        }
    }

    /// True for operators that need an order, not just equality
    pub fn needs_ordering(&self) -> bool {
        !matches!(self, ComparisonOp::Eq | ComparisonOp::Ne)
    }
}

/// Binary logical operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}
