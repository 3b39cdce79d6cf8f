//! SQL-syntax rendering of expression trees.
//!
//! Residual expressions render back to the same textual syntax their
//! literals parse from, which keeps folded output readable in plans and
//! logs.

use std::fmt;

use crate::expression::expr::{Expr, ExprKind, WhenClause};

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ExprKind::*;
        match &self.kind {
            Literal(value) => write!(f, "{}", value),

            Variable(name) => write!(f, "{}", name),

            Arithmetic { op, left, right } => {
                write!(f, "({} {} {})", left, op.as_str(), right)
            }

            Negate(operand) => write!(f, "-({})", operand),

            Comparison { op, left, right } => {
                write!(f, "({} {} {})", left, op.as_str(), right)
            }

            DistinctFrom {
                left,
                right,
                negated,
            } => {
                let keyword = if *negated {
                    "IS NOT DISTINCT FROM"
                } else {
                    "IS DISTINCT FROM"
                };
                write!(f, "({} {} {})", left, keyword, right)
            }

            Logical { op, left, right } => {
                write!(f, "({} {} {})", left, op.as_str(), right)
            }

            Not(operand) => write!(f, "(NOT {})", operand),

            IsNull { operand, negated } => {
                let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
                write!(f, "({} {})", operand, keyword)
            }

            If {
                condition,
                then_value,
                else_value,
            } => {
                write!(f, "IF({}, {}", condition, then_value)?;
                if let Some(e) = else_value {
                    write!(f, ", {}", e)?;
                }
                write!(f, ")")
            }

            SearchedCase {
                when_clauses,
                default,
            } => {
                write!(f, "CASE")?;
                write_case_tail(f, when_clauses, default.as_deref())
            }

            SimpleCase {
                operand,
                when_clauses,
                default,
            } => {
                write!(f, "CASE {}", operand)?;
                write_case_tail(f, when_clauses, default.as_deref())
            }

            Coalesce(args) => write_call(f, "COALESCE", args),

            NullIf { first, second } => write!(f, "NULLIF({}, {})", first, second),

            Between {
                value,
                low,
                high,
                negated,
            } => {
                let keyword = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                write!(f, "({} {} {} AND {})", value, keyword, low, high)
            }

            InList {
                value,
                list,
                negated,
            } => {
                let keyword = if *negated { "NOT IN" } else { "IN" };
                write!(f, "({} {} (", value, keyword)?;
                write_list(f, list)?;
                write!(f, "))")
            }

            FunctionCall { name, args } => write_call(f, name, args),

            Cast {
                operand,
                target,
                safe,
            } => {
                let keyword = if *safe { "TRY_CAST" } else { "CAST" };
                write!(f, "{}({} AS {})", keyword, operand, target)
            }

            ArrayConstructor(elements) => {
                write!(f, "ARRAY[")?;
                write_list(f, elements)?;
                write!(f, "]")
            }

            RowConstructor(fields) => {
                write!(f, "ROW(")?;
                write_list(f, fields)?;
                write!(f, ")")
            }

            MapConstructor { keys, values } => {
                write!(f, "MAP(ARRAY[")?;
                write_list(f, keys)?;
                write!(f, "], ARRAY[")?;
                write_list(f, values)?;
                write!(f, "])")
            }

            Subscript { base, index } => write!(f, "{}[{}]", base, index),

            Like {
                value,
                pattern,
                escape,
            } => {
                write!(f, "({} LIKE {}", value, pattern)?;
                if let Some(e) = escape {
                    write!(f, " ESCAPE {}", e)?;
                }
                write!(f, ")")
            }

            DeferredFailure { error, .. } => write!(f, "fail('{}')", error),
        }
    }
}

fn write_case_tail(
    f: &mut fmt::Formatter<'_>,
    when_clauses: &[WhenClause],
    default: Option<&Expr>,
) -> fmt::Result {
    for wc in when_clauses {
        write!(f, " WHEN {} THEN {}", wc.condition, wc.result)?;
    }
    if let Some(d) = default {
        write!(f, " ELSE {}", d)?;
    }
    write!(f, " END")
}

fn write_call(f: &mut fmt::Formatter<'_>, name: &str, args: &[Expr]) -> fmt::Result {
    write!(f, "{}(", name)?;
    write_list(f, args)?;
    write!(f, ")")
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}
