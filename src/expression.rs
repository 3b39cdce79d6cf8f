//! Expression tree representation.
//!
//! This module provides:
//! - The expression AST with per-node identities
//! - Operator definitions
//! - Evaluation error types
//! - Type assignment (the `TypeAssignments` lookup and a bottom-up checker)
//! - SQL-syntax rendering of trees

pub mod display;
pub mod error;
pub mod expr;
pub mod operator;
pub mod type_checker;

pub use error::{EvalError, EvalResult};
pub use expr::{Expr, ExprBuilder, ExprId, ExprKind, WhenClause};
pub use operator::{ArithmeticOp, ComparisonOp, LogicalOp};
pub use type_checker::{TypeAssignments, TypeChecker};
