//! Dual-mode expression interpreter.
//!
//! This module provides:
//! - `evaluate`: full evaluation under a total binder
//! - `optimize`: constant folding to a value or a smaller residual tree
//! - The deferred-failure protocol for guarded sub-expressions
//! - CAST/TRY_CAST dispatch, collection folding and the LIKE matcher

pub mod cast;
pub mod collection;
pub mod conditional;
pub mod core;
pub mod like;

pub use cast::cast_value;
pub use core::{
    evaluate_expression, optimize_expression, Binder, EmptyBinder, ExpressionInterpreter, Folded,
    Mode,
};
pub use like::LikeMatcher;
