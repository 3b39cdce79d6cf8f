//! AST dispatch core for the dual-mode interpreter.
//!
//! `Folder` walks the tree post-order under one of two modes. In Evaluate
//! mode every variable must be bound and every error propagates. In Optimize
//! mode unbound variables stay symbolic and the fold produces a smaller
//! residual tree; errors inside guarded positions are captured as
//! deferred-failure markers instead of raising (see the conditional engine).

use log::{debug, trace};

use crate::expression::error::{EvalError, EvalResult};
use crate::expression::expr::{Expr, ExprId, ExprKind};
use crate::expression::operator::{ArithmeticOp, ComparisonOp};
use crate::expression::type_checker::TypeAssignments;
use crate::functions::FunctionCatalog;
use crate::types::SqlType;
use crate::value::{equal_values, order_values, Decimal, ScalarValue};

/// Whether the walk is a full evaluation or a partial one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Evaluate,
    Optimize,
}

/// Outcome of folding one expression
#[derive(Debug, Clone, PartialEq)]
pub enum Folded {
    /// Fully resolved to a concrete value
    Value(ScalarValue),
    /// Simplified but still symbolic; same declared type as the input
    Residual(Expr),
}

impl Folded {
    pub fn into_value(self) -> Option<ScalarValue> {
        match self {
            Folded::Value(v) => Some(v),
            Folded::Residual(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&ScalarValue> {
        match self {
            Folded::Value(v) => Some(v),
            Folded::Residual(_) => None,
        }
    }
}

/// Variable binder: a pure function from name to optional bound value.
///
/// `None` means unbound (symbolic during optimization, fatal during
/// evaluation); a bound null marker participates in folding as SQL NULL.
pub trait Binder {
    fn bind(&self, name: &str) -> Option<ScalarValue>;
}

impl<F> Binder for F
where
    F: Fn(&str) -> Option<ScalarValue>,
{
    fn bind(&self, name: &str) -> Option<ScalarValue> {
        self(name)
    }
}

/// A binder with no bindings at all
pub struct EmptyBinder;

impl Binder for EmptyBinder {
    fn bind(&self, _name: &str) -> Option<ScalarValue> {
        None
    }
}

/// The evaluator/optimizer entry point.
///
/// Holds the read-only context every invocation needs: the per-node type
/// assignment and the function catalog. Each `evaluate`/`optimize` call is
/// an independent, stateless tree walk.
pub struct ExpressionInterpreter<'a> {
    types: &'a TypeAssignments,
    catalog: &'a dyn FunctionCatalog,
}

impl<'a> ExpressionInterpreter<'a> {
    pub fn new(types: &'a TypeAssignments, catalog: &'a dyn FunctionCatalog) -> Self {
        Self { types, catalog }
    }

    /// Fully evaluate the expression. The binder must be total: any unbound
    /// variable raises, and so does any error anywhere in the tree.
    pub fn evaluate(&self, expr: &Expr, binder: &dyn Binder) -> EvalResult<ScalarValue> {
        let folder = Folder {
            types: self.types,
            catalog: self.catalog,
            mode: Mode::Evaluate,
            binder,
        };
        match folder.fold(expr)? {
            Folded::Value(value) => Ok(value),
            Folded::Residual(residual) => Err(EvalError::UnboundVariable(format!(
                "expression did not resolve: {}",
                residual
            ))),
        }
    }

    /// Constant-fold everything the binder resolves, leaving a semantically
    /// equivalent residual of the same declared type where variables remain
    /// unbound.
    pub fn optimize(&self, expr: &Expr, binder: &dyn Binder) -> EvalResult<Folded> {
        debug!("optimizing expression node {:?}", expr.id);
        let folder = Folder {
            types: self.types,
            catalog: self.catalog,
            mode: Mode::Optimize,
            binder,
        };
        folder.fold(expr)
    }
}

/// Helper to fully evaluate an expression
pub fn evaluate_expression(
    expr: &Expr,
    types: &TypeAssignments,
    catalog: &dyn FunctionCatalog,
    binder: &dyn Binder,
) -> EvalResult<ScalarValue> {
    ExpressionInterpreter::new(types, catalog).evaluate(expr, binder)
}

/// Helper to partially evaluate an expression
pub fn optimize_expression(
    expr: &Expr,
    types: &TypeAssignments,
    catalog: &dyn FunctionCatalog,
    binder: &dyn Binder,
) -> EvalResult<Folded> {
    ExpressionInterpreter::new(types, catalog).optimize(expr, binder)
}

pub(crate) struct Folder<'a> {
    pub(crate) types: &'a TypeAssignments,
    pub(crate) catalog: &'a dyn FunctionCatalog,
    pub(crate) mode: Mode,
    pub(crate) binder: &'a dyn Binder,
}

impl Folder<'_> {
    /// Post-order fold of one node
    pub(crate) fn fold(&self, expr: &Expr) -> EvalResult<Folded> {
        use ExprKind::*;
        trace!("fold node {:?}", expr.id);
        match &expr.kind {
            Literal(value) => Ok(Folded::Value(value.clone())),

            Variable(name) => match self.binder.bind(name) {
                Some(value) => Ok(Folded::Value(value)),
                None => match self.mode {
                    Mode::Optimize => Ok(Folded::Residual(expr.clone())),
                    Mode::Evaluate => Err(EvalError::UnboundVariable(name.clone())),
                },
            },

            DeferredFailure { error, .. } => match self.mode {
                // Reaching a marker during evaluation raises the suppressed
                // error; optimization keeps it symbolic.
                Mode::Evaluate => Err(error.clone()),
                Mode::Optimize => Ok(Folded::Residual(expr.clone())),
            },

            Arithmetic { op, left, right } => self.fold_arithmetic(expr, *op, left, right),

            Negate(operand) => self.fold_negate(expr, operand),

            Comparison { op, left, right } => self.fold_comparison(expr, *op, left, right),

            DistinctFrom {
                left,
                right,
                negated,
            } => self.fold_distinct_from(expr, left, right, *negated),

            Logical { op, left, right } => self.fold_logical(expr, *op, left, right),

            Not(operand) => self.fold_not(expr, operand),

            IsNull { operand, negated } => self.fold_is_null(expr, operand, *negated),

            If {
                condition,
                then_value,
                else_value,
            } => self.fold_if(expr, condition, then_value, else_value.as_deref()),

            SearchedCase {
                when_clauses,
                default,
            } => self.fold_searched_case(expr, when_clauses, default.as_deref()),

            SimpleCase {
                operand,
                when_clauses,
                default,
            } => self.fold_simple_case(expr, operand, when_clauses, default.as_deref()),

            Coalesce(args) => self.fold_coalesce(expr, args),

            NullIf { first, second } => self.fold_nullif(expr, first, second),

            Between {
                value,
                low,
                high,
                negated,
            } => self.fold_between(expr, value, low, high, *negated),

            InList {
                value,
                list,
                negated,
            } => self.fold_in_list(expr, value, list, *negated),

            FunctionCall { name, args } => self.fold_function_call(expr, name, args),

            Cast {
                operand,
                target,
                safe,
            } => self.fold_cast(expr, operand, target, *safe),

            ArrayConstructor(elements) => self.fold_array(expr, elements),

            RowConstructor(fields) => self.fold_row(expr, fields),

            MapConstructor { keys, values } => self.fold_map(expr, keys, values),

            Subscript { base, index } => self.fold_subscript(expr, base, index),

            Like {
                value,
                pattern,
                escape,
            } => self.fold_like(expr, value, pattern, escape.as_deref()),
        }
    }

    /// Fold a guarded sub-expression: during optimization an error is
    /// captured as a deferred-failure marker typed to the position instead
    /// of propagating.
    pub(crate) fn fold_guarded(&self, expr: &Expr) -> EvalResult<Folded> {
        match self.fold(expr) {
            Err(error) if self.mode == Mode::Optimize => {
                let ty = self.types.resolve(expr)?;
                debug!("deferring failure at node {:?}: {}", expr.id, error);
                Ok(Folded::Residual(Expr::new(
                    expr.id,
                    ExprKind::DeferredFailure { error, ty },
                )))
            }
            other => other,
        }
    }

    /// Turn a fold outcome back into a tree node, reusing the original
    /// node's identity so the type assignment stays valid
    pub(crate) fn residual(&self, folded: Folded, original: &Expr) -> Expr {
        match folded {
            Folded::Residual(expr) => expr,
            Folded::Value(value) => Expr::new(original.id, ExprKind::Literal(value)),
        }
    }

    /// Three-valued boolean as a value
    pub(crate) fn truth(&self, value: Option<bool>) -> ScalarValue {
        match value {
            Some(b) => ScalarValue::Boolean(b),
            None => ScalarValue::Null(SqlType::Boolean),
        }
    }

    /// Promote a constant to the declared type of its surrounding construct
    pub(crate) fn coerce_value(
        &self,
        value: ScalarValue,
        target: &SqlType,
    ) -> EvalResult<ScalarValue> {
        if value.sql_type() == *target {
            Ok(value)
        } else {
            super::cast::cast_value(&value, target)
        }
    }

    /// Wrap a symbolic operand in an explicit cast when its type differs
    /// from the construct's declared type (decimal rescales and numeric
    /// promotions in residuals)
    pub(crate) fn coerce_residual(&self, expr: Expr, target: &SqlType) -> EvalResult<Expr> {
        if self.types.resolve(&expr)? == *target {
            return Ok(expr);
        }
        let id = expr.id;
        Ok(Expr::new(
            id,
            ExprKind::Cast {
                operand: Box::new(expr),
                target: target.clone(),
                safe: false,
            },
        ))
    }

    /// Coerce a fold outcome to a construct's declared type, casting a
    /// value directly or wrapping a residual in an explicit cast
    pub(crate) fn coerce_folded(&self, folded: Folded, target: &SqlType) -> EvalResult<Folded> {
        match folded {
            Folded::Value(value) => Ok(Folded::Value(self.coerce_value(value, target)?)),
            Folded::Residual(residual) => {
                Ok(Folded::Residual(self.coerce_residual(residual, target)?))
            }
        }
    }

    /// True when re-running the expression is guaranteed to produce the
    /// same result; consults the catalog for function calls
    pub(crate) fn is_deterministic(&self, expr: &Expr) -> bool {
        if let ExprKind::FunctionCall { name, args } = &expr.kind {
            let arg_types: EvalResult<Vec<SqlType>> =
                args.iter().map(|a| self.types.resolve(a)).collect();
            let deterministic = arg_types
                .ok()
                .and_then(|tys| self.catalog.resolve(name, &tys))
                .map(|f| f.is_deterministic())
                .unwrap_or(false);
            if !deterministic {
                return false;
            }
        }
        expr.children().into_iter().all(|c| self.is_deterministic(c))
    }

    fn fold_arithmetic(
        &self,
        node: &Expr,
        op: ArithmeticOp,
        left: &Expr,
        right: &Expr,
    ) -> EvalResult<Folded> {
        let l = self.fold(left)?;
        let r = self.fold(right)?;
        match (l, r) {
            (Folded::Value(a), Folded::Value(b)) => {
                self.apply_arithmetic(node, op, a, b).map(Folded::Value)
            }
            (l, r) => Ok(Folded::Residual(Expr::new(
                node.id,
                ExprKind::Arithmetic {
                    op,
                    left: Box::new(self.residual(l, left)),
                    right: Box::new(self.residual(r, right)),
                },
            ))),
        }
    }

    fn apply_arithmetic(
        &self,
        node: &Expr,
        op: ArithmeticOp,
        a: ScalarValue,
        b: ScalarValue,
    ) -> EvalResult<ScalarValue> {
        if a.is_null() || b.is_null() {
            return Ok(ScalarValue::Null(self.types.resolve(node)?));
        }
        let double_involved =
            matches!(a, ScalarValue::Double(_)) || matches!(b, ScalarValue::Double(_));
        let decimal_involved =
            matches!(a, ScalarValue::Decimal(_)) || matches!(b, ScalarValue::Decimal(_));
        let bigint_involved =
            matches!(a, ScalarValue::Bigint(_)) || matches!(b, ScalarValue::Bigint(_));

        if double_involved {
            let x = to_double(&a, op.as_str())?;
            let y = to_double(&b, op.as_str())?;
            // IEEE semantics: division by zero yields infinity/NaN
            let out = match op {
                ArithmeticOp::Add => x + y,
                ArithmeticOp::Subtract => x - y,
                ArithmeticOp::Multiply => x * y,
                ArithmeticOp::Divide => x / y,
                ArithmeticOp::Modulus => x % y,
            };
            Ok(ScalarValue::Double(out))
        } else if decimal_involved {
            let x = to_decimal(&a, op.as_str())?;
            let y = to_decimal(&b, op.as_str())?;
            let out = match op {
                ArithmeticOp::Add => Decimal::add(&x, &y)?,
                ArithmeticOp::Subtract => Decimal::subtract(&x, &y)?,
                ArithmeticOp::Multiply => Decimal::multiply(&x, &y)?,
                ArithmeticOp::Divide => Decimal::divide(&x, &y)?,
                ArithmeticOp::Modulus => Decimal::modulo(&x, &y)?,
            };
            Ok(ScalarValue::Decimal(out))
        } else if bigint_involved {
            let x = to_i64(&a, op.as_str())?;
            let y = to_i64(&b, op.as_str())?;
            let out = checked_integer_op(
                op,
                x,
                y,
                i64::checked_add,
                i64::checked_sub,
                i64::checked_mul,
                i64::checked_div,
                i64::checked_rem,
                "BIGINT",
            )?;
            Ok(ScalarValue::Bigint(out))
        } else if let (ScalarValue::Integer(x), ScalarValue::Integer(y)) = (&a, &b) {
            let out = checked_integer_op(
                op,
                *x,
                *y,
                i32::checked_add,
                i32::checked_sub,
                i32::checked_mul,
                i32::checked_div,
                i32::checked_rem,
                "INTEGER",
            )?;
            Ok(ScalarValue::Integer(out))
        } else {
            Err(EvalError::incompatible_operands(
                op.as_str(),
                &a.sql_type(),
                &b.sql_type(),
            ))
        }
    }

    fn fold_negate(&self, node: &Expr, operand: &Expr) -> EvalResult<Folded> {
        match self.fold(operand)? {
            Folded::Value(value) => {
                use ScalarValue::*;
                let out = match value {
                    Null(ty) => Null(ty),
                    Integer(n) => Integer(n.checked_neg().ok_or_else(|| {
                        EvalError::NumericValueOutOfRange("INTEGER negation overflow".to_string())
                    })?),
                    Bigint(n) => Bigint(n.checked_neg().ok_or_else(|| {
                        EvalError::NumericValueOutOfRange("BIGINT negation overflow".to_string())
                    })?),
                    Double(d) => Double(-d),
                    Decimal(d) => ScalarValue::Decimal(d.negate()),
                    other => {
                        return Err(EvalError::TypeMismatch(format!(
                            "cannot negate {}",
                            other.sql_type()
                        )))
                    }
                };
                Ok(Folded::Value(out))
            }
            Folded::Residual(residual) => Ok(Folded::Residual(Expr::new(
                node.id,
                ExprKind::Negate(Box::new(residual)),
            ))),
        }
    }

    fn fold_comparison(
        &self,
        node: &Expr,
        op: ComparisonOp,
        left: &Expr,
        right: &Expr,
    ) -> EvalResult<Folded> {
        let l = self.fold(left)?;
        let r = self.fold(right)?;
        match (l, r) {
            (Folded::Value(a), Folded::Value(b)) => {
                let outcome = match op {
                    ComparisonOp::Eq => equal_values(&a, &b)?,
                    ComparisonOp::Ne => equal_values(&a, &b)?.map(|t| !t),
                    _ => order_values(&a, &b)?.map(|ordering| match op {
                        ComparisonOp::Lt => ordering.is_lt(),
                        ComparisonOp::Le => ordering.is_le(),
                        ComparisonOp::Gt => ordering.is_gt(),
                        ComparisonOp::Ge => ordering.is_ge(),
                        ComparisonOp::Eq | ComparisonOp::Ne => unreachable!(),
                    }),
                };
                Ok(Folded::Value(self.truth(outcome)))
            }
            (l, r) => Ok(Folded::Residual(Expr::new(
                node.id,
                ExprKind::Comparison {
                    op,
                    left: Box::new(self.residual(l, left)),
                    right: Box::new(self.residual(r, right)),
                },
            ))),
        }
    }

    fn fold_function_call(&self, node: &Expr, name: &str, args: &[Expr]) -> EvalResult<Folded> {
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            arg_types.push(self.types.resolve(arg)?);
        }
        let resolved = self.catalog.resolve(name, &arg_types).ok_or_else(|| {
            EvalError::InvalidFunctionArgument(format!("unknown function {}", name))
        })?;

        let mut folded = Vec::with_capacity(args.len());
        for arg in args {
            folded.push(self.fold(arg)?);
        }

        let all_constant = folded.iter().all(|f| f.as_value().is_some());
        let may_invoke = resolved.is_deterministic() || self.mode == Mode::Evaluate;
        if all_constant && may_invoke {
            let values: Vec<ScalarValue> = folded
                .into_iter()
                .filter_map(Folded::into_value)
                .collect();
            return resolved.invoke(&values).map(Folded::Value);
        }

        let new_args = folded
            .into_iter()
            .zip(args.iter())
            .map(|(f, original)| self.residual(f, original))
            .collect();
        Ok(Folded::Residual(Expr::new(
            node.id,
            ExprKind::FunctionCall {
                name: name.to_string(),
                args: new_args,
            },
        )))
    }

    /// A fresh synthetic identity for optimizer-minted nodes that are
    /// self-typed (literals inserted into residual lists)
    pub(crate) fn synthetic_id(&self) -> ExprId {
        ExprId(0)
    }
}

fn to_double(value: &ScalarValue, operator: &str) -> EvalResult<f64> {
    match value {
        ScalarValue::Integer(n) => Ok(*n as f64),
        ScalarValue::Bigint(n) => Ok(*n as f64),
        ScalarValue::Double(d) => Ok(*d),
        ScalarValue::Decimal(d) => Ok(d.to_f64()),
        other => Err(EvalError::TypeMismatch(format!(
            "cannot apply {} to {}",
            operator,
            other.sql_type()
        ))),
    }
}

fn to_decimal(value: &ScalarValue, operator: &str) -> EvalResult<Decimal> {
    match value {
        ScalarValue::Integer(n) => Ok(Decimal {
            unscaled: *n as i128,
            precision: 10,
            scale: 0,
        }),
        ScalarValue::Bigint(n) => Ok(Decimal {
            unscaled: *n as i128,
            precision: 19,
            scale: 0,
        }),
        ScalarValue::Decimal(d) => Ok(*d),
        other => Err(EvalError::TypeMismatch(format!(
            "cannot apply {} to {}",
            operator,
            other.sql_type()
        ))),
    }
}

fn to_i64(value: &ScalarValue, operator: &str) -> EvalResult<i64> {
    match value {
        ScalarValue::Integer(n) => Ok(*n as i64),
        ScalarValue::Bigint(n) => Ok(*n),
        other => Err(EvalError::TypeMismatch(format!(
            "cannot apply {} to {}",
            operator,
            other.sql_type()
        ))),
    }
}

#[allow(clippy::too_many_arguments)]
fn checked_integer_op<T: Copy>(
    op: ArithmeticOp,
    x: T,
    y: T,
    add: impl Fn(T, T) -> Option<T>,
    sub: impl Fn(T, T) -> Option<T>,
    mul: impl Fn(T, T) -> Option<T>,
    div: impl Fn(T, T) -> Option<T>,
    rem: impl Fn(T, T) -> Option<T>,
    type_name: &str,
) -> EvalResult<T>
where
    T: PartialEq + Default,
{
    if matches!(op, ArithmeticOp::Divide | ArithmeticOp::Modulus) && y == T::default() {
        return Err(EvalError::division_by_zero());
    }
    let out = match op {
        ArithmeticOp::Add => add(x, y),
        ArithmeticOp::Subtract => sub(x, y),
        ArithmeticOp::Multiply => mul(x, y),
        ArithmeticOp::Divide => div(x, y),
        ArithmeticOp::Modulus => rem(x, y),
    };
    out.ok_or_else(|| {
        EvalError::NumericValueOutOfRange(format!("{} {} overflow", type_name, op.as_str()))
    })
}
