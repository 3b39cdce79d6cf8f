//! Type assignment for expression trees.
//!
//! The evaluator consumes a [`TypeAssignments`] lookup computed before
//! evaluation begins. In a full compiler that pass lives alongside the
//! analyzer; the bottom-up [`TypeChecker`] here covers tests, demos and any
//! embedder without its own analyzer.

use std::collections::HashMap;

use crate::expression::error::{EvalError, EvalResult};
use crate::expression::expr::{Expr, ExprId, ExprKind};
use crate::functions::FunctionCatalog;
use crate::types::SqlType;

/// Read-only map from node identity to declared SQL type.
///
/// Literal, Cast and DeferredFailure nodes are self-typed, and every
/// boolean-producing node kind has a statically known type, so only the
/// remaining kinds consult the map. Residual nodes reuse the identity of the
/// node they replaced, which keeps one map valid across repeated `optimize`
/// calls.
#[derive(Debug, Clone, Default)]
pub struct TypeAssignments {
    types: HashMap<ExprId, SqlType>,
}

impl TypeAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ExprId, ty: SqlType) {
        self.types.insert(id, ty);
    }

    pub fn get(&self, id: ExprId) -> Option<&SqlType> {
        self.types.get(&id)
    }

    /// Declared type of a node
    pub fn resolve(&self, expr: &Expr) -> EvalResult<SqlType> {
        use ExprKind::*;
        match &expr.kind {
            Literal(value) => Ok(value.sql_type()),
            Cast { target, .. } => Ok(target.clone()),
            DeferredFailure { ty, .. } => Ok(ty.clone()),
            Comparison { .. }
            | DistinctFrom { .. }
            | Logical { .. }
            | Not(_)
            | IsNull { .. }
            | Between { .. }
            | InList { .. }
            | Like { .. } => Ok(SqlType::Boolean),
            _ => self.types.get(&expr.id).cloned().ok_or_else(|| {
                EvalError::TypeMismatch(format!("no type assigned to node {:?}", expr.id))
            }),
        }
    }
}

/// Bottom-up type annotator for expressions
pub struct TypeChecker<'a> {
    /// Declared types of the variables the expression may reference
    variables: &'a HashMap<String, SqlType>,
    catalog: &'a dyn FunctionCatalog,
}

impl<'a> TypeChecker<'a> {
    pub fn new(variables: &'a HashMap<String, SqlType>, catalog: &'a dyn FunctionCatalog) -> Self {
        Self { variables, catalog }
    }

    /// Compute and record a type for every node in the tree
    pub fn annotate(&self, expr: &Expr) -> EvalResult<TypeAssignments> {
        let mut out = TypeAssignments::new();
        self.check(expr, &mut out)?;
        Ok(out)
    }

    fn check(&self, expr: &Expr, out: &mut TypeAssignments) -> EvalResult<SqlType> {
        use ExprKind::*;
        let ty = match &expr.kind {
            Literal(value) => value.sql_type(),

            Variable(name) => self
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::TypeMismatch(format!("no type for variable {}", name)))?,

            Arithmetic { op, left, right } => {
                let lt = self.check(left, out)?;
                let rt = self.check(right, out)?;
                op.result_type(&lt, &rt)
                    .ok_or_else(|| EvalError::incompatible_operands(op.as_str(), &lt, &rt))?
            }

            Negate(operand) => {
                let ty = self.check(operand, out)?;
                if !ty.is_numeric() {
                    return Err(EvalError::TypeMismatch(format!("cannot negate {}", ty)));
                }
                ty
            }

            Comparison { op, left, right } => {
                let lt = self.check(left, out)?;
                let rt = self.check(right, out)?;
                let common = self.common(&lt, &rt, op.as_str())?;
                if op.needs_ordering() && !common.is_orderable() {
                    return Err(EvalError::TypeMismatch(format!(
                        "{} is not orderable",
                        common
                    )));
                }
                SqlType::Boolean
            }

            DistinctFrom { left, right, .. } => {
                let lt = self.check(left, out)?;
                let rt = self.check(right, out)?;
                self.common(&lt, &rt, "IS DISTINCT FROM")?;
                SqlType::Boolean
            }

            Logical { op, left, right } => {
                self.expect_boolean(left, op.as_str(), out)?;
                self.expect_boolean(right, op.as_str(), out)?;
                SqlType::Boolean
            }

            Not(operand) => {
                self.expect_boolean(operand, "NOT", out)?;
                SqlType::Boolean
            }

            IsNull { operand, .. } => {
                self.check(operand, out)?;
                SqlType::Boolean
            }

            If {
                condition,
                then_value,
                else_value,
            } => {
                self.expect_boolean(condition, "IF", out)?;
                let then_ty = self.check(then_value, out)?;
                match else_value {
                    Some(e) => {
                        let else_ty = self.check(e, out)?;
                        self.common(&then_ty, &else_ty, "IF")?
                    }
                    None => then_ty,
                }
            }

            SearchedCase {
                when_clauses,
                default,
            } => {
                let mut result_ty: Option<SqlType> = None;
                for wc in when_clauses {
                    self.expect_boolean(&wc.condition, "CASE", out)?;
                    let arm = self.check(&wc.result, out)?;
                    result_ty = Some(self.merge(result_ty, arm)?);
                }
                if let Some(d) = default {
                    let arm = self.check(d, out)?;
                    result_ty = Some(self.merge(result_ty, arm)?);
                }
                result_ty
                    .ok_or_else(|| EvalError::TypeMismatch("CASE with no arms".to_string()))?
            }

            SimpleCase {
                operand,
                when_clauses,
                default,
            } => {
                let subject_ty = self.check(operand, out)?;
                let mut result_ty: Option<SqlType> = None;
                for wc in when_clauses {
                    let when_ty = self.check(&wc.condition, out)?;
                    self.common(&subject_ty, &when_ty, "CASE")?;
                    let arm = self.check(&wc.result, out)?;
                    result_ty = Some(self.merge(result_ty, arm)?);
                }
                if let Some(d) = default {
                    let arm = self.check(d, out)?;
                    result_ty = Some(self.merge(result_ty, arm)?);
                }
                result_ty
                    .ok_or_else(|| EvalError::TypeMismatch("CASE with no arms".to_string()))?
            }

            Coalesce(args) => {
                let mut result_ty: Option<SqlType> = None;
                for arg in args {
                    let arg_ty = self.check(arg, out)?;
                    result_ty = Some(self.merge(result_ty, arg_ty)?);
                }
                result_ty
                    .ok_or_else(|| EvalError::TypeMismatch("COALESCE with no arguments".to_string()))?
            }

            NullIf { first, second } => {
                let first_ty = self.check(first, out)?;
                let second_ty = self.check(second, out)?;
                self.common(&first_ty, &second_ty, "NULLIF")?;
                first_ty
            }

            Between {
                value, low, high, ..
            } => {
                let value_ty = self.check(value, out)?;
                let low_ty = self.check(low, out)?;
                let high_ty = self.check(high, out)?;
                let c1 = self.common(&value_ty, &low_ty, "BETWEEN")?;
                let c2 = self.common(&value_ty, &high_ty, "BETWEEN")?;
                if !c1.is_orderable() || !c2.is_orderable() {
                    return Err(EvalError::TypeMismatch(
                        "BETWEEN operands are not orderable".to_string(),
                    ));
                }
                SqlType::Boolean
            }

            InList { value, list, .. } => {
                let value_ty = self.check(value, out)?;
                for item in list {
                    let item_ty = self.check(item, out)?;
                    self.common(&value_ty, &item_ty, "IN")?;
                }
                SqlType::Boolean
            }

            FunctionCall { name, args } => {
                let mut arg_types = Vec::with_capacity(args.len());
                for arg in args {
                    arg_types.push(self.check(arg, out)?);
                }
                let resolved = self.catalog.resolve(name, &arg_types).ok_or_else(|| {
                    EvalError::InvalidFunctionArgument(format!(
                        "unknown function {}({})",
                        name,
                        arg_types
                            .iter()
                            .map(|t| t.to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                })?;
                resolved.return_type().clone()
            }

            Cast {
                operand, target, ..
            } => {
                self.check(operand, out)?;
                target.clone()
            }

            ArrayConstructor(elements) => {
                let mut element_ty: Option<SqlType> = None;
                for e in elements {
                    let ty = self.check(e, out)?;
                    element_ty = Some(self.merge(element_ty, ty)?);
                }
                // Empty constructors default to VARCHAR elements.
                SqlType::array(element_ty.unwrap_or(SqlType::Varchar))
            }

            RowConstructor(fields) => {
                let mut field_types = Vec::with_capacity(fields.len());
                for e in fields {
                    field_types.push(self.check(e, out)?);
                }
                SqlType::Row(field_types)
            }

            MapConstructor { keys, values } => {
                if keys.len() != values.len() {
                    return Err(EvalError::TypeMismatch(
                        "MAP key and value lists differ in length".to_string(),
                    ));
                }
                let mut key_ty: Option<SqlType> = None;
                let mut value_ty: Option<SqlType> = None;
                for k in keys {
                    let ty = self.check(k, out)?;
                    key_ty = Some(self.merge(key_ty, ty)?);
                }
                for v in values {
                    let ty = self.check(v, out)?;
                    value_ty = Some(self.merge(value_ty, ty)?);
                }
                SqlType::map(
                    key_ty.unwrap_or(SqlType::Varchar),
                    value_ty.unwrap_or(SqlType::Varchar),
                )
            }

            Subscript { base, index } => {
                let base_ty = self.check(base, out)?;
                let index_ty = self.check(index, out)?;
                match base_ty {
                    SqlType::Array(element) => {
                        if !index_ty.is_exact_numeric() {
                            return Err(EvalError::TypeMismatch(format!(
                                "array subscript must be an integer, got {}",
                                index_ty
                            )));
                        }
                        *element
                    }
                    SqlType::Map(key, value) => {
                        self.common(&key, &index_ty, "map subscript")?;
                        *value
                    }
                    SqlType::Row(fields) => {
                        // Row access needs a constant field position.
                        let position = index
                            .literal_value()
                            .and_then(|v| match v {
                                crate::value::ScalarValue::Integer(n) => Some(*n as i64),
                                crate::value::ScalarValue::Bigint(n) => Some(*n),
                                _ => None,
                            })
                            .ok_or_else(|| {
                                EvalError::TypeMismatch(
                                    "row subscript must be an integer literal".to_string(),
                                )
                            })?;
                        if position < 1 || position as usize > fields.len() {
                            return Err(EvalError::InvalidArrayIndex(format!(
                                "row field {} out of range 1..={}",
                                position,
                                fields.len()
                            )));
                        }
                        fields[position as usize - 1].clone()
                    }
                    other => {
                        return Err(EvalError::TypeMismatch(format!(
                            "cannot subscript {}",
                            other
                        )))
                    }
                }
            }

            Like {
                value,
                pattern,
                escape,
            } => {
                self.expect_varchar(value, out)?;
                self.expect_varchar(pattern, out)?;
                if let Some(e) = escape {
                    self.expect_varchar(e, out)?;
                }
                SqlType::Boolean
            }

            DeferredFailure { ty, .. } => ty.clone(),
        };
        out.insert(expr.id, ty.clone());
        Ok(ty)
    }

    fn expect_boolean(
        &self,
        expr: &Expr,
        context: &str,
        out: &mut TypeAssignments,
    ) -> EvalResult<()> {
        let ty = self.check(expr, out)?;
        if ty != SqlType::Boolean {
            return Err(EvalError::TypeMismatch(format!(
                "{} requires BOOLEAN, got {}",
                context, ty
            )));
        }
        Ok(())
    }

    fn expect_varchar(&self, expr: &Expr, out: &mut TypeAssignments) -> EvalResult<()> {
        let ty = self.check(expr, out)?;
        if ty != SqlType::Varchar {
            return Err(EvalError::TypeMismatch(format!(
                "LIKE requires VARCHAR operands, got {}",
                ty
            )));
        }
        Ok(())
    }

    fn common(&self, a: &SqlType, b: &SqlType, context: &str) -> EvalResult<SqlType> {
        SqlType::common_super_type(a, b)
            .ok_or_else(|| EvalError::incompatible_operands(context, a, b))
    }

    fn merge(&self, acc: Option<SqlType>, next: SqlType) -> EvalResult<SqlType> {
        match acc {
            None => Ok(next),
            Some(prev) => self.common(&prev, &next, "branch types"),
        }
    }
}
