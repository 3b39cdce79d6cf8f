//! Control constructs: three-valued logic, CASE/IF/COALESCE/NULLIF,
//! BETWEEN, IS [NOT] DISTINCT FROM.
//!
//! These are the constructs that create guarded positions. Constant folding
//! must never raise for a branch that is not provably reached, so errors
//! inside WHEN/THEN/ELSE arms, IF arms and non-first COALESCE arguments are
//! captured as deferred-failure markers (`Folder::fold_guarded`). The
//! simple-CASE subject, the first searched-CASE WHEN condition and the first
//! COALESCE argument are unconditional and fail immediately, like any
//! top-level expression.

use crate::expression::error::EvalResult;
use crate::expression::expr::{Expr, ExprKind, WhenClause};
use crate::expression::operator::LogicalOp;
use crate::types::SqlType;
use crate::value::{equal_values, identical_values, order_values, ScalarValue};

use super::core::{Folded, Folder, Mode};

impl Folder<'_> {
    /// AND/OR with three-valued truth tables and absorption against one
    /// resolved operand: `true AND x -> x`, `false OR x -> x`, and the
    /// dominant value (`false` for AND, `true` for OR) wins outright.
    pub(crate) fn fold_logical(
        &self,
        node: &Expr,
        op: LogicalOp,
        left: &Expr,
        right: &Expr,
    ) -> EvalResult<Folded> {
        let dominant = matches!(op, LogicalOp::Or);

        let l = self.fold(left)?;
        if let Some(ScalarValue::Boolean(b)) = l.as_value() {
            if *b == dominant {
                return Ok(Folded::Value(ScalarValue::Boolean(dominant)));
            }
        }
        let r = self.fold(right)?;
        if let Some(ScalarValue::Boolean(b)) = r.as_value() {
            if *b == dominant {
                return Ok(Folded::Value(ScalarValue::Boolean(dominant)));
            }
        }

        match (&l, &r) {
            (Folded::Value(a), Folded::Value(b)) => {
                // neither operand is the dominant value here
                let out = if a.is_null() || b.is_null() {
                    None
                } else {
                    Some(!dominant)
                };
                Ok(Folded::Value(self.truth(out)))
            }
            // identity: the non-dominant constant drops out
            (Folded::Value(v), Folded::Residual(residual)) if !v.is_null() => {
                Ok(Folded::Residual(residual.clone()))
            }
            (Folded::Residual(residual), Folded::Value(v)) if !v.is_null() => {
                Ok(Folded::Residual(residual.clone()))
            }
            _ => Ok(Folded::Residual(Expr::new(
                node.id,
                ExprKind::Logical {
                    op,
                    left: Box::new(self.residual(l, left)),
                    right: Box::new(self.residual(r, right)),
                },
            ))),
        }
    }

    pub(crate) fn fold_not(&self, node: &Expr, operand: &Expr) -> EvalResult<Folded> {
        match self.fold(operand)? {
            Folded::Value(ScalarValue::Boolean(b)) => Ok(Folded::Value(ScalarValue::Boolean(!b))),
            Folded::Value(value) if value.is_null() => {
                Ok(Folded::Value(ScalarValue::Null(SqlType::Boolean)))
            }
            Folded::Value(value) => Err(crate::expression::error::EvalError::TypeMismatch(
                format!("NOT requires BOOLEAN, got {}", value.sql_type()),
            )),
            Folded::Residual(residual) => Ok(Folded::Residual(Expr::new(
                node.id,
                ExprKind::Not(Box::new(residual)),
            ))),
        }
    }

    pub(crate) fn fold_is_null(
        &self,
        node: &Expr,
        operand: &Expr,
        negated: bool,
    ) -> EvalResult<Folded> {
        match self.fold(operand)? {
            Folded::Value(value) => Ok(Folded::Value(ScalarValue::Boolean(
                value.is_null() != negated,
            ))),
            Folded::Residual(residual) => Ok(Folded::Residual(Expr::new(
                node.id,
                ExprKind::IsNull {
                    operand: Box::new(residual),
                    negated,
                },
            ))),
        }
    }

    /// IS [NOT] DISTINCT FROM treats null as a comparable value and never
    /// yields unknown. A symbolic operand against a null literal rewrites to
    /// IS [NOT] NULL.
    pub(crate) fn fold_distinct_from(
        &self,
        node: &Expr,
        left: &Expr,
        right: &Expr,
        negated: bool,
    ) -> EvalResult<Folded> {
        let l = self.fold(left)?;
        let r = self.fold(right)?;
        match (l, r) {
            (Folded::Value(a), Folded::Value(b)) => {
                let identical = identical_values(&a, &b)?;
                let out = if negated { identical } else { !identical };
                Ok(Folded::Value(ScalarValue::Boolean(out)))
            }
            (Folded::Value(v), Folded::Residual(residual))
            | (Folded::Residual(residual), Folded::Value(v))
                if v.is_null() =>
            {
                Ok(Folded::Residual(Expr::new(
                    node.id,
                    ExprKind::IsNull {
                        operand: Box::new(residual),
                        negated: !negated,
                    },
                )))
            }
            (l, r) => Ok(Folded::Residual(Expr::new(
                node.id,
                ExprKind::DistinctFrom {
                    left: Box::new(self.residual(l, left)),
                    right: Box::new(self.residual(r, right)),
                    negated,
                },
            ))),
        }
    }

    /// IF(c, t, f): a resolved condition folds only the selected arm,
    /// unconditionally; the other arm is dropped without being evaluated. A
    /// symbolic condition guards both arms and the node reconstructs as a
    /// searched CASE.
    pub(crate) fn fold_if(
        &self,
        node: &Expr,
        condition: &Expr,
        then_value: &Expr,
        else_value: Option<&Expr>,
    ) -> EvalResult<Folded> {
        let declared = self.types.resolve(node)?;
        match self.fold(condition)? {
            Folded::Value(cond) => {
                let selected = match cond {
                    ScalarValue::Boolean(true) => Some(then_value),
                    // false and null both select the else arm
                    _ => else_value,
                };
                match selected {
                    Some(arm) => {
                        let folded = self.fold(arm)?;
                        self.coerce_folded(folded, &declared)
                    }
                    None => Ok(Folded::Value(ScalarValue::Null(declared))),
                }
            }
            Folded::Residual(cond_residual) => {
                let then_folded = self.fold_guarded(then_value)?;
                let then_expr =
                    self.coerce_residual(self.residual(then_folded, then_value), &declared)?;
                let default = match else_value {
                    Some(arm) => {
                        let folded = self.fold_guarded(arm)?;
                        Some(Box::new(
                            self.coerce_residual(self.residual(folded, arm), &declared)?,
                        ))
                    }
                    None => None,
                };
                Ok(Folded::Residual(Expr::new(
                    node.id,
                    ExprKind::SearchedCase {
                        when_clauses: vec![WhenClause {
                            condition: cond_residual,
                            result: then_expr,
                        }],
                        default,
                    },
                )))
            }
        }
    }

    /// Searched CASE: conditions evaluate in order. A false condition drops
    /// its clause from the residual; a true condition selects its arm — as
    /// the folded result when no symbolic condition precedes it, or as the
    /// residual ELSE otherwise; a symbolic (or deferred) condition keeps its
    /// clause with a guard-folded arm.
    pub(crate) fn fold_searched_case(
        &self,
        node: &Expr,
        when_clauses: &[WhenClause],
        default: Option<&Expr>,
    ) -> EvalResult<Folded> {
        let declared = self.types.resolve(node)?;
        let mut kept: Vec<WhenClause> = Vec::new();

        for (index, clause) in when_clauses.iter().enumerate() {
            // Only the first WHEN condition is unconditionally reached.
            let folded_condition = if index == 0 {
                self.fold(&clause.condition)?
            } else {
                self.fold_guarded(&clause.condition)?
            };

            match folded_condition {
                Folded::Value(cond) => {
                    if cond == ScalarValue::Boolean(true) {
                        if kept.is_empty() {
                            // provably the selected arm: fold unconditionally
                            let folded = self.fold(&clause.result)?;
                            return self.coerce_folded(folded, &declared);
                        }
                        // reachable only when earlier conditions miss: it
                        // becomes the ELSE and later clauses are dropped
                        let folded = self.fold_guarded(&clause.result)?;
                        let else_expr = self
                            .coerce_residual(self.residual(folded, &clause.result), &declared)?;
                        return Ok(Folded::Residual(Expr::new(
                            node.id,
                            ExprKind::SearchedCase {
                                when_clauses: kept,
                                default: Some(Box::new(else_expr)),
                            },
                        )));
                    }
                    // false or null: this clause can never be selected
                }
                Folded::Residual(cond_residual) => {
                    let folded = self.fold_guarded(&clause.result)?;
                    kept.push(WhenClause {
                        condition: cond_residual,
                        result: self
                            .coerce_residual(self.residual(folded, &clause.result), &declared)?,
                    });
                }
            }
        }

        if kept.is_empty() {
            return match default {
                Some(arm) => {
                    let folded = self.fold(arm)?;
                    self.coerce_folded(folded, &declared)
                }
                None => Ok(Folded::Value(ScalarValue::Null(declared))),
            };
        }
        let default = match default {
            Some(arm) => {
                let folded = self.fold_guarded(arm)?;
                Some(Box::new(
                    self.coerce_residual(self.residual(folded, arm), &declared)?,
                ))
            }
            None => None,
        };
        Ok(Folded::Residual(Expr::new(
            node.id,
            ExprKind::SearchedCase {
                when_clauses: kept,
                default,
            },
        )))
    }

    /// Simple CASE: the subject is unconditional; WHEN operands are guarded
    /// and match against the subject under three-valued equality (an unknown
    /// comparison can never select a clause and drops it).
    pub(crate) fn fold_simple_case(
        &self,
        node: &Expr,
        operand: &Expr,
        when_clauses: &[WhenClause],
        default: Option<&Expr>,
    ) -> EvalResult<Folded> {
        let declared = self.types.resolve(node)?;
        let subject = self.fold(operand)?;

        if let Folded::Value(subject_value) = &subject {
            if subject_value.is_null() {
                // null matches nothing; only the default remains
                return match default {
                    Some(arm) => {
                        let folded = self.fold(arm)?;
                        self.coerce_folded(folded, &declared)
                    }
                    None => Ok(Folded::Value(ScalarValue::Null(declared))),
                };
            }

            let mut kept: Vec<WhenClause> = Vec::new();
            for clause in when_clauses {
                match self.fold_guarded(&clause.condition)? {
                    Folded::Value(when_value) => {
                        let matched = match equal_values(subject_value, &when_value) {
                            Ok(outcome) => outcome,
                            Err(error) if self.mode == Mode::Optimize => {
                                // a broken comparison behaves like a failing
                                // condition: defer it at this position
                                let ty = self.types.resolve(&clause.condition)?;
                                let folded = self.fold_guarded(&clause.result)?;
                                kept.push(WhenClause {
                                    condition: Expr::new(
                                        clause.condition.id,
                                        ExprKind::DeferredFailure { error, ty },
                                    ),
                                    result: self.coerce_residual(
                                        self.residual(folded, &clause.result),
                                        &declared,
                                    )?,
                                });
                                continue;
                            }
                            Err(error) => return Err(error),
                        };
                        if matched == Some(true) {
                            if kept.is_empty() {
                                let folded = self.fold(&clause.result)?;
                                return self.coerce_folded(folded, &declared);
                            }
                            let folded = self.fold_guarded(&clause.result)?;
                            let else_expr = self.coerce_residual(
                                self.residual(folded, &clause.result),
                                &declared,
                            )?;
                            return Ok(Folded::Residual(Expr::new(
                                node.id,
                                ExprKind::SimpleCase {
                                    operand: Box::new(self.residual(subject.clone(), operand)),
                                    when_clauses: kept,
                                    default: Some(Box::new(else_expr)),
                                },
                            )));
                        }
                        // false or unknown: drop the clause
                    }
                    Folded::Residual(cond_residual) => {
                        let folded = self.fold_guarded(&clause.result)?;
                        kept.push(WhenClause {
                            condition: cond_residual,
                            result: self
                                .coerce_residual(self.residual(folded, &clause.result), &declared)?,
                        });
                    }
                }
            }

            if kept.is_empty() {
                return match default {
                    Some(arm) => {
                        let folded = self.fold(arm)?;
                        self.coerce_folded(folded, &declared)
                    }
                    None => Ok(Folded::Value(ScalarValue::Null(declared))),
                };
            }
            let default = match default {
                Some(arm) => {
                    let folded = self.fold_guarded(arm)?;
                    Some(Box::new(
                        self.coerce_residual(self.residual(folded, arm), &declared)?,
                    ))
                }
                None => None,
            };
            return Ok(Folded::Residual(Expr::new(
                node.id,
                ExprKind::SimpleCase {
                    operand: Box::new(self.residual(subject, operand)),
                    when_clauses: kept,
                    default,
                },
            )));
        }

        // Symbolic subject: no clause can be decided; fold everything under
        // guards and keep the full shape.
        let mut folded_clauses = Vec::with_capacity(when_clauses.len());
        for clause in when_clauses {
            let cond = self.fold_guarded(&clause.condition)?;
            let result = self.fold_guarded(&clause.result)?;
            folded_clauses.push(WhenClause {
                condition: self.residual(cond, &clause.condition),
                result: self.coerce_residual(self.residual(result, &clause.result), &declared)?,
            });
        }
        let default = match default {
            Some(arm) => {
                let folded = self.fold_guarded(arm)?;
                Some(Box::new(
                    self.coerce_residual(self.residual(folded, arm), &declared)?,
                ))
            }
            None => None,
        };
        Ok(Folded::Residual(Expr::new(
            node.id,
            ExprKind::SimpleCase {
                operand: Box::new(self.residual(subject, operand)),
                when_clauses: folded_clauses,
                default,
            },
        )))
    }

    /// COALESCE: fold left to right (first argument unconditional, the rest
    /// guarded), flatten nested COALESCE, drop null constants, stop at the
    /// first provably non-null constant, and deduplicate deterministic
    /// duplicates keeping the first occurrence.
    pub(crate) fn fold_coalesce(&self, node: &Expr, args: &[Expr]) -> EvalResult<Folded> {
        let declared = self.types.resolve(node)?;
        let mut entries: Vec<Expr> = Vec::new();

        'args: for (index, arg) in args.iter().enumerate() {
            let folded = if index == 0 {
                self.fold(arg)?
            } else {
                self.fold_guarded(arg)?
            };
            match folded {
                Folded::Value(value) if value.is_null() => continue,
                Folded::Value(value) => {
                    let value = self.coerce_value(value, &declared)?;
                    if entries.is_empty() {
                        return Ok(Folded::Value(value));
                    }
                    // a non-null constant always wins from here on
                    entries.push(Expr::new(
                        self.synthetic_id(),
                        ExprKind::Literal(value),
                    ));
                    break 'args;
                }
                Folded::Residual(residual) => {
                    // splice nested coalesce operands inline
                    let parts = match residual.kind {
                        ExprKind::Coalesce(inner) => inner,
                        _ => vec![residual],
                    };
                    for part in parts {
                        let part = self.coerce_residual(part, &declared)?;
                        let duplicate = self.is_deterministic(&part)
                            && entries.iter().any(|existing| existing.same_shape(&part));
                        if !duplicate {
                            entries.push(part);
                        }
                    }
                }
            }
        }

        if entries.len() > 1 {
            return Ok(Folded::Residual(Expr::new(
                node.id,
                ExprKind::Coalesce(entries),
            )));
        }
        match entries.pop() {
            None => Ok(Folded::Value(ScalarValue::Null(declared))),
            Some(single) => match single.kind {
                ExprKind::Literal(value) => Ok(Folded::Value(value)),
                _ => Ok(Folded::Residual(single)),
            },
        }
    }

    /// NULLIF(a, b) folds per IS DISTINCT semantics: null when the operands
    /// compare equal, `a` otherwise — including when `b` is null
    pub(crate) fn fold_nullif(&self, node: &Expr, first: &Expr, second: &Expr) -> EvalResult<Folded> {
        let l = self.fold(first)?;
        let r = self.fold(second)?;
        match (l, r) {
            (Folded::Value(a), Folded::Value(b)) => {
                if a.is_null() {
                    return Ok(Folded::Value(ScalarValue::Null(self.types.resolve(node)?)));
                }
                if b.is_null() {
                    // NULLIF(x, NULL) = x, never null
                    return Ok(Folded::Value(a));
                }
                match equal_values(&a, &b)? {
                    Some(true) => Ok(Folded::Value(ScalarValue::Null(self.types.resolve(node)?))),
                    _ => Ok(Folded::Value(a)),
                }
            }
            (l, r) => Ok(Folded::Residual(Expr::new(
                node.id,
                ExprKind::NullIf {
                    first: Box::new(self.residual(l, first)),
                    second: Box::new(self.residual(r, second)),
                },
            ))),
        }
    }

    /// BETWEEN folds to the three-valued conjunction of the two bound
    /// comparisons
    pub(crate) fn fold_between(
        &self,
        node: &Expr,
        value: &Expr,
        low: &Expr,
        high: &Expr,
        negated: bool,
    ) -> EvalResult<Folded> {
        let v = self.fold(value)?;
        let l = self.fold(low)?;
        let h = self.fold(high)?;
        match (&v, &l, &h) {
            (Folded::Value(subject), Folded::Value(lo), Folded::Value(hi)) => {
                let ge_low = order_values(subject, lo)?.map(|o| o.is_ge());
                let le_high = order_values(subject, hi)?.map(|o| o.is_le());
                let conjunction = and3(ge_low, le_high);
                let outcome = if negated {
                    conjunction.map(|b| !b)
                } else {
                    conjunction
                };
                Ok(Folded::Value(self.truth(outcome)))
            }
            _ => Ok(Folded::Residual(Expr::new(
                node.id,
                ExprKind::Between {
                    value: Box::new(self.residual(v, value)),
                    low: Box::new(self.residual(l, low)),
                    high: Box::new(self.residual(h, high)),
                    negated,
                },
            ))),
        }
    }
}

/// Three-valued conjunction
fn and3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}
