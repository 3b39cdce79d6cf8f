//! Expression AST definitions.
//!
//! Expression trees are immutable: the parser/type-assignment pipeline
//! builds them once and the interpreter consumes them read-only, producing
//! either a value or a new tree. Every node carries an identity used to look
//! up its externally assigned type; residual nodes produced by folding reuse
//! the identity of the node they replace, which keeps the type assignment
//! valid without mutation.

use crate::expression::error::EvalError;
use crate::expression::operator::{ArithmeticOp, ComparisonOp, LogicalOp};
use crate::types::SqlType;
use crate::value::ScalarValue;

/// Identity of an expression node, assigned at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u64);

/// One WHEN clause of a CASE expression
#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    pub condition: Expr,
    pub result: Expr,
}

/// Expression tree node
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
}

/// The closed set of expression node kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal constant value (possibly the typed null marker)
    Literal(ScalarValue),

    /// Named variable resolved through the binder
    Variable(String),

    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Arithmetic negation
    Negate(Box<Expr>),

    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// IS [NOT] DISTINCT FROM
    DistinctFrom {
        left: Box<Expr>,
        right: Box<Expr>,
        negated: bool,
    },

    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Not(Box<Expr>),

    /// IS [NOT] NULL
    IsNull {
        operand: Box<Expr>,
        negated: bool,
    },

    /// IF(condition, then[, else])
    If {
        condition: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Option<Box<Expr>>,
    },

    /// CASE WHEN ... THEN ... [ELSE ...] END
    SearchedCase {
        when_clauses: Vec<WhenClause>,
        default: Option<Box<Expr>>,
    },

    /// CASE subject WHEN ... THEN ... [ELSE ...] END
    SimpleCase {
        operand: Box<Expr>,
        when_clauses: Vec<WhenClause>,
        default: Option<Box<Expr>>,
    },

    Coalesce(Vec<Expr>),

    NullIf {
        first: Box<Expr>,
        second: Box<Expr>,
    },

    Between {
        value: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    InList {
        value: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },

    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },

    Cast {
        operand: Box<Expr>,
        target: SqlType,
        /// TRY_CAST: conversion failures become NULL instead of raising
        safe: bool,
    },

    ArrayConstructor(Vec<Expr>),

    RowConstructor(Vec<Expr>),

    /// Map built from parallel key/value lists
    MapConstructor {
        keys: Vec<Expr>,
        values: Vec<Expr>,
    },

    Subscript {
        base: Box<Expr>,
        index: Box<Expr>,
    },

    Like {
        value: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<Box<Expr>>,
    },

    /// Stand-in for a guarded sub-expression whose constant folding raised.
    /// Evaluating it raises the wrapped error; it participates in no other
    /// semantics.
    DeferredFailure {
        error: EvalError,
        ty: SqlType,
    },
}

impl Expr {
    pub fn new(id: ExprId, kind: ExprKind) -> Self {
        Expr { id, kind }
    }

    /// The literal value, when this node is a literal
    pub fn literal_value(&self) -> Option<&ScalarValue> {
        match &self.kind {
            ExprKind::Literal(v) => Some(v),
            _ => None,
        }
    }

    /// Direct children, in syntactic order
    pub fn children(&self) -> Vec<&Expr> {
        use ExprKind::*;
        match &self.kind {
            Literal(_) | Variable(_) | DeferredFailure { .. } => vec![],
            Arithmetic { left, right, .. }
            | Comparison { left, right, .. }
            | DistinctFrom { left, right, .. }
            | Logical { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Negate(operand) | Not(operand) | IsNull { operand, .. } => vec![operand.as_ref()],
            If {
                condition,
                then_value,
                else_value,
            } => {
                let mut out = vec![condition.as_ref(), then_value.as_ref()];
                if let Some(e) = else_value {
                    out.push(e.as_ref());
                }
                out
            }
            SearchedCase {
                when_clauses,
                default,
            } => {
                let mut out = Vec::with_capacity(when_clauses.len() * 2 + 1);
                for wc in when_clauses {
                    out.push(&wc.condition);
                    out.push(&wc.result);
                }
                if let Some(d) = default {
                    out.push(d.as_ref());
                }
                out
            }
            SimpleCase {
                operand,
                when_clauses,
                default,
            } => {
                let mut out = vec![operand.as_ref()];
                for wc in when_clauses {
                    out.push(&wc.condition);
                    out.push(&wc.result);
                }
                if let Some(d) = default {
                    out.push(d.as_ref());
                }
                out
            }
            Coalesce(args) | FunctionCall { args, .. } => args.iter().collect(),
            NullIf { first, second } => vec![first.as_ref(), second.as_ref()],
            Between {
                value, low, high, ..
            } => vec![value.as_ref(), low.as_ref(), high.as_ref()],
            InList { value, list, .. } => {
                let mut out = vec![value.as_ref()];
                out.extend(list.iter());
                out
            }
            Cast { operand, .. } => vec![operand.as_ref()],
            ArrayConstructor(items) | RowConstructor(items) => items.iter().collect(),
            MapConstructor { keys, values } => keys.iter().chain(values.iter()).collect(),
            Subscript { base, index } => vec![base.as_ref(), index.as_ref()],
            Like {
                value,
                pattern,
                escape,
            } => {
                let mut out = vec![value.as_ref(), pattern.as_ref()];
                if let Some(e) = escape {
                    out.push(e.as_ref());
                }
                out
            }
        }
    }

    /// Structural equality ignoring node identities, used for COALESCE and
    /// IN-list deduplication
    pub fn same_shape(&self, other: &Expr) -> bool {
        self.canonical() == other.canonical()
    }

    /// A copy with every node identity erased
    fn canonical(&self) -> Expr {
        let mut copy = self.clone();
        copy.erase_ids();
        copy
    }

    fn erase_ids(&mut self) {
        self.id = ExprId(0);
        use ExprKind::*;
        match &mut self.kind {
            Literal(_) | Variable(_) | DeferredFailure { .. } => {}
            Arithmetic { left, right, .. }
            | Comparison { left, right, .. }
            | DistinctFrom { left, right, .. }
            | Logical { left, right, .. } => {
                left.erase_ids();
                right.erase_ids();
            }
            Negate(operand) | Not(operand) | IsNull { operand, .. } | Cast { operand, .. } => {
                operand.erase_ids()
            }
            If {
                condition,
                then_value,
                else_value,
            } => {
                condition.erase_ids();
                then_value.erase_ids();
                if let Some(e) = else_value {
                    e.erase_ids();
                }
            }
            SearchedCase {
                when_clauses,
                default,
            } => {
                for wc in when_clauses {
                    wc.condition.erase_ids();
                    wc.result.erase_ids();
                }
                if let Some(d) = default {
                    d.erase_ids();
                }
            }
            SimpleCase {
                operand,
                when_clauses,
                default,
            } => {
                operand.erase_ids();
                for wc in when_clauses {
                    wc.condition.erase_ids();
                    wc.result.erase_ids();
                }
                if let Some(d) = default {
                    d.erase_ids();
                }
            }
            Coalesce(args)
            | FunctionCall { args, .. }
            | ArrayConstructor(args)
            | RowConstructor(args) => {
                for a in args {
                    a.erase_ids();
                }
            }
            NullIf { first, second } => {
                first.erase_ids();
                second.erase_ids();
            }
            Between {
                value, low, high, ..
            } => {
                value.erase_ids();
                low.erase_ids();
                high.erase_ids();
            }
            InList { value, list, .. } => {
                value.erase_ids();
                for e in list {
                    e.erase_ids();
                }
            }
            MapConstructor { keys, values } => {
                for e in keys.iter_mut().chain(values.iter_mut()) {
                    e.erase_ids();
                }
            }
            Subscript { base, index } => {
                base.erase_ids();
                index.erase_ids();
            }
            Like {
                value,
                pattern,
                escape,
            } => {
                value.erase_ids();
                pattern.erase_ids();
                if let Some(e) = escape {
                    e.erase_ids();
                }
            }
        }
    }
}

/// Builder that assigns fresh node identities.
///
/// In production the parser/type-assignment pipeline owns identity
/// assignment; the builder exists so tests and demos can construct trees
/// with valid unique ids.
#[derive(Debug, Default)]
pub struct ExprBuilder {
    next: u64,
}

impl ExprBuilder {
    pub fn new() -> Self {
        ExprBuilder { next: 1 }
    }

    fn node(&mut self, kind: ExprKind) -> Expr {
        let id = ExprId(self.next);
        self.next += 1;
        Expr { id, kind }
    }

    pub fn literal(&mut self, value: ScalarValue) -> Expr {
        self.node(ExprKind::Literal(value))
    }

    pub fn null(&mut self, ty: SqlType) -> Expr {
        self.literal(ScalarValue::Null(ty))
    }

    pub fn integer(&mut self, n: i32) -> Expr {
        self.literal(ScalarValue::Integer(n))
    }

    pub fn bigint(&mut self, n: i64) -> Expr {
        self.literal(ScalarValue::Bigint(n))
    }

    pub fn boolean(&mut self, b: bool) -> Expr {
        self.literal(ScalarValue::Boolean(b))
    }

    pub fn string(&mut self, s: impl AsRef<str>) -> Expr {
        self.literal(ScalarValue::varchar(s))
    }

    pub fn variable(&mut self, name: impl Into<String>) -> Expr {
        self.node(ExprKind::Variable(name.into()))
    }

    pub fn arithmetic(&mut self, op: ArithmeticOp, left: Expr, right: Expr) -> Expr {
        self.node(ExprKind::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn add(&mut self, left: Expr, right: Expr) -> Expr {
        self.arithmetic(ArithmeticOp::Add, left, right)
    }

    pub fn subtract(&mut self, left: Expr, right: Expr) -> Expr {
        self.arithmetic(ArithmeticOp::Subtract, left, right)
    }

    pub fn multiply(&mut self, left: Expr, right: Expr) -> Expr {
        self.arithmetic(ArithmeticOp::Multiply, left, right)
    }

    pub fn divide(&mut self, left: Expr, right: Expr) -> Expr {
        self.arithmetic(ArithmeticOp::Divide, left, right)
    }

    pub fn negate(&mut self, operand: Expr) -> Expr {
        self.node(ExprKind::Negate(Box::new(operand)))
    }

    pub fn comparison(&mut self, op: ComparisonOp, left: Expr, right: Expr) -> Expr {
        self.node(ExprKind::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn eq(&mut self, left: Expr, right: Expr) -> Expr {
        self.comparison(ComparisonOp::Eq, left, right)
    }

    pub fn ne(&mut self, left: Expr, right: Expr) -> Expr {
        self.comparison(ComparisonOp::Ne, left, right)
    }

    pub fn lt(&mut self, left: Expr, right: Expr) -> Expr {
        self.comparison(ComparisonOp::Lt, left, right)
    }

    pub fn gt(&mut self, left: Expr, right: Expr) -> Expr {
        self.comparison(ComparisonOp::Gt, left, right)
    }

    pub fn distinct_from(&mut self, left: Expr, right: Expr) -> Expr {
        self.node(ExprKind::DistinctFrom {
            left: Box::new(left),
            right: Box::new(right),
            negated: false,
        })
    }

    pub fn not_distinct_from(&mut self, left: Expr, right: Expr) -> Expr {
        self.node(ExprKind::DistinctFrom {
            left: Box::new(left),
            right: Box::new(right),
            negated: true,
        })
    }

    pub fn and(&mut self, left: Expr, right: Expr) -> Expr {
        self.node(ExprKind::Logical {
            op: LogicalOp::And,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn or(&mut self, left: Expr, right: Expr) -> Expr {
        self.node(ExprKind::Logical {
            op: LogicalOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn not(&mut self, operand: Expr) -> Expr {
        self.node(ExprKind::Not(Box::new(operand)))
    }

    pub fn is_null(&mut self, operand: Expr) -> Expr {
        self.node(ExprKind::IsNull {
            operand: Box::new(operand),
            negated: false,
        })
    }

    pub fn is_not_null(&mut self, operand: Expr) -> Expr {
        self.node(ExprKind::IsNull {
            operand: Box::new(operand),
            negated: true,
        })
    }

    pub fn if_expr(&mut self, condition: Expr, then_value: Expr, else_value: Option<Expr>) -> Expr {
        self.node(ExprKind::If {
            condition: Box::new(condition),
            then_value: Box::new(then_value),
            else_value: else_value.map(Box::new),
        })
    }

    pub fn searched_case(&mut self, when_clauses: Vec<(Expr, Expr)>, default: Option<Expr>) -> Expr {
        self.node(ExprKind::SearchedCase {
            when_clauses: when_clauses
                .into_iter()
                .map(|(condition, result)| WhenClause { condition, result })
                .collect(),
            default: default.map(Box::new),
        })
    }

    pub fn simple_case(
        &mut self,
        operand: Expr,
        when_clauses: Vec<(Expr, Expr)>,
        default: Option<Expr>,
    ) -> Expr {
        self.node(ExprKind::SimpleCase {
            operand: Box::new(operand),
            when_clauses: when_clauses
                .into_iter()
                .map(|(condition, result)| WhenClause { condition, result })
                .collect(),
            default: default.map(Box::new),
        })
    }

    pub fn coalesce(&mut self, args: Vec<Expr>) -> Expr {
        self.node(ExprKind::Coalesce(args))
    }

    pub fn nullif(&mut self, first: Expr, second: Expr) -> Expr {
        self.node(ExprKind::NullIf {
            first: Box::new(first),
            second: Box::new(second),
        })
    }

    pub fn between(&mut self, value: Expr, low: Expr, high: Expr) -> Expr {
        self.node(ExprKind::Between {
            value: Box::new(value),
            low: Box::new(low),
            high: Box::new(high),
            negated: false,
        })
    }

    pub fn in_list(&mut self, value: Expr, list: Vec<Expr>) -> Expr {
        self.node(ExprKind::InList {
            value: Box::new(value),
            list,
            negated: false,
        })
    }

    pub fn not_in_list(&mut self, value: Expr, list: Vec<Expr>) -> Expr {
        self.node(ExprKind::InList {
            value: Box::new(value),
            list,
            negated: true,
        })
    }

    pub fn call(&mut self, name: impl Into<String>, args: Vec<Expr>) -> Expr {
        self.node(ExprKind::FunctionCall {
            name: name.into(),
            args,
        })
    }

    pub fn cast(&mut self, operand: Expr, target: SqlType) -> Expr {
        self.node(ExprKind::Cast {
            operand: Box::new(operand),
            target,
            safe: false,
        })
    }

    pub fn try_cast(&mut self, operand: Expr, target: SqlType) -> Expr {
        self.node(ExprKind::Cast {
            operand: Box::new(operand),
            target,
            safe: true,
        })
    }

    pub fn array(&mut self, elements: Vec<Expr>) -> Expr {
        self.node(ExprKind::ArrayConstructor(elements))
    }

    pub fn row(&mut self, fields: Vec<Expr>) -> Expr {
        self.node(ExprKind::RowConstructor(fields))
    }

    pub fn map(&mut self, keys: Vec<Expr>, values: Vec<Expr>) -> Expr {
        self.node(ExprKind::MapConstructor { keys, values })
    }

    pub fn subscript(&mut self, base: Expr, index: Expr) -> Expr {
        self.node(ExprKind::Subscript {
            base: Box::new(base),
            index: Box::new(index),
        })
    }

    pub fn like(&mut self, value: Expr, pattern: Expr) -> Expr {
        self.node(ExprKind::Like {
            value: Box::new(value),
            pattern: Box::new(pattern),
            escape: None,
        })
    }

    pub fn like_escape(&mut self, value: Expr, pattern: Expr, escape: Expr) -> Expr {
        self.node(ExprKind::Like {
            value: Box::new(value),
            pattern: Box::new(pattern),
            escape: Some(Box::new(escape)),
        })
    }
}
