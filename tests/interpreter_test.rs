//! End-to-end interpreter properties: folding, three-valued logic, the
//! deferred-failure protocol, collections and LIKE.

use std::collections::HashMap;

use foldql::expression::{EvalError, Expr, ExprBuilder, ExprKind, TypeChecker};
use foldql::functions::BuiltinCatalog;
use foldql::interpreter::{ExpressionInterpreter, Folded};
use foldql::types::SqlType;
use foldql::value::{Decimal, ScalarValue};

fn variables() -> HashMap<String, SqlType> {
    HashMap::from([
        ("bound_integer".to_string(), SqlType::Integer),
        ("bound_long".to_string(), SqlType::Bigint),
        ("bound_string".to_string(), SqlType::Varchar),
        ("bound_double".to_string(), SqlType::Double),
        ("bound_null_string".to_string(), SqlType::Varchar),
        ("unbound_long".to_string(), SqlType::Bigint),
        ("unbound_long2".to_string(), SqlType::Bigint),
        ("unbound_string".to_string(), SqlType::Varchar),
        ("unbound_boolean".to_string(), SqlType::Boolean),
        ("unbound_double".to_string(), SqlType::Double),
    ])
}

fn partial_binder(name: &str) -> Option<ScalarValue> {
    match name {
        "bound_integer" => Some(ScalarValue::Integer(1234)),
        "bound_long" => Some(ScalarValue::Bigint(1234)),
        "bound_string" => Some(ScalarValue::varchar("hello")),
        "bound_double" => Some(ScalarValue::Double(12.34)),
        "bound_null_string" => Some(ScalarValue::Null(SqlType::Varchar)),
        _ => None,
    }
}

fn total_binder(name: &str) -> Option<ScalarValue> {
    partial_binder(name).or(match name {
        "unbound_long" => Some(ScalarValue::Bigint(1111)),
        "unbound_long2" => Some(ScalarValue::Bigint(2222)),
        "unbound_string" => Some(ScalarValue::varchar("world")),
        "unbound_boolean" => Some(ScalarValue::Boolean(false)),
        "unbound_double" => Some(ScalarValue::Double(0.5)),
        _ => None,
    })
}

fn optimize(expr: &Expr) -> Result<Folded, EvalError> {
    let vars = variables();
    let catalog = BuiltinCatalog::new();
    let types = TypeChecker::new(&vars, &catalog)
        .annotate(expr)
        .expect("type assignment");
    ExpressionInterpreter::new(&types, &catalog).optimize(expr, &partial_binder)
}

fn optimize_value(expr: &Expr) -> ScalarValue {
    match optimize(expr).expect("optimize") {
        Folded::Value(v) => v,
        Folded::Residual(r) => panic!("expected a value, got residual {}", r),
    }
}

fn optimize_residual(expr: &Expr) -> Expr {
    match optimize(expr).expect("optimize") {
        Folded::Residual(r) => r,
        Folded::Value(v) => panic!("expected a residual, got value {}", v),
    }
}

fn evaluate(expr: &Expr) -> Result<ScalarValue, EvalError> {
    let vars = variables();
    let catalog = BuiltinCatalog::new();
    let types = TypeChecker::new(&vars, &catalog)
        .annotate(expr)
        .expect("type assignment");
    ExpressionInterpreter::new(&types, &catalog).evaluate(expr, &total_binder)
}

fn null_boolean() -> ScalarValue {
    ScalarValue::Null(SqlType::Boolean)
}

#[test]
fn test_three_valued_and() {
    let cases = [
        (Some(true), Some(false), Some(false)),
        (Some(false), Some(true), Some(false)),
        (Some(true), Some(true), Some(true)),
        (Some(true), None, None),
        (Some(false), None, Some(false)),
        (None, Some(true), None),
        (None, Some(false), Some(false)),
        (None, None, None),
    ];
    for (left, right, expected) in cases {
        let mut b = ExprBuilder::new();
        let l = match left {
            Some(v) => b.boolean(v),
            None => b.null(SqlType::Boolean),
        };
        let r = match right {
            Some(v) => b.boolean(v),
            None => b.null(SqlType::Boolean),
        };
        let expr = b.and(l, r);
        let expected = match expected {
            Some(v) => ScalarValue::Boolean(v),
            None => null_boolean(),
        };
        assert_eq!(optimize_value(&expr), expected, "{:?} AND {:?}", left, right);
    }
}

#[test]
fn test_three_valued_or() {
    let cases = [
        (Some(true), None, Some(true)),
        (None, Some(true), Some(true)),
        (Some(false), None, None),
        (None, Some(false), None),
        (None, None, None),
        (Some(false), Some(false), Some(false)),
    ];
    for (left, right, expected) in cases {
        let mut b = ExprBuilder::new();
        let l = match left {
            Some(v) => b.boolean(v),
            None => b.null(SqlType::Boolean),
        };
        let r = match right {
            Some(v) => b.boolean(v),
            None => b.null(SqlType::Boolean),
        };
        let expr = b.or(l, r);
        let expected = match expected {
            Some(v) => ScalarValue::Boolean(v),
            None => null_boolean(),
        };
        assert_eq!(optimize_value(&expr), expected, "{:?} OR {:?}", left, right);
    }
}

#[test]
fn test_logical_absorption() {
    // true AND x -> x
    let mut b = ExprBuilder::new();
    let x = b.variable("unbound_string");
    let z = b.string("z");
    let cmp = b.eq(x, z);
    let t = b.boolean(true);
    let expr = b.and(t, cmp.clone());
    let residual = optimize_residual(&expr);
    assert!(residual.same_shape(&cmp));

    // x AND false -> false
    let mut b = ExprBuilder::new();
    let x = b.variable("unbound_string");
    let z = b.string("z");
    let cmp = b.eq(x, z);
    let f = b.boolean(false);
    let expr = b.and(cmp, f);
    assert_eq!(optimize_value(&expr), ScalarValue::Boolean(false));

    // false OR x -> x
    let mut b = ExprBuilder::new();
    let x = b.variable("unbound_boolean");
    let f = b.boolean(false);
    let expr = b.or(f, x.clone());
    assert!(optimize_residual(&expr).same_shape(&x));

    // x OR true -> true even with a symbolic left side
    let mut b = ExprBuilder::new();
    let x = b.variable("unbound_boolean");
    let t = b.boolean(true);
    let expr = b.or(x, t);
    assert_eq!(optimize_value(&expr), ScalarValue::Boolean(true));
}

#[test]
fn test_comparison_folding() {
    let mut b = ExprBuilder::new();
    let bound = b.variable("bound_long");
    let expected = b.integer(1234);
    let expr = b.eq(bound, expected);
    assert_eq!(optimize_value(&expr), ScalarValue::Boolean(true));

    // null = 'a' is unknown
    let mut b = ExprBuilder::new();
    let n = b.null(SqlType::Varchar);
    let a = b.string("a");
    let expr = b.eq(n, a);
    assert_eq!(optimize_value(&expr), null_boolean());

    // unbound_long = bound_long folds the bound side to a literal
    let mut b = ExprBuilder::new();
    let unbound = b.variable("unbound_long");
    let bound = b.variable("bound_long");
    let expr = b.eq(unbound.clone(), bound);
    let residual = optimize_residual(&expr);
    let mut b2 = ExprBuilder::new();
    let unbound2 = b2.variable("unbound_long");
    let lit = b2.literal(ScalarValue::Bigint(1234));
    let expected_shape = b2.eq(unbound2, lit);
    assert!(residual.same_shape(&expected_shape));
}

#[test]
fn test_is_distinct_from() {
    let mut b = ExprBuilder::new();
    let n1 = b.null(SqlType::Integer);
    let n2 = b.null(SqlType::Integer);
    let expr = b.distinct_from(n1, n2);
    assert_eq!(optimize_value(&expr), ScalarValue::Boolean(false));

    let mut b = ExprBuilder::new();
    let three = b.integer(3);
    let n = b.null(SqlType::Integer);
    let expr = b.distinct_from(three, n);
    assert_eq!(optimize_value(&expr), ScalarValue::Boolean(true));

    let mut b = ExprBuilder::new();
    let three = b.integer(3);
    let four = b.bigint(4);
    let expr = b.distinct_from(three, four);
    assert_eq!(optimize_value(&expr), ScalarValue::Boolean(true));

    // x IS DISTINCT FROM NULL rewrites to x IS NOT NULL
    let mut b = ExprBuilder::new();
    let x = b.variable("unbound_long");
    let n = b.null(SqlType::Bigint);
    let expr = b.distinct_from(x.clone(), n);
    let residual = optimize_residual(&expr);
    assert!(matches!(
        &residual.kind,
        ExprKind::IsNull { negated: true, .. }
    ));
}

#[test]
fn test_nullif() {
    let mut b = ExprBuilder::new();
    let one_a = b.integer(1);
    let one_b = b.integer(1);
    let expr = b.nullif(one_a, one_b);
    assert_eq!(optimize_value(&expr), ScalarValue::Null(SqlType::Integer));

    let mut b = ExprBuilder::new();
    let one = b.integer(1);
    let two = b.integer(2);
    let expr = b.nullif(one, two);
    assert_eq!(optimize_value(&expr), ScalarValue::Integer(1));

    // NULLIF(x, NULL) = x, never null
    let mut b = ExprBuilder::new();
    let one = b.integer(1);
    let n = b.null(SqlType::Integer);
    let expr = b.nullif(one, n);
    assert_eq!(optimize_value(&expr), ScalarValue::Integer(1));

    // equality across numeric kinds: NULLIF(1, 2-1) is null
    let mut b = ExprBuilder::new();
    let one = b.integer(1);
    let two = b.integer(2);
    let one2 = b.integer(1);
    let sub = b.subtract(two, one2);
    let expr = b.nullif(one, sub);
    assert_eq!(optimize_value(&expr), ScalarValue::Null(SqlType::Integer));
}

#[test]
fn test_decimal_promotion_folding() {
    // -(9876543210.9874561203 - 9876543210.9874561203) folds to the zero of
    // the combined scale-10 decimal type, not a type-erased numeric
    let literal = Decimal::parse("9876543210.9874561203").expect("decimal literal");
    assert_eq!(literal.precision, 20);
    assert_eq!(literal.scale, 10);

    let mut b = ExprBuilder::new();
    let lhs = b.literal(ScalarValue::Decimal(literal));
    let rhs = b.literal(ScalarValue::Decimal(literal));
    let diff = b.subtract(lhs, rhs);
    let expr = b.negate(diff);

    match optimize_value(&expr) {
        ScalarValue::Decimal(d) => {
            assert!(d.is_zero());
            assert_eq!(d.scale, 10);
        }
        other => panic!("expected decimal zero, got {}", other),
    }
}

#[test]
fn test_decimal_comparison_across_scales() {
    let mut b = ExprBuilder::new();
    let lhs = b.literal(ScalarValue::decimal(115, 3, 2)); // 1.15
    let low = b.literal(ScalarValue::decimal(11, 2, 1)); // 1.1
    let high = b.literal(ScalarValue::decimal(12, 2, 1)); // 1.2
    let expr = b.between(lhs, low, high);
    assert_eq!(optimize_value(&expr), ScalarValue::Boolean(true));
}

#[test]
fn test_between_three_valued() {
    let mut b = ExprBuilder::new();
    let v = b.integer(3);
    let low = b.integer(2);
    let high = b.integer(4);
    let expr = b.between(v, low, high);
    assert_eq!(optimize_value(&expr), ScalarValue::Boolean(true));

    // 3 between null and 4 is unknown
    let mut b = ExprBuilder::new();
    let v = b.integer(3);
    let low = b.null(SqlType::Integer);
    let high = b.integer(4);
    let expr = b.between(v, low, high);
    assert_eq!(optimize_value(&expr), null_boolean());

    // 2 between 3 and null is false: the failed low bound dominates
    let mut b = ExprBuilder::new();
    let v = b.integer(2);
    let low = b.integer(3);
    let high = b.null(SqlType::Integer);
    let expr = b.between(v, low, high);
    assert_eq!(optimize_value(&expr), ScalarValue::Boolean(false));
}

#[test]
fn test_top_level_division_by_zero_raises_from_optimize() {
    let mut b = ExprBuilder::new();
    let zero_a = b.integer(0);
    let zero_b = b.integer(0);
    let expr = b.divide(zero_a, zero_b);
    assert!(matches!(
        optimize(&expr),
        Err(EvalError::NumericValueOutOfRange(_))
    ));
}

#[test]
fn test_if_drops_unselected_arm_without_evaluating() {
    // IF(false, 0/0, 1): the failing arm is dropped, never evaluated
    let mut b = ExprBuilder::new();
    let f = b.boolean(false);
    let zero_a = b.integer(0);
    let zero_b = b.integer(0);
    let division = b.divide(zero_a, zero_b);
    let one = b.integer(1);
    let expr = b.if_expr(f, division, Some(one));
    assert_eq!(optimize_value(&expr), ScalarValue::Integer(1));

    // IF(true, 1, 0/0) likewise
    let mut b = ExprBuilder::new();
    let t = b.boolean(true);
    let one = b.integer(1);
    let zero_a = b.integer(0);
    let zero_b = b.integer(0);
    let division = b.divide(zero_a, zero_b);
    let expr = b.if_expr(t, one, Some(division));
    assert_eq!(optimize_value(&expr), ScalarValue::Integer(1));
}

#[test]
fn test_guarded_failure_becomes_deferred_marker() {
    // IF(unbound_boolean, 1, 0/0): both arms are guarded; the failing arm
    // becomes a deferred marker in the residual CASE
    let mut b = ExprBuilder::new();
    let cond = b.variable("unbound_boolean");
    let one = b.integer(1);
    let zero_a = b.integer(0);
    let zero_b = b.integer(0);
    let division = b.divide(zero_a, zero_b);
    let expr = b.if_expr(cond, one, Some(division));

    let residual = optimize_residual(&expr);
    match &residual.kind {
        ExprKind::SearchedCase {
            when_clauses,
            default,
        } => {
            assert_eq!(when_clauses.len(), 1);
            assert!(matches!(
                when_clauses[0].result.kind,
                ExprKind::Literal(ScalarValue::Integer(1))
            ));
            let default = default.as_ref().expect("else arm");
            match &default.kind {
                ExprKind::DeferredFailure { error, ty } => {
                    assert!(matches!(error, EvalError::NumericValueOutOfRange(_)));
                    assert_eq!(*ty, SqlType::Integer);
                }
                other => panic!("expected deferred failure, got {:?}", other),
            }
        }
        other => panic!("expected searched case, got {:?}", other),
    }

    // evaluating the residual with the guard bound to false reaches the
    // marker and raises the suppressed error
    let vars = variables();
    let catalog = BuiltinCatalog::new();
    let types = TypeChecker::new(&vars, &catalog)
        .annotate(&expr)
        .expect("types");
    let interpreter = ExpressionInterpreter::new(&types, &catalog);
    let result = interpreter.evaluate(&residual, &total_binder);
    assert!(matches!(result, Err(EvalError::NumericValueOutOfRange(_))));

    // with the guard true the marker is never reached
    let true_binder =
        |name: &str| total_binder(name).map(|v| match name {
            "unbound_boolean" => ScalarValue::Boolean(true),
            _ => v,
        });
    assert_eq!(
        interpreter.evaluate(&residual, &true_binder).expect("evaluate"),
        ScalarValue::Integer(1)
    );
}

#[test]
fn test_searched_case_pruning() {
    // false conditions drop; a true condition behind a symbolic one becomes
    // the residual else
    let mut b = ExprBuilder::new();
    let unbound = b.variable("unbound_long");
    let one = b.bigint(1);
    let sym_cond = b.eq(unbound, one);
    let r0 = b.integer(0);
    let f = b.boolean(false);
    let r1 = b.integer(1);
    let t = b.boolean(true);
    let r2 = b.integer(2);
    let r3 = b.integer(3);
    let expr = b.searched_case(vec![(sym_cond, r0), (f, r1), (t, r2)], Some(r3));

    let residual = optimize_residual(&expr);
    match &residual.kind {
        ExprKind::SearchedCase {
            when_clauses,
            default,
        } => {
            assert_eq!(when_clauses.len(), 1);
            let default = default.as_ref().expect("else");
            assert!(matches!(
                default.kind,
                ExprKind::Literal(ScalarValue::Integer(2))
            ));
        }
        other => panic!("expected searched case, got {:?}", other),
    }

    // all conditions false, no else: null
    let mut b = ExprBuilder::new();
    let f = b.boolean(false);
    let one = b.integer(1);
    let expr = b.searched_case(vec![(f, one)], None);
    assert_eq!(optimize_value(&expr), ScalarValue::Null(SqlType::Integer));

    // the first true condition selects its arm outright
    let mut b = ExprBuilder::new();
    let f = b.boolean(false);
    let big = b.bigint(10000000000);
    let t = b.boolean(true);
    let small = b.bigint(33);
    let expr = b.searched_case(vec![(f, big), (t, small)], None);
    assert_eq!(optimize_value(&expr), ScalarValue::Bigint(33));
}

#[test]
fn test_simple_case_pruning() {
    // subject 33: non-matching constant operands drop; symbolic stays
    let mut b = ExprBuilder::new();
    let subject = b.integer(33);
    let unbound = b.variable("unbound_long");
    let r0 = b.integer(0);
    let one = b.integer(1);
    let r1 = b.integer(1);
    let thirty_three = b.integer(33);
    let r2 = b.integer(2);
    let r_else = b.integer(0);
    let expr = b.simple_case(
        subject,
        vec![(unbound, r0), (one, r1), (thirty_three, r2)],
        Some(r_else),
    );

    let residual = optimize_residual(&expr);
    match &residual.kind {
        ExprKind::SimpleCase {
            when_clauses,
            default,
            ..
        } => {
            assert_eq!(when_clauses.len(), 1);
            assert!(matches!(
                when_clauses[0].condition.kind,
                ExprKind::Variable(_)
            ));
            // the later matching clause became the else
            let default = default.as_ref().expect("else");
            assert!(matches!(
                default.kind,
                ExprKind::Literal(ScalarValue::Integer(2))
            ));
        }
        other => panic!("expected simple case, got {:?}", other),
    }

    // null subject matches nothing
    let mut b = ExprBuilder::new();
    let subject = b.null(SqlType::Boolean);
    let t = b.boolean(true);
    let r = b.integer(33);
    let r_else = b.integer(7);
    let expr = b.simple_case(subject, vec![(t, r)], Some(r_else));
    assert_eq!(optimize_value(&expr), ScalarValue::Integer(7));

    // a null when-operand can never match and drops
    let mut b = ExprBuilder::new();
    let subject = b.integer(33);
    let n = b.null(SqlType::Integer);
    let r = b.integer(1);
    let r_else = b.integer(33);
    let expr = b.simple_case(subject, vec![(n, r)], Some(r_else));
    assert_eq!(optimize_value(&expr), ScalarValue::Integer(33));
}

#[test]
fn test_coalesce_dedup_and_flatten() {
    // coalesce(x, x) == optimize(x)
    let mut b = ExprBuilder::new();
    let x1 = b.variable("unbound_long");
    let x2 = b.variable("unbound_long");
    let expr = b.coalesce(vec![x1.clone(), x2]);
    let residual = optimize_residual(&expr);
    assert!(residual.same_shape(&x1));

    // coalesce(6, unbound_long) == 6
    let mut b = ExprBuilder::new();
    let six = b.bigint(6);
    let x = b.variable("unbound_long");
    let expr = b.coalesce(vec![six, x]);
    assert_eq!(optimize_value(&expr), ScalarValue::Bigint(6));

    // null arguments drop; a later constant terminates the list
    let mut b = ExprBuilder::new();
    let x = b.variable("unbound_long");
    let n = b.null(SqlType::Bigint);
    let two = b.bigint(2);
    let y = b.variable("unbound_long2");
    let expr = b.coalesce(vec![x, n, two, y]);
    let residual = optimize_residual(&expr);
    match &residual.kind {
        ExprKind::Coalesce(entries) => {
            assert_eq!(entries.len(), 2);
            assert!(matches!(entries[0].kind, ExprKind::Variable(_)));
            assert!(matches!(
                entries[1].kind,
                ExprKind::Literal(ScalarValue::Bigint(2))
            ));
        }
        other => panic!("expected coalesce, got {:?}", other),
    }

    // nested coalesce flattens before deduplication
    let mut b = ExprBuilder::new();
    let outer_x = b.variable("unbound_long");
    let inner_x = b.variable("unbound_long");
    let one = b.bigint(1);
    let inner = b.coalesce(vec![inner_x, one]);
    let expr = b.coalesce(vec![outer_x, inner]);
    let residual = optimize_residual(&expr);
    match &residual.kind {
        ExprKind::Coalesce(entries) => {
            assert_eq!(entries.len(), 2);
            assert!(matches!(entries[0].kind, ExprKind::Variable(_)));
            assert!(matches!(
                entries[1].kind,
                ExprKind::Literal(ScalarValue::Bigint(1))
            ));
        }
        other => panic!("expected coalesce, got {:?}", other),
    }

    // non-deterministic duplicates are preserved
    let mut b = ExprBuilder::new();
    let r1 = b.call("random", vec![]);
    let r2 = b.call("random", vec![]);
    let five = b.literal(ScalarValue::Double(5.0));
    let expr = b.coalesce(vec![r1, r2, five]);
    let residual = optimize_residual(&expr);
    match &residual.kind {
        ExprKind::Coalesce(entries) => assert_eq!(entries.len(), 3),
        other => panic!("expected coalesce, got {:?}", other),
    }
}

#[test]
fn test_coalesce_guarded_failures() {
    // failures in non-first arguments defer instead of raising
    let mut b = ExprBuilder::new();
    let x = b.variable("unbound_long");
    let zero_a = b.bigint(0);
    let zero_b = b.bigint(0);
    let division = b.divide(zero_a, zero_b);
    let expr = b.coalesce(vec![x, division]);
    let residual = optimize_residual(&expr);
    match &residual.kind {
        ExprKind::Coalesce(entries) => {
            assert_eq!(entries.len(), 2);
            assert!(matches!(
                entries[1].kind,
                ExprKind::DeferredFailure { .. }
            ));
        }
        other => panic!("expected coalesce, got {:?}", other),
    }

    // the first argument is unconditional and raises immediately
    let mut b = ExprBuilder::new();
    let zero_a = b.bigint(0);
    let zero_b = b.bigint(0);
    let division = b.divide(zero_a, zero_b);
    let x = b.variable("unbound_long");
    let expr = b.coalesce(vec![division, x]);
    assert!(matches!(
        optimize(&expr),
        Err(EvalError::NumericValueOutOfRange(_))
    ));
}

#[test]
fn test_in_list_folding() {
    // 3 in (2, 4, 3, 5) -> true
    let mut b = ExprBuilder::new();
    let probe = b.integer(3);
    let list = vec![b.integer(2), b.integer(4), b.integer(3), b.integer(5)];
    let expr = b.in_list(probe, list);
    assert_eq!(optimize_value(&expr), ScalarValue::Boolean(true));

    // 3 in (2, null) -> unknown
    let mut b = ExprBuilder::new();
    let probe = b.integer(3);
    let list = vec![b.integer(2), b.null(SqlType::Integer)];
    let expr = b.in_list(probe, list);
    assert_eq!(optimize_value(&expr), null_boolean());

    // null probe -> unknown
    let mut b = ExprBuilder::new();
    let probe = b.null(SqlType::Integer);
    let list = vec![b.integer(2), b.integer(3)];
    let expr = b.in_list(probe, list);
    assert_eq!(optimize_value(&expr), null_boolean());

    // bound probe with symbolic entries folds to a smaller list with the
    // probe substituted as a literal
    let mut b = ExprBuilder::new();
    let probe = b.variable("bound_long");
    let list = vec![
        b.bigint(2),
        b.bigint(4),
        b.variable("unbound_long"),
        b.variable("unbound_long2"),
        b.bigint(9),
    ];
    let expr = b.in_list(probe, list);
    let residual = optimize_residual(&expr);
    match &residual.kind {
        ExprKind::InList { value, list, .. } => {
            assert!(matches!(
                value.kind,
                ExprKind::Literal(ScalarValue::Bigint(1234))
            ));
            assert_eq!(list.len(), 2);
            assert!(list.iter().all(|e| matches!(e.kind, ExprKind::Variable(_))));
        }
        other => panic!("expected in-list, got {:?}", other),
    }

    // an unmatched null constant survives into the residual to preserve
    // unknown dominance
    let mut b = ExprBuilder::new();
    let probe = b.variable("bound_long");
    let list = vec![b.null(SqlType::Bigint), b.variable("unbound_long")];
    let expr = b.in_list(probe, list);
    let residual = optimize_residual(&expr);
    match &residual.kind {
        ExprKind::InList { list, .. } => {
            assert_eq!(list.len(), 2);
            assert!(matches!(
                list[1].kind,
                ExprKind::Literal(ScalarValue::Null(_))
            ));
        }
        other => panic!("expected in-list, got {:?}", other),
    }
}

#[test]
fn test_in_list_nested_containers() {
    // ARRAY[1, null] IN (ARRAY[2, null]) -> false: mismatch dominates
    let mut b = ExprBuilder::new();
    let one = b.integer(1);
    let n1 = b.null(SqlType::Integer);
    let probe = b.array(vec![one, n1]);
    let two = b.integer(2);
    let n2 = b.null(SqlType::Integer);
    let candidate = b.array(vec![two, n2]);
    let expr = b.in_list(probe, vec![candidate]);
    assert_eq!(evaluate(&expr).expect("evaluate"), ScalarValue::Boolean(false));

    // ARRAY[1, null] IN (ARRAY[1, null]) -> unknown
    let mut b = ExprBuilder::new();
    let one = b.integer(1);
    let n1 = b.null(SqlType::Integer);
    let probe = b.array(vec![one, n1]);
    let one2 = b.integer(1);
    let n2 = b.null(SqlType::Integer);
    let candidate = b.array(vec![one2, n2]);
    let expr = b.in_list(probe, vec![candidate]);
    assert_eq!(evaluate(&expr).expect("evaluate"), null_boolean());

    // ROW and MAP behave identically under the same equality
    let mut b = ExprBuilder::new();
    let one = b.integer(1);
    let probe = b.row(vec![one]);
    let two = b.integer(2);
    let candidate = b.row(vec![two]);
    let expr = b.in_list(probe, vec![candidate]);
    assert_eq!(evaluate(&expr).expect("evaluate"), ScalarValue::Boolean(false));
}

#[test]
fn test_array_constructor_folding() {
    let mut b = ExprBuilder::new();
    let one = b.integer(1);
    let two = b.integer(2);
    let sum = b.add(one, two);
    let four = b.integer(4);
    let expr = b.array(vec![sum, four]);
    assert_eq!(
        optimize_value(&expr),
        ScalarValue::array(
            SqlType::Integer,
            vec![ScalarValue::Integer(3), ScalarValue::Integer(4)]
        )
    );

    // a symbolic element keeps the constructor with folded children
    let mut b = ExprBuilder::new();
    let one = b.integer(1);
    let two = b.integer(2);
    let sum = b.add(one, two);
    let x = b.variable("bound_integer");
    let y = b.variable("unbound_long");
    let cast_x = b.cast(x, SqlType::Bigint);
    let cast_sum = b.cast(sum, SqlType::Bigint);
    let expr = b.array(vec![cast_sum, cast_x, y]);
    let residual = optimize_residual(&expr);
    match &residual.kind {
        ExprKind::ArrayConstructor(elements) => {
            assert_eq!(elements.len(), 3);
            assert!(matches!(
                elements[0].kind,
                ExprKind::Literal(ScalarValue::Bigint(3))
            ));
            assert!(matches!(
                elements[1].kind,
                ExprKind::Literal(ScalarValue::Bigint(1234))
            ));
        }
        other => panic!("expected array constructor, got {:?}", other),
    }
}

#[test]
fn test_massive_array_constructor_is_linear() {
    // 10,000 elements over a bound variable folds fully
    let mut b = ExprBuilder::new();
    let mut elements = Vec::with_capacity(10_000);
    for i in 0..10_000 {
        let var = b.variable("bound_long");
        let offset = b.bigint(i);
        elements.push(b.add(var, offset));
    }
    let expr = b.array(elements);
    match optimize_value(&expr) {
        ScalarValue::Array { elements, .. } => {
            assert_eq!(elements.len(), 10_000);
            assert_eq!(elements[0], ScalarValue::Bigint(1234));
            assert_eq!(elements[9999], ScalarValue::Bigint(1234 + 9999));
        }
        other => panic!("expected array, got {}", other),
    }

    // 10,000-entry IN list with a constant probe stays linear too
    let mut b = ExprBuilder::new();
    let probe = b.bigint(123456);
    let list: Vec<Expr> = (0..10_000).map(|i| b.bigint(i)).collect();
    let expr = b.in_list(probe, list);
    assert_eq!(optimize_value(&expr), ScalarValue::Boolean(false));
}

#[test]
fn test_map_construction_and_subscript() {
    let mut b = ExprBuilder::new();
    let k1 = b.integer(1);
    let k2 = b.integer(2);
    let v1 = b.integer(3);
    let v2 = b.integer(4);
    let map = b.map(vec![k1, k2], vec![v1, v2]);
    let idx = b.integer(2);
    let expr = b.subscript(map, idx);
    assert_eq!(optimize_value(&expr), ScalarValue::Integer(4));

    // duplicate constant keys follow the representation policy: last wins
    let mut b = ExprBuilder::new();
    let k1 = b.integer(1);
    let k2 = b.integer(1);
    let v1 = b.integer(3);
    let v2 = b.integer(4);
    let map = b.map(vec![k1, k2], vec![v1, v2]);
    let idx = b.integer(1);
    let expr = b.subscript(map, idx);
    assert_eq!(optimize_value(&expr), ScalarValue::Integer(4));

    // absent constant key raises immediately
    let mut b = ExprBuilder::new();
    let k = b.integer(1);
    let v = b.integer(3);
    let map = b.map(vec![k], vec![v]);
    let idx = b.integer(9);
    let expr = b.subscript(map, idx);
    assert!(matches!(optimize(&expr), Err(EvalError::InvalidMapKey(_))));
}

#[test]
fn test_array_subscript_bounds() {
    let make = |index: i32| {
        let mut b = ExprBuilder::new();
        let one = b.integer(1);
        let two = b.integer(2);
        let three = b.integer(3);
        let array = b.array(vec![one, two, three]);
        let idx = b.integer(index);
        b.subscript(array, idx)
    };

    assert_eq!(optimize_value(&make(2)), ScalarValue::Integer(2));
    assert!(matches!(
        optimize(&make(0)),
        Err(EvalError::InvalidArrayIndex(_))
    ));
    assert!(matches!(
        optimize(&make(-1)),
        Err(EvalError::InvalidArrayIndex(_))
    ));
    assert!(matches!(
        optimize(&make(5)),
        Err(EvalError::InvalidArrayIndex(_))
    ));

    // null index yields null, not an error
    let mut b = ExprBuilder::new();
    let one = b.integer(1);
    let array = b.array(vec![one]);
    let idx = b.null(SqlType::Integer);
    let expr = b.subscript(array, idx);
    assert_eq!(optimize_value(&expr), ScalarValue::Null(SqlType::Integer));
}

#[test]
fn test_like_folding() {
    let fold_like = |subject: &str, pattern: &str| {
        let mut b = ExprBuilder::new();
        let s = b.string(subject);
        let p = b.string(pattern);
        let expr = b.like(s, p);
        optimize_value(&expr)
    };

    assert_eq!(fold_like("abc", "abc"), ScalarValue::Boolean(true));
    assert_eq!(fold_like("abc", "a%"), ScalarValue::Boolean(true));
    assert_eq!(fold_like("abc", "___"), ScalarValue::Boolean(true));
    assert_eq!(fold_like("abcd", "___"), ScalarValue::Boolean(false));
    assert_eq!(fold_like(".*", ".*"), ScalarValue::Boolean(true));
    assert_eq!(fold_like("ab", ".*"), ScalarValue::Boolean(false));

    // null pattern is unknown
    let mut b = ExprBuilder::new();
    let s = b.string("a");
    let p = b.null(SqlType::Varchar);
    let expr = b.like(s, p);
    assert_eq!(optimize_value(&expr), null_boolean());

    // null escape is unknown
    let mut b = ExprBuilder::new();
    let s = b.string("a");
    let p = b.string("%");
    let e = b.null(SqlType::Varchar);
    let expr = b.like_escape(s, p, e);
    assert_eq!(optimize_value(&expr), null_boolean());
}

#[test]
fn test_like_rewrites_to_equality() {
    let mut b = ExprBuilder::new();
    let s = b.variable("unbound_string");
    let p = b.string("abc");
    let expr = b.like(s, p);
    let residual = optimize_residual(&expr);
    match &residual.kind {
        ExprKind::Comparison { op, right, .. } => {
            assert_eq!(*op, foldql::expression::ComparisonOp::Eq);
            assert!(matches!(
                &right.kind,
                ExprKind::Literal(v) if *v == ScalarValue::varchar("abc")
            ));
        }
        other => panic!("expected equality, got {:?}", other),
    }

    // escaped wildcards unescape into the literal
    let mut b = ExprBuilder::new();
    let s = b.variable("unbound_string");
    let p = b.string("a#_b");
    let e = b.string("#");
    let expr = b.like_escape(s, p, e);
    let residual = optimize_residual(&expr);
    match &residual.kind {
        ExprKind::Comparison { right, .. } => {
            assert!(matches!(
                &right.kind,
                ExprKind::Literal(v) if *v == ScalarValue::varchar("a_b")
            ));
        }
        other => panic!("expected equality, got {:?}", other),
    }

    // a real wildcard keeps the LIKE
    let mut b = ExprBuilder::new();
    let s = b.variable("unbound_string");
    let p = b.string("a%b");
    let expr = b.like(s, p);
    assert!(matches!(
        optimize_residual(&expr).kind,
        ExprKind::Like { .. }
    ));
}

#[test]
fn test_like_escape_validation_is_unconditional() {
    // a bad escape raises for any subject, even a symbolic one
    let cases = ["", "bc"];
    for escape in cases {
        let mut b = ExprBuilder::new();
        let s = b.variable("unbound_string");
        let p = b.string("abc");
        let e = b.string(escape);
        let expr = b.like_escape(s, p, e);
        assert!(matches!(
            optimize(&expr),
            Err(EvalError::InvalidFunctionArgument(_))
        ));
    }

    // a pattern of length 1 equal to the escape character itself
    let mut b = ExprBuilder::new();
    let s = b.variable("unbound_string");
    let p = b.string("#");
    let e = b.string("#");
    let expr = b.like_escape(s, p, e);
    assert!(matches!(
        optimize(&expr),
        Err(EvalError::InvalidFunctionArgument(_))
    ));

    // trailing escape
    let mut b = ExprBuilder::new();
    let s = b.variable("unbound_string");
    let p = b.string("ab#");
    let e = b.string("#");
    let expr = b.like_escape(s, p, e);
    assert!(matches!(
        optimize(&expr),
        Err(EvalError::InvalidFunctionArgument(_))
    ));
}

#[test]
fn test_like_invalid_utf8_subject() {
    let mut b = ExprBuilder::new();
    let s = b.literal(ScalarValue::varchar_bytes(vec![
        b'a', b'b', b'c', 0xFF, b'x', b'y',
    ]));
    let p = b.string("%b%");
    let expr = b.like(s, p);
    assert_eq!(evaluate(&expr).expect("evaluate"), ScalarValue::Boolean(true));
}

#[test]
fn test_cast_folding() {
    let mut b = ExprBuilder::new();
    let bound = b.variable("bound_long");
    let expr = b.cast(bound, SqlType::Varchar);
    assert_eq!(optimize_value(&expr), ScalarValue::varchar("1234"));

    // TRY_CAST converts failure to null instead of raising
    let mut b = ExprBuilder::new();
    let s = b.string("foo");
    let expr = b.try_cast(s, SqlType::Bigint);
    assert_eq!(optimize_value(&expr), ScalarValue::Null(SqlType::Bigint));

    let mut b = ExprBuilder::new();
    let s = b.string("foo");
    let expr = b.cast(s, SqlType::Bigint);
    assert!(matches!(
        optimize(&expr),
        Err(EvalError::InvalidCastArgument(_))
    ));

    // cast to the operand's own type drops from the residual
    let mut b = ExprBuilder::new();
    let x = b.variable("unbound_string");
    let expr = b.cast(x.clone(), SqlType::Varchar);
    assert!(optimize_residual(&expr).same_shape(&x));

    // a needed cast stays
    let mut b = ExprBuilder::new();
    let x = b.variable("unbound_long");
    let expr = b.cast(x, SqlType::Varchar);
    assert!(matches!(optimize_residual(&expr).kind, ExprKind::Cast { .. }));
}

#[test]
fn test_function_folding_and_determinism() {
    // deterministic call over constants folds
    let mut b = ExprBuilder::new();
    let n = b.integer(-5);
    let expr = b.call("abs", vec![n]);
    assert_eq!(optimize_value(&expr), ScalarValue::Integer(5));

    // deterministic call over a bound variable folds
    let mut b = ExprBuilder::new();
    let bound = b.variable("bound_long");
    let neg = b.negate(bound);
    let expr = b.call("abs", vec![neg]);
    assert_eq!(optimize_value(&expr), ScalarValue::Bigint(1234));

    // symbolic argument keeps the call with folded children
    let mut b = ExprBuilder::new();
    let x = b.variable("unbound_long");
    let one = b.bigint(1);
    let two = b.bigint(2);
    let sum = b.add(one, two);
    let arg = b.add(x, sum);
    let expr = b.call("abs", vec![arg]);
    let residual = optimize_residual(&expr);
    assert!(matches!(residual.kind, ExprKind::FunctionCall { .. }));

    // random() never folds during optimization
    let mut b = ExprBuilder::new();
    let expr = b.call("random", vec![]);
    let residual = optimize_residual(&expr);
    assert!(residual.same_shape(&expr));

    // but evaluate invokes it exactly once and yields a double in [0, 1)
    match evaluate(&expr).expect("evaluate") {
        ScalarValue::Double(d) => assert!((0.0..1.0).contains(&d)),
        other => panic!("expected double, got {}", other),
    }
}

#[test]
fn test_evaluate_requires_total_binder() {
    let mut b = ExprBuilder::new();
    let x = b.variable("unbound_long");
    let one = b.bigint(1);
    let expr = b.add(x, one);

    let vars = variables();
    let catalog = BuiltinCatalog::new();
    let types = TypeChecker::new(&vars, &catalog)
        .annotate(&expr)
        .expect("types");
    let interpreter = ExpressionInterpreter::new(&types, &catalog);

    assert!(matches!(
        interpreter.evaluate(&expr, &partial_binder),
        Err(EvalError::UnboundVariable(_))
    ));
    assert_eq!(
        interpreter.evaluate(&expr, &total_binder).expect("evaluate"),
        ScalarValue::Bigint(1112)
    );
}

#[test]
fn test_bound_null_is_not_unbound() {
    // a variable bound to null folds as NULL rather than staying symbolic
    let mut b = ExprBuilder::new();
    let x = b.variable("bound_null_string");
    let expr = b.is_null(x);
    assert_eq!(optimize_value(&expr), ScalarValue::Boolean(true));
}

#[test]
fn test_optimize_is_idempotent() {
    let build_cases: Vec<fn(&mut ExprBuilder) -> Expr> = vec![
        |b| {
            let x = b.variable("unbound_long");
            let one = b.bigint(1);
            let two = b.bigint(2);
            let sum = b.add(one, two);
            b.add(x, sum)
        },
        |b| {
            let cond = b.variable("unbound_boolean");
            let one = b.integer(1);
            let zero_a = b.integer(0);
            let zero_b = b.integer(0);
            let division = b.divide(zero_a, zero_b);
            b.if_expr(cond, one, Some(division))
        },
        |b| {
            let x = b.variable("unbound_long");
            let n = b.null(SqlType::Bigint);
            let two = b.bigint(2);
            let y = b.variable("unbound_long2");
            b.coalesce(vec![x, n, two, y])
        },
        |b| {
            let probe = b.variable("unbound_long");
            let one = b.bigint(1);
            let one_dup = b.bigint(1);
            let y = b.variable("unbound_long2");
            b.in_list(probe, vec![one, one_dup, y])
        },
        |b| {
            let s = b.variable("unbound_string");
            let p = b.string("a%b");
            b.like(s, p)
        },
    ];

    for build in build_cases {
        let mut b = ExprBuilder::new();
        let expr = build(&mut b);

        let vars = variables();
        let catalog = BuiltinCatalog::new();
        let types = TypeChecker::new(&vars, &catalog)
            .annotate(&expr)
            .expect("types");
        let interpreter = ExpressionInterpreter::new(&types, &catalog);

        let once = interpreter
            .optimize(&expr, &partial_binder)
            .expect("first optimize");
        let residual = match &once {
            Folded::Residual(r) => r.clone(),
            Folded::Value(_) => continue,
        };
        let twice = interpreter
            .optimize(&residual, &partial_binder)
            .expect("second optimize");
        assert_eq!(once, twice, "optimize not idempotent for {}", expr);
    }
}

#[test]
fn test_optimize_preserves_declared_type() {
    let build_cases: Vec<fn(&mut ExprBuilder) -> Expr> = vec![
        |b| {
            let x = b.variable("unbound_long");
            let one = b.integer(1);
            b.add(x, one)
        },
        |b| {
            let s = b.variable("unbound_string");
            let p = b.string("abc");
            b.like(s, p)
        },
        |b| {
            let cond = b.variable("unbound_boolean");
            let one = b.integer(1);
            let two = b.integer(2);
            b.if_expr(cond, one, Some(two))
        },
        |b| {
            let x = b.variable("unbound_double");
            let y = b.variable("unbound_long");
            let cast_y = b.cast(y, SqlType::Double);
            b.coalesce(vec![x, cast_y])
        },
    ];

    for build in build_cases {
        let mut b = ExprBuilder::new();
        let expr = build(&mut b);

        let vars = variables();
        let catalog = BuiltinCatalog::new();
        let types = TypeChecker::new(&vars, &catalog)
            .annotate(&expr)
            .expect("types");
        let interpreter = ExpressionInterpreter::new(&types, &catalog);
        let declared = types.resolve(&expr).expect("declared type");

        match interpreter.optimize(&expr, &partial_binder).expect("optimize") {
            Folded::Value(v) => assert_eq!(v.sql_type(), declared),
            Folded::Residual(r) => {
                assert_eq!(types.resolve(&r).expect("residual type"), declared)
            }
        }
    }
}

#[test]
fn test_residual_renders_and_literals_round_trip() {
    let mut b = ExprBuilder::new();
    let x = b.variable("unbound_long");
    let one = b.bigint(1);
    let two = b.bigint(2);
    let sum = b.add(one, two);
    let expr = b.add(x, sum);

    let residual = optimize_residual(&expr);
    assert_eq!(residual.to_string(), "(unbound_long + BIGINT '3')");

    // every literal the fold produced re-parses to an equal value
    let folded = ScalarValue::Bigint(3);
    let text = foldql::value::render_literal(&folded);
    let reparsed =
        foldql::value::parse_literal(&SqlType::Bigint, &text).expect("literal round-trip");
    assert_eq!(folded, reparsed);
}
