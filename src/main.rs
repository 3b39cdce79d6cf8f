//! FoldQL playground - folds a set of sample expressions and prints the
//! results, for quick inspection of optimizer behavior.

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use std::collections::HashMap;

use foldql::expression::{Expr, ExprBuilder, TypeChecker};
use foldql::functions::BuiltinCatalog;
use foldql::interpreter::{ExpressionInterpreter, Folded};
use foldql::types::SqlType;
use foldql::value::ScalarValue;

/// FoldQL playground - expression folding demos
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Also fully evaluate each sample with every variable bound
    #[arg(short, long)]
    evaluate: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let variables = HashMap::from([
        ("bound_long".to_string(), SqlType::Bigint),
        ("unbound_long".to_string(), SqlType::Bigint),
        ("unbound_string".to_string(), SqlType::Varchar),
        ("unbound_boolean".to_string(), SqlType::Boolean),
    ]);
    let catalog = BuiltinCatalog::new();

    let partial_binder = |name: &str| match name {
        "bound_long" => Some(ScalarValue::Bigint(1234)),
        _ => None,
    };
    let total_binder = |name: &str| match name {
        "bound_long" => Some(ScalarValue::Bigint(1234)),
        "unbound_long" => Some(ScalarValue::Bigint(42)),
        "unbound_string" => Some(ScalarValue::varchar("hello")),
        "unbound_boolean" => Some(ScalarValue::Boolean(false)),
        _ => None,
    };

    for (label, expr) in samples() {
        let types = TypeChecker::new(&variables, &catalog)
            .annotate(&expr)
            .with_context(|| format!("type assignment failed for {}", label))?;
        let interpreter = ExpressionInterpreter::new(&types, &catalog);

        println!("{}", label);
        println!("  input:     {}", expr);
        match interpreter.optimize(&expr, &partial_binder) {
            Ok(Folded::Value(value)) => println!("  optimized: {}", value),
            Ok(Folded::Residual(residual)) => println!("  optimized: {}", residual),
            Err(error) => println!("  optimized: error: {}", error),
        }
        if args.evaluate {
            match interpreter.evaluate(&expr, &total_binder) {
                Ok(value) => println!("  evaluated: {}", value),
                Err(error) => println!("  evaluated: error: {}", error),
            }
        }
        println!();
    }

    Ok(())
}

fn samples() -> Vec<(&'static str, Expr)> {
    let mut b = ExprBuilder::new();
    let mut out = Vec::new();

    // arithmetic folding against a bound variable
    let bound = b.variable("bound_long");
    let one = b.integer(1);
    let two = b.integer(2);
    let sum = b.add(one, two);
    let expr = b.add(bound, sum);
    out.push(("bound arithmetic", expr));

    // absorption keeps the symbolic side
    let unbound = b.variable("unbound_long");
    let thousand = b.bigint(1000);
    let cmp = b.gt(unbound, thousand);
    let t = b.boolean(true);
    let expr = b.and(t, cmp);
    out.push(("logical absorption", expr));

    // deferred failure: the unreached division by zero never raises
    let cond = b.variable("unbound_boolean");
    let safe = b.integer(1);
    let zero_a = b.integer(0);
    let zero_b = b.integer(0);
    let division = b.divide(zero_a, zero_b);
    let expr = b.if_expr(cond, safe, Some(division));
    out.push(("guarded failure", expr));

    // LIKE with a wildcard-free pattern becomes an equality
    let subject = b.variable("unbound_string");
    let pattern = b.string("hello");
    let expr = b.like(subject, pattern);
    out.push(("like rewrite", expr));

    // coalesce deduplication
    let x1 = b.variable("unbound_long");
    let x2 = b.variable("unbound_long");
    let expr = b.coalesce(vec![x1, x2]);
    out.push(("coalesce dedup", expr));

    out
}
