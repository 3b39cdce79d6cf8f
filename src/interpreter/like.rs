//! LIKE pattern compilation and matching.
//!
//! Patterns compile to a flat item sequence over raw bytes, so subjects with
//! invalid UTF-8 match byte-wise and no general-purpose regex engine is
//! involved. Escape validation happens at compile time and raises
//! unconditionally, even when the subject is symbolic.

use crate::expression::error::{EvalError, EvalResult};
use crate::expression::expr::{Expr, ExprKind};
use crate::types::SqlType;
use crate::value::ScalarValue;

use super::core::{Folded, Folder};

/// One element of a compiled pattern
#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    /// A literal byte that must match exactly
    Byte(u8),
    /// `_`: exactly one byte
    AnyOne,
    /// `%`: any run of bytes, including empty
    AnyRun,
}

/// A LIKE pattern compiled for repeated matching
#[derive(Debug, Clone)]
pub struct LikeMatcher {
    items: Vec<Item>,
}

impl LikeMatcher {
    /// Compile a pattern, validating the escape character.
    ///
    /// The escape must be exactly one character, and inside the pattern it
    /// may precede only `_`, `%`, or itself.
    pub fn compile(pattern: &[u8], escape: Option<&[u8]>) -> EvalResult<LikeMatcher> {
        let escape_bytes: Option<&[u8]> = match escape {
            None => None,
            Some(bytes) => {
                let text = std::str::from_utf8(bytes).map_err(|_| {
                    EvalError::InvalidFunctionArgument(
                        "escape must be a single character".to_string(),
                    )
                })?;
                if text.chars().count() != 1 {
                    return Err(EvalError::InvalidFunctionArgument(
                        "escape must be a single character".to_string(),
                    ));
                }
                Some(bytes)
            }
        };

        let mut items = Vec::with_capacity(pattern.len());
        let mut i = 0;
        while i < pattern.len() {
            if let Some(esc) = escape_bytes {
                if pattern[i..].starts_with(esc) {
                    let next = i + esc.len();
                    if next >= pattern.len() {
                        return Err(EvalError::InvalidFunctionArgument(
                            "escape character must be followed by '%', '_' or itself".to_string(),
                        ));
                    }
                    if pattern[next] == b'%' || pattern[next] == b'_' {
                        items.push(Item::Byte(pattern[next]));
                        i = next + 1;
                        continue;
                    }
                    if pattern[next..].starts_with(esc) {
                        items.extend(esc.iter().copied().map(Item::Byte));
                        i = next + esc.len();
                        continue;
                    }
                    return Err(EvalError::InvalidFunctionArgument(
                        "escape character must be followed by '%', '_' or itself".to_string(),
                    ));
                }
            }
            match pattern[i] {
                b'%' => {
                    // collapse runs of % into one
                    if items.last() != Some(&Item::AnyRun) {
                        items.push(Item::AnyRun);
                    }
                }
                b'_' => items.push(Item::AnyOne),
                byte => items.push(Item::Byte(byte)),
            }
            i += 1;
        }
        Ok(LikeMatcher { items })
    }

    /// Match a subject byte string against the compiled pattern.
    ///
    /// Iterative two-pointer walk with backtracking to the most recent
    /// any-run; linear in practice and never recursive.
    pub fn matches(&self, input: &[u8]) -> bool {
        let items = &self.items;
        let mut si = 0;
        let mut pi = 0;
        let mut backtrack: Option<(usize, usize)> = None;

        while si < input.len() {
            let advance = match items.get(pi) {
                Some(Item::Byte(b)) => *b == input[si],
                Some(Item::AnyOne) => true,
                _ => false,
            };
            if advance {
                si += 1;
                pi += 1;
            } else if let Some(Item::AnyRun) = items.get(pi) {
                backtrack = Some((pi + 1, si));
                pi += 1;
            } else if let Some((restart_pi, run_start)) = backtrack {
                pi = restart_pi;
                si = run_start + 1;
                backtrack = Some((restart_pi, run_start + 1));
            } else {
                return false;
            }
        }
        while let Some(Item::AnyRun) = items.get(pi) {
            pi += 1;
        }
        pi == items.len()
    }

    /// The unescaped literal the pattern reduces to when it has no
    /// wildcards at all
    pub fn as_plain_literal(&self) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match item {
                Item::Byte(b) => out.push(*b),
                _ => return None,
            }
        }
        Some(out)
    }
}

impl Folder<'_> {
    pub(crate) fn fold_like(
        &self,
        node: &Expr,
        value: &Expr,
        pattern: &Expr,
        escape: Option<&Expr>,
    ) -> EvalResult<Folded> {
        let folded_value = self.fold(value)?;
        let folded_pattern = self.fold(pattern)?;
        let folded_escape = escape.map(|e| self.fold(e)).transpose()?;

        // Compile as soon as pattern and escape are constant: escape
        // validation raises here, unconditionally, whatever the subject is.
        let matcher = match (&folded_pattern, &folded_escape) {
            (Folded::Value(ScalarValue::Varchar(p)), None) => {
                Some(LikeMatcher::compile(p, None)?)
            }
            (
                Folded::Value(ScalarValue::Varchar(p)),
                Some(Folded::Value(ScalarValue::Varchar(e))),
            ) => Some(LikeMatcher::compile(p, Some(e.as_slice()))?),
            _ => None,
        };

        // NULL subject, pattern, or escape yields unknown.
        let null_present = [Some(&folded_value), Some(&folded_pattern), folded_escape.as_ref()]
            .into_iter()
            .flatten()
            .any(|f| matches!(f, Folded::Value(v) if v.is_null()));
        if null_present {
            return Ok(Folded::Value(ScalarValue::Null(SqlType::Boolean)));
        }

        if let (Folded::Value(ScalarValue::Varchar(subject)), Some(matcher)) =
            (&folded_value, &matcher)
        {
            return Ok(Folded::Value(ScalarValue::Boolean(matcher.matches(subject))));
        }

        // Symbolic subject with a wildcard-free constant pattern becomes a
        // plain equality, reusable by downstream comparison rules.
        if let Some(matcher) = &matcher {
            if let Some(literal) = matcher.as_plain_literal() {
                if !literal.is_empty() {
                    let residual_value = self.residual(folded_value, value);
                    let literal_id = pattern.id;
                    return Ok(Folded::Residual(Expr::new(
                        node.id,
                        ExprKind::Comparison {
                            op: crate::expression::operator::ComparisonOp::Eq,
                            left: Box::new(residual_value),
                            right: Box::new(Expr::new(
                                literal_id,
                                ExprKind::Literal(ScalarValue::Varchar(literal)),
                            )),
                        },
                    )));
                }
            }
        }

        let residual = Expr::new(
            node.id,
            ExprKind::Like {
                value: Box::new(self.residual(folded_value, value)),
                pattern: Box::new(self.residual(folded_pattern, pattern)),
                escape: match (folded_escape, escape) {
                    (Some(f), Some(original)) => Some(Box::new(self.residual(f, original))),
                    _ => None,
                },
            },
        );
        Ok(Folded::Residual(residual))
    }
}
