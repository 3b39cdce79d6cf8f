//! Structural constructs: IN-lists, array/row/map constructors, subscripts.
//!
//! Sibling lists are processed with plain loops so a 10,000-element
//! constructor costs one stack frame, and IN-list folding stays linear in
//! the candidate count (constant dedup goes through a rendered-key hash
//! set, never a quadratic rescan).

use std::collections::HashSet;

use crate::expression::error::{EvalError, EvalResult};
use crate::expression::expr::{Expr, ExprKind};
use crate::types::SqlType;
use crate::value::{equal_values, map_lookup, ScalarValue};

use super::core::{Folded, Folder};

impl Folder<'_> {
    /// IN-list: candidates partition into constants and symbolic entries.
    /// With a constant probe, constants are tested by three-valued equality
    /// (any match wins, a null comparison is remembered); the residual keeps
    /// the probe as a literal, the surviving symbolic entries, and a null
    /// literal when unknown dominance must be preserved.
    pub(crate) fn fold_in_list(
        &self,
        node: &Expr,
        value: &Expr,
        list: &[Expr],
        negated: bool,
    ) -> EvalResult<Folded> {
        let probe = self.fold(value)?;
        let mut folded_list = Vec::with_capacity(list.len());
        for item in list {
            folded_list.push(self.fold(item)?);
        }

        match probe {
            Folded::Value(probe_value) if probe_value.is_null() => {
                Ok(Folded::Value(ScalarValue::Null(SqlType::Boolean)))
            }

            Folded::Value(probe_value) => {
                let mut saw_null = false;
                let mut symbolic: Vec<Expr> = Vec::new();
                for folded in folded_list {
                    match folded {
                        Folded::Value(candidate) if candidate.is_null() => saw_null = true,
                        Folded::Value(candidate) => {
                            match equal_values(&probe_value, &candidate)? {
                                Some(true) => {
                                    return Ok(Folded::Value(ScalarValue::Boolean(!negated)))
                                }
                                Some(false) => {}
                                None => saw_null = true,
                            }
                        }
                        Folded::Residual(residual) => symbolic.push(residual),
                    }
                }

                if symbolic.is_empty() {
                    let outcome = if saw_null {
                        ScalarValue::Null(SqlType::Boolean)
                    } else {
                        ScalarValue::Boolean(negated)
                    };
                    return Ok(Folded::Value(outcome));
                }

                let mut new_list = symbolic;
                if saw_null {
                    // keep unknown dominance: x IN (..., null) is unknown
                    // unless a match is found
                    new_list.push(Expr::new(
                        self.synthetic_id(),
                        ExprKind::Literal(ScalarValue::Null(probe_value.sql_type())),
                    ));
                }
                Ok(Folded::Residual(Expr::new(
                    node.id,
                    ExprKind::InList {
                        value: Box::new(Expr::new(value.id, ExprKind::Literal(probe_value))),
                        list: new_list,
                        negated,
                    },
                )))
            }

            Folded::Residual(probe_residual) => {
                // symbolic probe: deduplicate constant candidates, keep the
                // node; rendered literals key the hash set so the pass stays
                // linear
                let mut seen = HashSet::new();
                let mut new_list = Vec::with_capacity(folded_list.len());
                for (folded, original) in folded_list.into_iter().zip(list.iter()) {
                    match folded {
                        Folded::Value(candidate) => {
                            if seen.insert(candidate.to_string()) {
                                new_list
                                    .push(Expr::new(original.id, ExprKind::Literal(candidate)));
                            }
                        }
                        Folded::Residual(residual) => new_list.push(residual),
                    }
                }
                Ok(Folded::Residual(Expr::new(
                    node.id,
                    ExprKind::InList {
                        value: Box::new(probe_residual),
                        list: new_list,
                        negated,
                    },
                )))
            }
        }
    }

    /// Array constructor: element-wise fold; fully constant only when every
    /// element folds. Symbolic elements are promoted to the declared element
    /// type with explicit casts.
    pub(crate) fn fold_array(&self, node: &Expr, elements: &[Expr]) -> EvalResult<Folded> {
        let element_type = match self.types.resolve(node)? {
            SqlType::Array(element) => *element,
            other => {
                return Err(EvalError::TypeMismatch(format!(
                    "array constructor typed as {}",
                    other
                )))
            }
        };

        let mut folded_elements = Vec::with_capacity(elements.len());
        let mut all_constant = true;
        for element in elements {
            let folded = self.fold(element)?;
            all_constant = all_constant && folded.as_value().is_some();
            folded_elements.push(folded);
        }

        if all_constant {
            let mut values = Vec::with_capacity(folded_elements.len());
            for folded in folded_elements {
                if let Folded::Value(v) = folded {
                    values.push(self.coerce_value(v, &element_type)?);
                }
            }
            return Ok(Folded::Value(ScalarValue::Array {
                elements: values,
                element_type,
            }));
        }

        let mut new_elements = Vec::with_capacity(folded_elements.len());
        for (folded, original) in folded_elements.into_iter().zip(elements.iter()) {
            let expr = self.residual(folded, original);
            new_elements.push(self.coerce_residual(expr, &element_type)?);
        }
        Ok(Folded::Residual(Expr::new(
            node.id,
            ExprKind::ArrayConstructor(new_elements),
        )))
    }

    /// Row constructor: element-wise fold; fields keep their own types
    pub(crate) fn fold_row(&self, node: &Expr, fields: &[Expr]) -> EvalResult<Folded> {
        let mut folded_fields = Vec::with_capacity(fields.len());
        let mut all_constant = true;
        for field in fields {
            let folded = self.fold(field)?;
            all_constant = all_constant && folded.as_value().is_some();
            folded_fields.push(folded);
        }

        if all_constant {
            let values = folded_fields
                .into_iter()
                .filter_map(Folded::into_value)
                .collect();
            return Ok(Folded::Value(ScalarValue::Row(values)));
        }

        let new_fields = folded_fields
            .into_iter()
            .zip(fields.iter())
            .map(|(folded, original)| self.residual(folded, original))
            .collect();
        Ok(Folded::Residual(Expr::new(
            node.id,
            ExprKind::RowConstructor(new_fields),
        )))
    }

    /// Map constructor over parallel key/value lists. Null keys are
    /// rejected; a duplicate constant key follows the entry-list policy
    /// (insertion order, last occurrence wins) rather than being
    /// deduplicated here.
    pub(crate) fn fold_map(&self, node: &Expr, keys: &[Expr], values: &[Expr]) -> EvalResult<Folded> {
        if keys.len() != values.len() {
            return Err(EvalError::InvalidMapKey(format!(
                "{} keys for {} values",
                keys.len(),
                values.len()
            )));
        }
        let (key_type, value_type) = match self.types.resolve(node)? {
            SqlType::Map(k, v) => (*k, *v),
            other => {
                return Err(EvalError::TypeMismatch(format!(
                    "map constructor typed as {}",
                    other
                )))
            }
        };

        let mut folded_keys = Vec::with_capacity(keys.len());
        let mut folded_values = Vec::with_capacity(values.len());
        let mut all_constant = true;
        for key in keys {
            let folded = self.fold(key)?;
            all_constant = all_constant && folded.as_value().is_some();
            folded_keys.push(folded);
        }
        for value in values {
            let folded = self.fold(value)?;
            all_constant = all_constant && folded.as_value().is_some();
            folded_values.push(folded);
        }

        if all_constant {
            let mut entries: Vec<(ScalarValue, ScalarValue)> = Vec::with_capacity(keys.len());
            for (key, value) in folded_keys.into_iter().zip(folded_values.into_iter()) {
                let (Folded::Value(key), Folded::Value(value)) = (key, value) else {
                    continue;
                };
                if key.is_null() {
                    return Err(EvalError::InvalidMapKey("map key cannot be NULL".to_string()));
                }
                let key = self.coerce_value(key, &key_type)?;
                let value = self.coerce_value(value, &value_type)?;
                if let Some(existing) = position_of_key(&entries, &key)? {
                    entries[existing].1 = value;
                } else {
                    entries.push((key, value));
                }
            }
            return Ok(Folded::Value(ScalarValue::Map {
                entries,
                key_type,
                value_type,
            }));
        }

        let new_keys = folded_keys
            .into_iter()
            .zip(keys.iter())
            .map(|(folded, original)| self.residual(folded, original))
            .collect();
        let new_values = folded_values
            .into_iter()
            .zip(values.iter())
            .map(|(folded, original)| self.residual(folded, original))
            .collect();
        Ok(Folded::Residual(Expr::new(
            node.id,
            ExprKind::MapConstructor {
                keys: new_keys,
                values: new_values,
            },
        )))
    }

    /// Subscript: unconditional at its position. Constant bad indices and
    /// absent constant map keys raise immediately; a null base or index
    /// yields null.
    pub(crate) fn fold_subscript(&self, node: &Expr, base: &Expr, index: &Expr) -> EvalResult<Folded> {
        let folded_base = self.fold(base)?;
        let folded_index = self.fold(index)?;
        match (&folded_base, &folded_index) {
            (Folded::Value(base_value), Folded::Value(index_value)) => {
                if base_value.is_null() || index_value.is_null() {
                    return Ok(Folded::Value(ScalarValue::Null(self.types.resolve(node)?)));
                }
                let out = match base_value {
                    ScalarValue::Array { elements, .. } => {
                        let position = integral_index(index_value)?;
                        element_at(elements, position, "array")?
                    }
                    ScalarValue::Row(fields) => {
                        let position = integral_index(index_value)?;
                        element_at(fields, position, "row")?
                    }
                    ScalarValue::Map { entries, .. } => match map_lookup(entries, index_value)? {
                        Some(value) => value.clone(),
                        None => {
                            return Err(EvalError::InvalidMapKey(format!(
                                "key {} not present in map",
                                index_value
                            )))
                        }
                    },
                    other => {
                        return Err(EvalError::TypeMismatch(format!(
                            "cannot subscript {}",
                            other.sql_type()
                        )))
                    }
                };
                Ok(Folded::Value(out))
            }
            _ => Ok(Folded::Residual(Expr::new(
                node.id,
                ExprKind::Subscript {
                    base: Box::new(self.residual(folded_base, base)),
                    index: Box::new(self.residual(folded_index, index)),
                },
            ))),
        }
    }
}

fn position_of_key(
    entries: &[(ScalarValue, ScalarValue)],
    key: &ScalarValue,
) -> EvalResult<Option<usize>> {
    for (i, (existing, _)) in entries.iter().enumerate() {
        if crate::value::identical_values(existing, key)? {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

fn integral_index(value: &ScalarValue) -> EvalResult<i64> {
    match value {
        ScalarValue::Integer(n) => Ok(*n as i64),
        ScalarValue::Bigint(n) => Ok(*n),
        other => Err(EvalError::TypeMismatch(format!(
            "subscript index must be an integer, got {}",
            other.sql_type()
        ))),
    }
}

fn element_at(elements: &[ScalarValue], position: i64, kind: &str) -> EvalResult<ScalarValue> {
    if position <= 0 {
        return Err(EvalError::InvalidArrayIndex(format!(
            "{} index {} is not positive",
            kind, position
        )));
    }
    elements
        .get(position as usize - 1)
        .cloned()
        .ok_or_else(|| {
            EvalError::InvalidArrayIndex(format!(
                "{} index {} out of bounds for {} elements",
                kind,
                position,
                elements.len()
            ))
        })
}
