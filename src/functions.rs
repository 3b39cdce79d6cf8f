//! Scalar function catalog interface.
//!
//! The evaluator invokes functions by name and signature and only needs two
//! facts from the catalog: a native implementation and a determinism flag.
//! Embedders supply their own catalog; [`BuiltinCatalog`] covers a small
//! demonstration set.

pub mod builtins;

pub use builtins::BuiltinCatalog;

use std::fmt;
use std::sync::Arc;

use crate::expression::error::EvalResult;
use crate::types::SqlType;
use crate::value::ScalarValue;

type FunctionImpl = Arc<dyn Fn(&[ScalarValue]) -> EvalResult<ScalarValue> + Send + Sync>;

/// A function resolved for a concrete argument signature
#[derive(Clone)]
pub struct ResolvedFunction {
    name: String,
    return_type: SqlType,
    deterministic: bool,
    implementation: FunctionImpl,
}

impl ResolvedFunction {
    pub fn new(
        name: impl Into<String>,
        return_type: SqlType,
        deterministic: bool,
        implementation: impl Fn(&[ScalarValue]) -> EvalResult<ScalarValue> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            return_type,
            deterministic,
            implementation: Arc::new(implementation),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_type(&self) -> &SqlType {
        &self.return_type
    }

    /// A deterministic call with all-literal arguments may be folded to its
    /// result; a non-deterministic one never folds during optimization.
    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    pub fn invoke(&self, args: &[ScalarValue]) -> EvalResult<ScalarValue> {
        (self.implementation)(args)
    }
}

impl fmt::Debug for ResolvedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedFunction")
            .field("name", &self.name)
            .field("return_type", &self.return_type)
            .field("deterministic", &self.deterministic)
            .finish()
    }
}

/// Lookup seam between the evaluator and the scalar function registry
pub trait FunctionCatalog {
    /// Resolve a function by name and argument types. `None` means the
    /// catalog has no matching signature.
    fn resolve(&self, name: &str, arg_types: &[SqlType]) -> Option<ResolvedFunction>;
}
