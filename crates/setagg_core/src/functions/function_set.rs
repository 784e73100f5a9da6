use setagg_error::{DbError, Result};

use super::Signature;
use super::bind_state::BindState;
use super::documentation::Documentation;
use crate::arrays::datatype::DataType;

/// A single aggregate function variant.
#[derive(Debug, Clone, Copy)]
pub struct RawAggregateFunction<S: 'static> {
    pub signature: &'static Signature,
    /// Bind the function to concrete input types.
    pub bind: fn(inputs: &[DataType]) -> Result<BindState<S>>,
}

impl<S> RawAggregateFunction<S> {
    pub const fn new(
        signature: &'static Signature,
        bind: fn(inputs: &[DataType]) -> Result<BindState<S>>,
    ) -> Self {
        RawAggregateFunction { signature, bind }
    }
}

/// A named set of aggregate function variants.
#[derive(Debug, Clone, Copy)]
pub struct AggregateFunctionSet<S: 'static> {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub doc: &'static [&'static Documentation],
    pub functions: &'static [RawAggregateFunction<S>],
}

impl<S> AggregateFunctionSet<S> {
    /// If this function set is referenced by `name`, case insensitive.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    /// Bind to the first variant whose signature matches the input types.
    ///
    /// Errors with a type mismatch if no variant accepts the inputs.
    pub fn bind(&self, inputs: &[DataType]) -> Result<BindState<S>> {
        let func = self
            .functions
            .iter()
            .find(|f| f.signature.exact_match(inputs))
            .ok_or_else(|| {
                let types = inputs
                    .iter()
                    .map(|dt| dt.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                DbError::type_mismatch(format!(
                    "No function matches '{}({types})'",
                    self.name
                ))
            })?;

        (func.bind)(inputs)
    }
}
