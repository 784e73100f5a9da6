use std::fmt::Debug;
use std::hash::Hash;

use setagg_error::{DbError, Result};

use crate::arrays::datatype::{DataType, DataTypeId};
use crate::functions::Signature;
use crate::functions::aggregate::AggregateState;
use crate::functions::aggregate::element_set::ElementSet;
use crate::functions::bind_state::BindState;
use crate::functions::documentation::{Category, Documentation, Example};
use crate::functions::function_set::{AggregateFunctionSet, RawAggregateFunction};

pub const FUNCTION_SET_SET_UNION: AggregateFunctionSet<SetUnionBindState> = AggregateFunctionSet {
    name: "set_union",
    aliases: &[],
    doc: &[&Documentation {
        category: Category::GENERAL_PURPOSE_AGGREGATE,
        description: "Returns an array of all distinct elements from the input arrays. \
                      Includes a single NULL if any input array contained a NULL element. \
                      NULL arrays are ignored.",
        arguments: &["array"],
        example: Some(Example {
            example: "set_union(a)",
            output: "[1, 2, 3]",
        }),
    }],
    functions: &[RawAggregateFunction::new(
        &Signature::new(&[DataTypeId::List], DataTypeId::List),
        SetUnion::bind,
    )],
};

#[derive(Debug, Clone, Copy)]
pub struct SetUnion;

/// Element type the aggregate was bound with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetUnionBindState {
    pub element_type: DataType,
}

impl SetUnion {
    pub fn bind(inputs: &[DataType]) -> Result<BindState<SetUnionBindState>> {
        if inputs.len() != 1 {
            return Err(
                DbError::type_mismatch("set_union expects exactly one argument")
                    .with_field("num_args", inputs.len()),
            );
        }

        let meta = inputs[0].try_get_list_type_meta()?;
        let element_type = meta.datatype.as_ref().clone();

        if !element_type.is_set_element() {
            return Err(DbError::type_mismatch(format!(
                "set_union does not support element type {element_type}"
            )));
        }

        Ok(BindState {
            state: SetUnionBindState {
                element_type: element_type.clone(),
            },
            return_type: DataType::list(element_type),
            inputs: inputs.to_vec(),
        })
    }
}

/// Per-group state for SET_UNION.
///
/// A group is `Absent` until it receives its first non-null array. NULL
/// arrays never change the state, so a group fed only NULL arrays finalizes
/// to an empty array instead of one containing a NULL.
#[derive(Debug, Clone)]
pub enum SetUnionState<T> {
    Absent,
    Present(ElementSet<T>),
}

impl<T> Default for SetUnionState<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> SetUnionState<T>
where
    T: Eq + Hash + Clone,
{
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Number of distinct non-null elements held by this state.
    pub fn num_elements(&self) -> usize {
        match self {
            Self::Absent => 0,
            Self::Present(set) => set.len(),
        }
    }

    pub fn element_set(&self) -> Option<&ElementSet<T>> {
        match self {
            Self::Absent => None,
            Self::Present(set) => Some(set),
        }
    }
}

impl<T> SetUnionState<T>
where
    T: Eq + Hash + Clone + Debug,
{
    /// Update with a single list value, failing before the insert that would
    /// add more than `max_new` distinct elements.
    ///
    /// The state should be discarded after an error.
    pub fn update_limited(
        &mut self,
        input: Option<&[Option<T>]>,
        max_new: Option<usize>,
    ) -> Result<()> {
        let values = match input {
            Some(values) => values,
            None => return Ok(()),
        };

        if let Self::Absent = self {
            *self = Self::Present(ElementSet::new());
        }

        if let Self::Present(set) = self {
            let mut added = 0;
            for value in values {
                match value {
                    Some(value) => {
                        if set.contains(value) {
                            continue;
                        }
                        if max_new.is_some_and(|max| added >= max) {
                            return Err(DbError::out_of_memory(
                                "Aggregate state exceeded the element memory limit",
                            )
                            .with_field("added", added));
                        }
                        set.add(value)?;
                        added += 1;
                    }
                    None => set.add_null(),
                }
            }
        }

        Ok(())
    }

    /// Merge `other` into this state, failing without modifying either state
    /// if more than `max_new` distinct elements would be added.
    pub fn merge_limited(&mut self, other: &mut Self, max_new: Option<usize>) -> Result<()> {
        if let Some(max) = max_new {
            let new_elements = match (&*self, &*other) {
                (_, Self::Absent) => 0,
                (Self::Absent, Self::Present(other_set)) => other_set.len(),
                (Self::Present(set), Self::Present(other_set)) => set.count_missing(other_set),
            };
            if new_elements > max {
                return Err(DbError::out_of_memory(
                    "Aggregate state exceeded the element memory limit",
                )
                .with_field("new_elements", new_elements)
                .with_field("allowed", max));
            }
        }

        match std::mem::take(other) {
            Self::Absent => Ok(()),
            Self::Present(other_set) => match self {
                Self::Absent => {
                    *self = Self::Present(other_set);
                    Ok(())
                }
                Self::Present(set) => set.merge(other_set),
            },
        }
    }
}

impl<T> AggregateState<Option<&[Option<T>]>, Vec<Option<T>>> for SetUnionState<T>
where
    T: Eq + Hash + Clone + Debug,
{
    fn merge(&mut self, other: &mut Self) -> Result<()> {
        self.merge_limited(other, None)
    }

    fn update(&mut self, input: Option<&[Option<T>]>) -> Result<()> {
        self.update_limited(input, None)
    }

    fn finalize(&mut self) -> Result<Vec<Option<T>>> {
        match std::mem::take(self) {
            Self::Absent => Ok(Vec::new()),
            Self::Present(set) => Ok(set.into_values()),
        }
    }
}
