use std::ops::Range;

use serde::{Deserialize, Serialize};
use setagg_error::{DbError, OptionExt, Result};

use super::list::ListArray;

/// Group key used when aggregating without a GROUP BY.
///
/// All rows map to this single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GlobalGroup;

/// A batch of input rows for an aggregate.
///
/// Every row has a group id (produced by the grouping driver), a list value,
/// and an optional filter value. Rows with a false filter value must not
/// contribute to the aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateBatch<K, T> {
    pub group_ids: Vec<K>,
    pub values: ListArray<T>,
    pub filter: Option<Vec<bool>>,
}

impl<K, T> AggregateBatch<K, T> {
    pub fn new(group_ids: Vec<K>, values: ListArray<T>) -> Self {
        AggregateBatch {
            group_ids,
            values,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Vec<bool>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn num_rows(&self) -> usize {
        self.values.len()
    }

    /// Check that all columns in the batch have the same length.
    pub fn validate(&self) -> Result<()> {
        if self.group_ids.len() != self.values.len() {
            return Err(DbError::malformed_batch(
                "Group ids and list values have different lengths",
            )
            .with_field("group_ids", self.group_ids.len())
            .with_field("values", self.values.len()));
        }

        if let Some(filter) = &self.filter {
            if filter.len() != self.values.len() {
                return Err(DbError::malformed_batch(
                    "Filter and list values have different lengths",
                )
                .with_field("filter", filter.len())
                .with_field("values", self.values.len()));
            }
        }

        Ok(())
    }

    /// Iterate rows that pass the filter.
    ///
    /// Rows past the end of a short filter are treated as filtered out. Call
    /// `validate` first to reject such batches.
    pub fn selected_rows(&self) -> impl Iterator<Item = (&K, Option<&[Option<T>]>)> + '_ {
        let filter = self.filter.as_deref();
        self.group_ids
            .iter()
            .zip(self.values.iter())
            .enumerate()
            .filter(move |(idx, _)| filter.is_none_or(|f| f.get(*idx) == Some(&true)))
            .map(|(_, row)| row)
    }
}

impl<K, T> AggregateBatch<K, T>
where
    K: Clone,
    T: Clone,
{
    /// Copy the rows in `range` into a new batch, keeping their filter
    /// values.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        let group_ids = self
            .group_ids
            .get(range.clone())
            .required("Slice out of bounds for group ids")?
            .to_vec();
        let values = self
            .values
            .slice(range.clone())
            .required("Slice out of bounds for list values")?;
        let filter = match &self.filter {
            Some(filter) => Some(
                filter
                    .get(range)
                    .required("Slice out of bounds for filter")?
                    .to_vec(),
            ),
            None => None,
        };

        Ok(AggregateBatch {
            group_ids,
            values,
            filter,
        })
    }
}

impl<T> AggregateBatch<GlobalGroup, T> {
    /// Create a batch where all rows belong to the single global group.
    pub fn ungrouped(values: ListArray<T>) -> Self {
        AggregateBatch {
            group_ids: vec![GlobalGroup; values.len()],
            values,
            filter: None,
        }
    }
}
