use rayon::prelude::*;
use setagg_error::{DbError, Result};
use tracing::debug;

use super::group_states::{GroupKey, GroupStateStore};
use crate::functions::aggregate::PhysicalElement;

/// Combines partial state stores produced by independent partitions.
///
/// Each store is owned by the merger once pushed. Merging never shares a
/// mutable store between threads, parallel merging combines owned stores
/// pairwise.
#[derive(Debug)]
pub struct PartialMerger<K, T> {
    partials: Vec<GroupStateStore<K, T>>,
    memory_limit: Option<usize>,
}

impl<K, T> PartialMerger<K, T>
where
    K: GroupKey,
    T: PhysicalElement,
{
    pub fn new(memory_limit: Option<usize>) -> Self {
        PartialMerger {
            partials: Vec::new(),
            memory_limit,
        }
    }

    pub fn push(&mut self, partial: GroupStateStore<K, T>) {
        self.partials.push(partial)
    }

    pub fn num_partials(&self) -> usize {
        self.partials.len()
    }

    /// Merge all partials into a single store on the current thread.
    pub fn finish(self) -> Result<GroupStateStore<K, T>> {
        let num_partials = self.partials.len();
        let mut out = GroupStateStore::with_memory_limit(self.memory_limit);
        for partial in self.partials {
            out.merge_from(partial)?;
        }

        debug!(
            num_partials,
            groups = out.num_groups(),
            elements = out.num_elements(),
            "merged partial set_union states"
        );

        Ok(out)
    }

    /// Merge all partials using a parallel tree reduction.
    ///
    /// Produces the same groups and elements as `finish` since merging is
    /// associative and commutative.
    pub fn finish_parallel(self) -> Result<GroupStateStore<K, T>> {
        let num_partials = self.partials.len();
        let memory_limit = self.memory_limit;

        let merged = self
            .partials
            .into_par_iter()
            .map(Ok::<_, DbError>)
            .try_reduce(
                || GroupStateStore::with_memory_limit(memory_limit),
                |mut left, right| {
                    left.merge_from(right)?;
                    Ok(left)
                },
            )?;

        // Reduced stores may not carry the limit, recheck against it.
        let mut out = GroupStateStore::with_memory_limit(memory_limit);
        out.merge_from(merged)?;

        debug!(
            num_partials,
            groups = out.num_groups(),
            elements = out.num_elements(),
            "merged partial set_union states in parallel"
        );

        Ok(out)
    }
}
