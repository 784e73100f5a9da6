use rayon::prelude::*;
use setagg_error::{DbError, Result};
use tracing::debug;

use super::SetUnionAggregator;
use super::group_states::{GroupKey, GroupMap, GroupStateStore};
use super::merge::PartialMerger;
use super::state_codec::{decode_state, encode_state};
use crate::arrays::batch::{AggregateBatch, GlobalGroup};
use crate::config::AggregateConfig;
use crate::functions::aggregate::PhysicalElement;
use crate::functions::aggregate::builtin::set_union::SetUnionBindState;
use crate::functions::bind_state::BindState;

/// Runs SET_UNION as a partial phase followed by a final phase.
///
/// Input is cut into chunks of at most `batch_size` rows which are handed
/// out round-robin to `partitions` partial aggregators running on the rayon
/// pool. The final phase merges every partial state and finalizes.
#[derive(Debug, Clone)]
pub struct TwoPhaseSetUnion {
    bind_state: BindState<SetUnionBindState>,
    config: AggregateConfig,
    /// Round trip partial states through their encoded form before merging.
    encode_partials: bool,
}

impl TwoPhaseSetUnion {
    pub fn new(bind_state: BindState<SetUnionBindState>, config: AggregateConfig) -> Self {
        TwoPhaseSetUnion {
            bind_state,
            config,
            encode_partials: false,
        }
    }

    pub fn with_encoded_partials(mut self, encode: bool) -> Self {
        self.encode_partials = encode;
        self
    }

    pub fn config(&self) -> &AggregateConfig {
        &self.config
    }

    /// Aggregate all batches, returning the finalized array for every group
    /// with at least one unfiltered row.
    pub fn execute<K, T>(
        &self,
        batches: &[AggregateBatch<K, T>],
    ) -> Result<GroupMap<K, Vec<Option<T>>>>
    where
        K: GroupKey,
        T: PhysicalElement,
    {
        let inputs = self.distribute(batches)?;

        let partials = inputs
            .into_par_iter()
            .map(|chunks| self.partial_phase(chunks))
            .collect::<Result<Vec<_>>>()?;

        let mut merger = PartialMerger::new(self.config.memory_limit_elements);
        for partial in partials {
            merger.push(partial);
        }
        let merged = merger.finish_parallel()?;

        debug!(
            partitions = self.config.partitions,
            encoded = self.encode_partials,
            groups = merged.num_groups(),
            "set_union final phase"
        );

        let mut final_agg = SetUnionAggregator::try_new(self.bind_state.clone(), &self.config)?;
        final_agg.merge_partial(merged)?;
        final_agg.finalize_all()
    }

    /// Split batches into chunks and assign them to partitions.
    ///
    /// Every batch is validated up front so that a malformed batch fails the
    /// whole aggregate before any partition starts.
    fn distribute<K, T>(
        &self,
        batches: &[AggregateBatch<K, T>],
    ) -> Result<Vec<Vec<AggregateBatch<K, T>>>>
    where
        K: GroupKey,
        T: PhysicalElement,
    {
        if self.config.partitions == 0 || self.config.batch_size == 0 {
            return Err(DbError::invalid_state(
                "Partitions and batch size must be greater than zero",
            )
            .with_field("partitions", self.config.partitions)
            .with_field("batch_size", self.config.batch_size));
        }

        for batch in batches {
            batch.validate()?;
        }

        let mut inputs: Vec<Vec<AggregateBatch<K, T>>> =
            (0..self.config.partitions).map(|_| Vec::new()).collect();

        let mut next = 0;
        for batch in batches {
            let num_rows = batch.num_rows();
            for start in (0..num_rows).step_by(self.config.batch_size) {
                let end = usize::min(start + self.config.batch_size, num_rows);
                inputs[next].push(batch.slice(start..end)?);
                next = (next + 1) % self.config.partitions;
            }
        }

        Ok(inputs)
    }

    fn partial_phase<K, T>(&self, chunks: Vec<AggregateBatch<K, T>>) -> Result<GroupStateStore<K, T>>
    where
        K: GroupKey,
        T: PhysicalElement,
    {
        let mut agg = SetUnionAggregator::try_new(self.bind_state.clone(), &self.config)?;
        for chunk in &chunks {
            agg.add_batch(chunk)?;
        }
        let partial = agg.into_partial()?;

        if !self.encode_partials {
            return Ok(partial);
        }

        let blob = encode_state(&partial)?;
        decode_state(&blob, self.config.memory_limit_elements)
    }

    /// Aggregate without groups.
    ///
    /// Produces an empty array if there were no unfiltered rows.
    pub fn execute_ungrouped<T>(&self, batches: &[AggregateBatch<GlobalGroup, T>]) -> Result<Vec<Option<T>>>
    where
        T: PhysicalElement,
    {
        let mut results = self.execute(batches)?;
        Ok(results.remove(&GlobalGroup).unwrap_or_default())
    }
}
