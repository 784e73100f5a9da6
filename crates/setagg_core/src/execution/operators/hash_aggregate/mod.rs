pub mod group_states;
pub mod merge;
pub mod state_codec;
pub mod two_phase;

use group_states::{GroupKey, GroupMap, GroupStateStore};
use setagg_error::{DbError, Result};
use tracing::{debug, trace};

use crate::arrays::batch::{AggregateBatch, GlobalGroup};
use crate::config::AggregateConfig;
use crate::functions::aggregate::PhysicalElement;
use crate::functions::aggregate::builtin::set_union::SetUnionBindState;
use crate::functions::bind_state::BindState;

/// Drives SET_UNION over batches of grouped input.
///
/// Rows are routed to their group's state, skipping rows excluded by the
/// filter. Batches may arrive in any number and any split; the finalized
/// output only depends on the union of all rows.
#[derive(Debug)]
pub struct SetUnionAggregator<K, T> {
    bind_state: BindState<SetUnionBindState>,
    store: GroupStateStore<K, T>,
}

impl<K, T> SetUnionAggregator<K, T>
where
    K: GroupKey,
    T: PhysicalElement,
{
    /// Create a new aggregator for a bound SET_UNION.
    ///
    /// Errors if `T` doesn't match the element type the function was bound
    /// with.
    pub fn try_new(
        bind_state: BindState<SetUnionBindState>,
        config: &AggregateConfig,
    ) -> Result<Self> {
        if T::DATATYPE != bind_state.state.element_type {
            return Err(DbError::type_mismatch(
                "Physical element type does not match bound element type",
            )
            .with_field("bound", &bind_state.state.element_type)
            .with_field("physical", T::DATATYPE));
        }

        Ok(SetUnionAggregator {
            bind_state,
            store: GroupStateStore::with_memory_limit(config.memory_limit_elements),
        })
    }

    pub fn bind_state(&self) -> &BindState<SetUnionBindState> {
        &self.bind_state
    }

    pub fn store(&self) -> &GroupStateStore<K, T> {
        &self.store
    }

    /// Update group states using a batch of input.
    ///
    /// A malformed batch is rejected before any state is touched. Any other
    /// error leaves the aggregator unusable, later calls return an error.
    pub fn add_batch(&mut self, batch: &AggregateBatch<K, T>) -> Result<()> {
        batch.validate()?;

        let mut selected = 0;
        for (key, value) in batch.selected_rows() {
            self.store.update(key, value)?;
            selected += 1;
        }

        trace!(
            rows = batch.num_rows(),
            selected,
            groups = self.store.num_groups(),
            "set_union updated states"
        );

        Ok(())
    }

    /// Merge a partial state store computed elsewhere into this aggregator.
    pub fn merge_partial(&mut self, partial: GroupStateStore<K, T>) -> Result<()> {
        self.store.merge_from(partial)
    }

    /// Consume the aggregator, returning the partial states for merging in a
    /// final phase.
    pub fn into_partial(self) -> Result<GroupStateStore<K, T>> {
        self.store.check_poisoned()?;
        Ok(self.store)
    }

    /// Finalize all groups.
    ///
    /// Only groups that had at least one unfiltered row are present in the
    /// output.
    pub fn finalize_all(self) -> Result<GroupMap<K, Vec<Option<T>>>> {
        debug!(
            groups = self.store.num_groups(),
            elements = self.store.num_elements(),
            "finalizing set_union"
        );
        self.store.finalize_all()
    }
}

impl<T> SetUnionAggregator<GlobalGroup, T>
where
    T: PhysicalElement,
{
    /// Finalize an aggregate without groups.
    ///
    /// Always produces a value, even if no rows were seen.
    pub fn finalize_ungrouped(self) -> Result<Vec<Option<T>>> {
        let mut results = self.finalize_all()?;
        Ok(results.remove(&GlobalGroup).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use setagg_error::ErrorKind;

    use super::*;
    use crate::arrays::datatype::DataType;
    use crate::arrays::list::{ListArray, sort_nulls_last};
    use crate::functions::aggregate::builtin::set_union::FUNCTION_SET_SET_UNION;

    fn new_aggregator<K: GroupKey>() -> SetUnionAggregator<K, i32> {
        let bind_state = FUNCTION_SET_SET_UNION
            .bind(&[DataType::list(DataType::Int32)])
            .unwrap();
        SetUnionAggregator::try_new(bind_state, &AggregateConfig::default()).unwrap()
    }

    fn sorted(mut vals: Vec<Option<i32>>) -> Vec<Option<i32>> {
        sort_nulls_last(&mut vals);
        vals
    }

    #[test]
    fn physical_type_mismatch() {
        let bind_state = FUNCTION_SET_SET_UNION
            .bind(&[DataType::list(DataType::Int64)])
            .unwrap();
        let err = SetUnionAggregator::<GlobalGroup, i32>::try_new(
            bind_state,
            &AggregateConfig::default(),
        )
        .unwrap_err();

        assert_eq!(ErrorKind::TypeMismatch, err.kind());
    }

    #[test]
    fn malformed_batch_rejected_before_update() {
        let mut agg = new_aggregator::<i16>();
        let batch = AggregateBatch::new(vec![1, 2, 3], ListArray::from_lists([vec![1], vec![2]]));

        let err = agg.add_batch(&batch).unwrap_err();
        assert_eq!(ErrorKind::MalformedBatch, err.kind());
        assert_eq!(0, agg.store().num_groups());
    }

    #[test]
    fn filtered_only_group_not_created() {
        let mut agg = new_aggregator::<i16>();
        let batch = AggregateBatch::new(
            vec![1, 2, 1],
            ListArray::from_lists([vec![1], vec![2], vec![3]]),
        )
        .with_filter(vec![true, false, false]);

        agg.add_batch(&batch).unwrap();
        assert_eq!(1, agg.store().num_groups());

        let results = agg.finalize_all().unwrap();
        assert_eq!(vec![Some(1)], results[&1]);
        assert!(!results.contains_key(&2));
    }

    #[test]
    fn ungrouped_no_rows() {
        let agg = new_aggregator::<GlobalGroup>();
        assert_eq!(Vec::<Option<i32>>::new(), agg.finalize_ungrouped().unwrap());
    }

    #[test]
    fn ungrouped_multiple_batches() {
        let mut agg = new_aggregator::<GlobalGroup>();
        agg.add_batch(&AggregateBatch::ungrouped(
            ListArray::try_from_json(["[1, 2]", "null"]).unwrap(),
        ))
        .unwrap();
        agg.add_batch(&AggregateBatch::ungrouped(
            ListArray::try_from_json(["[2, null]", "[3]"]).unwrap(),
        ))
        .unwrap();

        assert_eq!(
            vec![Some(1), Some(2), Some(3), None],
            sorted(agg.finalize_ungrouped().unwrap())
        );
    }

    #[test]
    fn merge_partial_from_other_aggregator() {
        let mut a = new_aggregator::<i16>();
        a.add_batch(&AggregateBatch::new(
            vec![1, 2],
            ListArray::try_from_json(["[1]", "null"]).unwrap(),
        ))
        .unwrap();

        let mut b = new_aggregator::<i16>();
        b.add_batch(&AggregateBatch::new(
            vec![2, 3],
            ListArray::try_from_json(["[null, 4]", "null"]).unwrap(),
        ))
        .unwrap();

        a.merge_partial(b.into_partial().unwrap()).unwrap();
        let results = a.finalize_all().unwrap();

        assert_eq!(3, results.len());
        assert_eq!(vec![Some(1)], sorted(results[&1].clone()));
        assert_eq!(vec![Some(4), None], sorted(results[&2].clone()));
        assert_eq!(Vec::<Option<i32>>::new(), results[&3]);
    }

    #[test]
    fn memory_limit_from_config() {
        let bind_state = FUNCTION_SET_SET_UNION
            .bind(&[DataType::list(DataType::Int32)])
            .unwrap();
        let config = AggregateConfig {
            memory_limit_elements: Some(2),
            ..Default::default()
        };
        let mut agg = SetUnionAggregator::<GlobalGroup, i32>::try_new(bind_state, &config).unwrap();

        let err = agg
            .add_batch(&AggregateBatch::ungrouped(ListArray::from_lists([vec![
                1, 2, 3,
            ]])))
            .unwrap_err();
        assert_eq!(ErrorKind::OutOfMemory, err.kind());
    }

    #[test]
    fn out_of_memory_batch_cannot_be_finalized() {
        let bind_state = FUNCTION_SET_SET_UNION
            .bind(&[DataType::list(DataType::Int32)])
            .unwrap();
        let config = AggregateConfig {
            memory_limit_elements: Some(2),
            ..Default::default()
        };

        let mut agg = SetUnionAggregator::<GlobalGroup, i32>::try_new(bind_state, &config).unwrap();
        let batch = AggregateBatch::ungrouped(ListArray::from_lists([vec![1, 2, 3], vec![4]]));
        let err = agg.add_batch(&batch).unwrap_err();
        assert_eq!(ErrorKind::OutOfMemory, err.kind());
        assert!(agg.store().num_elements() <= 2);

        // Later batches are rejected even if they fit.
        let err = agg
            .add_batch(&AggregateBatch::ungrouped(ListArray::from_lists([vec![1]])))
            .unwrap_err();
        assert_eq!(ErrorKind::OutOfMemory, err.kind());

        let err = agg.finalize_ungrouped().unwrap_err();
        assert_eq!(ErrorKind::OutOfMemory, err.kind());
    }

    #[test]
    fn out_of_memory_partial_not_returned() {
        let bind_state = FUNCTION_SET_SET_UNION
            .bind(&[DataType::list(DataType::Int32)])
            .unwrap();
        let config = AggregateConfig {
            memory_limit_elements: Some(1),
            ..Default::default()
        };

        let mut agg = SetUnionAggregator::<i16, i32>::try_new(bind_state, &config).unwrap();
        agg.add_batch(&AggregateBatch::new(
            vec![1, 2],
            ListArray::from_lists([vec![1], vec![2]]),
        ))
        .unwrap_err();

        let err = agg.into_partial().unwrap_err();
        assert_eq!(ErrorKind::OutOfMemory, err.kind());
    }
}
