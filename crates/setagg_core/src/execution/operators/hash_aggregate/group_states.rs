use std::fmt::Debug;
use std::hash::Hash;

use ahash::RandomState;
use hashbrown::HashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use setagg_error::{DbError, ErrorKind, OptionExt, Result};

use crate::functions::aggregate::builtin::set_union::SetUnionState;
use crate::functions::aggregate::{AggregateState, PhysicalElement};

pub const GROUP_RANDOM_STATE: RandomState = RandomState::with_seeds(1, 2, 3, 4);

/// Hash map keyed by group identity.
pub type GroupMap<K, V> = HashMap<K, V, RandomState>;

/// Identity of a group as produced by the grouping driver.
///
/// Never interpreted, only compared and hashed.
pub trait GroupKey:
    Eq + Hash + Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

impl<K> GroupKey for K where
    K: Eq + Hash + Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

/// Aggregate states for every group observed so far.
///
/// Not internally synchronized. Parallel aggregation builds one store per
/// partition and combines them with `merge_from`.
///
/// Any failed update or merge poisons the store. Every later operation on a
/// poisoned store returns an error so that a partially applied batch can never
/// be finalized.
#[derive(Debug, Clone)]
pub struct GroupStateStore<K, T> {
    states: GroupMap<K, SetUnionState<T>>,
    /// Distinct elements summed across all groups.
    num_elements: usize,
    /// Max number of distinct elements this store may hold.
    memory_limit: Option<usize>,
    /// Kind of the error that poisoned this store.
    poisoned: Option<ErrorKind>,
}

impl<K, T> GroupStateStore<K, T>
where
    K: GroupKey,
    T: PhysicalElement,
{
    pub fn new() -> Self {
        Self::with_memory_limit(None)
    }

    pub fn with_memory_limit(memory_limit: Option<usize>) -> Self {
        GroupStateStore {
            states: HashMap::with_hasher(GROUP_RANDOM_STATE),
            num_elements: 0,
            memory_limit,
            poisoned: None,
        }
    }

    pub fn num_groups(&self) -> usize {
        self.states.len()
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn memory_limit(&self) -> Option<usize> {
        self.memory_limit
    }

    pub fn get(&self, key: &K) -> Option<&SetUnionState<T>> {
        self.states.get(key)
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Get the state for `key`, creating an absent state if this is the
    /// first time the group has been seen.
    pub fn get_or_create(&mut self, key: &K) -> Result<&mut SetUnionState<T>> {
        self.check_poisoned()?;
        if !self.states.contains_key(key) {
            if let Err(e) = self.states.try_reserve(1) {
                let err = DbError::out_of_memory("Failed to grow group states")
                    .with_field("groups", self.states.len())
                    .with_field("error", format!("{e:?}"));
                self.poisoned = Some(err.kind());
                return Err(err);
            }
            self.states.insert(key.clone(), SetUnionState::Absent);
        }

        self.states
            .get_mut(key)
            .required("Group state missing after insert")
    }

    /// Update the state for `key` with a single list value.
    ///
    /// Fails before inserting an element that would exceed the memory limit.
    pub fn update(&mut self, key: &K, value: Option<&[Option<T>]>) -> Result<()> {
        let result = self.try_update(key, value);
        self.poison_on_error(result)
    }

    /// Visit every group and its state in no particular order.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &SetUnionState<T>),
    {
        for (key, state) in &self.states {
            visit(key, state)
        }
    }

    /// Merge all groups from `other` into this store.
    ///
    /// Groups only present in `other` are created. The outcome doesn't depend
    /// on the order in which stores are merged.
    pub fn merge_from(&mut self, other: GroupStateStore<K, T>) -> Result<()> {
        other.check_poisoned()?;
        let result = self.try_merge_from(other);
        self.poison_on_error(result)
    }

    /// Finalize every group, consuming the store.
    pub fn finalize_all(self) -> Result<GroupMap<K, Vec<Option<T>>>> {
        self.check_poisoned()?;

        let mut out = HashMap::with_capacity_and_hasher(self.states.len(), GROUP_RANDOM_STATE);
        for (key, mut state) in self.states {
            let values = state.finalize()?;
            out.insert(key, values);
        }
        Ok(out)
    }

    /// Error if an earlier operation on this store failed.
    pub fn check_poisoned(&self) -> Result<()> {
        match self.poisoned {
            Some(kind) => Err(DbError::new(
                "Aggregate state cannot be used after an earlier failure",
            )
            .with_kind(kind)),
            None => Ok(()),
        }
    }

    fn try_update(&mut self, key: &K, value: Option<&[Option<T>]>) -> Result<()> {
        let num_elements = self.num_elements;
        let memory_limit = self.memory_limit;
        let remaining = self.remaining();

        let state = self.get_or_create(key)?;
        let before = state.num_elements();
        let result = state.update_limited(value, remaining);
        let added = state.num_elements() - before;

        self.num_elements += added;
        result.map_err(|e| Self::with_limit_fields(e, num_elements + added, memory_limit))
    }

    fn try_merge_from(&mut self, other: GroupStateStore<K, T>) -> Result<()> {
        self.check_poisoned()?;

        for (key, mut other_state) in other.states {
            let num_elements = self.num_elements;
            let memory_limit = self.memory_limit;
            let remaining = self.remaining();

            let state = self.get_or_create(&key)?;
            let before = state.num_elements();
            let result = state.merge_limited(&mut other_state, remaining);
            let added = state.num_elements() - before;

            self.num_elements += added;
            result.map_err(|e| Self::with_limit_fields(e, num_elements + added, memory_limit))?;
        }

        Ok(())
    }

    /// Distinct elements that can still be added before hitting the limit.
    fn remaining(&self) -> Option<usize> {
        self.memory_limit
            .map(|limit| limit.saturating_sub(self.num_elements))
    }

    fn with_limit_fields(err: DbError, elements: usize, limit: Option<usize>) -> DbError {
        match limit {
            Some(limit) if err.kind() == ErrorKind::OutOfMemory => err
                .with_field("elements", elements)
                .with_field("limit", limit),
            _ => err,
        }
    }

    fn poison_on_error<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(err) = &result {
            if self.poisoned.is_none() {
                self.poisoned = Some(err.kind());
            }
        }
        result
    }
}

impl<K, T> Default for GroupStateStore<K, T>
where
    K: GroupKey,
    T: PhysicalElement,
{
    fn default() -> Self {
        Self::new()
    }
}
