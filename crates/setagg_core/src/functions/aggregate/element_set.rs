use std::fmt;
use std::hash::Hash;

use ahash::RandomState;
use hashbrown::HashSet;
use setagg_error::{DbError, Result};

/// Hasher used for element sets.
///
/// Fixed seeds so that the same inputs produce the same internal layout
/// across partitions.
pub const ELEMENT_RANDOM_STATE: RandomState = RandomState::with_seeds(0, 0, 0, 0);

/// A set of distinct list elements along with a flag indicating if a NULL
/// element was ever observed.
#[derive(Clone)]
pub struct ElementSet<T> {
    elements: HashSet<T, RandomState>,
    saw_null: bool,
}

impl<T> ElementSet<T>
where
    T: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        ElementSet {
            elements: HashSet::with_hasher(ELEMENT_RANDOM_STATE),
            saw_null: false,
        }
    }

    /// Number of distinct non-null elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && !self.saw_null
    }

    pub fn saw_null(&self) -> bool {
        self.saw_null
    }

    pub fn contains(&self, value: &T) -> bool {
        self.elements.contains(value)
    }

    /// Add a non-null element, returning true if it wasn't already present.
    ///
    /// The value is only cloned when it gets inserted.
    pub fn add(&mut self, value: &T) -> Result<bool> {
        if self.elements.contains(value) {
            return Ok(false);
        }
        self.insert(value.clone())
    }

    /// Record that a NULL element was seen.
    pub fn add_null(&mut self) {
        self.saw_null = true;
    }

    /// Number of elements in `other` that aren't in this set.
    pub fn count_missing(&self, other: &ElementSet<T>) -> usize {
        other
            .elements
            .iter()
            .filter(|v| !self.elements.contains(*v))
            .count()
    }

    /// Union `other` into this set.
    ///
    /// This set is unchanged if the union cannot be allocated.
    pub fn merge(&mut self, other: ElementSet<T>) -> Result<()> {
        self.merge_reserving(other, 0)
    }

    /// Union `other` into this set, reserving `extra` capacity on top of what
    /// the union needs.
    fn merge_reserving(&mut self, mut other: ElementSet<T>, extra: usize) -> Result<()> {
        // Extend the larger set with the smaller one.
        let swapped = other.elements.len() > self.elements.len();
        if swapped {
            std::mem::swap(&mut self.elements, &mut other.elements);
        }

        let additional = other.elements.len().saturating_add(extra);
        if let Err(e) = self.elements.try_reserve(additional) {
            if swapped {
                std::mem::swap(&mut self.elements, &mut other.elements);
            }
            return Err(DbError::out_of_memory("Failed to grow element set")
                .with_field("len", self.elements.len())
                .with_field("additional", additional)
                .with_field("error", format!("{e:?}")));
        }

        self.elements.extend(other.elements);
        self.saw_null |= other.saw_null;

        Ok(())
    }

    /// Iterate over the distinct non-null elements in no particular order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &T> + '_ {
        self.elements.iter()
    }

    /// Produce the distinct elements in no particular order, with a single
    /// trailing NULL if a NULL element was seen.
    pub fn into_values(self) -> Vec<Option<T>> {
        let mut out = Vec::with_capacity(self.elements.len() + usize::from(self.saw_null));
        out.extend(self.elements.into_iter().map(Some));
        if self.saw_null {
            out.push(None);
        }
        out
    }

    fn insert(&mut self, value: T) -> Result<bool> {
        self.elements.try_reserve(1).map_err(|e| {
            DbError::out_of_memory("Failed to grow element set")
                .with_field("len", self.elements.len())
                .with_field("error", format!("{e:?}"))
        })?;
        Ok(self.elements.insert(value))
    }
}

impl<T> Default for ElementSet<T>
where
    T: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PartialEq for ElementSet<T>
where
    T: Eq + Hash,
{
    fn eq(&self, other: &Self) -> bool {
        self.saw_null == other.saw_null && self.elements == other.elements
    }
}

impl<T> Eq for ElementSet<T> where T: Eq + Hash {}

impl<T> fmt::Debug for ElementSet<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementSet")
            .field("elements", &self.elements)
            .field("saw_null", &self.saw_null)
            .finish()
    }
}
