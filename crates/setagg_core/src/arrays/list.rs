use std::cmp::Ordering;
use std::ops::Range;

use serde::de::DeserializeOwned;
use setagg_error::{Result, ResultExt};

/// A column of list values.
///
/// A row may be a NULL list, or a list that contains NULL elements. Both are
/// represented and kept distinct.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListArray<T> {
    values: Vec<Option<Vec<Option<T>>>>,
}

impl<T> ListArray<T> {
    pub fn new(values: Vec<Option<Vec<Option<T>>>>) -> Self {
        ListArray { values }
    }

    /// Create an array where every row is a non-null list with no null
    /// elements.
    pub fn from_lists<I, L>(lists: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: IntoIterator<Item = T>,
    {
        let values = lists
            .into_iter()
            .map(|list| Some(list.into_iter().map(Some).collect()))
            .collect();
        ListArray { values }
    }

    /// Create an array of `len` null lists.
    pub fn all_null(len: usize) -> Self {
        ListArray {
            values: (0..len).map(|_| None).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_valid(&self, idx: usize) -> bool {
        matches!(self.values.get(idx), Some(Some(_)))
    }

    /// Get the list at `idx`.
    ///
    /// Returns None if the index is out of bounds, and `Some(None)` if the row
    /// holds a NULL list.
    pub fn get(&self, idx: usize) -> Option<Option<&[Option<T>]>> {
        self.values.get(idx).map(|v| v.as_deref())
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Option<&[Option<T>]>> + '_ {
        self.values.iter().map(|v| v.as_deref())
    }

    pub fn push(&mut self, value: Option<Vec<Option<T>>>) {
        self.values.push(value)
    }

    pub fn into_values(self) -> Vec<Option<Vec<Option<T>>>> {
        self.values
    }
}

impl<T> ListArray<T>
where
    T: Clone,
{
    /// Copy out the rows in `range`.
    ///
    /// Returns None if the range is out of bounds.
    pub fn slice(&self, range: Range<usize>) -> Option<Self> {
        self.values.get(range).map(|values| ListArray {
            values: values.to_vec(),
        })
    }
}

impl<T> ListArray<T>
where
    T: DeserializeOwned,
{
    /// Create an array from JSON encoded lists, one per row.
    ///
    /// Each row is either `null` or a JSON array whose entries may be null,
    /// e.g. `"[1, null, 3]"`.
    pub fn try_from_json<'a>(rows: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let values = rows
            .into_iter()
            .map(|row| {
                serde_json::from_str::<Option<Vec<Option<T>>>>(row)
                    .context_fn(|| format!("Failed to parse list value '{row}'"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ListArray { values })
    }
}

impl<T> FromIterator<Option<Vec<Option<T>>>> for ListArray<T> {
    fn from_iter<I: IntoIterator<Item = Option<Vec<Option<T>>>>>(iter: I) -> Self {
        ListArray {
            values: iter.into_iter().collect(),
        }
    }
}

/// Sort list elements ascending with NULLs placed last.
pub fn sort_nulls_last<T: Ord>(values: &mut [Option<T>]) {
    values.sort_by(|a, b| match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_distinguishes_null_lists() {
        let arr = ListArray::<i32>::try_from_json(["[]", "[1, null]", "null"]).unwrap();

        assert_eq!(3, arr.len());
        assert_eq!(Some(Some(&[][..])), arr.get(0));
        assert_eq!(Some(Some(&[Some(1), None][..])), arr.get(1));
        assert_eq!(Some(None), arr.get(2));
        assert_eq!(None, arr.get(3));
        assert!(!arr.is_valid(2));
    }

    #[test]
    fn from_json_invalid() {
        ListArray::<i32>::try_from_json(["[1, \"a\"]"]).unwrap_err();
    }

    #[test]
    fn all_null() {
        let arr = ListArray::<String>::all_null(4);
        assert_eq!(4, arr.len());
        assert!(arr.iter().all(|v| v.is_none()));
    }

    #[test]
    fn sort_places_nulls_last() {
        let mut vals = vec![Some(3), None, Some(1), Some(2)];
        sort_nulls_last(&mut vals);
        assert_eq!(vec![Some(1), Some(2), Some(3), None], vals);
    }
}
