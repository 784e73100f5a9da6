//! Encoding of partial aggregate states.
//!
//! Partial states are shipped between the partial and final phase as opaque
//! blobs. The blob is a versioned document holding the element type and the
//! state of every group. The layout is not a stable contract and is only
//! expected to be read by the same version that wrote it.

use serde::{Deserialize, Serialize};
use setagg_error::{DbError, Result, ResultExt};

use super::group_states::{GroupKey, GroupStateStore};
use crate::arrays::datatype::DataTypeId;
use crate::functions::aggregate::builtin::set_union::SetUnionState;
use crate::functions::aggregate::{AggregateState, PhysicalElement};

const STATE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize, T: Serialize",
    deserialize = "K: Deserialize<'de>, T: Deserialize<'de>"
))]
struct StoreImage<K, T> {
    version: u32,
    element_type: DataTypeId,
    groups: Vec<GroupImage<K, T>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize, T: Serialize",
    deserialize = "K: Deserialize<'de>, T: Deserialize<'de>"
))]
struct GroupImage<K, T> {
    key: K,
    state: StateImage<T>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
enum StateImage<T> {
    Absent,
    Present { elements: Vec<T>, saw_null: bool },
}

/// Encode a partial state store into an opaque blob.
pub fn encode_state<K, T>(store: &GroupStateStore<K, T>) -> Result<Vec<u8>>
where
    K: GroupKey,
    T: PhysicalElement,
{
    store.check_poisoned()?;

    let mut groups = Vec::with_capacity(store.num_groups());
    store.for_each(|key, state| {
        let state = match state.element_set() {
            None => StateImage::Absent,
            Some(set) => StateImage::Present {
                elements: set.iter().cloned().collect(),
                saw_null: set.saw_null(),
            },
        };
        groups.push(GroupImage {
            key: key.clone(),
            state,
        });
    });

    let image = StoreImage {
        version: STATE_FORMAT_VERSION,
        element_type: T::DATATYPE.datatype_id(),
        groups,
    };

    serde_json::to_vec(&image).context("Failed to encode aggregate state")
}

/// Decode a blob produced by `encode_state`.
///
/// The decoded store is subject to `memory_limit`.
pub fn decode_state<K, T>(blob: &[u8], memory_limit: Option<usize>) -> Result<GroupStateStore<K, T>>
where
    K: GroupKey,
    T: PhysicalElement,
{
    let image: StoreImage<K, T> = serde_json::from_slice(blob)
        .context("Failed to decode aggregate state")
        .map_err(|e| e.with_kind(setagg_error::ErrorKind::InvalidState))?;

    if image.version != STATE_FORMAT_VERSION {
        return Err(DbError::invalid_state("Unsupported aggregate state version")
            .with_field("version", image.version)
            .with_field("expected", STATE_FORMAT_VERSION));
    }

    let expected = T::DATATYPE.datatype_id();
    if image.element_type != expected {
        return Err(
            DbError::type_mismatch("Aggregate state has a different element type")
                .with_field("state", image.element_type)
                .with_field("expected", expected),
        );
    }

    let mut store = GroupStateStore::with_memory_limit(memory_limit);
    for group in image.groups {
        let mut state = SetUnionState::Absent;
        if let StateImage::Present { elements, saw_null } = group.state {
            let values: Vec<Option<T>> = elements
                .into_iter()
                .map(Some)
                .chain(saw_null.then_some(None))
                .collect();
            state.update(Some(values.as_slice()))?;
        }

        let mut partial = GroupStateStore::new();
        *partial.get_or_create(&group.key)? = state;
        store.merge_from(partial)?;
    }

    Ok(store)
}

#[cfg(test)]
mod tests {
    use setagg_error::ErrorKind;

    use super::*;
    use crate::arrays::list::sort_nulls_last;
    use crate::arrays::ordfloat::OrdF64;

    fn finalized(store: GroupStateStore<i16, i32>) -> Vec<(i16, Vec<Option<i32>>)> {
        let mut out: Vec<_> = store
            .finalize_all()
            .unwrap()
            .into_iter()
            .map(|(k, mut v)| {
                sort_nulls_last(&mut v);
                (k, v)
            })
            .collect();
        out.sort_by_key(|(k, _)| *k);
        out
    }

    #[test]
    fn absent_and_null_only_groups_survive_encoding() {
        let mut store = GroupStateStore::<i16, i32>::new();
        store.update(&1, None).unwrap();
        store.update(&2, Some(&[None, None][..])).unwrap();
        store.update(&3, Some(&[Some(4), None, Some(4)][..])).unwrap();

        let blob = encode_state(&store).unwrap();
        let decoded = decode_state::<i16, i32>(&blob, None).unwrap();

        assert!(!decoded.get(&1).unwrap().is_present());
        assert!(decoded.get(&2).unwrap().is_present());
        assert_eq!(1, decoded.num_elements());
        assert_eq!(finalized(store), finalized(decoded));
    }

    #[test]
    fn decode_wrong_element_type() {
        let mut store = GroupStateStore::<i16, i32>::new();
        store.update(&1, Some(&[Some(1)][..])).unwrap();
        let blob = encode_state(&store).unwrap();

        let err = decode_state::<i16, i64>(&blob, None).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
    }

    #[test]
    fn decode_garbage() {
        let err = decode_state::<i16, i32>(b"not a state", None).unwrap_err();
        assert_eq!(ErrorKind::InvalidState, err.kind());
    }

    #[test]
    fn decode_respects_memory_limit() {
        let mut store = GroupStateStore::<i16, i32>::new();
        store.update(&1, Some(&[Some(1), Some(2), Some(3)][..])).unwrap();
        let blob = encode_state(&store).unwrap();

        let err = decode_state::<i16, i32>(&blob, Some(2)).unwrap_err();
        assert_eq!(ErrorKind::OutOfMemory, err.kind());
    }

    #[test]
    fn float_elements_with_nan() {
        let mut store = GroupStateStore::<i16, OrdF64>::new();
        store
            .update(
                &1,
                Some(&[Some(OrdF64(f64::NAN)), Some(OrdF64(-0.0)), Some(OrdF64(2.5)), None][..]),
            )
            .unwrap();

        let blob = encode_state(&store).unwrap();
        let decoded = decode_state::<i16, OrdF64>(&blob, None).unwrap();
        assert_eq!(3, decoded.num_elements());

        let mut vals = decoded.finalize_all().unwrap().remove(&1).unwrap();
        sort_nulls_last(&mut vals);
        assert_eq!(
            vec![Some(OrdF64(0.0)), Some(OrdF64(2.5)), Some(OrdF64(f64::NAN)), None],
            vals
        );
    }

    #[test]
    fn string_keys_and_elements() {
        let mut store = GroupStateStore::<String, String>::new();
        store
            .update(&"a".to_string(), Some(&[Some("x".to_string()), None][..]))
            .unwrap();

        let blob = encode_state(&store).unwrap();
        let decoded = decode_state::<String, String>(&blob, None).unwrap();

        let mut vals = decoded.finalize_all().unwrap().remove("a").unwrap();
        sort_nulls_last(&mut vals);
        assert_eq!(vec![Some("x".to_string()), None], vals);
    }
}
