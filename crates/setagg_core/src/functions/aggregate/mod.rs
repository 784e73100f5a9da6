pub mod builtin;
pub mod element_set;

use std::fmt::Debug;
use std::hash::Hash;

use serde::Serialize;
use serde::de::DeserializeOwned;
use setagg_error::Result;

use crate::arrays::datatype::DataType;
use crate::arrays::ordfloat::{OrdF32, OrdF64};

/// State for a single group's aggregate.
///
/// States are created empty, updated with inputs, merged with states computed
/// elsewhere (other batches, other partitions), and finally produce an output.
/// Merge must be associative and commutative with respect to the finalized
/// output.
pub trait AggregateState<Input, Output>: Default + Debug {
    /// Merge other state into this state.
    ///
    /// `other` may be left in an unspecified (but valid) state.
    fn merge(&mut self, other: &mut Self) -> Result<()>;

    /// Update this state with some input.
    fn update(&mut self, input: Input) -> Result<()>;

    /// Produce the output for this state, resetting the state.
    fn finalize(&mut self) -> Result<Output>;
}

/// Rust types that can be stored as list elements in aggregate state.
///
/// Elements need a total equality and hash so that duplicates can be
/// detected.
pub trait PhysicalElement:
    Eq + Hash + Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// The logical element type values of this type represent.
    const DATATYPE: DataType;
}

macro_rules! impl_physical_element {
    ($rust_type:ty, $datatype:expr) => {
        impl PhysicalElement for $rust_type {
            const DATATYPE: DataType = $datatype;
        }
    };
}

impl_physical_element!(bool, DataType::Boolean);
impl_physical_element!(i8, DataType::Int8);
impl_physical_element!(i16, DataType::Int16);
impl_physical_element!(i32, DataType::Int32);
impl_physical_element!(i64, DataType::Int64);
impl_physical_element!(u8, DataType::UInt8);
impl_physical_element!(u16, DataType::UInt16);
impl_physical_element!(u32, DataType::UInt32);
impl_physical_element!(u64, DataType::UInt64);
impl_physical_element!(OrdF32, DataType::Float32);
impl_physical_element!(OrdF64, DataType::Float64);
impl_physical_element!(String, DataType::Utf8);
impl_physical_element!(Vec<u8>, DataType::Binary);
