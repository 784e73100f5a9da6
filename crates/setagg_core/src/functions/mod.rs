pub mod aggregate;
pub mod bind_state;
pub mod documentation;
pub mod function_set;

use crate::arrays::datatype::{DataType, DataTypeId};

/// Function signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// Expected positional input argument types for this signature.
    pub positional_args: &'static [DataTypeId],

    /// The expected return type.
    ///
    /// Purely informational. The concrete return type is determined when
    /// binding.
    pub return_type: DataTypeId,
}

impl Signature {
    pub const fn new(inputs: &'static [DataTypeId], return_type: DataTypeId) -> Self {
        Signature {
            positional_args: inputs,
            return_type,
        }
    }

    /// Return if inputs given data types exactly satisfy the signature.
    pub fn exact_match(&self, inputs: &[DataType]) -> bool {
        if inputs.len() != self.positional_args.len() {
            return false;
        }

        self.positional_args
            .iter()
            .zip(inputs)
            .all(|(&expected, have)| expected == have.datatype_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_list() {
        let sig = Signature::new(&[DataTypeId::List], DataTypeId::List);

        assert!(sig.exact_match(&[DataType::list(DataType::Int32)]));
        assert!(!sig.exact_match(&[DataType::Int32]));
        assert!(!sig.exact_match(&[]));
        assert!(!sig.exact_match(&[
            DataType::list(DataType::Int32),
            DataType::list(DataType::Int32)
        ]));
    }
}
