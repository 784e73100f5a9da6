use crate::arrays::datatype::DataType;

/// State produced when binding a function to its input types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindState<S> {
    /// Function specific state.
    pub state: S,
    /// The return type of the function.
    pub return_type: DataType,
    /// Input types the function was bound with.
    pub inputs: Vec<DataType>,
}
