use std::fmt;

use serde::{Deserialize, Serialize};
use setagg_error::{DbError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataTypeId {
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Utf8,
    Binary,
    List,
}

impl fmt::Display for DataTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Boolean => write!(f, "Boolean"),
            Self::Int8 => write!(f, "Int8"),
            Self::Int16 => write!(f, "Int16"),
            Self::Int32 => write!(f, "Int32"),
            Self::Int64 => write!(f, "Int64"),
            Self::UInt8 => write!(f, "UInt8"),
            Self::UInt16 => write!(f, "UInt16"),
            Self::UInt32 => write!(f, "UInt32"),
            Self::UInt64 => write!(f, "UInt64"),
            Self::Float32 => write!(f, "Float32"),
            Self::Float64 => write!(f, "Float64"),
            Self::Utf8 => write!(f, "Utf8"),
            Self::Binary => write!(f, "Binary"),
            Self::List => write!(f, "List"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListTypeMeta {
    pub datatype: Box<DataType>,
}

/// Data types for aggregate inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Constant null columns.
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Utf8,
    Binary,
    List(ListTypeMeta),
}

impl DataType {
    pub fn list(element: DataType) -> Self {
        DataType::List(ListTypeMeta {
            datatype: Box::new(element),
        })
    }

    pub const fn datatype_id(&self) -> DataTypeId {
        match self {
            Self::Null => DataTypeId::Null,
            Self::Boolean => DataTypeId::Boolean,
            Self::Int8 => DataTypeId::Int8,
            Self::Int16 => DataTypeId::Int16,
            Self::Int32 => DataTypeId::Int32,
            Self::Int64 => DataTypeId::Int64,
            Self::UInt8 => DataTypeId::UInt8,
            Self::UInt16 => DataTypeId::UInt16,
            Self::UInt32 => DataTypeId::UInt32,
            Self::UInt64 => DataTypeId::UInt64,
            Self::Float32 => DataTypeId::Float32,
            Self::Float64 => DataTypeId::Float64,
            Self::Utf8 => DataTypeId::Utf8,
            Self::Binary => DataTypeId::Binary,
            Self::List(_) => DataTypeId::List,
        }
    }

    pub fn try_get_list_type_meta(&self) -> Result<&ListTypeMeta> {
        match self {
            Self::List(meta) => Ok(meta),
            other => Err(DbError::type_mismatch(format!(
                "Expected a List type, got {other}"
            ))),
        }
    }

    /// If values of this type can be held as distinct elements of a set.
    ///
    /// Floats are compared with all NaNs equal and `-0.0 == 0.0`. Nested lists
    /// are not supported as elements.
    pub fn is_set_element(&self) -> bool {
        !matches!(self, Self::Null | Self::List(_))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(meta) => write!(f, "List[{}]", meta.datatype),
            other => write!(f, "{}", other.datatype_id()),
        }
    }
}
