//! Codec errors.

use omm_core::DataType;
use thiserror::Error;

/// Errors that can arise when encoding or decoding RWF.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Buffer too short for the fields it claims to hold.
    #[error("Buffer truncated")]
    Incomplete,

    /// A value does not fit the wire encoding chosen for it.
    #[error("Value {value} too large for {field}")]
    ValueTooLarge { field: &'static str, value: u64 },

    /// Unknown or unsupported message class.
    #[error("Unknown message class: {0}")]
    UnknownMsgClass(u8),

    /// Data type code that is not defined.
    #[error("Unknown data type: {0}")]
    UnknownDataType(u8),

    /// Known type used where it cannot appear.
    #[error("Data type {0} not supported in {1}")]
    UnsupportedType(DataType, &'static str),

    /// Real hint outside 0..=30 and 33..=35.
    #[error("Invalid real hint: {0}")]
    InvalidRealHint(u8),

    /// Container entry whose payload type differs from the declared one.
    #[error("Container type mismatch: expected {expected}, got {actual}")]
    ContainerTypeMismatch { expected: DataType, actual: DataType },

    /// Content that is structurally present but not valid.
    #[error("Invalid field: {0}")]
    InvalidData(&'static str),

    /// Containers nested deeper than the codec follows.
    #[error("Containers nested deeper than {0} levels")]
    NestingTooDeep(usize),

    /// Text input names a field the dictionary does not define.
    #[error("Field {0} not found in dictionary")]
    UnknownField(String),

    /// A dictionary payload the dictionary refused.
    #[error("Dictionary: {0}")]
    Dictionary(String),
}
