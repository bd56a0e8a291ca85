//! Error types for the OMM data model.
//!
//! Building primitives, containers and messages is infallible: they are
//! plain data. Errors come from two places:
//! - loading field / enum type dictionaries from text
//! - checking a value against the ranges the wire format allows

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OmmError {
    /// The dictionary file could not be read.
    #[error("Can't open file: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A line of a dictionary file could not be understood.
    #[error("{message} (Line={line}).")]
    DictionaryParse { line: usize, message: String },

    /// The dictionary content is inconsistent (duplicates, mismatched
    /// references, wrong dictionary type).
    #[error("{0}")]
    Dictionary(String),

    /// A primitive value is outside the range the wire format accepts.
    #[error("Invalid value for {0}")]
    InvalidValue(&'static str),
}

impl OmmError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        OmmError::DictionaryParse {
            line,
            message: message.into(),
        }
    }
}
