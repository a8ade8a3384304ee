//! Error type shared by the parser and schema resolution.

/// An error produced while parsing or resolving a document.
///
/// Parser errors are sticky: once a [`crate::ParserState`] records one,
/// further input is ignored and the error stays in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserError {
    /// The input violated the JSON grammar at `offset`.
    Syntax {
        /// Byte offset into the accumulated source.
        offset: usize,
        /// Human-readable description of what went wrong.
        message: String,
    },
    /// The document was finalized while a value was still incomplete.
    UnexpectedEnd {
        /// Byte offset where input ended.
        offset: usize,
    },
    /// A well-formed document did not conform to the schema it was
    /// resolved against.
    SchemaInvalid {
        /// Dotted path to the offending value, rooted at `$`.
        path: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ParserError {
    /// Byte offset of the error, when it has a source location.
    pub fn offset(&self) -> Option<usize> {
        match self {
            ParserError::Syntax { offset, .. } => Some(*offset),
            ParserError::UnexpectedEnd { offset } => Some(*offset),
            ParserError::SchemaInvalid { .. } => None,
        }
    }
}

impl std::fmt::Display for ParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParserError::Syntax { offset, message } => {
                write!(f, "{} at offset {}", message, offset)
            }
            ParserError::UnexpectedEnd { offset } => {
                write!(f, "unexpected end of input at offset {}", offset)
            }
            ParserError::SchemaInvalid { path, reason } => {
                write!(f, "schema mismatch at {}: {}", path, reason)
            }
        }
    }
}

impl std::error::Error for ParserError {}
