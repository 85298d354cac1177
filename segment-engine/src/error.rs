//! FILENAME: segment-engine/src/error.rs
//! PURPOSE: Error taxonomy shared by the segment and pivot engines.
//! CONTEXT: Every configuration problem is reported before any record is
//! touched. Errors carry the offending field or token position so the
//! rendering layer can highlight the exact misconfiguration.

use filter_parser::ParseError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SegmentError {
    /// Invalid or overlapping bucket ranges, bad pivot configuration.
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        dimension: Option<String>,
    },

    /// Malformed filter text.
    #[error("Parse error at position {position}: {message}")]
    Parse { message: String, position: usize },

    /// A literal or value that does not fit the declared dimension type.
    #[error("Type mismatch for '{dimension}': expected {expected}, found {found}")]
    TypeMismatch {
        dimension: String,
        expected: String,
        found: String,
        position: Option<usize>,
    },

    #[error("Unknown dimension: '{name}'")]
    UnknownDimension {
        name: String,
        position: Option<usize>,
    },

    /// Cyclic or unresolved metric dependencies, empty metric lists.
    #[error("Computation error: {message}")]
    Computation { message: String },
}

impl SegmentError {
    pub fn config(message: impl Into<String>) -> Self {
        SegmentError::Configuration {
            message: message.into(),
            dimension: None,
        }
    }

    pub fn config_for(dimension: &str, message: impl Into<String>) -> Self {
        SegmentError::Configuration {
            message: message.into(),
            dimension: Some(dimension.to_string()),
        }
    }

    pub fn computation(message: impl Into<String>) -> Self {
        SegmentError::Computation {
            message: message.into(),
        }
    }

    pub fn unknown_dimension(name: &str) -> Self {
        SegmentError::UnknownDimension {
            name: name.to_string(),
            position: None,
        }
    }

    /// Byte offset into the filter text, when the error came from one.
    pub fn position(&self) -> Option<usize> {
        match self {
            SegmentError::Parse { position, .. } => Some(*position),
            SegmentError::TypeMismatch { position, .. }
            | SegmentError::UnknownDimension { position, .. } => *position,
            _ => None,
        }
    }

    /// Attaches a filter position to errors that can carry one.
    pub fn at(self, at: usize) -> Self {
        match self {
            SegmentError::TypeMismatch {
                dimension,
                expected,
                found,
                ..
            } => SegmentError::TypeMismatch {
                dimension,
                expected,
                found,
                position: Some(at),
            },
            SegmentError::UnknownDimension { name, .. } => SegmentError::UnknownDimension {
                name,
                position: Some(at),
            },
            other => other,
        }
    }
}

impl From<ParseError> for SegmentError {
    fn from(err: ParseError) -> Self {
        SegmentError::Parse {
            message: err.message,
            position: err.position,
        }
    }
}

pub type SegmentResult<T> = Result<T, SegmentError>;
