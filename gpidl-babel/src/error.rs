//! Format conversion errors

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// No registered format under the requested name.
    FormatNotFound(String),
    /// The format exists but cannot perform the requested operation.
    NotSupported(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::FormatNotFound(name) => write!(f, "format not found: {name}"),
            FormatError::NotSupported(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for FormatError {}
