//! Error types for document loading

use std::fmt;

/// Error produced when source text cannot be turned into a parsed document.
///
/// Comment stripping itself is total; this only surfaces when the stripped
/// text is not valid JSON.
#[derive(Debug)]
pub struct DocumentError {
    source: serde_json::Error,
}

impl DocumentError {
    pub fn new(source: serde_json::Error) -> Self {
        DocumentError { source }
    }
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse JSONC: {}", self.source)
    }
}

impl std::error::Error for DocumentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
