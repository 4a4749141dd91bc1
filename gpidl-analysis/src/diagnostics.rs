//! Path-qualified validation diagnostics

use std::fmt;

/// One validation finding, anchored to a dot-and-bracket structural path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// `root.instructions` style member access.
pub(crate) fn key_path(path: &str, key: &str) -> String {
    format!("{path}.{key}")
}

/// `root.operands[2]` style sequence access.
pub(crate) fn index_path(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_path_colon_message() {
        let diag = Diagnostic::new("root.instructions", "expected object");
        assert_eq!(diag.to_string(), "root.instructions: expected object");
    }

    #[test]
    fn path_helpers_compose() {
        let p = key_path("root", "operands");
        assert_eq!(index_path(&p, 3), "root.operands[3]");
    }
}
