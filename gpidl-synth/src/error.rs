//! Synthesis failures
//!
//! Each variant names the leaf encoding being laid out when the failure
//! occurred. Any failure aborts the whole run; a partial table is never
//! produced.

use crate::table::INSTRUCTION_WIDTH_BITS;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthError {
    /// An operand references a kind absent from `operand_width_bits`.
    UnknownKind { leaf: String, kind: String },
    /// A modifier name resolves to no definition in scope.
    UnknownModifier { leaf: String, name: String },
    /// An operand flag references no global flag definition.
    UnknownFlag { leaf: String, name: String },
    /// The leaf's fields total more than the instruction width.
    Overflow { leaf: String, bits: u64 },
}

impl fmt::Display for SynthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthError::UnknownKind { leaf, kind } => {
                write!(f, "{leaf}: unknown operand kind '{kind}'")
            }
            SynthError::UnknownModifier { leaf, name } => {
                write!(f, "{leaf}: unknown modifier '{name}'")
            }
            SynthError::UnknownFlag { leaf, name } => {
                write!(f, "{leaf}: unknown operand flag '{name}'")
            }
            SynthError::Overflow { leaf, bits } => {
                write!(
                    f,
                    "{leaf}: encoding exceeds {INSTRUCTION_WIDTH_BITS} bits: {bits} bits"
                )
            }
        }
    }
}

impl std::error::Error for SynthError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_leaf_key() {
        let err = SynthError::Overflow {
            leaf: "FADD.r_r".to_string(),
            bits: 131,
        };
        assert_eq!(err.to_string(), "FADD.r_r: encoding exceeds 128 bits: 131 bits");
        let err = SynthError::UnknownKind {
            leaf: "FADD.r_r".to_string(),
            kind: "mem".to_string(),
        };
        assert_eq!(err.to_string(), "FADD.r_r: unknown operand kind 'mem'");
    }
}
