//! Parser and data model for the GPIDL instruction-set description language.
//!
//! A GPIDL document is JSON with comments: `//` line comments, `/* */` block
//! comments, and tolerated trailing commas. This crate turns the source text
//! into a plain parsed document (nested mappings with insertion order
//! preserved, sequences, scalars) and offers a typed [`spec::Spec`] model on
//! top of it.
//!
//! Key-order preservation is load-bearing: the position of an instruction in
//! the `instructions` mapping is its opcode index, and the position of a form
//! in a `forms` mapping is its selector value. All mappings therefore use
//! insertion-ordered containers end-to-end.
//!
//! Validation of a parsed document lives in the `gpidl-analysis` crate;
//! encoding synthesis lives in `gpidl-synth`. Both consume what this crate
//! produces.

pub mod bits;
pub mod error;
pub mod jsonc;
pub mod spec;

pub use error::DocumentError;
pub use jsonc::parse_document;
pub use spec::Spec;
