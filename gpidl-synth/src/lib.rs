//! Encoding-table synthesis.
//!
//! Turns a validated GPIDL spec into a fixed-width bit layout per leaf
//! form. The pass is deterministic: field widths come only from spec-wide
//! maxima and declaration order, so re-running on an unchanged spec yields
//! an identical table, and every leaf of the same instruction set shares
//! one selector layout.
//!
//! The input is assumed valid (see `gpidl-analysis`); the errors here cover
//! only what validation cannot know statically, such as a layout
//! overflowing the instruction width.

pub mod error;
pub mod synthesize;
pub mod table;

pub use error::SynthError;
pub use synthesize::synthesize;
pub use table::{Encoding, EncodingRange, EncodingTable, INSTRUCTION_WIDTH_BITS};
