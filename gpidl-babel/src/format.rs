//! Format trait definition
//!
//! This module defines the core Format trait that all format implementations
//! must implement. A format consumes a whole encoding table and produces one
//! or more pages; single-file formats simply return one page.

use crate::error::FormatError;
use gpidl_synth::EncodingTable;

/// One output file, addressed relative to whatever root the caller chooses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Relative path using `/` separators, e.g. `instructions/FADD.html`.
    pub path: String,
    pub contents: String,
}

impl RenderedPage {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        RenderedPage {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// Presentation knobs shared by all formats. Defaults mirror the embedded
/// configuration defaults; the CLI overrides them from `gpidl-config`.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Bits per bit-grid row.
    pub bits_per_row: usize,
    /// Subdirectory for per-instruction pages.
    pub instructions_dir: String,
    /// Index page title.
    pub title: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            bits_per_row: 64,
            instructions_dir: "instructions".to_string(),
            title: "Instruction Encodings".to_string(),
        }
    }
}

/// Trait for encoding-table output formats
///
/// Implementors turn a table into a set of rendered pages. Formats never
/// touch the filesystem; page paths are advisory and relative.
pub trait Format: Send + Sync {
    /// The name of this format (e.g., "html", "text")
    fn name(&self) -> &str;

    /// Optional description of this format
    fn description(&self) -> &str {
        ""
    }

    /// Render a table into pages.
    fn serialize(
        &self,
        table: &EncodingTable,
        options: &RenderOptions,
    ) -> Result<Vec<RenderedPage>, FormatError>;
}
