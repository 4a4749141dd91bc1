//! Multi-format presentation for synthesized encoding tables
//!
//!     This crate turns an encoding table into human-facing artifacts: the
//!     HTML bit-grid pages and a plain-text ranges listing.
//!
//! Architecture
//!
//!     - Format trait: uniform interface for all output formats
//!     - FormatRegistry: centralized discovery and selection of formats
//!     - Format implementations: one module per concrete format
//!
//!     This is a pure lib, that is, it powers the gpidl CLI but is shell
//!     agnostic: no code here may suppose a shell environment, be it to std
//!     print, read env vars or touch the filesystem. A format returns its
//!     output as (relative path, contents) pages and the caller decides
//!     where, or whether, they land on disk.
//!
//!     The file structure:
//!     .
//!     ├── error.rs
//!     ├── format.rs               # Format trait definition
//!     ├── registry.rs             # FormatRegistry for discovery and selection
//!     ├── formats
//!     │   ├── <format>
//!     │   │   └── mod.rs
//!     └── lib.rs
//!
//! Rendering is total
//!
//!     The input table may predate the current spec or have been edited by
//!     hand. Formats therefore accept any table with the right shape:
//!     layouts with holes render as explicit gap cells, overlaps become a
//!     warning note on the page, and nothing here re-validates the table
//!     against a spec.

pub mod error;
pub mod format;
pub mod formats;
pub mod registry;

pub use error::FormatError;
pub use format::{Format, RenderOptions, RenderedPage};
pub use registry::FormatRegistry;
