//! Semantic and scope analysis for GPIDL documents.
//!
//! The validator walks a parsed document against the GPIDL grammar and
//! accumulates every violation it can find, each tagged with a structural
//! path (`root.instructions.FADD.forms.r_r.operands[1].kind`). It never
//! fails fast: an author should see all problems in one run.
//!
//! Validation gates synthesis. An empty diagnostic list means the document
//! satisfies every invariant the synthesizer relies on; tooling must refuse
//! to synthesize from a document with outstanding diagnostics.
//!
//! The traversal threads scope state downward by value: resolved global
//! definitions, accumulated local modifier definitions, the ancestor names
//! forbidden for redeclaration, and the parent's fixed-modifier
//! requirement. Recursive calls return only diagnostics and never mutate
//! shared state.

pub mod diagnostics;
pub mod validator;

pub use diagnostics::Diagnostic;
pub use validator::validate_document;
