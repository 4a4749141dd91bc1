//! Concrete format implementations

pub mod html;
pub mod text;
