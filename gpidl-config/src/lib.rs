//! Shared configuration loader for the gpidl toolchain.
//!
//! `defaults/gpidl.default.toml` is embedded into every binary so that docs
//! and runtime behavior stay in sync. Applications layer user-specific files
//! on top of those defaults via [`Loader`] before deserializing into
//! [`GpidlConfig`].
//!
//! Configuration covers output presentation only. Encoding semantics are a
//! function of the spec document alone.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_TOML: &str = include_str!("../defaults/gpidl.default.toml");

/// Top-level configuration consumed by gpidl applications.
#[derive(Debug, Clone, Deserialize)]
pub struct GpidlConfig {
    pub synth: SynthConfig,
    pub render: RenderConfig,
}

/// Knobs for writing the synthesized encoding table.
#[derive(Debug, Clone, Deserialize)]
pub struct SynthConfig {
    /// Pretty-print the output JSON.
    pub pretty: bool,
}

/// Knobs for the rendered encoding pages.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Bits per row in the bit grid.
    pub bits_per_row: usize,
    /// Directory for per-instruction pages, relative to the output root.
    pub instructions_dir: String,
    /// Index page title.
    pub title: String,
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override (useful for CLI settings).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<GpidlConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<GpidlConfig, ConfigError> {
    Loader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_default_config() {
        let config = load_defaults().expect("defaults to deserialize");
        assert!(config.synth.pretty);
        assert_eq!(config.render.bits_per_row, 64);
        assert_eq!(config.render.instructions_dir, "instructions");
    }

    #[test]
    fn supports_overrides() {
        let config = Loader::new()
            .set_override("render.bits_per_row", 32)
            .expect("override to apply")
            .build()
            .expect("config to build");
        assert_eq!(config.render.bits_per_row, 32);
        assert!(config.synth.pretty);
    }
}
