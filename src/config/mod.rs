//! Generator configuration
//!
//! Three layers, merged in order:
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config`, or `swu-gen.toml` in the invocation directory)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::{BuiltinDefaults, DEFAULT_CONFIG_FILE, DEFAULT_OUTPUT};
pub use effective::{
    ConfigError, ConfigOrigin, ConfigOverrides, ConfigSource, EffectiveConfig, GeneratorConfig,
    ToolsConfig,
};
pub use merge::{deep_merge, merge_layers};
