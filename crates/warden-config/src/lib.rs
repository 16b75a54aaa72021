//! Configuration loading and CLI definitions.
//!
//! A config file is JSON (comments allowed), YAML or TOML, picked by
//! extension. Every section is optional; missing values fall back to
//! `warden_core::defaults`.

mod cli;
mod defaults;
mod loader;
mod types;
mod validate;

pub use cli::{CliOverrides, apply_overrides};
pub use loader::{ConfigError, load_config};
pub use types::*;
pub use validate::validate_config;
