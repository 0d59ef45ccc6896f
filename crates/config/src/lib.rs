//! Configuration loading, validation and env substitution for courier.
//!
//! Config file: `courier.toml`, searched in `./` then `~/.config/courier/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in the raw
//! file before parsing.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, load_config, parse_config},
    schema::{CourierConfig, GatewayConfig, MediaConfig, QueueConfig},
    validate::{Diagnostic, Severity, validate},
};
