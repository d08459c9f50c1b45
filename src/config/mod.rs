// src/config/mod.rs

//! Configuration loading and validation for jobhost.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading `Jobhost.toml` from disk.
//! - `validate.rs`: checked conversion `RawConfigFile -> ConfigFile`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str, resolve_config};
pub use model::{ConfigFile, EngineSection, PolicySection, RawConfigFile};
