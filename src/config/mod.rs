// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: TOML-backed data model and the validated `ConfigFile`.
//! - `loader.rs`: read a config file from disk.
//! - `validate.rs`: `TryFrom<RawConfigFile> for ConfigFile`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    ConfigFile, JobSection, RawConfigFile, SecretNames, StepConfig, TargetSection,
    TargetSettings, TriggerSection, default_script,
};
