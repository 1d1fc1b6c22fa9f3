// src/config/mod.rs
pub mod registry;
pub mod settings;

pub use registry::{ConfigRegistry, ConfigView, GlobalConfig, GroupConfig, RegistryDefaults, RegistrySnapshot};
pub use settings::Settings;
