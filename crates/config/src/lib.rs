// Configuration loading

pub mod settings;

pub use settings::{ConfigError, Settings, API_BASE_ENV};
