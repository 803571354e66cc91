//! Configuration and dependency initialization.

mod app_config;
mod dependencies;

pub use app_config::{AppConfig, ConnectionMode};
pub use dependencies::{Dependencies, SourceSystem};
