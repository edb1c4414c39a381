pub mod runtime;
pub mod settings;

pub use runtime::{Platform, RuntimeInfo};
pub use settings::{BehaviorConfig, Config, ConfigError, GitConfig};
