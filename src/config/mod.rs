//! Configuration loading, validation and integrity hashing

mod loader;
mod types;
mod validation;

pub use loader::{load_config, read_config_file, LoadedConfig};
pub use types::{Config, EngineConfig, FetchConfig, HttpConfig, ResolveConfig};
pub use validation::validate;
