//! Configuration file loading for ultra
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `ULTRA_*` environment variables (`__` separates nesting levels)
//! 2. `--config <path>` specified file
//! 3. Project root: `./ultra.toml` or `./.ultra.toml`
//! 4. Global: `$XDG_CONFIG_HOME/ultra/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileCacheConfig, FileCircuitBreakerConfig, FileConfig,
    FileDispatchConfig, FileOutputConfig, FilePipelineConfig, FileProviderConfig,
    FileProvidersConfig,
};
pub use loader::ConfigLoader;
