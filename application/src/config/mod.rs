//! Application-level configuration.
//!
//! This module provides configuration types that control how use cases behave:
//!
//! - [`DispatchConfig`] - per-call timeout, retry policy, per-provider concurrency
//! - [`PipelineDefaults`] - request options and model set used when a request omits them
//! - [`UltraConfig`] - container handed to the use case at construction

pub mod dispatch_config;
pub mod pipeline_defaults;
pub mod ultra_config;

pub use dispatch_config::DispatchConfig;
pub use pipeline_defaults::PipelineDefaults;
pub use ultra_config::UltraConfig;
