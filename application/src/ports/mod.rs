//! Port definitions (interfaces for external systems)
//!
//! Ports define the boundaries between the application and the
//! infrastructure layer. Adapters implement them.

pub mod progress;
pub mod provider_adapter;
pub mod resolver;
