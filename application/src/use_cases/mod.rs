//! Use cases (application services)

pub mod dispatch;
pub mod run_ultra;
