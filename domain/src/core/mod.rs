//! Core domain concepts shared across all subdomains.
//!
//! - [`model::ModelId`] - opaque identifier of a provider+model pair
//! - [`prompt::Prompt`] - a validated user prompt
//! - [`error::DomainError`] - domain-level errors

pub mod error;
pub mod model;
pub mod prompt;
pub mod string;
