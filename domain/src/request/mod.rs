//! Request domain
//!
//! The validated [`request::Request`] the pipeline runs on, its options,
//! the analysis patterns, and the JSON boundary types it is built from.

pub mod boundary;
pub mod options;
pub mod pattern;
#[allow(clippy::module_inception)]
pub mod request;
