//! Provider-facing value objects
//!
//! What goes into an adapter call ([`params::GenerationParams`]), what an
//! adapter declares about itself ([`capabilities::Capabilities`]) and what
//! comes back ([`result::ProviderResult`], [`stream::StreamEvent`]).

pub mod capabilities;
pub mod params;
pub mod result;
pub mod stream;
