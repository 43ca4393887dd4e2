//! Pipeline domain
//!
//! Stages, the state machine that sequences them, and the records each
//! stage leaves behind for diagnostics.

pub mod diagnostics;
pub mod response;
pub mod stage;
pub mod state;
