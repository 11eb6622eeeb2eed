//! Core signal types for the relay.
//!
//! Turns loosely-structured webhook payloads into canonical signals and
//! decides whether they are eligible for dispatch.

pub mod action;
pub mod error;
pub mod filter;
pub mod signal;

pub use action::*;
pub use error::*;
pub use filter::*;
pub use signal::*;
