//! # Domain Module
//!
//! Core types for the connection supervisor: errors, identity parsing,
//! the roster and the connection lifecycle. Nothing here does I/O.

pub mod errors;
pub mod identity;
pub mod roster;
pub mod state;

pub use errors::*;
pub use identity::*;
pub use roster::*;
pub use state::*;
