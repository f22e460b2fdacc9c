//! # Shared Types Crate
//!
//! Domain entities shared by the event bus and the connection supervisor.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: key encodings live here and nowhere else.
//! - **Per-Connection Membership**: a roster entry is keyed by the transport's
//!   connection id, never by the peer's access key alone.
//! - **Owned Snapshots**: `RosterSnapshot` is a plain owned map, so whoever
//!   receives one cannot reach back into the registry that produced it.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
