//! # Connection Lifecycle
//!
//! ```text
//! Connecting ──→ Authorizing ──→ Active ──→ Closed
//!      │              │
//!      └──────────────┴──→ Closed (establishment failed)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of one peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Connect signal received.
    Connecting,
    /// Identity extracted; authorization in progress.
    Authorizing,
    /// Authorized and present in the roster.
    Active,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Authorizing)
                | (Connecting, Closed)
                | (Authorizing, Active)
                | (Authorizing, Closed)
                | (Active, Closed)
        )
    }

    /// Whether the state is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Closed
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authorizing => "authorizing",
            ConnectionState::Active => "active",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
