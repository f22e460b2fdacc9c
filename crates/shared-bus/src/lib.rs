//! # Shared Bus - Membership Event Bus
//!
//! Publish/subscribe for peer join and leave events, keyed by
//! `(EventKind, DiscoveryKey)`.
//!
//! ## Delivery Rules
//!
//! - Delivery is synchronous: every handler subscribed to the event's exact
//!   key when `publish` is called has run before `publish` returns.
//! - Handlers run in subscription order.
//! - A panicking handler is caught and logged; the remaining handlers still
//!   receive the event.
//! - Nothing is queued or persisted. An event with no subscribers is dropped.
//!
//! ```text
//! ┌──────────────┐                     ┌──────────────┐
//! │  Membership  │                     │ Application  │
//! │   Registry   │    publish()        │   handlers   │
//! │              │ ──────┐             │              │
//! └──────────────┘       │             └──────────────┘
//!                        ▼                     ↑
//!                  ┌──────────────┐            │
//!                  │  Event Bus   │ ───────────┘
//!                  │ (kind, key)  │  subscribe(kind, resource)
//!                  └──────────────┘
//! ```
//!
//! Each supervisor owns its own bus; there is no process-wide instance.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventKey, EventKind, MembershipEvent};
pub use publisher::{EventHandler, EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};
