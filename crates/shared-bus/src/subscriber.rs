//! # Event Subscriber
//!
//! Defines the subscription side of the event bus.

use crate::events::{EventKey, MembershipEvent};
use crate::publisher::HandlerTable;
use parking_lot::RwLock;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was dropped.
    #[error("Event bus closed")]
    Closed,
}

/// A subscription handle.
///
/// When dropped, the handler is removed from the bus. The handle holds only
/// a weak reference, so it never keeps a bus alive.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    table: Weak<RwLock<HandlerTable>>,
    key: EventKey,
    id: u64,
    detached: bool,
}

impl Subscription {
    pub(crate) fn new(table: Weak<RwLock<HandlerTable>>, key: EventKey, id: u64) -> Self {
        Self {
            table,
            key,
            id,
            detached: false,
        }
    }

    /// The key this subscription listens on.
    #[must_use]
    pub fn key(&self) -> EventKey {
        self.key
    }

    /// Keep the handler registered for the lifetime of the bus.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        let Some(table) = self.table.upgrade() else {
            return;
        };
        if table.write().remove(&self.key, self.id) {
            debug!(key = %self.key, "Subscription dropped");
        }
    }
}

/// An async stream of the events on one key.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct EventStream {
    subscription: Subscription,
    receiver: mpsc::UnboundedReceiver<MembershipEvent>,
}

impl EventStream {
    pub(crate) fn new(
        subscription: Subscription,
        receiver: mpsc::UnboundedReceiver<MembershipEvent>,
    ) -> Self {
        Self {
            subscription,
            receiver,
        }
    }

    /// Receive the next event.
    ///
    /// # Returns
    ///
    /// - `Some(event)` - The next event on this key
    /// - `None` - The bus was dropped
    pub async fn recv(&mut self) -> Option<MembershipEvent> {
        self.receiver.recv().await
    }

    /// Try to receive the next event without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(event))` - An event was buffered
    /// - `Ok(None)` - Nothing buffered yet
    /// - `Err(SubscriptionError::Closed)` - The bus was dropped
    pub fn try_recv(&mut self) -> Result<Option<MembershipEvent>, SubscriptionError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(SubscriptionError::Closed),
        }
    }

    /// The key this stream listens on.
    #[must_use]
    pub fn key(&self) -> EventKey {
        self.subscription.key()
    }
}

impl Stream for EventStream {
    type Item = MembershipEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
