//! Latest-value broadcast of session state
//!
//! Observers that join late first see the most recent message, then
//! every later one in emission order.

use crate::vpn::state::StateMessage;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug, Default)]
struct BusInner {
    latest: StateMessage,
    subscribers: Vec<mpsc::UnboundedSender<StateMessage>>,
}

/// Single-slot holder of the latest [`StateMessage`] plus a fan-out list
#[derive(Debug, Clone, Default)]
pub struct SessionStateBus(Arc<Mutex<BusInner>>);

impl SessionStateBus {
    /// Create a bus holding the default (unknown) state
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `message` and forward it to every live subscriber
    pub fn publish(&self, message: StateMessage) {
        let mut inner = self.lock();
        trace!("Publishing {}", message);
        inner
            .subscribers
            .retain(|subscriber| subscriber.send(message.clone()).is_ok());
        inner.latest = message;
    }

    /// The most recent message
    pub fn latest(&self) -> StateMessage {
        self.lock().latest.clone()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|subscriber| !subscriber.is_closed());
        inner.subscribers.len()
    }

    /// Subscribe; the stream starts with the latest message
    pub fn subscribe(&self) -> StateStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        // Cannot fail: the receiver is still in hand.
        let _ = tx.send(inner.latest.clone());
        inner.subscribers.push(tx);
        StateStream { rx }
    }
}

/// One subscription to a [`SessionStateBus`]
#[derive(Debug)]
pub struct StateStream {
    rx: mpsc::UnboundedReceiver<StateMessage>,
}

impl StateStream {
    /// Next message; `None` only once the bus itself is gone
    pub async fn next(&mut self) -> Option<StateMessage> {
        self.rx.recv().await
    }

    /// Next message if one is already queued
    pub fn try_next(&mut self) -> Option<StateMessage> {
        self.rx.try_recv().ok()
    }
}
