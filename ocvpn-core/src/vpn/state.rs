//! VPN connection state management
//!
//! Defines the state machine for one connection attempt and the
//! thread-safe publisher that records the current state and emits state
//! messages across the session boundary.

use crate::error::VpnError;
use crate::vpn::message::SessionEvent;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// VPN connection states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No attempt has been made yet
    #[default]
    Unknown,
    /// Handshake with the gateway in progress
    Connecting,
    /// Waiting for the user's credentials
    Authenticating,
    /// Cookie obtained
    Authenticated,
    /// Tunnel device attached, packets flowing
    Connected,
    /// Attempt finished (terminal)
    Disconnected,
}

impl ConnectionState {
    /// Whether a new attempt may start from this state
    pub fn is_idle(&self) -> bool {
        matches!(self, ConnectionState::Unknown | ConnectionState::Disconnected)
    }

    /// Check whether the state machine allows moving to `next`
    ///
    /// `Disconnected` is reachable from anywhere; everything else only
    /// moves forward.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (_, Disconnected)
                | (Unknown | Disconnected, Connecting)
                | (Connecting | Authenticating, Authenticating)
                | (Connecting | Authenticating, Authenticated)
                | (Authenticated, Connected)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Unknown => write!(f, "unknown"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Authenticating => write!(f, "authenticating"),
            ConnectionState::Authenticated => write!(f, "authenticated"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Severity attached to a state message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Error,
    #[default]
    None,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Trace => write!(f, "trace"),
            Severity::Debug => write!(f, "debug"),
            Severity::Info => write!(f, "info"),
            Severity::Error => write!(f, "error"),
            Severity::None => write!(f, "none"),
        }
    }
}

/// One state report as seen by observers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateMessage {
    pub state: ConnectionState,
    pub severity: Severity,
    pub text: Option<String>,
}

impl StateMessage {
    /// A bare state change without text
    pub fn new(state: ConnectionState) -> Self {
        Self {
            state,
            severity: Severity::None,
            text: None,
        }
    }

    /// A state change with a message
    pub fn with_text(state: ConnectionState, severity: Severity, text: impl Into<String>) -> Self {
        Self {
            state,
            severity,
            text: Some(text.into()),
        }
    }
}

impl std::fmt::Display for StateMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.text {
            Some(text) => write!(f, "[{}] {}: {}", self.state, self.severity, text),
            None => write!(f, "[{}]", self.state),
        }
    }
}

#[derive(Debug)]
struct PublisherInner {
    state: ConnectionState,
    finished: bool,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

/// Thread-safe owner of the current connection state
///
/// Every read and write of the state, and every message sent across the
/// boundary, goes through one mutex, so observers receive messages in
/// exactly the order the transitions happened. Once the terminal
/// `Disconnected` message is out, the channel is dropped and nothing
/// else is published.
#[derive(Debug, Clone)]
pub struct StatePublisher(Arc<Mutex<PublisherInner>>);

impl StatePublisher {
    /// Create a publisher that reports over `events`
    pub fn new(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self(Arc::new(Mutex::new(PublisherInner {
            state: ConnectionState::Unknown,
            finished: false,
            events: Some(events),
        })))
    }

    /// A publisher with nowhere to send, for sessions whose caller is gone
    pub fn detached() -> Self {
        Self(Arc::new(Mutex::new(PublisherInner {
            state: ConnectionState::Unknown,
            finished: false,
            events: None,
        })))
    }

    fn lock(&self) -> MutexGuard<'_, PublisherInner> {
        // A poisoned lock still holds a consistent state value.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the current connection state
    pub fn current(&self) -> ConnectionState {
        self.lock().state
    }

    /// Whether the terminal message has been published
    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    /// Move to `next` and publish the message
    pub fn transition(
        &self,
        next: ConnectionState,
        severity: Severity,
        text: Option<String>,
    ) -> Result<(), VpnError> {
        let mut inner = self.lock();
        if inner.finished || !inner.state.can_transition_to(next) {
            warn!("Rejected state transition {} -> {}", inner.state, next);
            return Err(VpnError::InvalidStateTransition {
                from: inner.state.to_string(),
                to: next.to_string(),
            });
        }

        debug!("State transition {} -> {}", inner.state, next);
        inner.state = next;
        Self::send(
            &inner,
            SessionEvent::StateUpdate(StateMessage {
                state: next,
                severity,
                text,
            }),
        );
        Ok(())
    }

    /// Publish a message tagged with the current state
    pub fn report(&self, severity: Severity, text: impl Into<String>) {
        let inner = self.lock();
        if inner.finished {
            return;
        }
        let message = StateMessage::with_text(inner.state, severity, text);
        Self::send(&inner, SessionEvent::StateUpdate(message));
    }

    /// Send a non-state event (credential prompt) in order with state messages
    ///
    /// Returns `false` when the session has finished or the receiver is gone.
    pub fn send_event(&self, event: SessionEvent) -> bool {
        let inner = self.lock();
        !inner.finished && Self::send(&inner, event)
    }

    /// Publish the terminal `Disconnected` message and clear the channel
    ///
    /// Only the first call has any effect; returns whether it was this one.
    pub fn finish(&self, severity: Severity, text: Option<String>) -> bool {
        let mut inner = self.lock();
        if inner.finished {
            return false;
        }

        debug!("State transition {} -> {}", inner.state, ConnectionState::Disconnected);
        inner.state = ConnectionState::Disconnected;
        inner.finished = true;
        Self::send(
            &inner,
            SessionEvent::StateUpdate(StateMessage {
                state: ConnectionState::Disconnected,
                severity,
                text,
            }),
        );
        inner.events = None;
        true
    }

    fn send(inner: &PublisherInner, event: SessionEvent) -> bool {
        match &inner.events {
            Some(events) => events.send(event).is_ok(),
            None => false,
        }
    }
}
