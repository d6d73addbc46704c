//! Messages exchanged across the session boundary
//!
//! The caller-side facade and the service that runs sessions only talk
//! through these types, carried over Tokio channels.

use crate::types::{CredentialPromptResponse, CredentialRequestKind};
use crate::vpn::state::StateMessage;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Facade to service
#[derive(Debug)]
pub enum SessionCommand {
    /// Start a session against `gateway`, reporting over `reply`
    StartConnection {
        gateway: String,
        reply: mpsc::UnboundedSender<SessionEvent>,
    },
    /// Cancel the active session, if any
    StopConnection,
}

/// Service to facade
#[derive(Debug)]
pub enum SessionEvent {
    StateUpdate(StateMessage),
    CredentialPromptRequest {
        kind: CredentialRequestKind,
        reply: CredentialResponder,
    },
}

/// Reply channel for one credential prompt
///
/// Clones share the same slot: the first reply wins and every later one
/// is ignored.
#[derive(Debug, Clone)]
pub struct CredentialResponder(Arc<Mutex<Option<oneshot::Sender<CredentialPromptResponse>>>>);

impl CredentialResponder {
    /// Create a responder and the receiving end the broker waits on
    pub fn channel() -> (Self, oneshot::Receiver<CredentialPromptResponse>) {
        let (tx, rx) = oneshot::channel();
        (Self(Arc::new(Mutex::new(Some(tx)))), rx)
    }

    /// Deliver a response; returns whether it reached a waiting request
    pub fn respond(&self, response: CredentialPromptResponse) -> bool {
        let sender = self
            .0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match sender {
            Some(sender) => sender.send(response).is_ok(),
            None => {
                debug!("Ignoring duplicate credential response");
                false
            }
        }
    }

    /// Reply with a username and password
    pub fn submit(&self, username: impl Into<String>, password: impl Into<String>) -> bool {
        self.respond(CredentialPromptResponse::submit(username, password))
    }

    /// Reply that the user cancelled the prompt
    pub fn abort(&self) -> bool {
        self.respond(CredentialPromptResponse::abort())
    }

    /// Whether a response can still be delivered
    pub fn is_open(&self) -> bool {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map_or(false, |sender| !sender.is_closed())
    }
}
