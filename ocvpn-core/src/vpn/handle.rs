//! Caller-side facade
//!
//! A [`ConnectionHandle`] validates the target, starts and stops sessions
//! through a [`ServiceEndpoint`], republishes every state message on a
//! [`SessionStateBus`] and forwards credential prompts to a
//! [`CredentialPrompter`].

use crate::config::normalize_gateway;
use crate::error::{OcvpnError, VpnError};
use crate::types::CredentialRequestKind;
use crate::vpn::message::{CredentialResponder, SessionCommand, SessionEvent};
use crate::vpn::service::ServiceEndpoint;
use crate::vpn::state::StateMessage;
use crate::vpn::state_bus::{SessionStateBus, StateStream};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Answers credential prompts, usually by asking a person
///
/// `prompt` must not block. Reply through `reply` whenever the answer is
/// available; dropping every clone of it without replying aborts the
/// request.
pub trait CredentialPrompter: Send + Sync + 'static {
    fn prompt(&self, kind: CredentialRequestKind, reply: CredentialResponder);
}

impl<F> CredentialPrompter for F
where
    F: Fn(CredentialRequestKind, CredentialResponder) + Send + Sync + 'static,
{
    fn prompt(&self, kind: CredentialRequestKind, reply: CredentialResponder) {
        self(kind, reply)
    }
}

/// Start/stop/observe access to the session service
pub struct ConnectionHandle {
    endpoint: ServiceEndpoint,
    bus: SessionStateBus,
    prompter: Arc<dyn CredentialPrompter>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("endpoint", &self.endpoint)
            .field("latest", &self.bus.latest())
            .finish()
    }
}

impl ConnectionHandle {
    pub fn new(endpoint: ServiceEndpoint, prompter: impl CredentialPrompter) -> Self {
        Self {
            endpoint,
            bus: SessionStateBus::new(),
            prompter: Arc::new(prompter),
        }
    }

    /// Request a session against `target`
    ///
    /// Returns once the request is queued; progress arrives on
    /// [`observe_state`](Self::observe_state). A start while a session is
    /// already running is ignored by the service.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidGateway` for a blank or unparsable target,
    /// `VpnError::ServiceUnavailable` when called outside a Tokio runtime
    /// or after the service stopped.
    pub fn start(&self, target: &str) -> Result<(), OcvpnError> {
        let gateway = normalize_gateway(target)?;
        let runtime = Handle::try_current().map_err(|_| VpnError::ServiceUnavailable)?;

        let (reply, events) = mpsc::unbounded_channel();
        runtime.spawn(pump_events(events, self.bus.clone(), self.prompter.clone()));

        info!("Requesting session to {}", gateway);
        if !self
            .endpoint
            .send(SessionCommand::StartConnection { gateway, reply })
        {
            return Err(VpnError::ServiceUnavailable.into());
        }
        Ok(())
    }

    /// Ask the running session, if any, to stop
    pub fn stop(&self) {
        if self.endpoint.send(SessionCommand::StopConnection) {
            debug!("Stop requested");
        }
    }

    /// Subscribe to state messages, starting with the latest one
    pub fn observe_state(&self) -> StateStream {
        self.bus.subscribe()
    }

    /// The most recent state message
    pub fn latest_state(&self) -> StateMessage {
        self.bus.latest()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn pump_events(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    bus: SessionStateBus,
    prompter: Arc<dyn CredentialPrompter>,
) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::StateUpdate(message) => bus.publish(message),
            SessionEvent::CredentialPromptRequest { kind, reply } => prompter.prompt(kind, reply),
        }
    }
    debug!("Session event stream closed");
}
