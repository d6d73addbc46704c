//! Session service
//!
//! Owns at most one running session. Commands arrive over a channel from
//! any number of [`ServiceEndpoint`]s; each session reports back over the
//! reply channel given with its start command.

use crate::config::{normalize_gateway, SessionConfig};
use crate::vpn::engine::EngineFactory;
use crate::vpn::host::HostNetwork;
use crate::vpn::message::{SessionCommand, SessionEvent};
use crate::vpn::session::{ConnectionOrchestrator, SessionOutcome};
use crate::vpn::state::{ConnectionState, Severity, StateMessage, StatePublisher};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Sending side of the service's command channel
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl ServiceEndpoint {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<SessionCommand>) {
        let (commands, rx) = mpsc::unbounded_channel();
        (Self { commands }, rx)
    }

    /// Send a command; returns `false` once the service has stopped
    pub fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Whether the service is still accepting commands
    pub fn is_connected(&self) -> bool {
        !self.commands.is_closed()
    }
}

struct ActiveSession {
    cancel: CancellationToken,
    state: StatePublisher,
    task: JoinHandle<SessionOutcome>,
}

impl ActiveSession {
    fn is_running(&self) -> bool {
        !self.task.is_finished() && !self.state.is_finished()
    }
}

/// Runs sessions on behalf of remote callers
pub struct SessionService {
    factory: Arc<dyn EngineFactory>,
    host: Arc<dyn HostNetwork>,
    config: SessionConfig,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    active: Option<ActiveSession>,
}

impl SessionService {
    /// Create a service and the endpoint used to reach it
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        host: Arc<dyn HostNetwork>,
        config: SessionConfig,
    ) -> (Self, ServiceEndpoint) {
        let (endpoint, commands) = ServiceEndpoint::channel();
        let service = Self {
            factory,
            host,
            config,
            commands,
            active: None,
        };
        (service, endpoint)
    }

    /// Create a service and run it as a background task
    pub fn spawn(
        factory: Arc<dyn EngineFactory>,
        host: Arc<dyn HostNetwork>,
        config: SessionConfig,
    ) -> (ServiceEndpoint, JoinHandle<()>) {
        let (service, endpoint) = Self::new(factory, host, config);
        (endpoint, tokio::spawn(service.run()))
    }

    /// Process commands until every endpoint is dropped
    ///
    /// The active session, if any, is cancelled and awaited on exit.
    pub async fn run(mut self) {
        info!("Session service started");
        while let Some(command) = self.commands.recv().await {
            match command {
                SessionCommand::StartConnection { gateway, reply } => self.start(gateway, reply),
                SessionCommand::StopConnection => self.stop(),
            }
        }

        info!("Session service shutting down");
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            match active.task.await {
                Ok(outcome) => debug!("Last session ended: {:?}", outcome),
                Err(e) => error!("Session task failed: {}", e),
            }
        }
    }

    fn start(&mut self, gateway: String, reply: mpsc::UnboundedSender<SessionEvent>) {
        if self.active.as_ref().map_or(false, ActiveSession::is_running) {
            warn!("Ignoring start for {}: a session is already running", gateway);
            return;
        }

        let gateway = match normalize_gateway(&gateway) {
            Ok(gateway) => gateway,
            Err(e) => {
                warn!("Refusing to start session: {}", e);
                let _ = reply.send(SessionEvent::StateUpdate(StateMessage::with_text(
                    ConnectionState::Disconnected,
                    Severity::Error,
                    e.to_string(),
                )));
                return;
            }
        };

        let mut config = self.config.clone();
        config.gateway = gateway.clone();

        let orchestrator = ConnectionOrchestrator::new(
            gateway,
            config,
            self.factory.clone(),
            self.host.clone(),
            reply,
            Handle::current(),
        );
        let cancel = orchestrator.cancel_token();
        let state = orchestrator.state();
        let task = tokio::task::spawn_blocking(move || orchestrator.run());

        self.active = Some(ActiveSession {
            cancel,
            state,
            task,
        });
    }

    fn stop(&mut self) {
        match &self.active {
            Some(active) if active.is_running() => {
                info!("Stopping session (state {})", active.state.current());
                active.cancel.cancel();
            }
            _ => debug!("Stop requested with no running session"),
        }
    }
}
