//! Connection orchestrator
//!
//! Drives one tunnel engine through a single connection attempt: target,
//! authentication, secure channel, tunnel device, packet loop. Every exit
//! path destroys the engine and publishes exactly one terminal
//! `Disconnected` message.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::vpn::credential::CredentialBroker;
use crate::vpn::engine::{EngineFactory, EngineHooks, TunnelEngine};
use crate::vpn::host::HostNetwork;
use crate::vpn::message::SessionEvent;
use crate::vpn::routes::RouteConfigBuilder;
use crate::vpn::state::{ConnectionState, Severity, StatePublisher};
use std::os::fd::AsRawFd;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The packet loop ended on its own
    Terminated,
    /// The caller stopped the session
    Cancelled,
    Failed(SessionError),
}

/// Runs one connection attempt on a blocking thread
pub struct ConnectionOrchestrator {
    gateway: String,
    config: SessionConfig,
    factory: Arc<dyn EngineFactory>,
    host: Arc<dyn HostNetwork>,
    publisher: StatePublisher,
    cancel: CancellationToken,
    runtime: Handle,
    engine: Option<Box<dyn TunnelEngine>>,
    started: bool,
}

impl std::fmt::Debug for ConnectionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionOrchestrator")
            .field("gateway", &self.gateway)
            .field("state", &self.publisher.current())
            .field("engine", &self.engine.is_some())
            .finish()
    }
}

impl ConnectionOrchestrator {
    /// Prepare a session against `gateway`
    ///
    /// State messages and credential prompts are sent over `events`.
    /// `runtime` is used for the credential wait and for socket protection
    /// tasks, so it must outlive the session.
    pub fn new(
        gateway: impl Into<String>,
        config: SessionConfig,
        factory: Arc<dyn EngineFactory>,
        host: Arc<dyn HostNetwork>,
        events: mpsc::UnboundedSender<SessionEvent>,
        runtime: Handle,
    ) -> Self {
        Self {
            gateway: gateway.into(),
            config,
            factory,
            host,
            publisher: StatePublisher::new(events),
            cancel: CancellationToken::new(),
            runtime,
            engine: None,
            started: false,
        }
    }

    /// Token that stops this session when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Handle on this session's state
    pub fn state(&self) -> StatePublisher {
        self.publisher.clone()
    }

    /// Run the session to completion
    ///
    /// Blocks the calling thread for the whole session; call it from
    /// `spawn_blocking` or a dedicated thread, never from async code.
    #[tracing::instrument(skip(self), fields(gateway = %self.gateway))]
    pub fn run(mut self) -> SessionOutcome {
        self.started = true;
        self.host.session_started();

        let result = self.connect();
        self.teardown(result)
    }

    fn connect(&mut self) -> Result<(), SessionError> {
        self.publisher.transition(
            ConnectionState::Connecting,
            Severity::Info,
            Some("Begin VPN connection".to_string()),
        )?;

        let broker = CredentialBroker::new(self.publisher.clone(), self.cancel.clone());
        let hooks = EngineHooks::new(
            self.publisher.clone(),
            broker,
            self.host.clone(),
            self.runtime.clone(),
            self.cancel.clone(),
        );
        self.engine = Some(self.factory.create(hooks)?);
        debug!("Tunnel engine created");

        let gateway = self.gateway.clone();
        let code = self.engine()?.parse_target(&gateway);
        if code != 0 {
            return Err(SessionError::TargetRejected { code });
        }
        self.ensure_active()?;

        info!("Obtaining authentication cookie");
        let code = self.engine()?.obtain_auth_cookie();
        self.ensure_active()?;
        match code {
            0 => {}
            code if code < 0 => return Err(SessionError::AuthenticationFailed { code }),
            _ => return Err(SessionError::AuthenticationAborted),
        }
        self.publisher
            .transition(ConnectionState::Authenticated, Severity::None, None)?;

        info!("Establishing secure channel");
        let code = self.engine()?.establish_secure_channel();
        if code != 0 {
            return Err(SessionError::ChannelEstablishment { code });
        }
        self.ensure_active()?;

        let ip = self.engine()?.ip_config().ok_or(SessionError::MissingIpConfig)?;
        let plan = RouteConfigBuilder::new(self.config.mtu_floor).build(&ip);
        for skipped in &plan.skipped {
            self.publisher.report(Severity::Error, skipped.to_string());
        }
        debug!(
            "Route plan: {} directives, {} skipped",
            plan.directives.len(),
            plan.skipped.len()
        );

        let device = self
            .host
            .establish(&plan)
            .map_err(|e| SessionError::TunnelSetup {
                reason: format!("cannot create tunnel interface: {}", e),
            })?;
        self.ensure_active()?;

        let code = self.engine()?.attach_tunnel_device(device.as_raw_fd());
        if code != 0 {
            return Err(SessionError::TunnelSetup {
                reason: format!("engine rejected tunnel fd (code {})", code),
            });
        }
        self.publisher
            .transition(ConnectionState::Connected, Severity::None, None)?;
        info!("Tunnel is up");

        if let Some(period) = self.config.dtls_attempt_period() {
            let code = self.engine()?.setup_dtls(period);
            if code != 0 {
                warn!("DTLS setup failed with code {}", code);
                self.publisher
                    .report(Severity::Info, "DTLS unavailable, continuing over CSTP");
            }
        }

        let result = self.packet_loop();
        drop(device);
        result
    }

    fn packet_loop(&mut self) -> Result<(), SessionError> {
        let timeout = self.config.loop_timeout();
        let reconnect_interval = self.config.reconnect_interval();
        loop {
            self.ensure_active()?;
            let code = self.engine()?.run_loop_step(timeout, reconnect_interval);
            if code < 0 {
                info!("Packet loop ended with code {}", code);
                return Ok(());
            }
        }
    }

    fn engine(&mut self) -> Result<&mut (dyn TunnelEngine + 'static), SessionError> {
        self.engine
            .as_deref_mut()
            .ok_or_else(|| SessionError::EngineCreation {
                reason: "engine already released".to_string(),
            })
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.cancel.is_cancelled() {
            Err(SessionError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn teardown(&mut self, result: Result<(), SessionError>) -> SessionOutcome {
        if let Some(mut engine) = self.engine.take() {
            engine.destroy();
            debug!("Tunnel engine destroyed");
        }

        let (severity, text, outcome) = match result {
            Ok(()) => (
                Severity::Info,
                "VPN terminated".to_string(),
                SessionOutcome::Terminated,
            ),
            Err(SessionError::Cancelled) => (
                Severity::Info,
                "VPN terminated".to_string(),
                SessionOutcome::Cancelled,
            ),
            Err(e @ SessionError::AuthenticationAborted) => {
                (Severity::Info, e.to_string(), SessionOutcome::Failed(e))
            }
            Err(e) => (Severity::Error, e.to_string(), SessionOutcome::Failed(e)),
        };

        match &outcome {
            SessionOutcome::Failed(e) => warn!("Session failed: {}", e),
            other => info!("Session ended: {:?}", other),
        }

        // Released before Disconnected goes out; the next session may start
        // as soon as that message is seen.
        if self.started {
            self.started = false;
            self.host.session_finished();
        }

        self.publisher.finish(severity, Some(text));
        // Wakes anything still waiting on this session.
        self.cancel.cancel();
        outcome
    }
}

impl Drop for ConnectionOrchestrator {
    fn drop(&mut self) {
        if self.started || self.engine.is_some() {
            warn!("Session dropped while running, tearing down");
            self.teardown(Err(SessionError::Cancelled));
        }
    }
}
