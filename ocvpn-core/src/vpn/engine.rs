//! Tunnel engine contract
//!
//! The engine performs the actual protocol work (TLS handshake, cookie
//! authentication, packet forwarding). The session core only drives it
//! through [`TunnelEngine`] and answers its callbacks through
//! [`EngineHooks`]. Return codes follow the engine's C conventions:
//! 0 is success, negative is failure.

use crate::error::{SessionError, VpnError};
use crate::types::CredentialRequestKind;
use crate::vpn::credential::{fill_form, CredentialBroker};
use crate::vpn::host::HostNetwork;
use crate::vpn::routes::IpConfig;
use crate::vpn::state::{ConnectionState, Severity, StatePublisher};
use std::os::fd::RawFd;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Kind of an auth form field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormFieldKind {
    /// Free text, receives the username
    Text,
    /// Secret entry, receives the password
    Password,
    /// Select lists, hidden fields, tokens
    Other,
}

/// One field of an auth form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub kind: FormFieldKind,
    /// The engine asks for this field to be left alone
    pub ignore: bool,
    pub value: Option<String>,
}

impl FormField {
    /// An empty, non-ignored field
    pub fn new(name: impl Into<String>, kind: FormFieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ignore: false,
            value: None,
        }
    }
}

/// Auth form presented by the gateway
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthForm {
    /// Banner/message text from the gateway
    pub message: Option<String>,
    /// Set when the gateway rejected the previous submission
    pub error: Option<String>,
    pub fields: Vec<FormField>,
}

/// Answer to an auth form callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormResult {
    Ok,
    Cancelled,
    Error,
}

impl FormResult {
    /// Engine return code for this result
    pub fn code(&self) -> i32 {
        match self {
            FormResult::Ok => 0,
            FormResult::Cancelled => 1,
            FormResult::Error => -1,
        }
    }
}

/// Progress level of an engine log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressLevel {
    Error,
    Info,
    Debug,
    Trace,
}

impl ProgressLevel {
    /// Map an engine level code (0 = error .. 3 = trace)
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ProgressLevel::Error,
            1 => ProgressLevel::Info,
            2 => ProgressLevel::Debug,
            _ => ProgressLevel::Trace,
        }
    }

    /// Severity used when republishing the line
    pub fn severity(&self) -> Severity {
        match self {
            ProgressLevel::Error => Severity::Error,
            ProgressLevel::Info => Severity::Info,
            ProgressLevel::Debug => Severity::Debug,
            ProgressLevel::Trace => Severity::Trace,
        }
    }
}

/// Imperative contract of a tunnel engine instance
///
/// The session owns the instance exclusively for one attempt and calls
/// [`destroy`](TunnelEngine::destroy) on every exit path.
pub trait TunnelEngine: Send {
    /// Set the gateway to connect to
    fn parse_target(&mut self, target: &str) -> i32;

    /// Authenticate; may call back into the auth-form hook any number of
    /// times. 0 = cookie obtained, negative = failure, positive = aborted.
    fn obtain_auth_cookie(&mut self) -> i32;

    /// Open the CSTP channel using the cookie
    fn establish_secure_channel(&mut self) -> i32;

    /// Try to add a DTLS channel, retrying every `attempt_period`
    fn setup_dtls(&mut self, attempt_period: Duration) -> i32;

    /// Hand the tunnel device to the engine
    fn attach_tunnel_device(&mut self, fd: RawFd) -> i32;

    /// Run one step of the packet loop; negative ends the loop
    fn run_loop_step(&mut self, timeout: Duration, reconnect_interval: Duration) -> i32;

    /// Network parameters negotiated with the gateway
    fn ip_config(&self) -> Option<IpConfig>;

    /// Release all engine resources
    fn destroy(&mut self);
}

/// Creates one engine per connection attempt
pub trait EngineFactory: Send + Sync {
    fn create(&self, hooks: EngineHooks) -> Result<Box<dyn TunnelEngine>, SessionError>;
}

/// Callbacks the engine invokes into the session core
///
/// All hooks are called from the engine's own (blocking) thread.
#[derive(Clone)]
pub struct EngineHooks {
    publisher: StatePublisher,
    broker: CredentialBroker,
    host: Arc<dyn HostNetwork>,
    runtime: Handle,
    cancel: CancellationToken,
}

impl std::fmt::Debug for EngineHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHooks")
            .field("state", &self.publisher.current())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl EngineHooks {
    pub(crate) fn new(
        publisher: StatePublisher,
        broker: CredentialBroker,
        host: Arc<dyn HostNetwork>,
        runtime: Handle,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            publisher,
            broker,
            host,
            runtime,
            cancel,
        }
    }

    /// Fill an auth form with credentials obtained from the caller
    ///
    /// Blocks the calling thread until the caller answers or the session
    /// is cancelled. Must not be called from inside an async context.
    pub fn process_auth_form(&self, form: &mut AuthForm) -> FormResult {
        if self.cancel.is_cancelled() {
            return FormResult::Cancelled;
        }

        if let Err(e) = self
            .publisher
            .transition(ConnectionState::Authenticating, Severity::None, None)
        {
            error!("Auth form arrived in an unexpected state: {}", e);
            return FormResult::Error;
        }

        if let Some(error) = &form.error {
            self.publisher
                .report(Severity::Info, format!("AUTH: error {}", error));
        }
        if let Some(message) = &form.message {
            self.publisher
                .report(Severity::Info, format!("AUTH: message {}", message));
        }

        let kind = if form.error.is_some() {
            CredentialRequestKind::RetryAfterFailure
        } else {
            CredentialRequestKind::NewRequest
        };

        let pending = match self.broker.request(kind) {
            Ok(pending) => pending,
            Err(e) => {
                error!("Cannot prompt for credentials: {}", e);
                return FormResult::Error;
            }
        };

        match self.runtime.block_on(pending.wait()) {
            Some(credential) if !self.cancel.is_cancelled() => {
                fill_form(form, &credential);
                debug!("Auth form filled ({} fields)", form.fields.len());
                FormResult::Ok
            }
            _ => {
                info!("Authentication form cancelled");
                FormResult::Cancelled
            }
        }
    }

    /// Mirror an engine progress line into the log and the state stream
    pub fn progress(&self, level: ProgressLevel, text: &str) {
        let text = text.trim_end();
        match level {
            ProgressLevel::Error => error!(target: "ocvpn::engine", "{}", text),
            ProgressLevel::Info => info!(target: "ocvpn::engine", "{}", text),
            ProgressLevel::Debug => debug!(target: "ocvpn::engine", "{}", text),
            ProgressLevel::Trace => trace!(target: "ocvpn::engine", "{}", text),
        }
        self.publisher.report(level.severity(), text);
    }

    /// Ask the host to exempt an engine socket from the tunnel
    ///
    /// Runs on the runtime's blocking pool and returns immediately. A
    /// failed protect is reported as an error message but does not end the
    /// session. Returns `false` if the session is already cancelled.
    pub fn protect_socket(&self, fd: RawFd) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let host = self.host.clone();
        let publisher = self.publisher.clone();
        let cancel = self.cancel.clone();
        self.runtime.spawn_blocking(move || {
            if cancel.is_cancelled() {
                return;
            }
            if host.protect_socket(fd) {
                debug!("Protected socket {}", fd);
            } else {
                warn!("Failed to protect socket {}", fd);
                publisher.report(Severity::Error, "Cannot protect the tunnel");
            }
        });
        true
    }
}

static ENGINE_INIT: OnceLock<i32> = OnceLock::new();

/// One-time, process-wide engine library initialisation
///
/// `init` runs on the first call only; later calls return the first
/// result. A non-zero code is reported as `VpnError::EngineInit`.
pub fn initialize<F>(init: F) -> Result<(), VpnError>
where
    F: FnOnce() -> i32,
{
    let code = *ENGINE_INIT.get_or_init(|| {
        info!("Initializing tunnel engine library");
        init()
    });

    if code == 0 {
        Ok(())
    } else {
        error!("Tunnel engine library initialisation failed: {}", code);
        Err(VpnError::EngineInit { code })
    }
}
