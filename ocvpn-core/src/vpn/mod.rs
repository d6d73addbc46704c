//! VPN session module
//!
//! Drives a tunnel engine through one connection attempt, translates its
//! network parameters into route directives, and carries state and
//! credential prompts across the session boundary.

pub mod cidr;
pub mod credential;
pub mod engine;
pub mod handle;
pub mod host;
pub mod message;
pub mod routes;
pub mod service;
pub mod session;
pub mod state;
pub mod state_bus;

// Public re-exports
pub use cidr::Cidr;
pub use credential::{CredentialBroker, PendingCredential};
pub use engine::{
    AuthForm, EngineFactory, EngineHooks, FormField, FormFieldKind, FormResult, ProgressLevel,
    TunnelEngine,
};
pub use handle::{ConnectionHandle, CredentialPrompter};
pub use host::HostNetwork;
pub use message::{CredentialResponder, SessionCommand, SessionEvent};
pub use routes::{IpConfig, RouteConfigBuilder, RouteDirective, RoutePlan};
pub use service::{ServiceEndpoint, SessionService};
pub use session::{ConnectionOrchestrator, SessionOutcome};
pub use state::{ConnectionState, Severity, StateMessage, StatePublisher};
pub use state_bus::{SessionStateBus, StateStream};
