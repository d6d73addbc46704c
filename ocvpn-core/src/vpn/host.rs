//! Host network collaborator
//!
//! Creating the tunnel interface and exempting engine sockets from it are
//! operating-system concerns. The session reaches them only through this
//! trait.

use crate::vpn::routes::RoutePlan;
use std::io;
use std::os::fd::{OwnedFd, RawFd};

/// Operating-system side of a tunnel session
pub trait HostNetwork: Send + Sync {
    /// Create the tunnel interface configured by `plan` and return its fd
    ///
    /// The fd is closed when the session drops it.
    fn establish(&self, plan: &RoutePlan) -> io::Result<OwnedFd>;

    /// Exempt a socket from the tunnel's routes
    fn protect_socket(&self, fd: RawFd) -> bool;

    /// A session is starting; hold whatever keeps the process alive
    fn session_started(&self) {}

    /// The session has been torn down
    fn session_finished(&self) {}
}
