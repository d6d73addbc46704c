//! Asynchronous credential hand-off
//!
//! The engine asks for credentials from inside a synchronous callback,
//! while the answer comes from a UI on the other side of the session
//! boundary, possibly much later. The broker sends one prompt, hands back
//! a [`PendingCredential`] to wait on, and refuses a second prompt while
//! the first is unanswered.

use crate::error::CredentialError;
use crate::types::{Credential, CredentialPromptResponse, CredentialRequestKind};
use crate::vpn::engine::{AuthForm, FormFieldKind};
use crate::vpn::message::{CredentialResponder, SessionEvent};
use crate::vpn::state::StatePublisher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Issues credential prompts over the session boundary
#[derive(Debug, Clone)]
pub struct CredentialBroker {
    publisher: StatePublisher,
    cancel: CancellationToken,
    pending: Arc<AtomicBool>,
}

impl CredentialBroker {
    /// Create a broker that prompts through `publisher` and gives up
    /// when `cancel` fires
    pub fn new(publisher: StatePublisher, cancel: CancellationToken) -> Self {
        Self {
            publisher,
            cancel,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a request is currently outstanding
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Send a prompt and return the handle to wait on
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::RequestPending` if an earlier request has
    /// not resolved yet; the earlier request is left untouched.
    pub fn request(&self, kind: CredentialRequestKind) -> Result<PendingCredential, CredentialError> {
        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Credential request ({}) rejected: another one is pending", kind);
            return Err(CredentialError::RequestPending);
        }

        let (reply, rx) = CredentialResponder::channel();
        info!("Requesting credentials ({})", kind);
        if !self
            .publisher
            .send_event(SessionEvent::CredentialPromptRequest { kind, reply })
        {
            // The dropped responder resolves the request to None.
            warn!("Nobody is listening for credential prompts");
        }

        Ok(PendingCredential {
            rx,
            cancel: self.cancel.clone(),
            pending: self.pending.clone(),
        })
    }
}

/// An outstanding credential request
///
/// Resolves exactly once: to the first reply, or to `None` on abort,
/// cancellation, or when the reply side disappears.
#[derive(Debug)]
pub struct PendingCredential {
    rx: oneshot::Receiver<CredentialPromptResponse>,
    cancel: CancellationToken,
    pending: Arc<AtomicBool>,
}

impl PendingCredential {
    /// Wait for the reply
    pub async fn wait(mut self) -> Option<Credential> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("Credential request cancelled");
                None
            }
            response = &mut self.rx => match response {
                Ok(response) => response.into_credential(),
                Err(_) => {
                    debug!("Credential reply channel closed without an answer");
                    None
                }
            },
        }
    }
}

impl Drop for PendingCredential {
    fn drop(&mut self) {
        self.pending.store(false, Ordering::Release);
    }
}

/// Copy a credential into every non-ignored text and password field
///
/// Other field kinds keep whatever value the engine put there.
pub fn fill_form(form: &mut AuthForm, credential: &Credential) {
    for field in form.fields.iter_mut().filter(|field| !field.ignore) {
        match field.kind {
            FormFieldKind::Text => field.value = Some(credential.username().to_string()),
            FormFieldKind::Password => field.value = Some(credential.expose_password().to_string()),
            FormFieldKind::Other => {}
        }
    }
}
