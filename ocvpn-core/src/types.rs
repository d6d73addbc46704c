//! Type definitions and wrappers for secure data handling
//!
//! This module provides the credential types that cross the session
//! boundary, using the secrecy crate so passwords never show up in logs
//! or debug output.

use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

/// Username and password supplied by the caller for one auth form
///
/// Created by the caller's prompt handler and consumed exactly once by
/// the engine's auth-form callback.
#[derive(Clone, Debug)]
pub struct Credential {
    username: String,
    password: Secret<String>,
}

impl Credential {
    /// Create a new credential
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password.into()),
        }
    }

    /// The username, used for text form fields
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Expose the password value (use with caution!)
    ///
    /// Only the form-filling code should call this.
    pub fn expose_password(&self) -> &str {
        self.password.expose_secret()
    }
}

/// Why a credential prompt is issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialRequestKind {
    /// First prompt of the attempt
    NewRequest,
    /// The gateway rejected the previous entry
    RetryAfterFailure,
}

impl std::fmt::Display for CredentialRequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialRequestKind::NewRequest => write!(f, "new request"),
            CredentialRequestKind::RetryAfterFailure => write!(f, "retry after failure"),
        }
    }
}

/// Reply to a credential prompt as it travels back over the boundary
///
/// Absence of both fields (or both blank) signals that the user aborted.
#[derive(Clone, Debug, Default)]
pub struct CredentialPromptResponse {
    pub username: Option<String>,
    pub password: Option<Secret<String>>,
}

impl CredentialPromptResponse {
    /// A response carrying both values
    pub fn submit(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(Secret::new(password.into())),
        }
    }

    /// The abort response
    pub fn abort() -> Self {
        Self::default()
    }

    /// Whether the response carries neither a username nor a password
    pub fn is_abort(&self) -> bool {
        let blank_user = self.username.as_deref().map_or(true, |u| u.trim().is_empty());
        let blank_pass = self
            .password
            .as_ref()
            .map_or(true, |p| p.expose_secret().trim().is_empty());
        blank_user && blank_pass
    }

    /// Turn the response into a credential, `None` meaning abort
    ///
    /// A missing half of an otherwise non-blank response becomes an
    /// empty string.
    pub fn into_credential(self) -> Option<Credential> {
        if self.is_abort() {
            return None;
        }
        Some(Credential {
            username: self.username.unwrap_or_default(),
            password: self.password.unwrap_or_else(|| Secret::new(String::new())),
        })
    }
}
