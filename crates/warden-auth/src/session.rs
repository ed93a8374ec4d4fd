//! Authentication and impersonation state machine.
//!
//! ```text
//!                 authenticate              impersonate
//! Unauthenticated ────────────> Authenticated ──────────> Impersonating
//!        ^                          │    ^                     │
//!        └──────── unauthenticate ──┘    └──── unimpersonate ──┘
//!        ^                                                     │
//!        └─────────────────── unauthenticate ──────────────────┘
//! ```
//!
//! The state machine only tracks identities. Credential checks and the
//! `*IMPERSONATE` authorization happen before a transition is requested.

use serde::{Deserialize, Serialize};
use warden_core::Resource;

use crate::error::SessionError;

/// Who is logged in, and who is acting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticated {
        authenticated: Resource,
    },
    Impersonating {
        session: Resource,
        authenticated: Resource,
    },
}

impl SessionState {
    /// The resource whose credentials were checked.
    pub fn authenticated_resource(&self) -> Option<Resource> {
        match self {
            SessionState::Unauthenticated => None,
            SessionState::Authenticated { authenticated }
            | SessionState::Impersonating { authenticated, .. } => Some(*authenticated),
        }
    }

    /// The resource every permission check runs as.
    pub fn session_resource(&self) -> Option<Resource> {
        match self {
            SessionState::Unauthenticated => None,
            SessionState::Authenticated { authenticated } => Some(*authenticated),
            SessionState::Impersonating { session, .. } => Some(*session),
        }
    }

    pub fn is_impersonating(&self) -> bool {
        matches!(self, SessionState::Impersonating { .. })
    }

    /// `Unauthenticated` to `Authenticated(resource)`.
    pub fn authenticate(&mut self, resource: Resource) -> Result<(), SessionError> {
        match self {
            SessionState::Unauthenticated => {
                *self = SessionState::Authenticated {
                    authenticated: resource,
                };
                Ok(())
            }
            SessionState::Authenticated { authenticated }
            | SessionState::Impersonating { authenticated, .. } => {
                Err(SessionError::AlreadyAuthenticated(*authenticated))
            }
        }
    }

    /// `Authenticated(a)` to `Impersonating(resource, a)`.
    pub fn impersonate(&mut self, resource: Resource) -> Result<(), SessionError> {
        match *self {
            SessionState::Unauthenticated => Err(SessionError::NotAuthenticated),
            SessionState::Authenticated { authenticated } => {
                *self = SessionState::Impersonating {
                    session: resource,
                    authenticated,
                };
                Ok(())
            }
            SessionState::Impersonating { session, .. } => {
                Err(SessionError::AlreadyImpersonating(session))
            }
        }
    }

    /// `Impersonating(s, a)` back to `Authenticated(a)`.
    pub fn unimpersonate(&mut self) -> Result<(), SessionError> {
        match *self {
            SessionState::Impersonating { authenticated, .. } => {
                *self = SessionState::Authenticated { authenticated };
                Ok(())
            }
            _ => Err(SessionError::NotImpersonating),
        }
    }

    /// Any authenticated state back to `Unauthenticated`.
    pub fn unauthenticate(&mut self) -> Result<(), SessionError> {
        if *self == SessionState::Unauthenticated {
            return Err(SessionError::NotAuthenticated);
        }
        *self = SessionState::Unauthenticated;
        Ok(())
    }
}
