//! The [`Discovery`] contract: resolving a user-supplied identifier to a
//! provider endpoint and (for OpenID-identifier logins) a claimed identity.
//!
//! This crate does not implement Yadis or HTML-based discovery itself;
//! that's a substantial, separately-versioned protocol in its own right.
//! `Discovery` is the seam a host application implements it behind.

use std::sync::Arc;

use thiserror::Error;

/// The result of resolving a user-supplied identifier to a provider
/// endpoint. All three fields are absolute URLs; `identity_url` is the
/// user-visible result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// The canonical URL the user claims as their identity. This is what a
    /// successful [`crate::ConsumerResponse::Success`] reports back.
    pub identity_url: String,

    /// The "delegate" identity the provider actually knows the user by.
    /// Equal to `identity_url` unless the user has delegated their identity
    /// page to a different OP-local identifier.
    pub server_id: String,

    /// The provider endpoint authentication requests are sent to.
    pub server_url: String,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no OpenID service found for identifier {0:?}")]
    NotFound(String),

    #[error("discovery transport error: {0}")]
    Transport(String),

    #[error("malformed discovery document: {0}")]
    Malformed(String),
}

/// Resolves a user-supplied identifier to the endpoint that should receive
/// the authentication request.
pub trait Discovery: Send + Sync {
    fn discover(&self, identifier: &str) -> Result<ServiceEndpoint, DiscoveryError>;
}

/// Type-erased, shared handle to a [`Discovery`] implementation.
pub type DynDiscovery = Arc<dyn Discovery>;
