//! The [`Session`] contract: a narrow string key/value store a host
//! application wires up to whatever survives an HTTP redirect round-trip
//! (a server-side session, a signed cookie, ...). The protocol core needs
//! exactly three operations against it (get, set, del) and stores exactly
//! one thing of its own under a single key: the most recent outstanding
//! [`crate::token`].
//!
//! This is deliberately narrower than [`crate::store::Store`]: associations
//! and nonces outlive (and are shared across) many authentication attempts,
//! so they go through the store instead.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Per-identifier discovery bookkeeping, addressed through [`Session`] under
/// a derived key rather than mutated by reference. There is no shared
/// mutable discovery-manager object here; instead
/// [`crate::consumer::GenericConsumer::begin`] reads this struct, decides
/// what changed, and writes the whole value back through [`Session::set`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryManagerState {
    pub identifier: String,
    pub server_url: String,
    pub server_id: String,
    pub identity_url: String,
    pub stale: bool,
}

/// Short-lived, per-authentication-attempt state a host application keeps
/// around between [`crate::ConsumerFacade::begin`] and
/// [`crate::ConsumerFacade::complete`].
pub trait Session: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn del(&self, key: &str);
}

/// Type-erased, shared handle to a [`Session`] implementation.
pub type DynSession = Arc<dyn Session>;
