//! The [`Store`] contract: persistence for associations and (optionally)
//! the nonces/auth-request state a host application needs to survive a
//! redirect round-trip. The protocol core never touches a disk or a
//! database directly; every durable thing is reached through this trait.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// The signature algorithm used with an association's shared secret. This
/// crate implements the one algorithm OpenID 1.1 requires: HMAC-SHA1. The
/// secret itself may have reached the consumer either directly (association
/// requests are made over HTTPS) or masked via Diffie-Hellman key agreement
/// (see [`crate::association::AssociationEngine`]); that choice is a
/// transport-level detail of establishing the association, not part of
/// `AssocType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssocType {
    HmacSha1,
}

impl AssocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssocType::HmacSha1 => "HMAC-SHA1",
        }
    }
}

/// A negotiated association: a shared secret keyed by handle, scoped to one
/// provider endpoint, with an expiry the consumer must respect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    pub server_url: String,
    pub handle: String,
    pub secret: Vec<u8>,
    pub assoc_type: AssocType,
    pub issued: u64,
    pub lifetime_secs: u64,
}

impl Association {
    pub fn new(
        server_url: impl Into<String>,
        handle: impl Into<String>,
        secret: Vec<u8>,
        assoc_type: AssocType,
        lifetime_secs: u64,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            handle: handle.into(),
            secret,
            assoc_type,
            issued: now_secs(),
            lifetime_secs,
        }
    }

    /// Seconds remaining before this association expires; zero once expired.
    pub fn expires_in(&self) -> u64 {
        let age = now_secs().saturating_sub(self.issued);
        self.lifetime_secs.saturating_sub(age)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_in() == 0
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Storage for negotiated associations.
///
/// A smart-mode consumer (see [`crate::Mode`]) needs a `Store` that actually
/// persists associations across requests; a dumb-mode consumer still needs
/// one, but only to hold an association for the lifetime of a single
/// request, and its `is_dumb` returns `true` to say so.
pub trait Store: Send + Sync {
    /// Records a newly negotiated association, keyed by `(server_url, handle)`.
    fn store_association(&self, association: Association);

    /// Looks up an association by server URL and handle. Returns `None` if
    /// absent, or if it has expired (callers should not have to separately
    /// check [`Association::is_expired`]).
    fn get_association(&self, server_url: &str, handle: &str) -> Option<Association>;

    /// Looks up the most recently stored, not-yet-expired association for a
    /// provider endpoint, irrespective of handle. Used when beginning a new
    /// authentication request against a provider the consumer has already
    /// associated with.
    fn get_latest_association(&self, server_url: &str) -> Option<Association>;

    /// Removes an association, e.g. after the provider reports it invalid
    /// via `invalidate_handle` in a dumb-mode `check_authentication` call.
    fn remove_association(&self, server_url: &str, handle: &str);

    /// Whether this store is "dumb": unable to persist associations across
    /// requests (for example, an in-memory store scoped to one process that
    /// cannot be relied on to still hold state when the provider redirects
    /// the user back). See spec discussion under [`crate::Mode`].
    fn is_dumb(&self) -> bool {
        false
    }

    /// Records `nonce` as issued and not yet redeemed.
    fn store_nonce(&self, nonce: &str);

    /// Atomically checks whether `nonce` is present and removes it. Returns
    /// `true` if it was present (and is now consumed), `false` if it was
    /// already redeemed or never issued. This atomicity is the only
    /// concurrency contract a `Store` implementation must honor, and it is
    /// what closes the replay window a signature check alone cannot.
    fn use_nonce(&self, nonce: &str) -> bool;

    /// A key stable for the lifetime of the process, used to HMAC-sign
    /// inter-request tokens (see [`crate::token`]). Implementations
    /// typically generate 20 random bytes once and hold them for as long as
    /// the store itself lives.
    fn get_auth_key(&self) -> Vec<u8>;
}

/// Type-erased, shared handle to a [`Store`] implementation.
pub type DynStore = Arc<dyn Store>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn association_expires_in_reaches_zero() {
        let assoc = Association {
            server_url: "https://example.com/openid".into(),
            handle: "h1".into(),
            secret: vec![1, 2, 3],
            assoc_type: AssocType::HmacSha1,
            issued: 0,
            lifetime_secs: 1,
        };
        assert!(assoc.is_expired());
        assert_eq!(assoc.expires_in(), 0);
    }

    #[test]
    fn fresh_association_is_not_expired() {
        let assoc = Association::new(
            "https://example.com/openid",
            "h1",
            vec![1, 2, 3],
            AssocType::HmacSha1,
            3600,
        );
        assert!(!assoc.is_expired());
        assert!(assoc.expires_in() > 0);
    }
}
