//! Replay defense for the `return_to` nonce.
//!
//! `begin` generates an 8-character nonce, stores it immediately via
//! [`crate::store::Store::store_nonce`], and embeds it in `return_to` as
//! the `nonce` query parameter. `complete` runs [`check`] only on a
//! prospective `Success`: it re-extracts `nonce` from the response's
//! `return_to` and redeems it through [`crate::store::Store::use_nonce`],
//! which must be an atomic check-and-remove. This is the second half of the
//! replay defense alongside the signature check. In dumb mode, where no
//! signature is verified locally, it (plus the provider's own
//! `check_authentication` bookkeeping) is what stands between an attacker
//! and replay.
//!
//! The only provenance check performed here is the store lookup: this does
//! not additionally verify that `return_to` byte-for-byte matches the
//! `return_to` `begin` issued, which a stricter design might add.

use url::Url;

use crate::store::Store;

#[derive(Debug, PartialEq, Eq)]
pub enum NonceError {
    /// `return_to` has no `nonce` query parameter.
    Missing,
    /// The nonce was not found in the store (already redeemed, or never issued).
    NotInStore,
}

impl std::fmt::Display for NonceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NonceError::Missing => write!(f, "Nonce missing from return_to"),
            NonceError::NotInStore => write!(f, "Nonce missing from store"),
        }
    }
}

/// Parses the query string of `return_to`, locates `nonce`, and attempts to
/// redeem it through `store.use_nonce`.
pub fn check(store: &dyn Store, return_to: &str) -> Result<(), NonceError> {
    let nonce = extract_nonce(return_to).ok_or(NonceError::Missing)?;
    if store.use_nonce(&nonce) {
        Ok(())
    } else {
        Err(NonceError::NotInStore)
    }
}

fn extract_nonce(return_to: &str) -> Option<String> {
    let url = Url::parse(return_to).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "nonce")
        .map(|(_, v)| v.into_owned())
}
