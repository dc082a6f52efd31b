//! Verifying a provider's `id_res` response: checking the signed fields
//! against the association's secret (smart mode) or asking the provider to
//! confirm the response itself via `check_authentication` (dumb mode), then
//! checking the return-to nonce for replay.

pub mod nonce;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::association::sign_kv;
use crate::crypto::consteq;
use crate::fetcher::DynFetcher;
use crate::kv;
use crate::store::DynStore;

/// The outcome of completing an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerResponse {
    /// The user authenticated successfully.
    Success {
        identity_url: String,
        signed_args: BTreeMap<String, String>,
    },
    /// The user declined at the provider.
    Cancel { identity_url: Option<String> },
    /// Any protocol, transport, or verification error.
    Failure {
        identity_url: Option<String>,
        message: Option<String>,
    },
    /// `checkid_immediate` could not be satisfied silently.
    SetupNeeded {
        identity_url: String,
        setup_url: String,
    },
}

/// The result of checking an `id_res` assertion's signature, before the
/// caller attaches `identity_url` (known only from the verified token, not
/// from the response itself) to build a [`ConsumerResponse`].
pub(crate) enum Assertion {
    Success(BTreeMap<String, String>),
    SetupNeeded(String),
}

/// Verifies a provider's `id_res` response against a previously negotiated
/// association, or via `check_authentication` if none is cached.
pub struct ResponseVerifier {
    store: DynStore,
    fetcher: DynFetcher,
}

impl ResponseVerifier {
    pub fn new(store: DynStore, fetcher: DynFetcher) -> Self {
        Self { store, fetcher }
    }

    /// `fields` are the `openid.*` parameters from the return-to request,
    /// with the `openid.` prefix already stripped. `server_url`/`server_id`
    /// come from the token `begin` signed, not from the response, so a
    /// hostile provider cannot substitute a different endpoint or identity.
    pub(crate) fn verify_id_res(
        &self,
        server_url: &str,
        server_id: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<Assertion, String> {
        // An immediate-mode request the provider could not satisfy silently
        // comes back carrying a setup URL instead of an assertion.
        if let Some(setup_url) = fields.get("user_setup_url") {
            return Ok(Assertion::SetupNeeded(setup_url.clone()));
        }

        for required in ["return_to", "identity", "assoc_handle"] {
            if !fields.contains_key(required) {
                return Err("Missing required field".to_string());
            }
        }

        // Identity binding: a hostile provider cannot switch the asserted
        // identity away from what `begin` selected.
        let identity = fields.get("identity").unwrap();
        if identity != server_id {
            return Err("Server ID (delegate) mismatch".to_string());
        }

        let handle = fields.get("assoc_handle").unwrap();

        match self.store.get_association(server_url, handle) {
            None => {
                if self.check_authentication(server_url, fields) {
                    Ok(Assertion::Success(signed_subset(fields)?))
                } else {
                    Err("Server denied check_authentication".to_string())
                }
            }
            Some(assoc) => {
                if assoc.is_expired() {
                    return Err(format!("Association with {server_url} expired"));
                }

                // Parse the signed field list, preserving order, and
                // compare the expected HMAC-SHA1 signature.
                let signed_list = fields
                    .get("signed")
                    .ok_or_else(|| "Missing argument signature".to_string())?;
                let sig_b64 = fields
                    .get("sig")
                    .ok_or_else(|| "Missing argument signature".to_string())?;
                let given_sig =
                    base64_decode(sig_b64).map_err(|e| format!("bad openid.sig: {e}"))?;

                let signed_pairs: Vec<(&str, &str)> = signed_list
                    .split(',')
                    .map(|key| (key, fields.get(key).map(String::as_str).unwrap_or_default()))
                    .collect();

                let expected = sign_kv(&assoc.secret, &signed_pairs);
                if !consteq(&expected, &given_sig) {
                    warn!(server_url, "response signature mismatch");
                    return Err("Bad signature".to_string());
                }

                debug!(server_url, handle, "response signature verified");
                Ok(Assertion::Success(signed_subset(fields)?))
            }
        }
    }

    /// Reconstructs the provider's assertion as a `check_authentication`
    /// request. Only parameters whose unprefixed name appears in the signed
    /// field list, plus `assoc_handle`, `sig`, `signed`, and
    /// `invalidate_handle`, are forwarded, along with
    /// `openid.mode = check_authentication`.
    fn check_authentication(&self, server_url: &str, fields: &BTreeMap<String, String>) -> bool {
        let signed_list = fields.get("signed").map(String::as_str).unwrap_or_default();
        let mut allowed: std::collections::HashSet<&str> =
            signed_list.split(',').filter(|s| !s.is_empty()).collect();
        allowed.insert("assoc_handle");
        allowed.insert("sig");
        allowed.insert("signed");
        allowed.insert("invalidate_handle");

        let mut form: BTreeMap<String, String> = fields
            .iter()
            .filter(|(k, _)| allowed.contains(k.as_str()))
            .map(|(k, v)| (format!("openid.{k}"), v.clone()))
            .collect();
        form.insert(
            "openid.mode".to_string(),
            "check_authentication".to_string(),
        );

        let response = match self.fetcher.post_form(server_url, &form) {
            Ok(r) => r,
            Err(e) => {
                warn!(server_url, error = %e, "check_authentication transport error");
                return false;
            }
        };
        if !response.is_success() {
            warn!(server_url, status = response.status, "check_authentication non-200 response");
            return false;
        }
        let body = match response.body_as_str() {
            Ok(b) => b,
            Err(e) => {
                warn!(server_url, error = %e, "check_authentication response not UTF-8");
                return false;
            }
        };
        let result = match kv::decode(body) {
            Ok(r) => r,
            Err(e) => {
                warn!(server_url, error = %e, "check_authentication response malformed");
                return false;
            }
        };

        if let Some(dead_handle) = result.get("invalidate_handle") {
            self.store.remove_association(server_url, dead_handle);
        }

        result.get("is_valid").map(String::as_str) == Some("true")
    }
}

fn signed_subset(fields: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>, String> {
    let signed_list = fields
        .get("signed")
        .ok_or_else(|| "Missing argument signature".to_string())?;
    Ok(signed_list
        .split(',')
        .filter_map(|key| fields.get(key).map(|v| (key.to_string(), v.clone())))
        .collect())
}

fn base64_decode(s: &str) -> Result<Vec<u8>, String> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| e.to_string())
}
