//! Association negotiation: establishing (or reusing) a shared secret with
//! a provider endpoint via Diffie-Hellman key agreement, so that later
//! authentication responses can be verified locally instead of via a
//! round-trip `check_authentication` call.

use std::collections::BTreeMap;

use num_bigint::BigUint;
use thiserror::Error;
use tracing::{debug, warn};

use crate::crypto::{btwoc, dh::DiffieHellman, hmac_sha1, sha1};
use crate::fetcher::{DynFetcher, FetchError};
use crate::kv;
use crate::store::{AssocType, Association, DynStore};

const DEFAULT_ASSOCIATION_LIFETIME_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum AssociationError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("crypto error: {0}")]
    Crypto(String),
}

impl From<FetchError> for AssociationError {
    fn from(e: FetchError) -> Self {
        AssociationError::Transport(e.to_string())
    }
}

impl From<kv::KvError> for AssociationError {
    fn from(e: kv::KvError) -> Self {
        AssociationError::Protocol(e.to_string())
    }
}

/// Negotiates, caches, and reuses associations with provider endpoints.
pub struct AssociationEngine {
    store: DynStore,
    fetcher: DynFetcher,
}

impl AssociationEngine {
    pub fn new(store: DynStore, fetcher: DynFetcher) -> Self {
        Self { store, fetcher }
    }

    /// Returns a cached association for `server_url` if one exists and
    /// either `replace` is false or it still has more than `token_lifetime`
    /// seconds left; otherwise performs a fresh `associate` round-trip and
    /// caches the result. A failed `associate` call is not an error here,
    /// it returns `None`, which the caller treats as "fall back to dumb mode
    /// for this attempt" (logged at `warn!`, never surfaced as a `Failure`).
    pub fn get_association(&self, server_url: &str, replace: bool, token_lifetime: u64) -> Option<Association> {
        if let Some(existing) = self.store.get_latest_association(server_url) {
            if !replace || existing.expires_in() > token_lifetime {
                return Some(existing);
            }
        }

        match self.associate(server_url) {
            Ok(assoc) => {
                self.store.store_association(assoc.clone());
                Some(assoc)
            }
            Err(e) => {
                warn!(server_url, error = %e, "association request failed, falling back to dumb mode for this attempt");
                None
            }
        }
    }

    /// Performs a fresh `associate` request against `server_url`, returning
    /// the negotiated [`Association`]. Does not consult or update the
    /// store; that's [`Self::get_association`]'s job, so this stays
    /// independently testable against a bare [`crate::fetcher::Fetcher`].
    pub fn associate(&self, server_url: &str) -> Result<Association, AssociationError> {
        let dh = DiffieHellman::with_defaults();

        let mut form = BTreeMap::new();
        form.insert("openid.mode".to_string(), "associate".to_string());
        form.insert("openid.assoc_type".to_string(), "HMAC-SHA1".to_string());
        form.insert("openid.session_type".to_string(), "DH-SHA1".to_string());
        form.insert(
            "openid.dh_modulus".to_string(),
            base64_encode(&btwoc(dh.modulus())),
        );
        form.insert(
            "openid.dh_gen".to_string(),
            base64_encode(&btwoc(dh.generator())),
        );
        form.insert(
            "openid.dh_consumer_public".to_string(),
            base64_encode(&btwoc(dh.public())),
        );

        debug!(server_url, "sending association request");
        let response = self.fetcher.post_form(server_url, &form)?;
        if response.status == 400 || !response.is_success() {
            return Err(AssociationError::Protocol(format!(
                "association request returned HTTP {}",
                response.status
            )));
        }
        let body = response
            .body_as_str()
            .map_err(|e| AssociationError::Protocol(e.to_string()))?;
        let fields = kv::decode(body)?;

        if fields.get("mode").map(String::as_str) == Some("error") {
            let msg = fields
                .get("error")
                .cloned()
                .unwrap_or_else(|| "unspecified error".to_string());
            warn!(server_url, error = %msg, "provider rejected association request");
            return Err(AssociationError::Protocol(msg));
        }

        let assoc_type = fields
            .get("assoc_type")
            .ok_or_else(|| AssociationError::Protocol("response missing assoc_type".to_string()))?;
        if assoc_type != "HMAC-SHA1" {
            return Err(AssociationError::Protocol(format!(
                "unsupported assoc_type {assoc_type:?}"
            )));
        }

        let session_type = fields.get("session_type").map(String::as_str);
        if !matches!(session_type, None | Some("DH-SHA1")) {
            return Err(AssociationError::Protocol(format!(
                "unsupported session_type {session_type:?}"
            )));
        }

        let handle = fields
            .get("assoc_handle")
            .ok_or_else(|| AssociationError::Protocol("response missing assoc_handle".to_string()))?
            .clone();

        let lifetime_secs = fields
            .get("expires_in")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_ASSOCIATION_LIFETIME_SECS);

        let secret = match session_type {
            None => {
                let mac_key_b64 = fields
                    .get("mac_key")
                    .ok_or_else(|| AssociationError::Protocol("response missing mac_key".to_string()))?;
                base64_decode(mac_key_b64)
                    .map_err(|e| AssociationError::Crypto(format!("bad mac_key: {e}")))?
            }
            Some("DH-SHA1") => {
                let server_public_b64 = fields.get("dh_server_public").ok_or_else(|| {
                    AssociationError::Protocol("response missing dh_server_public".to_string())
                })?;
                let enc_mac_key_b64 = fields.get("enc_mac_key").ok_or_else(|| {
                    AssociationError::Protocol("response missing enc_mac_key".to_string())
                })?;

                let server_public_bytes = base64_decode(server_public_b64)
                    .map_err(|e| AssociationError::Crypto(format!("bad dh_server_public: {e}")))?;
                let enc_mac_key = base64_decode(enc_mac_key_b64)
                    .map_err(|e| AssociationError::Crypto(format!("bad enc_mac_key: {e}")))?;

                let server_public = BigUint::from_bytes_be(&server_public_bytes);
                let shared_secret = dh.shared_secret(&server_public);
                let shared_secret_digest = sha1(&btwoc(&shared_secret));

                if enc_mac_key.len() != shared_secret_digest.len() {
                    return Err(AssociationError::Crypto(
                        "enc_mac_key length does not match digest length".to_string(),
                    ));
                }
                enc_mac_key
                    .iter()
                    .zip(shared_secret_digest.iter())
                    .map(|(a, b)| a ^ b)
                    .collect()
            }
            Some(_) => unreachable!("session_type already validated above"),
        };

        debug!(server_url, handle = %handle, "association established");
        Ok(Association::new(
            server_url,
            handle,
            secret,
            AssocType::HmacSha1,
            lifetime_secs,
        ))
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn base64_decode(s: &str) -> Result<Vec<u8>, String> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| e.to_string())
}

/// Re-derives the HMAC-SHA1 signature a given set of signed fields should
/// carry under `secret`, for comparison against a response's `openid.sig`.
/// Shared by [`crate::verify`] and by this module's own tests.
pub(crate) fn sign_kv(secret: &[u8], signed_fields: &[(&str, &str)]) -> [u8; 20] {
    let mut body = String::new();
    for (k, v) in signed_fields {
        body.push_str(k);
        body.push(':');
        body.push_str(v);
        body.push('\n');
    }
    hmac_sha1(secret, body.as_bytes())
}
