//! Signed inter-request tokens.
//!
//! `begin` hands `(identity_url, server_id, server_url)`, the endpoint
//! selected in phase one, to [`sign`], and writes the result into the
//! session under the `"<prefix>last_token"` key. `complete` reads it back
//! and hands it to [`verify`], which is the only trusted binding between
//! the user's browser session and the endpoint `begin` chose: a forged or
//! replayed-past-its-lifetime token is rejected before any response
//! verification happens at all.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;

use crate::crypto::{consteq, hmac_sha1};

/// How long a freshly minted token remains valid by default: 300s.
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is not valid base64")]
    Encoding,

    #[error("token is malformed")]
    Malformed,

    #[error("token signature does not match")]
    BadSignature,

    #[error("token timestamp is zero")]
    ZeroTimestamp,

    #[error("token has expired")]
    Expired,
}

/// The fields a verified token carries: the endpoint `begin` selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenFields {
    pub identity_url: String,
    pub server_id: String,
    pub server_url: String,
}

/// Signs `(identity_url, server_id, server_url)` under `auth_key`.
///
/// Builds `joined = timestamp \x00 identity_url \x00 server_id \x00
/// server_url`, computes `sig = HMAC-SHA1(auth_key, joined)` (20 bytes), and
/// returns `base64(sig || joined)`.
pub fn sign(identity_url: &str, server_id: &str, server_url: &str, auth_key: &[u8]) -> String {
    sign_at(identity_url, server_id, server_url, auth_key, now_secs())
}

fn sign_at(
    identity_url: &str,
    server_id: &str,
    server_url: &str,
    auth_key: &[u8],
    ts: u64,
) -> String {
    let joined = format!("{ts}\x00{identity_url}\x00{server_id}\x00{server_url}");
    let sig = hmac_sha1(auth_key, joined.as_bytes());
    let mut blob = Vec::with_capacity(sig.len() + joined.len());
    blob.extend_from_slice(&sig);
    blob.extend_from_slice(joined.as_bytes());
    BASE64.encode(blob)
}

/// Verifies a token produced by [`sign`]: base64-decodes, requires at least
/// 20 bytes, splits the leading HMAC-SHA1 signature from the body, recomputes
/// it under `auth_key` with a constant-time comparison, splits the body on
/// `\x00` into exactly four parts, and checks the timestamp is nonzero and
/// within `lifetime_secs` of now.
pub fn verify(
    token: &str,
    auth_key: &[u8],
    lifetime_secs: u64,
) -> Result<TokenFields, TokenError> {
    let blob = BASE64.decode(token).map_err(|_| TokenError::Encoding)?;
    if blob.len() < 20 {
        return Err(TokenError::Malformed);
    }
    let (given_sig, joined) = blob.split_at(20);

    let expected_sig = hmac_sha1(auth_key, joined);
    if !consteq(&expected_sig, given_sig) {
        return Err(TokenError::BadSignature);
    }

    let joined = std::str::from_utf8(joined).map_err(|_| TokenError::Malformed)?;
    let parts: Vec<&str> = joined.split('\x00').collect();
    let [ts_str, identity_url, server_id, server_url] = parts[..] else {
        return Err(TokenError::Malformed);
    };

    let ts: u64 = ts_str.parse().map_err(|_| TokenError::Malformed)?;
    if ts == 0 {
        return Err(TokenError::ZeroTimestamp);
    }
    if ts + lifetime_secs < now_secs() {
        return Err(TokenError::Expired);
    }

    Ok(TokenFields {
        identity_url: identity_url.to_string(),
        server_id: server_id.to_string(),
        server_url: server_url.to_string(),
    })
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
