//! Cryptographic primitives used by the protocol core: HMAC-SHA1, SHA-1,
//! the `btwoc` big-integer encoding, a secure random byte source, and
//! constant-time comparison.
//!
//! Diffie-Hellman key agreement lives in [`dh`].

pub mod dh;

use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use rand::RngCore;
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

/// Computes `HMAC-SHA1(key, data)`, returning the 20-byte digest.
pub fn hmac_sha1(key: &[u8], data: &[u8]) -> [u8; 20] {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; 20];
    out.copy_from_slice(&result);
    out
}

/// Computes `SHA1(data)`, returning the 20-byte digest.
pub fn sha1(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 20];
    out.copy_from_slice(&result);
    out
}

/// Big-endian two's-complement encoding of a non-negative integer: the
/// minimal byte sequence, with a leading `0x00` prepended if the high bit of
/// the top byte would otherwise be set (so the value cannot be misread as
/// negative by a signed-integer decoder).
pub fn btwoc(n: &BigUint) -> Vec<u8> {
    let mut bytes = n.to_bytes_be();
    if bytes.is_empty() {
        return vec![0];
    }
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0);
    }
    bytes
}

/// Fills `len` bytes from a cryptographically secure RNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::rng().fill_bytes(&mut buf);
    buf
}

const NONCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates an 8-character nonce drawn uniformly from `[A-Za-z0-9]`.
pub fn generate_nonce() -> String {
    generate_nonce_of_len(8)
}

fn generate_nonce_of_len(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let idx = (rng.next_u32() as usize) % NONCE_ALPHABET.len();
            NONCE_ALPHABET[idx] as char
        })
        .collect()
}

/// Constant-time byte comparison, to avoid timing oracles in signature and
/// token verification.
pub fn consteq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
