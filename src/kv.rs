//! The OpenID 1.1 key-value form: a simple `key:value\n`-delimited wire
//! format used for direct-communication responses and for the payload that
//! gets HMAC-signed in an authentication assertion.
//!
//! Encoding and decoding are kept strict: decoding rejects lines with no
//! `:` separator and duplicate keys, since both indicate either a corrupt
//! response or a provider not actually speaking this protocol.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KvError {
    #[error("line {0} has no ':' separator")]
    MissingSeparator(usize),

    #[error("duplicate key {0:?}")]
    DuplicateKey(String),

    #[error("key {0:?} contains a newline")]
    KeyContainsNewline(String),

    #[error("value for key {0:?} contains a newline")]
    ValueContainsNewline(String),
}

/// Encodes a sequence of key-value pairs into the KV wire form, in the
/// order given. Each line is `key:value\n`; a key or value containing a
/// newline is a programmer error, not a recoverable one, since keys here
/// are protocol field names and values came from typed callers.
pub fn encode<'a, I>(pairs: I) -> Result<String, KvError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::new();
    for (key, value) in pairs {
        if key.contains('\n') {
            return Err(KvError::KeyContainsNewline(key.to_string()));
        }
        if value.contains('\n') {
            return Err(KvError::ValueContainsNewline(key.to_string()));
        }
        out.push_str(key);
        out.push(':');
        out.push_str(value);
        out.push('\n');
    }
    Ok(out)
}

/// Decodes a KV-form document into an ordered map of its fields.
///
/// Blank lines are skipped (some providers emit a trailing blank line);
/// any other line without a `:` is a format error.
pub fn decode(body: &str) -> Result<BTreeMap<String, String>, KvError> {
    let mut map = BTreeMap::new();
    for (idx, line) in body.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or(KvError::MissingSeparator(idx + 1))?;
        let (key, value) = (key.trim(), value.trim());
        if map.insert(key.to_string(), value.to_string()).is_some() {
            return Err(KvError::DuplicateKey(key.to_string()));
        }
    }
    Ok(map)
}
