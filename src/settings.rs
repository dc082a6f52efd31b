//! Ambient configuration for a [`crate::GenericConsumer`].
//!
//! This crate has no concrete deployment surface to load configuration
//! from; a `ConsumerConfig` is assembled by the host application and handed
//! to [`crate::GenericConsumer::new`] directly. Fields carry a
//! `serde`-derived shape so a host that does load its own config file can
//! deserialize straight into this type.

use serde::{Deserialize, Serialize};

use crate::token::DEFAULT_TOKEN_LIFETIME_SECS;

fn default_token_lifetime_secs() -> u64 {
    DEFAULT_TOKEN_LIFETIME_SECS
}

fn default_session_key_prefix() -> String {
    "_openid_consumer_".to_string()
}

/// Settings that shape how [`crate::GenericConsumer`] manages session state
/// and token lifetime, as opposed to the pluggable collaborators
/// ([`crate::store::Store`], [`crate::fetcher::Fetcher`], etc.) that decide
/// *where* state lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// How long a `begin`-issued token remains valid for a matching
    /// `complete` call (default: 300s).
    #[serde(default = "default_token_lifetime_secs")]
    pub token_lifetime_secs: u64,

    /// Prefix for the session keys this crate owns (`"<prefix>last_token"`,
    /// `"<prefix>discovery:<identifier>"`).
    #[serde(default = "default_session_key_prefix")]
    pub session_key_prefix: String,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            token_lifetime_secs: default_token_lifetime_secs(),
            session_key_prefix: default_session_key_prefix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_applies_expected_values() {
        let config = ConsumerConfig::default();
        assert_eq!(config.token_lifetime_secs, DEFAULT_TOKEN_LIFETIME_SECS);
        assert_eq!(config.session_key_prefix, "_openid_consumer_");
    }
}
