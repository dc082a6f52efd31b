//! Top-level error taxonomy for the consumer core.
//!
//! Mirrors the error categories in the protocol design: transport and
//! protocol failures are recoverable (they collapse into
//! [`crate::ConsumerResponse::Failure`] at the facade boundary), while
//! [`ConsumerError::Configuration`] is only ever raised from
//! [`crate::GenericConsumer::new`].

use thiserror::Error;

use crate::{association::AssociationError, discovery::DiscoveryError, token::TokenError};

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("state error: {0}")]
    State(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<TokenError> for ConsumerError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired | TokenError::ZeroTimestamp => {
                ConsumerError::State(e.to_string())
            }
            _ => ConsumerError::Crypto(e.to_string()),
        }
    }
}

impl From<DiscoveryError> for ConsumerError {
    fn from(e: DiscoveryError) -> Self {
        ConsumerError::Protocol(e.to_string())
    }
}

impl From<AssociationError> for ConsumerError {
    fn from(e: AssociationError) -> Self {
        match e {
            AssociationError::Transport(_) => ConsumerError::Transport(e.to_string()),
            AssociationError::Protocol(_) => ConsumerError::Protocol(e.to_string()),
            AssociationError::Crypto(_) => ConsumerError::Crypto(e.to_string()),
        }
    }
}
