//! The [`Fetcher`] contract: the one place this crate talks HTTP. Every
//! direct-communication request (association, dumb-mode `check_authentication`)
//! goes through it, so the host application controls timeouts, proxying,
//! and TLS policy.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

/// A fetched HTTP response reduced to what the protocol core needs: status
/// and body. Headers are deliberately omitted, since this crate never
/// inspects them.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_as_str(&self) -> Result<&str, FetchError> {
        std::str::from_utf8(&self.body).map_err(|_| FetchError::InvalidEncoding)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("response body was not valid UTF-8")]
    InvalidEncoding,
}

/// Performs the direct (server-to-server) HTTP requests the protocol needs.
///
/// Implementations are expected to enforce their own timeout and redirect
/// policy; the core only ever issues `POST` requests with a form-encoded
/// body (association requests, and dumb-mode `check_authentication`).
pub trait Fetcher: Send + Sync {
    fn post_form(
        &self,
        url: &str,
        form: &BTreeMap<String, String>,
    ) -> Result<FetchResponse, FetchError>;
}

/// Type-erased, shared handle to a [`Fetcher`] implementation.
pub type DynFetcher = Arc<dyn Fetcher>;

#[cfg(feature = "reqwest-fetcher")]
mod reqwest_fetcher {
    use super::*;

    /// A [`Fetcher`] backed by [`reqwest::blocking::Client`], for host
    /// applications that don't already have their own HTTP client wired up.
    ///
    /// This is a convenience, not the only supported transport: anything
    /// implementing [`Fetcher`] works, the same way [`crate::store::Store`]
    /// and [`crate::session::Session`] are left to the host.
    pub struct ReqwestFetcher {
        client: reqwest::blocking::Client,
    }

    impl ReqwestFetcher {
        pub fn new() -> Result<Self, FetchError> {
            let client = reqwest::blocking::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            Ok(Self { client })
        }
    }

    impl Default for ReqwestFetcher {
        fn default() -> Self {
            Self::new().expect("reqwest client with default settings builds")
        }
    }

    impl Fetcher for ReqwestFetcher {
        fn post_form(
            &self,
            url: &str,
            form: &BTreeMap<String, String>,
        ) -> Result<FetchResponse, FetchError> {
            let response = self
                .client
                .post(url)
                .form(form)
                .send()
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .bytes()
                .map_err(|e| FetchError::Transport(e.to_string()))?
                .to_vec();
            Ok(FetchResponse { status, body })
        }
    }
}

#[cfg(feature = "reqwest-fetcher")]
pub use reqwest_fetcher::ReqwestFetcher;
