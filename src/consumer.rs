//! The top-level facade: [`GenericConsumer`] ties discovery, association,
//! request-building, and response verification together into the two calls
//! a host application actually makes: `begin` and `complete`.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};
use url::Url;

use crate::association::AssociationEngine;
use crate::discovery::DynDiscovery;
use crate::discovery::DiscoveryError;
use crate::error::ConsumerError;
use crate::fetcher::DynFetcher;
use crate::request::AuthRequestBuilder;
use crate::session::{DiscoveryManagerState, DynSession};
use crate::settings::ConsumerConfig;
use crate::store::DynStore;
use crate::token::{self, TokenFields};
use crate::verify::{Assertion, ConsumerResponse, ResponseVerifier};
use crate::verify::nonce;

/// Whether the consumer can verify responses locally against a stored
/// association ([`Mode::Smart`]), or must fall back to a
/// `check_authentication` round-trip for every response ([`Mode::Dumb`]).
///
/// Determined entirely by [`crate::store::Store::is_dumb`]: unlike the
/// protocol's original formulation, which also asked whether big-integer
/// Diffie-Hellman math was available, this crate always links `num-bigint`,
/// so that half of the condition is never false here (see `DESIGN.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Smart,
    Dumb,
}

/// The two operations a host application drives an OpenID 1.1 consumer
/// through. [`GenericConsumer`] is the only implementation this crate
/// ships, but the trait lets a host mock out a whole consumer in its own
/// tests rather than just the collaborators underneath one.
pub trait ConsumerFacade {
    fn mode(&self) -> Mode;

    /// Begins an authentication attempt for `identifier`. Returns `Ok(None)`
    /// if discovery found no provider for it: that case is reported as an
    /// absent request rather than as an error.
    fn begin(
        &self,
        identifier: &str,
        trust_root: &str,
        return_to: &str,
        immediate: bool,
    ) -> Result<Option<Url>, ConsumerError>;

    /// Completes an authentication attempt from the provider's response
    /// query parameters (full `openid.*`-prefixed keys, as received on the
    /// `return_to` request).
    fn complete(&self, query: &BTreeMap<String, String>) -> ConsumerResponse;
}

/// The protocol-core consumer. Every collaborator is a trait object chosen
/// by the host application, reached through a `Dyn*` type alias, which keeps
/// this struct object-safe to build behind a single `Arc` if a host wants to
/// share it across threads.
pub struct GenericConsumer {
    store: DynStore,
    fetcher: DynFetcher,
    session: DynSession,
    discovery: DynDiscovery,
    config: ConsumerConfig,
}

impl GenericConsumer {
    /// Builds a consumer from its collaborators. Construction is infallible
    /// in this crate: every collaborator is a non-nullable `Arc<dyn Trait>`,
    /// so there is no "store was null" failure mode to report. A host
    /// application wiring a collaborator incorrectly is a mistake the type
    /// system already rules out at compile time.
    pub fn new(
        store: DynStore,
        fetcher: DynFetcher,
        session: DynSession,
        discovery: DynDiscovery,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            session,
            discovery,
            config,
        }
    }

    fn token_key(&self) -> String {
        format!("{}last_token", self.config.session_key_prefix)
    }

    fn discovery_key(&self, identifier: &str) -> String {
        format!("{}discovery:{identifier}", self.config.session_key_prefix)
    }

    fn load_discovery_state(&self, key: &str) -> Option<DiscoveryManagerState> {
        self.session
            .get(key)
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    fn save_discovery_state(&self, key: &str, state: &DiscoveryManagerState) {
        if let Ok(raw) = serde_json::to_string(state) {
            self.session.set(key, &raw);
        }
    }

    /// Drops any cached discovery state for `identifier`: the attempt
    /// concluded (successfully or via cancellation), so there's no reason
    /// to keep it around.
    fn cleanup_discovery(&self, identifier: &str) {
        self.session.del(&self.discovery_key(identifier));
    }

    fn verify_token(&self, token: &str) -> Result<TokenFields, token::TokenError> {
        let auth_key = self.store.get_auth_key();
        token::verify(token, &auth_key, self.config.token_lifetime_secs)
    }

    fn complete_inner(&self, query: &BTreeMap<String, String>) -> ConsumerResponse {
        let token = match self.session.get(&self.token_key()) {
            Some(t) => t,
            None => {
                return ConsumerResponse::Failure {
                    identity_url: None,
                    message: Some("No session state found".to_string()),
                };
            }
        };

        let fields = strip_openid_prefix(query);

        match fields.get("mode").map(String::as_str) {
            Some("cancel") => {
                let identity_url = self.verify_token(&token).ok().map(|f| f.identity_url);
                if let Some(id) = &identity_url {
                    self.cleanup_discovery(id);
                }
                ConsumerResponse::Cancel { identity_url }
            }
            Some("error") => {
                let identity_url = self.verify_token(&token).ok().map(|f| f.identity_url);
                ConsumerResponse::Failure {
                    identity_url,
                    message: fields.get("error").cloned(),
                }
            }
            Some("id_res") => {
                let token_fields = match self.verify_token(&token) {
                    Ok(f) => f,
                    Err(e) => {
                        warn!(error = %e, "token did not verify for id_res response");
                        return ConsumerResponse::Failure {
                            identity_url: None,
                            message: Some("No session state found".to_string()),
                        };
                    }
                };

                let verifier = ResponseVerifier::new(self.store.clone(), self.fetcher.clone());
                match verifier.verify_id_res(&token_fields.server_url, &token_fields.server_id, &fields) {
                    Ok(Assertion::SetupNeeded(setup_url)) => ConsumerResponse::SetupNeeded {
                        identity_url: token_fields.identity_url,
                        setup_url,
                    },
                    Ok(Assertion::Success(signed_args)) => {
                        let return_to = fields.get("return_to").cloned().unwrap_or_default();
                        match nonce::check(self.store.as_ref(), &return_to) {
                            Ok(()) => {
                                debug!(identity_url = %token_fields.identity_url, "response verified");
                                self.cleanup_discovery(&token_fields.identity_url);
                                ConsumerResponse::Success {
                                    identity_url: token_fields.identity_url,
                                    signed_args,
                                }
                            }
                            Err(e) => {
                                warn!(identity_url = %token_fields.identity_url, error = %e, "response nonce rejected");
                                ConsumerResponse::Failure {
                                    identity_url: Some(token_fields.identity_url),
                                    message: Some(e.to_string()),
                                }
                            }
                        }
                    }
                    Err(message) => {
                        warn!(identity_url = %token_fields.identity_url, %message, "response verification failed");
                        ConsumerResponse::Failure {
                            identity_url: Some(token_fields.identity_url),
                            message: Some(message),
                        }
                    }
                }
            }
            other => ConsumerResponse::Failure {
                identity_url: None,
                message: Some(format!("Invalid openid.mode '{}'", other.unwrap_or(""))),
            },
        }
    }
}

impl ConsumerFacade for GenericConsumer {
    fn mode(&self) -> Mode {
        if self.store.is_dumb() {
            Mode::Dumb
        } else {
            Mode::Smart
        }
    }

    fn begin(
        &self,
        identifier: &str,
        trust_root: &str,
        return_to: &str,
        immediate: bool,
    ) -> Result<Option<Url>, ConsumerError> {
        let identifier = normalize_identifier(identifier);
        let discovery_key = self.discovery_key(&identifier);

        // Mark any cached discovery manager stale before driving discovery;
        // a crash between this write and the one below discards the
        // half-initialized manager on the next `begin`.
        if let Some(mut state) = self.load_discovery_state(&discovery_key) {
            state.stale = true;
            self.save_discovery_state(&discovery_key, &state);
        }

        let endpoint = match self.discovery.discover(&identifier) {
            Ok(endpoint) => endpoint,
            Err(DiscoveryError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(ConsumerError::from(e)),
        };

        self.save_discovery_state(
            &discovery_key,
            &DiscoveryManagerState {
                identifier: identifier.clone(),
                server_url: endpoint.server_url.clone(),
                server_id: endpoint.server_id.clone(),
                identity_url: endpoint.identity_url.clone(),
                stale: false,
            },
        );

        let nonce = crate::crypto::generate_nonce();
        self.store.store_nonce(&nonce);

        let auth_key = self.store.get_auth_key();
        let token = token::sign(
            &endpoint.identity_url,
            &endpoint.server_id,
            &endpoint.server_url,
            &auth_key,
        );

        let association = if self.mode() == Mode::Smart {
            let engine = AssociationEngine::new(self.store.clone(), self.fetcher.clone());
            engine.get_association(&endpoint.server_url, false, self.config.token_lifetime_secs)
        } else {
            None
        };

        let url = AuthRequestBuilder::new(&endpoint)
            .association(association.as_ref())
            .return_to_arg("nonce", &nonce)
            .redirect_url(trust_root, return_to, immediate)
            .map_err(|e| ConsumerError::Protocol(e.to_string()))?;

        self.session.set(&self.token_key(), &token);

        info!(identifier = %identifier, server_url = %endpoint.server_url, "authentication request begun");
        Ok(Some(url))
    }

    fn complete(&self, query: &BTreeMap<String, String>) -> ConsumerResponse {
        let result = self.complete_inner(query);
        self.session.del(&self.token_key());
        result
    }
}

/// Strips the `openid.` prefix off query parameter names, dropping anything
/// that doesn't carry it (a provider's assertion is entirely `openid.*`).
fn strip_openid_prefix(query: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    query
        .iter()
        .filter_map(|(k, v)| k.strip_prefix("openid.").map(|k| (k.to_string(), v.clone())))
        .collect()
}

/// Minimal identifier normalization: defaults a missing scheme to `http://`
/// and strips any fragment. Full XRI classification and Yadis-driven
/// redirect-following normalization are part of [`crate::discovery::Discovery`],
/// which this crate does not implement.
fn normalize_identifier(identifier: &str) -> String {
    let with_scheme = if identifier.contains("://") {
        identifier.to_string()
    } else {
        format!("http://{identifier}")
    };
    match Url::parse(&with_scheme) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => with_scheme,
    }
}
