//! Fake collaborators for end-to-end consumer tests: an in-memory `Store`
//! and `Session`, a `Discovery` that resolves a fixed identifier, and a
//! `Fetcher` that plays the role of a cooperating (or misbehaving) provider
//! entirely in-process, so these tests exercise the real wire formats
//! (KV-form, DH-SHA1 masking, HMAC-SHA1 signing) without any network I/O.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use num_bigint::BigUint;
use openid_consumer_core::{Association, DiscoveryError, FetchError, FetchResponse, ServiceEndpoint, Store};

pub struct MemoryStore {
    associations: Mutex<HashMap<(String, String), Association>>,
    nonces: Mutex<std::collections::HashSet<String>>,
    auth_key: Vec<u8>,
    dumb: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            associations: Mutex::new(HashMap::new()),
            nonces: Mutex::new(std::collections::HashSet::new()),
            auth_key: vec![0x11u8; 20],
            dumb: false,
        }
    }

    pub fn dumb() -> Self {
        Self {
            associations: Mutex::new(HashMap::new()),
            nonces: Mutex::new(std::collections::HashSet::new()),
            auth_key: vec![0x11u8; 20],
            dumb: true,
        }
    }
}

impl Store for MemoryStore {
    fn store_association(&self, association: Association) {
        self.associations.lock().unwrap().insert(
            (association.server_url.clone(), association.handle.clone()),
            association,
        );
    }

    fn get_association(&self, server_url: &str, handle: &str) -> Option<Association> {
        let assoc = self
            .associations
            .lock()
            .unwrap()
            .get(&(server_url.to_string(), handle.to_string()))
            .cloned()?;
        if assoc.is_expired() {
            None
        } else {
            Some(assoc)
        }
    }

    fn get_latest_association(&self, server_url: &str) -> Option<Association> {
        self.associations
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.server_url == server_url && !a.is_expired())
            .cloned()
            .next()
    }

    fn remove_association(&self, server_url: &str, handle: &str) {
        self.associations
            .lock()
            .unwrap()
            .remove(&(server_url.to_string(), handle.to_string()));
    }

    fn is_dumb(&self) -> bool {
        self.dumb
    }

    fn store_nonce(&self, nonce: &str) {
        self.nonces.lock().unwrap().insert(nonce.to_string());
    }

    fn use_nonce(&self, nonce: &str) -> bool {
        self.nonces.lock().unwrap().remove(nonce)
    }

    fn get_auth_key(&self) -> Vec<u8> {
        self.auth_key.clone()
    }
}

pub struct MemorySession {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
        }
    }
}

impl openid_consumer_core::Session for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn del(&self, key: &str) {
        self.values.lock().unwrap().remove(key);
    }
}

pub struct FixedDiscovery {
    pub endpoint: ServiceEndpoint,
}

impl openid_consumer_core::Discovery for FixedDiscovery {
    fn discover(&self, _identifier: &str) -> Result<ServiceEndpoint, DiscoveryError> {
        Ok(self.endpoint.clone())
    }
}

pub struct NotFoundDiscovery;

impl openid_consumer_core::Discovery for NotFoundDiscovery {
    fn discover(&self, identifier: &str) -> Result<ServiceEndpoint, DiscoveryError> {
        Err(DiscoveryError::NotFound(identifier.to_string()))
    }
}

/// A fake provider implementing just enough of the OpenID 1.1 direct
/// communication surface (`associate`, `check_authentication`) to drive an
/// end-to-end test against [`openid_consumer_core::GenericConsumer`].
pub struct FakeProvider {
    pub secret: Mutex<Option<Vec<u8>>>,
    pub dumb_mode_valid: bool,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            secret: Mutex::new(None),
            dumb_mode_valid: true,
        }
    }
}

impl openid_consumer_core::Fetcher for FakeProvider {
    fn post_form(
        &self,
        _url: &str,
        form: &BTreeMap<String, String>,
    ) -> Result<FetchResponse, FetchError> {
        match form.get("openid.mode").map(String::as_str) {
            Some("associate") => {
                let consumer_public_bytes = base64_decode(
                    form.get("openid.dh_consumer_public")
                        .expect("consumer public present"),
                );
                let consumer_public = BigUint::from_bytes_be(&consumer_public_bytes);

                let provider_dh =
                    openid_consumer_core::crypto::dh::DiffieHellman::with_defaults();
                let shared = provider_dh.shared_secret(&consumer_public);
                let digest =
                    openid_consumer_core::crypto::sha1(&openid_consumer_core::crypto::btwoc(&shared));

                let secret = openid_consumer_core::crypto::random_bytes(20);
                *self.secret.lock().unwrap() = Some(secret.clone());

                let enc_mac_key: Vec<u8> = secret
                    .iter()
                    .zip(digest.iter())
                    .map(|(a, b)| a ^ b)
                    .collect();

                let body = openid_consumer_core::kv::encode([
                    ("mode", "associate"),
                    ("assoc_type", "HMAC-SHA1"),
                    ("assoc_handle", "handle-1"),
                    ("expires_in", "3600"),
                    ("session_type", "DH-SHA1"),
                    (
                        "dh_server_public",
                        &base64_encode(&openid_consumer_core::crypto::btwoc(provider_dh.public())),
                    ),
                    ("enc_mac_key", &base64_encode(&enc_mac_key)),
                ])
                .unwrap();

                Ok(FetchResponse {
                    status: 200,
                    body: body.into_bytes(),
                })
            }
            Some("check_authentication") => {
                let body = openid_consumer_core::kv::encode([(
                    "is_valid",
                    if self.dumb_mode_valid { "true" } else { "false" },
                )])
                .unwrap();
                Ok(FetchResponse {
                    status: 200,
                    body: body.into_bytes(),
                })
            }
            other => Err(FetchError::Transport(format!("unexpected mode {other:?}"))),
        }
    }
}

pub fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn base64_decode(s: &str) -> Vec<u8> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .expect("valid base64")
}

/// Recomputes the `openid.sig` an association's secret would produce over a
/// set of signed fields, the same way a cooperating provider would — used
/// here to act as that provider without reaching into the library's
/// private signing helper.
pub fn sign_kv(secret: &[u8], signed_fields: &[(&str, &str)]) -> [u8; 20] {
    use hmac::{Hmac, Mac};
    use sha1::Sha1;

    let mut body = String::new();
    for (k, v) in signed_fields {
        body.push_str(k);
        body.push(':');
        body.push_str(v);
        body.push('\n');
    }
    let mut mac = Hmac::<Sha1>::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(body.as_bytes());
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; 20];
    out.copy_from_slice(&result);
    out
}
