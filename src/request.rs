//! Building the browser-redirect authentication request sent to a
//! provider's endpoint (`checkid_setup` or `checkid_immediate`).

use std::collections::BTreeMap;

use url::Url;

use crate::discovery::ServiceEndpoint;
use crate::store::Association;

/// Whether the provider should present a UI to the user (`checkid_setup`)
/// or fail immediately without one if it can't silently confirm identity
/// (`checkid_immediate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckMode {
    #[default]
    Setup,
    Immediate,
}

impl CheckMode {
    fn as_str(self) -> &'static str {
        match self {
            CheckMode::Setup => "checkid_setup",
            CheckMode::Immediate => "checkid_immediate",
        }
    }
}

/// Builds the `openid.*` query parameters for a `checkid_setup`/
/// `checkid_immediate` request, then renders the full redirect URL against
/// a provider endpoint.
#[derive(Debug, Clone)]
pub struct AuthRequestBuilder {
    server_url: String,
    server_id: String,
    assoc_handle: Option<String>,
    /// `openid.<namespace>.<key> = value`, merged in last, after the core
    /// fields.
    extension_args: BTreeMap<String, String>,
    /// Extra query parameters appended to `return_to` before it is embedded
    /// as `openid.return_to` (typically just `nonce`).
    return_to_args: BTreeMap<String, String>,
}

impl AuthRequestBuilder {
    pub fn new(endpoint: &ServiceEndpoint) -> Self {
        Self {
            server_url: endpoint.server_url.clone(),
            server_id: endpoint.server_id.clone(),
            assoc_handle: None,
            extension_args: BTreeMap::new(),
            return_to_args: BTreeMap::new(),
        }
    }

    pub fn association(mut self, association: Option<&Association>) -> Self {
        self.assoc_handle = association.map(|a| a.handle.clone());
        self
    }

    /// Records `openid.<namespace>.<key> = value`; namespaces and keys are
    /// opaque strings the caller has already chosen.
    pub fn add_extension_arg(
        mut self,
        namespace: &str,
        key: &str,
        value: impl Into<String>,
    ) -> Self {
        self.extension_args
            .insert(format!("openid.{namespace}.{key}"), value.into());
        self
    }

    /// Adds a query parameter that will be appended to `return_to` (e.g.
    /// the single-use nonce) before rendering.
    pub fn return_to_arg(mut self, key: &str, value: impl Into<String>) -> Self {
        self.return_to_args.insert(key.to_string(), value.into());
        self
    }

    /// Renders the full redirect URL: `server_url` with the `openid.*` query
    /// parameters appended (any pre-existing query parameters on
    /// `server_url` are preserved).
    ///
    /// - `openid.mode` = `checkid_immediate` if `immediate` else `checkid_setup`.
    /// - `openid.identity` = `server_id`.
    /// - `openid.return_to` = `return_to` with `return_to_args` appended.
    /// - `openid.trust_root` = `trust_root`.
    /// - `openid.assoc_handle` = the association's handle, if present.
    pub fn redirect_url(
        &self,
        trust_root: &str,
        return_to: &str,
        immediate: bool,
    ) -> Result<Url, url::ParseError> {
        let return_to = self.render_return_to(return_to)?;

        let mut url = Url::parse(&self.server_url)?;
        {
            let mut pairs = url.query_pairs_mut();
            let mode = if immediate {
                CheckMode::Immediate
            } else {
                CheckMode::Setup
            };
            pairs.append_pair("openid.mode", mode.as_str());
            pairs.append_pair("openid.identity", &self.server_id);
            pairs.append_pair("openid.return_to", return_to.as_str());
            pairs.append_pair("openid.trust_root", trust_root);
            if let Some(handle) = &self.assoc_handle {
                pairs.append_pair("openid.assoc_handle", handle);
            }
            for (key, value) in &self.extension_args {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn render_return_to(&self, return_to: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(return_to)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.return_to_args {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}
