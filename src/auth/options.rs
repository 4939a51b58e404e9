// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticator options and the environment heuristics they feed.
//!
//! ## Layers
//!
//! - [`BuildTimeOptions`]: credentials and instance settings, fixed at
//!   process start
//! - [`RuntimeOptions`]: per-call overrides; they cannot name the backend
//!   endpoint at all
//! - [`AuthenticateRequestOptions`]: the merged, immutable view used by a
//!   single resolution

use std::fmt;
use std::time::Duration;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::Deserialize;

use super::jwks::{DEFAULT_API_URL, DEFAULT_API_VERSION, DEFAULT_JWKS_CACHE_TTL};
use super::verify::{VerifyJwtOptions, VerifyTokenOptions, DEFAULT_CLOCK_SKEW};

/// Base64 that tolerates both padded and unpadded input.
const PUBLISHABLE_KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Environment an instance runs in, derived from its key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceType {
    Development,
    Production,
}

impl InstanceType {
    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

/// Classifies key material as development or production by prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceTypeDetector {
    pub development_prefixes: Vec<String>,
}

impl Default for InstanceTypeDetector {
    fn default() -> Self {
        Self {
            development_prefixes: vec![
                "sk_test_".to_string(),
                "test_".to_string(),
                "pk_test_".to_string(),
            ],
        }
    }
}

impl InstanceTypeDetector {
    /// Classify by the secret key, falling back to the publishable key.
    pub fn classify(&self, secret_key: Option<&str>, publishable_key: Option<&str>) -> InstanceType {
        let key = secret_key
            .filter(|k| !k.is_empty())
            .or(publishable_key.filter(|k| !k.is_empty()))
            .unwrap_or_default();

        if self.development_prefixes.iter().any(|p| key.starts_with(p.as_str())) {
            InstanceType::Development
        } else {
            InstanceType::Production
        }
    }
}

/// Recognises browsers and trusted forwarding proxies by `User-Agent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgentPolicy {
    pub browser_prefixes: Vec<String>,
    /// Exact agents of CDN edges that forward on behalf of browsers
    pub trusted_edge_agents: Vec<String>,
}

impl Default for UserAgentPolicy {
    fn default() -> Self {
        Self {
            browser_prefixes: vec!["Mozilla/".to_string()],
            trusted_edge_agents: vec!["Amazon CloudFront".to_string()],
        }
    }
}

impl UserAgentPolicy {
    pub fn is_browser(&self, user_agent: &str) -> bool {
        self.browser_prefixes
            .iter()
            .any(|p| user_agent.starts_with(p.as_str()))
    }

    pub fn is_trusted_edge(&self, user_agent: &str) -> bool {
        self.trusted_edge_agents.iter().any(|a| a == user_agent)
    }

    /// Whether satellite cookies from this agent may be trusted.
    pub fn is_expected(&self, user_agent: &str) -> bool {
        self.is_browser(user_agent) || self.is_trusted_edge(user_agent)
    }
}

/// String heuristics injected into the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Heuristics {
    pub instance_type: InstanceTypeDetector,
    pub user_agent: UserAgentPolicy,
}

/// Decoded publishable key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishableKey {
    pub instance_type: InstanceType,
    /// Frontend API host, e.g. `clerk.example.com`
    pub frontend_api: String,
}

/// Parse `pk_test_<base64(host$)>` or `pk_live_<base64(host$)>`.
///
/// Returns `None` for anything else.
pub fn parse_publishable_key(key: &str) -> Option<PublishableKey> {
    let (instance_type, encoded) = if let Some(rest) = key.strip_prefix("pk_test_") {
        (InstanceType::Development, rest)
    } else if let Some(rest) = key.strip_prefix("pk_live_") {
        (InstanceType::Production, rest)
    } else {
        return None;
    };

    let decoded = PUBLISHABLE_KEY_ENGINE.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let frontend_api = decoded.strip_suffix('$')?;
    if frontend_api.is_empty() {
        return None;
    }

    Some(PublishableKey {
        instance_type,
        frontend_api: frontend_api.to_string(),
    })
}

/// Settings fixed when the authenticator is created.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct BuildTimeOptions {
    pub secret_key: String,
    /// Static PEM public key; when set, no remote key set is fetched
    pub jwt_key: String,
    pub api_url: String,
    pub api_version: String,
    pub proxy_url: String,
    pub publishable_key: String,
    pub is_satellite: bool,
    pub domain: String,
    pub audience: Vec<String>,
}

impl Default for BuildTimeOptions {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            jwt_key: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            proxy_url: String::new(),
            publishable_key: String::new(),
            is_satellite: false,
            domain: String::new(),
            audience: Vec::new(),
        }
    }
}

impl fmt::Debug for BuildTimeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildTimeOptions")
            .field("secret_key", &redacted(&self.secret_key))
            .field("jwt_key", &redacted(&self.jwt_key))
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .field("proxy_url", &self.proxy_url)
            .field("publishable_key", &self.publishable_key)
            .field("is_satellite", &self.is_satellite)
            .field("domain", &self.domain)
            .field("audience", &self.audience)
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

/// Per-call overrides. `None` keeps the build-time value.
///
/// There is deliberately no `api_url` or `api_version` here.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub secret_key: Option<String>,
    pub jwt_key: Option<String>,
    pub proxy_url: Option<String>,
    pub publishable_key: Option<String>,
    pub is_satellite: Option<bool>,
    pub domain: Option<String>,
    pub audience: Option<Vec<String>>,
    pub authorized_parties: Option<Vec<String>>,
    pub sign_in_url: Option<String>,
    pub sign_up_url: Option<String>,
    pub after_sign_in_url: Option<String>,
    pub after_sign_up_url: Option<String>,
    pub clock_skew: Option<Duration>,
    pub jwks_cache_ttl: Option<Duration>,
    pub skip_jwks_cache: Option<bool>,
}

/// Fully merged options for one resolution.
#[derive(Clone)]
pub struct AuthenticateRequestOptions {
    pub secret_key: String,
    pub jwt_key: String,
    pub api_url: String,
    pub api_version: String,
    pub proxy_url: String,
    pub publishable_key: String,
    pub is_satellite: bool,
    pub domain: String,
    pub audience: Vec<String>,
    pub authorized_parties: Vec<String>,
    pub sign_in_url: String,
    pub sign_up_url: String,
    pub after_sign_in_url: String,
    pub after_sign_up_url: String,
    pub clock_skew: Duration,
    pub jwks_cache_ttl: Duration,
    pub skip_jwks_cache: bool,
}

impl AuthenticateRequestOptions {
    /// Overlay `runtime` on `build`. The backend endpoint always comes from
    /// `build`.
    pub fn merge(build: &BuildTimeOptions, runtime: RuntimeOptions) -> Self {
        Self {
            secret_key: runtime.secret_key.unwrap_or_else(|| build.secret_key.clone()),
            jwt_key: runtime.jwt_key.unwrap_or_else(|| build.jwt_key.clone()),
            api_url: build.api_url.clone(),
            api_version: build.api_version.clone(),
            proxy_url: runtime.proxy_url.unwrap_or_else(|| build.proxy_url.clone()),
            publishable_key: runtime
                .publishable_key
                .unwrap_or_else(|| build.publishable_key.clone()),
            is_satellite: runtime.is_satellite.unwrap_or(build.is_satellite),
            domain: runtime.domain.unwrap_or_else(|| build.domain.clone()),
            audience: runtime.audience.unwrap_or_else(|| build.audience.clone()),
            authorized_parties: runtime.authorized_parties.unwrap_or_default(),
            sign_in_url: runtime.sign_in_url.unwrap_or_default(),
            sign_up_url: runtime.sign_up_url.unwrap_or_default(),
            after_sign_in_url: runtime.after_sign_in_url.unwrap_or_default(),
            after_sign_up_url: runtime.after_sign_up_url.unwrap_or_default(),
            clock_skew: runtime.clock_skew.unwrap_or(DEFAULT_CLOCK_SKEW),
            jwks_cache_ttl: runtime.jwks_cache_ttl.unwrap_or(DEFAULT_JWKS_CACHE_TTL),
            skip_jwks_cache: runtime.skip_jwks_cache.unwrap_or(false),
        }
    }

    /// True when neither a static key nor a secret key is configured.
    pub fn lacks_key_material(&self) -> bool {
        self.jwt_key.is_empty() && self.secret_key.is_empty()
    }

    pub fn instance_type(&self, detector: &InstanceTypeDetector) -> InstanceType {
        detector.classify(Some(&self.secret_key), Some(&self.publishable_key))
    }

    /// Frontend API host from the publishable key, if it parses.
    pub fn frontend_api(&self) -> Option<String> {
        parse_publishable_key(&self.publishable_key).map(|pk| pk.frontend_api)
    }

    pub fn verify_token_options(&self) -> VerifyTokenOptions {
        VerifyTokenOptions {
            jwt_key: Some(self.jwt_key.clone()).filter(|k| !k.is_empty()),
            secret_key: Some(self.secret_key.clone()).filter(|k| !k.is_empty()),
            api_url: self.api_url.clone(),
            api_version: self.api_version.clone(),
            jwks_cache_ttl: self.jwks_cache_ttl,
            skip_jwks_cache: self.skip_jwks_cache,
            jwt: VerifyJwtOptions {
                audience: self.audience.clone(),
                authorized_parties: self.authorized_parties.clone(),
                clock_skew: self.clock_skew,
            },
        }
    }
}

impl Default for AuthenticateRequestOptions {
    fn default() -> Self {
        Self::merge(&BuildTimeOptions::default(), RuntimeOptions::default())
    }
}

impl fmt::Debug for AuthenticateRequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticateRequestOptions")
            .field("secret_key", &redacted(&self.secret_key))
            .field("jwt_key", &redacted(&self.jwt_key))
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .field("publishable_key", &self.publishable_key)
            .field("is_satellite", &self.is_satellite)
            .field("domain", &self.domain)
            .field("authorized_parties", &self.authorized_parties)
            .finish_non_exhaustive()
    }
}
