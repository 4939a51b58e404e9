// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing key resolution: a static PEM key, or a remote JWKS entry by `kid`.
//!
//! ## Caching
//!
//! - Remote keys are cached per `kid` with a configurable TTL
//! - A miss, an expired entry or `skip_cache` triggers one fetch of the full
//!   key set, which is written through to the cache
//! - Concurrent fetches for the same `kid` may race; the last write wins and
//!   every write for a `kid` carries the same key
//! - Fetch failures are not retried and stale entries are never served
//!
//! The static key, when configured, always takes precedence and no remote
//! call is made.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk};
use jsonwebtoken::DecodingKey;
use lru::LruCache;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::error::{
    TokenVerificationError, TokenVerificationErrorAction, TokenVerificationErrorReason,
};

/// Default Clerk Backend API origin.
pub const DEFAULT_API_URL: &str = "https://api.clerk.com";

/// Default Clerk Backend API version.
pub const DEFAULT_API_VERSION: &str = "v1";

/// Default JWKS cache TTL (1 hour).
pub const DEFAULT_JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Maximum number of distinct `kid`s kept in memory.
const DEFAULT_CACHE_CAPACITY: usize = 64;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// A key ready for signature verification.
#[derive(Clone)]
pub struct SigningKey {
    pub(crate) key: DecodingKey,
    kid: Option<String>,
}

impl SigningKey {
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

/// Parse a locally configured RSA public key.
///
/// Accepts a full PEM block or just its base64 body, with or without line
/// breaks.
pub fn load_static_key(jwt_key: &str) -> Result<SigningKey, TokenVerificationError> {
    let trimmed = jwt_key.trim();
    if trimmed.is_empty() {
        return Err(TokenVerificationError::new(
            TokenVerificationErrorReason::JwkFailedToLoad,
            "Missing local JWK.",
        )
        .with_action(TokenVerificationErrorAction::SetClerkJwtKey));
    }

    let pem = if trimmed.contains("-----BEGIN") {
        trimmed.to_string()
    } else {
        wrap_public_key_body(trimmed)
    };

    let key = DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
        TokenVerificationError::new(
            TokenVerificationErrorReason::JwkFailedToLoad,
            format!("Unable to parse the configured JWT key: {e}"),
        )
        .with_action(TokenVerificationErrorAction::SetClerkJwtKey)
    })?;

    Ok(SigningKey { key, kid: None })
}

fn wrap_public_key_body(body: &str) -> String {
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pem = String::from("-----BEGIN PUBLIC KEY-----\n");
    for line in compact.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----");
    pem
}

/// Where and how to fetch a key set.
#[derive(Debug, Clone, Copy)]
pub struct JwksRequest<'a> {
    pub api_url: &'a str,
    pub api_version: &'a str,
    pub secret_key: &'a str,
}

impl JwksRequest<'_> {
    /// `<api_url>/<api_version>/jwks`
    pub fn url(&self) -> String {
        format!(
            "{}/{}/jwks",
            self.api_url.trim_end_matches('/'),
            self.api_version.trim_matches('/')
        )
    }
}

/// Source of remote key sets.
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    /// Fetch every key the backend currently signs with.
    async fn fetch(&self, request: &JwksRequest<'_>) -> Result<Vec<Jwk>, TokenVerificationError>;
}

#[derive(Deserialize)]
struct JwksResponse {
    #[serde(default)]
    keys: Vec<Jwk>,
}

/// Fetches `GET <api_url>/<api_version>/jwks` authenticated with the secret key.
#[derive(Clone)]
pub struct HttpJwksFetcher {
    client: reqwest::Client,
}

impl HttpJwksFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build JWKS HTTP client, using defaults without timeout");
                reqwest::Client::new()
            });
        Self { client }
    }
}

impl Default for HttpJwksFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn remote_load_error(message: String) -> TokenVerificationError {
    TokenVerificationError::new(TokenVerificationErrorReason::RemoteJwkFailedToLoad, message)
        .with_action(TokenVerificationErrorAction::ContactSupport)
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch(&self, request: &JwksRequest<'_>) -> Result<Vec<Jwk>, TokenVerificationError> {
        let url = url::Url::parse(&request.url())
            .map_err(|e| remote_load_error(format!("Invalid JWKS URL {}: {e}", request.url())))?;

        let response = self
            .client
            .get(url.clone())
            .bearer_auth(request.secret_key)
            .send()
            .await
            .map_err(|e| remote_load_error(format!("Error loading Clerk JWKS from {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(remote_load_error(format!(
                "Error loading Clerk JWKS from {url} with code={}",
                response.status().as_u16()
            )));
        }

        let body: JwksResponse = response
            .json()
            .await
            .map_err(|e| remote_load_error(format!("Invalid JWKS response from {url}: {e}")))?;

        Ok(body.keys)
    }
}

/// Where the remote key for a token lives.
#[derive(Debug, Clone, Copy)]
pub struct RemoteKeyOptions<'a> {
    pub secret_key: &'a str,
    pub api_url: &'a str,
    pub api_version: &'a str,
    pub kid: &'a str,
    pub cache_ttl: Duration,
    pub skip_cache: bool,
}

struct CacheEntry {
    jwk: Jwk,
    fetched_at: Instant,
}

/// Resolves signing keys and owns the process-wide key cache.
pub struct KeyResolver {
    fetcher: Arc<dyn JwksFetcher>,
    cache: Mutex<LruCache<String, CacheEntry>>,
    static_key: Mutex<Option<(String, SigningKey)>>,
}

impl KeyResolver {
    pub fn new(fetcher: Arc<dyn JwksFetcher>) -> Self {
        Self::with_capacity(fetcher, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(fetcher: Arc<dyn JwksFetcher>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            fetcher,
            cache: Mutex::new(LruCache::new(capacity)),
            static_key: Mutex::new(None),
        }
    }

    /// Parse (once per distinct value) the configured static key.
    pub fn resolve_static_key(&self, jwt_key: &str) -> Result<SigningKey, TokenVerificationError> {
        if let Ok(cached) = self.static_key.lock() {
            if let Some((source, key)) = cached.as_ref() {
                if source == jwt_key {
                    return Ok(key.clone());
                }
            }
        }

        let key = load_static_key(jwt_key)?;
        if let Ok(mut cached) = self.static_key.lock() {
            *cached = Some((jwt_key.to_string(), key.clone()));
        }
        Ok(key)
    }

    /// Look up `kid` in the cache, fetching the key set on a miss.
    pub async fn resolve_remote_key(
        &self,
        options: &RemoteKeyOptions<'_>,
    ) -> Result<SigningKey, TokenVerificationError> {
        if !options.skip_cache {
            if let Some(jwk) = self.cached(options.kid, options.cache_ttl) {
                debug!(kid = options.kid, "JWKS cache hit");
                return jwk_to_signing_key(&jwk);
            }
        }

        let request = JwksRequest {
            api_url: options.api_url,
            api_version: options.api_version,
            secret_key: options.secret_key,
        };
        let keys = self.fetcher.fetch(&request).await.map_err(|e| {
            warn!(url = %request.url(), error = %e, "JWKS fetch failed");
            e
        })?;

        if keys.is_empty() {
            warn!(url = %request.url(), "JWKS endpoint returned no signing keys");
            return Err(remote_load_error(
                "The JWKS endpoint did not contain any signing keys.".to_string(),
            ));
        }

        info!(count = keys.len(), url = %request.url(), "Fetched JWKS");
        self.store(&keys);

        let jwk = keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(options.kid))
            .ok_or_else(|| kid_mismatch(options.kid, &keys))?;

        jwk_to_signing_key(jwk)
    }

    /// Whether `kid` is cached and younger than `ttl`.
    pub fn is_cached(&self, kid: &str, ttl: Duration) -> bool {
        self.cached(kid, ttl).is_some()
    }

    fn cached(&self, kid: &str, ttl: Duration) -> Option<Jwk> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(kid) {
            if entry.fetched_at.elapsed() < ttl {
                return Some(entry.jwk.clone());
            }
            cache.pop(kid);
        }
        None
    }

    fn store(&self, keys: &[Jwk]) {
        let Ok(mut cache) = self.cache.lock() else {
            return;
        };
        let fetched_at = Instant::now();
        for jwk in keys {
            if let Some(kid) = &jwk.common.key_id {
                cache.put(
                    kid.clone(),
                    CacheEntry {
                        jwk: jwk.clone(),
                        fetched_at,
                    },
                );
            }
        }
    }
}

fn kid_mismatch(kid: &str, keys: &[Jwk]) -> TokenVerificationError {
    let available = keys
        .iter()
        .filter_map(|k| k.common.key_id.as_deref())
        .collect::<Vec<_>>()
        .join(", ");
    TokenVerificationError::new(
        TokenVerificationErrorReason::JwkKidMismatch,
        format!(
            "Unable to find a signing key in JWKS that matches the kid='{kid}' of the provided \
             session token. Please make sure that the __session cookie or the HTTP authorization \
             header contain a Clerk-generated session JWT. The following kid is available: {available}"
        ),
    )
    .with_action(TokenVerificationErrorAction::ContactSupport)
}

/// Convert a JWK to a verification key.
fn jwk_to_signing_key(jwk: &Jwk) -> Result<SigningKey, TokenVerificationError> {
    let key = match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e),
        AlgorithmParameters::EllipticCurve(ec) => DecodingKey::from_ec_components(&ec.x, &ec.y),
        _ => {
            return Err(remote_load_error(
                "Unsupported key type in JWKS".to_string(),
            ))
        }
    }
    .map_err(|e| remote_load_error(format!("Invalid signing key in JWKS: {e}")))?;

    Ok(SigningKey {
        key,
        kid: jwk.common.key_id.clone(),
    })
}
