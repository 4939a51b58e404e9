// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token verification.
//!
//! `verify_jwt` runs fail-fast checks in a fixed order:
//!
//! 1. structure (three dot-separated parts, decodable header and payload)
//! 2. algorithm allow-list
//! 3. signature against the resolved key
//! 4. temporal claims (`exp`, `nbf`, `iat`) with clock-skew tolerance
//! 5. required claims (`sub`)
//! 6. audience, when configured
//! 7. authorized party, when configured
//!
//! Failures are never retried.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Header, Validation};
use serde_json::{Map, Value};

use super::claims::JwtPayload;
use super::error::{
    TokenVerificationError, TokenVerificationErrorAction, TokenVerificationErrorReason,
};
use super::jwks::{KeyResolver, RemoteKeyOptions, SigningKey, DEFAULT_JWKS_CACHE_TTL};

/// Default clock skew tolerance (5 seconds).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(5);

const SUPPORTED_ALGORITHMS: [Algorithm; 5] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::ES256,
    Algorithm::ES384,
];

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A token split into header and claims, signature not yet checked.
#[derive(Debug, Clone)]
pub struct DecodedJwt {
    pub header: Header,
    pub payload: Map<String, Value>,
}

impl DecodedJwt {
    pub fn kid(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// `iat` claim in seconds, if it is an integer.
    pub fn issued_at(&self) -> Option<i64> {
        self.payload.get("iat").and_then(Value::as_i64)
    }
}

/// Decode without verifying anything but the token's shape.
pub fn decode_jwt(token: &str) -> Result<DecodedJwt, TokenVerificationError> {
    if token.split('.').count() != 3 {
        return Err(TokenVerificationError::new(
            TokenVerificationErrorReason::TokenInvalid,
            "Invalid JWT form. A JWT consists of three parts separated by dots.",
        ));
    }

    let data = jsonwebtoken::dangerous::insecure_decode::<Map<String, Value>>(token).map_err(|e| {
        TokenVerificationError::new(
            TokenVerificationErrorReason::TokenInvalid,
            format!("Invalid JWT. Unable to decode the token: {e}"),
        )
    })?;

    Ok(DecodedJwt {
        header: data.header,
        payload: data.claims,
    })
}

/// Claim checks applied after the signature.
#[derive(Debug, Clone)]
pub struct VerifyJwtOptions {
    pub audience: Vec<String>,
    pub authorized_parties: Vec<String>,
    pub clock_skew: Duration,
}

impl Default for VerifyJwtOptions {
    fn default() -> Self {
        Self {
            audience: Vec::new(),
            authorized_parties: Vec::new(),
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }
}

/// Verify `token` against an already resolved key.
pub fn verify_jwt(
    token: &str,
    options: &VerifyJwtOptions,
    key: &SigningKey,
    now: DateTime<Utc>,
) -> Result<JwtPayload, TokenVerificationError> {
    let decoded = decode_jwt(token)?;
    verify_decoded(token, decoded, options, key, now)
}

fn verify_decoded(
    token: &str,
    decoded: DecodedJwt,
    options: &VerifyJwtOptions,
    key: &SigningKey,
    now: DateTime<Utc>,
) -> Result<JwtPayload, TokenVerificationError> {
    let algorithm = decoded.header.alg;
    if !SUPPORTED_ALGORITHMS.contains(&algorithm) {
        return Err(invalid_algorithm(algorithm));
    }

    verify_signature(token, key, algorithm)?;

    let payload = decoded.payload;
    let now_ms = now.timestamp_millis();
    let skew_ms = i64::try_from(options.clock_skew.as_millis()).unwrap_or(i64::MAX);
    check_temporal_claims(&payload, now_ms, skew_ms)?;
    check_subject(&payload)?;
    check_audience(&payload, &options.audience)?;
    check_authorized_party(&payload, &options.authorized_parties)?;

    serde_json::from_value(Value::Object(payload)).map_err(|e| {
        TokenVerificationError::new(
            TokenVerificationErrorReason::TokenVerificationFailed,
            format!("Invalid JWT payload: {e}"),
        )
    })
}

fn invalid_algorithm(algorithm: Algorithm) -> TokenVerificationError {
    let supported = SUPPORTED_ALGORITHMS
        .iter()
        .map(|a| format!("{a:?}"))
        .collect::<Vec<_>>()
        .join(", ");
    TokenVerificationError::new(
        TokenVerificationErrorReason::TokenInvalidAlgorithm,
        format!("Invalid JWT algorithm \"{algorithm:?}\". Supported: {supported}."),
    )
}

fn verify_signature(
    token: &str,
    key: &SigningKey,
    algorithm: Algorithm,
) -> Result<(), TokenVerificationError> {
    // Claims are checked by hand afterwards, in order and with our messages.
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<Value>(token, &key.key, &validation)
        .map(|_| ())
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenVerificationError::new(
                TokenVerificationErrorReason::TokenInvalidSignature,
                "JWT signature is invalid.",
            ),
            ErrorKind::InvalidAlgorithm => invalid_algorithm(algorithm),
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat => {
                TokenVerificationError::new(
                    TokenVerificationErrorReason::TokenInvalidSignature,
                    format!("Error running signature verification: {e}"),
                )
            }
            _ => TokenVerificationError::new(
                TokenVerificationErrorReason::TokenInvalid,
                format!("Invalid JWT. {e}"),
            ),
        })
}

/// Format like JavaScript's `Date.prototype.toUTCString`.
fn utc_string(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|d| d.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
        .unwrap_or_else(|| "Invalid Date".to_string())
}

#[allow(clippy::cast_possible_truncation)]
fn claim_ms(value: &Value) -> Option<i64> {
    value.as_f64().map(|seconds| (seconds * 1000.0) as i64)
}

fn check_temporal_claims(
    payload: &Map<String, Value>,
    now_ms: i64,
    skew_ms: i64,
) -> Result<(), TokenVerificationError> {
    let exp = payload.get("exp");
    let Some(exp_ms) = exp.and_then(claim_ms) else {
        return Err(TokenVerificationError::new(
            TokenVerificationErrorReason::TokenVerificationFailed,
            format!(
                "Invalid JWT expiry date claim (exp) {}. Expected number.",
                json_or_undefined(exp)
            ),
        ));
    };
    if exp_ms <= now_ms.saturating_sub(skew_ms) {
        return Err(TokenVerificationError::new(
            TokenVerificationErrorReason::TokenExpired,
            format!(
                "JWT is expired. Expiry date: {}, Current date: {}.",
                utc_string(exp_ms),
                utc_string(now_ms)
            ),
        ));
    }

    if let Some(nbf_ms) = payload.get("nbf").and_then(claim_ms) {
        if nbf_ms > now_ms.saturating_add(skew_ms) {
            return Err(TokenVerificationError::new(
                TokenVerificationErrorReason::TokenNotActiveYet,
                format!(
                    "JWT cannot be used prior to not before date claim (nbf). Not before date: {}; Current date: {};",
                    utc_string(nbf_ms),
                    utc_string(now_ms)
                ),
            )
            .with_action(TokenVerificationErrorAction::EnsureClockSync));
        }
    }

    if let Some(iat_ms) = payload.get("iat").and_then(claim_ms) {
        if iat_ms > now_ms.saturating_add(skew_ms) {
            return Err(TokenVerificationError::new(
                TokenVerificationErrorReason::TokenIatInTheFuture,
                format!(
                    "JWT issued at date claim (iat) is in the future. Issued at date: {}; Current date: {};",
                    utc_string(iat_ms),
                    utc_string(now_ms)
                ),
            )
            .with_action(TokenVerificationErrorAction::EnsureClockSync));
        }
    }

    Ok(())
}

fn check_subject(payload: &Map<String, Value>) -> Result<(), TokenVerificationError> {
    match payload.get("sub") {
        Some(Value::String(_)) => Ok(()),
        other => Err(TokenVerificationError::new(
            TokenVerificationErrorReason::TokenVerificationFailed,
            format!(
                "Subject claim (sub) is required and must be a string. Received {}.",
                json_or_undefined(other)
            ),
        )
        .with_action(TokenVerificationErrorAction::EnsureClerkJwt)),
    }
}

fn check_audience(
    payload: &Map<String, Value>,
    audience: &[String],
) -> Result<(), TokenVerificationError> {
    if audience.is_empty() {
        return Ok(());
    }

    let aud = payload.get("aud");
    let matches = match aud {
        Some(Value::String(value)) => audience.contains(value),
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .any(|value| audience.iter().any(|expected| expected == value)),
        _ => false,
    };

    if matches {
        return Ok(());
    }

    Err(TokenVerificationError::new(
        TokenVerificationErrorReason::TokenInvalidAudience,
        format!(
            "Invalid JWT audience claim (aud) {}. Is not included in \"{}\".",
            json_or_undefined(aud),
            Value::from(audience.to_vec())
        ),
    ))
}

fn check_authorized_party(
    payload: &Map<String, Value>,
    authorized_parties: &[String],
) -> Result<(), TokenVerificationError> {
    if authorized_parties.is_empty() {
        return Ok(());
    }

    let azp = payload.get("azp");
    if let Some(Value::String(value)) = azp {
        if authorized_parties.contains(value) {
            return Ok(());
        }
    }

    Err(TokenVerificationError::new(
        TokenVerificationErrorReason::TokenInvalidAuthorizedParties,
        format!(
            "Invalid JWT Authorized party claim (azp) {}. Expected \"{}\".",
            json_or_undefined(azp),
            authorized_parties.join(",")
        ),
    ))
}

fn json_or_undefined(value: Option<&Value>) -> String {
    value.map_or_else(|| "undefined".to_string(), Value::to_string)
}

/// Everything needed to resolve a key and verify a token.
#[derive(Debug, Clone)]
pub struct VerifyTokenOptions {
    pub jwt_key: Option<String>,
    pub secret_key: Option<String>,
    pub api_url: String,
    pub api_version: String,
    pub jwks_cache_ttl: Duration,
    pub skip_jwks_cache: bool,
    pub jwt: VerifyJwtOptions,
}

impl Default for VerifyTokenOptions {
    fn default() -> Self {
        Self {
            jwt_key: None,
            secret_key: None,
            api_url: super::jwks::DEFAULT_API_URL.to_string(),
            api_version: super::jwks::DEFAULT_API_VERSION.to_string(),
            jwks_cache_ttl: DEFAULT_JWKS_CACHE_TTL,
            skip_jwks_cache: false,
            jwt: VerifyJwtOptions::default(),
        }
    }
}

/// Resolve the signing key for `token` and verify it.
///
/// A configured static key always wins; otherwise the key is looked up in the
/// remote key set by the token's `kid`.
pub async fn verify_token(
    token: &str,
    options: &VerifyTokenOptions,
    keys: &KeyResolver,
    now: DateTime<Utc>,
) -> Result<JwtPayload, TokenVerificationError> {
    let decoded = decode_jwt(token)?;

    let key = if let Some(jwt_key) = options.jwt_key.as_deref().filter(|k| !k.is_empty()) {
        keys.resolve_static_key(jwt_key)?
    } else if let Some(secret_key) = options.secret_key.as_deref().filter(|k| !k.is_empty()) {
        keys.resolve_remote_key(&RemoteKeyOptions {
            secret_key,
            api_url: &options.api_url,
            api_version: &options.api_version,
            kid: decoded.kid().unwrap_or_default(),
            cache_ttl: options.jwks_cache_ttl,
            skip_cache: options.skip_jwks_cache,
        })
        .await?
    } else {
        return Err(TokenVerificationError::new(
            TokenVerificationErrorReason::JwkFailedToResolve,
            "Failed to resolve JWK during verification.",
        )
        .with_action(TokenVerificationErrorAction::SetClerkJwtKey));
    };

    verify_decoded(token, decoded, &options.jwt, &key, now)
}
