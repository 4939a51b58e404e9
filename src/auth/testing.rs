// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for the auth unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

use super::error::TokenVerificationError;
use super::jwks::{JwksFetcher, JwksRequest};
use super::verify::Clock;

pub(crate) const PRIMARY_PRIVATE_PEM: &str =
    include_str!("../../tests/fixtures/primary_rsa_private.pem");
pub(crate) const PRIMARY_PUBLIC_PEM: &str =
    include_str!("../../tests/fixtures/primary_rsa_public.pem");
pub(crate) const ROTATED_PRIVATE_PEM: &str =
    include_str!("../../tests/fixtures/rotated_rsa_private.pem");

pub(crate) const PRIMARY_KID: &str = "ins_2GIoQhbUpy0hX7B2cVkuTMinXoD";
pub(crate) const PRIMARY_MODULUS: &str = "yuDF-QPSRg0A_GAycA1VUTMwbVIcmT469adBezunOTdz_Au1lzH378RrmyjTT5MpDfq5YE8PnnPvD2qJjpg6PPgbvdceVSZKzy766otXM8-Zq3w23hJrgETQMmnDP7nUyqYJvZALpnyZZ7s-OuHz318eUhEqSaR-kEHTm_HF2GJVqmB8l1nCzlQsBGH1tOnjUuITk2CTxXoKEy_o8YlxMaCUnMjHrKYmdcawL7rXlomWCt4Syzfc5gSFFxL9nfeF7NPnXFjzFBQ5AehRmuOvXkX7V2XhWlJEXX7BeHEOacqyQLx9qjtlzJXM5iTokV77_yfb9KZirjoobnb6foDd1Q";

pub(crate) const PUBLISHABLE_KEY: &str = "pk_test_Y2xlcmsuaW5jbHVkZWQua2F0eWRpZC05Mi5sY2wuZGV2JA";
pub(crate) const ISSUED_AT: i64 = 1_666_648_250;
pub(crate) const AUTHORIZED_PARTY: &str = "https://accounts.inspired.puma-74.lcl.dev";

pub(crate) fn session_claims() -> Value {
    json!({
        "azp": AUTHORIZED_PARTY,
        "exp": ISSUED_AT + 60,
        "iat": ISSUED_AT,
        "iss": "https://clerk.inspired.puma-74.lcl.dev",
        "nbf": ISSUED_AT - 10,
        "sid": "sess_2GbDB4enNdCa5vS1zpC3Xzg9tK9",
        "sub": "user_2GIpXOEpVyJw51rkZn9Kmnc6Sxr"
    })
}

pub(crate) fn sign_with(claims: &Value, private_pem: &str, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_owned);
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

/// Token signed by the primary key, carrying [`PRIMARY_KID`].
pub(crate) fn sign(claims: &Value) -> String {
    sign_with(claims, PRIMARY_PRIVATE_PEM, Some(PRIMARY_KID))
}

pub(crate) fn session_token() -> String {
    sign(&session_claims())
}

/// Token with the primary kid but signed by a different key.
pub(crate) fn invalid_signature_token() -> String {
    sign_with(&session_claims(), ROTATED_PRIVATE_PEM, Some(PRIMARY_KID))
}

pub(crate) fn primary_jwk() -> Jwk {
    serde_json::from_value(json!({
        "kty": "RSA",
        "use": "sig",
        "alg": "RS256",
        "kid": PRIMARY_KID,
        "n": PRIMARY_MODULUS,
        "e": "AQAB"
    }))
    .unwrap()
}

pub(crate) fn at(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap()
}

/// Clock pinned to a settable instant.
pub(crate) struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub(crate) fn at(seconds: i64) -> Self {
        Self(Mutex::new(at(seconds)))
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// In-memory key set that counts how often it is fetched.
pub(crate) struct CountingFetcher {
    keys: Vec<Jwk>,
    calls: AtomicUsize,
    last_url: Mutex<Option<String>>,
}

impl CountingFetcher {
    pub(crate) fn new(keys: Vec<Jwk>) -> Self {
        Self {
            keys,
            calls: AtomicUsize::new(0),
            last_url: Mutex::new(None),
        }
    }

    pub(crate) fn with_primary_key() -> Self {
        Self::new(vec![primary_jwk()])
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_url(&self) -> Option<String> {
        self.last_url.lock().unwrap().clone()
    }
}

#[async_trait]
impl JwksFetcher for CountingFetcher {
    async fn fetch(&self, request: &JwksRequest<'_>) -> Result<Vec<Jwk>, TokenVerificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock().unwrap() = Some(request.url());
        Ok(self.keys.clone())
    }
}
