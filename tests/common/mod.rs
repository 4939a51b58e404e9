// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for the integration tests: signed session tokens, a
//! settable clock, and a wiremock stand-in for the Clerk Backend API.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::http::{HeaderMap, HeaderName, HeaderValue, Uri};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use relational_session_auth::auth::{
    Authenticator, BuildTimeOptions, Clock, HttpJwksFetcher, KeyResolver, RequestSignals,
};
use serde_json::{json, Value};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const PRIMARY_PRIVATE_PEM: &str = include_str!("../fixtures/primary_rsa_private.pem");
pub const ROTATED_PRIVATE_PEM: &str = include_str!("../fixtures/rotated_rsa_private.pem");

pub const PRIMARY_KID: &str = "ins_2GIoQhbUpy0hX7B2cVkuTMinXoD";
pub const PRIMARY_MODULUS: &str = "yuDF-QPSRg0A_GAycA1VUTMwbVIcmT469adBezunOTdz_Au1lzH378RrmyjTT5MpDfq5YE8PnnPvD2qJjpg6PPgbvdceVSZKzy766otXM8-Zq3w23hJrgETQMmnDP7nUyqYJvZALpnyZZ7s-OuHz318eUhEqSaR-kEHTm_HF2GJVqmB8l1nCzlQsBGH1tOnjUuITk2CTxXoKEy_o8YlxMaCUnMjHrKYmdcawL7rXlomWCt4Syzfc5gSFFxL9nfeF7NPnXFjzFBQ5AehRmuOvXkX7V2XhWlJEXX7BeHEOacqyQLx9qjtlzJXM5iTokV77_yfb9KZirjoobnb6foDd1Q";

pub const PUBLISHABLE_KEY: &str = "pk_test_Y2xlcmsuaW5jbHVkZWQua2F0eWRpZC05Mi5sY2wuZGV2JA";
pub const SECRET_KEY: &str = "sk_test_deadbeef";
pub const LIVE_SECRET_KEY: &str = "sk_live_deadbeef";
pub const ISSUED_AT: i64 = 1_666_648_250;
pub const AUTHORIZED_PARTY: &str = "https://accounts.inspired.puma-74.lcl.dev";
pub const USER_ID: &str = "user_2GIpXOEpVyJw51rkZn9Kmnc6Sxr";

pub fn session_claims() -> Value {
    json!({
        "azp": AUTHORIZED_PARTY,
        "exp": ISSUED_AT + 60,
        "iat": ISSUED_AT,
        "iss": "https://clerk.inspired.puma-74.lcl.dev",
        "nbf": ISSUED_AT - 10,
        "sid": "sess_2GbDB4enNdCa5vS1zpC3Xzg9tK9",
        "sub": USER_ID
    })
}

pub fn sign_with(claims: &Value, private_pem: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(PRIMARY_KID.to_string());
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

pub fn session_token() -> String {
    sign_with(&session_claims(), PRIMARY_PRIVATE_PEM)
}

/// Right kid, wrong key.
pub fn invalid_signature_token() -> String {
    sign_with(&session_claims(), ROTATED_PRIVATE_PEM)
}

pub fn primary_jwk() -> Value {
    json!({
        "kty": "RSA",
        "use": "sig",
        "alg": "RS256",
        "kid": PRIMARY_KID,
        "n": PRIMARY_MODULUS,
        "e": "AQAB"
    })
}

/// Clock pinned to a settable instant.
pub struct TestClock(Mutex<DateTime<Utc>>);

impl TestClock {
    pub fn at(seconds: i64) -> Arc<Self> {
        Arc::new(Self(Mutex::new(DateTime::from_timestamp(seconds, 0).unwrap())))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Wiremock stand-in for `GET /v1/jwks`.
pub struct MockClerkApi {
    pub server: MockServer,
}

impl MockClerkApi {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn api_url(&self) -> String {
        self.server.uri()
    }

    pub async fn mock_jwks(&self, keys: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path("/v1/jwks"))
            .and(header("authorization", format!("Bearer {SECRET_KEY}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_jwks_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/v1/jwks"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Number of JWKS requests the server has seen.
    pub async fn jwks_calls(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/v1/jwks")
            .count()
    }

    pub fn authenticator(&self, clock: Arc<TestClock>) -> Authenticator {
        self.authenticator_with(
            BuildTimeOptions {
                secret_key: SECRET_KEY.to_string(),
                publishable_key: PUBLISHABLE_KEY.to_string(),
                ..BuildTimeOptions::default()
            },
            clock,
        )
    }

    pub fn authenticator_with(&self, build: BuildTimeOptions, clock: Arc<TestClock>) -> Authenticator {
        let build = BuildTimeOptions {
            api_url: self.api_url(),
            api_version: "v1".to_string(),
            ..build
        };
        Authenticator::new(build)
            .with_key_resolver(Arc::new(KeyResolver::new(Arc::new(HttpJwksFetcher::new()))))
            .with_clock(clock)
    }
}

/// Browser-like request with optional extra headers and cookies.
pub fn request(url: &str, headers: &[(&str, &str)], cookies: &[(&str, &str)]) -> RequestSignals {
    let mut map = HeaderMap::new();
    map.insert("host", HeaderValue::from_static("example.com"));
    map.insert("user-agent", HeaderValue::from_static("Mozilla/TestAgent"));
    for (name, value) in headers {
        map.insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    if !cookies.is_empty() {
        let cookie = cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        map.insert("cookie", HeaderValue::from_str(&cookie).unwrap());
    }
    let uri: Uri = url.parse().unwrap();
    RequestSignals::from_parts(&map, &uri)
}
