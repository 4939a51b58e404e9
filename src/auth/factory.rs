// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-wide authenticator.
//!
//! Built once at startup from [`BuildTimeOptions`] and shared by reference.
//! Each call overlays its [`RuntimeOptions`]; the backend API URL and version
//! always come from the build-time options.

use std::sync::Arc;

use super::claims::JwtPayload;
use super::error::{AuthError, TokenVerificationError};
use super::extractor::RequestSignals;
use super::jwks::{HttpJwksFetcher, KeyResolver};
use super::options::{AuthenticateRequestOptions, BuildTimeOptions, Heuristics, RuntimeOptions};
use super::request;
use super::status::{debug_request_state, RequestState, RequestStateDebug};
use super::verify::{self, Clock, SystemClock};

pub struct Authenticator {
    build: BuildTimeOptions,
    keys: Arc<KeyResolver>,
    clock: Arc<dyn Clock>,
    heuristics: Heuristics,
}

impl Authenticator {
    /// Authenticator that fetches remote keys over HTTPS.
    pub fn new(build: BuildTimeOptions) -> Self {
        Self {
            build,
            keys: Arc::new(KeyResolver::new(Arc::new(HttpJwksFetcher::new()))),
            clock: Arc::new(SystemClock),
            heuristics: Heuristics::default(),
        }
    }

    pub fn with_key_resolver(mut self, keys: Arc<KeyResolver>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_heuristics(mut self, heuristics: Heuristics) -> Self {
        self.heuristics = heuristics;
        self
    }

    pub fn build_options(&self) -> &BuildTimeOptions {
        &self.build
    }

    pub fn key_resolver(&self) -> &KeyResolver {
        &self.keys
    }

    /// Merge `runtime` over the build-time options.
    pub fn options(&self, runtime: RuntimeOptions) -> AuthenticateRequestOptions {
        AuthenticateRequestOptions::merge(&self.build, runtime)
    }

    pub async fn authenticate_request(
        &self,
        signals: &RequestSignals,
        runtime: RuntimeOptions,
    ) -> Result<RequestState, AuthError> {
        let options = self.options(runtime);
        request::authenticate_request(
            signals,
            &options,
            &self.heuristics,
            &self.keys,
            self.clock.as_ref(),
        )
        .await
    }

    /// Verify a bare token with the merged options.
    pub async fn verify_token(
        &self,
        token: &str,
        runtime: RuntimeOptions,
    ) -> Result<JwtPayload, TokenVerificationError> {
        let options = self.options(runtime).verify_token_options();
        verify::verify_token(token, &options, &self.keys, self.clock.now()).await
    }

    pub fn debug_request_state(&self, state: &RequestState) -> RequestStateDebug {
        debug_request_state(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::error::TokenVerificationErrorReason;
    use crate::auth::testing::{session_token, CountingFetcher, FixedClock, ISSUED_AT};

    fn authenticator(fetcher: Arc<CountingFetcher>) -> Authenticator {
        Authenticator::new(BuildTimeOptions {
            secret_key: "sk_test_deadbeef".to_string(),
            api_url: "https://api.clerk.test".to_string(),
            ..BuildTimeOptions::default()
        })
        .with_key_resolver(Arc::new(KeyResolver::new(fetcher)))
        .with_clock(Arc::new(FixedClock::at(ISSUED_AT)))
    }

    #[tokio::test]
    async fn remote_keys_are_cached_across_calls() {
        let fetcher = Arc::new(CountingFetcher::with_primary_key());
        let auth = authenticator(fetcher.clone());

        for _ in 0..3 {
            let payload = auth
                .verify_token(&session_token(), RuntimeOptions::default())
                .await
                .unwrap();
            assert_eq!(payload.sub, "user_2GIpXOEpVyJw51rkZn9Kmnc6Sxr");
        }
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(fetcher.last_url().as_deref(), Some("https://api.clerk.test/v1/jwks"));
    }

    #[tokio::test]
    async fn runtime_skip_forces_refetch() {
        let fetcher = Arc::new(CountingFetcher::with_primary_key());
        let auth = authenticator(fetcher.clone());
        let skip = || RuntimeOptions {
            skip_jwks_cache: Some(true),
            ..RuntimeOptions::default()
        };

        auth.verify_token(&session_token(), skip()).await.unwrap();
        auth.verify_token(&session_token(), skip()).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn runtime_secret_key_is_used() {
        let fetcher = Arc::new(CountingFetcher::with_primary_key());
        let auth = Authenticator::new(BuildTimeOptions::default())
            .with_key_resolver(Arc::new(KeyResolver::new(fetcher)))
            .with_clock(Arc::new(FixedClock::at(ISSUED_AT)));

        let missing = auth
            .verify_token(&session_token(), RuntimeOptions::default())
            .await
            .unwrap_err();
        assert_eq!(missing.reason, TokenVerificationErrorReason::JwkFailedToResolve);

        let runtime = RuntimeOptions {
            secret_key: Some("sk_test_runtime".to_string()),
            ..RuntimeOptions::default()
        };
        assert!(auth.verify_token(&session_token(), runtime).await.is_ok());
    }

    #[test]
    fn build_time_endpoint_survives_merge() {
        let auth = authenticator(Arc::new(CountingFetcher::with_primary_key()));
        let merged = auth.options(RuntimeOptions {
            domain: Some("satellite.dev".to_string()),
            ..RuntimeOptions::default()
        });
        assert_eq!(merged.api_url, "https://api.clerk.test");
        assert_eq!(merged.api_version, "v1");
        assert_eq!(merged.domain, "satellite.dev");
    }
}
