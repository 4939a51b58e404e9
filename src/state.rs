// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{Authenticator, RuntimeOptions};

#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<Authenticator>,
    /// Per-request defaults layered over the authenticator's build options
    pub runtime_options: RuntimeOptions,
}

impl AppState {
    pub fn new(authenticator: Authenticator, runtime_options: RuntimeOptions) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
            runtime_options,
        }
    }
}

#[cfg(test)]
impl AppState {
    /// State backed by the in-memory primary key and a clock pinned to the
    /// fixture tokens' issue time.
    pub(crate) fn for_tests() -> Self {
        use crate::auth::options::BuildTimeOptions;
        use crate::auth::testing::{CountingFetcher, FixedClock, ISSUED_AT, PUBLISHABLE_KEY};
        use crate::auth::KeyResolver;

        let authenticator = Authenticator::new(BuildTimeOptions {
            secret_key: "sk_test_deadbeef".to_string(),
            publishable_key: PUBLISHABLE_KEY.to_string(),
            ..BuildTimeOptions::default()
        })
        .with_key_resolver(Arc::new(KeyResolver::new(Arc::new(
            CountingFetcher::with_primary_key(),
        ))))
        .with_clock(Arc::new(FixedClock::at(ISSUED_AT)));

        Self::new(authenticator, RuntimeOptions::default())
    }
}
