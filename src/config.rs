// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the loader that turns them into
//! authenticator options. Configuration is read once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `CLERK_SECRET_KEY` | Backend API secret key, used to fetch JWKS | Required unless `CLERK_JWT_KEY` is set |
//! | `CLERK_JWT_KEY` | Static PEM public key; disables remote JWKS | Optional |
//! | `CLERK_PUBLISHABLE_KEY` | Publishable key (`pk_test_...` / `pk_live_...`) | Optional |
//! | `CLERK_API_URL` | Backend API origin | `https://api.clerk.com` |
//! | `CLERK_API_VERSION` | Backend API version | `v1` |
//! | `CLERK_PROXY_URL` | Frontend API proxy URL | Optional |
//! | `CLERK_DOMAIN` | Satellite domain | Optional |
//! | `CLERK_IS_SATELLITE` | `true` if this app is a satellite | `false` |
//! | `CLERK_AUDIENCE` | Accepted `aud` values (comma separated) | Optional |
//! | `CLERK_AUTHORIZED_PARTIES` | Accepted `azp` values (comma separated) | Optional |
//! | `CLERK_SIGN_IN_URL` | Sign-in URL echoed on states | Optional |
//! | `CLERK_SIGN_UP_URL` | Sign-up URL echoed on states | Optional |
//! | `CLERK_JWKS_CACHE_TTL_MS` | JWKS cache TTL in milliseconds | `3600000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::time::Duration;

use crate::auth::jwks::{DEFAULT_API_URL, DEFAULT_API_VERSION};
use crate::auth::options::{BuildTimeOptions, RuntimeOptions};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

pub const CLERK_SECRET_KEY_ENV: &str = "CLERK_SECRET_KEY";
pub const CLERK_JWT_KEY_ENV: &str = "CLERK_JWT_KEY";
pub const CLERK_PUBLISHABLE_KEY_ENV: &str = "CLERK_PUBLISHABLE_KEY";
pub const CLERK_API_URL_ENV: &str = "CLERK_API_URL";
pub const CLERK_API_VERSION_ENV: &str = "CLERK_API_VERSION";
pub const CLERK_PROXY_URL_ENV: &str = "CLERK_PROXY_URL";
pub const CLERK_DOMAIN_ENV: &str = "CLERK_DOMAIN";
pub const CLERK_IS_SATELLITE_ENV: &str = "CLERK_IS_SATELLITE";
pub const CLERK_AUDIENCE_ENV: &str = "CLERK_AUDIENCE";
pub const CLERK_AUTHORIZED_PARTIES_ENV: &str = "CLERK_AUTHORIZED_PARTIES";
pub const CLERK_SIGN_IN_URL_ENV: &str = "CLERK_SIGN_IN_URL";
pub const CLERK_SIGN_UP_URL_ENV: &str = "CLERK_SIGN_UP_URL";
pub const CLERK_JWKS_CACHE_TTL_MS_ENV: &str = "CLERK_JWKS_CACHE_TTL_MS";

/// Logging format: `json` for structured output, anything else for pretty.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Invalid configuration values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a valid port number, got {value:?}")]
    InvalidPort { name: &'static str, value: String },

    #[error("{name} must be true or false, got {value:?}")]
    InvalidBool { name: &'static str, value: String },

    #[error("{name} must be a whole number of milliseconds, got {value:?}")]
    InvalidDuration { name: &'static str, value: String },
}

/// Everything the service binary needs.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub build: BuildTimeOptions,
    /// Defaults applied to every request
    pub runtime: RuntimeOptions,
}

impl ServiceConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get(PORT_ENV) {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidPort {
                name: PORT_ENV,
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let is_satellite = match get(CLERK_IS_SATELLITE_ENV) {
            Some(value) => parse_bool(&value).ok_or(ConfigError::InvalidBool {
                name: CLERK_IS_SATELLITE_ENV,
                value,
            })?,
            None => false,
        };

        let jwks_cache_ttl = match get(CLERK_JWKS_CACHE_TTL_MS_ENV) {
            Some(value) => Some(Duration::from_millis(value.parse().map_err(|_| {
                ConfigError::InvalidDuration {
                    name: CLERK_JWKS_CACHE_TTL_MS_ENV,
                    value,
                }
            })?)),
            None => None,
        };

        let build = BuildTimeOptions {
            secret_key: get(CLERK_SECRET_KEY_ENV).unwrap_or_default(),
            jwt_key: get(CLERK_JWT_KEY_ENV).unwrap_or_default(),
            api_url: get(CLERK_API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_version: get(CLERK_API_VERSION_ENV)
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            proxy_url: get(CLERK_PROXY_URL_ENV).unwrap_or_default(),
            publishable_key: get(CLERK_PUBLISHABLE_KEY_ENV).unwrap_or_default(),
            is_satellite,
            domain: get(CLERK_DOMAIN_ENV).unwrap_or_default(),
            audience: get(CLERK_AUDIENCE_ENV).map(|v| split_list(&v)).unwrap_or_default(),
        };

        let runtime = RuntimeOptions {
            authorized_parties: get(CLERK_AUTHORIZED_PARTIES_ENV).map(|v| split_list(&v)),
            sign_in_url: get(CLERK_SIGN_IN_URL_ENV),
            sign_up_url: get(CLERK_SIGN_UP_URL_ENV),
            jwks_cache_ttl,
            ..RuntimeOptions::default()
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            build,
            runtime,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.build.api_url, DEFAULT_API_URL);
        assert_eq!(config.build.api_version, DEFAULT_API_VERSION);
        assert!(!config.build.is_satellite);
        assert!(config.runtime.authorized_parties.is_none());
        assert!(config.runtime.jwks_cache_ttl.is_none());
    }

    #[test]
    fn clerk_variables_are_read() {
        let config = load(&[
            (CLERK_SECRET_KEY_ENV, "sk_test_deadbeef"),
            (CLERK_API_URL_ENV, "https://api.clerk.test"),
            (CLERK_IS_SATELLITE_ENV, "TRUE"),
            (CLERK_DOMAIN_ENV, "satellite.dev"),
            (CLERK_AUDIENCE_ENV, "app-a, app-b"),
            (CLERK_AUTHORIZED_PARTIES_ENV, "https://a.dev,,https://b.dev"),
            (CLERK_SIGN_IN_URL_ENV, "https://primary.dev/sign-in"),
            (CLERK_JWKS_CACHE_TTL_MS_ENV, "60000"),
            (PORT_ENV, "9090"),
        ])
        .unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.build.secret_key, "sk_test_deadbeef");
        assert_eq!(config.build.api_url, "https://api.clerk.test");
        assert!(config.build.is_satellite);
        assert_eq!(config.build.domain, "satellite.dev");
        assert_eq!(config.build.audience, vec!["app-a", "app-b"]);
        assert_eq!(
            config.runtime.authorized_parties,
            Some(vec!["https://a.dev".to_string(), "https://b.dev".to_string()])
        );
        assert_eq!(config.runtime.sign_in_url.as_deref(), Some("https://primary.dev/sign-in"));
        assert_eq!(config.runtime.jwks_cache_ttl, Some(Duration::from_secs(60)));
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = load(&[(CLERK_API_URL_ENV, "  "), (CLERK_SECRET_KEY_ENV, "")]).unwrap();
        assert_eq!(config.build.api_url, DEFAULT_API_URL);
        assert!(config.build.secret_key.is_empty());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert_eq!(
            load(&[(PORT_ENV, "http")]).unwrap_err(),
            ConfigError::InvalidPort {
                name: PORT_ENV,
                value: "http".to_string()
            }
        );
        assert!(matches!(
            load(&[(CLERK_IS_SATELLITE_ENV, "maybe")]),
            Err(ConfigError::InvalidBool { .. })
        ));
        assert!(matches!(
            load(&[(CLERK_JWKS_CACHE_TTL_MS_ENV, "1h")]),
            Err(ConfigError::InvalidDuration { .. })
        ));
    }
}
