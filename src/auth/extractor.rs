// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request signal extraction and the axum extractors built on it.
//!
//! Use [`SessionState`] to inspect the resolved state of any request, or
//! [`RequireSignedIn`] to reject everything that is not signed in:
//!
//! ```rust,ignore
//! async fn me(RequireSignedIn(auth): RequireSignedIn) -> impl IntoResponse {
//!     Json(auth)
//! }
//! ```

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{header, request::Parts, HeaderMap, Uri},
};
use axum_extra::extract::cookie::CookieJar;
use url::Url;

use super::claims::SignedInAuthObject;
use super::status::RequestState;
use crate::error::ApiError;
use crate::state::AppState;

/// Session token cookie.
pub const SESSION_COOKIE: &str = "__session";

/// Client-observed user auth time cookie.
pub const CLIENT_UAT_COOKIE: &str = "__client_uat";

/// Dev browser token; as a query parameter it marks a dev sync round-trip.
pub const DEV_BROWSER_JWT: &str = "__clerk_db_jwt";

/// Query parameter set once a satellite has synced with the primary.
pub const SYNCED_QUERY_PARAM: &str = "__clerk_synced";

/// Query parameter carrying the satellite URL to return to.
pub const REDIRECT_URL_QUERY_PARAM: &str = "__clerk_redirect_url";

const CLOUDFRONT_FORWARDED_PROTO: &str = "cloudfront-forwarded-proto";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PORT: &str = "x-forwarded-port";
const SEC_FETCH_DEST: &str = "sec-fetch-dest";

/// Headers the resolver reads, already normalised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSignals {
    /// Bearer token with the `Bearer ` prefix stripped
    pub header_token: Option<String>,
    pub forwarded_proto: Option<String>,
    pub forwarded_host: Option<String>,
    pub forwarded_port: Option<String>,
    pub host: Option<String>,
    pub user_agent: Option<String>,
    pub sec_fetch_dest: Option<String>,
}

fn header_value(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// First entry of a comma separated proxy header.
fn first_value(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        v.split(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    })
}

/// Normalise the headers of a request.
///
/// `cloudfront-forwarded-proto` wins over `x-forwarded-proto`.
pub fn load_options_from_headers(headers: &HeaderMap) -> HeaderSignals {
    let header_token = header_value(headers, header::AUTHORIZATION).and_then(|value| {
        let token = match value.strip_prefix("Bearer") {
            Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
            _ => value.as_str(),
        };
        (!token.is_empty()).then(|| token.to_string())
    });

    let forwarded_proto = first_value(header_value(headers, CLOUDFRONT_FORWARDED_PROTO))
        .or_else(|| first_value(header_value(headers, X_FORWARDED_PROTO)));

    HeaderSignals {
        header_token,
        forwarded_proto,
        forwarded_host: first_value(header_value(headers, X_FORWARDED_HOST)),
        forwarded_port: first_value(header_value(headers, X_FORWARDED_PORT)),
        host: header_value(headers, header::HOST),
        user_agent: header_value(headers, header::USER_AGENT),
        sec_fetch_dest: header_value(headers, SEC_FETCH_DEST),
    }
}

/// Cookies the resolver reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieSignals {
    pub session_token: Option<String>,
    /// Raw `__client_uat` value
    pub client_uat: Option<String>,
    pub dev_browser: Option<String>,
}

pub fn load_options_from_cookies(jar: &CookieJar) -> CookieSignals {
    let value = |name: &str| {
        jar.get(name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    };

    CookieSignals {
        session_token: value(SESSION_COOKIE),
        client_uat: value(CLIENT_UAT_COOKIE),
        dev_browser: value(DEV_BROWSER_JWT),
    }
}

/// Everything the resolver needs to know about one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestSignals {
    pub headers: HeaderSignals,
    pub cookies: CookieSignals,
    /// Public URL of the request, rebuilt from proxy headers
    pub url: Option<Url>,
}

impl RequestSignals {
    pub fn from_parts(headers: &HeaderMap, uri: &Uri) -> Self {
        let header_signals = load_options_from_headers(headers);
        let cookies = load_options_from_cookies(&CookieJar::from_headers(headers));
        let url = request_url(&header_signals, uri);

        Self {
            headers: header_signals,
            cookies,
            url,
        }
    }

    pub fn header_token(&self) -> Option<&str> {
        self.headers.header_token.as_deref()
    }

    pub fn cookie_token(&self) -> Option<&str> {
        self.cookies.session_token.as_deref()
    }

    /// `__client_uat` in seconds; absent or unparsable counts as 0.
    pub fn client_uat(&self) -> i64 {
        self.cookies
            .client_uat
            .as_deref()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn user_agent(&self) -> &str {
        self.headers.user_agent.as_deref().unwrap_or_default()
    }

    /// Top-level document or iframe navigation.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self.headers.sec_fetch_dest.as_deref(),
            Some("document") | Some("iframe")
        )
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url.as_ref().and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        })
    }

    pub fn has_query_param(&self, name: &str) -> bool {
        self.query_param(name).is_some()
    }
}

fn request_url(headers: &HeaderSignals, uri: &Uri) -> Option<Url> {
    let scheme = headers
        .forwarded_proto
        .as_deref()
        .or(uri.scheme_str())
        .unwrap_or("http");

    let host = match headers.forwarded_host.as_deref() {
        Some(forwarded) => match headers.forwarded_port.as_deref() {
            Some(port) if !forwarded.contains(':') && !is_default_port(scheme, port) => {
                format!("{forwarded}:{port}")
            }
            _ => forwarded.to_string(),
        },
        None => headers
            .host
            .clone()
            .or_else(|| uri.authority().map(|a| a.to_string()))?,
    };

    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    Url::parse(&format!("{scheme}://{host}{path_and_query}")).ok()
}

fn is_default_port(scheme: &str, port: &str) -> bool {
    matches!((scheme, port), ("http", "80") | ("https", "443"))
}

/// Resolved [`RequestState`] of the current request.
///
/// The state is computed once per request and cached in the request
/// extensions.
#[derive(Debug, Clone)]
pub struct SessionState(pub RequestState);

impl FromRequestParts<AppState> for SessionState {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(resolved) = parts.extensions.get::<RequestState>().cloned() {
            return Ok(SessionState(resolved));
        }

        // Nested routers strip their prefix from `parts.uri`.
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map_or(&parts.uri, |original| &original.0);
        let signals = RequestSignals::from_parts(&parts.headers, uri);
        let resolved = state
            .authenticator
            .authenticate_request(&signals, state.runtime_options.clone())
            .await?;

        parts.extensions.insert(resolved.clone());
        Ok(SessionState(resolved))
    }
}

/// Signed-in view of the current request; rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct RequireSignedIn(pub SignedInAuthObject);

impl FromRequestParts<AppState> for RequireSignedIn {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let SessionState(resolved) = SessionState::from_request_parts(parts, state).await?;

        let reason = resolved.reason();
        let message = resolved.message().to_string();
        match resolved.into_auth().into_signed_in() {
            Some(auth) => Ok(RequireSignedIn(auth)),
            None => Err(ApiError::unauthorized(
                reason.map_or("signed-out", |r| r.as_str()),
                message,
            )),
        }
    }
}
