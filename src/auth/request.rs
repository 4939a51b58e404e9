// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request state resolution.
//!
//! ## Decision order
//!
//! 1. A header bearer token wins outright. It is verified and the request is
//!    either `SignedIn` or `SignedOut`; a header token is never answered with
//!    a handshake.
//! 2. Otherwise the cookie rules in [`COOKIE_RULES`] are evaluated top to
//!    bottom and the first match decides.
//! 3. If no rule matches, the `__session` cookie is verified.
//!
//! Verification failures never escape: they become a `SignedOut` or
//! `Handshake` state carrying the reason and message. Only missing key
//! material is returned as an error.

use tracing::debug;
use url::Url;

use super::claims::SignedInAuthObject;
use super::error::{
    AuthError, AuthErrorReason, TokenCarrier, TokenVerificationError,
    TokenVerificationErrorReason,
};
use super::extractor::{
    RequestSignals, DEV_BROWSER_JWT, REDIRECT_URL_QUERY_PARAM, SYNCED_QUERY_PARAM,
};
use super::jwks::KeyResolver;
use super::options::{AuthenticateRequestOptions, Heuristics, InstanceType};
use super::status::{EchoedOptions, RequestState, SignalSummary};
use super::verify::{decode_jwt, verify_token, Clock, DecodedJwt};

/// Inputs of one resolution, computed once.
pub(crate) struct AuthenticateContext<'a> {
    pub options: &'a AuthenticateRequestOptions,
    pub signals: &'a RequestSignals,
    pub heuristics: &'a Heuristics,
    pub instance_type: InstanceType,
    pub client_uat: i64,
    pub cookie_token: Option<&'a str>,
    /// Unverified cookie token, decoded when present
    pub decoded: Option<Result<DecodedJwt, TokenVerificationError>>,
}

impl<'a> AuthenticateContext<'a> {
    fn new(
        options: &'a AuthenticateRequestOptions,
        signals: &'a RequestSignals,
        heuristics: &'a Heuristics,
    ) -> Self {
        let cookie_token = signals.cookie_token();
        Self {
            options,
            signals,
            heuristics,
            instance_type: options.instance_type(&heuristics.instance_type),
            client_uat: signals.client_uat(),
            cookie_token,
            decoded: cookie_token.map(decode_jwt),
        }
    }

    fn is_development(&self) -> bool {
        self.instance_type.is_development()
    }

    fn has_sync_markers(&self) -> bool {
        self.signals.has_query_param(SYNCED_QUERY_PARAM)
            || self.signals.has_query_param(DEV_BROWSER_JWT)
    }

    fn summary(&self, rule: &'static str) -> SignalSummary {
        SignalSummary {
            has_header_token: self.signals.header_token().is_some(),
            has_cookie_token: self.cookie_token.is_some(),
            has_dev_browser: self.signals.cookies.dev_browser.is_some(),
            client_uat: self.client_uat,
            instance_type: self.instance_type,
            sec_fetch_dest: self.signals.headers.sec_fetch_dest.clone(),
            user_agent: self.signals.headers.user_agent.clone(),
            is_satellite: self.options.is_satellite,
            rule,
        }
    }
}

/// Outcome of a cookie rule, before echo fields are attached.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Verdict {
    SignedOut(AuthErrorReason),
    Handshake(AuthErrorReason),
    /// The cookie token could not even be decoded
    Rejected(TokenVerificationError),
}

pub(crate) struct Rule {
    pub name: &'static str,
    pub check: fn(&AuthenticateContext<'_>) -> Option<Verdict>,
}

/// Cookie-path rules, first match wins.
pub(crate) const COOKIE_RULES: &[Rule] = &[
    Rule {
        name: "satellite-unexpected-user-agent",
        check: |ctx| {
            (ctx.options.is_satellite
                && ctx.client_uat <= 0
                && !ctx.heuristics.user_agent.is_expected(ctx.signals.user_agent()))
            .then_some(Verdict::SignedOut(AuthErrorReason::SessionTokenAndUatMissing))
        },
    },
    Rule {
        name: "satellite-needs-syncing",
        check: |ctx| {
            (ctx.options.is_satellite
                && ctx.client_uat <= 0
                && ctx.signals.is_navigation()
                && !ctx.has_sync_markers())
            .then_some(Verdict::Handshake(AuthErrorReason::SatelliteCookieNeedsSyncing))
        },
    },
    Rule {
        name: "dev-browser-sync",
        check: |ctx| {
            (ctx.options.is_satellite
                && ctx.is_development()
                && ctx.client_uat <= 0
                && ctx.signals.has_query_param(DEV_BROWSER_JWT))
            .then_some(Verdict::Handshake(AuthErrorReason::DevBrowserSync))
        },
    },
    Rule {
        name: "primary-responds-to-syncing",
        check: |ctx| {
            (!ctx.options.is_satellite
                && ctx.is_development()
                && ctx.signals.is_navigation()
                && sync_return_target(ctx).is_some())
            .then_some(Verdict::Handshake(AuthErrorReason::PrimaryRespondsToSyncing))
        },
    },
    Rule {
        name: "no-session-token-no-client-uat",
        check: |ctx| {
            if ctx.client_uat > 0 || ctx.cookie_token.is_some() {
                return None;
            }
            Some(if ctx.is_development() {
                Verdict::Handshake(AuthErrorReason::SessionTokenWithoutClientUat)
            } else {
                Verdict::SignedOut(AuthErrorReason::SessionTokenAndUatMissing)
            })
        },
    },
    Rule {
        name: "session-token-without-client-uat",
        check: |ctx| {
            (ctx.client_uat <= 0 && ctx.cookie_token.is_some())
                .then_some(Verdict::Handshake(AuthErrorReason::SessionTokenWithoutClientUat))
        },
    },
    Rule {
        name: "client-uat-without-session-token",
        check: |ctx| {
            (ctx.client_uat > 0 && ctx.cookie_token.is_none())
                .then_some(Verdict::Handshake(AuthErrorReason::ClientUatWithoutSessionToken))
        },
    },
    Rule {
        name: "session-token-undecodable",
        check: |ctx| match &ctx.decoded {
            Some(Err(err)) => Some(Verdict::Rejected(err.clone())),
            _ => None,
        },
    },
    Rule {
        name: "session-token-outdated",
        check: |ctx| {
            let iat = ctx.decoded.as_ref()?.as_ref().ok()?.issued_at()?;
            (ctx.client_uat > iat)
                .then_some(Verdict::Handshake(AuthErrorReason::SessionTokenOutdated))
        },
    },
];

const HEADER_RULE: &str = "verify-header-token";
const COOKIE_VERIFY_RULE: &str = "verify-cookie-token";

/// Resolve a request to `SignedIn`, `SignedOut` or `Handshake`.
pub async fn authenticate_request(
    signals: &RequestSignals,
    options: &AuthenticateRequestOptions,
    heuristics: &Heuristics,
    keys: &KeyResolver,
    clock: &dyn Clock,
) -> Result<RequestState, AuthError> {
    if options.lacks_key_material() {
        return Err(AuthError::missing_key_material());
    }

    let ctx = AuthenticateContext::new(options, signals, heuristics);
    let echo = EchoedOptions::from(options);

    if let Some(token) = signals.header_token() {
        let summary = ctx.summary(HEADER_RULE);
        return Ok(
            match verify_token(token, &options.verify_token_options(), keys, clock.now()).await {
                Ok(payload) => {
                    debug!(rule = HEADER_RULE, "Request signed in");
                    RequestState::signed_in(
                        echo,
                        summary,
                        SignedInAuthObject::from_payload(payload, token),
                    )
                }
                Err(err) => {
                    debug!(rule = HEADER_RULE, reason = %err.reason, "Header token rejected");
                    RequestState::signed_out(
                        echo,
                        summary,
                        err.reason,
                        err.full_message(TokenCarrier::Header),
                    )
                }
            },
        );
    }

    for rule in COOKIE_RULES {
        let Some(verdict) = (rule.check)(&ctx) else {
            continue;
        };
        let summary = ctx.summary(rule.name);
        return Ok(match verdict {
            Verdict::SignedOut(reason) => {
                debug!(rule = rule.name, reason = %reason, "Request signed out");
                RequestState::signed_out(echo, summary, reason, "")
            }
            Verdict::Handshake(reason) => {
                debug!(rule = rule.name, reason = %reason, "Handshake required");
                let redirect_url = handshake_redirect_url(&ctx, reason);
                RequestState::handshake(echo, summary, reason, "", redirect_url)
            }
            Verdict::Rejected(err) => {
                debug!(rule = rule.name, reason = %err.reason, "Session cookie rejected");
                RequestState::signed_out(
                    echo,
                    summary,
                    err.reason,
                    err.full_message(TokenCarrier::Cookie),
                )
            }
        });
    }

    // Every rule above falls through only when a session cookie is present.
    let token = ctx.cookie_token.unwrap_or_default();
    let summary = ctx.summary(COOKIE_VERIFY_RULE);
    Ok(
        match verify_token(token, &options.verify_token_options(), keys, clock.now()).await {
            Ok(payload) => {
                debug!(rule = COOKIE_VERIFY_RULE, "Request signed in");
                RequestState::signed_in(echo, summary, SignedInAuthObject::from_payload(payload, token))
            }
            Err(err) if err.reason == TokenVerificationErrorReason::TokenExpired => {
                debug!(rule = COOKIE_VERIFY_RULE, "Session cookie expired");
                let reason = AuthErrorReason::SessionTokenOutdated;
                let redirect_url = handshake_redirect_url(&ctx, reason);
                RequestState::handshake(
                    echo,
                    summary,
                    reason,
                    err.full_message(TokenCarrier::Cookie),
                    redirect_url,
                )
            }
            Err(err) => {
                debug!(rule = COOKIE_VERIFY_RULE, reason = %err.reason, "Session cookie rejected");
                RequestState::signed_out(
                    echo,
                    summary,
                    err.reason,
                    err.full_message(TokenCarrier::Cookie),
                )
            }
        },
    )
}

/// Where a handshake sends the client.
///
/// The request URL is echoed without its sync markers, so a dev browser token
/// in the query never travels further.
fn handshake_redirect_url(ctx: &AuthenticateContext<'_>, reason: AuthErrorReason) -> Option<String> {
    let request_url = &without_query_params(
        ctx.signals.url.as_ref()?,
        &[SYNCED_QUERY_PARAM, DEV_BROWSER_JWT],
    );

    match reason {
        AuthErrorReason::SatelliteCookieNeedsSyncing => {
            let base = if ctx.options.sign_in_url.is_empty() {
                format!("{}/v1/client/sync", frontend_base(ctx.options)?)
            } else {
                ctx.options.sign_in_url.clone()
            };
            let mut target = Url::parse(&base).ok()?;
            target
                .query_pairs_mut()
                .append_pair(REDIRECT_URL_QUERY_PARAM, request_url.as_str());
            Some(target.into())
        }
        AuthErrorReason::DevBrowserSync => Some(request_url.to_string()),
        AuthErrorReason::PrimaryRespondsToSyncing => {
            let mut target = sync_return_target(ctx)?;
            target
                .query_pairs_mut()
                .append_pair(SYNCED_QUERY_PARAM, "true");
            Some(target.into())
        }
        _ => {
            let mut target =
                Url::parse(&format!("{}/v1/client/handshake", frontend_base(ctx.options)?)).ok()?;
            target
                .query_pairs_mut()
                .append_pair("redirect_url", request_url.as_str());
            Some(target.into())
        }
    }
}

/// `__clerk_redirect_url` target a primary may send a satellite back to.
///
/// Must be http(s). When authorized parties are configured its origin must be
/// one of them.
fn sync_return_target(ctx: &AuthenticateContext<'_>) -> Option<Url> {
    let target = Url::parse(&ctx.signals.query_param(REDIRECT_URL_QUERY_PARAM)?).ok()?;
    if !matches!(target.scheme(), "http" | "https") {
        return None;
    }

    let parties = &ctx.options.authorized_parties;
    let origin = target.origin().ascii_serialization();
    (parties.is_empty() || parties.iter().any(|p| p.trim_end_matches('/') == origin))
        .then_some(target)
}

/// Proxy URL if configured, otherwise the Frontend API origin.
fn frontend_base(options: &AuthenticateRequestOptions) -> Option<String> {
    if !options.proxy_url.is_empty() {
        return Some(options.proxy_url.trim_end_matches('/').to_string());
    }
    options
        .frontend_api()
        .map(|host| format!("https://{host}"))
}

fn without_query_params(url: &Url, names: &[&str]) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !names.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}
