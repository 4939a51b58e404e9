// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors and reason codes.
//!
//! Reason codes are data, not exception types: verification failures are
//! caught by the request resolver and turned into a `SignedOut` or
//! `Handshake` state that carries the reason and message verbatim. Only
//! [`AuthError`] escapes `authenticate_request`, and only for configuration
//! mistakes that no request-level state can describe.

use std::fmt;

use serde::{Serialize, Serializer};

/// Why a token failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenVerificationErrorReason {
    /// Neither a static key nor a secret key is configured.
    #[serde(rename = "jwk-failed-to-resolve")]
    JwkFailedToResolve,
    /// The configured static key could not be parsed.
    #[serde(rename = "jwk-failed-to-load")]
    JwkFailedToLoad,
    /// The key set could not be fetched, or it was empty.
    #[serde(rename = "jwk-remote-failed-to-load")]
    RemoteJwkFailedToLoad,
    /// The key set was fetched but does not contain the token's `kid`.
    #[serde(rename = "jwk-kid-mismatch")]
    JwkKidMismatch,
    #[serde(rename = "token-invalid")]
    TokenInvalid,
    #[serde(rename = "token-invalid-algorithm")]
    TokenInvalidAlgorithm,
    #[serde(rename = "token-invalid-signature")]
    TokenInvalidSignature,
    #[serde(rename = "token-expired")]
    TokenExpired,
    #[serde(rename = "token-not-active-yet")]
    TokenNotActiveYet,
    #[serde(rename = "token-iat-in-the-future")]
    TokenIatInTheFuture,
    #[serde(rename = "token-invalid-audience")]
    TokenInvalidAudience,
    #[serde(rename = "token-invalid-authorized-parties")]
    TokenInvalidAuthorizedParties,
    /// A required claim is missing or has the wrong type.
    #[serde(rename = "token-verification-failed")]
    TokenVerificationFailed,
}

impl TokenVerificationErrorReason {
    /// Stable wire code for this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JwkFailedToResolve => "jwk-failed-to-resolve",
            Self::JwkFailedToLoad => "jwk-failed-to-load",
            Self::RemoteJwkFailedToLoad => "jwk-remote-failed-to-load",
            Self::JwkKidMismatch => "jwk-kid-mismatch",
            Self::TokenInvalid => "token-invalid",
            Self::TokenInvalidAlgorithm => "token-invalid-algorithm",
            Self::TokenInvalidSignature => "token-invalid-signature",
            Self::TokenExpired => "token-expired",
            Self::TokenNotActiveYet => "token-not-active-yet",
            Self::TokenIatInTheFuture => "token-iat-in-the-future",
            Self::TokenInvalidAudience => "token-invalid-audience",
            Self::TokenInvalidAuthorizedParties => "token-invalid-authorized-parties",
            Self::TokenVerificationFailed => "token-verification-failed",
        }
    }
}

impl fmt::Display for TokenVerificationErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remediation hint appended to a verification message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenVerificationErrorAction {
    ContactSupport,
    EnsureClerkJwt,
    SetClerkJwtKey,
    SetClerkSecretKey,
    EnsureClockSync,
}

impl TokenVerificationErrorAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContactSupport => "Contact support@clerk.com",
            Self::EnsureClerkJwt => "Make sure that this is a valid Clerk generate JWT.",
            Self::SetClerkJwtKey => "Set the CLERK_JWT_KEY environment variable.",
            Self::SetClerkSecretKey => "Set the CLERK_SECRET_KEY environment variable.",
            Self::EnsureClockSync => {
                "Make sure your system clock is in sync (e.g. turn off and on automatic time synchronization)."
            }
        }
    }
}

/// Transport a token arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenCarrier {
    Header,
    Cookie,
}

impl TokenCarrier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

/// A typed verification failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TokenVerificationError {
    pub reason: TokenVerificationErrorReason,
    pub message: String,
    pub action: Option<TokenVerificationErrorAction>,
}

impl TokenVerificationError {
    pub fn new(reason: TokenVerificationErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
            action: None,
        }
    }

    pub fn with_action(mut self, action: TokenVerificationErrorAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Message with the action hint, the reason code and the carrier, in the
    /// form surfaced on signed-out and handshake states.
    pub fn full_message(&self, carrier: TokenCarrier) -> String {
        let mut text = self.message.clone();
        if let Some(action) = self.action {
            text.push(' ');
            text.push_str(action.as_str());
        }
        format!(
            "{text} (reason={}, token-carrier={})",
            self.reason,
            carrier.as_str()
        )
    }
}

/// Why the resolver reached a signed-out or handshake state without a
/// verification failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthErrorReason {
    #[serde(rename = "client-uat-but-no-session-token")]
    ClientUatWithoutSessionToken,
    DevBrowserSync,
    PrimaryRespondsToSyncing,
    #[serde(rename = "satellite-needs-syncing")]
    SatelliteCookieNeedsSyncing,
    #[serde(rename = "session-token-and-uat-missing")]
    SessionTokenAndUatMissing,
    SessionTokenOutdated,
    #[serde(rename = "session-token-but-no-client-uat")]
    SessionTokenWithoutClientUat,
}

impl AuthErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientUatWithoutSessionToken => "client-uat-but-no-session-token",
            Self::DevBrowserSync => "dev-browser-sync",
            Self::PrimaryRespondsToSyncing => "primary-responds-to-syncing",
            Self::SatelliteCookieNeedsSyncing => "satellite-needs-syncing",
            Self::SessionTokenAndUatMissing => "session-token-and-uat-missing",
            Self::SessionTokenOutdated => "session-token-outdated",
            Self::SessionTokenWithoutClientUat => "session-token-but-no-client-uat",
        }
    }
}

impl fmt::Display for AuthErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason attached to a non-signed-in [`RequestState`](super::RequestState).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthReason {
    Token(TokenVerificationErrorReason),
    Auth(AuthErrorReason),
}

impl AuthReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token(reason) => reason.as_str(),
            Self::Auth(reason) => reason.as_str(),
        }
    }
}

impl fmt::Display for AuthReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AuthReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl From<TokenVerificationErrorReason> for AuthReason {
    fn from(reason: TokenVerificationErrorReason) -> Self {
        Self::Token(reason)
    }
}

impl From<AuthErrorReason> for AuthReason {
    fn from(reason: AuthErrorReason) -> Self {
        Self::Auth(reason)
    }
}

/// Errors that escape request authentication.
///
/// These describe a misconfigured authenticator, not a bad request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No static JWT key and no secret key are configured.
    #[error("{0}")]
    MissingKeyMaterial(TokenVerificationError),
}

impl AuthError {
    pub(crate) fn missing_key_material() -> Self {
        Self::MissingKeyMaterial(
            TokenVerificationError::new(
                TokenVerificationErrorReason::JwkFailedToResolve,
                "Failed to resolve JWK during verification.",
            )
            .with_action(TokenVerificationErrorAction::SetClerkJwtKey),
        )
    }

    /// Reason code of the underlying failure.
    pub fn reason(&self) -> TokenVerificationErrorReason {
        match self {
            Self::MissingKeyMaterial(err) => err.reason,
        }
    }
}
