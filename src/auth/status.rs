// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Resolution outcome and the view handed to callers.
//!
//! A [`RequestState`] can only be built through the signed-in, signed-out
//! and handshake constructors, so [`RequestState::to_auth`] is
//! unauthenticated exactly when the status is not `SignedIn`.

use std::fmt;

use serde::Serialize;

use super::claims::{AuthObject, SignedInAuthObject};
use super::error::AuthReason;
use super::options::{AuthenticateRequestOptions, InstanceType};

/// Terminal outcome of a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthStatus {
    SignedIn,
    SignedOut,
    /// The client must redirect or sync before a definitive answer exists
    Handshake,
}

impl AuthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignedIn => "signed-in",
            Self::SignedOut => "signed-out",
            Self::Handshake => "handshake",
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-scoped settings echoed back on every state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoedOptions {
    pub publishable_key: String,
    pub proxy_url: String,
    pub is_satellite: bool,
    pub domain: String,
    pub sign_in_url: String,
    pub sign_up_url: String,
    pub after_sign_in_url: String,
    pub after_sign_up_url: String,
}

impl From<&AuthenticateRequestOptions> for EchoedOptions {
    fn from(options: &AuthenticateRequestOptions) -> Self {
        Self {
            publishable_key: options.publishable_key.clone(),
            proxy_url: options.proxy_url.clone(),
            is_satellite: options.is_satellite,
            domain: options.domain.clone(),
            sign_in_url: options.sign_in_url.clone(),
            sign_up_url: options.sign_up_url.clone(),
            after_sign_in_url: options.after_sign_in_url.clone(),
            after_sign_up_url: options.after_sign_up_url.clone(),
        }
    }
}

/// Non-sensitive summary of the signals a resolution looked at.
///
/// Never holds tokens or claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSummary {
    pub has_header_token: bool,
    pub has_cookie_token: bool,
    /// A `__clerk_db_jwt` dev browser cookie was sent
    pub has_dev_browser: bool,
    pub client_uat: i64,
    pub instance_type: InstanceType,
    pub sec_fetch_dest: Option<String>,
    pub user_agent: Option<String>,
    pub is_satellite: bool,
    /// Name of the decision rule that produced the state
    pub rule: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    SignedIn(SignedInAuthObject),
    SignedOut {
        reason: AuthReason,
        message: String,
    },
    Handshake {
        reason: AuthReason,
        message: String,
        redirect_url: Option<String>,
    },
}

/// What `authenticate_request` resolved a request to.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState {
    outcome: Outcome,
    options: EchoedOptions,
    signals: SignalSummary,
}

impl RequestState {
    pub(crate) fn signed_in(
        options: EchoedOptions,
        signals: SignalSummary,
        auth: SignedInAuthObject,
    ) -> Self {
        Self {
            outcome: Outcome::SignedIn(auth),
            options,
            signals,
        }
    }

    pub(crate) fn signed_out(
        options: EchoedOptions,
        signals: SignalSummary,
        reason: impl Into<AuthReason>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            outcome: Outcome::SignedOut {
                reason: reason.into(),
                message: message.into(),
            },
            options,
            signals,
        }
    }

    pub(crate) fn handshake(
        options: EchoedOptions,
        signals: SignalSummary,
        reason: impl Into<AuthReason>,
        message: impl Into<String>,
        redirect_url: Option<String>,
    ) -> Self {
        Self {
            outcome: Outcome::Handshake {
                reason: reason.into(),
                message: message.into(),
                redirect_url,
            },
            options,
            signals,
        }
    }

    pub fn status(&self) -> AuthStatus {
        match self.outcome {
            Outcome::SignedIn(_) => AuthStatus::SignedIn,
            Outcome::SignedOut { .. } => AuthStatus::SignedOut,
            Outcome::Handshake { .. } => AuthStatus::Handshake,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self.outcome, Outcome::SignedIn(_))
    }

    /// Why the request is not signed in. `None` when signed in.
    pub fn reason(&self) -> Option<AuthReason> {
        match &self.outcome {
            Outcome::SignedIn(_) => None,
            Outcome::SignedOut { reason, .. } | Outcome::Handshake { reason, .. } => Some(*reason),
        }
    }

    /// Human readable detail; empty when not applicable.
    pub fn message(&self) -> &str {
        match &self.outcome {
            Outcome::SignedIn(_) => "",
            Outcome::SignedOut { message, .. } | Outcome::Handshake { message, .. } => message,
        }
    }

    /// The verified session token, when signed in.
    pub fn token(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::SignedIn(auth) => Some(&auth.token),
            _ => None,
        }
    }

    /// Where the client should go to complete a handshake.
    pub fn redirect_url(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Handshake { redirect_url, .. } => redirect_url.as_deref(),
            _ => None,
        }
    }

    pub fn options(&self) -> &EchoedOptions {
        &self.options
    }

    pub fn signals(&self) -> &SignalSummary {
        &self.signals
    }

    pub fn to_auth(&self) -> AuthObject {
        match &self.outcome {
            Outcome::SignedIn(auth) => AuthObject::Authenticated(auth.clone()),
            _ => AuthObject::Unauthenticated,
        }
    }

    pub fn into_auth(self) -> AuthObject {
        match self.outcome {
            Outcome::SignedIn(auth) => AuthObject::Authenticated(auth),
            _ => AuthObject::Unauthenticated,
        }
    }
}

/// Serializable diagnostic dump of a [`RequestState`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStateDebug {
    pub status: AuthStatus,
    pub is_signed_in: bool,
    pub reason: Option<AuthReason>,
    pub message: String,
    pub redirect_url: Option<String>,
    #[serde(flatten)]
    pub options: EchoedOptions,
    pub signals: SignalSummary,
}

pub fn debug_request_state(state: &RequestState) -> RequestStateDebug {
    RequestStateDebug {
        status: state.status(),
        is_signed_in: state.is_signed_in(),
        reason: state.reason(),
        message: state.message().to_string(),
        redirect_url: state.redirect_url().map(str::to_owned),
        options: state.options.clone(),
        signals: state.signals.clone(),
    }
}
