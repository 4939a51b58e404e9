// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token claims and the signed-in auth view.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Verified claims of a Clerk session token.
///
/// Produced once per verification and never mutated. Claims this struct does
/// not name (e.g. `aud`, custom template claims) are kept in `other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtPayload {
    /// Subject (user ID)
    pub sub: String,

    /// Issued at (seconds since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Expiration (seconds since epoch)
    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Clerk session ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Authorized party (origin of the frontend that minted the token)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_slug: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub org_permissions: Vec<String>,

    /// Impersonation actor, if the session is impersonated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub act: Option<Value>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A capability to check against the active organization membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check<'a> {
    Role(&'a str),
    Permission(&'a str),
}

/// What a handler sees for a signed-in request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedInAuthObject {
    pub session_claims: JwtPayload,
    pub session_id: Option<String>,
    pub user_id: String,
    pub org_id: Option<String>,
    pub org_role: Option<String>,
    pub org_slug: Option<String>,
    pub org_permissions: Vec<String>,
    pub actor: Option<Value>,
    /// Raw session token, for forwarding to downstream services.
    #[serde(skip)]
    pub token: String,
}

impl SignedInAuthObject {
    pub fn from_payload(payload: JwtPayload, token: impl Into<String>) -> Self {
        Self {
            session_id: payload.sid.clone(),
            user_id: payload.sub.clone(),
            org_id: payload.org_id.clone(),
            org_role: payload.org_role.clone(),
            org_slug: payload.org_slug.clone(),
            org_permissions: payload.org_permissions.clone(),
            actor: payload.act.clone(),
            session_claims: payload,
            token: token.into(),
        }
    }

    /// Check a role or permission in the active organization.
    ///
    /// Always false when the session has no active organization.
    pub fn has(&self, check: Check<'_>) -> bool {
        let Some(role) = self.org_role.as_deref() else {
            return false;
        };
        if self.org_id.is_none() {
            return false;
        }
        match check {
            Check::Role(expected) => role == expected,
            Check::Permission(permission) => {
                self.org_permissions.iter().any(|p| p == permission)
            }
        }
    }
}

/// Either nothing (signed out or handshake) or a signed-in view.
///
/// Serializes to `null` when unauthenticated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AuthObject {
    Unauthenticated,
    Authenticated(SignedInAuthObject),
}

impl AuthObject {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn signed_in(&self) -> Option<&SignedInAuthObject> {
        match self {
            Self::Authenticated(auth) => Some(auth),
            Self::Unauthenticated => None,
        }
    }

    pub fn into_signed_in(self) -> Option<SignedInAuthObject> {
        match self {
            Self::Authenticated(auth) => Some(auth),
            Self::Unauthenticated => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.signed_in().map(|auth| auth.user_id.as_str())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.signed_in().and_then(|auth| auth.session_id.as_deref())
    }

    pub fn session_claims(&self) -> Option<&JwtPayload> {
        self.signed_in().map(|auth| &auth.session_claims)
    }
}
