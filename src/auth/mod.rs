// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Resolves an inbound request to one of three states using Clerk session
//! tokens.
//!
//! ## Auth Flow
//!
//! 1. The extractor normalises headers, cookies and the public URL
//! 2. A bearer token in `Authorization` is verified directly
//! 3. Without one, cookie rules decide between signed out, handshake, or
//!    verifying the `__session` cookie
//! 4. Verification resolves a signing key (static PEM or remote JWKS by
//!    `kid`) and checks signature, expiry, subject, audience and authorized
//!    party
//!
//! ## Security
//!
//! - A header token is never answered with a handshake
//! - Verification failures are never retried
//! - JWKS is fetched with the secret key and cached per `kid` with a TTL
//! - Clock skew tolerance defaults to 5 seconds
//! - Debug dumps never contain tokens or claims

pub mod claims;
pub mod error;
pub mod extractor;
pub mod factory;
pub mod jwks;
pub mod options;
pub mod request;
pub mod status;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use claims::{AuthObject, Check, JwtPayload, SignedInAuthObject};
pub use error::{
    AuthError, AuthErrorReason, AuthReason, TokenCarrier, TokenVerificationError,
    TokenVerificationErrorAction, TokenVerificationErrorReason,
};
pub use extractor::{RequestSignals, RequireSignedIn, SessionState};
pub use factory::Authenticator;
pub use jwks::{HttpJwksFetcher, JwksFetcher, JwksRequest, KeyResolver};
pub use options::{
    AuthenticateRequestOptions, BuildTimeOptions, Heuristics, InstanceType, RuntimeOptions,
};
pub use request::authenticate_request;
pub use status::{debug_request_state, AuthStatus, RequestState, RequestStateDebug};
pub use verify::{verify_jwt, verify_token, Clock, SystemClock};
