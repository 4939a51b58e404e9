// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Diagnostic session endpoints.

use axum::Json;

use crate::auth::{debug_request_state, RequestStateDebug, RequireSignedIn, SessionState, SignedInAuthObject};

/// Resolved state of this request, as a debug dump.
///
/// Always 200; the status field tells signed in, signed out and handshake
/// apart.
pub async fn get_session(SessionState(state): SessionState) -> Json<RequestStateDebug> {
    Json(debug_request_state(&state))
}

/// Signed-in view of the caller. 401 with the reason code otherwise.
pub async fn get_me(RequireSignedIn(auth): RequireSignedIn) -> Json<SignedInAuthObject> {
    Json(auth)
}
