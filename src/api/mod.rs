// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod health;
pub mod session;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/session", get(session::get_session))
        .route("/me", get(session::get_me))
        .with_state(state);

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", v1_routes)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::auth::testing::{session_token, ISSUED_AT};

    async fn get_json(uri: &str, headers: &[(&str, String)]) -> (StatusCode, Value) {
        let mut request = Request::builder().uri(uri).header("host", "app.example.com");
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let response = router(AppState::for_tests())
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, body) = get_json("/health", &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn session_reports_signed_in_for_valid_bearer() {
        let (status, body) = get_json(
            "/v1/session",
            &[("authorization", format!("Bearer {}", session_token()))],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "signed-in");
        assert_eq!(body["isSignedIn"], true);
        assert_eq!(body["signals"]["hasHeaderToken"], true);
    }

    #[tokio::test]
    async fn session_reports_handshake_without_cookies_in_development() {
        let (status, body) = get_json("/v1/session", &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "handshake");
        assert_eq!(body["reason"], "session-token-but-no-client-uat");
        assert!(body["redirectUrl"]
            .as_str()
            .unwrap()
            .contains("redirect_url=http%3A%2F%2Fapp.example.com%2Fv1%2Fsession"));
    }

    #[tokio::test]
    async fn me_returns_signed_in_view_from_cookie() {
        let cookie = format!("__client_uat={};__session={}", ISSUED_AT - 10, session_token());
        let (status, body) = get_json("/v1/me", &[("cookie", cookie)]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["userId"], "user_2GIpXOEpVyJw51rkZn9Kmnc6Sxr");
        assert_eq!(body["sessionId"], "sess_2GbDB4enNdCa5vS1zpC3Xzg9tK9");
    }

    #[tokio::test]
    async fn me_rejects_signed_out_requests() {
        let (status, body) = get_json(
            "/v1/me",
            &[("authorization", "Bearer not-a-token".to_string())],
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "token-invalid");
    }
}
