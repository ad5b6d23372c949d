/// Refresh token rotation: single use, reuse detection, expiry, and the
/// revocation blast radius on reuse.
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use crate::support::{read_json, send_request, setup_test_app};

async fn refresh(
    app: &crate::support::TestApp,
    token: &str,
) -> axum::http::Response<axum::body::Body> {
    send_request(
        app,
        Method::POST,
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refreshToken": token })),
    )
    .await
}

#[tokio::test]
async fn refresh_rotates_the_token_pair() {
    let app = setup_test_app().await;
    app.create_user("alice@example.com", "correct horse battery").await;
    let login = app.login("alice@example.com", "correct horse battery").await;
    let first = login["refreshToken"].as_str().unwrap();

    let response = refresh(&app, first).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;

    let second = body["refreshToken"].as_str().unwrap();
    assert_ne!(second, first, "a new refresh token is minted");
    assert!(second.starts_with("kp_rt_"));
    assert!(body["accessToken"].as_str().is_some());
    assert_eq!(body["user"]["email"], "alice@example.com");

    // The rotated token keeps working.
    let response = refresh(&app, second).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn reusing_a_rotated_token_is_flagged_and_kills_the_chain() {
    let app = setup_test_app().await;
    app.create_user("alice@example.com", "correct horse battery").await;
    let login = app.login("alice@example.com", "correct horse battery").await;
    let first = login["refreshToken"].as_str().unwrap();

    let response = refresh(&app, first).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    let second = body["refreshToken"].as_str().unwrap().to_string();

    // Replaying the consumed token is a reuse signal.
    let response = refresh(&app, first).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "refresh_token_reused");

    // Reuse revokes every live token for the user, including the successor.
    let response = refresh(&app, &second).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reuse_detection_revokes_other_sessions_too() {
    let app = setup_test_app().await;
    app.create_user("alice@example.com", "correct horse battery").await;

    let session_a = app.login("alice@example.com", "correct horse battery").await;
    let session_b = app.login("alice@example.com", "correct horse battery").await;
    let token_a = session_a["refreshToken"].as_str().unwrap();
    let token_b = session_b["refreshToken"].as_str().unwrap();

    // Rotate session A once, then replay the consumed token.
    let rotated: Value = read_json(refresh(&app, token_a).await).await;
    assert!(rotated["refreshToken"].as_str().is_some());
    assert_eq!(refresh(&app, token_a).await.status(), StatusCode::UNAUTHORIZED);

    // Session B was never touched, but reuse detection revoked it as well.
    assert_eq!(refresh(&app, token_b).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_refresh_token_is_rejected() {
    let app = setup_test_app().await;
    let user_id = app.create_user("alice@example.com", "correct horse battery").await;
    let user = app.state.user_service.get_user(&user_id).await.expect("load user");
    let roles = app.state.user_service.roles_for_user(&user_id).await.expect("load roles");

    // Mint a pair whose refresh record is already past its expiry.
    let expired_service = app.token_service(chrono::Duration::seconds(-60));
    let pair = expired_service.issue(&user, &roles).await.expect("issue tokens");

    let response = refresh(&app, &pair.refresh_token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "refresh_token_expired");
}

#[tokio::test]
async fn malformed_refresh_tokens_are_rejected() {
    let app = setup_test_app().await;

    for token in ["", "kp_rt_", "kp_rt_missing-dot", "other_abc.secret", "kp_rt_unknown.secret"] {
        let response = refresh(&app, token).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "token {:?}", token);
        let body: Value = read_json(response).await;
        assert_eq!(body["error"], "refresh_token_invalid");
    }
}

#[tokio::test]
async fn refresh_with_wrong_secret_is_rejected_without_reuse_penalty() {
    let app = setup_test_app().await;
    app.create_user("alice@example.com", "correct horse battery").await;
    let login = app.login("alice@example.com", "correct horse battery").await;
    let token = login["refreshToken"].as_str().unwrap();

    // Same record id, corrupted secret.
    let (id_part, _secret) = token.rsplit_once('.').unwrap();
    let forged = format!("{}.{}", id_part, "bm90LXRoZS1zZWNyZXQ");

    let response = refresh(&app, &forged).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "refresh_token_invalid");

    // The real token survives a forgery attempt.
    assert_eq!(refresh(&app, token).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn logout_revokes_the_session_idempotently() {
    let app = setup_test_app().await;
    app.create_user("alice@example.com", "correct horse battery").await;
    let login = app.login("alice@example.com", "correct horse battery").await;
    let token = login["refreshToken"].as_str().unwrap();

    let logout = send_request(
        &app,
        Method::POST,
        "/api/v1/auth/logout",
        None,
        Some(json!({ "refreshToken": token })),
    )
    .await;
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    assert_eq!(refresh(&app, token).await.status(), StatusCode::UNAUTHORIZED);

    // Logging out again with the same token stays a no-op.
    let logout = send_request(
        &app,
        Method::POST,
        "/api/v1/auth/logout",
        None,
        Some(json!({ "refreshToken": token })),
    )
    .await;
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);
}
