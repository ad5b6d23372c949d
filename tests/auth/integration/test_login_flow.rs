/// Login endpoint behavior: outcome ordering, credential privacy, and the
/// guarantee that non-authenticated outcomes never carry tokens.
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use crate::support::{read_json, send_request, setup_test_app};

#[tokio::test]
async fn successful_login_returns_token_pair_and_user() {
    let app = setup_test_app().await;
    app.create_user("alice@example.com", "correct horse battery").await;

    let body = app.login("alice@example.com", "correct horse battery").await;

    assert!(body["accessToken"].as_str().unwrap().contains('.'), "JWT has segments");
    assert!(body["refreshToken"].as_str().unwrap().starts_with("kp_rt_"));
    assert!(body["expiresIn"].as_i64().unwrap() > 0);
    assert_eq!(body["user"]["email"], "alice@example.com");
}

#[tokio::test]
async fn wrong_password_is_rejected_with_generic_body() {
    let app = setup_test_app().await;
    app.create_user("alice@example.com", "correct horse battery").await;

    let response = send_request(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "wrong" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "invalid_credentials");
    assert_eq!(body["message"], "Invalid email or password");
}

#[tokio::test]
async fn unknown_email_and_wrong_password_are_indistinguishable() {
    let app = setup_test_app().await;
    app.create_user("alice@example.com", "correct horse battery").await;

    let unknown = send_request(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": "whatever1" })),
    )
    .await;
    let status_unknown = unknown.status();
    let body_unknown: Value = read_json(unknown).await;

    let wrong = send_request(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "whatever1" })),
    )
    .await;
    let status_wrong = wrong.status();
    let body_wrong: Value = read_json(wrong).await;

    assert_eq!(status_unknown, status_wrong);
    assert_eq!(body_unknown, body_wrong);
}

#[tokio::test]
async fn inactive_account_rejected_even_with_correct_password() {
    let app = setup_test_app().await;
    let user_id = app.create_user("alice@example.com", "correct horse battery").await;
    app.state
        .user_service
        .update_user(
            &user_id,
            keyplane::auth::user::UpdateUserRequest {
                email: None,
                name: None,
                is_active: Some(false),
                email_verified: None,
                otp_enabled: None,
            },
        )
        .await
        .expect("deactivate user");

    let response = send_request(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "correct horse battery" })),
    )
    .await;

    // Body stays generic so a caller cannot probe account status.
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "invalid_credentials");
}

#[tokio::test]
async fn unverified_email_blocks_token_issuance() {
    let app = setup_test_app().await;
    app.create_user_with("alice@example.com", "correct horse battery", false, false).await;

    let response = send_request(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "correct horse battery" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    assert_eq!(body["requiresEmailVerification"], true);
    assert_eq!(body["email"], "alice@example.com");
    assert!(body.get("accessToken").is_none(), "no tokens before verification");
    assert!(body.get("refreshToken").is_none());
}

#[tokio::test]
async fn otp_enrolled_login_defers_token_issuance() {
    let app = setup_test_app().await;
    let user_id = app.create_user_with("alice@example.com", "correct horse battery", true, true).await;

    let response = send_request(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "correct horse battery" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    assert_eq!(body["requiresOtp"], true);
    assert_eq!(body["userId"], user_id.as_str());
    assert!(body.get("accessToken").is_none(), "no tokens before OTP verification");
    assert!(body.get("refreshToken").is_none());
}

#[tokio::test]
async fn deferred_login_resets_attempts_without_stamping_last_login() {
    let app = setup_test_app().await;
    let user_id =
        app.create_user_with("alice@example.com", "correct horse battery", true, true).await;

    // A failed attempt bumps the counter.
    let response = send_request(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A correct password clears the counter, but the flow stops at the OTP
    // gate, so no login is recorded yet.
    let response = send_request(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "correct horse battery" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    assert_eq!(body["requiresOtp"], true);

    let user = app.state.user_service.get_user(&user_id).await.unwrap();
    assert_eq!(user.login_attempts, 0);
    assert!(user.last_login_at.is_none(), "deferred login must not stamp last_login_at");
}

#[tokio::test]
async fn completed_login_stamps_last_login() {
    let app = setup_test_app().await;
    let user_id = app.create_user("alice@example.com", "correct horse battery").await;

    app.login("alice@example.com", "correct horse battery").await;

    let user = app.state.user_service.get_user(&user_id).await.unwrap();
    assert!(user.last_login_at.is_some());
}

#[tokio::test]
async fn email_lookup_is_case_insensitive() {
    let app = setup_test_app().await;
    app.create_user("alice@example.com", "correct horse battery").await;

    let body = app.login("Alice@Example.COM", "correct horse battery").await;
    assert_eq!(body["user"]["email"], "alice@example.com");
}
