/// OTP second-factor flow: code verification, expiry, and attempt budget.
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use crate::support::{read_json, send_request, setup_test_app};

async fn verify(
    app: &crate::support::TestApp,
    user_id: &keyplane::domain::UserId,
    code: &str,
) -> axum::http::Response<axum::body::Body> {
    send_request(
        app,
        Method::POST,
        "/api/v1/auth/otp/verify",
        None,
        Some(json!({ "userId": user_id.as_str(), "code": code })),
    )
    .await
}

#[tokio::test]
async fn correct_code_completes_the_login() {
    let app = setup_test_app().await;
    let user_id = app.create_user_with("alice@example.com", "correct horse battery", true, true).await;

    // Plant a challenge whose plaintext we know.
    let otp = app.otp_service(chrono::Duration::minutes(5), 5);
    let code = otp.generate(&user_id).await.expect("generate challenge");
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));

    let response = verify(&app, &user_id, &code).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    assert!(body["accessToken"].as_str().is_some());
    assert!(body["refreshToken"].as_str().unwrap().starts_with("kp_rt_"));
}

#[tokio::test]
async fn challenge_is_single_use() {
    let app = setup_test_app().await;
    let user_id = app.create_user_with("alice@example.com", "correct horse battery", true, true).await;

    let otp = app.otp_service(chrono::Duration::minutes(5), 5);
    let code = otp.generate(&user_id).await.expect("generate challenge");

    assert_eq!(verify(&app, &user_id, &code).await.status(), StatusCode::OK);

    // The challenge was destroyed on success; replaying the code fails.
    let response = verify(&app, &user_id, &code).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "no_active_challenge");
}

#[tokio::test]
async fn expired_challenge_is_rejected_and_destroyed() {
    let app = setup_test_app().await;
    let user_id = app.create_user_with("alice@example.com", "correct horse battery", true, true).await;

    let otp = app.otp_service(chrono::Duration::seconds(-1), 5);
    let code = otp.generate(&user_id).await.expect("generate challenge");

    let response = verify(&app, &user_id, &code).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "otp_expired");

    // Retrying after expiry finds no challenge at all.
    let response = verify(&app, &user_id, &code).await;
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "no_active_challenge");
}

#[tokio::test]
async fn attempt_budget_destroys_the_challenge() {
    let app = setup_test_app().await;
    let user_id = app.create_user_with("alice@example.com", "correct horse battery", true, true).await;

    let otp = app.otp_service(chrono::Duration::minutes(5), 5);
    let code = otp.generate(&user_id).await.expect("generate challenge");
    let wrong = if code == "000000" { "000001" } else { "000000" };

    // The budget is enforced by the app's configured service.
    let budget = app.config.auth.otp_max_attempts;
    for attempt in 1..=budget {
        let response = verify(&app, &user_id, wrong).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: Value = read_json(response).await;
        if attempt < budget {
            assert_eq!(body["error"], "otp_invalid", "attempt {}", attempt);
        } else {
            assert_eq!(body["error"], "otp_attempts_exhausted");
        }
    }

    // The budget consumed the challenge; even the right code is useless now.
    let response = verify(&app, &user_id, &code).await;
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "no_active_challenge");
}

#[tokio::test]
async fn new_login_replaces_the_pending_challenge() {
    let app = setup_test_app().await;
    let user_id = app.create_user_with("alice@example.com", "correct horse battery", true, true).await;

    let otp = app.otp_service(chrono::Duration::minutes(5), 5);
    let old_code = otp.generate(&user_id).await.expect("generate challenge");

    // A fresh login overwrites the stored challenge with a new code.
    let response = send_request(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "correct horse battery" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = verify(&app, &user_id, &old_code).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "otp_invalid");
}

#[tokio::test]
async fn verification_without_a_challenge_fails() {
    let app = setup_test_app().await;
    let user_id = app.create_user_with("alice@example.com", "correct horse battery", true, true).await;

    let response = verify(&app, &user_id, "123456").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "no_active_challenge");
}
