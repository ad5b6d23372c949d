/// Route guards over HTTP: permission checks against fresh role data, admin
/// gating, the sensitive-operation gate, and admin revalidation on refresh.
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use crate::support::{read_json, send_request, setup_test_app};

#[tokio::test]
async fn requests_without_a_bearer_token_are_unauthorized() {
    let app = setup_test_app().await;

    let response = send_request(&app, Method::GET, "/api/v1/auth/me", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garbage_bearer_token_is_unauthorized() {
    let app = setup_test_app().await;

    let response =
        send_request(&app, Method::GET, "/api/v1/auth/me", Some("not-a-jwt"), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_reflects_roles_and_permissions() {
    let app = setup_test_app().await;
    let user_id = app.create_user("alice@example.com", "correct horse battery").await;
    app.grant_permission(&user_id, "editor", "post", "update").await;

    let login = app.login("alice@example.com", "correct horse battery").await;
    let access = login["accessToken"].as_str().unwrap();

    let response = send_request(&app, Method::GET, "/api/v1/auth/me", Some(access), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;

    let roles: Vec<&str> =
        body["roles"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
    assert!(roles.contains(&"editor"));
    assert!(roles.contains(&"user"), "default role is always assigned");
    let permissions: Vec<&str> =
        body["permissions"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
    assert!(permissions.contains(&"post:update"));
}

#[tokio::test]
async fn missing_permission_is_forbidden_not_unauthorized() {
    let app = setup_test_app().await;
    app.create_user("alice@example.com", "correct horse battery").await;
    let login = app.login("alice@example.com", "correct horse battery").await;
    let access = login["accessToken"].as_str().unwrap();

    // Listing users requires users:read, which the default role lacks.
    let response = send_request(&app, Method::GET, "/api/v1/users", Some(access), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "permission_denied");
    assert_eq!(body["statusCode"], 403);
}

#[tokio::test]
async fn permission_grant_applies_without_a_new_login() {
    let app = setup_test_app().await;
    let user_id = app.create_user("alice@example.com", "correct horse battery").await;
    let login = app.login("alice@example.com", "correct horse battery").await;
    let access = login["accessToken"].as_str().unwrap();

    let response = send_request(&app, Method::GET, "/api/v1/users", Some(access), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Grant users:read while the same access token stays in hand.
    app.grant_permission(&user_id, "user-viewer", "users", "read").await;

    let response = send_request(&app, Method::GET, "/api/v1/users", Some(access), None).await;
    assert_eq!(response.status(), StatusCode::OK, "fresh role data, same token");
}

#[tokio::test]
async fn admin_routes_reject_non_admins() {
    let app = setup_test_app().await;
    let user_id = app.create_user("alice@example.com", "correct horse battery").await;
    // Permissions on arbitrary resources do not add up to admin.
    app.grant_permission(&user_id, "editor", "roles", "write").await;

    let login = app.login("alice@example.com", "correct horse battery").await;
    let access = login["accessToken"].as_str().unwrap();

    let response = send_request(
        &app,
        Method::POST,
        "/api/v1/roles",
        Some(access),
        Some(json!({ "name": "new-role" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "admin_required");
    assert_eq!(body["statusCode"], 403);
}

#[tokio::test]
async fn admin_routes_accept_admins() {
    let app = setup_test_app().await;
    let user_id = app.create_user("admin@example.com", "correct horse battery").await;
    app.make_admin(&user_id).await;

    let login = app.login("admin@example.com", "correct horse battery").await;
    let access = login["accessToken"].as_str().unwrap();

    let response = send_request(
        &app,
        Method::POST,
        "/api/v1/roles",
        Some(access),
        Some(json!({ "name": "auditor", "description": "read-only reviews" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = read_json(response).await;
    assert_eq!(body["name"], "auditor");
}

#[tokio::test]
async fn admin_revalidation_blocks_refresh_after_role_removal() {
    let app = setup_test_app().await;
    let user_id = app.create_user("admin@example.com", "correct horse battery").await;
    app.make_admin(&user_id).await;

    let login = app.login("admin@example.com", "correct horse battery").await;
    let refresh_token = login["refreshToken"].as_str().unwrap();

    // Strip the admin role while the session is live.
    let admin_role = app
        .state
        .role_repository
        .get_role_by_name("admin")
        .await
        .unwrap()
        .unwrap();
    app.state.role_repository.remove_role(&user_id, &admin_role.id).await.unwrap();

    let response = send_request(
        &app,
        Method::POST,
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refreshToken": refresh_token })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "admin_revoked");
    assert_eq!(body["statusCode"], 403);

    // The chain was revoked: the same token cannot be replayed for a retry.
    let response = send_request(
        &app,
        Method::POST,
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refreshToken": refresh_token })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_admin_sessions_are_unaffected_by_role_churn() {
    let app = setup_test_app().await;
    let user_id = app.create_user("alice@example.com", "correct horse battery").await;
    let editor_role = app.grant_permission(&user_id, "editor", "post", "update").await;

    let login = app.login("alice@example.com", "correct horse battery").await;
    let refresh_token = login["refreshToken"].as_str().unwrap();

    // Removing an ordinary role does not terminate the session.
    app.state.role_repository.remove_role(&user_id, &editor_role).await.unwrap();

    let response = send_request(
        &app,
        Method::POST,
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refreshToken": refresh_token })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // But the new access token no longer carries the revoked permission.
    let body: Value = read_json(response).await;
    let access = body["accessToken"].as_str().unwrap();
    let me = send_request(&app, Method::GET, "/api/v1/auth/me", Some(access), None).await;
    let me_body: Value = read_json(me).await;
    let permissions: Vec<&str> =
        me_body["permissions"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
    assert!(!permissions.contains(&"post:update"));
}

#[tokio::test]
async fn sensitive_route_requires_otp_enrollment() {
    let app = setup_test_app().await;
    let enrolled = app.create_user_with("otp@example.com", "correct horse battery", true, false).await;
    app.make_admin(&enrolled).await;

    let login = app.login("otp@example.com", "correct horse battery").await;
    let access = login["accessToken"].as_str().unwrap();

    // Admin alone is not enough where second-factor enrollment is required;
    // verified directly against the guard since the admin routes here do not
    // declare the sensitive requirement.
    use keyplane::auth::{guard, RouteRequirement};
    let current = app
        .state
        .authenticator
        .verify_access_token(access)
        .await
        .expect("verify access token");
    assert_eq!(
        guard::decide(Some(&current), &RouteRequirement::sensitive()),
        guard::Decision::Deny(keyplane::errors::AuthErrorType::SensitiveRequiresOtp)
    );
}

#[tokio::test]
async fn deactivated_account_fails_bearer_verification() {
    let app = setup_test_app().await;
    let admin = app.create_user("admin@example.com", "correct horse battery").await;
    app.make_admin(&admin).await;
    let admin_login = app.login("admin@example.com", "correct horse battery").await;
    let admin_access = admin_login["accessToken"].as_str().unwrap();

    let user_id = app.create_user("alice@example.com", "correct horse battery").await;
    let login = app.login("alice@example.com", "correct horse battery").await;
    let access = login["accessToken"].as_str().unwrap();

    // Deactivate alice through the admin API.
    let response = send_request(
        &app,
        Method::PUT,
        &format!("/api/v1/users/{}", user_id.as_str()),
        Some(admin_access),
        Some(json!({ "isActive": false })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN, "admin lacks users:write permission");

    // Admin gets the permission and retries.
    app.grant_permission(&admin, "user-admin", "users", "write").await;
    let response = send_request(
        &app,
        Method::PUT,
        &format!("/api/v1/users/{}", user_id.as_str()),
        Some(admin_access),
        Some(json!({ "isActive": false })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Alice's otherwise-valid access token stops working immediately.
    let response = send_request(&app, Method::GET, "/api/v1/auth/me", Some(access), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
