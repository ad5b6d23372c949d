/// Account administration endpoints and their session side effects.
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use crate::support::{read_json, send_request, setup_test_app, TestApp};

async fn admin_token(app: &TestApp) -> String {
    let admin = app.create_user("admin@example.com", "correct horse battery").await;
    app.make_admin(&admin).await;
    app.grant_permission(&admin, "user-admin", "users", "write").await;
    app.grant_permission(&admin, "user-viewer", "users", "read").await;
    let login = app.login("admin@example.com", "correct horse battery").await;
    login["accessToken"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn create_user_assigns_default_role() {
    let app = setup_test_app().await;
    let token = admin_token(&app).await;

    let response = send_request(
        &app,
        Method::POST,
        "/api/v1/users",
        Some(&token),
        Some(json!({
            "email": "new@example.com",
            "password": "a strong passphrase",
            "name": "New User",
            "emailVerified": true
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = read_json(response).await;
    let user_id = body["id"].as_str().unwrap().to_string();

    let response = send_request(
        &app,
        Method::GET,
        &format!("/api/v1/users/{}", user_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    let roles: Vec<&str> =
        body["roles"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
    assert_eq!(roles, vec!["user"]);
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let app = setup_test_app().await;
    let token = admin_token(&app).await;

    let payload = json!({
        "email": "dupe@example.com",
        "password": "a strong passphrase",
        "name": "Dupe"
    });

    let first =
        send_request(&app, Method::POST, "/api/v1/users", Some(&token), Some(payload.clone()))
            .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second =
        send_request(&app, Method::POST, "/api/v1/users", Some(&token), Some(payload)).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn weak_password_fails_validation() {
    let app = setup_test_app().await;
    let token = admin_token(&app).await;

    let response = send_request(
        &app,
        Method::POST,
        "/api/v1/users",
        Some(&token),
        Some(json!({
            "email": "weak@example.com",
            "password": "short",
            "name": "Weak"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn password_change_revokes_every_session() {
    let app = setup_test_app().await;
    let user_id = app.create_user("alice@example.com", "old passphrase one").await;

    let session_a = app.login("alice@example.com", "old passphrase one").await;
    let session_b = app.login("alice@example.com", "old passphrase one").await;
    let access = session_a["accessToken"].as_str().unwrap();

    let response = send_request(
        &app,
        Method::PUT,
        &format!("/api/v1/users/{}/password", user_id.as_str()),
        Some(access),
        Some(json!({
            "currentPassword": "old passphrase one",
            "newPassword": "brand new passphrase"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Both refresh chains are dead.
    for session in [&session_a, &session_b] {
        let refresh_token = session["refreshToken"].as_str().unwrap();
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

    // The old password no longer works, the new one does.
    let response = send_request(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "old passphrase one" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    app.login("alice@example.com", "brand new passphrase").await;
}

#[tokio::test]
async fn password_change_requires_the_current_password() {
    let app = setup_test_app().await;
    let user_id = app.create_user("alice@example.com", "old passphrase one").await;
    let login = app.login("alice@example.com", "old passphrase one").await;
    let access = login["accessToken"].as_str().unwrap();

    let response = send_request(
        &app,
        Method::PUT,
        &format!("/api/v1/users/{}/password", user_id.as_str()),
        Some(access),
        Some(json!({
            "currentPassword": "not the password",
            "newPassword": "brand new passphrase"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_change_for_another_user_requires_admin() {
    let app = setup_test_app().await;
    app.create_user("alice@example.com", "alice passphrase").await;
    let bob = app.create_user("bob@example.com", "bob passphrase!").await;

    let alice_login = app.login("alice@example.com", "alice passphrase").await;
    let alice_access = alice_login["accessToken"].as_str().unwrap();

    let response = send_request(
        &app,
        Method::PUT,
        &format!("/api/v1/users/{}/password", bob.as_str()),
        Some(alice_access),
        Some(json!({
            "currentPassword": "bob passphrase!",
            "newPassword": "hijacked passphrase"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn replacing_user_roles_requires_admin_and_applies_immediately() {
    let app = setup_test_app().await;
    let token = admin_token(&app).await;
    let user_id = app.create_user("alice@example.com", "alice passphrase").await;
    let editor_role = app.grant_permission(&user_id, "editor", "post", "update").await;

    // Replace all assignments with just the editor role.
    let response = send_request(
        &app,
        Method::PUT,
        &format!("/api/v1/users/{}/roles", user_id.as_str()),
        Some(&token),
        Some(json!({ "roleIds": [editor_role.as_str()] })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    let roles: Vec<&str> =
        body["roles"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
    assert_eq!(roles, vec!["editor"]);
}

#[tokio::test]
async fn empty_role_replacement_is_rejected() {
    let app = setup_test_app().await;
    let token = admin_token(&app).await;
    let user_id = app.create_user("alice@example.com", "alice passphrase").await;

    // Stripping every role would leave the account without any assignment.
    let response = send_request(
        &app,
        Method::PUT,
        &format!("/api/v1/users/{}/roles", user_id.as_str()),
        Some(&token),
        Some(json!({ "roleIds": [] })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The user keeps the default role.
    let roles = app.state.user_service.roles_for_user(&user_id).await.unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name, "user");
}

#[tokio::test]
async fn deleting_a_user_kills_their_access() {
    let app = setup_test_app().await;
    let token = admin_token(&app).await;
    let user_id = app.create_user("alice@example.com", "alice passphrase").await;
    let login = app.login("alice@example.com", "alice passphrase").await;
    let alice_access = login["accessToken"].as_str().unwrap();

    let response = send_request(
        &app,
        Method::DELETE,
        &format!("/api/v1/users/{}", user_id.as_str()),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The deleted account's bearer token stops resolving.
    let response = send_request(&app, Method::GET, "/api/v1/auth/me", Some(alice_access), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send_request(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "alice passphrase" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_role_id_fails_the_whole_replacement() {
    let app = setup_test_app().await;
    let token = admin_token(&app).await;
    let user_id = app.create_user("alice@example.com", "alice passphrase").await;

    let response = send_request(
        &app,
        Method::PUT,
        &format!("/api/v1/users/{}/roles", user_id.as_str()),
        Some(&token),
        Some(json!({ "roleIds": ["no-such-role"] })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The user keeps the default role.
    let roles = app.state.user_service.roles_for_user(&user_id).await.unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name, "user");
}
