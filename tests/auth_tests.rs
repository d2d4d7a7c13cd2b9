//! Tests for header/cookie request authentication.
//!
//! Tests cover:
//! - Bearer header and cookie sources
//! - Header precedence with no fallback to the cookie
//! - Expired, forged and wrong-kind tokens
//! - Blocked and deleted principals
//! - Role gates and the optional-auth config probe

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::*;
use taskgate::db::UserRole;
use taskgate::jwt::{JwtConfig, TokenKind, TokenLifetimes};

const INVALID_TOKEN: &str = "Invalid or expired token";

fn header_and_cookie(authorization: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri("/api/users/me")
        .header(header::AUTHORIZATION, authorization)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_bearer_header_authenticates() {
    let app = create_test_app().await;
    let user = create_user(&app.db, "alice", UserRole::User).await;
    let token = access_token(&app, &user);

    let response = app
        .send(bearer_request("GET", "/api/users/me", &token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["uuid"], user.uuid);
    assert_eq!(json["username"], "alice");
    assert_eq!(json["role"], "user");
    assert!(json.get("id").is_none());
    assert!(json.get("password_hash").is_none());
}

#[tokio::test]
async fn test_cookie_authenticates() {
    let app = create_test_app().await;
    let user = create_user(&app.db, "alice", UserRole::User).await;
    let token = access_token(&app, &user);

    let response = app
        .send(cookie_request(
            "GET",
            "/api/users/me",
            &format!("logged_in=true; access={}", token),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["uuid"], user.uuid);
}

#[tokio::test]
async fn test_valid_header_wins_over_invalid_cookie() {
    let app = create_test_app().await;
    let user = create_user(&app.db, "alice", UserRole::User).await;
    let token = access_token(&app, &user);

    let response = app
        .send(header_and_cookie(
            &format!("Bearer {}", token),
            "access=garbage",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_header_does_not_fall_back_to_cookie() {
    let app = create_test_app().await;
    let user = create_user(&app.db, "alice", UserRole::User).await;
    let token = access_token(&app, &user);

    let response = app
        .send(header_and_cookie(
            "Bearer garbage",
            &format!("access={}", token),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], INVALID_TOKEN);
}

#[tokio::test]
async fn test_header_for_other_user_wins() {
    let app = create_test_app().await;
    let alice = create_user(&app.db, "alice", UserRole::User).await;
    let bob = create_user(&app.db, "bob", UserRole::User).await;

    let response = app
        .send(header_and_cookie(
            &format!("Bearer {}", access_token(&app, &bob)),
            &format!("access={}", access_token(&app, &alice)),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["uuid"], bob.uuid);
}

#[tokio::test]
async fn test_unknown_scheme_is_anonymous() {
    let app = create_test_app().await;
    let user = create_user(&app.db, "alice", UserRole::User).await;
    let token = access_token(&app, &user);

    let response = app
        .send(header_and_cookie(
            "Basic YWxpY2U6cGFzcw==",
            &format!("access={}", token),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["error"],
        "Authentication credentials were not provided."
    );
}

#[tokio::test]
async fn test_malformed_bearer_header() {
    let app = create_test_app().await;

    let request = Request::builder()
        .uri("/api/users/me")
        .header(header::AUTHORIZATION, "Bearer")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], INVALID_TOKEN);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let app = create_test_app().await;
    let user = create_user(&app.db, "alice", UserRole::User).await;
    let expired = app
        .jwt
        .issue_at(&user.uuid, TokenKind::Access, 1_000)
        .unwrap();

    let response = app
        .send(bearer_request("GET", "/api/users/me", &expired.token))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], INVALID_TOKEN);
}

#[tokio::test]
async fn test_foreign_signature_rejected() {
    let app = create_test_app().await;
    let user = create_user(&app.db, "alice", UserRole::User).await;
    let other = JwtConfig::new(
        b"a-different-secret-of-sufficient-length",
        TokenLifetimes::default(),
    );
    let forged = other.issue_access(&user.uuid).unwrap();

    let response = app
        .send(bearer_request("GET", "/api/users/me", &forged.token))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_cannot_authenticate() {
    let app = create_test_app().await;
    create_user(&app.db, "alice", UserRole::User).await;
    let (_, refresh) = login_tokens(&app, "alice").await;

    let response = app
        .send(bearer_request("GET", "/api/users/me", &refresh))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(cookie_request(
            "GET",
            "/api/users/me",
            &format!("access={}", refresh),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_leaves_cookies_alone() {
    let app = create_test_app().await;

    let response = app
        .send(cookie_request("GET", "/api/users/me", "access=garbage"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_blocked_user_token_stops_working() {
    let app = create_test_app().await;
    let user = create_user(&app.db, "alice", UserRole::User).await;
    let token = access_token(&app, &user);

    let response = app
        .send(bearer_request("GET", "/api/users/me", &token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    app.db.users().toggle_active(user.id).await.unwrap();

    let response = app
        .send(bearer_request("GET", "/api/users/me", &token))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], INVALID_TOKEN);
}

#[tokio::test]
async fn test_deleted_user_token_stops_working() {
    let app = create_test_app().await;
    let user = create_user(&app.db, "alice", UserRole::User).await;
    let token = access_token(&app, &user);

    app.db.users().delete(user.id).await.unwrap();

    let response = app
        .send(bearer_request("GET", "/api/users/me", &token))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_is_read_from_storage() {
    // Promotion takes effect on the next request, without a new token.
    let app = create_test_app().await;
    let user = create_user(&app.db, "alice", UserRole::User).await;
    let token = access_token(&app, &user);

    let response = app.send(bearer_request("GET", "/api/tasks", &token)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.db
        .users()
        .set_role(user.id, UserRole::Admin)
        .await
        .unwrap();

    let response = app.send(bearer_request("GET", "/api/tasks", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_custom_cookie_name() {
    let app = create_test_app_with(|config| config.cookies.access_name = "session".to_string())
        .await;
    let user = create_user(&app.db, "alice", UserRole::User).await;

    let response = login(&app, "alice", TEST_PASSWORD).await;
    let cookies = set_cookies(&response);
    let token = set_cookie_value(&cookies, "session").unwrap();
    assert!(find_set_cookie(&cookies, "access").is_none());

    let response = app
        .send(cookie_request(
            "GET",
            "/api/users/me",
            &format!("session={}", token),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["uuid"], user.uuid);

    let response = app
        .send(cookie_request(
            "GET",
            "/api/users/me",
            &format!("access={}", token),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Config probe
// =============================================================================

#[tokio::test]
async fn test_config_anonymous() {
    let app = create_test_app().await;

    let response = app.send(empty_request("GET", "/api/config")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["authenticated"], false);
    assert!(json["role"].is_null());
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_config_authenticated() {
    let app = create_test_app().await;
    let user = create_user(&app.db, "root", UserRole::Superadmin).await;

    let response = app
        .send(bearer_request("GET", "/api/config", &access_token(&app, &user)))
        .await;
    let json = body_json(response).await;
    assert_eq!(json["authenticated"], true);
    assert_eq!(json["role"], "superadmin");
}

#[tokio::test]
async fn test_config_with_bad_token_is_anonymous() {
    let app = create_test_app().await;

    let response = app
        .send(bearer_request("GET", "/api/config", "garbage"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["authenticated"], false);
}
