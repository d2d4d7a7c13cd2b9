//! Shared helpers for integration tests.
//!
//! Every test gets its own in-memory database and drives the router with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use taskgate::{
    ServerConfig,
    auth::hash_password,
    create_app,
    db::{Database, NewUser, UserRole},
    jwt::{JwtConfig, TokenLifetimes},
};
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";
pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    /// Issuer sharing the app's secret and lifetimes, for minting tokens directly.
    pub jwt: JwtConfig,
}

impl TestApp {
    /// Send a request to a clone of the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(|_| {}).await
}

/// Create an app after adjusting the default test configuration.
pub async fn create_test_app_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");

    let mut config = ServerConfig::new(db.clone(), TEST_SECRET.to_vec());
    config.bcrypt_cost = 4;
    config.cookies.secure = false;
    configure(&mut config);

    let jwt = JwtConfig::new(&config.jwt_secret, config.lifetimes);
    TestApp {
        app: create_app(&config),
        db,
        jwt,
    }
}

/// Issuer with the test secret and default lifetimes.
pub fn test_jwt() -> JwtConfig {
    JwtConfig::new(TEST_SECRET, TokenLifetimes::default())
}

pub struct TestUser {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub email: String,
}

/// Create an active account with [`TEST_PASSWORD`].
pub async fn create_user(db: &Database, username: &str, role: UserRole) -> TestUser {
    let uuid = uuid::Uuid::new_v4().to_string();
    let email = format!("{}@example.com", username);
    // Unique per user and within the 15 character limit.
    let mobile: String = uuid.chars().filter(|c| c.is_ascii_hexdigit()).take(12).collect();
    let password_hash = hash_password(TEST_PASSWORD, 4).unwrap();

    let id = db
        .users()
        .create(
            &NewUser {
                uuid: &uuid,
                name: username,
                email: &email,
                username,
                mobile: &mobile,
                role,
                assigned_admin: None,
            },
            &password_hash,
        )
        .await
        .unwrap();

    TestUser {
        id,
        uuid,
        username: username.to_string(),
        email,
    }
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Request carrying `Authorization: Bearer <token>`.
pub fn bearer_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Request carrying the given `Cookie` header.
pub fn cookie_request(method: &str, uri: &str, cookies: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookies)
        .body(Body::empty())
        .unwrap()
}

/// JSON request authenticated with a bearer token.
pub fn authed_json(method: &str, uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// All `Set-Cookie` header values, in order.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// The `Set-Cookie` header for `name`, if any.
pub fn find_set_cookie<'a>(cookies: &'a [String], name: &str) -> Option<&'a str> {
    let prefix = format!("{}=", name);
    cookies
        .iter()
        .find(|c| c.starts_with(&prefix))
        .map(String::as_str)
}

/// Value of the cookie `name` set by a response.
pub fn set_cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let cookie = find_set_cookie(cookies, name)?;
    let value = cookie.split(';').next()?.split_once('=')?.1;
    Some(value.to_string())
}

/// Log in and return the response.
pub async fn login(app: &TestApp, username: &str, password: &str) -> Response<Body> {
    app.send(json_request(
        "POST",
        "/api/auth/login",
        serde_json::json!({ "username": username, "password": password }),
    ))
    .await
}

/// Log in and return the `(access, refresh)` cookie values.
pub async fn login_tokens(app: &TestApp, username: &str) -> (String, String) {
    let response = login(app, username, TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    (
        set_cookie_value(&cookies, "access").unwrap(),
        set_cookie_value(&cookies, "refresh").unwrap(),
    )
}

/// Mint an access token for a user without going through login.
pub fn access_token(app: &TestApp, user: &TestUser) -> String {
    app.jwt.issue_access(&user.uuid).unwrap().token
}
