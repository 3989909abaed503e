//! HTTP surface tests driven through the router with `oneshot`

use axum::{body::Body, Router};
use http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use passgate::auth::{
    Argon2Hasher, AuthDeps, AuthService, InMemoryUserStore, JwtConfig, Role, TokenIssuer,
    UserStore,
};
use passgate::servers::build_router;

struct TestApp {
    router: Router,
    service: Arc<AuthService>,
    store: Arc<InMemoryUserStore>,
}

fn app() -> TestApp {
    let store = Arc::new(InMemoryUserStore::new());
    let tokens = Arc::new(TokenIssuer::new(JwtConfig::new(
        "http-test-secret".to_string(),
        3600,
    )));
    let deps = AuthDeps::new(store.clone(), tokens)
        .with_hasher(Arc::new(Argon2Hasher::with_cost(1024, 1).unwrap()));
    let service = Arc::new(AuthService::new(deps));
    TestApp {
        router: build_router(service.clone()),
        service,
        store,
    }
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

impl TestApp {
    async fn register(&self, email: &str, password: &str) -> String {
        let (status, body) = send(
            &self.router,
            Method::POST,
            "/v1/auth/register",
            None,
            Some(json!({
                "firstName": "Ada",
                "lastName": "Lovelace",
                "email": email,
                "password": password,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["userId"].as_str().unwrap().to_string()
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = send(
            &self.router,
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn health_reports_version() {
    let app = app();
    let (status, body) = send(&app.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["version"], passgate::VERSION);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn register_and_verify_over_http() {
    let app = app();
    app.register("ada@example.com", "pw1").await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ADA@example.com",
            "password": "pw2",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Email already registered");

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/v1/auth/verify-otp",
        None,
        Some(json!({ "email": "ada@example.com", "token": "000000" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let code = app
        .store
        .find_by_email("ada@example.com")
        .await
        .unwrap()
        .unwrap()
        .verification
        .token
        .unwrap();
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/v1/auth/verify-otp",
        None,
        Some(json!({ "email": "ada@example.com", "token": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Email verified successfully");

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/v1/auth/verify-otp",
        None,
        Some(json!({ "email": "ghost@example.com", "token": "123456" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_input_is_rejected_in_envelope() {
    let app = app();

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({ "firstName": "Ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Validation failed");
    assert_eq!(body["errors"].as_array().map(Vec::len), Some(1));

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({
            "firstName": " ",
            "lastName": "Lovelace",
            "email": "not-an-email",
            "password": "",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
    assert_eq!(
        body["errors"],
        json!(["firstName is required", "Invalid email format", "password is required"])
    );
}

#[tokio::test]
async fn login_failure_is_401() {
    let app = app();
    app.register("ada@example.com", "pw1").await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/v1/auth/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");
}

#[tokio::test]
async fn password_reset_over_http() {
    let app = app();
    app.register("ada@example.com", "pw1").await;

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/v1/auth/forgot-password",
        None,
        Some(json!({ "email": "ghost@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/v1/auth/forgot-password",
        None,
        Some(json!({ "email": "ada@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "OTP sent to email");

    let otp = app
        .store
        .find_by_email("ada@example.com")
        .await
        .unwrap()
        .unwrap()
        .verification
        .reset_otp
        .unwrap();
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/v1/auth/reset/password/verify-otp",
        None,
        Some(json!({ "email": "ada@example.com", "otp": otp })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reset_token = body["data"]["resetToken"].as_str().unwrap().to_string();

    // an access token is not a reset token
    let access = app.login("ada@example.com", "pw1").await;
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/v1/auth/reset-password",
        Some(&access),
        Some(json!({ "newPassword": "pw-new" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/v1/auth/reset-password",
        None,
        Some(json!({ "newPassword": "pw-new" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // the token is checked before the body
    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/auth/reset-password")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/v1/auth/reset-password",
        Some(&reset_token),
        Some(json!({ "password": "pw-new" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/v1/auth/reset-password",
        Some(&reset_token),
        Some(json!({ "newPassword": "pw-new" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    app.login("ada@example.com", "pw-new").await;
}

#[tokio::test]
async fn protected_routes_require_access_token() {
    let app = app();

    let (status, body) = send(&app.router, Method::GET, "/v1/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No authorization token provided");

    let request = Request::builder()
        .uri("/v1/users/me")
        .header(header::AUTHORIZATION, "Token abc")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let reset = app.service.tokens().issue_reset("someone").unwrap();
    let (status, _) = send(&app.router, Method::GET, "/v1/users/me", Some(&reset), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_and_change_password() {
    let app = app();
    let user_id = app.register("ada@example.com", "pw1").await;
    let token = app.login("ada@example.com", "pw1").await;

    let (status, body) = send(&app.router, Method::GET, "/v1/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], user_id);
    assert_eq!(body["data"]["email"], "ada@example.com");
    assert!(body["data"].get("passwordHash").is_none());

    let (status, body) = send(
        &app.router,
        Method::PATCH,
        "/v1/users/me",
        Some(&token),
        Some(json!({ "firstName": "Augusta", "phoneNumber": "+44 20 0000 0000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["firstName"], "Augusta");
    assert_eq!(body["data"]["phoneNumber"], "+44 20 0000 0000");

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/v1/auth/change-password",
        Some(&token),
        Some(json!({ "oldPassword": "wrong", "newPassword": "pw2" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Old password is incorrect");

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/v1/auth/change-password",
        Some(&token),
        Some(json!({ "oldPassword": "pw1", "newPassword": "pw2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    app.login("ada@example.com", "pw2").await;
}

#[tokio::test]
async fn role_assignment_requires_admin() {
    let app = app();
    let admin_id = app.register("admin@example.com", "pw1").await;
    let user_id = app.register("user@example.com", "pw1").await;
    app.service.assign_role(&admin_id, Role::Admin).await.unwrap();

    let user_token = app.login("user@example.com", "pw1").await;
    let admin_token = app.login("admin@example.com", "pw1").await;
    let uri = format!("/v1/admin/users/{user_id}/role");

    let (status, _) = send(
        &app.router,
        Method::PUT,
        &uri,
        None,
        Some(json!({ "role": "moderator" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app.router,
        Method::PUT,
        &uri,
        Some(&user_token),
        Some(json!({ "role": "moderator" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, body) = send(
        &app.router,
        Method::PUT,
        &uri,
        Some(&admin_token),
        Some(json!({ "role": "moderator" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "moderator");

    let (status, _) = send(
        &app.router,
        Method::PUT,
        "/v1/admin/users/missing/role",
        Some(&admin_token),
        Some(json!({ "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
