//! Router-level checks that never reach the database: authentication,
//! parameter validation and the bulk download gate.
//!
//! Run with: cargo test --test api_test

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use farm_data_api::auth::AuthenticatedUser;
use farm_data_api::common::AppState;
use farm_data_api::config::Config;
use farm_data_api::routes::build_router;
use sea_orm::DatabaseConnection;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

fn state_with(config: Config) -> AppState {
    AppState::new(
        DatabaseConnection::Disconnected,
        Config {
            disable_rate_limiting: true,
            ..config
        },
    )
}

fn app(state: &AppState) -> Router {
    build_router(state.clone()).unwrap()
}

async fn token_for(state: &AppState, is_staff: bool) -> String {
    let (token, _) = state
        .auth
        .issue(AuthenticatedUser {
            id: Uuid::new_v4(),
            email: "farmer@example.org".to_string(),
            is_staff,
        })
        .await;
    token
}

async fn get(app: Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let response = app
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn post_json(app: Router, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let response = app
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn healthz_is_public() {
    let state = state_with(Config::default());
    let (status, body) = get(app(&state), "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn data_endpoints_require_a_token() {
    let state = state_with(Config::default());
    for uri in [
        "/api/environmental/",
        "/api/charts/averaged/rainfall/",
        "/api/raw-data/rainfall/",
        "/api/charts/statistical/boxplot/",
        "/api/download/",
        "/api/auth/me/",
    ] {
        let (status, body) = get(app(&state), uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["success"], false);
    }

    let (status, _) = get(app(&state), "/api/charts/averaged/rainfall/", Some("bogus")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_parameters_are_rejected_before_querying() {
    let state = state_with(Config::default());
    let token = token_for(&state, false).await;

    let cases = [
        ("/api/charts/averaged/not_a_metric/", "metric"),
        ("/api/charts/averaged/rainfall/?start_date=2024-13-01", "start_date"),
        ("/api/charts/averaged/rainfall/?start_date=01-02-2024", "start_date"),
        (
            "/api/charts/averaged/rainfall/?start_date=2024-06-10&end_date=2024-06-01",
            "end_date",
        ),
        ("/api/charts/averaged/rainfall/?month=13", "month"),
        ("/api/charts/averaged/rainfall/?group_by=fortnight", "group_by"),
        ("/api/charts/averaged/soil_temperature/?depth=7cm", "depth"),
        ("/api/raw-data/rainfall/?limit=10001", "limit"),
        ("/api/raw-data/rainfall/?limit=abc", "limit"),
        ("/api/charts/statistical/correlation/?metrics=rainfall", "metrics"),
        ("/api/charts/statistical/boxplot/?metrics=rainfall,unknown", "metrics"),
        ("/api/charts/statistical/histogram/?bins=0", "bins"),
        ("/api/download/?format=xml", "format"),
    ];
    for (uri, param) in cases {
        let (status, body) = get(app(&state), uri, Some(&token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["success"], false, "{uri}");
        assert_eq!(body["param"], param, "{uri}");
    }
}

#[tokio::test]
async fn metric_list_endpoints_read_the_soil_depth() {
    let state = state_with(Config::default());
    let token = token_for(&state, false).await;

    for uri in [
        "/api/charts/statistical/boxplot/?metrics=soil_temperature&depth=7cm",
        "/api/charts/statistical/boxplot/periods/?metrics=soil_temperature&depth=7cm",
        "/api/charts/statistical/histogram/?metrics=soil_temperature&depth=7cm",
        "/api/charts/statistical/correlation/?metrics=soil_temperature,rainfall&depth=7cm",
        "/api/raw-data/multi-metric/?metrics=soil_temperature&depth=7cm",
        "/api/download/?fields=soil_temperature&depth=7cm",
    ] {
        let (status, body) = get(app(&state), uri, Some(&token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["param"], "depth", "{uri}");
    }
}

#[tokio::test]
async fn limit_message_points_at_date_filters() {
    let state = state_with(Config::default());
    let token = token_for(&state, false).await;
    let (_, body) = get(app(&state), "/api/raw-data/rainfall/?limit=20000", Some(&token)).await;
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("10000"));
    assert!(error.contains("start_date"));
}

#[tokio::test]
async fn downloads_are_refused_when_no_permits_remain() {
    let state = state_with(Config {
        bulk_concurrent_limit: 0,
        ..Config::default()
    });
    let token = token_for(&state, false).await;
    let (status, body) = get(app(&state), "/api/download/?format=csv", Some(&token)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn me_returns_the_session_user() {
    let state = state_with(Config::default());
    let token = token_for(&state, true).await;
    let (status, body) = get(app(&state), "/api/auth/me/", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "farmer@example.org");
    assert_eq!(body["user"]["is_staff"], true);
}

#[tokio::test]
async fn admin_dashboard_is_staff_only() {
    let state = state_with(Config::default());
    let member = token_for(&state, false).await;
    let staff = token_for(&state, true).await;

    let (status, _) = get(app(&state), "/api/admin/dashboard/", Some(&member)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = get(app(&state), "/api/admin/dashboard/", Some(&staff)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Welcome, Admin!");
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let state = state_with(Config::default());
    let token = token_for(&state, false).await;

    let (status, _) = post_json(app(&state), "/api/auth/logout/", Some(&token), Value::Null).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(app(&state), "/api/auth/me/", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_validates_input_first() {
    let state = state_with(Config::default());

    let (status, body) = post_json(
        app(&state),
        "/api/auth/register/",
        None,
        serde_json::json!({ "email": "not-an-email", "password": "secret" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Enter a valid email address.");

    let (status, body) = post_json(
        app(&state),
        "/api/auth/register/",
        None,
        serde_json::json!({ "email": "farmer@example.org", "password": "  " }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password cannot be blank");
}

#[tokio::test]
async fn email_tests_require_a_recipient() {
    let state = state_with(Config::default());
    let token = token_for(&state, false).await;

    let (status, body) = post_json(
        app(&state),
        "/api/email/test/",
        Some(&token),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email is required");

    let (status, body) = post_json(
        app(&state),
        "/api/email/test-multiple/",
        Some(&token),
        serde_json::json!({ "email": "farmer@example.org" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "email_host_user and email_host_password are required"
    );
}
