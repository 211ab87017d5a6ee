#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use smartbox_api::actuator::LoggingActuator;
use smartbox_api::auth::jwt::JwtConfig;
use smartbox_api::config::ServerConfig;
use smartbox_api::middleware::payment_secret::PAYMENT_SECRET_HEADER;
use smartbox_api::router::build_app_router;
use smartbox_api::state::AppState;
use smartbox_core::actuator::{CompartmentActuator, OpenReason};
use smartbox_core::error::CoreError;
use smartbox_core::roles::Role;
use smartbox_core::types::DbId;
use sqlx::PgPool;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const TEST_PAYMENT_SECRET: &str = "test-payment-secret";

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            token_ttl_mins: 15,
            leeway_secs: 0,
        },
        payment_callback_secret: TEST_PAYMENT_SECRET.to_string(),
        sweep_interval_secs: 300,
        shared_key_retention_days: 7,
    }
}

/// Build the full application router, with the production middleware stack,
/// around the given pool and a logging actuator.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_actuator(pool, Arc::new(LoggingActuator))
}

pub fn build_test_app_with_actuator(pool: PgPool, actuator: Arc<dyn CompartmentActuator>) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        actuator,
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// Records every open signal it receives.
#[derive(Default)]
pub struct RecordingActuator {
    pub opened: Mutex<Vec<(DbId, OpenReason)>>,
}

impl RecordingActuator {
    pub fn opened(&self) -> Vec<(DbId, OpenReason)> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompartmentActuator for RecordingActuator {
    async fn open(&self, compartment_id: DbId, reason: OpenReason) -> Result<(), CoreError> {
        self.opened.lock().unwrap().push((compartment_id, reason));
        Ok(())
    }
}

/// Simulates an unreachable compartment.
pub struct FailingActuator;

#[async_trait]
impl CompartmentActuator for FailingActuator {
    async fn open(&self, compartment_id: DbId, _reason: OpenReason) -> Result<(), CoreError> {
        Err(CoreError::Upstream(format!(
            "compartment {compartment_id} did not acknowledge"
        )))
    }
}

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// A seeded user plus a bearer token for them.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: DbId,
    pub phone: String,
    pub token: String,
}

pub async fn seed_user(pool: &PgPool, phone: &str) -> TestUser {
    seed_user_with_role(pool, phone, Role::User).await
}

pub async fn seed_admin(pool: &PgPool, phone: &str) -> TestUser {
    seed_user_with_role(pool, phone, Role::Admin).await
}

async fn seed_user_with_role(pool: &PgPool, phone: &str, role: Role) -> TestUser {
    let (id,): (DbId,) = sqlx::query_as(
        "INSERT INTO users (name, phone_number, role) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(format!("User {phone}"))
    .bind(phone)
    .bind(role.as_str())
    .fetch_one(pool)
    .await
    .unwrap();
    TestUser {
        id,
        phone: phone.to_string(),
        token: token_for(id, phone, role),
    }
}

pub fn token_for(user_id: DbId, phone: &str, role: Role) -> String {
    test_config()
        .jwt
        .issue(user_id, phone, role, chrono::Utc::now())
        .unwrap()
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Seed a location/size/locker chain with one available compartment.
pub async fn seed_compartment(
    pool: &PgPool,
    base_rate: Decimal,
    multiplier: Option<Decimal>,
) -> DbId {
    let (location_id,): (DbId,) = sqlx::query_as(
        "INSERT INTO locations (name, address, multiplier) VALUES ('Depot', '1 Main St', $1) RETURNING id",
    )
    .bind(multiplier)
    .fetch_one(pool)
    .await
    .unwrap();
    let (size_id,): (DbId,) =
        sqlx::query_as("INSERT INTO sizes (name, price_per_hour) VALUES ('M', $1) RETURNING id")
            .bind(base_rate)
            .fetch_one(pool)
            .await
            .unwrap();
    let (locker_id,): (DbId,) =
        sqlx::query_as("INSERT INTO lockers (code, location_id) VALUES ($1, $2) RETURNING id")
            .bind(format!("LK-{location_id}"))
            .bind(location_id)
            .fetch_one(pool)
            .await
            .unwrap();
    let (compartment_id,): (DbId,) = sqlx::query_as(
        "INSERT INTO compartments (locker_id, size_id, code) VALUES ($1, $2, 'A1') RETURNING id",
    )
    .bind(locker_id)
    .bind(size_id)
    .fetch_one(pool)
    .await
    .unwrap();
    compartment_id
}

pub async fn compartment_status(pool: &PgPool, compartment_id: DbId) -> i16 {
    let (status_id,): (i16,) = sqlx::query_as("SELECT status_id FROM compartments WHERE id = $1")
        .bind(compartment_id)
        .fetch_one(pool)
        .await
        .unwrap();
    status_id
}

/// Move a rent's start back in time, as if it had been created earlier.
pub async fn backdate_rent(pool: &PgPool, rent_id: DbId, by: chrono::Duration) {
    sqlx::query(
        "UPDATE rents SET start_time = start_time - make_interval(secs => $2) WHERE id = $1",
    )
    .bind(rent_id)
    .bind(by.num_seconds() as f64)
    .execute(pool)
    .await
    .unwrap();
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: &Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn get_anonymous(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json(
    app: &Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn put(app: &Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), None).await
}

pub async fn delete(app: &Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

/// POST to the payment callback with the given shared secret.
pub async fn post_callback(app: &Router, secret: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/payments/callback")
        .header("Content-Type", "application/json")
        .header(PAYMENT_SECRET_HEADER, secret)
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Create an open-ended rent through the API and return its id.
pub async fn create_short_term(app: &Router, user: &TestUser, compartment_id: DbId) -> DbId {
    let response = post_json(
        app,
        "/api/v1/rents",
        &user.token,
        serde_json::json!({ "compartment_id": compartment_id }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

/// Create a long-term rent through the API and return its id.
pub async fn create_long_term(app: &Router, user: &TestUser, compartment_id: DbId, hours: i32) -> DbId {
    let response = post_json(
        app,
        "/api/v1/rents",
        &user.token,
        serde_json::json!({ "compartment_id": compartment_id, "rental_hours": hours }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}
