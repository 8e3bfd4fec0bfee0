#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt; // for `app.oneshot()`

use stock_ford_extension::{
    db,
    models::user::{CreateUserReq, Role},
    services::auth_service::{self, PasswordHasher},
    services::token_service::AuthKeys,
    AppState,
};

pub const TEST_COST: u32 = 4;
pub const ADMIN_PASSWORD: &str = "admin-pass";
pub const USER_PASSWORD: &str = "user-pass";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub admin_id: i64,
    pub admin_token: String,
    pub user_id: i64,
    pub user_token: String,
}

pub fn test_keys() -> AuthKeys {
    AuthKeys::new("integration-secret", Duration::days(30))
}

pub fn test_hasher() -> PasswordHasher {
    PasswordHasher::new(TEST_COST).unwrap()
}

pub async fn test_pool() -> SqlitePool {
    let pool = db::connect_in_memory().await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

/// Multi-connection pool over a database file, for tests that need real write contention.
/// Keep the `TempDir` alive for as long as the pool is used.
pub async fn file_pool() -> (tempfile::TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stock.db");
    let pool = db::connect(path.to_str().unwrap()).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    (dir, pool)
}

pub async fn spawn() -> TestApp {
    let state = AppState::new(test_pool().await, test_keys(), test_hasher());

    let admin = auth_service::register_user(
        &state.pool,
        CreateUserReq {
            username: "admin".into(),
            password: ADMIN_PASSWORD.into(),
            role: Role::Admin,
        },
        &state.hasher,
    )
    .await
    .unwrap();
    let user = auth_service::register_user(
        &state.pool,
        CreateUserReq {
            username: "clerk".into(),
            password: USER_PASSWORD.into(),
            role: Role::User,
        },
        &state.hasher,
    )
    .await
    .unwrap();

    let admin_token = state.keys.issue(admin.id, admin.role).unwrap();
    let user_token = state.keys.issue(user.id, user.role).unwrap();

    TestApp {
        app: stock_ford_extension::app(state.clone()),
        state,
        admin_id: admin.id,
        admin_token,
        user_id: user.id,
        user_token,
    }
}

impl TestApp {
    pub fn pool(&self) -> &SqlitePool {
        &self.state.pool
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn send_text(&self, uri: &str, token: &str, text: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "text/csv")
            .body(Body::from(text.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Creates an item through the API as the admin and returns its id.
    pub async fn create_item(&self, collection: &str, description: &str, initial_stock: i64) -> i64 {
        let (status, body) = self
            .post(
                &format!("/api/{collection}"),
                &self.admin_token,
                serde_json::json!({
                    "description": description,
                    "unit": "pcs",
                    "initialStock": initial_stock
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    pub async fn move_stock(&self, collection: &str, id: i64, kind: &str, quantity: i64) -> (StatusCode, Value) {
        self.post(
            &format!("/api/{collection}/{id}/movements"),
            &self.admin_token,
            serde_json::json!({ "type": kind, "quantity": quantity }),
        )
        .await
    }
}
