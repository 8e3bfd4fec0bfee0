use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::now_millis;
use crate::error::AppError;
use crate::models::user::Role;
use crate::services::{auth_service, token_service::AuthKeys};

/// Everything a handler may ask permission for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewSelf,
    ViewStock,
    ViewReports,
    ManageStock,
    ManageUsers,
}

/// Capability check shared by every route.
pub fn authorize(role: Role, action: Action) -> Result<(), AppError> {
    let allowed = match action {
        Action::ViewSelf | Action::ViewStock | Action::ViewReports => true,
        Action::ManageStock | Action::ManageUsers => role == Role::Admin,
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::InsufficientRole)
    }
}

/// Identity resolved from the bearer token of the current request.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn require(&self, action: Action) -> Result<(), AppError> {
        authorize(self.role, action).inspect_err(|_| {
            tracing::warn!(user_id = self.id, ?action, "permission denied");
        })
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::NoToken)?;
    let token = match header.strip_prefix("Bearer ") {
        Some(rest) => rest.trim(),
        None if header.trim() == "Bearer" => "",
        None => return Err(AppError::NoToken),
    };
    if token.is_empty() {
        return Err(AppError::InvalidToken);
    }
    Ok(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
    Arc<AuthKeys>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let keys = Arc::<AuthKeys>::from_ref(state);
        let claims = keys.verify(token)?;

        // The account may have been removed or re-roled since the token was issued.
        let pool = SqlitePool::from_ref(state);
        let user = auth_service::find_user(&pool, claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)?;
        Ok(AuthUser {
            id: user.id,
            username: user.username,
            role: user.role,
        })
    }
}

/// Appends an audit record. Failures are logged, never surfaced to the caller.
pub async fn log_event(pool: &SqlitePool, user_id: Option<i64>, action: &str, details: &str) {
    let res = sqlx::query("INSERT INTO event_logs (user_id, action, details, created_at) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(action)
        .bind(details)
        .bind(now_millis())
        .execute(pool)
        .await;
    if let Err(e) = res {
        tracing::warn!(error = %e, action, "audit log write failed");
    }
}
