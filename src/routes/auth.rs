use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::error::{AppError, AppJson};
use crate::models::user::{CreateUserReq, LoginUserReq, UpdateUserReq};
use crate::rbac::{log_event, Action, AuthUser};
use crate::services::auth_service::{self, PasswordHasher};
use crate::services::token_service::AuthKeys;
use crate::AppState;

async fn login(
    State(pool): State<SqlitePool>,
    State(keys): State<Arc<AuthKeys>>,
    State(hasher): State<Arc<PasswordHasher>>,
    AppJson(req): AppJson<LoginUserReq>,
) -> Result<impl IntoResponse, AppError> {
    match auth_service::login(&pool, &keys, &hasher, &req).await {
        Ok(resp) => {
            tracing::info!(user_id = resp.id, "login succeeded");
            Ok(Json(resp))
        }
        Err(e) => {
            if matches!(e, AppError::InvalidCredentials) {
                tracing::info!(username = %req.username, "login rejected");
            }
            Err(e)
        }
    }
}

async fn me(user: AuthUser) -> Result<impl IntoResponse, AppError> {
    user.require(Action::ViewSelf)?;
    Ok(Json(serde_json::json!({ "user": user })))
}

async fn register(
    admin: AuthUser,
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateUserReq>,
) -> Result<impl IntoResponse, AppError> {
    admin.require(Action::ManageUsers)?;
    let user = auth_service::register_user(&state.pool, req, &state.hasher).await?;
    log_event(
        &state.pool,
        Some(admin.id),
        "user.create",
        &format!("{} ({})", user.username, user.role.as_str()),
    )
    .await;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(admin: AuthUser, State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    admin.require(Action::ManageUsers)?;
    let users = auth_service::list_users(&pool).await?;
    Ok(Json(users))
}

async fn update_user(
    admin: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    AppJson(req): AppJson<UpdateUserReq>,
) -> Result<impl IntoResponse, AppError> {
    admin.require(Action::ManageUsers)?;
    let password_changed = req.password.as_deref().is_some_and(|p| !p.is_empty());
    let user = auth_service::update_user(&state.pool, user_id, req, &state.hasher).await?;
    log_event(
        &state.pool,
        Some(admin.id),
        "user.update",
        &format!(
            "{} role={} password_changed={password_changed}",
            user.username,
            user.role.as_str()
        ),
    )
    .await;
    Ok(Json(user))
}

async fn delete_user(
    admin: AuthUser,
    State(pool): State<SqlitePool>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    admin.require(Action::ManageUsers)?;
    auth_service::delete_user(&pool, user_id).await?;
    log_event(&pool, Some(admin.id), "user.delete", &format!("id={user_id}")).await;
    Ok(Json(serde_json::json!({ "ok": true, "message": "User removed" })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/register", post(register))
        .route("/auth/users", get(list_users))
        .route("/auth/users/:id", put(update_user).delete(delete_user))
}
