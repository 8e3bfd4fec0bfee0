use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::item::Category;
use crate::rbac::{Action, AuthUser};
use crate::services::report_service::{self, DateRange};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

async fn all_stock(user: AuthUser, State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    user.require(Action::ViewReports)?;
    Ok(Json(report_service::all_stock(&pool).await?))
}

async fn dangerous_stock(user: AuthUser, State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    user.require(Action::ViewReports)?;
    Ok(Json(report_service::dangerous_stock(&pool).await?))
}

async fn daily_stock(
    user: AuthUser,
    State(pool): State<SqlitePool>,
    Path(item_type): Path<String>,
    Query(q): Query<DailyQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Action::ViewReports)?;
    let range = DateRange::parse(q.start_date.as_deref(), q.end_date.as_deref())?;
    let category = Category::parse(&item_type)?;
    Ok(Json(report_service::daily_report(&pool, category, range).await?))
}

async fn summary(user: AuthUser, State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    user.require(Action::ViewReports)?;
    Ok(Json(report_service::summary(&pool).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reports/all", get(all_stock))
        .route("/reports/dangerous", get(dangerous_stock))
        .route("/reports/daily/:item_type", get(daily_stock))
        .route("/reports/summary", get(summary))
}
