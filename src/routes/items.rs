//! Item collection endpoints, mounted once per category (`/accessories`, `/tools`).

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::error::{AppError, AppJson};
use crate::models::item::{Category, ItemUpdate, MovementReq, NewItem};
use crate::rbac::{log_event, Action, AuthUser};
use crate::services::{import_service, item_service};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MovementBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: i64,
    pub reference: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemBody {
    pub description: Option<String>,
    pub unit: Option<String>,
    pub quantity_change: Option<i64>,
    pub change_type: Option<String>,
    pub reference: Option<String>,
}

impl UpdateItemBody {
    fn into_update(self) -> Result<ItemUpdate, AppError> {
        let movement = match (self.quantity_change, self.change_type) {
            (None, None) => None,
            (Some(quantity), kind) => Some(MovementReq::new(
                kind.as_deref().unwrap_or("IN"),
                quantity,
                self.reference,
            )?),
            (None, Some(_)) => return Err(AppError::InvalidQuantity),
        };
        Ok(ItemUpdate {
            description: self.description,
            unit: self.unit,
            movement,
        })
    }
}

async fn list_items(
    user: AuthUser,
    Extension(category): Extension<Category>,
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Action::ViewStock)?;
    let items = item_service::list_items(&pool, category).await?;
    Ok(Json(items))
}

async fn get_item(
    user: AuthUser,
    Extension(category): Extension<Category>,
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Action::ViewStock)?;
    let item = item_service::get_item(&pool, category, id).await?;
    Ok(Json(item))
}

async fn create_item(
    admin: AuthUser,
    Extension(category): Extension<Category>,
    State(pool): State<SqlitePool>,
    AppJson(req): AppJson<NewItem>,
) -> Result<impl IntoResponse, AppError> {
    admin.require(Action::ManageStock)?;
    let item = item_service::create_item(&pool, category, req).await?;
    log_event(
        &pool,
        Some(admin.id),
        "item.create",
        &format!("{} #{} '{}' opening={}", category.as_str(), item.id, item.description, item.stock_in),
    )
    .await;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_item(
    admin: AuthUser,
    Extension(category): Extension<Category>,
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    AppJson(req): AppJson<UpdateItemBody>,
) -> Result<impl IntoResponse, AppError> {
    admin.require(Action::ManageStock)?;
    let update = req.into_update()?;
    let moved = update
        .movement
        .as_ref()
        .map(|m| format!(" {} {}", m.kind.as_str(), m.quantity))
        .unwrap_or_default();
    let item = item_service::update_item(&pool, category, id, update).await?;
    log_event(
        &pool,
        Some(admin.id),
        "item.update",
        &format!("{} #{id}{moved}", category.as_str()),
    )
    .await;
    Ok(Json(item))
}

async fn apply_movement(
    admin: AuthUser,
    Extension(category): Extension<Category>,
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    AppJson(req): AppJson<MovementBody>,
) -> Result<impl IntoResponse, AppError> {
    admin.require(Action::ManageStock)?;
    let movement = MovementReq::new(&req.kind, req.quantity, req.reference)?;
    let details = format!("{} #{id} {} {}", category.as_str(), movement.kind.as_str(), movement.quantity);
    let item = item_service::apply_movement(&pool, category, id, movement).await?;
    log_event(&pool, Some(admin.id), "item.movement", &details).await;
    Ok(Json(item))
}

async fn delete_item(
    admin: AuthUser,
    Extension(category): Extension<Category>,
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    admin.require(Action::ManageStock)?;
    item_service::delete_item(&pool, category, id).await?;
    log_event(&pool, Some(admin.id), "item.delete", &format!("{} #{id}", category.as_str())).await;
    Ok(Json(serde_json::json!({ "ok": true, "message": "Item removed" })))
}

async fn import_items(
    admin: AuthUser,
    Extension(category): Extension<Category>,
    State(pool): State<SqlitePool>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    admin.require(Action::ManageStock)?;
    let rows = import_service::parse_rows(&body)?;
    let summary = import_service::import_items(&pool, category, rows).await?;
    log_event(
        &pool,
        Some(admin.id),
        "item.import",
        &format!(
            "{} created={} updated={}",
            category.as_str(),
            summary.created_count,
            summary.updated_count
        ),
    )
    .await;
    Ok(Json(summary))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/import", post(import_items))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
        .route("/:id/movements", post(apply_movement))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::MovementType;

    #[test]
    fn edit_without_quantity_has_no_movement() {
        let body = UpdateItemBody {
            unit: Some("box".into()),
            ..Default::default()
        };
        let update = body.into_update().unwrap();
        assert!(update.movement.is_none());
        assert_eq!(update.unit.as_deref(), Some("box"));
    }

    #[test]
    fn edit_with_quantity_carries_movement() {
        let body = UpdateItemBody {
            quantity_change: Some(4),
            change_type: Some("OUT".into()),
            reference: Some("WO-17".into()),
            ..Default::default()
        };
        let movement = body.into_update().unwrap().movement.unwrap();
        assert_eq!(movement.kind, MovementType::Out);
        assert_eq!(movement.quantity, 4);
        assert_eq!(movement.reference.as_deref(), Some("WO-17"));
    }

    #[test]
    fn edit_with_bad_movement_is_rejected() {
        let zero = UpdateItemBody {
            quantity_change: Some(0),
            ..Default::default()
        };
        assert!(matches!(zero.into_update(), Err(AppError::InvalidQuantity)));
        let bad_type = UpdateItemBody {
            quantity_change: Some(2),
            change_type: Some("SIDEWAYS".into()),
            ..Default::default()
        };
        assert!(matches!(bad_type.into_update(), Err(AppError::InvalidType)));
    }
}
