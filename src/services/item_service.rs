//! Stock item ledger: item records, their movement history and the counters derived from it.
//!
//! Every write runs in one transaction per item. Counters are bumped with a single
//! `UPDATE ... SET x = x + ?`, never read-modify-write.

use std::collections::HashMap;

use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};

use crate::db::{begin_write, from_millis, now_millis};
use crate::error::{is_unique_violation, AppError};
use crate::models::item::{Category, ItemUpdate, Movement, MovementReq, MovementType, NewItem, StockItem};

pub const OPENING_BALANCE_REFERENCE: &str = "Opening balance";

const ITEM_COLUMNS: &str =
    "id, category, description, unit, stock_in, stock_out, total_stock, created_at";

fn item_from_row(row: &SqliteRow) -> Result<StockItem, AppError> {
    let category: String = row.try_get("category")?;
    Ok(StockItem {
        id: row.try_get("id")?,
        category: Category::parse(&category)?,
        description: row.try_get("description")?,
        unit: row.try_get("unit")?,
        stock_in: row.try_get("stock_in")?,
        stock_out: row.try_get("stock_out")?,
        total_stock: row.try_get("total_stock")?,
        created_at: from_millis(row.try_get("created_at")?),
        stock_history: Vec::new(),
    })
}

fn movement_from_row(row: &SqliteRow) -> Result<Movement, AppError> {
    let kind: String = row.try_get("kind")?;
    Ok(Movement {
        kind: MovementType::parse(&kind)?,
        quantity: row.try_get("quantity")?,
        date: from_millis(row.try_get("occurred_at")?),
        reference: row.try_get("reference")?,
    })
}

async fn fetch_item(conn: &mut SqliteConnection, category: Category, id: i64) -> Result<Option<StockItem>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM stock_items WHERE id = ? AND category = ?"
    ))
    .bind(id)
    .bind(category.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut item = item_from_row(&row)?;

    let rows = sqlx::query(
        "SELECT kind, quantity, occurred_at, reference FROM stock_movements WHERE item_id = ? ORDER BY id",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    item.stock_history = rows.iter().map(movement_from_row).collect::<Result<_, _>>()?;
    Ok(Some(item))
}

async fn fetch_category(conn: &mut SqliteConnection, category: Category) -> Result<Vec<StockItem>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM stock_items WHERE category = ? ORDER BY id"
    ))
    .bind(category.as_str())
    .fetch_all(&mut *conn)
    .await?;
    let mut items = rows.iter().map(item_from_row).collect::<Result<Vec<_>, _>>()?;

    let rows = sqlx::query(
        r#"
        SELECT m.item_id, m.kind, m.quantity, m.occurred_at, m.reference
        FROM stock_movements m
        JOIN stock_items i ON i.id = m.item_id
        WHERE i.category = ?
        ORDER BY m.id
        "#,
    )
    .bind(category.as_str())
    .fetch_all(&mut *conn)
    .await?;
    let mut history: HashMap<i64, Vec<Movement>> = HashMap::new();
    for row in &rows {
        let item_id: i64 = row.try_get("item_id")?;
        history.entry(item_id).or_default().push(movement_from_row(row)?);
    }
    for item in &mut items {
        item.stock_history = history.remove(&item.id).unwrap_or_default();
    }
    Ok(items)
}

/// Id of the item carrying `description` in `category`, if any.
pub(crate) async fn find_by_description(
    conn: &mut SqliteConnection,
    category: Category,
    description: &str,
) -> Result<Option<i64>, AppError> {
    let id = sqlx::query_scalar("SELECT id FROM stock_items WHERE category = ? AND description = ?")
        .bind(category.as_str())
        .bind(description)
        .fetch_optional(conn)
        .await?;
    Ok(id)
}

/// Inserts the item row and, for a positive opening balance, its synthetic IN movement.
pub(crate) async fn insert_item(conn: &mut SqliteConnection, category: Category, new: &NewItem) -> Result<i64, AppError> {
    let description = new.description.trim();
    if description.is_empty() {
        return Err(AppError::Validation("Description is required".into()));
    }
    if new.initial_stock < 0 {
        return Err(AppError::InvalidQuantity);
    }
    let now = now_millis();
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO stock_items (category, description, unit, stock_in, stock_out, total_stock, created_at)
        VALUES (?, ?, ?, ?, 0, ?, ?)
        RETURNING id
        "#,
    )
    .bind(category.as_str())
    .bind(description)
    .bind(new.unit.trim())
    .bind(new.initial_stock)
    .bind(new.initial_stock)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::DuplicateItem(description.to_string())
        } else {
            e.into()
        }
    })?;

    if new.initial_stock > 0 {
        insert_movement(conn, id, MovementType::In, new.initial_stock, Some(OPENING_BALANCE_REFERENCE), now).await?;
    }
    Ok(id)
}

async fn insert_movement(
    conn: &mut SqliteConnection,
    item_id: i64,
    kind: MovementType,
    quantity: i64,
    reference: Option<&str>,
    at: i64,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO stock_movements (item_id, kind, quantity, occurred_at, reference) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(item_id)
    .bind(kind.as_str())
    .bind(quantity)
    .bind(at)
    .bind(reference)
    .execute(conn)
    .await?;
    Ok(())
}

/// Bumps the counters and appends the movement. OUT movements may not exceed the stock on hand
/// and IN movements may not push `stock_in` past `i64::MAX`.
pub(crate) async fn record_movement(
    conn: &mut SqliteConnection,
    category: Category,
    id: i64,
    movement: &MovementReq,
) -> Result<(), AppError> {
    let (in_delta, out_delta) = movement.kind.deltas(movement.quantity);
    let res = sqlx::query(
        r#"
        UPDATE stock_items
        SET stock_in = stock_in + ?, stock_out = stock_out + ?, total_stock = total_stock + ? - ?
        WHERE id = ? AND category = ? AND total_stock >= ? AND stock_in <= ? - ?
        "#,
    )
    .bind(in_delta)
    .bind(out_delta)
    .bind(in_delta)
    .bind(out_delta)
    .bind(id)
    .bind(category.as_str())
    .bind(out_delta)
    .bind(i64::MAX)
    .bind(in_delta)
    .execute(&mut *conn)
    .await?;

    if res.rows_affected() == 0 {
        let available: Option<i64> =
            sqlx::query_scalar("SELECT total_stock FROM stock_items WHERE id = ? AND category = ?")
                .bind(id)
                .bind(category.as_str())
                .fetch_optional(&mut *conn)
                .await?;
        return Err(match available {
            None => AppError::ItemNotFound,
            Some(available) if available < out_delta => AppError::InsufficientStock {
                available,
                requested: movement.quantity,
            },
            // stock_in would pass i64::MAX
            Some(_) => AppError::Validation("Quantity exceeds the largest stock this item can hold".into()),
        });
    }

    insert_movement(conn, id, movement.kind, movement.quantity, movement.reference.as_deref(), now_millis()).await
}

pub async fn list_items(pool: &SqlitePool, category: Category) -> Result<Vec<StockItem>, AppError> {
    let mut tx = pool.begin().await?;
    let items = fetch_category(&mut tx, category).await?;
    tx.commit().await?;
    Ok(items)
}

pub async fn get_item(pool: &SqlitePool, category: Category, id: i64) -> Result<StockItem, AppError> {
    let mut tx = pool.begin().await?;
    let item = fetch_item(&mut tx, category, id).await?.ok_or(AppError::ItemNotFound)?;
    tx.commit().await?;
    Ok(item)
}

pub async fn create_item(pool: &SqlitePool, category: Category, new: NewItem) -> Result<StockItem, AppError> {
    let mut tx = begin_write(pool).await?;
    let id = insert_item(&mut tx, category, &new).await?;
    let item = fetch_item(&mut tx, category, id).await?.ok_or(AppError::ItemNotFound)?;
    tx.commit().await?;
    tracing::info!(category = category.as_str(), id, description = %item.description, "item created");
    Ok(item)
}

/// Edits description/unit and optionally applies a movement, all in one transaction.
pub async fn update_item(
    pool: &SqlitePool,
    category: Category,
    id: i64,
    update: ItemUpdate,
) -> Result<StockItem, AppError> {
    let description = match update.description.as_deref().map(str::trim) {
        Some("") => return Err(AppError::Validation("Description is required".into())),
        other => other,
    };
    let unit = update.unit.as_deref().map(str::trim);

    let mut tx = begin_write(pool).await?;
    let res = sqlx::query(
        r#"
        UPDATE stock_items
        SET description = COALESCE(?, description), unit = COALESCE(?, unit)
        WHERE id = ? AND category = ?
        "#,
    )
    .bind(description)
    .bind(unit)
    .bind(id)
    .bind(category.as_str())
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::DuplicateItem(description.unwrap_or_default().to_string())
        } else {
            e.into()
        }
    })?;
    if res.rows_affected() == 0 {
        return Err(AppError::ItemNotFound);
    }
    if let Some(movement) = &update.movement {
        record_movement(&mut tx, category, id, movement).await?;
    }
    let item = fetch_item(&mut tx, category, id).await?.ok_or(AppError::ItemNotFound)?;
    tx.commit().await?;
    Ok(item)
}

pub async fn apply_movement(
    pool: &SqlitePool,
    category: Category,
    id: i64,
    movement: MovementReq,
) -> Result<StockItem, AppError> {
    let mut tx = begin_write(pool).await?;
    record_movement(&mut tx, category, id, &movement).await?;
    let item = fetch_item(&mut tx, category, id).await?.ok_or(AppError::ItemNotFound)?;
    tx.commit().await?;
    tracing::debug!(
        category = category.as_str(),
        id,
        kind = movement.kind.as_str(),
        quantity = movement.quantity,
        total = item.total_stock,
        "movement applied"
    );
    Ok(item)
}

pub async fn delete_item(pool: &SqlitePool, category: Category, id: i64) -> Result<(), AppError> {
    let mut tx = begin_write(pool).await?;
    sqlx::query(
        "DELETE FROM stock_movements WHERE item_id IN (SELECT id FROM stock_items WHERE id = ? AND category = ?)",
    )
    .bind(id)
    .bind(category.as_str())
    .execute(&mut *tx)
    .await?;
    let res = sqlx::query("DELETE FROM stock_items WHERE id = ? AND category = ?")
        .bind(id)
        .bind(category.as_str())
        .execute(&mut *tx)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::ItemNotFound);
    }
    tx.commit().await?;
    Ok(())
}
