//! Bulk item import from a CSV sheet with `Description`, `Unit`, `Stock In` columns.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::begin_write;
use crate::error::AppError;
use crate::models::item::{Category, MovementReq, MovementType, NewItem};
use crate::services::item_service;

pub const IMPORT_REFERENCE: &str = "Import";

#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub description: String,
    pub unit: String,
    pub stock_in: i64,
}

#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported_count: usize,
    pub created_count: usize,
    pub updated_count: usize,
}

/// "Stock In " -> "stockin"
fn normalize_header(h: &str) -> String {
    h.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn parse_rows(text: &str) -> Result<Vec<ImportRow>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::Validation(format!("Unreadable import file: {e}")))?
        .iter()
        .map(normalize_header)
        .collect();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let (Some(desc_idx), Some(unit_idx), Some(stock_idx)) =
        (column("description"), column("unit"), column("stockin"))
    else {
        return Err(AppError::Validation(
            "Import file must contain Description, Unit and Stock In columns".into(),
        ));
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AppError::Validation(format!("Unreadable import row: {e}")))?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let description = record.get(desc_idx).unwrap_or_default();
        if description.is_empty() {
            continue;
        }
        let raw_stock = record.get(stock_idx).unwrap_or_default();
        let stock_in = if raw_stock.is_empty() {
            0
        } else {
            raw_stock
                .parse::<i64>()
                .ok()
                .filter(|n| *n >= 0)
                .ok_or_else(|| AppError::Validation(format!("Line {line}: invalid Stock In value '{raw_stock}'")))?
        };
        rows.push(ImportRow {
            description: description.to_string(),
            unit: record.get(unit_idx).unwrap_or_default().to_string(),
            stock_in,
        });
    }
    Ok(rows)
}

/// Merges rows into `category` in one transaction: a known description gets its
/// `stock_in` added as an IN movement, an unknown one becomes a new item.
pub async fn import_items(pool: &SqlitePool, category: Category, rows: Vec<ImportRow>) -> Result<ImportSummary, AppError> {
    let mut summary = ImportSummary::default();
    let mut tx = begin_write(pool).await?;
    for row in rows {
        match item_service::find_by_description(&mut tx, category, &row.description).await? {
            Some(id) => {
                if row.stock_in > 0 {
                    let movement = MovementReq {
                        kind: MovementType::In,
                        quantity: row.stock_in,
                        reference: Some(IMPORT_REFERENCE.to_string()),
                    };
                    item_service::record_movement(&mut tx, category, id, &movement).await?;
                }
                summary.updated_count += 1;
            }
            None => {
                let new = NewItem {
                    description: row.description,
                    unit: row.unit,
                    initial_stock: row.stock_in,
                };
                item_service::insert_item(&mut tx, category, &new).await?;
                summary.created_count += 1;
            }
        }
        summary.imported_count += 1;
    }
    tx.commit().await?;
    tracing::info!(
        category = category.as_str(),
        imported = summary.imported_count,
        created = summary.created_count,
        updated = summary.updated_count,
        "import finished"
    );
    Ok(summary)
}
