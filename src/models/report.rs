use serde::Serialize;

use super::item::{Category, Movement, StockItem};

#[derive(Debug, Serialize)]
pub struct AllStockReport {
    pub accessories: Vec<StockItem>,
    pub tools: Vec<StockItem>,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DangerousStockReport {
    pub dangerous_accessories: Vec<StockItem>,
    pub dangerous_tools: Vec<StockItem>,
    pub message: String,
}

/// Per-item totals restricted to a date window.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyReportRow {
    pub id: i64,
    pub description: String,
    pub unit: String,
    pub stock_in: i64,
    pub stock_out: i64,
    pub history_details: Vec<Movement>,
}

#[derive(Debug, Serialize)]
pub struct DailyReport {
    pub report: Vec<DailyReportRow>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DangerousEntry {
    pub id: i64,
    pub category: Category,
    pub description: String,
    pub unit: String,
    pub stock_in: i64,
    pub total_stock: i64,
    /// Remaining stock as a percentage of everything received; absent when nothing was received.
    pub percentage: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSummary {
    pub total_accessories: i64,
    pub total_tools: i64,
    pub dangerous_items: usize,
    /// Sorted by ascending percentage remaining.
    pub dangerous: Vec<DangerousEntry>,
}
