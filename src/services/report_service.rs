//! Read-only views over the ledger: full snapshot, dangerous stock, windowed daily totals.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::item::{Category, MovementType, StockItem};
use crate::models::report::{
    AllStockReport, DailyReport, DailyReportRow, DangerousEntry, DangerousStockReport, StockSummary,
};
use crate::services::item_service;

/// Remaining stock below this percentage of everything received is dangerous.
pub const DANGER_PERCENT: i64 = 20;

pub fn is_dangerous(item: &StockItem) -> bool {
    if item.stock_in == 0 {
        return false;
    }
    // integer form of `total < in * 0.20`, widened so no counter value can overflow
    i128::from(item.total_stock) * 100 < i128::from(item.stock_in) * i128::from(DANGER_PERCENT)
}

/// `total / in * 100` to one decimal; `None` when nothing was ever received.
pub fn percentage_remaining(item: &StockItem) -> Option<f64> {
    if item.stock_in == 0 {
        return None;
    }
    let pct = item.total_stock as f64 / item.stock_in as f64 * 100.0;
    Some((pct * 10.0).round() / 10.0)
}

/// Sum that pins at `i64::MAX` instead of overflowing.
fn saturating_sum(values: impl Iterator<Item = i64>) -> i64 {
    values.fold(0, i64::saturating_add)
}

pub fn dangerous_items(items: &[StockItem]) -> Vec<StockItem> {
    items.iter().filter(|i| is_dangerous(i)).cloned().collect()
}

/// Inclusive instant range; `end` is the last millisecond of the requested end day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, AppError> {
        let (Some(start), Some(end)) = (non_blank(start), non_blank(end)) else {
            return Err(AppError::MissingDateRange);
        };
        let start = parse_instant(start)?;
        let end = end_of_day(parse_instant(end)?.date_naive());
        if start > end {
            return Err(AppError::Validation("startDate must not be after endDate".into()));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// `YYYY-MM-DD` is midnight UTC of that day; anything else must be RFC 3339.
fn parse_instant(s: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::default())));
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::Validation(format!("Invalid date '{s}'")))
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last_milli = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or_default();
    Utc.from_utc_datetime(&date.and_time(last_milli))
}

/// Filter each history to the window, then group per item and sum by type.
/// Items without a movement inside the window are left out.
pub fn daily_aggregation(items: &[StockItem], range: &DateRange) -> Vec<DailyReportRow> {
    items
        .iter()
        .filter_map(|item| {
            let history: Vec<_> = item
                .stock_history
                .iter()
                .filter(|m| range.contains(m.date))
                .cloned()
                .collect();
            if history.is_empty() {
                return None;
            }
            let sum = |kind: MovementType| -> i64 {
                saturating_sum(history.iter().filter(|m| m.kind == kind).map(|m| m.quantity))
            };
            Some(DailyReportRow {
                id: item.id,
                description: item.description.clone(),
                unit: item.unit.clone(),
                stock_in: sum(MovementType::In),
                stock_out: sum(MovementType::Out),
                history_details: history,
            })
        })
        .collect()
}

pub async fn all_stock(pool: &SqlitePool) -> Result<AllStockReport, AppError> {
    let accessories = item_service::list_items(pool, Category::Accessory).await?;
    let tools = item_service::list_items(pool, Category::Tool).await?;
    Ok(AllStockReport {
        accessories,
        tools,
        message: "Successfully retrieved all stock data.".into(),
    })
}

pub async fn dangerous_stock(pool: &SqlitePool) -> Result<DangerousStockReport, AppError> {
    let accessories = item_service::list_items(pool, Category::Accessory).await?;
    let tools = item_service::list_items(pool, Category::Tool).await?;
    Ok(DangerousStockReport {
        dangerous_accessories: dangerous_items(&accessories),
        dangerous_tools: dangerous_items(&tools),
        message: "Successfully retrieved dangerous stock report.".into(),
    })
}

pub async fn daily_report(pool: &SqlitePool, category: Category, range: DateRange) -> Result<DailyReport, AppError> {
    let items = item_service::list_items(pool, category).await?;
    Ok(DailyReport {
        report: daily_aggregation(&items, &range),
        message: format!("Successfully retrieved daily report for {}.", category.as_str()),
    })
}

pub async fn summary(pool: &SqlitePool) -> Result<StockSummary, AppError> {
    let mut total_accessories = 0;
    let mut total_tools = 0;
    let mut dangerous = Vec::new();
    for category in Category::ALL {
        let items = item_service::list_items(pool, category).await?;
        let total = saturating_sum(items.iter().map(|i| i.total_stock));
        match category {
            Category::Accessory => total_accessories = total,
            Category::Tool => total_tools = total,
        }
        dangerous.extend(items.iter().filter(|i| is_dangerous(i)).map(|i| DangerousEntry {
            id: i.id,
            category,
            description: i.description.clone(),
            unit: i.unit.clone(),
            stock_in: i.stock_in,
            total_stock: i.total_stock,
            percentage: percentage_remaining(i),
        }));
    }
    dangerous.sort_by(|a, b| {
        let a = a.percentage.unwrap_or(f64::INFINITY);
        let b = b.percentage.unwrap_or(f64::INFINITY);
        a.total_cmp(&b)
    });
    Ok(StockSummary {
        total_accessories,
        total_tools,
        dangerous_items: dangerous.len(),
        dangerous,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::Movement;
    use chrono::Duration;

    fn item(id: i64, stock_in: i64, stock_out: i64) -> StockItem {
        StockItem {
            id,
            category: Category::Tool,
            description: format!("item-{id}"),
            unit: "pcs".into(),
            stock_in,
            stock_out,
            total_stock: stock_in - stock_out,
            created_at: Utc::now(),
            stock_history: Vec::new(),
        }
    }

    fn at(day: &str, hms: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&format!("{day}T{hms}Z"))
            .unwrap()
            .with_timezone(&Utc)
    }

    fn movement(kind: MovementType, quantity: i64, date: DateTime<Utc>) -> Movement {
        Movement { kind, quantity, date, reference: None }
    }

    #[test]
    fn dangerous_threshold_is_twenty_percent_of_stock_in() {
        assert!(is_dangerous(&item(1, 100, 85)));
        assert!(!is_dangerous(&item(2, 100, 75)));
        assert!(!is_dangerous(&item(3, 100, 80)), "exactly 20% remaining is not dangerous");
    }

    #[test]
    fn huge_counters_do_not_overflow() {
        let big = 200_000_000_000_000_000;
        assert!(!is_dangerous(&item(1, big, 0)));
        assert!(is_dangerous(&item(2, big, big - 1)));
        assert!(!is_dangerous(&item(3, i64::MAX, 0)));
        assert_eq!(percentage_remaining(&item(4, i64::MAX, 0)), Some(100.0));
        assert_eq!(saturating_sum([i64::MAX, 5].into_iter()), i64::MAX);
    }

    #[test]
    fn items_never_received_are_never_dangerous() {
        assert!(!is_dangerous(&item(1, 0, 0)));
        assert!(dangerous_items(&[item(1, 0, 0), item(2, 10, 9)])
            .iter()
            .all(|i| i.stock_in > 0));
    }

    #[test]
    fn dangerous_filter_keeps_collection_order() {
        let items = vec![item(1, 100, 99), item(2, 50, 10), item(3, 10, 9)];
        let ids: Vec<_> = dangerous_items(&items).iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn percentage_is_guarded_and_rounded() {
        assert_eq!(percentage_remaining(&item(1, 0, 0)), None);
        assert_eq!(percentage_remaining(&item(2, 3, 2)), Some(33.3));
        assert_eq!(percentage_remaining(&item(3, 100, 85)), Some(15.0));
    }

    #[test]
    fn range_requires_both_bounds() {
        assert!(matches!(DateRange::parse(None, Some("2024-01-02")), Err(AppError::MissingDateRange)));
        assert!(matches!(DateRange::parse(Some("2024-01-02"), Some(" ")), Err(AppError::MissingDateRange)));
    }

    #[test]
    fn range_end_covers_the_whole_day() {
        let r = DateRange::parse(Some("2024-03-01"), Some("2024-03-02")).unwrap();
        assert_eq!(r.start, at("2024-03-01", "00:00:00"));
        assert_eq!(r.end, at("2024-03-02", "23:59:59.999"));
        assert!(r.contains(at("2024-03-02", "23:59:59.999")));
        assert!(!r.contains(at("2024-03-03", "00:00:00")));
    }

    #[test]
    fn range_accepts_rfc3339_and_rejects_garbage() {
        let r = DateRange::parse(Some("2024-03-01T08:30:00Z"), Some("2024-03-01T09:00:00+00:00")).unwrap();
        assert_eq!(r.start, at("2024-03-01", "08:30:00"));
        assert_eq!(r.end, at("2024-03-01", "23:59:59.999"));
        assert!(matches!(DateRange::parse(Some("yesterday"), Some("2024-03-01")), Err(AppError::Validation(_))));
        assert!(matches!(DateRange::parse(Some("2024-03-05"), Some("2024-03-01")), Err(AppError::Validation(_))));
    }

    #[test]
    fn window_excludes_movements_after_end_day() {
        let day1 = at("2024-05-01", "10:00:00");
        let mut it = item(7, 5, 2);
        it.stock_history = vec![
            movement(MovementType::In, 5, day1),
            movement(MovementType::Out, 2, day1 + Duration::days(2)),
        ];
        let range = DateRange::parse(Some("2024-05-01"), Some("2024-05-02")).unwrap();
        let rows = daily_aggregation(&[it], &range);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stock_in, 5);
        assert_eq!(rows[0].stock_out, 0);
        assert_eq!(rows[0].history_details.len(), 1);
    }

    #[test]
    fn items_without_movements_in_window_are_dropped() {
        let mut quiet = item(1, 3, 0);
        quiet.stock_history = vec![movement(MovementType::In, 3, at("2023-12-31", "12:00:00"))];
        let mut busy = item(2, 4, 1);
        busy.stock_history = vec![
            movement(MovementType::In, 4, at("2024-01-01", "00:00:00")),
            movement(MovementType::Out, 1, at("2024-01-01", "18:00:00")),
        ];
        let range = DateRange::parse(Some("2024-01-01"), Some("2024-01-01")).unwrap();
        let rows = daily_aggregation(&[quiet, busy], &range);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 2);
        assert_eq!((rows[0].stock_in, rows[0].stock_out), (4, 1));
    }
}
