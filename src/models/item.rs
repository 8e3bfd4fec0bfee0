use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Item kind; each category is its own collection with an identical shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Accessory,
    Tool,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Accessory, Category::Tool];

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "accessory" => Ok(Self::Accessory),
            "tool" => Ok(Self::Tool),
            _ => Err(AppError::InvalidCategory),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accessory => "accessory",
            Self::Tool => "tool",
        }
    }

    /// Collection path segment under `/api`.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Accessory => "accessories",
            Self::Tool => "tools",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MovementType {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl MovementType {
    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "IN" => Ok(Self::In),
            "OUT" => Ok(Self::Out),
            _ => Err(AppError::InvalidType),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "IN",
            Self::Out => "OUT",
        }
    }

    /// `(stock_in, stock_out)` increments for a movement of `quantity`.
    pub fn deltas(&self, quantity: i64) -> (i64, i64) {
        match self {
            Self::In => (quantity, 0),
            Self::Out => (0, quantity),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Movement {
    #[serde(rename = "type")]
    pub kind: MovementType,
    pub quantity: i64,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub id: i64,
    pub category: Category,
    pub description: String,
    pub unit: String,
    pub stock_in: i64,
    pub stock_out: i64,
    pub total_stock: i64,
    pub created_at: DateTime<Utc>,
    pub stock_history: Vec<Movement>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub description: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub initial_stock: i64,
}

/// A validated request to move stock.
#[derive(Debug, Clone)]
pub struct MovementReq {
    pub kind: MovementType,
    pub quantity: i64,
    pub reference: Option<String>,
}

impl MovementReq {
    pub fn new(kind: &str, quantity: i64, reference: Option<String>) -> Result<Self, AppError> {
        let kind = MovementType::parse(kind)?;
        if quantity <= 0 {
            return Err(AppError::InvalidQuantity);
        }
        let reference = reference
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        Ok(Self { kind, quantity, reference })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub description: Option<String>,
    pub unit: Option<String>,
    pub movement: Option<MovementReq>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_type_is_exactly_in_or_out() {
        assert_eq!(MovementType::parse("IN").unwrap(), MovementType::In);
        assert_eq!(MovementType::parse("OUT").unwrap(), MovementType::Out);
        for bad in ["in", " OUT ", "Out", "MOVE", ""] {
            assert!(matches!(MovementType::parse(bad), Err(AppError::InvalidType)), "{bad:?}");
        }
    }

    #[test]
    fn movement_req_rejects_non_positive_quantity() {
        assert!(matches!(MovementReq::new("IN", 0, None), Err(AppError::InvalidQuantity)));
        assert!(matches!(MovementReq::new("OUT", -3, None), Err(AppError::InvalidQuantity)));
    }

    #[test]
    fn movement_req_drops_blank_reference() {
        let req = MovementReq::new("IN", 4, Some("   ".into())).unwrap();
        assert_eq!(req.reference, None);
    }

    #[test]
    fn category_rejects_unknown_kind() {
        assert_eq!(Category::parse("tool").unwrap(), Category::Tool);
        assert!(matches!(Category::parse("tools"), Err(AppError::InvalidCategory)));
    }
}
