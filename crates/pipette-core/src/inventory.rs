//! Stock of laboratory consumables: usage tracking, low-stock and expiry
//! reports.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::PipetteError;

/// Items expiring within this many days are reported as expiring.
pub const EXPIRY_WINDOW_DAYS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Reagents,
    #[serde(rename = "Lab Equipment")]
    LabEquipment,
    Consumables,
    Glassware,
    #[serde(rename = "Safety Equipment")]
    SafetyEquipment,
    #[serde(rename = "Diagnostic Kits")]
    DiagnosticKits,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Reagents => write!(f, "Reagents"),
            Category::LabEquipment => write!(f, "Lab Equipment"),
            Category::Consumables => write!(f, "Consumables"),
            Category::Glassware => write!(f, "Glassware"),
            Category::SafetyEquipment => write!(f, "Safety Equipment"),
            Category::DiagnosticKits => write!(f, "Diagnostic Kits"),
        }
    }
}

impl Category {
    pub fn from_str_loose(s: &str) -> Option<Category> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "reagents" | "reagent" => Some(Category::Reagents),
            "lab equipment" | "equipment" => Some(Category::LabEquipment),
            "consumables" | "consumable" => Some(Category::Consumables),
            "glassware" => Some(Category::Glassware),
            "safety equipment" | "safety" => Some(Category::SafetyEquipment),
            "diagnostic kits" | "kits" => Some(Category::DiagnosticKits),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockUnit {
    #[default]
    Pieces,
    Boxes,
    Ml,
    L,
    Mg,
    G,
    Kg,
    Units,
    Packs,
    Bottles,
    Tubes,
    Vials,
    Bags,
    Rolls,
    Sheets,
    Meters,
    Cm,
    Mm,
}

/// One withdrawal from stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub date: NaiveDate,
    pub quantity_used: Decimal,
    #[serde(default)]
    pub used_by: String,
    #[serde(default)]
    pub purpose: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub item_code: String,
    pub item_name: String,
    pub category: Category,
    pub quantity: Decimal,
    pub min_stock_level: Decimal,
    /// Deducted for every test run that consumes this item.
    #[serde(default)]
    pub amount_used_per_test: Decimal,
    #[serde(default)]
    pub unit: StockUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub usage_history: Vec<UsageRecord>,
}

impl InventoryItem {
    /// Take `quantity` out of stock and log it.
    pub fn record_usage(
        &mut self,
        quantity: Decimal,
        used_by: &str,
        purpose: &str,
        date: NaiveDate,
    ) -> Result<(), PipetteError> {
        if quantity <= Decimal::ZERO {
            return Err(PipetteError::Inventory(format!(
                "usage of '{}' must be positive (got {quantity})",
                self.item_code
            )));
        }
        if quantity > self.quantity {
            return Err(PipetteError::InsufficientStock {
                item: self.item_code.clone(),
                requested: quantity,
                available: self.quantity,
            });
        }

        self.quantity -= quantity;
        self.usage_history.push(UsageRecord {
            date,
            quantity_used: quantity,
            used_by: used_by.to_string(),
            purpose: purpose.to_string(),
        });
        debug!(item = %self.item_code, used = %quantity, left = %self.quantity, "stock used");
        if self.is_low_stock() {
            warn!(item = %self.item_code, left = %self.quantity, min = %self.min_stock_level, "stock at or below minimum");
        }
        Ok(())
    }

    /// Deduct the per-test amount for `tests` test runs. Items with no
    /// per-test amount are left alone.
    pub fn consume_for_tests(&mut self, tests: u32, date: NaiveDate) -> Result<(), PipetteError> {
        if self.amount_used_per_test.is_zero() || tests == 0 {
            return Ok(());
        }
        let quantity = self.amount_used_per_test * Decimal::from(tests);
        self.record_usage(quantity, "", &format!("{tests} test(s)"), date)
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock_level
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiration_date.is_some_and(|d| d < today)
    }

    /// Not yet expired, but expiring within [`EXPIRY_WINDOW_DAYS`].
    pub fn is_expiring(&self, today: NaiveDate) -> bool {
        let Some(limit) = today.checked_add_days(Days::new(EXPIRY_WINDOW_DAYS)) else {
            return false;
        };
        self.expiration_date
            .is_some_and(|d| d >= today && d <= limit)
    }

    pub fn total_used(&self) -> Decimal {
        self.usage_history.iter().map(|u| u.quantity_used).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StockReportKind {
    #[default]
    Inventory,
    LowStock,
    Expired,
    Expiring,
}

impl FromStr for StockReportKind {
    type Err = PipetteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inventory" | "all" => Ok(StockReportKind::Inventory),
            "low-stock" | "low" => Ok(StockReportKind::LowStock),
            "expired" => Ok(StockReportKind::Expired),
            "expiring" => Ok(StockReportKind::Expiring),
            other => Err(PipetteError::Inventory(format!(
                "unknown report kind '{other}' (expected inventory, low-stock, expired or expiring)"
            ))),
        }
    }
}

/// Items selected for a stock report.
pub fn stock_report(
    items: &[InventoryItem],
    kind: StockReportKind,
    today: NaiveDate,
) -> Vec<&InventoryItem> {
    items
        .iter()
        .filter(|item| match kind {
            StockReportKind::Inventory => true,
            StockReportKind::LowStock => item.is_low_stock(),
            StockReportKind::Expired => item.is_expired(today),
            StockReportKind::Expiring => item.is_expiring(today),
        })
        .collect()
}

/// Case-insensitive search on item name or code, optionally within a category.
pub fn search<'a>(
    items: &'a [InventoryItem],
    query: &str,
    category: Option<Category>,
) -> Vec<&'a InventoryItem> {
    let needle = query.trim().to_lowercase();
    items
        .iter()
        .filter(|item| category.map_or(true, |c| item.category == c))
        .filter(|item| {
            needle.is_empty()
                || item.item_name.to_lowercase().contains(&needle)
                || item.item_code.to_lowercase().contains(&needle)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn item(code: &str, name: &str, quantity: Decimal, min: Decimal) -> InventoryItem {
        InventoryItem {
            item_code: code.into(),
            item_name: name.into(),
            category: Category::Reagents,
            quantity,
            min_stock_level: min,
            amount_used_per_test: Decimal::ZERO,
            unit: StockUnit::Ml,
            location: None,
            supplier: None,
            notes: None,
            expiration_date: None,
            usage_history: Vec::new(),
        }
    }

    #[test]
    fn test_record_usage() {
        let mut it = item("R-01", "Cholesterol reagent", dec!(500), dec!(100));
        it.record_usage(dec!(120.5), "tech", "QC run", date(2026, 3, 1))
            .unwrap();
        assert_eq!(it.quantity, dec!(379.5));
        assert_eq!(it.usage_history.len(), 1);
        assert_eq!(it.total_used(), dec!(120.5));
    }

    #[test]
    fn test_usage_rules() {
        let mut it = item("R-01", "Cholesterol reagent", dec!(10), dec!(2));
        assert!(it.record_usage(dec!(0), "", "", date(2026, 3, 1)).is_err());
        let err = it.record_usage(dec!(11), "", "", date(2026, 3, 1)).unwrap_err();
        assert!(matches!(err, PipetteError::InsufficientStock { .. }));
        assert_eq!(it.quantity, dec!(10));
    }

    #[test]
    fn test_consume_for_tests() {
        let mut it = item("T-01", "EDTA tube", dec!(100), dec!(20));
        it.amount_used_per_test = dec!(2);
        it.consume_for_tests(5, date(2026, 3, 1)).unwrap();
        assert_eq!(it.quantity, dec!(90));
        assert_eq!(it.usage_history[0].purpose, "5 test(s)");
    }

    #[test]
    fn test_low_stock_boundary() {
        assert!(item("A", "a", dec!(5), dec!(5)).is_low_stock());
        assert!(!item("A", "a", dec!(6), dec!(5)).is_low_stock());
    }

    #[test]
    fn test_expiry() {
        let today = date(2026, 3, 1);
        let mut expired = item("E", "old", dec!(1), dec!(0));
        expired.expiration_date = Some(date(2026, 2, 28));
        let mut soon = item("S", "soon", dec!(1), dec!(0));
        soon.expiration_date = Some(date(2026, 3, 31));
        let mut later = item("L", "later", dec!(1), dec!(0));
        later.expiration_date = Some(date(2026, 4, 1));

        assert!(expired.is_expired(today));
        assert!(!expired.is_expiring(today));
        assert!(soon.is_expiring(today));
        assert!(!later.is_expiring(today));

        let items = vec![expired, soon, later];
        let codes: Vec<&str> = stock_report(&items, StockReportKind::Expiring, today)
            .iter()
            .map(|i| i.item_code.as_str())
            .collect();
        assert_eq!(codes, vec!["S"]);
        assert_eq!(stock_report(&items, StockReportKind::Inventory, today).len(), 3);
    }

    #[test]
    fn test_search() {
        let mut tube = item("T-01", "EDTA Tube", dec!(100), dec!(20));
        tube.category = Category::Consumables;
        let items = vec![item("R-01", "Glucose reagent", dec!(5), dec!(1)), tube];
        assert_eq!(search(&items, "edta", None).len(), 1);
        assert_eq!(search(&items, "r-01", None).len(), 1);
        assert!(search(&items, "edta", Some(Category::Reagents)).is_empty());
        assert_eq!(search(&items, "", None).len(), 2);
    }

    #[test]
    fn test_report_kind_parse_and_json() {
        assert_eq!("low-stock".parse::<StockReportKind>().unwrap(), StockReportKind::LowStock);
        assert!("weekly".parse::<StockReportKind>().is_err());

        let json = r#"{ "itemCode": "K-9", "itemName": "HbA1c kit", "category": "Diagnostic Kits",
                        "quantity": "3", "minStockLevel": "5", "unit": "packs",
                        "expirationDate": "2026-05-01" }"#;
        let it: InventoryItem = serde_json::from_str(json).unwrap();
        assert_eq!(it.category, Category::DiagnosticKits);
        assert_eq!(it.unit, StockUnit::Packs);
        assert!(it.is_low_stock());
    }
}
