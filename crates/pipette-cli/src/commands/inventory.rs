use chrono::{Local, NaiveDate};
use pipette_core::error::PipetteError;
use pipette_core::inventory::{self, Category, InventoryItem, StockReportKind};
use std::path::Path;

use crate::output;

fn load(path: &Path) -> Result<Vec<InventoryItem>, PipetteError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn report(
    file: &Path,
    kind: &str,
    today: Option<NaiveDate>,
    output_format: &str,
) -> Result<(), PipetteError> {
    let kind: StockReportKind = kind.parse()?;
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let items = load(file)?;
    let selected = inventory::stock_report(&items, kind, today);

    match output_format {
        "json" => output::json::print(&selected)?,
        _ => output::table::print_stock(&selected, today),
    }
    Ok(())
}

pub fn search(file: &Path, query: &str, category: Option<&str>) -> Result<(), PipetteError> {
    let category = match category {
        Some(name) => Some(Category::from_str_loose(name).ok_or_else(|| {
            PipetteError::Inventory(format!("unknown category '{name}'"))
        })?),
        None => None,
    };
    let items = load(file)?;
    let found = inventory::search(&items, query, category);
    output::table::print_stock(&found, Local::now().date_naive());
    Ok(())
}
