use pipette_core::billing::Invoice;
use pipette_core::error::PipetteError;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};

use crate::output;

fn load(path: &Path) -> Result<Invoice, PipetteError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn save(invoice: &Invoice, source: &Path, out: Option<PathBuf>) -> Result<(), PipetteError> {
    let path = out.unwrap_or_else(|| source.to_path_buf());
    std::fs::write(&path, serde_json::to_string_pretty(invoice)?)?;
    eprintln!("Invoice written to {}", path.display());
    Ok(())
}

pub fn pay(file: &Path, amount: Decimal, out: Option<PathBuf>) -> Result<(), PipetteError> {
    let mut invoice = load(file)?;
    invoice.record_payment(amount)?;
    output::table::print_invoice(&invoice);
    save(&invoice, file, out)
}

pub fn complete(file: &Path, template_id: &str, out: Option<PathBuf>) -> Result<(), PipetteError> {
    let mut invoice = load(file)?;
    invoice.complete_test(template_id)?;
    output::table::print_invoice(&invoice);
    save(&invoice, file, out)
}
