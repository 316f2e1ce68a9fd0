use chrono::NaiveDate;
use pipette_core::billing::Invoice;
use pipette_core::formula::{FieldOutcome, PassSummary};
use pipette_core::inventory::InventoryItem;
use pipette_core::model::TestResult;
use pipette_core::templates::schema::TestTemplate;

pub fn print_results(template: &TestTemplate, results: &[TestResult], summary: &PassSummary) {
    println!("=== {} ({}) ===\n", template.template_name, template.short_name);

    let width = results
        .iter()
        .map(|r| r.test_name.len())
        .max()
        .unwrap_or(10);

    for (idx, r) in results.iter().enumerate() {
        let marker = match summary.outcome_of(idx) {
            Some(FieldOutcome::Computed { .. }) => "=",
            Some(FieldOutcome::Failed { .. }) => "!",
            _ => " ",
        };
        let value = if r.result.is_empty() {
            "-".to_string()
        } else {
            r.result.to_string()
        };
        let range = if r.normal_range.is_empty() {
            String::new()
        } else {
            format!("  ({})", r.normal_range)
        };
        println!(
            "  {} {:<width$}  {:>10} {}{}",
            marker,
            r.test_name,
            value,
            r.unit,
            range,
            width = width
        );
    }
    println!();

    let failures: Vec<_> = summary.failures().collect();
    if !failures.is_empty() {
        println!("  Not computed:");
        for f in failures {
            if let FieldOutcome::Failed { reason } = &f.outcome {
                println!("    {}: {}", f.test_name, reason);
            }
        }
        println!();
    }
}

pub fn print_invoice(invoice: &Invoice) {
    println!("Invoice for {}", invoice.user_id);
    println!("  Amount:  {}", invoice.amount);
    println!("  Paid:    {}", invoice.paying_amount);
    println!("  Due:     {}", invoice.due_amount);
    println!("  Status:  {}", invoice.payment_status);
    println!("  Tests:");
    for line in &invoice.test_templates {
        let mark = if line.completed { "x" } else { " " };
        println!("    [{}] {}", mark, line.template_id);
    }
    println!();
}

pub fn print_stock(items: &[&InventoryItem], today: NaiveDate) {
    if items.is_empty() {
        println!("No matching items.");
        return;
    }

    let width = items
        .iter()
        .map(|i| i.item_name.len())
        .max()
        .unwrap_or(10);

    for item in items {
        let mut flags = Vec::new();
        if item.is_low_stock() {
            flags.push("LOW".to_string());
        }
        if item.is_expired(today) {
            flags.push("EXPIRED".to_string());
        } else if item.is_expiring(today) {
            flags.push("EXPIRING".to_string());
        }
        let expiry = item
            .expiration_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<10} {:<width$}  {:>8} {:<8} min {:<6} exp {:<10} {}",
            item.item_code,
            item.item_name,
            item.quantity.to_string(),
            format!("{:?}", item.unit).to_lowercase(),
            item.min_stock_level.to_string(),
            expiry,
            flags.join(" "),
            width = width
        );
    }
}
