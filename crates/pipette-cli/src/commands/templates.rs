use pipette_core::error::PipetteError;
use pipette_core::formula::dependency_order;
use pipette_core::model::TestResult;
use pipette_core::templates::schema::TestTemplate;
use pipette_core::templates::{builtin, load_template, template_warnings};
use pipette_core::DependencyMatching;
use std::path::Path;

pub fn list() -> Result<(), PipetteError> {
    println!("Available built-in templates:\n");
    for name in builtin::PRESETS {
        let t = builtin::load_preset(name)?;
        println!(
            "  {:<8} {} [{}] {} fields, {}",
            name,
            t.template_name,
            t.specimen_type,
            t.tests.len(),
            t.price
        );
        if !t.description.is_empty() {
            println!("           {}", t.description);
        }
        println!();
    }
    Ok(())
}

fn matching_for(token_deps: bool) -> DependencyMatching {
    if token_deps {
        DependencyMatching::Token
    } else {
        DependencyMatching::Substring
    }
}

/// Names of the computed fields in the order a pass evaluates them.
fn evaluation_order(template: &TestTemplate, matching: DependencyMatching) -> Vec<String> {
    let results: Vec<TestResult> = template.tests.iter().map(TestResult::from).collect();
    dependency_order(&results, matching)
        .into_iter()
        .filter(|&idx| results[idx].is_computed())
        .map(|idx| results[idx].test_name.clone())
        .collect()
}

pub fn explain(name: &str, token_deps: bool) -> Result<(), PipetteError> {
    let template = if builtin::PRESETS.contains(&name) {
        builtin::load_preset(name)?
    } else {
        load_template(Path::new(name))?
    };

    println!("{} ({})\n", template.template_name, template.short_name);
    if !template.description.is_empty() {
        println!("{}\n", template.description);
    }
    println!("  Specimen: {}", template.specimen_type);
    println!("  Price:    {}\n", template.price);

    print_fields(&template);

    let matching = matching_for(token_deps);
    let computed = evaluation_order(&template, matching);
    if !computed.is_empty() {
        println!("Computed fields are evaluated in this order:");
        println!("  {}\n", computed.join(" -> "));
    }

    print_warnings(&template, matching);
    Ok(())
}

fn print_fields(template: &TestTemplate) {
    let width = template
        .tests
        .iter()
        .map(|f| f.test_name.len())
        .max()
        .unwrap_or(10);

    println!(
        "  {:<width$}  {:<7} {:<10} {:<14} {:<10} Formula",
        "Test",
        "Type",
        "Unit",
        "Normal range",
        "Variable",
        width = width
    );
    println!("  {}", "-".repeat(width + 56));
    for field in &template.tests {
        let formula = match (&field.formula, &field.options) {
            (Some(f), _) if !f.trim().is_empty() => format!("= {}", f.trim()),
            (_, Some(options)) => format!("[{}]", options.join(" | ")),
            _ => String::new(),
        };
        println!(
            "  {:<width$}  {:<7} {:<10} {:<14} {:<10} {}",
            field.test_name,
            field.input_type.to_string(),
            field.unit,
            field.normal_range,
            field.variable.as_deref().unwrap_or("-"),
            formula,
            width = width
        );
    }
    println!();
}

fn print_warnings(template: &TestTemplate, matching: DependencyMatching) -> usize {
    let warnings = template_warnings(template, matching);
    if !warnings.is_empty() {
        println!("Warnings:");
        for w in &warnings {
            println!("  - {}", w);
        }
        println!();
    }
    warnings.len()
}

pub fn schema() -> Result<(), PipetteError> {
    print!(
        r#"JSON Template Schema
====================

A template describes one kind of lab test: the fields shown on the report
form, which of them are typed in and which are computed from the others.

Top-level fields:
  templateName  (string, required)  Full name, e.g. "Lipid Profile"
  shortName     (string, required)  Short code, e.g. "LIPID"
  description   (string, optional)  Free text
  price         (string, required)  Decimal price, e.g. "2800"
  specimenType  (string, required)  e.g. "Serum", "Whole Blood"
  tests         (array, required)   Ordered list of fields (see below)

Each entry in "tests":
  testName      (string, required)  Label shown on the report
  inputType     (string, required)  "number", "text" or "select"
  unit          (string, optional)  Display only
  normalRange   (string, optional)  Display only, never checked
  options       (array, optional)   Choices; required for "select",
                                    not allowed otherwise
  variable      (string, optional)  Name other formulas use to refer to
                                    this field's value
  formula       (string, optional)  Makes the field computed. An arithmetic
                                    expression over other fields' variables:
                                    + - * / % ^, parentheses, and
                                    sqrt cbrt abs exp ln log log10 pow
                                    min max floor round ceil
  chemicalCode  (string, optional)  Analyser code

Entered numbers and computed results are rounded to one decimal place
(see --decimals). A formula runs after every field whose variable name
appears in its text. A formula that cannot be evaluated leaves its field
unchanged.

Example:
{{
  "templateName": "Renal Function",
  "shortName": "RFT",
  "price": "1500",
  "specimenType": "Serum",
  "tests": [
    {{ "testName": "Serum Creatinine", "unit": "mg/dL", "inputType": "number", "variable": "scr" }},
    {{ "testName": "Blood Urea", "unit": "mg/dL", "inputType": "number", "variable": "urea" }},
    {{ "testName": "Blood Urea Nitrogen", "inputType": "number", "formula": "urea / 2.14", "variable": "bun" }},
    {{ "testName": "BUN/Creatinine Ratio", "inputType": "number", "formula": "bun / scr" }},
    {{ "testName": "Sample Appearance", "inputType": "select", "options": ["Clear", "Haemolysed"] }}
  ]
}}

Note: price must be a quoted string to keep exact decimal precision.
"#
    );
    Ok(())
}

pub fn validate(file: &Path, token_deps: bool) -> Result<(), PipetteError> {
    let template = load_template(file)?;

    println!(
        "Template '{}' ({}) is valid.",
        template.template_name, template.short_name
    );
    let computed = template.tests.iter().filter(|f| f.is_computed()).count();
    println!(
        "  Fields: {} ({} entered, {} computed)",
        template.tests.len(),
        template.tests.len() - computed,
        computed
    );

    println!();
    print_warnings(&template, matching_for(token_deps));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipette_core::templates::parse_template_str;

    const SHADOWED: &str = r#"{
        "templateName": "Shadowed",
        "shortName": "SHD",
        "price": "100",
        "specimenType": "Serum",
        "tests": [
            { "testName": "C1", "inputType": "number", "formula": "na + 1" },
            { "testName": "C2", "inputType": "number", "formula": "x", "variable": "n" },
            { "testName": "Input", "inputType": "number", "variable": "x" }
        ]
    }"#;

    #[test]
    fn test_evaluation_order_follows_matching() {
        let template = parse_template_str(SHADOWED).unwrap();
        assert_eq!(
            evaluation_order(&template, matching_for(false)),
            vec!["C2", "C1"]
        );
        assert_eq!(
            evaluation_order(&template, matching_for(true)),
            vec!["C1", "C2"]
        );
    }

    #[test]
    fn test_explain_accepts_token_deps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadowed.json");
        std::fs::write(&path, SHADOWED).unwrap();
        let name = path.to_str().unwrap();
        assert!(explain(name, true).is_ok());
        assert!(explain(name, false).is_ok());
    }
}
