pub mod builtin;
pub mod schema;

use crate::error::PipetteError;
use crate::formula::expr::{identifiers, FUNCTIONS};
use crate::formula::graph::dependency_cycles;
use crate::formula::DependencyMatching;
use crate::model::TestResult;
use rust_decimal::Decimal;
use schema::{InputType, TestTemplate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Load a template from a JSON file.
pub fn load_template(path: &Path) -> Result<TestTemplate, PipetteError> {
    let content = std::fs::read_to_string(path).map_err(|e| PipetteError::TemplateLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_template(&content, path)
}

/// Parse a template from a JSON string.
pub fn parse_template(json: &str, source: &Path) -> Result<TestTemplate, PipetteError> {
    let template: TestTemplate =
        serde_json::from_str(json).map_err(|e| PipetteError::TemplateLoad {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_template(&template)?;
    Ok(template)
}

/// Parse a template from a JSON string (no file path context).
pub fn parse_template_str(json: &str) -> Result<TestTemplate, PipetteError> {
    let template: TestTemplate = serde_json::from_str(json).map_err(PipetteError::Json)?;
    validate_template(&template)?;
    Ok(template)
}

/// Validate that a template is well-formed.
pub fn validate_template(template: &TestTemplate) -> Result<(), PipetteError> {
    for (label, value) in [
        ("templateName", &template.template_name),
        ("shortName", &template.short_name),
        ("specimenType", &template.specimen_type),
    ] {
        if value.trim().is_empty() {
            return Err(PipetteError::TemplateInvalid(format!(
                "{label} must not be empty"
            )));
        }
    }

    if template.price < Decimal::ZERO {
        return Err(PipetteError::TemplateInvalid(format!(
            "price must not be negative (got {})",
            template.price
        )));
    }

    if template.tests.is_empty() {
        return Err(PipetteError::TemplateInvalid("tests must not be empty".into()));
    }

    for (idx, test) in template.tests.iter().enumerate() {
        if test.test_name.trim().is_empty() {
            return Err(PipetteError::TemplateInvalid(format!(
                "test #{} has an empty testName",
                idx + 1
            )));
        }

        let has_options = test.options.as_ref().is_some_and(|o| !o.is_empty());
        match test.input_type {
            InputType::Select if !has_options => {
                return Err(PipetteError::TemplateInvalid(format!(
                    "select test '{}' has no options",
                    test.test_name
                )));
            }
            InputType::Text | InputType::Number if has_options => {
                return Err(PipetteError::TemplateInvalid(format!(
                    "test '{}' has options but inputType is '{}'",
                    test.test_name, test.input_type
                )));
            }
            _ => {}
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    DependencyCycle,
    DuplicateVariable,
    SelectVariable,
    UnknownReference,
}

/// A problem in a template that does not stop it from being used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for TemplateWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Check a template for authoring mistakes that evaluation would silently
/// tolerate.
pub fn template_warnings(
    template: &TestTemplate,
    matching: DependencyMatching,
) -> Vec<TemplateWarning> {
    let mut warnings = Vec::new();
    let results: Vec<TestResult> = template.tests.iter().map(TestResult::from).collect();

    for cycle in dependency_cycles(&results, matching) {
        let names: Vec<&str> = cycle
            .iter()
            .map(|&idx| results[idx].test_name.as_str())
            .collect();
        warnings.push(TemplateWarning {
            kind: WarningKind::DependencyCycle,
            message: format!(
                "formulas depend on each other in a cycle: {}",
                names.join(" -> ")
            ),
        });
    }

    let mut publishers: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for result in &results {
        if let Some(name) = result.variable() {
            publishers
                .entry(name)
                .or_default()
                .push(result.test_name.as_str());
        }
    }
    for (variable, fields) in &publishers {
        if fields.len() > 1 {
            warnings.push(TemplateWarning {
                kind: WarningKind::DuplicateVariable,
                message: format!(
                    "variable '{}' is published by {} fields ({}); the last one evaluated wins",
                    variable,
                    fields.len(),
                    fields.join(", ")
                ),
            });
        }
    }

    for result in &results {
        if let (InputType::Select, Some(name)) = (result.input_type, result.variable()) {
            warnings.push(TemplateWarning {
                kind: WarningKind::SelectVariable,
                message: format!(
                    "select test '{}' publishes variable '{}'; options are read as numbers (non-numeric options count as 0)",
                    result.test_name, name
                ),
            });
        }
    }

    for result in &results {
        let Some(formula) = result.formula() else {
            continue;
        };
        let mut reported = Vec::new();
        for id in identifiers(formula) {
            let known = if id.is_call {
                FUNCTIONS.contains(&id.name) || is_builtin_function(id.name)
            } else {
                publishers.contains_key(id.name)
            };
            if !known && !reported.contains(&id.name) {
                reported.push(id.name);
                warnings.push(TemplateWarning {
                    kind: WarningKind::UnknownReference,
                    message: format!(
                        "formula of '{}' uses '{}', which no test publishes",
                        result.test_name, id.name
                    ),
                });
            }
        }
    }

    warnings
}

fn is_builtin_function(name: &str) -> bool {
    matches!(name, "min" | "max" | "floor" | "round" | "ceil" | "if")
        || name.starts_with("math::")
}
