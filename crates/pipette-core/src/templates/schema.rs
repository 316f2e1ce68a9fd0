use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a field's value is entered on the report form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Text,
    Number,
    Select,
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputType::Text => write!(f, "text"),
            InputType::Number => write!(f, "number"),
            InputType::Select => write!(f, "select"),
        }
    }
}

/// A test template: the ordered field list for one kind of lab test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestTemplate {
    pub template_name: String,
    pub short_name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub specimen_type: String,
    pub tests: Vec<TestFieldDefinition>,
}

/// One row of a test template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFieldDefinition {
    pub test_name: String,
    #[serde(default)]
    pub unit: String,
    /// Free text, shown next to the result. Never validated.
    #[serde(default)]
    pub normal_range: String,
    pub input_type: InputType,
    /// Choices for `select` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Expression over other fields' variables. Non-empty makes this a computed field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    /// Name this field's value is published under for other formulas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub chemical_code: String,
}

impl TestFieldDefinition {
    /// A direct-input field of the given type.
    pub fn input(test_name: &str, input_type: InputType) -> Self {
        Self {
            test_name: test_name.to_string(),
            unit: String::new(),
            normal_range: String::new(),
            input_type,
            options: None,
            formula: None,
            variable: None,
            chemical_code: String::new(),
        }
    }

    /// A computed number field.
    pub fn computed(test_name: &str, formula: &str) -> Self {
        Self {
            formula: Some(formula.to_string()),
            ..Self::input(test_name, InputType::Number)
        }
    }

    pub fn with_variable(mut self, variable: &str) -> Self {
        self.variable = Some(variable.to_string());
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = Some(options.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn is_computed(&self) -> bool {
        formula_text(&self.formula).is_some()
    }
}

/// Trimmed formula text, or `None` for direct-input fields.
pub(crate) fn formula_text(formula: &Option<String>) -> Option<&str> {
    formula.as_deref().map(str::trim).filter(|f| !f.is_empty())
}

/// Published variable name, or `None` when the field publishes nothing.
pub(crate) fn variable_name(variable: &Option<String>) -> Option<&str> {
    variable.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
