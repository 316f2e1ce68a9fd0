use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::templates::schema::{formula_text, variable_name, InputType, TestFieldDefinition};

/// A stored result: text for entered and computed values, but persisted
/// reports may also carry bare numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultValue {
    Number(f64),
    Text(String),
}

impl ResultValue {
    pub fn empty() -> Self {
        ResultValue::Text(String::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ResultValue::Text(s) if s.trim().is_empty())
    }

    /// Numeric reading of the value, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ResultValue::Number(n) => Some(*n),
            ResultValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }
}

impl Default for ResultValue {
    fn default() -> Self {
        ResultValue::empty()
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Number(n) => write!(f, "{n}"),
            ResultValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for ResultValue {
    fn from(s: &str) -> Self {
        ResultValue::Text(s.to_string())
    }
}

/// One field of a report being filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_name: String,
    #[serde(default)]
    pub result: ResultValue,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub normal_range: String,
    #[serde(default)]
    pub input_type: InputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub chemical_code: String,
}

impl TestResult {
    pub fn formula(&self) -> Option<&str> {
        formula_text(&self.formula)
    }

    pub fn variable(&self) -> Option<&str> {
        variable_name(&self.variable)
    }

    pub fn is_computed(&self) -> bool {
        self.formula().is_some()
    }
}

impl From<&TestFieldDefinition> for TestResult {
    fn from(def: &TestFieldDefinition) -> Self {
        TestResult {
            test_name: def.test_name.clone(),
            result: ResultValue::empty(),
            unit: def.unit.clone(),
            normal_range: def.normal_range.clone(),
            input_type: def.input_type,
            options: def.options.clone(),
            formula: def.formula.clone(),
            variable: def.variable.clone(),
            chemical_code: def.chemical_code.clone(),
        }
    }
}

/// Variable name -> last resolved value, owned by one editing session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableTable(BTreeMap<String, f64>);

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value.
    pub fn publish(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Identifiers and flags attached to a report when it is submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMeta {
    pub patient_id: String,
    pub invoice_id: String,
    pub template_id: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub repeat_status: bool,
    /// The sample was tested by an outside lab.
    #[serde(default)]
    pub out_side_status: bool,
}

/// A submitted report, in the shape the report store persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub patient_id: String,
    pub invoice_id: String,
    pub template_id: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub complete_status: bool,
    #[serde(default)]
    pub repeat_status: bool,
    #[serde(default)]
    pub out_side_status: bool,
    pub test_results: Vec<TestResult>,
    pub created_at: DateTime<Utc>,
}
