use serde::{Deserialize, Serialize};

/// What an evaluation pass did with one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldOutcome {
    /// No formula; the entered value was left as it was.
    Input,
    /// Formula evaluated; `value` is the stored (rounded) result.
    Computed { value: String },
    /// Formula could not be evaluated; the previous result was kept.
    Failed { reason: String },
}

/// Outcome for a single field, identified by its position in the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReport {
    pub index: usize,
    pub test_name: String,
    pub outcome: FieldOutcome,
}

/// Result of one full evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassSummary {
    /// Field indices in the order they were visited.
    pub order: Vec<usize>,
    /// One entry per field, in visiting order.
    pub fields: Vec<FieldReport>,
}

impl PassSummary {
    pub fn failures(&self) -> impl Iterator<Item = &FieldReport> {
        self.fields
            .iter()
            .filter(|f| matches!(f.outcome, FieldOutcome::Failed { .. }))
    }

    pub fn computed_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| matches!(f.outcome, FieldOutcome::Computed { .. }))
            .count()
    }

    pub fn outcome_of(&self, index: usize) -> Option<&FieldOutcome> {
        self.fields
            .iter()
            .find(|f| f.index == index)
            .map(|f| &f.outcome)
    }
}
