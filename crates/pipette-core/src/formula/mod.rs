//! Formula evaluation for computed report fields.
//!
//! A pass orders fields so that every formula runs after the fields whose
//! variables it mentions ([`graph`]), evaluates each formula against the
//! session's variable table ([`expr`]) and publishes the rounded results
//! back into that table ([`evaluator`]).

pub mod evaluator;
pub mod expr;
pub mod graph;
pub mod outcome;

use serde::{Deserialize, Serialize};

pub use evaluator::evaluate_formulas;
pub use graph::{dependency_cycles, dependency_order};
pub use outcome::{FieldOutcome, FieldReport, PassSummary};

/// How a formula's text is matched against published variable names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyMatching {
    /// A variable is a dependency when it occurs anywhere in the formula
    /// text, including inside longer identifiers (`n` matches `na + 1`).
    #[default]
    Substring,
    /// A variable is a dependency only when it occurs as a whole identifier.
    Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// Decimal places kept for entered and computed numbers.
    pub decimal_places: u32,
    pub dependency_matching: DependencyMatching,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            decimal_places: 1,
            dependency_matching: DependencyMatching::Substring,
        }
    }
}
