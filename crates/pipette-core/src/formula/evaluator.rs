use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, warn};

use crate::formula::expr::{self, ExpressionError, FormulaValue};
use crate::formula::graph::dependency_order;
use crate::formula::outcome::{FieldOutcome, FieldReport, PassSummary};
use crate::formula::EvaluationOptions;
use crate::model::{ResultValue, TestResult, VariableTable};

/// Run one evaluation pass over every computed field.
///
/// Fields are visited in dependency order. A computed field's result is
/// replaced by its rounded value, which is also published under the field's
/// variable for the formulas visited after it. A formula that fails leaves
/// the field and the variable table untouched; the pass carries on.
pub fn evaluate_formulas(
    results: &mut [TestResult],
    variables: &mut VariableTable,
    options: &EvaluationOptions,
) -> PassSummary {
    let order = dependency_order(results, options.dependency_matching);
    let mut fields = Vec::with_capacity(order.len());

    for &idx in &order {
        let field = &mut results[idx];
        let outcome = match field.formula() {
            None => FieldOutcome::Input,
            Some(formula) => match compute(formula, variables, options.decimal_places) {
                Ok((text, value)) => {
                    if let Some(name) = field.variable() {
                        variables.publish(name, value);
                    }
                    debug!(field = %field.test_name, result = %text, "computed");
                    field.result = ResultValue::Text(text.clone());
                    FieldOutcome::Computed { value: text }
                }
                Err(err) => {
                    warn!(
                        field = %field.test_name,
                        formula = %formula,
                        error = %err,
                        "formula evaluation failed, keeping previous result"
                    );
                    FieldOutcome::Failed {
                        reason: err.to_string(),
                    }
                }
            },
        };
        fields.push(FieldReport {
            index: idx,
            test_name: field.test_name.clone(),
            outcome,
        });
    }

    PassSummary { order, fields }
}

/// Evaluate a formula and round it. Returns the stored text and the value
/// to publish.
fn compute(
    formula: &str,
    variables: &VariableTable,
    places: u32,
) -> Result<(String, f64), ExpressionError> {
    match expr::evaluate(formula, variables)? {
        FormulaValue::Number(n) => {
            let rounded = round_result(n, places).ok_or(ExpressionError::NonFinite(n))?;
            Ok((rounded.text, rounded.value))
        }
        boolean @ FormulaValue::Boolean(b) => Ok((b.to_string(), boolean.as_f64())),
    }
}

/// A number rounded for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Rounded {
    /// Stored as the field's result.
    pub text: String,
    /// Published under the field's variable.
    pub value: f64,
}

/// Round `value` to `places` decimals for storage and publishing. `None`
/// only for NaN and infinity.
///
/// Values inside `Decimal`'s range go through [`round_to`]. Larger (or
/// vanishingly small) ones are rounded as doubles instead.
pub fn round_result(value: f64, places: u32) -> Option<Rounded> {
    if !value.is_finite() {
        return None;
    }
    if let Some(decimal) = round_to(value, places) {
        return Some(Rounded {
            text: decimal.to_string(),
            value: decimal.to_f64().unwrap_or(value),
        });
    }

    // beyond 2^53 a double has no fractional digits left to round
    let rounded = if value.abs() >= 9_007_199_254_740_992.0 {
        value
    } else {
        let factor = 10f64.powi(places.min(308) as i32);
        (value * factor).round() / factor
    };
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    Some(Rounded {
        text: rounded.to_string(),
        value: rounded,
    })
}

/// Round half away from zero to `places` decimals, dropping trailing zeros
/// (`10.0` becomes `10`). The exact binary value is rounded, so `1.45`
/// (stored as 1.4499999…) becomes `1.4`. `None` when the value has no
/// decimal form (NaN, infinity, or beyond `Decimal`'s range).
pub fn round_to(value: f64, places: u32) -> Option<Decimal> {
    let decimal = Decimal::from_f64_retain(value)?;
    Some(
        decimal
            .round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
            .normalize(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::DependencyMatching;
    use crate::templates::schema::{InputType, TestFieldDefinition};

    fn results(defs: &[TestFieldDefinition]) -> Vec<TestResult> {
        defs.iter().map(TestResult::from).collect()
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(10.0, 1).unwrap().to_string(), "10");
        assert_eq!(round_to(1.0 / 3.0, 1).unwrap().to_string(), "0.3");
        assert_eq!(round_to(2.25, 1).unwrap().to_string(), "2.3");
        assert_eq!(round_to(-2.25, 1).unwrap().to_string(), "-2.3");
        assert_eq!(round_to(0.04, 1).unwrap().to_string(), "0");
        assert_eq!(round_to(1.23456, 3).unwrap().to_string(), "1.235");
        assert!(round_to(f64::NAN, 1).is_none());
        assert!(round_to(f64::INFINITY, 1).is_none());
    }

    #[test]
    fn test_round_to_uses_binary_value() {
        assert_eq!(round_to(1.45, 1).unwrap().to_string(), "1.4");
        assert_eq!(round_to(0.35, 1).unwrap().to_string(), "0.3");
        assert_eq!(round_to(1.5 / 10.0, 1).unwrap().to_string(), "0.1");
        assert_eq!(round_to(2.5, 0).unwrap().to_string(), "3");
    }

    #[test]
    fn test_round_result_outside_decimal_range() {
        let big = round_result(1e30, 1).unwrap();
        assert_eq!(big.value, 1e30);
        assert_eq!(big.text, 1e30f64.to_string());
        assert_ne!(big.text, "0");

        assert_eq!(round_result(-4e29, 1).unwrap().value, -4e29);
        assert!(round_result(f64::NAN, 1).is_none());
        assert!(round_result(f64::NEG_INFINITY, 1).is_none());
    }

    #[test]
    fn test_large_formula_result_is_computed() {
        let mut fields = results(&[TestFieldDefinition::computed("Big", "x * 2")]);
        let mut vars = VariableTable::new();
        vars.publish("x", 1e30);

        let summary = evaluate_formulas(&mut fields, &mut vars, &EvaluationOptions::default());
        assert_eq!(summary.failures().count(), 0);
        assert_eq!(fields[0].result.as_number(), Some(2e30));
    }

    #[test]
    fn test_computes_from_variables() {
        let mut fields = results(&[
            TestFieldDefinition::input("A", InputType::Number).with_variable("x"),
            TestFieldDefinition::computed("B", "x * 2"),
        ]);
        let mut vars = VariableTable::new();
        vars.publish("x", 5.0);

        let summary = evaluate_formulas(&mut fields, &mut vars, &EvaluationOptions::default());
        assert_eq!(fields[1].result, ResultValue::from("10"));
        assert_eq!(summary.computed_count(), 1);
        assert_eq!(summary.outcome_of(0), Some(&FieldOutcome::Input));
    }

    #[test]
    fn test_publishes_rounded_value() {
        let mut fields = results(&[
            TestFieldDefinition::computed("Third", "x / 3").with_variable("t"),
            TestFieldDefinition::computed("Scaled", "t * 10"),
        ]);
        let mut vars = VariableTable::new();
        vars.publish("x", 1.0);

        evaluate_formulas(&mut fields, &mut vars, &EvaluationOptions::default());
        assert_eq!(fields[0].result, ResultValue::from("0.3"));
        assert_eq!(vars.get("t"), Some(0.3));
        assert_eq!(fields[1].result, ResultValue::from("3"));
    }

    #[test]
    fn test_failure_keeps_previous_result() {
        let mut fields = results(&[
            TestFieldDefinition::computed("Broken", "undefinedVar + 1").with_variable("b"),
            TestFieldDefinition::computed("Fine", "2 + 2"),
        ]);
        fields[0].result = ResultValue::from("7");
        let mut vars = VariableTable::new();

        let summary = evaluate_formulas(&mut fields, &mut vars, &EvaluationOptions::default());
        assert_eq!(fields[0].result, ResultValue::from("7"));
        assert!(!vars.contains("b"));
        assert_eq!(fields[1].result, ResultValue::from("4"));
        assert_eq!(summary.failures().count(), 1);
    }

    #[test]
    fn test_boolean_formula() {
        let mut fields = results(&[
            TestFieldDefinition::computed("High", "x > 100").with_variable("high"),
        ]);
        let mut vars = VariableTable::new();
        vars.publish("x", 140.0);

        evaluate_formulas(&mut fields, &mut vars, &EvaluationOptions::default());
        assert_eq!(fields[0].result, ResultValue::from("true"));
        assert_eq!(vars.get("high"), Some(1.0));
    }

    #[test]
    fn test_decimal_places_option() {
        let mut fields = results(&[TestFieldDefinition::computed("Ratio", "x / 3")]);
        let mut vars = VariableTable::new();
        vars.publish("x", 2.0);
        let options = EvaluationOptions {
            decimal_places: 2,
            dependency_matching: DependencyMatching::Substring,
        };

        evaluate_formulas(&mut fields, &mut vars, &options);
        assert_eq!(fields[0].result, ResultValue::from("0.67"));
    }
}
