//! A report being filled in: the template's fields, the values entered so
//! far and the variable table that formulas read from.
//!
//! Every entered value triggers a full re-evaluation of the computed fields.
//! Templates hold a few dozen fields at most, so the pass is cheap enough to
//! run on each edit.

use chrono::Utc;
use tracing::info;

use crate::error::PipetteError;
use crate::formula::evaluator::{evaluate_formulas, round_result, Rounded};
use crate::formula::{EvaluationOptions, PassSummary};
use crate::model::{ReportMeta, ResultValue, TestReport, TestResult, VariableTable};
use crate::templates::schema::{InputType, TestFieldDefinition, TestTemplate};

#[derive(Debug, Clone)]
pub struct ReportSession {
    results: Vec<TestResult>,
    variables: VariableTable,
    options: EvaluationOptions,
}

impl ReportSession {
    /// Start a session with one empty result per field.
    pub fn new(fields: &[TestFieldDefinition], options: EvaluationOptions) -> Self {
        Self {
            results: fields.iter().map(TestResult::from).collect(),
            variables: VariableTable::new(),
            options,
        }
    }

    pub fn for_template(template: &TestTemplate, options: EvaluationOptions) -> Self {
        info!(
            template = %template.template_name,
            fields = template.tests.len(),
            "starting report session"
        );
        Self::new(&template.tests, options)
    }

    /// Reopen a saved report for editing.
    ///
    /// Saved results are matched to template fields by position when the test
    /// names agree, otherwise by name. Entered values are republished and one
    /// pass recomputes the formulas.
    pub fn resume(
        fields: &[TestFieldDefinition],
        saved: &[TestResult],
        options: EvaluationOptions,
    ) -> Self {
        let mut session = Self::new(fields, options);

        for (idx, result) in session.results.iter_mut().enumerate() {
            let previous = saved
                .get(idx)
                .filter(|s| s.test_name == result.test_name)
                .or_else(|| saved.iter().find(|s| s.test_name == result.test_name));
            if let Some(previous) = previous {
                result.result = previous.result.clone();
            }
        }

        for result in &session.results {
            if result.is_computed() || result.result.is_empty() {
                continue;
            }
            if let Some(name) = result.variable() {
                let value = parse_input(&result.result.to_string());
                let published = rounded(value, session.options.decimal_places);
                session.variables.publish(name, published.value);
            }
        }

        session.reevaluate();
        session
    }

    /// Record a value typed into a direct-input field and recompute.
    ///
    /// The value is read as a number (unreadable input counts as 0) and
    /// rounded. Number fields store the rounded number; text and select fields
    /// keep the raw text. If the field publishes a variable, the rounded
    /// number is published whatever the input type.
    pub fn set_input(&mut self, index: usize, raw: &str) -> Result<PassSummary, PipetteError> {
        let len = self.results.len();
        let places = self.options.decimal_places;
        let field = self
            .results
            .get_mut(index)
            .ok_or(PipetteError::FieldIndex { index, len })?;

        let value = rounded(parse_input(raw), places);
        if let Some(name) = field.variable() {
            self.variables.publish(name, value.value);
        }
        field.result = match field.input_type {
            InputType::Number => ResultValue::Text(value.text),
            InputType::Text | InputType::Select => ResultValue::Text(raw.to_string()),
        };

        Ok(self.reevaluate())
    }

    /// [`set_input`](Self::set_input) on the first field with this test name.
    pub fn set_input_by_name(
        &mut self,
        test_name: &str,
        raw: &str,
    ) -> Result<PassSummary, PipetteError> {
        let index = self
            .index_of(test_name)
            .ok_or_else(|| PipetteError::UnknownField(test_name.to_string()))?;
        self.set_input(index, raw)
    }

    /// Recompute every formula against the current variable table.
    pub fn reevaluate(&mut self) -> PassSummary {
        evaluate_formulas(&mut self.results, &mut self.variables, &self.options)
    }

    pub fn index_of(&self, test_name: &str) -> Option<usize> {
        self.results.iter().position(|r| r.test_name == test_name)
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn result(&self, test_name: &str) -> Option<&ResultValue> {
        self.index_of(test_name).map(|idx| &self.results[idx].result)
    }

    pub fn variables(&self) -> &VariableTable {
        &self.variables
    }

    pub fn options(&self) -> &EvaluationOptions {
        &self.options
    }

    pub fn into_results(self) -> Vec<TestResult> {
        self.results
    }

    /// Close the session and build the report record to persist.
    pub fn finish(self, meta: ReportMeta) -> TestReport {
        info!(
            template = %meta.template_id,
            patient = %meta.patient_id,
            results = self.results.len(),
            "report assembled"
        );
        TestReport {
            patient_id: meta.patient_id,
            invoice_id: meta.invoice_id,
            template_id: meta.template_id,
            comment: meta.comment,
            complete_status: true,
            repeat_status: meta.repeat_status,
            out_side_status: meta.out_side_status,
            test_results: self.results,
            created_at: Utc::now(),
        }
    }
}

/// Read the leading number of `raw` the way a lenient form field does:
/// `"5.5 mg"` is 5.5, anything without a leading number is 0.
pub fn parse_input(raw: &str) -> f64 {
    let text = raw.trim();
    let end = numeric_prefix_len(text.as_bytes());
    text[..end]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Length of the longest prefix shaped like `[+-]digits[.digits][e[+-]digits]`,
/// or 0 when it holds no mantissa digit.
fn numeric_prefix_len(bytes: &[u8]) -> usize {
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_end = digits_from(i);
    let mut mantissa_digits = int_end - i;
    i = int_end;
    if bytes.get(i) == Some(&b'.') {
        let frac_end = digits_from(i + 1);
        mantissa_digits += frac_end - (i + 1);
        i = frac_end;
    }
    if mantissa_digits == 0 {
        return 0;
    }

    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_end = digits_from(j);
        if exp_end > j {
            i = exp_end;
        }
    }
    i
}

fn rounded(value: f64, places: u32) -> Rounded {
    round_result(value, places).unwrap_or(Rounded {
        text: "0".into(),
        value: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Vec<TestFieldDefinition> {
        vec![
            TestFieldDefinition::input("Weight", InputType::Number).with_variable("w"),
            TestFieldDefinition::input("Height", InputType::Number).with_variable("h"),
            TestFieldDefinition::computed("BMI", "w / (h / 100) ^ 2").with_variable("bmi"),
            TestFieldDefinition::input("Comment", InputType::Text),
        ]
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("12.5"), 12.5);
        assert_eq!(parse_input("  7 "), 7.0);
        assert_eq!(parse_input("5.5 mg"), 5.5);
        assert_eq!(parse_input("-3"), -3.0);
        assert_eq!(parse_input("abc"), 0.0);
        assert_eq!(parse_input(""), 0.0);
        assert_eq!(parse_input("inf"), 0.0);
        assert_eq!(parse_input("1e3x"), 1000.0);
        assert_eq!(parse_input("2.5e"), 2.5);
        assert_eq!(parse_input("7."), 7.0);
        assert_eq!(parse_input(".5"), 0.5);
        assert_eq!(parse_input("-"), 0.0);
        assert_eq!(parse_input("."), 0.0);
        assert_eq!(parse_input("1e400"), 0.0);
    }

    #[test]
    fn test_parse_input_long_text() {
        let pasted = format!("42.5{}", " mg/dL".repeat(50_000));
        assert_eq!(parse_input(&pasted), 42.5);
        assert_eq!(parse_input(&"x".repeat(100_000)), 0.0);
    }

    #[test]
    fn test_entered_value_rounds_binary_value() {
        let mut session = ReportSession::new(&fields(), EvaluationOptions::default());
        session.set_input(0, "1.45").unwrap();
        assert_eq!(session.results()[0].result, ResultValue::from("1.4"));
        session.set_input(0, "0.35").unwrap();
        assert_eq!(session.results()[0].result, ResultValue::from("0.3"));
    }

    #[test]
    fn test_huge_input_is_kept() {
        let mut session = ReportSession::new(
            &[
                TestFieldDefinition::input("A", InputType::Number).with_variable("x"),
                TestFieldDefinition::computed("B", "x * 2"),
            ],
            EvaluationOptions::default(),
        );
        session.set_input(0, "1e30").unwrap();
        assert_eq!(session.variables().get("x"), Some(1e30));
        assert_eq!(session.results()[0].result.as_number(), Some(1e30));
        assert_eq!(session.results()[1].result.as_number(), Some(2e30));
    }

    #[test]
    fn test_select_with_variable_publishes_option() {
        let mut session = ReportSession::new(
            &[
                TestFieldDefinition::input("Grade", InputType::Select)
                    .with_options(&["2", "x"])
                    .with_variable("g"),
                TestFieldDefinition::computed("Score", "g * 10"),
            ],
            EvaluationOptions::default(),
        );

        session.set_input(0, "2").unwrap();
        assert_eq!(session.results()[0].result, ResultValue::from("2"));
        assert_eq!(session.result("Score"), Some(&ResultValue::from("20")));

        session.set_input(0, "x").unwrap();
        assert_eq!(session.results()[0].result, ResultValue::from("x"));
        assert_eq!(session.variables().get("g"), Some(0.0));
        assert_eq!(session.result("Score"), Some(&ResultValue::from("0")));
    }

    #[test]
    fn test_new_session_is_empty() {
        let session = ReportSession::new(&fields(), EvaluationOptions::default());
        assert_eq!(session.results().len(), 4);
        assert!(session.results().iter().all(|r| r.result.is_empty()));
        assert!(session.variables().is_empty());
    }

    #[test]
    fn test_set_input_rounds_and_publishes() {
        let mut session = ReportSession::new(&fields(), EvaluationOptions::default());
        session.set_input(0, "70.26").unwrap();
        assert_eq!(session.results()[0].result, ResultValue::from("70.3"));
        assert_eq!(session.variables().get("w"), Some(70.3));
    }

    #[test]
    fn test_unparsable_input_is_zero() {
        let mut session = ReportSession::new(&fields(), EvaluationOptions::default());
        session.set_input(0, "n/a").unwrap();
        assert_eq!(session.results()[0].result, ResultValue::from("0"));
        assert_eq!(session.variables().get("w"), Some(0.0));
    }

    #[test]
    fn test_computed_after_all_inputs() {
        let mut session = ReportSession::new(&fields(), EvaluationOptions::default());
        session.set_input_by_name("Weight", "80").unwrap();
        let summary = session.set_input_by_name("Height", "200").unwrap();
        assert_eq!(session.result("BMI"), Some(&ResultValue::from("20")));
        assert_eq!(summary.failures().count(), 0);
    }

    #[test]
    fn test_text_field_keeps_raw_value() {
        let mut session = ReportSession::new(&fields(), EvaluationOptions::default());
        session.set_input(3, "haemolysed sample").unwrap();
        assert_eq!(
            session.results()[3].result,
            ResultValue::from("haemolysed sample")
        );
    }

    #[test]
    fn test_out_of_range_index() {
        let mut session = ReportSession::new(&fields(), EvaluationOptions::default());
        let err = session.set_input(9, "1").unwrap_err();
        assert!(matches!(err, PipetteError::FieldIndex { index: 9, len: 4 }));
    }

    #[test]
    fn test_unknown_field_name() {
        let mut session = ReportSession::new(&fields(), EvaluationOptions::default());
        assert!(session.set_input_by_name("Glucose", "5").is_err());
    }

    #[test]
    fn test_resume_recomputes() {
        let mut first = ReportSession::new(&fields(), EvaluationOptions::default());
        first.set_input(0, "80").unwrap();
        first.set_input(1, "200").unwrap();
        let saved = first.into_results();

        let mut resumed = ReportSession::resume(&fields(), &saved, EvaluationOptions::default());
        assert_eq!(resumed.result("BMI"), Some(&ResultValue::from("20")));
        assert_eq!(resumed.variables().get("w"), Some(80.0));

        resumed.set_input(0, "100").unwrap();
        assert_eq!(resumed.result("BMI"), Some(&ResultValue::from("25")));
    }

    #[test]
    fn test_finish_builds_report() {
        let mut session = ReportSession::new(&fields(), EvaluationOptions::default());
        session.set_input(0, "80").unwrap();
        let report = session.finish(ReportMeta {
            patient_id: "p-1".into(),
            invoice_id: "inv-1".into(),
            template_id: "bmi".into(),
            comment: "fasting".into(),
            repeat_status: false,
            out_side_status: true,
        });
        assert!(report.complete_status);
        assert!(report.out_side_status);
        assert_eq!(report.test_results.len(), 4);
        assert_eq!(report.test_results[0].result, ResultValue::from("80"));
    }
}
