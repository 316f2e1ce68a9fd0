use pipette_core::error::PipetteError;
use pipette_core::formula::PassSummary;
use pipette_core::model::{TestResult, VariableTable};
use serde::Serialize;

/// `pipette evaluate -o json` payload.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationOutput<'a> {
    pub template: &'a str,
    pub results: &'a [TestResult],
    pub variables: &'a VariableTable,
    pub summary: &'a PassSummary,
}

pub fn print<T: Serialize + ?Sized>(value: &T) -> Result<(), PipetteError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
