pub mod billing;
pub mod error;
pub mod formula;
pub mod inventory;
pub mod model;
pub mod patient;
pub mod session;
pub mod templates;

pub use formula::{DependencyMatching, EvaluationOptions};
pub use session::ReportSession;

use error::PipetteError;
use formula::PassSummary;
use templates::schema::TestTemplate;

/// A session after a batch of inputs, with the summary of the last pass.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub session: ReportSession,
    pub summary: PassSummary,
}

/// Main API entry point: fill in a template from `(field, value)` pairs.
///
/// Inputs are applied in order, each followed by a full evaluation pass, the
/// way a form recomputes on every edit. A field is looked up by test name
/// first, then by the variable it publishes. Formula failures do not fail
/// the call; they show up in the returned summary.
pub fn evaluate_template(
    template: &TestTemplate,
    inputs: &[(String, String)],
    options: EvaluationOptions,
) -> Result<Evaluation, PipetteError> {
    let mut session = ReportSession::for_template(template, options);

    let mut summary = session.reevaluate();
    for (field, value) in inputs {
        let index = resolve_field(&session, field)?;
        summary = session.set_input(index, value)?;
    }

    Ok(Evaluation { session, summary })
}

fn resolve_field(session: &ReportSession, field: &str) -> Result<usize, PipetteError> {
    session
        .index_of(field)
        .or_else(|| {
            session
                .results()
                .iter()
                .position(|r| !r.is_computed() && r.variable() == Some(field))
        })
        .ok_or_else(|| PipetteError::UnknownField(field.to_string()))
}
