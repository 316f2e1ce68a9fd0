use pipette_core::error::PipetteError;
use pipette_core::model::ReportMeta;
use pipette_core::{evaluate_template, EvaluationOptions};
use std::path::PathBuf;

use super::evaluate::{collect_inputs, load_source};

pub struct ReportArgs {
    pub template: Option<PathBuf>,
    pub preset: Option<String>,
    pub inputs_file: Option<PathBuf>,
    pub set: Vec<(String, String)>,
    pub patient: String,
    pub invoice: String,
    pub template_id: Option<String>,
    pub comment: String,
    pub repeat: bool,
    pub outside: bool,
}

pub fn run(
    args: ReportArgs,
    options: EvaluationOptions,
    out: Option<PathBuf>,
) -> Result<(), PipetteError> {
    let template = load_source(args.template, args.preset)?;
    let inputs = collect_inputs(args.inputs_file.as_deref(), &args.set)?;
    let eval = evaluate_template(&template, &inputs, options)?;

    for failure in eval.summary.failures() {
        eprintln!("  warning: '{}' could not be computed", failure.test_name);
    }

    let report = eval.session.finish(ReportMeta {
        patient_id: args.patient,
        invoice_id: args.invoice,
        template_id: args
            .template_id
            .unwrap_or_else(|| template.short_name.clone()),
        comment: args.comment,
        repeat_status: args.repeat,
        out_side_status: args.outside,
    });

    let json = serde_json::to_string_pretty(&report)?;
    match out {
        Some(path) => {
            std::fs::write(&path, json)?;
            eprintln!(
                "Report for {} ({} results) written to {}",
                template.template_name,
                report.test_results.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }

    Ok(())
}
