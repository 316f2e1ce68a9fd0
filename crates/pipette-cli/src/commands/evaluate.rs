use pipette_core::error::PipetteError;
use pipette_core::templates::builtin;
use pipette_core::templates::schema::TestTemplate;
use pipette_core::{evaluate_template, EvaluationOptions};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::output;

pub fn run(
    template: Option<PathBuf>,
    preset: Option<String>,
    inputs_file: Option<&Path>,
    set: &[(String, String)],
    options: EvaluationOptions,
    output_format: &str,
) -> Result<(), PipetteError> {
    let template = load_source(template, preset)?;
    let inputs = collect_inputs(inputs_file, set)?;
    let eval = evaluate_template(&template, &inputs, options)?;

    match output_format {
        "json" => output::json::print(&output::json::EvaluationOutput {
            template: &template.template_name,
            results: eval.session.results(),
            variables: eval.session.variables(),
            summary: &eval.summary,
        })?,
        _ => output::table::print_results(&template, eval.session.results(), &eval.summary),
    }

    Ok(())
}

/// The template named on the command line: a preset or a JSON file.
pub fn load_source(
    template: Option<PathBuf>,
    preset: Option<String>,
) -> Result<TestTemplate, PipetteError> {
    match (preset, template) {
        (Some(name), _) => builtin::load_preset(&name),
        (None, Some(path)) => pipette_core::templates::load_template(&path),
        (None, None) => Err(PipetteError::TemplateInvalid(
            "no template given (pass a file or --preset)".into(),
        )),
    }
}

/// Entered values from an optional JSON object file followed by `--set` pairs.
pub fn collect_inputs(
    file: Option<&Path>,
    set: &[(String, String)],
) -> Result<Vec<(String, String)>, PipetteError> {
    let mut inputs = Vec::new();

    if let Some(path) = file {
        let content = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        let Value::Object(map) = value else {
            return Err(PipetteError::InvalidInput {
                input: path.display().to_string(),
                reason: "expected a JSON object of name -> value".into(),
            });
        };
        for (name, value) in map {
            let raw = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                other => {
                    return Err(PipetteError::InvalidInput {
                        input: name,
                        reason: format!("unsupported value {other}"),
                    })
                }
            };
            inputs.push((name, raw));
        }
    }

    inputs.extend(set.iter().cloned());
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_inputs_file_then_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inputs.json");
        std::fs::write(&path, r#"{ "tc": 200, "Remark": "fasting", "hdl": "50" }"#).unwrap();

        let inputs = collect_inputs(Some(&path), &[("tc".into(), "210".into())]).unwrap();
        let pairs: Vec<(&str, &str)> = inputs
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("tc", "200"), ("Remark", "fasting"), ("hdl", "50"), ("tc", "210")]
        );
    }

    #[test]
    fn test_collect_inputs_rejects_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inputs.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(collect_inputs(Some(&path), &[]).is_err());
    }

    #[test]
    fn test_load_source() {
        assert!(load_source(None, Some("fbc".into())).is_ok());
        assert!(load_source(None, Some("cbc".into())).is_err());
        assert!(load_source(None, None).is_err());
    }
}
