use crate::error::PipetteError;
use crate::templates::parse_template_str;
use crate::templates::schema::TestTemplate;

const LIPID_JSON: &str = include_str!("../../../../templates/lipid.json");
const FBC_JSON: &str = include_str!("../../../../templates/fbc.json");
const RENAL_JSON: &str = include_str!("../../../../templates/renal.json");

/// Available predefined templates.
pub const PRESETS: &[&str] = &["lipid", "fbc", "renal"];

/// Load a predefined template by name.
pub fn load_preset(name: &str) -> Result<TestTemplate, PipetteError> {
    let json = match name {
        "lipid" => LIPID_JSON,
        "fbc" => FBC_JSON,
        "renal" => RENAL_JSON,
        _ => {
            return Err(PipetteError::UnknownPreset {
                name: name.to_string(),
                available: PRESETS.join(", "),
            })
        }
    };
    parse_template_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::DependencyMatching;
    use crate::templates::template_warnings;

    #[test]
    fn test_all_presets_load_cleanly() {
        for name in PRESETS {
            let t = load_preset(name).unwrap();
            assert!(!t.tests.is_empty(), "{name} has no tests");
            let warnings = template_warnings(&t, DependencyMatching::Substring);
            assert!(warnings.is_empty(), "{name}: {warnings:?}");
        }
    }

    #[test]
    fn test_lipid_preset() {
        let t = load_preset("lipid").unwrap();
        assert_eq!(t.short_name, "LIPID");
        assert_eq!(t.tests.iter().filter(|f| f.is_computed()).count(), 3);
    }

    #[test]
    fn test_unknown_preset() {
        let err = load_preset("xyz").unwrap_err();
        assert!(err.to_string().contains("lipid, fbc, renal"));
    }
}
