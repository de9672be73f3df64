use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

pub const CODE_CONSTRUCTION: &str = "SF-CONSTRUCT-0001";
pub const CODE_COMPILATION: &str = "SF-COMPILE-0001";
pub const CODE_RUNTIME_TRAP: &str = "SF-TRAP-0001";
pub const CODE_EXPECTED_FOLD: &str = "SF-FOLD-0001";
pub const CODE_EXPECTED_LIVE_READ: &str = "SF-FOLD-0002";
pub const CODE_UNSTABLE_REREAD: &str = "SF-FOLD-0003";
pub const CODE_GRAPH_DISAGREES: &str = "SF-GRAPH-0001";
pub const CODE_SUITE_STOPPED: &str = "SF-SUITE-0001";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Construction,
    Compile,
    Run,
    Verify,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: String,
    pub severity: Severity,
    pub stage: Stage,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,
}

impl Diagnostic {
    pub fn error(code: &str, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity: Severity::Error,
            stage,
            message: message.into(),
            scenario: None,
            notes: Vec::new(),
            data: BTreeMap::new(),
        }
    }

    pub fn warning(code: &str, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, stage, message)
        }
    }

    pub fn with_scenario(mut self, scenario: &str) -> Self {
        self.scenario = Some(scenario.to_string());
        self
    }

    pub fn with_data(mut self, key: &str, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.data.insert(key.to_string(), v);
        }
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Orders diagnostics by scenario, then code, then message.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| {
        let a_scn = a.scenario.as_deref().unwrap_or("");
        let b_scn = b.scenario.as_deref().unwrap_or("");
        a_scn
            .cmp(b_scn)
            .then_with(|| a.code.cmp(&b.code))
            .then_with(|| a.message.cmp(&b.message))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_groups_by_scenario_then_code() {
        let mut diags = vec![
            Diagnostic::error(CODE_UNSTABLE_REREAD, Stage::Verify, "b").with_scenario("int[]@0 as long"),
            Diagnostic::error(CODE_COMPILATION, Stage::Compile, "a"),
            Diagnostic::error(CODE_EXPECTED_FOLD, Stage::Verify, "c").with_scenario("int[]@0 as long"),
        ];
        sort_diagnostics(&mut diags);
        let codes: Vec<&str> = diags.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec![CODE_COMPILATION, CODE_EXPECTED_FOLD, CODE_UNSTABLE_REREAD]);
    }

    #[test]
    fn empty_fields_are_omitted_from_json() {
        let d = Diagnostic::error(CODE_RUNTIME_TRAP, Stage::Run, "trap");
        let v = serde_json::to_value(&d).expect("serialize");
        let obj = v.as_object().expect("object");
        assert!(!obj.contains_key("scenario"));
        assert!(!obj.contains_key("notes"));
        assert!(!obj.contains_key("data"));
        assert_eq!(obj.get("stage").and_then(|s| s.as_str()), Some("run"));
    }
}
