use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use stablefold_contracts::STABLEFOLD_SUITE_REPORT_SCHEMA_VERSION;

use crate::diagnostics::{sort_diagnostics, Diagnostic, Stage, CODE_SUITE_STOPPED};
use crate::harness::{ScenarioOutcome, SuiteResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuiteReport {
    pub schema_version: &'static str,
    pub ok: bool,
    pub scenarios_total: usize,
    pub scenarios_passed: usize,
    pub scenarios_failed: usize,
    pub scenarios_skipped: usize,
    pub matrix_sha256: String,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outcomes: Vec<ScenarioOutcome>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, Value>,
}

impl SuiteReport {
    pub fn from_result(result: &SuiteResult, matrix_sha256: String) -> Self {
        let mut diagnostics: Vec<Diagnostic> =
            result.failures.iter().map(|e| e.to_diagnostic()).collect();
        sort_diagnostics(&mut diagnostics);
        if result.skipped > 0 {
            diagnostics.push(
                Diagnostic::warning(
                    CODE_SUITE_STOPPED,
                    Stage::Run,
                    format!("suite stopped early; {} scenarios not run", result.skipped),
                )
                .with_data("skipped", result.skipped),
            );
        }
        Self {
            schema_version: STABLEFOLD_SUITE_REPORT_SCHEMA_VERSION,
            ok: result.ok(),
            scenarios_total: result.total(),
            scenarios_passed: result.outcomes.len(),
            scenarios_failed: result.failures.len(),
            scenarios_skipped: result.skipped,
            matrix_sha256,
            diagnostics,
            outcomes: Vec::new(),
            meta: BTreeMap::new(),
        }
    }

    pub fn with_outcomes(mut self, outcomes: Vec<ScenarioOutcome>) -> Self {
        self.outcomes = outcomes;
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.meta.insert(key.to_string(), v);
        }
        self
    }

    /// Exit code of the suite runner: 0 when every scenario passed, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.ok {
            0
        } else {
            1
        }
    }
}
