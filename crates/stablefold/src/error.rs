use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::access::AccessDescriptor;
use crate::diagnostics::{self, Diagnostic, Stage};
use crate::harness::Phase;
use crate::jit::{CompilationError, RuntimeTrap};
use crate::policy::FoldVerdict;
use crate::value::Value;

/// Terminal failure of one scenario. None of these is retried.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("{scenario}: harness construction error: {message}")]
    Construction { scenario: String, message: String },

    #[error("{scenario}: {source}")]
    Compilation {
        scenario: String,
        #[source]
        source: CompilationError,
    },

    #[error("{scenario}: {source} (phase {phase})")]
    RuntimeTrap {
        scenario: String,
        phase: Phase,
        #[source]
        source: RuntimeTrap,
    },

    #[error("{0}")]
    AssertionMismatch(Box<Mismatch>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// Expected the pre-mutation value, saw the live one.
    ExpectedFold,
    /// Expected the live value, saw the pre-mutation one.
    ExpectedLiveRead,
    /// Two post-mutation calls disagreed.
    UnstableReread,
    /// The compiled graph's folded-constant flag disagrees with the verdict.
    GraphDisagrees,
}

impl MismatchKind {
    pub fn code(self) -> &'static str {
        match self {
            MismatchKind::ExpectedFold => diagnostics::CODE_EXPECTED_FOLD,
            MismatchKind::ExpectedLiveRead => diagnostics::CODE_EXPECTED_LIVE_READ,
            MismatchKind::UnstableReread => diagnostics::CODE_UNSTABLE_REREAD,
            MismatchKind::GraphDisagrees => diagnostics::CODE_GRAPH_DISAGREES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub kind: MismatchKind,
    pub scenario: String,
    pub method: String,
    pub access: AccessDescriptor,
    pub expected: FoldVerdict,
    pub first: Value,
    pub observed: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_folded: Option<bool>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} expected {} but observed first={}",
            self.scenario, self.method, self.expected, self.first
        )?;
        for (i, v) in self.observed.iter().enumerate() {
            write!(f, ", call{}={v}", i + 1)?;
        }
        if let Some(folded) = self.graph_folded {
            write!(f, ", graph_folded={folded}")?;
        }
        Ok(())
    }
}

impl HarnessError {
    pub fn scenario(&self) -> &str {
        match self {
            HarnessError::Construction { scenario, .. }
            | HarnessError::Compilation { scenario, .. }
            | HarnessError::RuntimeTrap { scenario, .. } => scenario,
            HarnessError::AssertionMismatch(m) => &m.scenario,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            HarnessError::Construction { .. } => diagnostics::CODE_CONSTRUCTION,
            HarnessError::Compilation { .. } => diagnostics::CODE_COMPILATION,
            HarnessError::RuntimeTrap { .. } => diagnostics::CODE_RUNTIME_TRAP,
            HarnessError::AssertionMismatch(m) => m.kind.code(),
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            HarnessError::Construction { scenario, message } => {
                Diagnostic::error(self.code(), Stage::Construction, message.clone())
                    .with_scenario(scenario)
            }
            HarnessError::Compilation { scenario, source } => {
                Diagnostic::error(self.code(), Stage::Compile, source.message.clone())
                    .with_scenario(scenario)
                    .with_data("method", &source.method)
            }
            HarnessError::RuntimeTrap {
                scenario,
                phase,
                source,
            } => Diagnostic::error(self.code(), Stage::Run, source.message.clone())
                .with_scenario(scenario)
                .with_data("method", &source.method)
                .with_data("phase", phase),
            HarnessError::AssertionMismatch(m) => {
                let mut d = Diagnostic::error(self.code(), Stage::Verify, m.to_string())
                    .with_scenario(&m.scenario)
                    .with_data("method", &m.method)
                    .with_data("access", m.access)
                    .with_data("expected", m.expected)
                    .with_data("first", m.first)
                    .with_data("observed", &m.observed);
                if let Some(folded) = m.graph_folded {
                    d = d.with_data("graph_folded", folded);
                }
                if m.kind == MismatchKind::UnstableReread {
                    d = d.with_note("compiled code must re-read live memory consistently");
                }
                d
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported config schema_version {found:?} (expected {expected:?})")]
    SchemaVersion { found: String, expected: &'static str },
}
