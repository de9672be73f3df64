use std::path::Path;

use serde::{Deserialize, Serialize};
use stablefold_contracts::STABLEFOLD_CONFIG_SCHEMA_VERSION;
use stablefold_kinds::{ElementKind, ReferenceWidth, TargetLayout};

use crate::error::ConfigError;
use crate::jit::model::JitConfig;

/// Suite settings. Loaded from an optional JSON file, then overridden by CLI
/// flags. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuiteConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    pub reference_width: ReferenceWidth,
    pub fail_fast: bool,
    pub check_graph: bool,
    /// Source kinds to exercise; empty means all.
    pub kinds: Vec<ElementKind>,
    pub jit: JitConfig,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            schema_version: None,
            reference_width: ReferenceWidth::host(),
            fail_fast: false,
            check_graph: true,
            kinds: Vec::new(),
            jit: JitConfig::default(),
        }
    }
}

impl SuiteConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: SuiteConfig =
            serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.schema_version.as_deref() {
            None => Ok(()),
            Some(v) if v == STABLEFOLD_CONFIG_SCHEMA_VERSION => Ok(()),
            Some(v) => Err(ConfigError::SchemaVersion {
                found: v.to_string(),
                expected: STABLEFOLD_CONFIG_SCHEMA_VERSION,
            }),
        }
    }

    pub fn layout(&self) -> TargetLayout {
        TargetLayout::with_reference_width(self.reference_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jit::model::FoldMode;

    #[test]
    fn empty_object_is_the_default_config() {
        let cfg: SuiteConfig = serde_json::from_str("{}").expect("parse");
        assert_eq!(cfg, SuiteConfig::default());
    }

    #[test]
    fn parses_all_fields() {
        let cfg: SuiteConfig = serde_json::from_str(
            r#"{
                "schema_version": "stablefold.config@0.1.0",
                "reference_width": 4,
                "fail_fast": true,
                "check_graph": false,
                "kinds": ["int", "reference"],
                "jit": { "mode": "aggressive", "default_stable": false }
            }"#,
        )
        .expect("parse");
        cfg.validate().expect("valid");
        assert_eq!(cfg.reference_width, ReferenceWidth::Compressed);
        assert!(cfg.fail_fast);
        assert!(!cfg.check_graph);
        assert_eq!(cfg.kinds, vec![ElementKind::Int, ElementKind::Reference]);
        assert_eq!(cfg.jit.mode, FoldMode::Aggressive);
        assert!(!cfg.jit.default_stable);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_widths() {
        assert!(serde_json::from_str::<SuiteConfig>(r#"{"failfast": true}"#).is_err());
        assert!(serde_json::from_str::<SuiteConfig>(r#"{"reference_width": 6}"#).is_err());
    }

    #[test]
    fn rejects_foreign_schema_version() {
        let cfg = SuiteConfig {
            schema_version: Some("stablefold.config@9.0.0".to_string()),
            ..SuiteConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::SchemaVersion { .. })));
    }

    #[test]
    fn load_reports_missing_file_path() {
        let err = SuiteConfig::load(Path::new("/nonexistent/stablefold.json")).expect_err("missing");
        assert!(err.to_string().contains("/nonexistent/stablefold.json"));
    }
}
