//! Shared, version-pinned protocol identifiers.
//!
//! These constants are the single source of truth for schema/version strings that
//! appear in machine-readable output of the suite runner.

pub const STABLEFOLD_SUITE_REPORT_SCHEMA_VERSION: &str = "stablefold.suite.report@0.1.0";
pub const STABLEFOLD_MATRIX_SCHEMA_VERSION: &str = "stablefold.matrix@0.1.0";
pub const STABLEFOLD_VERDICT_SCHEMA_VERSION: &str = "stablefold.verdict@0.1.0";
pub const STABLEFOLD_CONFIG_SCHEMA_VERSION: &str = "stablefold.config@0.1.0";
