use stablefold::access::AccessDescriptor;
use stablefold::harness::{Harness, Scenario};
use stablefold::jit::model::ModelJit;
use stablefold::matrix;
use stablefold::policy::{FoldPolicy, FoldVerdict};
use stablefold::registry::StableRegistry;
use stablefold::report::SuiteReport;
use stablefold::{ElementKind, ReferenceWidth, TargetLayout};
use stablefold_contracts::STABLEFOLD_SUITE_REPORT_SCHEMA_VERSION;

fn run_full(width: ReferenceWidth) -> (stablefold::harness::SuiteResult, String) {
    let layout = TargetLayout::with_reference_width(width);
    let policy = FoldPolicy::new(layout);
    let mut reg = StableRegistry::with_default_containers(layout);
    let scenarios = matrix::generate(&reg, &policy, &[]);
    let digest = matrix::matrix_sha256(&matrix::entries(&policy, &[]));
    let result = Harness::new(ModelJit::default(), policy).run_suite(&mut reg, &scenarios, false);
    assert!(reg.handles().all(|h| reg.is_default(h)), "registry is left reset");
    (result, digest)
}

#[test]
fn full_suite_passes_with_wide_references() {
    let (result, _) = run_full(ReferenceWidth::Wide);
    for err in &result.failures {
        eprintln!("{err}");
    }
    assert!(result.ok());
    assert_eq!(result.outcomes.len(), 79);
    let folded = result
        .outcomes
        .iter()
        .filter(|o| o.expected == FoldVerdict::MustFold)
        .count();
    assert_eq!(folded, 17);
}

#[test]
fn full_suite_passes_with_compressed_references() {
    let (result, _) = run_full(ReferenceWidth::Compressed);
    for err in &result.failures {
        eprintln!("{err}");
    }
    assert!(result.ok());
    assert!(result.outcomes.iter().all(|o| o.graph_folded == Some(o.expected.folds())));
}

#[test]
fn report_json_carries_counts_and_digest() {
    let (result, digest) = run_full(ReferenceWidth::Wide);
    let report = SuiteReport::from_result(&result, digest.clone()).with_meta("reference_width", 8);
    assert_eq!(report.exit_code(), 0);

    let v = serde_json::to_value(&report).expect("serialize report");
    assert_eq!(v["schema_version"], STABLEFOLD_SUITE_REPORT_SCHEMA_VERSION);
    assert_eq!(v["ok"], true);
    assert_eq!(v["scenarios_total"], 79);
    assert_eq!(v["scenarios_passed"], 79);
    assert_eq!(v["scenarios_failed"], 0);
    assert_eq!(v["matrix_sha256"], digest.as_str());
    assert_eq!(v["meta"]["reference_width"], 8);
    assert!(v["diagnostics"].as_array().expect("diagnostics").is_empty());
    assert!(v.get("outcomes").is_none());
}

#[test]
fn matrix_digest_depends_on_layout() {
    let (_, wide) = run_full(ReferenceWidth::Wide);
    let (_, compressed) = run_full(ReferenceWidth::Compressed);
    assert_eq!(wide.len(), 64);
    assert_ne!(wide, compressed);
}

#[test]
fn reference_slot_read_as_any_scalar_rereads_live_memory() {
    for width in [ReferenceWidth::Compressed, ReferenceWidth::Wide] {
        let layout = TargetLayout::with_reference_width(width);
        let policy = FoldPolicy::new(layout);
        let mut reg = StableRegistry::with_default_containers(layout);
        let harness = Harness::new(ModelJit::default(), policy);
        for requested in ElementKind::SCALARS {
            let access = AccessDescriptor::at_base(ElementKind::Reference, requested);
            let s = Scenario::for_access(&reg, &policy, access).expect("reference container");
            assert_eq!(s.expected, FoldVerdict::MustNotFold, "{access}");
            let out = harness
                .run(&mut reg, &s)
                .unwrap_or_else(|e| panic!("{access}: {e}"));
            assert_ne!(out.observed[0], out.first, "{access}");
            assert_eq!(out.observed[0], out.observed[1], "{access}");
        }
    }
}
