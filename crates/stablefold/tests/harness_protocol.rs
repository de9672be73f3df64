use std::cell::Cell;

use stablefold::access::AccessDescriptor;
use stablefold::error::{HarnessError, MismatchKind};
use stablefold::harness::{Harness, Phase, Scenario};
use stablefold::jit::model::{FoldMode, JitConfig, ModelArtifact, ModelJit};
use stablefold::jit::{CompilationError, CompiledArtifact, Compiler, RuntimeTrap, TargetMethod};
use stablefold::matrix;
use stablefold::policy::{FoldPolicy, FoldVerdict};
use stablefold::registry::StableRegistry;
use stablefold::value::Value;
use stablefold::{ElementKind, ReferenceWidth, TargetLayout};

fn wide() -> TargetLayout {
    TargetLayout::with_reference_width(ReferenceWidth::Wide)
}

fn setup() -> (StableRegistry, FoldPolicy) {
    let reg = StableRegistry::with_default_containers(wide());
    let policy = FoldPolicy::new(reg.layout());
    (reg, policy)
}

fn scenario(reg: &StableRegistry, policy: &FoldPolicy, access: AccessDescriptor) -> Scenario {
    Scenario::for_access(reg, policy, access).expect("container for source kind")
}

fn mismatch_kind(err: &HarnessError) -> Option<MismatchKind> {
    match err {
        HarnessError::AssertionMismatch(m) => Some(m.kind),
        _ => None,
    }
}

#[test]
fn int_same_kind_read_is_folded() {
    let (mut reg, policy) = setup();
    let s = scenario(&reg, &policy, AccessDescriptor::at_base(ElementKind::Int, ElementKind::Int));
    assert_eq!(s.expected, FoldVerdict::MustFold);

    let harness = Harness::new(ModelJit::default(), policy);
    let out = harness.run(&mut reg, &s).expect("scenario passes");
    assert_eq!(out.first, Value::Int(0));
    assert_eq!(out.observed, vec![Value::Int(0)]);
    assert_eq!(out.graph_folded, Some(true));
    assert_eq!(out.phase, Phase::Done);
    assert!(reg.is_default(s.container), "registry is reset after a passing scenario");
}

#[test]
fn int_read_as_long_rereads_live_memory() {
    let (mut reg, policy) = setup();
    let s = scenario(&reg, &policy, AccessDescriptor::at_base(ElementKind::Int, ElementKind::Long));
    assert_eq!(s.expected, FoldVerdict::MustNotFold);

    let harness = Harness::new(ModelJit::default(), policy);
    let out = harness.run(&mut reg, &s).expect("scenario passes");
    assert_eq!(out.first, Value::Long(0));
    assert_eq!(
        out.observed,
        vec![Value::Long(i32::MAX as i64), Value::Long(i32::MAX as i64)]
    );
    assert_eq!(out.graph_folded, Some(false));
}

#[test]
fn short_misaligned_read_is_not_folded() {
    let (mut reg, policy) = setup();
    let harness = Harness::new(ModelJit::default(), policy);

    let base = scenario(&reg, &policy, AccessDescriptor::at_base(ElementKind::Short, ElementKind::Short));
    let off = scenario(&reg, &policy, AccessDescriptor::misaligned(ElementKind::Short, wide()));
    assert_eq!(base.expected, FoldVerdict::MustFold);
    assert_eq!(off.expected, FoldVerdict::MustNotFold);

    harness.run(&mut reg, &base).expect("aligned passes");
    let out = harness.run(&mut reg, &off).expect("misaligned passes");
    assert_eq!(out.observed[0], Value::Short(0x7f));
}

#[test]
fn rerunning_after_reset_gives_same_verdict_and_baseline() {
    let (mut reg, policy) = setup();
    let harness = Harness::new(ModelJit::default(), policy);
    for access in [
        AccessDescriptor::at_base(ElementKind::Char, ElementKind::Char),
        AccessDescriptor::at_base(ElementKind::Reference, ElementKind::Long),
    ] {
        let s = scenario(&reg, &policy, access);
        reg.reset_all();
        let a = harness.run(&mut reg, &s).expect("first run");
        reg.reset_all();
        let b = harness.run(&mut reg, &s).expect("second run");
        assert_eq!(a.expected, b.expected);
        assert_eq!(a.first, b.first);
    }
}

#[test]
fn method_with_two_call_sites_is_a_construction_error() {
    let (mut reg, policy) = setup();
    let mut s = scenario(&reg, &policy, AccessDescriptor::at_base(ElementKind::Byte, ElementKind::Byte));
    s.method.call_sites.push(s.access);

    let err = Harness::new(ModelJit::default(), policy)
        .run(&mut reg, &s)
        .expect_err("two call sites");
    assert!(matches!(err, HarnessError::Construction { .. }), "{err}");
    assert!(err.to_string().contains("2 call sites"));
}

#[test]
fn method_with_no_call_sites_is_a_construction_error() {
    let (mut reg, policy) = setup();
    let mut s = scenario(&reg, &policy, AccessDescriptor::at_base(ElementKind::Byte, ElementKind::Byte));
    s.method.call_sites.clear();

    let err = Harness::new(ModelJit::default(), policy)
        .run(&mut reg, &s)
        .expect_err("no call sites");
    assert_eq!(err.code(), "SF-CONSTRUCT-0001");
}

#[test]
fn scenario_on_unreset_container_is_rejected() {
    let (mut reg, policy) = setup();
    let s = scenario(&reg, &policy, AccessDescriptor::at_base(ElementKind::Long, ElementKind::Long));
    reg.set_changed(s.container);

    let err = Harness::new(ModelJit::default(), policy)
        .run(&mut reg, &s)
        .expect_err("not reset");
    assert!(matches!(err, HarnessError::Construction { .. }));
}

#[test]
fn scenario_verdict_must_agree_with_policy() {
    let (mut reg, policy) = setup();
    let mut s = scenario(&reg, &policy, AccessDescriptor::at_base(ElementKind::Long, ElementKind::Long));
    s.expected = FoldVerdict::MustNotFold;

    let err = Harness::new(ModelJit::default(), policy)
        .run(&mut reg, &s)
        .expect_err("verdict disagrees");
    assert!(err.to_string().contains("fold policy"));
}

#[test]
fn container_from_another_registry_is_rejected() {
    let (mut reg, policy) = setup();
    let other = StableRegistry::with_default_containers(wide());
    let s = scenario(&other, &policy, AccessDescriptor::at_base(ElementKind::Int, ElementKind::Int));

    let err = Harness::new(ModelJit::default(), policy)
        .run(&mut reg, &s)
        .expect_err("untracked container");
    assert!(matches!(err, HarnessError::Construction { .. }));
}

#[test]
fn jit_that_never_folds_fails_must_fold_scenarios() {
    let (mut reg, policy) = setup();
    let jit = ModelJit::new(JitConfig {
        mode: FoldMode::Disabled,
        ..JitConfig::default()
    });
    let s = scenario(&reg, &policy, AccessDescriptor::at_base(ElementKind::Float, ElementKind::Int));

    let err = Harness::new(jit, policy).run(&mut reg, &s).expect_err("not folded");
    assert_eq!(mismatch_kind(&err), Some(MismatchKind::ExpectedFold));
    let diag = err.to_diagnostic();
    assert_eq!(diag.code, "SF-FOLD-0001");
    assert_eq!(diag.scenario.as_deref(), Some("float[]@0 as int"));
    assert!(diag.data.contains_key("observed"));
}

#[test]
fn jit_that_folds_everything_fails_must_not_fold_scenarios() {
    let (mut reg, policy) = setup();
    let jit = ModelJit::new(JitConfig {
        mode: FoldMode::Aggressive,
        ..JitConfig::default()
    });
    let s = scenario(&reg, &policy, AccessDescriptor::misaligned(ElementKind::Int, wide()));

    let err = Harness::new(jit, policy).run(&mut reg, &s).expect_err("folded");
    assert_eq!(mismatch_kind(&err), Some(MismatchKind::ExpectedLiveRead));
    assert_eq!(err.code(), "SF-FOLD-0002");
}

#[test]
fn out_of_bounds_read_traps_at_baseline() {
    let (mut reg, policy) = setup();
    let access = AccessDescriptor::at_offset(ElementKind::Long, ElementKind::Long, 16, wide());
    let s = scenario(&reg, &policy, access);

    let err = Harness::new(ModelJit::default(), policy)
        .run(&mut reg, &s)
        .expect_err("trap");
    match err {
        HarnessError::RuntimeTrap { phase, .. } => assert_eq!(phase, Phase::BaselineCalled),
        other => panic!("expected runtime trap, got {other}"),
    }
}

struct RefusingJit;

impl Compiler for RefusingJit {
    type Artifact = ModelArtifact;

    fn call_uncompiled(&self, method: &TargetMethod, registry: &StableRegistry) -> Result<Value, RuntimeTrap> {
        ModelJit::default().call_uncompiled(method, registry)
    }

    fn compile(&self, method: &TargetMethod, _: &StableRegistry) -> Result<ModelArtifact, CompilationError> {
        Err(CompilationError::new(&method.name, "code cache full"))
    }
}

#[test]
fn compilation_failure_names_the_method() {
    let (mut reg, policy) = setup();
    let s = scenario(&reg, &policy, AccessDescriptor::at_base(ElementKind::Double, ElementKind::Long));

    let err = Harness::new(RefusingJit, policy).run(&mut reg, &s).expect_err("refused");
    let diag = err.to_diagnostic();
    assert_eq!(diag.code, "SF-COMPILE-0001");
    assert_eq!(
        diag.data.get("method").and_then(|v| v.as_str()),
        Some("readD_J")
    );
}

/// Wraps the model JIT and hides or falsifies artifact introspection.
struct WrappedJit {
    lie_about_graph: bool,
    flaky: bool,
}

struct WrappedArtifact {
    inner: ModelArtifact,
    lie_about_graph: bool,
    flaky: Option<Cell<i64>>,
}

impl Compiler for WrappedJit {
    type Artifact = WrappedArtifact;

    fn call_uncompiled(&self, method: &TargetMethod, registry: &StableRegistry) -> Result<Value, RuntimeTrap> {
        ModelJit::default().call_uncompiled(method, registry)
    }

    fn compile(&self, method: &TargetMethod, registry: &StableRegistry) -> Result<WrappedArtifact, CompilationError> {
        Ok(WrappedArtifact {
            inner: ModelJit::default().compile(method, registry)?,
            lie_about_graph: self.lie_about_graph,
            flaky: self.flaky.then(|| Cell::new(0)),
        })
    }
}

impl CompiledArtifact for WrappedArtifact {
    fn method(&self) -> &str {
        self.inner.method()
    }

    fn invoke(&self, registry: &StableRegistry) -> Result<Value, RuntimeTrap> {
        if let Some(n) = &self.flaky {
            n.set(n.get() + 1);
            return Ok(Value::Long(n.get()));
        }
        self.inner.invoke(registry)
    }

    fn is_constant_folded_stable_read(&self) -> Option<bool> {
        if self.lie_about_graph {
            self.inner.is_constant_folded_stable_read().map(|f| !f)
        } else {
            None
        }
    }
}

#[test]
fn opaque_artifact_is_judged_by_behavior_alone() {
    let (mut reg, policy) = setup();
    let jit = WrappedJit {
        lie_about_graph: false,
        flaky: false,
    };
    let s = scenario(&reg, &policy, AccessDescriptor::at_base(ElementKind::Bool, ElementKind::Byte));
    let out = Harness::new(jit, policy).run(&mut reg, &s).expect("passes");
    assert_eq!(out.graph_folded, None);
}

#[test]
fn graph_flag_disagreeing_with_behavior_is_reported() {
    let (mut reg, policy) = setup();
    let s = scenario(&reg, &policy, AccessDescriptor::at_base(ElementKind::Int, ElementKind::Int));

    let liar = || WrappedJit {
        lie_about_graph: true,
        flaky: false,
    };
    let err = Harness::new(liar(), policy).run(&mut reg, &s).expect_err("graph lies");
    assert_eq!(mismatch_kind(&err), Some(MismatchKind::GraphDisagrees));

    reg.reset_all();
    Harness::new(liar(), policy)
        .with_graph_check(false)
        .run(&mut reg, &s)
        .expect("graph check disabled");
}

#[test]
fn unstable_rereads_are_reported() {
    let (mut reg, policy) = setup();
    let jit = WrappedJit {
        lie_about_graph: false,
        flaky: true,
    };
    let s = scenario(&reg, &policy, AccessDescriptor::at_base(ElementKind::Int, ElementKind::Long));
    let err = Harness::new(jit, policy).run(&mut reg, &s).expect_err("flaky");
    assert_eq!(mismatch_kind(&err), Some(MismatchKind::UnstableReread));
    assert!(err.to_diagnostic().notes.iter().any(|n| n.contains("consistently")));
}

#[test]
fn construction_error_stops_the_suite() {
    let (mut reg, policy) = setup();
    let mut scenarios = matrix::generate(&reg, &policy, &[ElementKind::Int]);
    let n = scenarios.len();
    scenarios[1].method.call_sites.clear();

    let result = Harness::new(ModelJit::default(), policy).run_suite(&mut reg, &scenarios, false);
    assert_eq!(result.outcomes.len(), 1);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.skipped, n - 2);
    assert!(!result.ok());
}

#[test]
fn fail_fast_stops_at_first_mismatch_otherwise_all_are_reported() {
    let (mut reg, policy) = setup();
    let scenarios = matrix::generate(&reg, &policy, &[ElementKind::Byte]);
    let jit = || {
        ModelJit::new(JitConfig {
            mode: FoldMode::Disabled,
            ..JitConfig::default()
        })
    };

    let all = Harness::new(jit(), policy).run_suite(&mut reg, &scenarios, false);
    // byte[] folds as bool and byte only.
    assert_eq!(all.failures.len(), 2);
    assert_eq!(all.total(), scenarios.len());

    let fast = Harness::new(jit(), policy).run_suite(&mut reg, &scenarios, true);
    assert_eq!(fast.failures.len(), 1);
    assert_eq!(fast.total(), scenarios.len());
    assert!(fast.skipped > 0);
}
