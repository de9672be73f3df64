//! Compile-once verification protocol.
//!
//! For one scenario: call the target uncompiled, compile it, mutate element 0
//! of its container, call the compiled artifact again and check the result
//! against the fold policy's verdict. Scenarios run one at a time against an
//! explicitly borrowed registry.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::access::AccessDescriptor;
use crate::error::{HarnessError, Mismatch, MismatchKind};
use crate::jit::{CompiledArtifact, Compiler, TargetMethod};
use crate::policy::{FoldPolicy, FoldVerdict};
use crate::registry::{ContainerHandle, StableRegistry};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    BaselineCalled,
    Compiled,
    Mutated,
    Reverified,
    Done,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::BaselineCalled => "baseline_called",
            Phase::Compiled => "compiled",
            Phase::Mutated => "mutated",
            Phase::Reverified => "reverified",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Designated mutator of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutator {
    /// Flip element 0 from its default to its changed value.
    FlipElement0 { container: ContainerHandle },
}

impl Mutator {
    pub fn container(&self) -> ContainerHandle {
        match self {
            Mutator::FlipElement0 { container } => *container,
        }
    }

    pub fn apply(&self, registry: &mut StableRegistry) -> Option<Value> {
        match self {
            Mutator::FlipElement0 { container } => registry.set_changed(*container),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    pub name: String,
    pub container: ContainerHandle,
    pub access: AccessDescriptor,
    pub method: TargetMethod,
    pub mutate: Mutator,
    pub expected: FoldVerdict,
}

impl Scenario {
    /// Builds the scenario for `access` against the registry's container of
    /// `access.source_kind`. `None` if no such container is registered.
    pub fn for_access(
        registry: &StableRegistry,
        policy: &FoldPolicy,
        access: AccessDescriptor,
    ) -> Option<Self> {
        let container = registry.handle_for(access.source_kind)?;
        Some(Self {
            name: access.to_string(),
            container,
            access,
            method: TargetMethod::raw_read(container, access),
            mutate: Mutator::FlipElement0 { container },
            expected: policy.verdict(&access),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioOutcome {
    pub scenario: String,
    pub method: String,
    pub expected: FoldVerdict,
    pub first: Value,
    pub observed: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_folded: Option<bool>,
    pub phase: Phase,
}

#[derive(Debug, Default)]
pub struct SuiteResult {
    pub outcomes: Vec<ScenarioOutcome>,
    pub failures: Vec<HarnessError>,
    /// Scenarios never started because the suite stopped early.
    pub skipped: usize,
}

impl SuiteResult {
    pub fn ok(&self) -> bool {
        self.failures.is_empty() && self.skipped == 0
    }

    pub fn total(&self) -> usize {
        self.outcomes.len() + self.failures.len() + self.skipped
    }
}

pub struct Harness<C> {
    compiler: C,
    policy: FoldPolicy,
    check_graph: bool,
}

impl<C: Compiler> Harness<C> {
    pub fn new(compiler: C, policy: FoldPolicy) -> Self {
        Self {
            compiler,
            policy,
            check_graph: true,
        }
    }

    /// Also assert the artifact's folded-constant flag, when it offers one.
    pub fn with_graph_check(mut self, check_graph: bool) -> Self {
        self.check_graph = check_graph;
        self
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    pub fn policy(&self) -> &FoldPolicy {
        &self.policy
    }

    /// Runs one scenario. The scenario's container must hold its default value
    /// on entry (see [`StableRegistry::reset_all`]); the registry is reset again
    /// once the scenario passes.
    pub fn run(
        &self,
        registry: &mut StableRegistry,
        scenario: &Scenario,
    ) -> Result<ScenarioOutcome, HarnessError> {
        let _span = tracing::debug_span!("scenario", name = %scenario.name).entered();
        self.check_construction(registry, scenario)?;
        debug!(phase = %Phase::Init, method = %scenario.method.name, expected = %scenario.expected);

        let first = self
            .compiler
            .call_uncompiled(&scenario.method, registry)
            .map_err(|source| HarnessError::RuntimeTrap {
                scenario: scenario.name.clone(),
                phase: Phase::BaselineCalled,
                source,
            })?;
        debug!(phase = %Phase::BaselineCalled, %first);

        let artifact = self
            .compiler
            .compile(&scenario.method, registry)
            .map_err(|source| HarnessError::Compilation {
                scenario: scenario.name.clone(),
                source,
            })?;
        debug!(phase = %Phase::Compiled, method = artifact.method());

        let changed = scenario.mutate.apply(registry).ok_or_else(|| {
            HarnessError::Construction {
                scenario: scenario.name.clone(),
                message: "mutator did not change the container".to_string(),
            }
        })?;
        debug!(phase = %Phase::Mutated, %changed);

        let invoke = |registry: &StableRegistry| {
            artifact
                .invoke(registry)
                .map_err(|source| HarnessError::RuntimeTrap {
                    scenario: scenario.name.clone(),
                    phase: Phase::Reverified,
                    source,
                })
        };
        let graph_folded = if self.check_graph {
            artifact.is_constant_folded_stable_read()
        } else {
            None
        };
        let mismatch = |kind: MismatchKind, observed: Vec<Value>| {
            HarnessError::AssertionMismatch(Box::new(Mismatch {
                kind,
                scenario: scenario.name.clone(),
                method: artifact.method().to_string(),
                access: scenario.access,
                expected: scenario.expected,
                first,
                observed,
                graph_folded,
            }))
        };

        let mut observed = vec![invoke(&*registry)?];
        match scenario.expected {
            FoldVerdict::MustFold => {
                if observed[0] != first {
                    return Err(mismatch(MismatchKind::ExpectedFold, observed));
                }
            }
            FoldVerdict::MustNotFold => {
                if observed[0] == first {
                    return Err(mismatch(MismatchKind::ExpectedLiveRead, observed));
                }
                observed.push(invoke(&*registry)?);
                if observed[1] != observed[0] {
                    return Err(mismatch(MismatchKind::UnstableReread, observed));
                }
            }
        }
        if let Some(folded) = graph_folded {
            if folded != scenario.expected.folds() {
                return Err(mismatch(MismatchKind::GraphDisagrees, observed));
            }
        }
        debug!(phase = %Phase::Reverified, calls = observed.len());

        registry.reset_all();
        debug!(phase = %Phase::Done);

        Ok(ScenarioOutcome {
            scenario: scenario.name.clone(),
            method: artifact.method().to_string(),
            expected: scenario.expected,
            first,
            observed,
            graph_folded,
            phase: Phase::Done,
        })
    }

    /// Runs `scenarios` in order, resetting the registry before each one.
    ///
    /// A construction error stops the suite immediately; any other failure
    /// stops it only when `fail_fast` is set.
    pub fn run_suite(
        &self,
        registry: &mut StableRegistry,
        scenarios: &[Scenario],
        fail_fast: bool,
    ) -> SuiteResult {
        let mut result = SuiteResult::default();
        for (i, scenario) in scenarios.iter().enumerate() {
            registry.reset_all();
            match self.run(registry, scenario) {
                Ok(outcome) => result.outcomes.push(outcome),
                Err(err) => {
                    warn!(scenario = %scenario.name, code = err.code(), "{err}");
                    let stop = fail_fast || matches!(err, HarnessError::Construction { .. });
                    result.failures.push(err);
                    if stop {
                        result.skipped = scenarios.len() - i - 1;
                        break;
                    }
                }
            }
        }
        registry.reset_all();
        info!(
            total = result.total(),
            passed = result.outcomes.len(),
            failed = result.failures.len(),
            skipped = result.skipped,
            "suite finished"
        );
        result
    }

    fn check_construction(
        &self,
        registry: &StableRegistry,
        scenario: &Scenario,
    ) -> Result<(), HarnessError> {
        let fail = |message: String| HarnessError::Construction {
            scenario: scenario.name.clone(),
            message,
        };
        let method = &scenario.method;
        let Some(site) = method.single_call_site() else {
            return Err(fail(format!(
                "target method {} has {} call sites; expected exactly one",
                method.name,
                method.call_sites.len()
            )));
        };
        if *site != scenario.access {
            return Err(fail(format!(
                "target method {} reads {site}, scenario describes {}",
                method.name, scenario.access
            )));
        }
        if method.container != scenario.container || scenario.mutate.container() != scenario.container {
            return Err(fail("method, mutator and scenario name different containers".to_string()));
        }
        if !registry.is_tracked(scenario.container) {
            return Err(fail("container is not tracked by this registry".to_string()));
        }
        let verdict = self.policy.verdict(&scenario.access);
        if verdict != scenario.expected {
            return Err(fail(format!(
                "scenario expects {} but the fold policy says {verdict}",
                scenario.expected
            )));
        }
        if !registry.is_default(scenario.container) {
            return Err(fail(
                "container element 0 is not at its default value; reset the registry before each scenario"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
