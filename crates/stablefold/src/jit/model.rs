use serde::{Deserialize, Serialize};

use crate::jit::graph::Graph;
use crate::jit::optimize::optimize_graph;
use crate::jit::{CompilationError, CompiledArtifact, Compiler, RuntimeTrap, TargetMethod};
use crate::registry::StableRegistry;
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FoldMode {
    /// Fold only reads that match the declared element layout.
    #[default]
    Strict,
    /// Fold every in-bounds stable read.
    Aggressive,
    /// Never fold.
    Disabled,
}

impl FoldMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FoldMode::Strict => "strict",
            FoldMode::Aggressive => "aggressive",
            FoldMode::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JitConfig {
    pub mode: FoldMode,
    /// When false, an element still holding its default (all-zero) bytes is not
    /// considered written yet and is never folded.
    pub default_stable: bool,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            mode: FoldMode::Strict,
            default_stable: true,
        }
    }
}

/// In-tree system under test: parses a target method into a graph, marks
/// tracked containers stable, folds eligible reads and evaluates the result.
#[derive(Debug, Clone, Default)]
pub struct ModelJit {
    config: JitConfig,
}

impl ModelJit {
    pub fn new(config: JitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JitConfig {
        &self.config
    }
}

#[derive(Debug, Clone)]
pub struct ModelArtifact {
    graph: Graph,
    folded_reads: usize,
}

impl ModelArtifact {
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn folded_reads(&self) -> usize {
        self.folded_reads
    }
}

impl Compiler for ModelJit {
    type Artifact = ModelArtifact;

    fn call_uncompiled(
        &self,
        method: &TargetMethod,
        registry: &StableRegistry,
    ) -> Result<Value, RuntimeTrap> {
        let graph = Graph::parse(method).map_err(|e| RuntimeTrap::new(&method.name, e))?;
        graph
            .evaluate(registry)
            .map_err(|e| RuntimeTrap::new(&method.name, e))
    }

    fn compile(
        &self,
        method: &TargetMethod,
        registry: &StableRegistry,
    ) -> Result<ModelArtifact, CompilationError> {
        let mut graph = Graph::parse(method).map_err(|e| CompilationError::new(&method.name, e))?;
        let folded_reads = optimize_graph(&mut graph, registry, &self.config)
            .map_err(|e| CompilationError::new(&method.name, e))?;
        Ok(ModelArtifact {
            graph,
            folded_reads,
        })
    }
}

impl CompiledArtifact for ModelArtifact {
    fn method(&self) -> &str {
        &self.graph.method
    }

    fn invoke(&self, registry: &StableRegistry) -> Result<Value, RuntimeTrap> {
        self.graph
            .evaluate(registry)
            .map_err(|e| RuntimeTrap::new(&self.graph.method, e))
    }

    fn is_constant_folded_stable_read(&self) -> Option<bool> {
        Some(self.graph.returns_folded_constant())
    }
}
