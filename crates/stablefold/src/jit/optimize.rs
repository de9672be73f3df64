use std::collections::BTreeMap;

use crate::jit::graph::{Graph, Node, NodeId};
use crate::jit::interp::raw_read;
use crate::jit::model::{FoldMode, JitConfig};
use crate::registry::{StableContainer, StableRegistry};

pub fn optimize_graph(
    graph: &mut Graph,
    registry: &StableRegistry,
    config: &JitConfig,
) -> Result<usize, String> {
    apply_stable(graph, registry);
    let folded = fold_stable_reads(graph, registry, config)?;
    dce_unreachable(graph);
    Ok(folded)
}

/// Marks the first container constant that names a tracked container as stable
/// with dimension 1.
pub fn apply_stable(graph: &mut Graph, registry: &StableRegistry) -> bool {
    for node in &mut graph.nodes {
        if let Node::ContainerConst {
            handle,
            stable_dimension,
        } = node
        {
            if registry.is_tracked(*handle) {
                *stable_dimension = 1;
                return true;
            }
        }
    }
    false
}

/// Replaces raw reads of stable containers with the value currently in memory,
/// when `config` allows it. Returns the number of folded reads.
pub fn fold_stable_reads(
    graph: &mut Graph,
    registry: &StableRegistry,
    config: &JitConfig,
) -> Result<usize, String> {
    if config.mode == FoldMode::Disabled {
        return Ok(0);
    }

    let layout = registry.layout();
    let mut folded = 0;
    for id in 0..graph.nodes.len() {
        let Node::RawRead { base, kind, offset } = graph.nodes[id] else {
            continue;
        };
        let Some(Node::ContainerConst {
            handle,
            stable_dimension,
        }) = graph.nodes.get(base).cloned()
        else {
            return Err(format!("read node {id} has a non-container base"));
        };
        if stable_dimension == 0 {
            continue;
        }
        let container = registry
            .container(handle)
            .ok_or_else(|| format!("container #{} is not registered", handle.index()))?;
        let width = kind.byte_width(layout);
        if container.read_raw(offset, width).is_none() {
            return Err(format!(
                "{kind} read at offset {offset} exceeds {} allocated bytes",
                container.allocated_bytes()
            ));
        }

        let eligible = match config.mode {
            FoldMode::Strict => matches_element_layout(container, kind, offset),
            FoldMode::Aggressive => !kind.is_reference() || container.kind().is_reference(),
            FoldMode::Disabled => false,
        };
        if !eligible {
            continue;
        }
        if !config.default_stable && holds_default_bytes(container, offset, width) {
            continue;
        }

        let value = raw_read(registry, handle, kind, offset)?;
        graph.nodes[id] = Node::Const {
            value,
            folded_from_stable: true,
        };
        folded += 1;
    }
    Ok(folded)
}

/// True when a `kind` read at `offset` covers exactly one declared element and
/// does not reinterpret a reference slot as a scalar or the reverse.
fn matches_element_layout(
    container: &StableContainer,
    kind: stablefold_kinds::ElementKind,
    offset: usize,
) -> bool {
    let elem = container.element_width();
    offset % elem == 0
        && kind.byte_width(container.layout()) == elem
        && kind.is_reference() == container.kind().is_reference()
}

fn holds_default_bytes(container: &StableContainer, offset: usize, width: usize) -> bool {
    container
        .read_raw(offset, width)
        .is_some_and(|bytes| bytes.iter().all(|b| *b == 0))
}

/// Drops nodes unreachable from the return and renumbers the rest.
pub fn dce_unreachable(graph: &mut Graph) {
    let Some(ret) = graph
        .nodes
        .iter()
        .position(|n| matches!(n, Node::Return { .. }))
    else {
        return;
    };

    let mut live = vec![false; graph.nodes.len()];
    let mut stack = vec![ret];
    while let Some(id) = stack.pop() {
        if id >= live.len() || live[id] {
            continue;
        }
        live[id] = true;
        match graph.nodes[id] {
            Node::RawRead { base, .. } => stack.push(base),
            Node::Return { value } => stack.push(value),
            Node::ContainerConst { .. } | Node::Const { .. } => {}
        }
    }

    let mut remap: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    let mut nodes = Vec::with_capacity(graph.nodes.len());
    for (id, node) in graph.nodes.iter().enumerate() {
        if live[id] {
            remap.insert(id, nodes.len());
            nodes.push(node.clone());
        }
    }
    for node in &mut nodes {
        match node {
            Node::RawRead { base, .. } => *base = remap.get(base).copied().unwrap_or(*base),
            Node::Return { value } => *value = remap.get(value).copied().unwrap_or(*value),
            Node::ContainerConst { .. } | Node::Const { .. } => {}
        }
    }
    graph.nodes = nodes;
}
