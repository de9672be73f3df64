use stablefold_kinds::ElementKind;

use crate::jit::interp::raw_read;
use crate::jit::TargetMethod;
use crate::registry::{ContainerHandle, StableRegistry};
use crate::value::Value;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Reference to a container. `stable_dimension > 0` marks its elements as
    /// foldable once written.
    ContainerConst {
        handle: ContainerHandle,
        stable_dimension: u8,
    },
    RawRead {
        base: NodeId,
        kind: ElementKind,
        offset: usize,
    },
    Const {
        value: Value,
        folded_from_stable: bool,
    },
    Return {
        value: NodeId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    pub method: String,
    pub nodes: Vec<Node>,
}

impl Graph {
    /// Builds the graph of `method`: one container constant feeding one raw read
    /// per call site. The last read is returned.
    pub fn parse(method: &TargetMethod) -> Result<Self, String> {
        if method.call_sites.is_empty() {
            return Err("method has no call sites".to_string());
        }
        let mut nodes = vec![Node::ContainerConst {
            handle: method.container,
            stable_dimension: 0,
        }];
        for access in &method.call_sites {
            nodes.push(Node::RawRead {
                base: 0,
                kind: access.requested_kind,
                offset: access.byte_offset,
            });
        }
        let last = nodes.len() - 1;
        nodes.push(Node::Return { value: last });
        Ok(Self {
            method: method.name.clone(),
            nodes,
        })
    }

    pub fn raw_read_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::RawRead { .. }))
            .count()
    }

    pub fn return_value(&self) -> Option<NodeId> {
        self.nodes.iter().find_map(|n| match n {
            Node::Return { value } => Some(*value),
            _ => None,
        })
    }

    pub fn returns_folded_constant(&self) -> bool {
        self.return_value()
            .and_then(|id| self.nodes.get(id))
            .is_some_and(|n| {
                matches!(
                    n,
                    Node::Const {
                        folded_from_stable: true,
                        ..
                    }
                )
            })
    }

    pub fn evaluate(&self, registry: &StableRegistry) -> Result<Value, String> {
        let ret = self
            .return_value()
            .ok_or_else(|| "graph has no return".to_string())?;
        self.eval_node(ret, registry)
    }

    fn eval_node(&self, id: NodeId, registry: &StableRegistry) -> Result<Value, String> {
        match self.nodes.get(id) {
            Some(Node::Const { value, .. }) => Ok(*value),
            Some(Node::RawRead { base, kind, offset }) => {
                let handle = self.container_of(*base)?;
                raw_read(registry, handle, *kind, *offset)
            }
            Some(Node::ContainerConst { .. }) => {
                Err(format!("node {id} is a container, not a value"))
            }
            Some(Node::Return { value }) => self.eval_node(*value, registry),
            None => Err(format!("dangling node id {id}")),
        }
    }

    pub(crate) fn container_of(&self, id: NodeId) -> Result<ContainerHandle, String> {
        match self.nodes.get(id) {
            Some(Node::ContainerConst { handle, .. }) => Ok(*handle),
            _ => Err(format!("node {id} is not a container")),
        }
    }
}
