//! Process-lifetime set of containers the compiler must treat as stable.
//!
//! The registry is an explicit object: the harness borrows it mutably to run a
//! scenario's mutator and immutably to call into the system under test. Nothing
//! here is global.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use stablefold_kinds::{ElementKind, TargetLayout};

use crate::value::{RefId, Value};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Bytes allocated for every scalar container.
pub const SCALAR_CONTAINER_BYTES: usize = 16;
/// Slots allocated for the reference container.
pub const REFERENCE_CONTAINER_SLOTS: usize = 4;

/// Identity of a registered container. Two handles are equal only if they name
/// the same registration in the same registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ContainerHandle {
    registry: u64,
    index: usize,
}

impl ContainerHandle {
    pub fn index(self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone)]
pub struct StableContainer {
    kind: ElementKind,
    len: usize,
    layout: TargetLayout,
    bytes: Vec<u8>,
}

impl StableContainer {
    pub fn new(kind: ElementKind, len: usize, layout: TargetLayout) -> Self {
        let width = kind.byte_width(layout);
        Self {
            kind,
            len,
            layout,
            bytes: vec![0u8; len * width],
        }
    }

    /// Container sized like the fixed test arrays: 16 bytes for scalars, four
    /// slots for references.
    pub fn standard(kind: ElementKind, layout: TargetLayout) -> Self {
        let len = if kind.is_reference() {
            REFERENCE_CONTAINER_SLOTS
        } else {
            SCALAR_CONTAINER_BYTES / kind.byte_width(layout)
        };
        Self::new(kind, len, layout)
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn layout(&self) -> TargetLayout {
        self.layout
    }

    pub fn element_width(&self) -> usize {
        self.kind.byte_width(self.layout)
    }

    pub fn allocated_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Raw bytes `[offset, offset + width)`, or `None` when out of bounds.
    pub fn read_raw(&self, offset: usize, width: usize) -> Option<&[u8]> {
        let end = offset.checked_add(width)?;
        self.bytes.get(offset..end)
    }

    pub fn element(&self, index: usize) -> Option<Value> {
        let width = self.element_width();
        let bytes = self.read_raw(index.checked_mul(width)?, width)?;
        Value::decode(self.kind, bytes)
    }

    /// Stores `value` at `index`. Returns false if the index is out of range or
    /// the value's kind does not match the container.
    pub fn store(&mut self, index: usize, value: Value) -> bool {
        if value.kind() != self.kind || index >= self.len {
            return false;
        }
        let width = self.element_width();
        let start = index * width;
        value.encode(self.layout, &mut self.bytes[start..start + width])
    }
}

#[derive(Debug)]
pub struct StableRegistry {
    id: u64,
    layout: TargetLayout,
    containers: Vec<StableContainer>,
    next_ref: u64,
}

impl StableRegistry {
    pub fn new(layout: TargetLayout) -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            layout,
            containers: Vec::new(),
            next_ref: 1,
        }
    }

    /// A registry holding one standard container per element kind, each reset
    /// to its default value.
    pub fn with_default_containers(layout: TargetLayout) -> Self {
        let mut registry = Self::new(layout);
        for kind in ElementKind::ALL {
            registry.register(StableContainer::standard(kind, layout));
        }
        registry.reset_all();
        registry
    }

    pub fn layout(&self) -> TargetLayout {
        self.layout
    }

    pub fn register(&mut self, container: StableContainer) -> ContainerHandle {
        self.containers.push(container);
        ContainerHandle {
            registry: self.id,
            index: self.containers.len() - 1,
        }
    }

    /// Identity-based membership: a handle minted by another registry is never
    /// tracked here, even if it names a container with the same contents.
    pub fn is_tracked(&self, handle: ContainerHandle) -> bool {
        handle.registry == self.id && handle.index < self.containers.len()
    }

    pub fn container(&self, handle: ContainerHandle) -> Option<&StableContainer> {
        if !self.is_tracked(handle) {
            return None;
        }
        self.containers.get(handle.index)
    }

    pub fn handle_for(&self, kind: ElementKind) -> Option<ContainerHandle> {
        self.containers
            .iter()
            .position(|c| c.kind == kind)
            .map(|index| ContainerHandle {
                registry: self.id,
                index,
            })
    }

    pub fn handles(&self) -> impl Iterator<Item = ContainerHandle> + '_ {
        (0..self.containers.len()).map(|index| ContainerHandle {
            registry: self.id,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Restores element 0 of every tracked container to its kind's default.
    ///
    /// Must be called before every scenario; the harness rejects a scenario
    /// whose container is not in its default state.
    pub fn reset_all(&mut self) {
        for c in &mut self.containers {
            if c.len > 0 {
                let kind = c.kind;
                c.store(0, Value::default_for(kind));
            }
        }
    }

    /// Mutator: sets element 0 of `handle` to its kind's changed value.
    /// References receive a fresh identity on every call.
    pub fn set_changed(&mut self, handle: ContainerHandle) -> Option<Value> {
        if !self.is_tracked(handle) {
            return None;
        }
        let fresh = self.fresh_ref();
        let c = &mut self.containers[handle.index];
        let value = Value::changed_for(c.kind, fresh);
        c.store(0, value).then_some(value)
    }

    pub fn set_default(&mut self, handle: ContainerHandle) -> Option<Value> {
        if !self.is_tracked(handle) {
            return None;
        }
        let c = &mut self.containers[handle.index];
        let value = Value::default_for(c.kind);
        c.store(0, value).then_some(value)
    }

    pub fn is_default(&self, handle: ContainerHandle) -> bool {
        self.container(handle)
            .and_then(|c| c.element(0))
            .is_some_and(|v| v == Value::default_for(v.kind()))
    }

    // Identities are odd so the low byte of any identity is never zero.
    fn fresh_ref(&mut self) -> RefId {
        let raw = self.next_ref * 2 + 1;
        self.next_ref += 1;
        match RefId::new(raw) {
            Some(r) => r,
            None => unreachable!("odd identities are nonzero"),
        }
    }
}
