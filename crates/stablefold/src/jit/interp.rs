use stablefold_kinds::ElementKind;

use crate::registry::{ContainerHandle, StableRegistry};
use crate::value::Value;

/// Reads `kind` at `offset` bytes into `handle`'s storage, decoding whatever
/// bytes are currently there.
pub fn raw_read(
    registry: &StableRegistry,
    handle: ContainerHandle,
    kind: ElementKind,
    offset: usize,
) -> Result<Value, String> {
    let container = registry
        .container(handle)
        .ok_or_else(|| format!("container #{} is not registered", handle.index()))?;
    if kind.is_reference() && !container.kind().is_reference() {
        return Err(format!(
            "reference read from {}[] storage",
            container.kind()
        ));
    }
    let width = kind.byte_width(registry.layout());
    let bytes = container.read_raw(offset, width).ok_or_else(|| {
        format!(
            "{kind} read at offset {offset} exceeds {} allocated bytes",
            container.allocated_bytes()
        )
    })?;
    Value::decode(kind, bytes).ok_or_else(|| format!("cannot decode {width} bytes as {kind}"))
}
