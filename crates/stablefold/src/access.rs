use std::fmt;

use serde::Serialize;
use stablefold_kinds::{ElementKind, TargetLayout};

/// A raw read of `requested_kind` at `byte_offset` (relative to element 0) of a
/// container declared with `source_kind` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AccessDescriptor {
    pub source_kind: ElementKind,
    pub requested_kind: ElementKind,
    pub byte_offset: usize,
    pub aligned: bool,
}

impl AccessDescriptor {
    /// Read at element 0's base offset. Offset 0 is aligned for every width.
    pub fn at_base(source_kind: ElementKind, requested_kind: ElementKind) -> Self {
        Self {
            source_kind,
            requested_kind,
            byte_offset: 0,
            aligned: true,
        }
    }

    /// Read at `byte_offset`; alignment is derived from the requested width.
    pub fn at_offset(
        source_kind: ElementKind,
        requested_kind: ElementKind,
        byte_offset: usize,
        layout: TargetLayout,
    ) -> Self {
        let width = requested_kind.byte_width(layout);
        Self {
            source_kind,
            requested_kind,
            byte_offset,
            aligned: byte_offset % width == 0,
        }
    }

    /// Same-kind read one byte past element 0's base.
    pub fn misaligned(kind: ElementKind, layout: TargetLayout) -> Self {
        Self::at_offset(kind, kind, 1, layout)
    }

    pub fn requested_width(&self, layout: TargetLayout) -> usize {
        self.requested_kind.byte_width(layout)
    }

    pub fn source_width(&self, layout: TargetLayout) -> usize {
        self.source_kind.byte_width(layout)
    }

    /// True if the read stays within `allocated_bytes`.
    pub fn fits(&self, layout: TargetLayout, allocated_bytes: usize) -> bool {
        self.byte_offset
            .checked_add(self.requested_width(layout))
            .is_some_and(|end| end <= allocated_bytes)
    }
}

impl fmt::Display for AccessDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[]@{} as {}",
            self.source_kind, self.byte_offset, self.requested_kind
        )?;
        if !self.aligned {
            f.write_str(" (unaligned)")?;
        }
        Ok(())
    }
}
