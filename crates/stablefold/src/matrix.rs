//! Cross-product of element kinds, requested kinds and alignments.
//!
//! Aligned reads happen at offset 0. Every container is read as every scalar
//! kind, and the reference container is also read as a reference. Reference
//! identities are odd, so even a one-byte read of a fresh identity differs from
//! null. Misaligned reads are same-kind reads one byte past element 0 of every
//! multi-byte scalar container.

use serde::Serialize;
use stablefold_kinds::{ElementKind, TargetLayout};

use crate::access::AccessDescriptor;
use crate::harness::Scenario;
use crate::policy::{FoldPolicy, FoldRule, FoldVerdict};
use crate::registry::StableRegistry;
use crate::util::sha256_hex;

/// Every access exercised for `kinds` (all kinds when empty), aligned reads
/// first, in declaration order.
pub fn accesses(layout: TargetLayout, kinds: &[ElementKind]) -> Vec<AccessDescriptor> {
    let selected: Vec<ElementKind> = ElementKind::ALL
        .into_iter()
        .filter(|k| kinds.is_empty() || kinds.contains(k))
        .collect();

    let mut out = Vec::new();
    for &source in &selected {
        if source.is_reference() {
            out.push(AccessDescriptor::at_base(source, source));
        }
        for requested in ElementKind::SCALARS {
            out.push(AccessDescriptor::at_base(source, requested));
        }
    }
    for &source in &selected {
        if !source.is_reference() && source.byte_width(layout) > 1 {
            out.push(AccessDescriptor::misaligned(source, layout));
        }
    }
    out
}

pub fn generate(
    registry: &StableRegistry,
    policy: &FoldPolicy,
    kinds: &[ElementKind],
) -> Vec<Scenario> {
    accesses(registry.layout(), kinds)
        .into_iter()
        .filter_map(|access| Scenario::for_access(registry, policy, access))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixEntry {
    pub name: String,
    pub access: AccessDescriptor,
    pub verdict: FoldVerdict,
    pub rule: FoldRule,
}

pub fn entries(policy: &FoldPolicy, kinds: &[ElementKind]) -> Vec<MatrixEntry> {
    accesses(policy.layout(), kinds)
        .into_iter()
        .map(|access| MatrixEntry {
            name: access.to_string(),
            access,
            verdict: policy.verdict(&access),
            rule: policy.rule(&access),
        })
        .collect()
}

/// Digest over one `name<TAB>verdict<TAB>rule` line per entry.
pub fn matrix_sha256(entries: &[MatrixEntry]) -> String {
    let mut canon = String::new();
    for e in entries {
        canon.push_str(&e.name);
        canon.push('\t');
        canon.push_str(e.verdict.as_str());
        canon.push('\t');
        canon.push_str(e.rule.as_str());
        canon.push('\n');
    }
    sha256_hex(canon.as_bytes())
}
