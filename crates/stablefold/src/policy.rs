//! Fold-eligibility of raw reads from stable containers.
//!
//! A read may be folded into compiled code only when it exactly matches the
//! declared element layout. Rules, first match wins:
//!
//! 1. unaligned read: never folds
//! 2. requested kind equals source kind: folds
//! 3. same-width scalar reinterpretation: folds
//! 4. reference slot read as a same-width scalar (or the reverse): never folds
//! 5. anything else is a width mismatch: never folds

use std::fmt;

use serde::Serialize;
use stablefold_kinds::TargetLayout;

use crate::access::AccessDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldVerdict {
    MustFold,
    MustNotFold,
}

impl FoldVerdict {
    pub fn as_str(self) -> &'static str {
        match self {
            FoldVerdict::MustFold => "must_fold",
            FoldVerdict::MustNotFold => "must_not_fold",
        }
    }

    pub fn folds(self) -> bool {
        matches!(self, FoldVerdict::MustFold)
    }
}

impl fmt::Display for FoldVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rule decided a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldRule {
    Unaligned,
    ExactKind,
    SameWidthScalar,
    /// A reference slot read as a scalar of the reference width.
    ReferencePunned,
    /// Everything else, including a scalar slot read as a reference.
    WidthMismatch,
}

impl FoldRule {
    pub fn verdict(self) -> FoldVerdict {
        match self {
            FoldRule::ExactKind | FoldRule::SameWidthScalar => FoldVerdict::MustFold,
            FoldRule::Unaligned | FoldRule::ReferencePunned | FoldRule::WidthMismatch => {
                FoldVerdict::MustNotFold
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FoldRule::Unaligned => "unaligned",
            FoldRule::ExactKind => "exact_kind",
            FoldRule::SameWidthScalar => "same_width_scalar",
            FoldRule::ReferencePunned => "reference_punned",
            FoldRule::WidthMismatch => "width_mismatch",
        }
    }
}

/// The fold policy for one target layout. Pure and total: the verdict depends
/// only on the descriptor and the layout's reference width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldPolicy {
    layout: TargetLayout,
}

impl FoldPolicy {
    pub fn new(layout: TargetLayout) -> Self {
        Self { layout }
    }

    pub fn host() -> Self {
        Self::new(TargetLayout::host())
    }

    pub fn layout(&self) -> TargetLayout {
        self.layout
    }

    pub fn rule(&self, access: &AccessDescriptor) -> FoldRule {
        if !access.aligned {
            return FoldRule::Unaligned;
        }
        let source = access.source_kind;
        let requested = access.requested_kind;
        if requested == source {
            return FoldRule::ExactKind;
        }
        let same_width = access.requested_width(self.layout) == access.source_width(self.layout);
        if same_width && !source.is_reference() && !requested.is_reference() {
            return FoldRule::SameWidthScalar;
        }
        if same_width && source.is_reference() {
            return FoldRule::ReferencePunned;
        }
        FoldRule::WidthMismatch
    }

    pub fn verdict(&self, access: &AccessDescriptor) -> FoldVerdict {
        self.rule(access).verdict()
    }
}
