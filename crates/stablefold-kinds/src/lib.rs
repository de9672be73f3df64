//! Element kinds of stable containers and the target layout they are laid out in.
//!
//! This crate exists so both:
//! - the fold policy and harness
//! - the model JIT
//!
//! agree on one authoritative list of kinds and their byte widths.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Bool,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl ElementKind {
    pub const ALL: [ElementKind; 9] = [
        ElementKind::Bool,
        ElementKind::Byte,
        ElementKind::Short,
        ElementKind::Char,
        ElementKind::Int,
        ElementKind::Long,
        ElementKind::Float,
        ElementKind::Double,
        ElementKind::Reference,
    ];

    pub const SCALARS: [ElementKind; 8] = [
        ElementKind::Bool,
        ElementKind::Byte,
        ElementKind::Short,
        ElementKind::Char,
        ElementKind::Int,
        ElementKind::Long,
        ElementKind::Float,
        ElementKind::Double,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Bool => "bool",
            ElementKind::Byte => "byte",
            ElementKind::Short => "short",
            ElementKind::Char => "char",
            ElementKind::Int => "int",
            ElementKind::Long => "long",
            ElementKind::Float => "float",
            ElementKind::Double => "double",
            ElementKind::Reference => "reference",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "bool" | "boolean" => Some(ElementKind::Bool),
            "byte" => Some(ElementKind::Byte),
            "short" => Some(ElementKind::Short),
            "char" => Some(ElementKind::Char),
            "int" => Some(ElementKind::Int),
            "long" => Some(ElementKind::Long),
            "float" => Some(ElementKind::Float),
            "double" => Some(ElementKind::Double),
            "reference" | "ref" | "object" => Some(ElementKind::Reference),
            _ => None,
        }
    }

    /// Single-letter type descriptor (`Z`, `B`, `S`, `C`, `I`, `J`, `F`, `D`, `L`).
    pub fn descriptor(self) -> char {
        match self {
            ElementKind::Bool => 'Z',
            ElementKind::Byte => 'B',
            ElementKind::Short => 'S',
            ElementKind::Char => 'C',
            ElementKind::Int => 'I',
            ElementKind::Long => 'J',
            ElementKind::Float => 'F',
            ElementKind::Double => 'D',
            ElementKind::Reference => 'L',
        }
    }

    pub fn byte_width(self, layout: TargetLayout) -> usize {
        match self {
            ElementKind::Bool | ElementKind::Byte => 1,
            ElementKind::Short | ElementKind::Char => 2,
            ElementKind::Int | ElementKind::Float => 4,
            ElementKind::Long | ElementKind::Double => 8,
            ElementKind::Reference => layout.reference_width.bytes(),
        }
    }

    pub fn is_reference(self) -> bool {
        matches!(self, ElementKind::Reference)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ElementKindParseError {
    value: String,
}

impl fmt::Display for ElementKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid element kind {:?} (expected one of: bool, byte, short, char, int, long, float, double, reference)",
            self.value
        )
    }
}

impl std::error::Error for ElementKindParseError {}

impl FromStr for ElementKind {
    type Err = ElementKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        ElementKind::parse(&s).ok_or(ElementKindParseError { value: s })
    }
}

#[cfg(feature = "clap")]
impl clap::ValueEnum for ElementKind {
    fn value_variants<'a>() -> &'a [Self] {
        &ElementKind::ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        let pv = clap::builder::PossibleValue::new(self.as_str());
        Some(match self {
            ElementKind::Bool => pv.alias("boolean"),
            ElementKind::Reference => pv.alias("ref").alias("object"),
            _ => pv,
        })
    }
}

/// Width of a reference slot on the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ReferenceWidth {
    /// 4-byte compressed references.
    Compressed,
    /// Full pointer-width references on a 64-bit target.
    Wide,
}

impl ReferenceWidth {
    pub fn host() -> Self {
        if std::mem::size_of::<usize>() >= 8 {
            ReferenceWidth::Wide
        } else {
            ReferenceWidth::Compressed
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            ReferenceWidth::Compressed => 4,
            ReferenceWidth::Wide => 8,
        }
    }

    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            4 => Some(ReferenceWidth::Compressed),
            8 => Some(ReferenceWidth::Wide),
            _ => None,
        }
    }
}

impl Default for ReferenceWidth {
    fn default() -> Self {
        ReferenceWidth::host()
    }
}

impl From<ReferenceWidth> for u8 {
    fn from(w: ReferenceWidth) -> u8 {
        w.bytes() as u8
    }
}

impl TryFrom<u8> for ReferenceWidth {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        ReferenceWidth::from_bytes(v as usize)
            .ok_or_else(|| format!("invalid reference width {v} (expected 4 or 8)"))
    }
}

#[cfg(feature = "clap")]
impl clap::ValueEnum for ReferenceWidth {
    fn value_variants<'a>() -> &'a [Self] {
        const ALL: [ReferenceWidth; 2] = [ReferenceWidth::Compressed, ReferenceWidth::Wide];
        &ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            ReferenceWidth::Compressed => {
                Some(clap::builder::PossibleValue::new("4").alias("compressed"))
            }
            ReferenceWidth::Wide => Some(clap::builder::PossibleValue::new("8").alias("wide")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetLayout {
    pub reference_width: ReferenceWidth,
}

impl TargetLayout {
    pub fn host() -> Self {
        Self {
            reference_width: ReferenceWidth::host(),
        }
    }

    pub fn with_reference_width(reference_width: ReferenceWidth) -> Self {
        Self { reference_width }
    }
}
