use std::fmt;
use std::num::NonZeroU64;

use serde::Serialize;
use stablefold_kinds::{ElementKind, TargetLayout};

/// Identity of a heap object stored in a reference slot. Null is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RefId(NonZeroU64);

impl RefId {
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(RefId)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

/// A value produced by a raw read. Equality is bitwise: floats compare by bit
/// pattern and references by identity.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Value {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Reference(Option<RefId>),
}

impl Value {
    pub fn kind(&self) -> ElementKind {
        match self {
            Value::Bool(_) => ElementKind::Bool,
            Value::Byte(_) => ElementKind::Byte,
            Value::Short(_) => ElementKind::Short,
            Value::Char(_) => ElementKind::Char,
            Value::Int(_) => ElementKind::Int,
            Value::Long(_) => ElementKind::Long,
            Value::Float(_) => ElementKind::Float,
            Value::Double(_) => ElementKind::Double,
            Value::Reference(_) => ElementKind::Reference,
        }
    }

    /// Zero-extended bit pattern of the value.
    pub fn bits(&self) -> u64 {
        match *self {
            Value::Bool(b) => b as u64,
            Value::Byte(v) => v as u8 as u64,
            Value::Short(v) => v as u16 as u64,
            Value::Char(v) => v as u64,
            Value::Int(v) => v as u32 as u64,
            Value::Long(v) => v as u64,
            Value::Float(v) => v.to_bits() as u64,
            Value::Double(v) => v.to_bits(),
            Value::Reference(r) => r.map_or(0, RefId::get),
        }
    }

    pub fn default_for(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Bool => Value::Bool(false),
            ElementKind::Byte => Value::Byte(0),
            ElementKind::Short => Value::Short(0),
            ElementKind::Char => Value::Char(0),
            ElementKind::Int => Value::Int(0),
            ElementKind::Long => Value::Long(0),
            ElementKind::Float => Value::Float(0.0),
            ElementKind::Double => Value::Double(0.0),
            ElementKind::Reference => Value::Reference(None),
        }
    }

    /// The "changed" value for `kind`. `fresh` is only used for references.
    pub fn changed_for(kind: ElementKind, fresh: RefId) -> Self {
        match kind {
            ElementKind::Bool => Value::Bool(true),
            ElementKind::Byte => Value::Byte(i8::MAX),
            ElementKind::Short => Value::Short(i16::MAX),
            ElementKind::Char => Value::Char(u16::MAX),
            ElementKind::Int => Value::Int(i32::MAX),
            ElementKind::Long => Value::Long(i64::MAX),
            ElementKind::Float => Value::Float(f32::MAX),
            ElementKind::Double => Value::Double(f64::MAX),
            ElementKind::Reference => Value::Reference(Some(fresh)),
        }
    }

    /// Decodes `bytes` (little-endian, exactly `kind`'s width) as a value of `kind`.
    pub fn decode(kind: ElementKind, bytes: &[u8]) -> Option<Self> {
        let mut buf = [0u8; 8];
        if bytes.len() > buf.len() {
            return None;
        }
        buf[..bytes.len()].copy_from_slice(bytes);
        let raw = u64::from_le_bytes(buf);
        let v = match (kind, bytes.len()) {
            (ElementKind::Bool, 1) => Value::Bool(raw != 0),
            (ElementKind::Byte, 1) => Value::Byte(raw as u8 as i8),
            (ElementKind::Short, 2) => Value::Short(raw as u16 as i16),
            (ElementKind::Char, 2) => Value::Char(raw as u16),
            (ElementKind::Int, 4) => Value::Int(raw as u32 as i32),
            (ElementKind::Long, 8) => Value::Long(raw as i64),
            (ElementKind::Float, 4) => Value::Float(f32::from_bits(raw as u32)),
            (ElementKind::Double, 8) => Value::Double(f64::from_bits(raw)),
            (ElementKind::Reference, 4 | 8) => Value::Reference(RefId::new(raw)),
            _ => return None,
        };
        Some(v)
    }

    /// Encodes the value into `out`, which must be exactly its kind's width.
    pub fn encode(&self, layout: TargetLayout, out: &mut [u8]) -> bool {
        let width = self.kind().byte_width(layout);
        if out.len() != width {
            return false;
        }
        let bits = self.bits();
        if width < 8 && (bits >> (width * 8)) != 0 {
            return false;
        }
        out.copy_from_slice(&bits.to_le_bytes()[..width]);
        true
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.bits() == other.bits()
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "bool {v}"),
            Value::Byte(v) => write!(f, "byte {v}"),
            Value::Short(v) => write!(f, "short {v}"),
            Value::Char(v) => write!(f, "char {v:#06x}"),
            Value::Int(v) => write!(f, "int {v}"),
            Value::Long(v) => write!(f, "long {v}"),
            Value::Float(v) => write!(f, "float {v:e}"),
            Value::Double(v) => write!(f, "double {v:e}"),
            Value::Reference(None) => f.write_str("reference null"),
            Value::Reference(Some(r)) => write!(f, "reference @{:#x}", r.get()),
        }
    }
}

#[cfg(test)]
mod tests {
    use stablefold_kinds::ReferenceWidth;

    use super::*;

    #[test]
    fn float_equality_is_bitwise() {
        assert_eq!(Value::Float(f32::NAN), Value::Float(f32::NAN));
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
    }

    #[test]
    fn equal_bits_of_different_kinds_are_not_equal() {
        assert_ne!(Value::Int(1), Value::Float(f32::from_bits(1)));
        assert_ne!(Value::Bool(false), Value::Byte(0));
    }

    #[test]
    fn decode_rejects_width_mismatch() {
        assert_eq!(Value::decode(ElementKind::Int, &[0, 0]), None);
        assert_eq!(
            Value::decode(ElementKind::Short, &[0xff, 0x7f]),
            Some(Value::Short(i16::MAX))
        );
    }

    #[test]
    fn bool_decodes_any_nonzero_byte_as_true() {
        assert_eq!(Value::decode(ElementKind::Bool, &[0x80]), Some(Value::Bool(true)));
    }

    #[test]
    fn changed_values_differ_from_defaults() {
        let fresh = RefId::new(1).expect("nonzero");
        for kind in ElementKind::ALL {
            assert_ne!(Value::default_for(kind), Value::changed_for(kind, fresh), "{kind}");
        }
    }

    #[test]
    fn encode_rejects_reference_ids_wider_than_slot() {
        let layout = TargetLayout::with_reference_width(ReferenceWidth::Compressed);
        let big = Value::Reference(RefId::new(1 << 40));
        let mut out = [0u8; 4];
        assert!(!big.encode(layout, &mut out));
    }
}
