//! Type system for C-Next
//!
//! Covers the primitive, array, struct, enum, bitmap, register, callback
//! and scope types of the data model. This module only describes *types*;
//! the aggregated per-file symbol tables built from them live in
//! `symbols.rs`.

use std::fmt;

/// Fixed-width primitive types, each with a known bit width and signedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Void,
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl Primitive {
    /// Bit width of the value. `Void` has no width.
    pub fn bit_width(self) -> u32 {
        match self {
            Primitive::Void => 0,
            Primitive::Bool | Primitive::U8 | Primitive::I8 => 8,
            Primitive::U16 | Primitive::I16 => 16,
            Primitive::U32 | Primitive::I32 | Primitive::F32 => 32,
            Primitive::U64 | Primitive::I64 | Primitive::F64 => 64,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, Primitive::Void | Primitive::Bool | Primitive::F32 | Primitive::F64)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            Primitive::U8 | Primitive::U16 | Primitive::U32 | Primitive::U64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Primitive::F32 | Primitive::F64)
    }

    /// The type-suffix spelling as it appears in C-Next source (`u8`, `i32`, …).
    pub fn from_suffix(s: &str) -> Option<Self> {
        Some(match s {
            "void" => Primitive::Void,
            "bool" => Primitive::Bool,
            "u8" => Primitive::U8,
            "i8" => Primitive::I8,
            "u16" => Primitive::U16,
            "i16" => Primitive::I16,
            "u32" => Primitive::U32,
            "i32" => Primitive::I32,
            "u64" => Primitive::U64,
            "i64" => Primitive::I64,
            "f32" => Primitive::F32,
            "f64" => Primitive::F64,
            _ => return None,
        })
    }

    /// The fixed-width C type this maps to: `uintN_t`/`intN_t`/`float`/`double`.
    pub fn c_type(self) -> &'static str {
        match self {
            Primitive::Void => "void",
            Primitive::Bool => "bool",
            Primitive::U8 => "uint8_t",
            Primitive::I8 => "int8_t",
            Primitive::U16 => "uint16_t",
            Primitive::I16 => "int16_t",
            Primitive::U32 => "uint32_t",
            Primitive::I32 => "int32_t",
            Primitive::U64 => "uint64_t",
            Primitive::I64 => "int64_t",
            Primitive::F32 => "float",
            Primitive::F64 => "double",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.c_type())
    }
}

/// Visibility of a scope member, struct field, or other declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// Array dimension: either a known constant or a macro identifier resolved
/// at C preprocessing time (e.g. `BUFFER_SIZE`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayDim {
    Const(u64),
    Macro(String),
}

impl fmt::Display for ArrayDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayDim::Const(n) => write!(f, "{n}"),
            ArrayDim::Macro(m) => write!(f, "{m}"),
        }
    }
}

/// A resolved C-Next type as used throughout symbol collection and codegen.
#[derive(Debug, Clone, PartialEq)]
pub enum CnxType {
    Primitive(Primitive),
    /// `string<N>` — stored as `char[N+1]`.
    BoundedString { capacity: u64 },
    /// Unbounded `string` — emitted as `const char*` (see SPEC_FULL.md §B.1).
    UnboundedString,
    Array {
        element: Box<CnxType>,
        dims: Vec<ArrayDim>,
    },
    Struct(String),
    Enum(String),
    Bitmap(String),
    Callback(String),
    /// An opaque type imported from a C/C++ header with no known layout.
    Opaque(String),
}

impl CnxType {
    pub fn is_array(&self) -> bool {
        matches!(self, CnxType::Array { .. })
    }

    pub fn is_string(&self) -> bool {
        matches!(self, CnxType::BoundedString { .. } | CnxType::UnboundedString)
    }

    /// Non-array, non-string integer types are bit-accessible (§3 invariants).
    pub fn is_bit_accessible_integer(&self) -> bool {
        matches!(self, CnxType::Primitive(p) if p.is_integer())
    }

    pub fn bit_width(&self) -> Option<u32> {
        match self {
            CnxType::Primitive(p) => Some(p.bit_width()),
            _ => None,
        }
    }
}

/// A `{offset, width}` bit-field within a bitmap or register-member-bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub offset: u32,
    pub width: u32,
}

impl BitField {
    pub fn mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    pub fn end(&self) -> u32 {
        self.offset + self.width
    }
}

/// Checks that a set of named bit fields do not overlap and all fit within
/// `backing_width` bits. Shared by bitmap validation and register
/// member-bitmap-field validation (SPEC_FULL.md §B.6).
pub fn check_bitfields_non_overlapping(
    fields: &[(String, BitField)],
    backing_width: u32,
) -> Result<(), String> {
    let mut sorted: Vec<&(String, BitField)> = fields.iter().collect();
    sorted.sort_by_key(|(_, f)| f.offset);
    let mut prev_end = 0u32;
    let mut prev_name: Option<&str> = None;
    for (name, field) in &sorted {
        if field.end() > backing_width {
            return Err(format!(
                "field `{name}` (offset {}, width {}) exceeds backing width {backing_width}",
                field.offset, field.width
            ));
        }
        if field.offset < prev_end {
            let prev = prev_name.unwrap_or("<unknown>");
            return Err(format!("field `{name}` overlaps preceding field `{prev}`"));
        }
        prev_end = field.end();
        prev_name = Some(name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_suffix_roundtrip() {
        for s in ["u8", "i8", "u16", "i16", "u32", "i32", "u64", "i64", "f32", "f64", "bool"] {
            let p = Primitive::from_suffix(s).unwrap();
            assert!(p.bit_width() > 0 || s == "void");
        }
    }

    #[test]
    fn c_type_mapping() {
        assert_eq!(Primitive::U8.c_type(), "uint8_t");
        assert_eq!(Primitive::I32.c_type(), "int32_t");
        assert_eq!(Primitive::F64.c_type(), "double");
    }

    #[test]
    fn overlapping_bitfields_rejected() {
        let fields = vec![
            ("a".to_string(), BitField { offset: 0, width: 4 }),
            ("b".to_string(), BitField { offset: 2, width: 4 }),
        ];
        assert!(check_bitfields_non_overlapping(&fields, 8).is_err());
    }

    #[test]
    fn non_overlapping_bitfields_accepted() {
        let fields = vec![
            ("running".to_string(), BitField { offset: 0, width: 1 }),
            ("mode".to_string(), BitField { offset: 1, width: 2 }),
        ];
        assert!(check_bitfields_non_overlapping(&fields, 8).is_ok());
    }

    #[test]
    fn bitfield_exceeding_backing_width_rejected() {
        let fields = vec![("x".to_string(), BitField { offset: 6, width: 4 })];
        assert!(check_bitfields_non_overlapping(&fields, 8).is_err());
    }
}
