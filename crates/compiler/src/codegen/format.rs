//! Declaration, parameter, and prototype formatting (§4.9)
//!
//! Shared by the per-file source generator and the header generator so a
//! function's `.c`/`.cpp` definition and its `.h`/`.hpp` prototype always
//! agree modulo the mode-specific `*`/`&` for pass-by-reference.

use crate::types::CnxType;

/// The C type-name spelling of a resolved type, without array suffix or
/// pointer/reference decoration — `struct`/`enum`/`bitmap` definitions are
/// all emitted as bare `typedef`'d names, so no `struct`/`enum` keyword
/// prefix is needed here.
pub fn c_type_name(ty: &CnxType) -> String {
    match ty {
        CnxType::Primitive(p) => p.c_type().to_string(),
        CnxType::BoundedString { .. } => "char".to_string(),
        CnxType::UnboundedString => "const char*".to_string(),
        CnxType::Array { element, .. } => c_type_name(element),
        CnxType::Struct(name) | CnxType::Enum(name) | CnxType::Bitmap(name) | CnxType::Callback(name) | CnxType::Opaque(name) => {
            name.clone()
        }
    }
}

/// `[16][4]`-style trailing array declarator, or the empty string for a
/// bounded string's implicit `capacity+1` length.
pub fn array_suffix(ty: &CnxType) -> String {
    match ty {
        CnxType::BoundedString { capacity } => format!("[{}]", capacity + 1),
        CnxType::Array { dims, .. } => dims.iter().map(|d| format!("[{d}]")).collect(),
        _ => String::new(),
    }
}

/// §4.9: structs (and only structs) pass by reference — `T*` in C, `T&` in
/// C++. Arrays already decay to pointers in C and need no extra sigil;
/// primitives, floats, and enums pass by value.
pub fn is_pass_by_reference(ty: &CnxType) -> bool {
    matches!(ty, CnxType::Struct(_))
}

/// Formats one parameter declaration, e.g. `Point* p` (C) / `Point& p`
/// (C++) for a struct, or `uint32_t count` for a value parameter.
pub fn format_param(name: &str, ty: &CnxType, cpp: bool) -> String {
    let base = c_type_name(ty);
    if is_pass_by_reference(ty) {
        return if cpp { format!("{base}& {name}") } else { format!("{base}* {name}") };
    }
    let suffix = array_suffix(ty);
    if suffix.is_empty() {
        format!("{base} {name}")
    } else {
        format!("{base} {name}{suffix}")
    }
}

/// Formats a full parameter list for a prototype or definition signature.
pub fn format_param_list(params: &[(String, CnxType)], cpp: bool) -> String {
    if params.is_empty() {
        return "void".to_string();
    }
    params
        .iter()
        .map(|(name, ty)| format_param(name, ty, cpp))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Formats a complete function prototype (no trailing `;` — callers append
/// it for header emission or a `{` for a definition).
pub fn format_prototype(qualified_name: &str, params: &[(String, CnxType)], return_type: &CnxType, cpp: bool) -> String {
    format!(
        "{} {}({})",
        c_type_name(return_type),
        qualified_name,
        format_param_list(params, cpp)
    )
}

/// Formats a variable declaration, e.g. `uint8_t buf[16]` or `const char* s`.
pub fn format_declaration(name: &str, ty: &CnxType) -> String {
    let base = c_type_name(ty);
    let suffix = array_suffix(ty);
    if suffix.is_empty() {
        format!("{base} {name}")
    } else {
        format!("{base} {name}{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Primitive;

    #[test]
    fn struct_param_is_pointer_in_c_and_reference_in_cpp() {
        let ty = CnxType::Struct("Point".to_string());
        assert_eq!(format_param("p", &ty, false), "Point* p");
        assert_eq!(format_param("p", &ty, true), "Point& p");
    }

    #[test]
    fn primitive_param_passes_by_value() {
        let ty = CnxType::Primitive(Primitive::U32);
        assert_eq!(format_param("count", &ty, false), "uint32_t count");
        assert_eq!(format_param("count", &ty, true), "uint32_t count");
    }

    #[test]
    fn empty_param_list_is_void() {
        assert_eq!(format_param_list(&[], false), "void");
    }

    #[test]
    fn array_declaration_gets_bracket_suffix() {
        let ty = CnxType::Array { element: Box::new(CnxType::Primitive(Primitive::U8)), dims: vec![crate::types::ArrayDim::Const(16)] };
        assert_eq!(format_declaration("buf", &ty), "uint8_t buf[16]");
    }

    #[test]
    fn bounded_string_declaration_includes_nul_capacity() {
        let ty = CnxType::BoundedString { capacity: 15 };
        assert_eq!(format_declaration("name", &ty), "char name[16]");
    }
}
