//! Type Mapper: semantic types to Rust types, defaults and the tagged-value
//! boundary.
//!
//! | Semantic type        | Rust type                            | Default                      | Boxed as               |
//! |----------------------|--------------------------------------|------------------------------|------------------------|
//! | `int`                | `i32`                                | `0`                          | `PV::PValue::Int`      |
//! | enum                 | `i32`                                | first element's value        | `PV::PValue::Int`      |
//! | `float`              | `f64`                                | `0.0`                        | (not representable)    |
//! | `bool`               | `bool`                               | `false`                      | (not representable)    |
//! | `string`             | `String`                             | `String::new()`              | (not representable)    |
//! | `event`              | `ProtocolEventName`                  | `ProtocolEventName::DefaultEvent` | (not representable) |
//! | `machine`, interface | `M::Index`                           | `M::Index::dummy_index()`    | `PV::PValue::Machine`  |
//! | named tuple          | `HashMap<&'static str, PV::PValue>`  | map of field defaults        | `PV::PValue::NamedTuple` |
//! | tuple                | `HashMap<&'static str, PV::PValue>`  | keys `"0"`, `"1"`, …         | `PV::PValue::NamedTuple` |
//! | `seq[T]`             | `HashMap<i32, PV::PValue>`           | `HashMap::new()`             | `PV::PValue::Sequence` |
//! | `null`               | `()`                                 | `()`                         | `PV::PValue::DefaultVal` |
//!
//! `set`, `map`, `any`, `data` and foreign types have no representation in
//! this target and fail generation.

use pgen_types::ty::PType;

use crate::error::{CodegenError, CodegenResult};
use crate::runtime::*;

pub const NAMED_TUPLE_TYPE: &str = "HashMap<&'static str, PV::PValue>";
pub const SEQUENCE_TYPE: &str = "HashMap<i32, PV::PValue>";

fn unsupported(ty: &PType) -> CodegenError {
    CodegenError::unsupported("type", format!("{ty} has no representation in the Rust target"))
}

fn not_boxable(ty: &PType) -> CodegenError {
    CodegenError::unsupported(
        "payload type",
        format!("{ty} cannot cross the tagged value boundary"),
    )
}

/// The Rust type for `ty`.
pub fn map_type(ty: &PType) -> CodegenResult<String> {
    let rust = match ty {
        PType::Int | PType::Enum(_) => "i32",
        PType::Float => "f64",
        PType::Bool => "bool",
        PType::String => "String",
        PType::Event => EVENT_NAME_TYPE,
        PType::Machine | PType::Interface(_) => INDEX_TYPE,
        PType::NamedTuple(_) | PType::Tuple(_) => NAMED_TUPLE_TYPE,
        PType::Seq(_) => SEQUENCE_TYPE,
        PType::Null => "()",
        PType::Set(_) | PType::Map(..) | PType::Any | PType::Data | PType::Foreign(_) => {
            return Err(unsupported(ty))
        }
        PType::Alias(alias) => return map_type(&alias.underlying),
    };
    Ok(rust.to_string())
}

/// The Rust return-type suffix for a function returning `ty`.
///
/// Empty for `null`, otherwise ` -> T`.
pub fn return_suffix(ty: &PType) -> CodegenResult<String> {
    if ty.is_null() {
        Ok(String::new())
    } else {
        Ok(format!(" -> {}", map_type(ty)?))
    }
}

/// An expression producing the default value of `ty`.
pub fn default_value(ty: &PType) -> CodegenResult<String> {
    let value = match ty {
        PType::Int => "0".to_string(),
        PType::Enum(e) => int_literal(e.default_value),
        PType::Float => "0.0".to_string(),
        PType::Bool => "false".to_string(),
        PType::String => "String::new()".to_string(),
        PType::Event => event_variant(DEFAULT_EVENT),
        PType::Machine | PType::Interface(_) => INDEX_DUMMY.to_string(),
        PType::NamedTuple(fields) => {
            let entries = fields
                .iter()
                .map(|f| Ok((f.name.as_str(), box_value(&f.ty, &default_value(&f.ty)?)?)))
                .collect::<CodegenResult<Vec<_>>>()?;
            hashmap_literal(&entries)
        }
        PType::Tuple(elems) => {
            let keys: Vec<String> = (0..elems.len()).map(|i| i.to_string()).collect();
            let entries = elems
                .iter()
                .zip(&keys)
                .map(|(ty, key)| Ok((key.as_str(), box_value(ty, &default_value(ty)?)?)))
                .collect::<CodegenResult<Vec<_>>>()?;
            hashmap_literal(&entries)
        }
        PType::Seq(_) => "HashMap::new()".to_string(),
        PType::Null => "()".to_string(),
        PType::Set(_) | PType::Map(..) | PType::Any | PType::Data | PType::Foreign(_) => {
            return Err(unsupported(ty))
        }
        PType::Alias(alias) => return default_value(&alias.underlying),
    };
    Ok(value)
}

/// `PV::PValue::to_hashmap(vec![("k", v), ...])`
pub fn hashmap_literal(entries: &[(&str, String)]) -> String {
    let items: Vec<String> = entries
        .iter()
        .map(|(k, v)| format!("({k:?}, {v})"))
        .collect();
    format!("{VALUE_TO_HASHMAP}(vec![{}])", items.join(", "))
}

/// An `i32` literal, parenthesized when negative.
pub fn int_literal(v: i64) -> String {
    if v < 0 {
        format!("({v})")
    } else {
        v.to_string()
    }
}

/// The value-union constructor for `ty`, or `None` for `null` (which boxes
/// to the payload-less default value).
pub fn box_constructor(ty: &PType) -> CodegenResult<Option<&'static str>> {
    match ty {
        PType::Int | PType::Enum(_) => Ok(Some(VALUE_INT)),
        PType::Machine | PType::Interface(_) => Ok(Some(VALUE_MACHINE)),
        PType::NamedTuple(_) | PType::Tuple(_) => Ok(Some(VALUE_NAMED_TUPLE)),
        PType::Seq(_) => Ok(Some(VALUE_SEQUENCE)),
        PType::Null => Ok(None),
        PType::Float | PType::Bool | PType::String | PType::Event => Err(not_boxable(ty)),
        PType::Set(_) | PType::Map(..) | PType::Any | PType::Data | PType::Foreign(_) => {
            Err(unsupported(ty))
        }
        PType::Alias(alias) => box_constructor(&alias.underlying),
    }
}

/// Wrap the native expression `expr` of type `ty` into the value union.
pub fn box_value(ty: &PType, expr: &str) -> CodegenResult<String> {
    Ok(match box_constructor(ty)? {
        Some(ctor) => format!("{ctor}({expr})"),
        None => VALUE_DEFAULT.to_string(),
    })
}

/// The accessor that turns a boxed value back into the native type `ty`.
pub fn unbox_accessor(ty: &PType) -> CodegenResult<&'static str> {
    match ty {
        PType::Int | PType::Enum(_) => Ok(EXTRACT_INT),
        PType::Machine | PType::Interface(_) => Ok(EXTRACT_MACHINE),
        PType::NamedTuple(_) | PType::Tuple(_) => Ok(EXTRACT_NAMED_TUPLE),
        PType::Seq(_) => Ok(EXTRACT_SEQUENCE),
        PType::Null | PType::Float | PType::Bool | PType::String | PType::Event => {
            Err(not_boxable(ty))
        }
        PType::Set(_) | PType::Map(..) | PType::Any | PType::Data | PType::Foreign(_) => {
            Err(unsupported(ty))
        }
        PType::Alias(alias) => unbox_accessor(&alias.underlying),
    }
}

/// Append the unbox accessor for `ty` to `boxed`.
pub fn unbox_value(ty: &PType, boxed: &str) -> CodegenResult<String> {
    Ok(format!("{boxed}{}", unbox_accessor(ty)?))
}

/// Whether values of `ty` are `Copy` in the Rust target.
pub fn is_copy(ty: &PType) -> bool {
    matches!(
        ty.canonical(),
        PType::Int | PType::Enum(_) | PType::Float | PType::Bool | PType::Event | PType::Null
    )
}

/// Whether `==` on the native representation matches value equality.
pub fn is_natively_comparable(ty: &PType) -> bool {
    matches!(
        ty.canonical(),
        PType::Int | PType::Enum(_) | PType::Float | PType::Bool | PType::String | PType::Event
    )
}

/// Whether `{}` formatting is available for `ty`.
pub fn is_displayable(ty: &PType) -> bool {
    matches!(
        ty.canonical(),
        PType::Int | PType::Enum(_) | PType::Float | PType::Bool | PType::String
    )
}
