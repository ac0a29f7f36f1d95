//! Resolved semantic types.
//!
//! Every expression reaching the code generator carries one of these. The
//! grammar is closed: code generation matches on it exhaustively and reports
//! the forms it cannot represent instead of guessing.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ast::DeclId;

/// A fully resolved semantic type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PType {
    // ── Primitives ──
    Int,
    Float,
    Bool,
    String,
    /// An event value (the tag of an event, not its payload).
    Event,
    /// An untyped machine reference.
    Machine,
    /// The void/null type. Functions without a return value return this.
    Null,
    /// The open `any` type.
    Any,
    /// The open `data` type.
    Data,

    // ── Declared types ──
    Enum(EnumType),
    /// A machine reference restricted to an interface.
    Interface(InterfaceType),
    /// A user type alias. Code generation looks through it.
    Alias(AliasType),
    Foreign(String),

    // ── Structural types ──
    NamedTuple(Vec<NamedField>),
    Tuple(Vec<PType>),
    Seq(Box<PType>),
    Set(Box<PType>),
    Map(Box<PType>, Box<PType>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumType {
    pub decl: DeclId,
    pub name: String,
    /// Integer value of the element used as the default.
    pub default_value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceType {
    pub decl: DeclId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasType {
    pub decl: DeclId,
    pub name: String,
    pub underlying: Box<PType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedField {
    pub name: String,
    pub ty: PType,
}

impl NamedField {
    pub fn new(name: impl Into<String>, ty: PType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl PType {
    /// Strip every alias layer.
    pub fn canonical(&self) -> &PType {
        let mut ty = self;
        while let PType::Alias(alias) = ty {
            ty = &alias.underlying;
        }
        ty
    }

    pub fn is_null(&self) -> bool {
        matches!(self.canonical(), PType::Null)
    }

    /// `null`, `any` and `data` absorb any other type in assignments.
    pub fn is_escape(&self) -> bool {
        matches!(self.canonical(), PType::Null | PType::Any | PType::Data)
    }

    /// Machine and interface references share one runtime representation.
    pub fn is_machine_ref(&self) -> bool {
        matches!(self.canonical(), PType::Machine | PType::Interface(_))
    }

    /// Compare after looking through aliases.
    pub fn same_as(&self, other: &PType) -> bool {
        self.canonical() == other.canonical()
    }

    pub fn seq(elem: PType) -> Self {
        PType::Seq(Box::new(elem))
    }

    pub fn named_tuple<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, PType)>,
        S: Into<String>,
    {
        PType::NamedTuple(
            fields
                .into_iter()
                .map(|(name, ty)| NamedField::new(name, ty))
                .collect(),
        )
    }
}

impl fmt::Display for PType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PType::Int => write!(f, "int"),
            PType::Float => write!(f, "float"),
            PType::Bool => write!(f, "bool"),
            PType::String => write!(f, "string"),
            PType::Event => write!(f, "event"),
            PType::Machine => write!(f, "machine"),
            PType::Null => write!(f, "null"),
            PType::Any => write!(f, "any"),
            PType::Data => write!(f, "data"),
            PType::Enum(e) => write!(f, "{}", e.name),
            PType::Interface(i) => write!(f, "{}", i.name),
            PType::Alias(a) => write!(f, "{}", a.name),
            PType::Foreign(name) => write!(f, "{name}"),
            PType::NamedTuple(fields) => {
                write!(f, "(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                write!(f, ")")
            }
            PType::Tuple(elems) => {
                write!(f, "(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            PType::Seq(elem) => write!(f, "seq[{elem}]"),
            PType::Set(elem) => write!(f, "set[{elem}]"),
            PType::Map(k, v) => write!(f, "map[{k}, {v}]"),
        }
    }
}
