//! Literal constructors.

use weave_core::Symbol;

/// A literal value. Child 0 of every ctor is its qualified type; compound
/// ctors (`Optional`, `Result`, `Tuple`, `List`) hold their element
/// expressions after it.
#[derive(Clone, Debug, PartialEq)]
pub enum Ctor {
    Bool(bool),
    SignedInteger { value: i64, width: u16 },
    UnsignedInteger { value: u64, width: u16 },
    Real(f64),
    String(String),
    Bytes(Vec<u8>),
    Null,
    Optional,
    Result,
    Error(String),
    Tuple,
    List,
    Enum { label: Symbol },
}

impl Ctor {
    pub fn class_name(&self) -> &'static str {
        match self {
            Ctor::Bool(_) => "Bool",
            Ctor::SignedInteger { .. } => "SignedInteger",
            Ctor::UnsignedInteger { .. } => "UnsignedInteger",
            Ctor::Real(_) => "Real",
            Ctor::String(_) => "String",
            Ctor::Bytes(_) => "Bytes",
            Ctor::Null => "Null",
            Ctor::Optional => "Optional",
            Ctor::Result => "Result",
            Ctor::Error(_) => "Error",
            Ctor::Tuple => "Tuple",
            Ctor::List => "List",
            Ctor::Enum { .. } => "Enum",
        }
    }

    /// Whether the ctor denotes a single literal token (usable for
    /// look-ahead parsing).
    pub fn is_literal_token(&self) -> bool {
        matches!(
            self,
            Ctor::Bytes(_)
                | Ctor::SignedInteger { .. }
                | Ctor::UnsignedInteger { .. }
                | Ctor::Bool(_)
                | Ctor::String(_)
        )
    }
}
