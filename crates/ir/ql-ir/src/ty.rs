//! Resolved types

use crate::ModelId;

/// Primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// `bool`
    Boolean,
    /// 64-bit signed integer
    Int,
    /// Unicode code point
    Rune,
    /// Immutable string
    String,
    /// Absence of a value (return type only)
    Void,
}

impl Primitive {
    /// Source-level spelling
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "bool",
            Self::Int => "int",
            Self::Rune => "rune",
            Self::String => "string",
            Self::Void => "void",
        }
    }
}

/// A resolved type
///
/// Model types refer to their definition by id, so two model types are
/// equal exactly when they name the same model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Primitive type
    Primitive(Primitive),
    /// `list<item>`
    List(Box<Type>),
    /// `map<key, value>`
    Map(Box<Type>, Box<Type>),
    /// `set<item>`
    Set(Box<Type>),
    /// Instance of a model
    Model(ModelId),
}

impl Type {
    /// `bool`
    pub const BOOLEAN: Self = Self::Primitive(Primitive::Boolean);
    /// `int`
    pub const INT: Self = Self::Primitive(Primitive::Int);
    /// `rune`
    pub const RUNE: Self = Self::Primitive(Primitive::Rune);
    /// `string`
    pub const STRING: Self = Self::Primitive(Primitive::String);
    /// `void`
    pub const VOID: Self = Self::Primitive(Primitive::Void);

    /// `list<item>`
    #[must_use]
    pub fn list(item: Self) -> Self {
        Self::List(Box::new(item))
    }

    /// `set<item>`
    #[must_use]
    pub fn set(item: Self) -> Self {
        Self::Set(Box::new(item))
    }

    /// `map<key, value>`
    #[must_use]
    pub fn map(key: Self, value: Self) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    /// The primitive, if this is one
    #[must_use]
    pub fn as_primitive(&self) -> Option<Primitive> {
        match self {
            Self::Primitive(primitive) => Some(*primitive),
            _ => None,
        }
    }

    /// Whether this is `void`
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, Self::Primitive(Primitive::Void))
    }
}

impl From<Primitive> for Type {
    fn from(primitive: Primitive) -> Self {
        Self::Primitive(primitive)
    }
}
