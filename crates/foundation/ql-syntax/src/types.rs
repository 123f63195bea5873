//! Type annotations as written in source

use serde::{Deserialize, Serialize};

/// A type annotation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    /// `bool`
    Bool,
    /// `int` (64-bit signed)
    Int,
    /// `rune` (a unicode code point)
    Rune,
    /// `string`
    String,
    /// `list<item>`
    List {
        /// Element type
        item: Box<Type>,
    },
    /// `map<key, value>`
    Map {
        /// Key type
        key: Box<Type>,
        /// Value type
        value: Box<Type>,
    },
    /// `set<item>`
    Set {
        /// Element type
        item: Box<Type>,
    },
    /// Reference to a model by name
    Model {
        /// Model name
        name: String,
    },
    /// No value
    Void,
}

impl Type {
    /// `list<item>`
    pub fn list(item: Self) -> Self {
        Self::List {
            item: Box::new(item),
        }
    }

    /// `map<key, value>`
    pub fn map(key: Self, value: Self) -> Self {
        Self::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// `set<item>`
    pub fn set(item: Self) -> Self {
        Self::Set {
            item: Box::new(item),
        }
    }

    /// Named model type
    pub fn model(name: impl Into<String>) -> Self {
        Self::Model { name: name.into() }
    }
}
