//! Runtime value representation

#![allow(
    clippy::min_ident_chars,
    reason = "Short identifiers like i, c, b, s are conventional in value implementations"
)]

use ql_ir::ModelId;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared, mutable element storage for lists and sets
pub type Items = Rc<RefCell<Vec<Value>>>;

/// Shared, mutable entry storage for maps, kept in insertion order
pub type Entries = Rc<RefCell<Vec<(Value, Value)>>>;

/// A model instance
///
/// Instances have reference semantics: copies of a [`Value::Instance`]
/// alias the same fields.
#[derive(Debug, PartialEq)]
pub struct Instance {
    /// Instantiated model
    pub model: ModelId,
    /// Model name, kept for display
    pub name: String,
    /// Field values, in declaration order
    pub fields: RefCell<Vec<Value>>,
}

/// Runtime value
///
/// The derived `PartialEq` is structural and meant for inspecting
/// results; program-level `==` goes through the interpreter so equality
/// overrides are honoured.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Result of a void call
    Void,
    /// The null model reference
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (i64)
    Int(i64),
    /// Rune value
    Rune(char),
    /// String value
    String(String),
    /// List value
    List(Items),
    /// Set value, no two elements equal
    Set(Items),
    /// Map value, no two keys equal
    Map(Entries),
    /// Model instance
    Instance(Rc<Instance>),
}

impl Value {
    /// Build a list value
    #[must_use]
    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    /// Build a set value from already distinct elements
    #[must_use]
    pub fn set(items: Vec<Self>) -> Self {
        Self::Set(Rc::new(RefCell::new(items)))
    }

    /// Build a map value from entries with distinct keys
    #[must_use]
    pub fn map(entries: Vec<(Self, Self)>) -> Self {
        Self::Map(Rc::new(RefCell::new(entries)))
    }

    /// Get the value as a boolean, if possible
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the value as an integer, if possible
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the value as a rune, if possible
    #[must_use]
    pub fn as_rune(&self) -> Option<char> {
        match self {
            Self::Rune(c) => Some(*c),
            _ => None,
        }
    }

    /// Get the value as a string slice, if possible
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the value's runtime kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Rune(_) => "rune",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Instance(_) => "instance",
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Rune(c) => write!(f, "{c:?}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                write_joined(f, &items.borrow())?;
                write!(f, "]")
            }
            Self::Set(items) => {
                write!(f, "set{{")?;
                write_joined(f, &items.borrow())?;
                write!(f, "}}")
            }
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Self::Instance(instance) => {
                write!(f, "{} {{ ", instance.name)?;
                write_joined(f, &instance.fields.borrow())?;
                write!(f, " }}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Rune('a').to_string(), "'a'");
        assert_eq!(Value::String("hi".to_string()).to_string(), "\"hi\"");
        assert_eq!(
            Value::list(vec![Value::Int(1), Value::Int(2)]).to_string(),
            "[1, 2]"
        );
        assert_eq!(Value::set(vec![Value::Bool(true)]).to_string(), "set{true}");
        assert_eq!(
            Value::map(vec![(Value::String("a".to_string()), Value::Int(1))]).to_string(),
            "{\"a\": 1}"
        );
    }

    #[test]
    fn test_containers_alias() {
        let list = Value::list(vec![]);
        let alias = list.clone();
        if let Value::List(items) = &alias {
            items.borrow_mut().push(Value::Int(7));
        }
        assert_eq!(list, Value::list(vec![Value::Int(7)]));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(4).as_int(), Some(4));
        assert_eq!(Value::Int(4).as_bool(), None);
        assert_eq!(Value::String("x".to_string()).as_str(), Some("x"));
        assert_eq!(Value::Null.kind(), "null");
    }
}
