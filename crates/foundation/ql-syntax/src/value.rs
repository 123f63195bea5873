//! Value (expression) nodes

use crate::Type;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    /// Logical not
    Not,
    /// Arithmetic negation
    Negate,
    /// Rune to its code point
    CastToInt,
    /// Rune to a one-character string
    CastToString,
    /// Hash code of a value
    Hash,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    /// `==`
    Equals,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/` (truncating for integers)
    Divide,
    /// `%`
    Modulo,
    /// `&&`
    And,
    /// `||`
    Or,
}

impl UnaryOperator {
    /// Source spelling
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Negate => "-",
            Self::CastToInt => "int",
            Self::CastToString => "string",
            Self::Hash => "hash",
        }
    }
}

impl BinaryOperator {
    /// Source spelling
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equals => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::And => "&&",
            Self::Or => "||",
        }
    }

    /// Whether this is `==` or `!=`
    #[must_use]
    pub fn is_equality(self) -> bool {
        matches!(self, Self::Equals | Self::NotEqual)
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// What a call invokes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Callable {
    /// A free function by name
    Function {
        /// Function name
        name: String,
    },
    /// A method (or built-in container operation) on a receiver
    Property {
        /// Receiver
        of: Box<Value>,
        /// Method name
        name: String,
    },
}

/// Function or method call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    /// Call target
    pub function: Callable,
    /// Arguments, in order
    #[serde(default)]
    pub arguments: Vec<Value>,
}

/// Entry of a map literal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Entry key
    pub key: Value,
    /// Entry value
    pub value: Value,
}

/// Value nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Value {
    /// `true` / `false`
    LiteralBool {
        /// Literal value
        value: bool,
    },
    /// Integer literal
    LiteralInt {
        /// Literal value
        value: i64,
    },
    /// Rune literal
    LiteralRune {
        /// Literal value
        value: char,
    },
    /// String literal
    LiteralString {
        /// Literal value
        value: String,
    },
    /// `[a, b, ...]`
    LiteralList {
        /// Items
        items: Vec<Value>,
    },
    /// `{k: v, ...}`
    LiteralMap {
        /// Entries
        entries: Vec<KeyValue>,
    },
    /// `set{a, b, ...}`
    LiteralSet {
        /// Items
        items: Vec<Value>,
    },
    /// Empty list with an explicit element type
    EmptyList {
        /// Element type
        item: Type,
    },
    /// Empty set with an explicit element type
    EmptySet {
        /// Element type
        item: Type,
    },
    /// Empty map with explicit key and value types
    EmptyMap {
        /// Key type
        key: Type,
        /// Value type
        value: Type,
    },
    /// Function or method call
    Call(Call),
    /// `from[key]`
    Lookup {
        /// Indexed value
        from: Box<Value>,
        /// Index or key
        key: Box<Value>,
    },
    /// `of.name`
    Property {
        /// Receiver
        of: Box<Value>,
        /// Field name
        name: String,
    },
    /// `set.contains(value)` written directly
    SetContains {
        /// The set
        set: Box<Value>,
        /// The value looked for
        value: Box<Value>,
    },
    /// `new Model()`
    New {
        /// Model name
        model: String,
    },
    /// `len(of)`
    Length {
        /// Measured value
        of: Box<Value>,
    },
    /// `op value`
    Unary {
        /// Operator
        operator: UnaryOperator,
        /// Operand
        value: Box<Value>,
    },
    /// `left op right`
    Binary {
        /// Operator
        operator: BinaryOperator,
        /// Left operand
        left: Box<Value>,
        /// Right operand
        right: Box<Value>,
    },
    /// Reference to a named definition
    Variable {
        /// Referenced name
        name: String,
    },
    /// `self` inside a method or override
    SelfRef,
    /// `null`
    Null,
    /// `list.pop()` used for its value
    Pop {
        /// The list
        list: Box<Value>,
    },
}

impl Value {
    /// Boolean literal
    pub fn bool(value: bool) -> Self {
        Self::LiteralBool { value }
    }

    /// Integer literal
    pub fn int(value: i64) -> Self {
        Self::LiteralInt { value }
    }

    /// Rune literal
    pub fn rune(value: char) -> Self {
        Self::LiteralRune { value }
    }

    /// String literal
    pub fn string(value: impl Into<String>) -> Self {
        Self::LiteralString {
            value: value.into(),
        }
    }

    /// List literal
    pub fn list(items: Vec<Self>) -> Self {
        Self::LiteralList { items }
    }

    /// Set literal
    pub fn set(items: Vec<Self>) -> Self {
        Self::LiteralSet { items }
    }

    /// Map literal from `(key, value)` pairs
    pub fn map(entries: Vec<(Self, Self)>) -> Self {
        Self::LiteralMap {
            entries: entries
                .into_iter()
                .map(|(key, value)| KeyValue { key, value })
                .collect(),
        }
    }

    /// Variable reference
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable { name: name.into() }
    }

    /// Field access
    pub fn property(of: Self, name: impl Into<String>) -> Self {
        Self::Property {
            of: Box::new(of),
            name: name.into(),
        }
    }

    /// Index / key lookup
    pub fn lookup(from: Self, key: Self) -> Self {
        Self::Lookup {
            from: Box::new(from),
            key: Box::new(key),
        }
    }

    /// Unary operation
    pub fn unary(operator: UnaryOperator, value: Self) -> Self {
        Self::Unary {
            operator,
            value: Box::new(value),
        }
    }

    /// Binary operation
    pub fn binary(left: Self, operator: BinaryOperator, right: Self) -> Self {
        Self::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Call of a free function
    pub fn call(name: impl Into<String>, arguments: Vec<Self>) -> Self {
        Self::Call(Call {
            function: Callable::Function { name: name.into() },
            arguments,
        })
    }

    /// Call of a method on a receiver
    pub fn method_call(of: Self, name: impl Into<String>, arguments: Vec<Self>) -> Self {
        Self::Call(Call {
            function: Callable::Property {
                of: Box::new(of),
                name: name.into(),
            },
            arguments,
        })
    }

    /// `new Model()`
    pub fn new_instance(model: impl Into<String>) -> Self {
        Self::New {
            model: model.into(),
        }
    }

    /// `len(of)`
    pub fn length(of: Self) -> Self {
        Self::Length { of: Box::new(of) }
    }
}
