//! Typed value nodes and their metadata

use crate::{Definition, FieldRef, FunctionId, ModelId, Primitive, Type};
pub use ql_syntax::{BinaryOperator, UnaryOperator};

/// Resolved call target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMetadata {
    /// Callee (free function or method)
    pub function: FunctionId,
    /// Callee's declared return type
    pub return_type: Type,
}

/// Function or method call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Receiver for method calls, `None` for free functions
    pub receiver: Option<Box<Value>>,
    /// Arguments, in parameter order
    pub arguments: Vec<Value>,
    /// Resolved target
    pub meta: CallMetadata,
}

/// What a lookup indexes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// `list[int]`
    List,
    /// `map[key]`
    Map,
    /// `string[int]`, yielding a rune
    String,
}

/// Lookup resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupMetadata {
    /// Receiver kind
    pub kind: LookupKind,
    /// Result type
    pub ty: Type,
}

/// What `len(...)` measures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthKind {
    /// Character count
    String,
    /// Element count
    List,
    /// Entry count
    Map,
    /// Element count
    Set,
}

/// Field access resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMetadata {
    /// Accessed field
    pub field: FieldRef,
    /// Field's declared type
    pub ty: Type,
}

/// Variable reference resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableMetadata {
    /// Referenced definition
    pub definition: Definition,
    /// Declared or inferred type of the definition
    pub ty: Type,
}

/// Result of an operator lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationMetadata {
    /// Output primitive
    pub output: Primitive,
}

/// Typed value nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Boolean literal
    LiteralBool(bool),
    /// Integer literal
    LiteralInt(i64),
    /// Rune literal
    LiteralRune(char),
    /// String literal
    LiteralString(String),
    /// Non-empty list literal
    LiteralList {
        /// Items
        items: Vec<Value>,
        /// Shared item type
        item: Type,
    },
    /// Non-empty map literal
    LiteralMap {
        /// Entries, in source order
        entries: Vec<(Value, Value)>,
        /// Shared key type
        key: Type,
        /// Shared value type
        value: Type,
    },
    /// Non-empty set literal
    LiteralSet {
        /// Items
        items: Vec<Value>,
        /// Shared item type
        item: Type,
    },
    /// Empty list
    EmptyList {
        /// Item type
        item: Type,
    },
    /// Empty set
    EmptySet {
        /// Item type
        item: Type,
    },
    /// Empty map
    EmptyMap {
        /// Key type
        key: Type,
        /// Value type
        value: Type,
    },
    /// Call of a free function or method
    Call(Call),
    /// Index / key lookup
    Lookup {
        /// Indexed value
        from: Box<Value>,
        /// Index or key
        key: Box<Value>,
        /// Resolution
        meta: LookupMetadata,
    },
    /// Field access
    Property {
        /// Receiver
        of: Box<Value>,
        /// Resolution
        meta: PropertyMetadata,
    },
    /// Set membership test
    SetContains {
        /// The set
        set: Box<Value>,
        /// The value looked for
        value: Box<Value>,
    },
    /// Fresh instance; primitive fields start at their zero value,
    /// container fields empty and model fields null
    New {
        /// Instantiated model
        model: ModelId,
    },
    /// Length of a string or container
    Length {
        /// Measured value
        of: Box<Value>,
        /// What is measured
        kind: LengthKind,
    },
    /// Unary operation
    Unary {
        /// Operator
        operator: UnaryOperator,
        /// Operand
        value: Box<Value>,
        /// Operator resolution
        meta: OperationMetadata,
    },
    /// Binary operation
    Binary {
        /// Operator
        operator: BinaryOperator,
        /// Left operand
        left: Box<Value>,
        /// Right operand
        right: Box<Value>,
        /// Operator resolution
        meta: OperationMetadata,
    },
    /// Variable reference
    Variable(VariableMetadata),
    /// The receiver inside a method or override
    SelfRef {
        /// Enclosing model
        model: ModelId,
    },
    /// `null`, typed by its context
    Null {
        /// Contextual type
        ty: Type,
    },
    /// Remove and yield the last list element
    Pop {
        /// The list
        list: Box<Value>,
        /// Element type
        item: Type,
    },
}

impl Value {
    /// Whether this is `null`
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null { .. })
    }
}
