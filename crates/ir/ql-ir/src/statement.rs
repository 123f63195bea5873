//! Typed statements

use crate::value::{Call, Value};
use crate::{CallableRef, LocalId, Type};

/// Ordered statement list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    /// Statements
    pub statements: Vec<Statement>,
}

/// One `if` / `else if` arm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct If {
    /// Boolean condition
    pub condition: Value,
    /// Arm body
    pub block: Block,
}

/// What a for-each walks over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterableKind {
    /// List, in index order
    List,
    /// Set, in insertion order
    Set,
}

/// For-each resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForEachMetadata {
    /// Iterated container kind
    pub kind: IterableKind,
    /// Type bound to the item local
    pub item_type: Type,
}

/// Return resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnMetadata {
    /// Callable this return leaves
    pub callable: CallableRef,
}

/// Typed statements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Introduce a local
    Declare {
        /// The new local
        local: LocalId,
        /// Initial value
        value: Value,
    },
    /// Store into a variable, field, list slot or map entry
    Assign {
        /// Assigned place
        to: Value,
        /// Assigned value
        from: Value,
    },
    /// `if` / `else if` chain
    Conditional {
        /// Arms, tried in order
        ifs: Vec<If>,
        /// Fallback arm
        else_block: Option<Block>,
    },
    /// C-style loop
    For {
        /// Runs once before the loop
        initialization: Option<Box<Statement>>,
        /// Boolean condition
        condition: Value,
        /// Runs after each iteration
        after_each: Option<Box<Statement>>,
        /// Loop body
        block: Block,
    },
    /// Loop over a list or set
    ForEach {
        /// Local bound to each item
        item: LocalId,
        /// Iterated container
        iterable: Value,
        /// Loop body
        block: Block,
        /// Resolution
        meta: ForEachMetadata,
    },
    /// Leave the enclosing callable
    Return {
        /// Returned value (`None` only in void callables)
        value: Option<Value>,
        /// Resolution
        meta: ReturnMetadata,
    },
    /// Leave the innermost loop
    Break,
    /// Next iteration of the innermost loop
    Continue,
    /// Insert into a set
    AddToSet {
        /// The set
        set: Value,
        /// Inserted value
        value: Value,
    },
    /// Append to a list
    Push {
        /// The list
        list: Value,
        /// Appended value
        value: Value,
    },
    /// Drop the last list element
    Pop {
        /// The list
        list: Value,
    },
    /// Call for its effect
    Call(Call),
}
