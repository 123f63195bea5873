//! Statement nodes

use crate::value::{Call, Callable};
use crate::Value;
use serde::{Deserialize, Serialize};

/// Ordered statement list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Statements
    #[serde(default)]
    pub statements: Vec<Statement>,
}

impl Block {
    /// Create a block
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }
}

/// One `if` / `else if` arm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct If {
    /// Condition
    pub condition: Value,
    /// Arm body
    pub block: Block,
}

/// Statement nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    /// `name := value`
    Declare {
        /// Local name
        name: String,
        /// Initial value
        value: Value,
    },
    /// `to = from`
    Assign {
        /// Assigned place
        to: Value,
        /// Assigned value
        from: Value,
    },
    /// `if` / `else if` chain with optional `else`
    Conditional {
        /// The `if` arm followed by any `else if` arms
        ifs: Vec<If>,
        /// `else` arm
        #[serde(default)]
        else_block: Option<Block>,
    },
    /// C-style `for (init; condition; after_each)`
    For {
        /// Runs once before the loop
        #[serde(default)]
        initialization: Option<Box<Statement>>,
        /// Loop condition
        condition: Value,
        /// Runs after each iteration
        #[serde(default)]
        after_each: Option<Box<Statement>>,
        /// Loop body
        block: Block,
    },
    /// `for item in iterable`
    ForEach {
        /// Item binding name
        item_name: String,
        /// Iterated list or set
        iterable: Value,
        /// Loop body
        block: Block,
    },
    /// `return` with an optional value
    Return {
        /// Returned value
        #[serde(default)]
        value: Option<Value>,
    },
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `set.add(value)`
    AddToSet {
        /// The set
        set: Value,
        /// Added value
        value: Value,
    },
    /// `list.push(value)`
    Push {
        /// The list
        list: Value,
        /// Pushed value
        value: Value,
    },
    /// `list.pop()` for its effect
    Pop {
        /// The list
        list: Value,
    },
    /// A call for its effect
    Call(Call),
}

impl Statement {
    /// `name := value`
    pub fn declare(name: impl Into<String>, value: Value) -> Self {
        Self::Declare {
            name: name.into(),
            value,
        }
    }

    /// `to = from`
    pub fn assign(to: Value, from: Value) -> Self {
        Self::Assign { to, from }
    }

    /// `return value`
    pub fn ret(value: Value) -> Self {
        Self::Return { value: Some(value) }
    }

    /// Bare `return`
    pub fn ret_void() -> Self {
        Self::Return { value: None }
    }

    /// `if (condition) { block }`
    pub fn if_then(condition: Value, block: Block) -> Self {
        Self::Conditional {
            ifs: vec![If { condition, block }],
            else_block: None,
        }
    }

    /// `if (condition) { then } else { otherwise }`
    pub fn if_else(condition: Value, then: Block, otherwise: Block) -> Self {
        Self::Conditional {
            ifs: vec![If {
                condition,
                block: then,
            }],
            else_block: Some(otherwise),
        }
    }

    /// `for item in iterable { block }`
    pub fn for_each(item_name: impl Into<String>, iterable: Value, block: Block) -> Self {
        Self::ForEach {
            item_name: item_name.into(),
            iterable,
            block,
        }
    }

    /// Call statement for a free function
    pub fn call(name: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self::Call(Call {
            function: Callable::Function { name: name.into() },
            arguments,
        })
    }

    /// Call statement for a method (or built-in container operation)
    pub fn method_call(of: Value, name: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self::Call(Call {
            function: Callable::Property {
                of: Box::new(of),
                name: name.into(),
            },
            arguments,
        })
    }
}
