//! Untyped syntax tree for Quill modules
//!
//! This is the shape a parser hands to the lowering pass. Nothing here is
//! resolved or typed: names are plain strings and types are written the
//! way the source wrote them.
//!
//! Every node derives `serde` so a tree can be stored as JSON and fed to
//! the `quill` CLI without a parser in the loop.

mod statement;
mod types;
mod value;

pub use statement::{Block, If, Statement};
pub use types::Type;
pub use value::{BinaryOperator, Callable, Call, KeyValue, UnaryOperator, Value};

use serde::{Deserialize, Serialize};

/// Top-level compilation unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Module name
    pub name: String,
    /// Constant definitions, in source order
    #[serde(default)]
    pub constants: Vec<ConstantDef>,
    /// Free function definitions, in source order
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
    /// Model definitions, in source order
    #[serde(default)]
    pub models: Vec<ModelDef>,
}

impl Module {
    /// Create an empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constants: Vec::new(),
            functions: Vec::new(),
            models: Vec::new(),
        }
    }

    /// Add a constant
    #[must_use]
    pub fn with_constant(mut self, constant: ConstantDef) -> Self {
        self.constants.push(constant);
        self
    }

    /// Add a free function
    #[must_use]
    pub fn with_function(mut self, function: FunctionDef) -> Self {
        self.functions.push(function);
        self
    }

    /// Add a model
    #[must_use]
    pub fn with_model(mut self, model: ModelDef) -> Self {
        self.models.push(model);
        self
    }
}

/// Module-level constant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantDef {
    /// Constant name
    pub name: String,
    /// Constant value
    pub value: Value,
}

impl ConstantDef {
    /// Create a constant definition
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Function or method argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentDef {
    /// Argument name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub ty: Type,
}

impl ArgumentDef {
    /// Create an argument definition
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Function definition (free function or model method)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Function name
    pub name: String,
    /// Arguments, in declaration order
    #[serde(default)]
    pub arguments: Vec<ArgumentDef>,
    /// Declared return type
    pub return_type: Type,
    /// Function body
    pub block: Block,
}

impl FunctionDef {
    /// Create a function with no arguments
    pub fn new(name: impl Into<String>, return_type: Type, block: Block) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            return_type,
            block,
        }
    }

    /// Add an argument
    #[must_use]
    pub fn with_argument(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.arguments.push(ArgumentDef::new(name, ty));
        self
    }
}

/// Model field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub ty: Type,
}

impl FieldDef {
    /// Create a field definition
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// User-supplied equality for a model
///
/// The body sees the receiver as `self` and the compared instance under
/// `other_name`; it must return a boolean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EqualOverride {
    /// Name bound to the other instance
    pub other_name: String,
    /// Override body
    pub block: Block,
}

/// User-supplied hash for a model; the body must return an int
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashOverride {
    /// Override body
    pub block: Block,
}

/// Model (record/class) definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDef {
    /// Model name
    pub name: String,
    /// Fields, in declaration order
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Methods, in declaration order
    #[serde(default)]
    pub methods: Vec<FunctionDef>,
    /// Optional equality override
    #[serde(default)]
    pub equal_override: Option<EqualOverride>,
    /// Optional hash override
    #[serde(default)]
    pub hash_override: Option<HashOverride>,
}

impl ModelDef {
    /// Create a model with no members
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            methods: Vec::new(),
            equal_override: None,
            hash_override: None,
        }
    }

    /// Add a field
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.fields.push(FieldDef::new(name, ty));
        self
    }

    /// Add a method
    #[must_use]
    pub fn with_method(mut self, method: FunctionDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Set the equality override
    #[must_use]
    pub fn with_equal_override(mut self, other_name: impl Into<String>, block: Block) -> Self {
        self.equal_override = Some(EqualOverride {
            other_name: other_name.into(),
            block,
        });
        self
    }

    /// Set the hash override
    #[must_use]
    pub fn with_hash_override(mut self, block: Block) -> Self {
        self.hash_override = Some(HashOverride { block });
        self
    }
}
