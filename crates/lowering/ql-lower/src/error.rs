//! Lowering errors

use ql_ir::DuplicateName;
use thiserror::Error;

/// The first problem found while lowering a module
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LowerError {
    /// A name did not resolve to any visible definition
    #[error("name not found: {0}")]
    NameNotFound(String),

    /// A name was defined twice in one namespace
    #[error("duplicate definition: {0}")]
    DuplicateDefinition(String),

    /// A name breaks the naming convention for its kind
    #[error("invalid name `{name}`: {reason}")]
    InvalidName {
        /// Offending name
        name: String,
        /// Which rule it broke
        reason: &'static str,
    },

    /// A value has the wrong type for its position
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Required type
        expected: String,
        /// Derived type
        found: String,
    },

    /// The operand types are valid together but the operator is not
    #[error("unsupported operator `{operator}` for {operand}")]
    UnsupportedOperator {
        /// Operator spelling
        operator: String,
        /// Operand type(s)
        operand: String,
    },

    /// Indexing into something that cannot be indexed
    #[error("cannot index into {ty}")]
    InvalidLookup {
        /// Receiver type
        ty: String,
    },

    /// Method call on a model that has no such method
    #[error("model {model} has no method {method}")]
    UnknownMethod {
        /// Receiver model
        model: String,
        /// Requested method
        method: String,
    },

    /// Container literal whose element types disagree or cannot be inferred
    #[error("cannot infer literal type: {0}")]
    HeterogeneousLiteral(String),

    /// `if` / `for` condition that is not a boolean
    #[error("condition must be bool, found {found}")]
    ConditionNotBoolean {
        /// Derived condition type
        found: String,
    },

    /// Returned value does not match the declared return type
    #[error("return type mismatch: expected {expected}, found {found}")]
    ReturnTypeMismatch {
        /// Declared return type
        expected: String,
        /// Returned type
        found: String,
    },

    /// Non-void body whose last statement is not a return
    #[error("missing return at end of {0}")]
    MissingTerminalReturn(String),

    /// The lowerer reached a state the tree shape should rule out
    #[error("structural error: {0}")]
    StructuralError(String),

    /// Constant initializer that is not statically evaluable
    #[error("constant {0} must be built from literals and earlier constants")]
    InvalidConstant(String),

    /// `null` where no type can be inferred for it
    #[error("null is only allowed where its type is known")]
    InvalidNull,

    /// Assignment to something that cannot be assigned
    #[error("cannot assign to {0}")]
    InvalidAssignment(String),

    /// Call with the wrong number of arguments
    #[error("{function} expects {expected} arguments, found {found}")]
    ArgumentCountMismatch {
        /// Callee name
        function: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        found: usize,
    },

    /// `self` outside a method or override
    #[error("self used outside of a model")]
    SelfOutsideModel,

    /// `break` / `continue` outside a loop
    #[error("loop control outside of a loop")]
    LoopControlOutsideLoop,
}

/// Fieldless discriminant of [`LowerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs, reason = "variants mirror LowerError one to one")]
pub enum ErrorKind {
    NameNotFound,
    DuplicateDefinition,
    InvalidName,
    TypeMismatch,
    UnsupportedOperator,
    InvalidLookup,
    UnknownMethod,
    HeterogeneousLiteral,
    ConditionNotBoolean,
    ReturnTypeMismatch,
    MissingTerminalReturn,
    StructuralError,
    InvalidConstant,
    InvalidNull,
    InvalidAssignment,
    ArgumentCountMismatch,
    SelfOutsideModel,
    LoopControlOutsideLoop,
}

impl LowerError {
    /// Which kind of error this is
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NameNotFound(_) => ErrorKind::NameNotFound,
            Self::DuplicateDefinition(_) => ErrorKind::DuplicateDefinition,
            Self::InvalidName { .. } => ErrorKind::InvalidName,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::UnsupportedOperator { .. } => ErrorKind::UnsupportedOperator,
            Self::InvalidLookup { .. } => ErrorKind::InvalidLookup,
            Self::UnknownMethod { .. } => ErrorKind::UnknownMethod,
            Self::HeterogeneousLiteral(_) => ErrorKind::HeterogeneousLiteral,
            Self::ConditionNotBoolean { .. } => ErrorKind::ConditionNotBoolean,
            Self::ReturnTypeMismatch { .. } => ErrorKind::ReturnTypeMismatch,
            Self::MissingTerminalReturn(_) => ErrorKind::MissingTerminalReturn,
            Self::StructuralError(_) => ErrorKind::StructuralError,
            Self::InvalidConstant(_) => ErrorKind::InvalidConstant,
            Self::InvalidNull => ErrorKind::InvalidNull,
            Self::InvalidAssignment(_) => ErrorKind::InvalidAssignment,
            Self::ArgumentCountMismatch { .. } => ErrorKind::ArgumentCountMismatch,
            Self::SelfOutsideModel => ErrorKind::SelfOutsideModel,
            Self::LoopControlOutsideLoop => ErrorKind::LoopControlOutsideLoop,
        }
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

impl From<DuplicateName> for LowerError {
    fn from(err: DuplicateName) -> Self {
        Self::DuplicateDefinition(err.0)
    }
}

/// Result alias for lowering
pub type LowerResult<T> = Result<T, LowerError>;
