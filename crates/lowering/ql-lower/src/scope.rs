//! Scope stack for tracking lexical nesting during lowering
//!
//! The stack mirrors the chain of constructs enclosing the node being
//! lowered, outermost (module) first. Name resolution walks it from the
//! innermost frame outwards and falls back to module constants.

use crate::error::{LowerError, LowerResult};
use ql_ir::{ArgumentRef, CallableRef, Definition, FieldRef, FunctionId, LocalId, ModelId, Module};
use rustc_hash::FxHashMap;
use tracing::trace;

/// Locals introduced so far in one block
#[derive(Debug, Clone, Default)]
pub struct BlockScope {
    locals: FxHashMap<String, LocalId>,
}

/// One level of lexical nesting
#[derive(Debug, Clone)]
pub enum Frame {
    /// The module itself
    Module,
    /// Inside a model definition
    Model(ModelId),
    /// Inside a free function or method
    Function(FunctionId),
    /// Inside a model's equality override
    EqualOverride {
        /// Owning model
        model: ModelId,
        /// Name bound to the compared instance
        other_name: String,
        /// Local for the compared instance
        other: LocalId,
    },
    /// Inside a model's hash override
    HashOverride(ModelId),
    /// Inside a statement block
    Block(BlockScope),
    /// Inside a C-style for; holds the initialization's declaration
    For(Option<(String, LocalId)>),
    /// Inside a for-each; holds the item binding
    ForEach {
        /// Item name
        name: String,
        /// Item local
        item: LocalId,
    },
}

/// Ordered frames, outermost first
///
/// Cloning a stack is how deferred work captures "where it was".
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    /// Create an empty stack
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Record a local in the innermost frame that accepts declarations
    ///
    /// # Errors
    /// `DuplicateDefinition` if the block already declares `name`, or
    /// `StructuralError` if the innermost frame cannot hold locals
    pub(crate) fn bind_local(&mut self, name: &str, local: LocalId) -> LowerResult<()> {
        match self.frames.last_mut() {
            Some(Frame::Block(block)) => {
                if block.locals.contains_key(name) {
                    return Err(LowerError::DuplicateDefinition(name.to_string()));
                }
                block.locals.insert(name.to_string(), local);
                Ok(())
            }
            Some(Frame::For(slot @ None)) => {
                *slot = Some((name.to_string(), local));
                Ok(())
            }
            _ => Err(LowerError::StructuralError(format!(
                "declaration of {name} outside a block"
            ))),
        }
    }

    /// Resolve `name` against the frames, innermost first, then the
    /// module's constants
    ///
    /// # Errors
    /// `NameNotFound` when nothing visible has this name
    pub fn resolve(&self, module: &Module, name: &str) -> LowerResult<Definition> {
        for frame in self.frames.iter().rev() {
            let found = match frame {
                Frame::Block(block) => block.locals.get(name).copied().map(Definition::Local),
                Frame::For(Some((declared, local))) if declared == name => {
                    Some(Definition::Local(*local))
                }
                Frame::ForEach { name: item_name, item } if item_name == name => {
                    Some(Definition::Local(*item))
                }
                Frame::EqualOverride {
                    other_name, other, ..
                } if other_name == name => Some(Definition::Local(*other)),
                Frame::Function(function) => module.functions[*function]
                    .arguments
                    .iter()
                    .position(|arg| arg.name == name)
                    .map(|index| {
                        Definition::Argument(ArgumentRef {
                            function: *function,
                            index,
                        })
                    }),
                Frame::Model(model) => module.models[*model]
                    .field(name)
                    .map(|index| Definition::Field(FieldRef { model: *model, index })),
                _ => None,
            };
            if let Some(definition) = found {
                trace!(variable = name, ?definition, "resolved in frame");
                return Ok(definition);
            }
        }

        match module.constant(name) {
            Some(constant) => {
                trace!(variable = name, "resolved as constant");
                Ok(Definition::Constant(constant))
            }
            None => Err(LowerError::NameNotFound(name.to_string())),
        }
    }

    /// Innermost model, if any
    #[must_use]
    pub fn enclosing_model(&self) -> Option<ModelId> {
        self.frames.iter().rev().find_map(|frame| match frame {
            Frame::Model(model) => Some(*model),
            _ => None,
        })
    }

    /// Innermost callable a `return` would leave
    #[must_use]
    pub fn enclosing_callable(&self) -> Option<CallableRef> {
        self.frames.iter().rev().find_map(|frame| match frame {
            Frame::Function(function) => Some(CallableRef::Function(*function)),
            Frame::EqualOverride { model, .. } => Some(CallableRef::EqualOverride(*model)),
            Frame::HashOverride(model) => Some(CallableRef::HashOverride(*model)),
            _ => None,
        })
    }

    /// Whether a loop encloses the current position within its callable
    #[must_use]
    pub fn in_loop(&self) -> bool {
        for frame in self.frames.iter().rev() {
            match frame {
                Frame::For(_) | Frame::ForEach { .. } => return true,
                Frame::Function(_) | Frame::EqualOverride { .. } | Frame::HashOverride(_) => {
                    return false;
                }
                _ => {}
            }
        }
        false
    }
}
