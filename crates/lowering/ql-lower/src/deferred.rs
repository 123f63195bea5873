//! FIFO queue of work postponed until every sibling signature exists

use crate::scope::ScopeStack;
use ql_ir::{FunctionId, ModelId};
use std::collections::VecDeque;
use std::fmt;

/// A subtree left for later, borrowing the syntax it will lower
#[derive(Debug, Clone, Copy)]
pub enum Continuation<'syn> {
    /// Body of a free function
    FunctionBody {
        /// Function whose block is filled in
        function: FunctionId,
        /// Syntax of the body
        block: &'syn ql_syntax::Block,
    },
    /// Dispatch of a model's method bodies and overrides
    ModelBody {
        /// The model
        model: ModelId,
        /// Syntax of the model
        syntax: &'syn ql_syntax::ModelDef,
    },
    /// Body of a method
    MethodBody {
        /// Method whose block is filled in
        function: FunctionId,
        /// Syntax of the body
        block: &'syn ql_syntax::Block,
    },
    /// Body of an equality override
    EqualOverride {
        /// Owning model
        model: ModelId,
        /// Syntax of the body
        block: &'syn ql_syntax::Block,
    },
    /// Body of a hash override
    HashOverride {
        /// Owning model
        model: ModelId,
        /// Syntax of the body
        block: &'syn ql_syntax::Block,
    },
}

impl fmt::Display for Continuation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FunctionBody { function, .. } => write!(f, "function body {function:?}"),
            Self::ModelBody { syntax, .. } => write!(f, "model body {}", syntax.name),
            Self::MethodBody { function, .. } => write!(f, "method body {function:?}"),
            Self::EqualOverride { model, .. } => write!(f, "equality override {model:?}"),
            Self::HashOverride { model, .. } => write!(f, "hash override {model:?}"),
        }
    }
}

/// A continuation plus the scope it was captured in
#[derive(Debug, Clone)]
pub struct Deferred<'syn> {
    /// Owned snapshot of the stack at enqueue time
    pub scope: ScopeStack,
    /// What to lower once the scope is restored
    pub work: Continuation<'syn>,
}

/// Strict FIFO of deferred work
#[derive(Debug, Default)]
pub struct DeferredQueue<'syn> {
    items: VecDeque<Deferred<'syn>>,
    executed: usize,
}

impl<'syn> DeferredQueue<'syn> {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
            executed: 0,
        }
    }

    /// Append work captured in `scope`
    pub fn enqueue(&mut self, scope: ScopeStack, work: Continuation<'syn>) {
        self.items.push_back(Deferred { scope, work });
    }

    /// Take the oldest item
    pub fn dequeue(&mut self) -> Option<Deferred<'syn>> {
        let item = self.items.pop_front()?;
        self.executed += 1;
        Some(item)
    }

    /// Items waiting
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is waiting
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items handed out so far
    #[must_use]
    pub fn executed(&self) -> usize {
        self.executed
    }
}
