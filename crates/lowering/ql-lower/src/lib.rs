//! Lowering from the untyped syntax tree to the typed IR
//!
//! This crate handles:
//! - Scope stack construction and name resolution
//! - Deferred lowering of bodies, so definitions may appear in any order
//! - Type derivation for every value
//! - Naming, duplicate, condition and return validation

pub mod deferred;
pub mod error;
pub mod lower;
pub mod options;
pub mod scope;
pub mod types;
pub mod validate;

pub use deferred::{Continuation, Deferred, DeferredQueue};
pub use error::{ErrorKind, LowerError, LowerResult};
pub use lower::{Lowerer, lower};
pub use options::LowerOptions;
pub use scope::{Frame, ScopeStack};
pub use types::type_of;
