//! IR interpreter
//!
//! Walks the typed IR directly. Used by `quill run` and by the
//! integration tests to check that lowered programs compute what the
//! source says.

pub mod interpreter;
pub mod value;

pub use interpreter::{Interpreter, InterpreterError};
pub use value::{Instance, Value};
