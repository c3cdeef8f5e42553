//! Trellis: a tree-walking interpreter for a small task language with
//! cooperative named tasks, structural pattern matching and rich
//! destructuring, together with a register-and-flags opcode virtual machine
//! modelled after x86 semantics.
//!
//! The two cores are independent: drivers construct a [`ast`] program and
//! hand it to an [`Interpreter`], or feed opcode bytes to a
//! [`tvm::Executor`].

pub mod ast;
mod binder;
mod builtins;
mod errors;
mod interpreter;
mod scheduler;
pub mod tvm;
mod value;

pub use errors::EvalError;
pub use interpreter::{Flow, Interpreter, RoutineDef};
pub use scheduler::{Scheduler, TaskHandle, DEFAULT_WORKERS};
pub use value::{BuiltinFcn, Callable, Value};
