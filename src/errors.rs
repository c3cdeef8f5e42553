use thiserror::Error;

use crate::value::Value;

/// Evaluator errors.
///
/// `Clone + PartialEq` so a task failure can be stored once in its handle and
/// surfaced at every await site.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("Undefined function '{0}'")]
    UndefinedFunction(String),

    #[error("Variable '{0}' already declared")]
    AlreadyDeclared(String),

    #[error("Variable '{0}' not declared")]
    NotDeclared(String),

    #[error("Destructure mismatch: expected a sequence, got {0:?}")]
    SequenceExpected(Value),

    #[error("Destructure mismatch: expected a mapping, got {0:?}")]
    MappingExpected(Value),

    #[error("Destructure mismatch: missing key '{0}'")]
    MissingKey(String),

    #[error("Destructure mismatch: sequence pattern is longer than the value")]
    SequenceTooShort,

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Cannot apply '{op}' to {left:?} and {right:?}")]
    IncompatibleOperands {
        op: &'static str,
        left: Value,
        right: Value,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Expected {expected}, got {got:?}")]
    TypeExpected { expected: &'static str, got: Value },

    #[error("Value is not callable: {0:?}")]
    NotCallable(Value),

    #[error("Builtin '{name}' expects {expected} arguments, got {actual}")]
    BuiltinArity {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = core::result::Result<T, EvalError>;
