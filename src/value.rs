use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::ast::{BinOp, Pattern, Stmt, UnaryOp};
use crate::errors::{EvalError, Result};
use crate::interpreter::{Interpreter, Scope};
use crate::scheduler::TaskHandle;

/// Signature of a built-in routine registered in the initial environment.
pub type BuiltinFcn = fn(&mut Interpreter, Vec<Value>) -> Result<Value>;

/// A callable runtime value: an async lambda closed over its definition
/// environment, or a named built-in.
pub enum Callable {
    Closure {
        params: Vec<Pattern>,
        body: Arc<Vec<Stmt>>,
        env: Scope,
        is_async: bool,
    },
    Builtin(&'static str, BuiltinFcn),
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Callable::Closure { params, is_async, .. } => f
                .debug_struct("Closure")
                .field("params", &params.len())
                .field("is_async", is_async)
                .finish(),
            Callable::Builtin(name, _) => f.debug_tuple("Builtin").field(name).finish(),
        }
    }
}

/// Runtime values of the task language.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Arc<str>),
    Seq(Arc<Vec<Value>>),
    Map(Arc<BTreeMap<String, Value>>),

    // Handle to an enrolled task; awaiting it yields the task's result.
    Task(TaskHandle),

    Callable(Arc<Callable>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Task(a), Value::Task(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Seq(items) => items.serialize(serializer),
            Value::Map(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }

            // Non-data values render as placeholder strings.
            Value::Task(handle) => {
                serializer.serialize_str(&format!("<task {}>", handle.name()))
            }
            Value::Callable(_) => serializer.serialize_str("<callable>"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{s}"),
            Err(_e) => Err(fmt::Error),
        }
    }
}

impl Value {
    pub fn from_seq(items: Vec<Value>) -> Value {
        Value::Seq(Arc::new(items))
    }

    pub fn from_map(fields: BTreeMap<String, Value>) -> Value {
        Value::Map(Arc::new(fields))
    }

    pub fn new_seq() -> Value {
        Value::from_seq(Vec::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            _ => Err(EvalError::TypeExpected {
                expected: "integer",
                got: self.clone(),
            }),
        }
    }

    pub fn as_seq(&self) -> Result<&Vec<Value>> {
        match self {
            Value::Seq(items) => Ok(items),
            _ => Err(EvalError::TypeExpected {
                expected: "sequence",
                got: self.clone(),
            }),
        }
    }

    pub fn as_map(&self) -> Result<&BTreeMap<String, Value>> {
        match self {
            Value::Map(fields) => Ok(fields),
            _ => Err(EvalError::TypeExpected {
                expected: "mapping",
                got: self.clone(),
            }),
        }
    }

    pub fn as_callable(&self) -> Result<&Arc<Callable>> {
        match self {
            Value::Callable(c) => Ok(c),
            _ => Err(EvalError::NotCallable(self.clone())),
        }
    }

    /// Truthiness: numbers are true iff non-zero, strings and collections
    /// iff non-empty, `null` is false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Seq(items) => !items.is_empty(),
            Value::Map(fields) => !fields.is_empty(),
            Value::Task(_) | Value::Callable(_) => true,
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s.as_str()))
    }
}

/// Numeric pair after promotion. Mixed integer/float operands promote to
/// floating point.
enum NumPair {
    Ints(i64, i64),
    Floats(f64, f64),
}

fn num_pair(left: &Value, right: &Value) -> Option<NumPair> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(NumPair::Ints(*a, *b)),
        (Value::Int(a), Value::Float(b)) => Some(NumPair::Floats(*a as f64, *b)),
        (Value::Float(a), Value::Int(b)) => Some(NumPair::Floats(*a, *b as f64)),
        (Value::Float(a), Value::Float(b)) => Some(NumPair::Floats(*a, *b)),
        _ => None,
    }
}

/// Structural equality with numeric cross-type comparison.
pub(crate) fn equals(left: &Value, right: &Value) -> bool {
    match num_pair(left, right) {
        Some(NumPair::Ints(a, b)) => a == b,
        Some(NumPair::Floats(a, b)) => a == b,
        None => left == right,
    }
}

fn incompatible(op: BinOp, left: &Value, right: &Value) -> EvalError {
    EvalError::IncompatibleOperands {
        op: op_token(op),
        left: left.clone(),
        right: right.clone(),
    }
}

pub(crate) fn op_token(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::Le => "<=",
        BinOp::Ge => ">=",
    }
}

/// All binary operators funnel through here so coercion rules cannot diverge
/// between call sites.
pub(crate) fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value> {
    match op {
        BinOp::Add => match (left, right) {
            (Value::String(a), Value::String(b)) => {
                let mut s = String::with_capacity(a.len() + b.len());
                s.push_str(a);
                s.push_str(b);
                Ok(Value::from(s))
            }
            _ => match num_pair(left, right) {
                Some(NumPair::Ints(a, b)) => Ok(Value::Int(a.wrapping_add(b))),
                Some(NumPair::Floats(a, b)) => Ok(Value::Float(a + b)),
                None => Err(incompatible(op, left, right)),
            },
        },
        BinOp::Sub => match num_pair(left, right) {
            Some(NumPair::Ints(a, b)) => Ok(Value::Int(a.wrapping_sub(b))),
            Some(NumPair::Floats(a, b)) => Ok(Value::Float(a - b)),
            None => Err(incompatible(op, left, right)),
        },
        BinOp::Mul => match num_pair(left, right) {
            Some(NumPair::Ints(a, b)) => Ok(Value::Int(a.wrapping_mul(b))),
            Some(NumPair::Floats(a, b)) => Ok(Value::Float(a * b)),
            None => Err(incompatible(op, left, right)),
        },
        BinOp::Div => match num_pair(left, right) {
            Some(NumPair::Ints(_, 0)) => Err(EvalError::DivisionByZero),
            Some(NumPair::Ints(a, b)) => {
                // Floor division: quotient rounds toward negative infinity.
                let q = a.wrapping_div(b);
                let q = if a.wrapping_rem(b) != 0 && (a < 0) != (b < 0) {
                    q - 1
                } else {
                    q
                };
                Ok(Value::Int(q))
            }
            Some(NumPair::Floats(_, b)) if b == 0.0 => Err(EvalError::DivisionByZero),
            Some(NumPair::Floats(a, b)) => Ok(Value::Float(a / b)),
            None => Err(incompatible(op, left, right)),
        },
        BinOp::Eq => Ok(Value::Bool(equals(left, right))),
        BinOp::Ne => Ok(Value::Bool(!equals(left, right))),
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) => a.cmp(b),
                _ => match num_pair(left, right) {
                    Some(NumPair::Ints(a, b)) => a.cmp(&b),
                    Some(NumPair::Floats(a, b)) => a
                        .partial_cmp(&b)
                        .ok_or_else(|| incompatible(op, left, right))?,
                    None => return Err(incompatible(op, left, right)),
                },
            };
            let res = match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Gt => ordering.is_gt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            };
            Ok(Value::Bool(res))
        }
    }
}

pub(crate) fn unary(op: UnaryOp, operand: &Value) -> Result<Value> {
    match (op, operand) {
        (UnaryOp::Plus, Value::Int(i)) => Ok(Value::Int(*i)),
        (UnaryOp::Plus, Value::Float(f)) => Ok(Value::Float(*f)),
        (UnaryOp::Minus, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
        (UnaryOp::Minus, Value::Float(f)) => Ok(Value::Float(-f)),
        _ => Err(EvalError::TypeExpected {
            expected: "number",
            got: operand.clone(),
        }),
    }
}
