//! Higher-order combinators over sequences. The function argument may be any
//! callable; suspended results are collected and joined so async callables
//! run concurrently, except `reduce` which awaits each step.

use std::collections::BTreeMap;

use super::ensure_args_count;
use crate::errors::Result;
use crate::interpreter::{Flow, Interpreter};
use crate::scheduler::TaskHandle;
use crate::value::{BuiltinFcn, Value};

pub fn register(m: &mut BTreeMap<&'static str, BuiltinFcn>) {
    m.insert("map", map as BuiltinFcn);
    m.insert("filter", filter as BuiltinFcn);
    m.insert("reduce", reduce as BuiltinFcn);
}

enum Slot {
    Ready(Value),
    Suspended(TaskHandle),
}

impl Slot {
    fn resolve(self) -> Result<Value> {
        match self {
            Slot::Ready(value) => Ok(value),
            Slot::Suspended(handle) => handle.join(),
        }
    }
}

fn apply_each(
    interp: &mut Interpreter,
    fcn: &Value,
    items: &[Value],
) -> Result<Vec<Value>> {
    let callable = fcn.as_callable()?.clone();
    let mut slots = Vec::with_capacity(items.len());
    for item in items {
        slots.push(match interp.call_callable(&callable, vec![item.clone()])? {
            Flow::Value(value) => Slot::Ready(value),
            Flow::Pending(handle) => Slot::Suspended(handle),
            Flow::Return(_) => Slot::Ready(Value::Null),
        });
    }
    slots.into_iter().map(Slot::resolve).collect()
}

fn map(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    ensure_args_count("map", 2, &args)?;
    let items = args[0].as_seq()?.clone();
    let results = apply_each(interp, &args[1], &items)?;
    Ok(Value::from_seq(results))
}

fn filter(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    ensure_args_count("filter", 2, &args)?;
    let items = args[0].as_seq()?.clone();
    let keeps = apply_each(interp, &args[1], &items)?;
    let kept = items
        .into_iter()
        .zip(keeps)
        .filter(|(_, keep)| keep.truthy())
        .map(|(item, _)| item)
        .collect();
    Ok(Value::from_seq(kept))
}

fn reduce(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    ensure_args_count("reduce", 3, &args)?;
    let items = args[0].as_seq()?.clone();
    let callable = args[1].as_callable()?.clone();
    let mut acc = args[2].clone();
    for item in items {
        acc = match interp.call_callable(&callable, vec![acc, item])? {
            Flow::Value(value) => value,
            Flow::Pending(handle) => handle.join()?,
            Flow::Return(_) => Value::Null,
        };
    }
    Ok(acc)
}
