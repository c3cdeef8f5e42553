mod collections;

use std::collections::BTreeMap;

use lazy_static::lazy_static;

use crate::errors::{EvalError, Result};
use crate::value::{BuiltinFcn, Value};

lazy_static! {
    /// Built-in routines registered in every interpreter's initial
    /// environment.
    pub static ref BUILTINS: BTreeMap<&'static str, BuiltinFcn> = {
        let mut m: BTreeMap<&'static str, BuiltinFcn> = BTreeMap::new();
        collections::register(&mut m);
        m
    };
}

pub(crate) fn ensure_args_count(
    name: &'static str,
    expected: usize,
    args: &[Value],
) -> Result<()> {
    if args.len() != expected {
        return Err(EvalError::BuiltinArity {
            name,
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}
