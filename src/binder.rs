//! Recursive destructuring binder shared by declarations, assignments,
//! routine parameters and match patterns.
//!
//! Bindings are staged in a scratch scope and committed only on success, so a
//! failed bind leaves the environment exactly as it was.

use crate::ast::Pattern;
use crate::errors::{EvalError, Result};
use crate::interpreter::{Interpreter, Scope};
use crate::value::Value;

impl Interpreter {
    /// Bind a declaration target. Every name the pattern introduces must not
    /// already exist in the current scope.
    pub(crate) fn bind_declare(&mut self, pattern: &Pattern, value: &Value) -> Result<()> {
        let mut staged = Scope::new();
        self.bind_pattern(pattern, Some(value), &mut staged)?;
        for name in staged.keys() {
            if self.env.contains_key(name) {
                return Err(EvalError::AlreadyDeclared(name.clone()));
            }
        }
        self.env.extend(staged);
        Ok(())
    }

    /// Bind an assignment target. Every name written must already be bound.
    pub(crate) fn bind_assign(&mut self, pattern: &Pattern, value: &Value) -> Result<()> {
        let mut staged = Scope::new();
        self.bind_pattern(pattern, Some(value), &mut staged)?;
        for name in staged.keys() {
            if !self.env.contains_key(name) {
                return Err(EvalError::NotDeclared(name.clone()));
            }
        }
        self.env.extend(staged);
        Ok(())
    }

    /// Bind declared parameter patterns against call arguments. Surplus
    /// arguments are ignored; surplus parameters stay unbound.
    pub(crate) fn bind_params(&mut self, params: &[Pattern], args: Vec<Value>) -> Result<()> {
        let mut staged = Scope::new();
        for (pattern, value) in params.iter().zip(args.iter()) {
            self.bind_pattern(pattern, Some(value), &mut staged)?;
        }
        self.env.extend(staged);
        Ok(())
    }

    /// The recursive binder. `value` is `None` for a missing position
    /// (sequence shorter than the pattern); a missing position with no
    /// default fails the bind. Defaults are evaluated in the current
    /// environment, not the staged one.
    pub(crate) fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Option<&Value>,
        out: &mut Scope,
    ) -> Result<()> {
        match pattern {
            Pattern::Wildcard => Ok(()),

            Pattern::Name(name) => match value {
                Some(v) => {
                    out.insert(name.clone(), v.clone());
                    Ok(())
                }
                None => Err(EvalError::SequenceTooShort),
            },

            Pattern::Sequence(items) => {
                let value = value.ok_or(EvalError::SequenceTooShort)?;
                let seq = match value {
                    Value::Seq(items) => items.clone(),
                    other => return Err(EvalError::SequenceExpected(other.clone())),
                };
                for (i, sub) in items.iter().enumerate() {
                    if let Pattern::Rest(name) = sub {
                        let rest = seq.get(i..).unwrap_or(&[]).to_vec();
                        out.insert(name.clone(), Value::from_seq(rest));
                        break;
                    }
                    self.bind_pattern(sub, seq.get(i), out)?;
                }
                Ok(())
            }

            Pattern::Object(slots) => {
                let value = value.ok_or(EvalError::SequenceTooShort)?;
                let map = match value {
                    Value::Map(fields) => fields.clone(),
                    other => return Err(EvalError::MappingExpected(other.clone())),
                };
                for slot in slots {
                    match map.get(&slot.key) {
                        None => match &slot.default {
                            Some(default) => {
                                let fallback = self.eval_value(default)?;
                                match &slot.nested {
                                    Some(nested) => {
                                        self.bind_pattern(nested, Some(&fallback), out)?
                                    }
                                    None => {
                                        out.insert(slot.name.clone(), fallback.clone());
                                        if let Some(alias) = &slot.alias {
                                            out.insert(alias.clone(), fallback);
                                        }
                                    }
                                }
                            }
                            None => return Err(EvalError::MissingKey(slot.key.clone())),
                        },
                        Some(found) => match &slot.nested {
                            Some(nested) => self.bind_pattern(nested, Some(found), out)?,
                            None => {
                                let bound = if found.is_null() {
                                    match &slot.default {
                                        Some(default) => self.eval_value(default)?,
                                        None => found.clone(),
                                    }
                                } else {
                                    found.clone()
                                };
                                out.insert(slot.name.clone(), bound.clone());
                                if let Some(alias) = &slot.alias {
                                    out.insert(alias.clone(), bound);
                                }
                            }
                        },
                    }
                }
                Ok(())
            }

            Pattern::Slot { name, default } => {
                let bound = self.slot_value(value, default.as_ref())?;
                out.insert(name.clone(), bound);
                Ok(())
            }

            Pattern::Alias {
                name,
                alias,
                default,
            } => {
                let bound = self.slot_value(value, default.as_ref())?;
                out.insert(name.clone(), bound.clone());
                out.insert(alias.clone(), bound);
                Ok(())
            }

            // Rest outside a sequence tail: null becomes the empty sequence.
            Pattern::Rest(name) => {
                let bound = match value {
                    None | Some(Value::Null) => Value::new_seq(),
                    Some(Value::Seq(items)) => Value::Seq(items.clone()),
                    Some(other) => return Err(EvalError::SequenceExpected(other.clone())),
                };
                out.insert(name.clone(), bound);
                Ok(())
            }
        }
    }

    fn slot_value(
        &mut self,
        value: Option<&Value>,
        default: Option<&crate::ast::Expr>,
    ) -> Result<Value> {
        match value {
            None => match default {
                Some(expr) => self.eval_value(expr),
                None => Err(EvalError::SequenceTooShort),
            },
            Some(Value::Null) => match default {
                Some(expr) => self.eval_value(expr),
                None => Ok(Value::Null),
            },
            Some(v) => Ok(v.clone()),
        }
    }
}
