//! The evaluator seam between tables and the host runtime.
//!
//! Tables never call handler code directly. They build a [`Call`] and hand it
//! to an [`Evaluator`], which is free to resolve symbols, apply closures and
//! trap failures however the host sees fit. [`EvalContext`] is a small
//! self-contained evaluator backed by a function registry.

use std::collections::HashMap;
use std::fmt;

use crate::host::error::EvalError;
use crate::host::value::{Closure, Value};

/// What a constructed call applies.
#[derive(Clone, Debug)]
pub enum Callee {
    /// A function looked up by name in the evaluator's function space.
    Symbol(&'static str),
    /// A value applied directly; it must be callable.
    Value(Value),
}

/// A constructed call expression: callee plus positional arguments.
#[derive(Clone, Debug)]
pub struct Call {
    pub callee: Callee,
    pub args: Vec<Value>,
}

impl Call {
    pub fn symbol(name: &'static str, args: Vec<Value>) -> Self {
        Call {
            callee: Callee::Symbol(name),
            args,
        }
    }

    pub fn value(fun: Value, args: Vec<Value>) -> Self {
        Call {
            callee: Callee::Value(fun),
            args,
        }
    }

    pub fn describe(&self) -> String {
        match &self.callee {
            Callee::Symbol(name) => format!("{}(<{} args>)", name, self.args.len()),
            Callee::Value(v) => format!("{}(<{} args>)", v, self.args.len()),
        }
    }
}

/// Evaluates constructed calls synchronously.
///
/// An `Err` means the call failed; it must never be used to report an
/// ordinary `NULL` result.
pub trait Evaluator {
    fn eval(&mut self, call: &Call) -> Result<Value, EvalError>;
}

/// Reference evaluator: named functions live in a registry, closures are
/// applied as-is.
pub struct EvalContext {
    functions: HashMap<String, Closure>,
    calls: usize,
}

impl EvalContext {
    pub fn new() -> Self {
        EvalContext {
            functions: HashMap::new(),
            calls: 0,
        }
    }

    /// Define (or redefine) a named function.
    pub fn define<F>(&mut self, name: &str, body: F) -> &mut Self
    where
        F: Fn(&mut dyn Evaluator, &[Value]) -> Result<Value, EvalError> + 'static,
    {
        self.functions
            .insert(name.to_string(), Closure::new(name, body));
        self
    }

    pub fn undefine(&mut self, name: &str) -> Option<Closure> {
        self.functions.remove(name)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Number of calls evaluated so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls
    }

    /// The value handlers return to say "no binding".
    pub fn unbound_value() -> Value {
        Value::Unbound
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("EvalContext")
            .field("functions", &names)
            .field("calls", &self.calls)
            .finish()
    }
}

impl Evaluator for EvalContext {
    fn eval(&mut self, call: &Call) -> Result<Value, EvalError> {
        self.calls += 1;
        let fun = match &call.callee {
            Callee::Symbol(name) => self
                .functions
                .get(*name)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedFunction(name.to_string()))?,
            Callee::Value(Value::Closure(c)) => c.clone(),
            Callee::Value(other) => {
                return Err(EvalError::NotCallable(other.type_name().to_string()))
            }
        };
        fun.call(self, &call.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_call_dispatches_to_registry() {
        let mut ev = EvalContext::new();
        ev.define("twice", |_, args| match args.first() {
            Some(Value::Integer(v)) => Ok(Value::Integer(v.iter().map(|i| i * 2).collect())),
            _ => Err(EvalError::Raised("bad input".to_string())),
        });
        let out = ev
            .eval(&Call::symbol("twice", vec![Value::Integer(vec![4])]))
            .unwrap();
        assert_eq!(out, Value::Integer(vec![8]));
        assert_eq!(ev.call_count(), 1);
    }

    #[test]
    fn test_undefined_and_non_callable() {
        let mut ev = EvalContext::new();
        assert_eq!(
            ev.eval(&Call::symbol("nope", vec![])),
            Err(EvalError::UndefinedFunction("nope".to_string()))
        );
        assert_eq!(
            ev.eval(&Call::value(Value::Null, vec![])),
            Err(EvalError::NotCallable("NULL".to_string()))
        );
    }

    #[test]
    fn test_null_result_is_not_failure() {
        let mut ev = EvalContext::new();
        let f = Closure::new("nil", |_, _| Ok(Value::Null));
        assert_eq!(ev.eval(&Call::value(f.into(), vec![])), Ok(Value::Null));
    }
}
