use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::host::error::EvalError;
use crate::host::evaluator::Evaluator;

pub type NativeClosure = dyn Fn(&mut dyn Evaluator, &[Value]) -> Result<Value, EvalError>;

/// A host value as seen by table handlers.
pub enum Value {
    Null,
    Logical(Vec<bool>),
    Integer(Vec<i64>),
    Numeric(Vec<f64>),
    Character(Vec<String>),
    List(Vec<Value>),
    Env(Environment),
    Closure(Closure),
    /// The host's "no binding here" value.
    Unbound,
    /// Out-slot handed to Get handlers; returning it untouched means "not found".
    Missing(Marker),
}

impl Value {
    pub fn flag(b: bool) -> Self {
        Value::Logical(vec![b])
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::Character(vec![s.into()])
    }

    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Character(items.into_iter().map(Into::into).collect())
    }

    /// First element read as a truth value. Integers and doubles follow the
    /// usual non-zero rule; anything else has no truth value.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Value::Logical(v) => v.first().copied(),
            Value::Integer(v) => v.first().map(|i| *i != 0),
            Value::Numeric(v) => v.first().map(|f| *f != 0.0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Character(v) => v.first().map(String::as_str),
            _ => None,
        }
    }

    /// Reads a name listing. `Null` is an empty listing.
    pub fn as_names(&self) -> Option<Vec<String>> {
        match self {
            Value::Character(v) => Some(v.clone()),
            Value::Null => Some(Vec::new()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Closure(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Null | Value::Unbound | Value::Missing(_) => 0,
            Value::Logical(v) => v.len(),
            Value::Integer(v) => v.len(),
            Value::Numeric(v) => v.len(),
            Value::Character(v) => v.len(),
            Value::List(v) => v.len(),
            Value::Env(_) | Value::Closure(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Logical(_) => "logical",
            Value::Integer(_) => "integer",
            Value::Numeric(_) => "double",
            Value::Character(_) => "character",
            Value::List(_) => "list",
            Value::Env(_) => "environment",
            Value::Closure(_) => "closure",
            Value::Unbound => "unbound",
            Value::Missing(_) => "missing",
        }
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        match self {
            Value::Null => Value::Null,
            Value::Logical(v) => Value::Logical(v.clone()),
            Value::Integer(v) => Value::Integer(v.clone()),
            Value::Numeric(v) => Value::Numeric(v.clone()),
            Value::Character(v) => Value::Character(v.clone()),
            Value::List(v) => Value::List(v.clone()),
            Value::Env(e) => Value::Env(e.clone()),
            Value::Closure(c) => Value::Closure(c.clone()),
            Value::Unbound => Value::Unbound,
            Value::Missing(m) => Value::Missing(m.clone()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Logical(a), Value::Logical(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Numeric(a), Value::Numeric(b)) => a == b,
            (Value::Character(a), Value::Character(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Env(a), Value::Env(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => a == b,
            (Value::Unbound, Value::Unbound) => true,
            (Value::Missing(a), Value::Missing(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Logical(v) => write!(f, "logical{:?}", v),
            Value::Integer(v) => write!(f, "integer{:?}", v),
            Value::Numeric(v) => write!(f, "double{:?}", v),
            Value::Character(v) => write!(f, "character{:?}", v),
            Value::List(v) => write!(f, "list(<{} elements>)", v.len()),
            Value::Env(_) => write!(f, "<environment>"),
            Value::Closure(c) => write!(f, "<closure {}>", c.label()),
            Value::Unbound => write!(f, "<unbound>"),
            Value::Missing(_) => write!(f, "<missing>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::List(v) => f.debug_tuple("Value::List").field(v).finish(),
            Value::Env(e) => write!(f, "Value::Env({:?})", e.names()),
            other => write!(f, "Value({})", other),
        }
    }
}

/// Identity token behind `Value::Missing`. Two markers are equal only if
/// they are the same allocation.
#[derive(Clone)]
pub struct Marker(Rc<()>);

impl Marker {
    pub fn fresh() -> Self {
        Marker(Rc::new(()))
    }
}

impl PartialEq for Marker {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Shared mutable frame. Clones alias the same bindings.
#[derive(Clone, Default)]
pub struct Environment {
    frame: Rc<RefCell<HashMap<String, Value>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.frame.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.frame.borrow().contains_key(name)
    }

    pub fn set(&self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.frame.borrow_mut().insert(name.into(), value)
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.frame.borrow_mut().remove(name)
    }

    /// Bound names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.frame.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.frame)
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }
}

/// A callable host value wrapping native Rust code.
#[derive(Clone)]
pub struct Closure {
    label: Rc<str>,
    body: Rc<NativeClosure>,
}

impl Closure {
    pub fn new<F>(label: &str, body: F) -> Self
    where
        F: Fn(&mut dyn Evaluator, &[Value]) -> Result<Value, EvalError> + 'static,
    {
        Closure {
            label: Rc::from(label),
            body: Rc::new(body),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn call(&self, ev: &mut dyn Evaluator, args: &[Value]) -> Result<Value, EvalError> {
        (self.body)(ev, args)
    }
}

impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }
}

impl From<Closure> for Value {
    fn from(c: Closure) -> Self {
        Value::Closure(c)
    }
}

impl From<Environment> for Value {
    fn from(e: Environment) -> Self {
        Value::Env(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_compare_by_identity() {
        let a = Marker::fresh();
        let b = Marker::fresh();
        assert!(Value::Missing(a.clone()) == Value::Missing(a));
        assert!(Value::Missing(b) != Value::Missing(Marker::fresh()));
    }

    #[test]
    fn test_flag_reading() {
        assert_eq!(Value::flag(true).as_flag(), Some(true));
        assert_eq!(Value::Integer(vec![0]).as_flag(), Some(false));
        assert_eq!(Value::Logical(vec![]).as_flag(), None);
        assert_eq!(Value::Null.as_flag(), None);
    }

    #[test]
    fn test_environment_aliases() {
        let env = Environment::new();
        let alias = env.clone();
        alias.set("x", Value::Integer(vec![1]));
        assert_eq!(env.get("x"), Some(Value::Integer(vec![1])));
        assert_eq!(env.ref_count(), 2);
    }
}
