//! Named dispatch: each operation calls a well-known function.
//!
//! The function for an operation is looked up by its canonical name
//! (`dbread`, `dbexists`, ...) in the host evaluator, and always receives the
//! table's context object as its first argument:
//!
//! ```text
//! Get          dbread(context, name, <missing>)
//! Exists       dbexists(context, name)
//! Remove       dbremove(context, name)
//! CanCache     dbcanCache(context, name)
//! Assign       dbwrite(context, name, value)
//! ListObjects  dbobjects(context)
//! OnAttach     dbattach(context)
//! OnDetach     dbdetach(context)
//! ```
//!
//! The third argument of `dbread` is a fresh marker. A handler that cannot
//! find the name hands it back untouched, which tells "not found" apart from a
//! genuine `NULL` binding.
//!
//! Every invocation runs under the table's reentrancy guard.

use std::fmt;

use crate::host::evaluator::{Call, Callee};
use crate::host::value::{Marker, Value};
use crate::table::error::DispatchError;
use crate::table::operation::Operation;
use crate::table::strategy::{Dispatch, DispatchStrategy, Pinned, StrategyKind};

pub struct NamedDispatchStrategy {
    context: Pinned<Value>,
}

impl NamedDispatchStrategy {
    pub fn new(context: Value) -> Self {
        NamedDispatchStrategy {
            context: Pinned::new(context),
        }
    }

    /// The pinned context object, until release.
    pub fn context(&self) -> Option<Value> {
        self.context.get()
    }

    fn call(
        &self,
        cx: &mut Dispatch<'_>,
        op: Operation,
        rest: Vec<Value>,
    ) -> Result<Value, DispatchError> {
        let fun = op
            .handler_name()
            .ok_or(DispatchError::Unsupported { op })?;
        let context = self.context().ok_or(DispatchError::Released { op })?;
        let mut args = Vec::with_capacity(rest.len() + 1);
        args.push(context);
        args.extend(rest);
        cx.guarded(op, &Call::symbol(fun, args))
    }

    fn call_with_name(
        &self,
        cx: &mut Dispatch<'_>,
        op: Operation,
        name: &str,
    ) -> Result<Value, DispatchError> {
        self.call(cx, op, vec![Value::string(name)])
    }

    fn notify(&self, cx: &mut Dispatch<'_>, op: Operation) {
        if let Err(err) = self.call(cx, op, Vec::new()) {
            cx.report(&err);
        }
    }
}

impl fmt::Debug for NamedDispatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedDispatchStrategy")
            .field("context", &self.context())
            .finish()
    }
}

impl DispatchStrategy for NamedDispatchStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Named
    }

    fn handler(&self, op: Operation) -> Option<Callee> {
        op.handler_name().map(Callee::Symbol)
    }

    fn guards(&self, op: Operation) -> bool {
        op != Operation::Unknown
    }

    fn invoke(
        &self,
        cx: &mut Dispatch<'_>,
        op: Operation,
        args: Vec<Value>,
    ) -> Result<Value, DispatchError> {
        self.call(cx, op, args)
    }

    fn exists(&self, cx: &mut Dispatch<'_>, name: &str) -> bool {
        let outcome = self.call_with_name(cx, Operation::Exists, name);
        cx.flag(outcome).unwrap_or(false)
    }

    fn get(&self, cx: &mut Dispatch<'_>, name: &str) -> Option<Value> {
        let marker = Marker::fresh();
        let outcome = self.call(
            cx,
            Operation::Get,
            vec![Value::string(name), Value::Missing(marker.clone())],
        );
        match outcome {
            Ok(Value::Missing(ref returned)) if *returned == marker => None,
            Ok(Value::Unbound) => None,
            Ok(value) => Some(value),
            Err(err) => {
                cx.report(&err);
                None
            }
        }
    }

    fn assign(
        &self,
        cx: &mut Dispatch<'_>,
        name: &str,
        value: Value,
    ) -> Result<Value, DispatchError> {
        self.call(cx, Operation::Assign, vec![Value::string(name), value])
    }

    fn remove(&self, cx: &mut Dispatch<'_>, name: &str) -> bool {
        let outcome = self.call_with_name(cx, Operation::Remove, name);
        cx.flag(outcome).unwrap_or(false)
    }

    fn objects(&self, cx: &mut Dispatch<'_>) -> Vec<String> {
        let outcome = self.call(cx, Operation::ListObjects, Vec::new());
        cx.names(outcome)
    }

    fn can_cache(&self, cx: &mut Dispatch<'_>, name: &str) -> Option<bool> {
        let outcome = self.call_with_name(cx, Operation::CanCache, name);
        cx.flag(outcome)
    }

    fn on_attach(&self, cx: &mut Dispatch<'_>) {
        self.notify(cx, Operation::OnAttach);
    }

    fn on_detach(&self, cx: &mut Dispatch<'_>) {
        self.notify(cx, Operation::OnDetach);
    }

    fn release(&self) -> bool {
        self.context.release()
    }

    fn is_released(&self) -> bool {
        self.context.is_released()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use uuid::Uuid;

    use super::*;
    use crate::host::error::EvalError;
    use crate::host::evaluator::EvalContext;
    use crate::host::value::Environment;
    use crate::table::guard::FailurePolicy;

    fn dispatch<'a>(ev: &'a mut EvalContext, active: &'a Cell<bool>) -> Dispatch<'a> {
        Dispatch::new(ev, active, FailurePolicy::RestoreAlways, "test", Uuid::nil())
    }

    #[test]
    fn test_context_is_first_argument() {
        let env = Environment::new();
        env.set("x", Value::Integer(vec![7]));
        let mut ev = EvalContext::new();
        ev.define("dbread", |_, args| match (&args[0], args[1].as_str()) {
            (Value::Env(env), Some(name)) => Ok(env.get(name).unwrap_or_else(|| args[2].clone())),
            _ => Err(EvalError::Raised("bad call".to_string())),
        });
        let strategy = NamedDispatchStrategy::new(env.into());
        let active = Cell::new(true);
        let mut cx = dispatch(&mut ev, &active);
        assert_eq!(strategy.get(&mut cx, "x"), Some(Value::Integer(vec![7])));
        assert_eq!(strategy.get(&mut cx, "y"), None);
    }

    #[test]
    fn test_missing_handler_function_degrades() {
        let mut ev = EvalContext::new();
        let strategy = NamedDispatchStrategy::new(Value::Null);
        let active = Cell::new(true);
        let mut cx = dispatch(&mut ev, &active);
        assert!(!strategy.exists(&mut cx, "x"));
        assert_eq!(strategy.objects(&mut cx), Vec::<String>::new());
        assert_eq!(strategy.can_cache(&mut cx, "x"), None);
        assert!(matches!(
            strategy.assign(&mut cx, "x", Value::Null),
            Err(DispatchError::Handler { op: Operation::Assign, .. })
        ));
        assert!(active.get());
    }

    #[test]
    fn test_every_operation_is_guarded() {
        let strategy = NamedDispatchStrategy::new(Value::Null);
        for op in Operation::ALL.iter() {
            assert!(strategy.guards(*op));
            assert!(matches!(strategy.handler(*op), Some(Callee::Symbol(_))));
        }
        assert!(!strategy.guards(Operation::Unknown));
        assert!(strategy.handler(Operation::Unknown).is_none());
    }

    #[test]
    fn test_release_drops_context() {
        let env = Environment::new();
        let strategy = NamedDispatchStrategy::new(env.clone().into());
        assert_eq!(env.ref_count(), 2);
        assert!(strategy.release());
        assert_eq!(env.ref_count(), 1);
        assert!(!strategy.release());

        let mut ev = EvalContext::new();
        let active = Cell::new(true);
        let mut cx = dispatch(&mut ev, &active);
        assert_eq!(
            strategy.invoke(&mut cx, Operation::ListObjects, Vec::new()),
            Err(DispatchError::Released { op: Operation::ListObjects })
        );
        assert_eq!(ev.call_count(), 0);
    }
}
