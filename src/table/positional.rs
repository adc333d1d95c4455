//! Positional dispatch: handlers are closures at fixed slots of a list.
//!
//! Slot `i` of the handler list serves the operation with ordinal `i`. An
//! empty, `NULL` or non-callable slot means the operation is unsupported.
//! Handlers receive only the operation's own arguments; any state they share
//! lives in their closures.
//!
//! Only `Exists` and `Get` run under the reentrancy guard.

use std::fmt;

use crate::host::evaluator::{Call, Callee};
use crate::host::value::Value;
use crate::table::error::{DispatchError, TableError};
use crate::table::operation::{Operation, HANDLER_SLOTS};
use crate::table::strategy::{Dispatch, DispatchStrategy, Pinned, StrategyKind};

pub struct PositionalDispatchStrategy {
    handlers: Pinned<Vec<Value>>,
}

impl PositionalDispatchStrategy {
    /// `handlers` must be a list; shorter lists leave the trailing
    /// operations unsupported.
    pub fn new(handlers: Value) -> Result<Self, TableError> {
        match handlers {
            Value::List(slots) => {
                if slots.len() > HANDLER_SLOTS {
                    tracing::warn!(
                        slots = slots.len(),
                        used = HANDLER_SLOTS,
                        "ignoring extra handler slots"
                    );
                }
                Ok(PositionalDispatchStrategy {
                    handlers: Pinned::new(slots),
                })
            }
            other => Err(TableError::InvalidHandlers(format!(
                "expected a list of handlers, got {}",
                other.type_name()
            ))),
        }
    }

    /// The callable bound at `op`'s slot.
    pub fn slot(&self, op: Operation) -> Option<Value> {
        if op == Operation::Unknown {
            return None;
        }
        self.handlers
            .with(|slots| {
                slots
                    .get(op.ordinal())
                    .filter(|h| h.is_callable())
                    .cloned()
            })
            .flatten()
    }

    fn call(
        &self,
        cx: &mut Dispatch<'_>,
        op: Operation,
        args: Vec<Value>,
    ) -> Result<Value, DispatchError> {
        if self.handlers.is_released() {
            return Err(DispatchError::Released { op });
        }
        let fun = self.slot(op).ok_or(DispatchError::Unsupported { op })?;
        let call = Call::value(fun, args);
        if self.guards(op) {
            cx.guarded(op, &call)
        } else {
            cx.unguarded(op, &call)
        }
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
        match self.call(cx, op, Vec::new()) {
            Ok(_) | Err(DispatchError::Unsupported { .. }) => {}
            Err(err) => cx.report(&err),
        }
    }
}

impl fmt::Debug for PositionalDispatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound: Vec<Operation> = Operation::ALL
            .iter()
            .copied()
            .filter(|op| self.slot(*op).is_some())
            .collect();
        f.debug_struct("PositionalDispatchStrategy")
            .field("bound", &bound)
            .field("released", &self.handlers.is_released())
            .finish()
    }
}

impl DispatchStrategy for PositionalDispatchStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Positional
    }

    fn handler(&self, op: Operation) -> Option<Callee> {
        self.slot(op).map(Callee::Value)
    }

    fn guards(&self, op: Operation) -> bool {
        matches!(op, Operation::Exists | Operation::Get)
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
        match self.call_with_name(cx, Operation::Get, name) {
            Ok(Value::Unbound) | Ok(Value::Missing(_)) => None,
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
        self.handlers.release()
    }

    fn is_released(&self) -> bool {
        self.handlers.is_released()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use uuid::Uuid;

    use super::*;
    use crate::host::error::EvalError;
    use crate::host::evaluator::EvalContext;
    use crate::host::value::Closure;
    use crate::table::guard::FailurePolicy;

    fn slots(fill: &[(Operation, Closure)]) -> Value {
        let mut list = vec![Value::Null; HANDLER_SLOTS];
        for (op, c) in fill {
            list[op.ordinal()] = c.clone().into();
        }
        Value::List(list)
    }

    #[test]
    fn test_rejects_non_list() {
        assert!(matches!(
            PositionalDispatchStrategy::new(Value::Null),
            Err(TableError::InvalidHandlers(_))
        ));
    }

    #[test]
    fn test_short_list_and_non_callable_slots_are_unsupported() {
        let strategy =
            PositionalDispatchStrategy::new(Value::List(vec![Value::Null, Value::flag(true)]))
                .unwrap();
        assert!(strategy.handler(Operation::Assign).is_none());
        assert!(strategy.handler(Operation::Get).is_none());
        assert!(strategy.handler(Operation::OnDetach).is_none());

        let mut ev = EvalContext::new();
        let active = Cell::new(true);
        let mut cx = Dispatch::new(&mut ev, &active, FailurePolicy::RestoreAlways, "t", Uuid::nil());
        assert!(!strategy.remove(&mut cx, "x"));
        assert!(strategy.objects(&mut cx).is_empty());
        strategy.on_attach(&mut cx);
        assert_eq!(
            strategy.assign(&mut cx, "x", Value::Null),
            Err(DispatchError::Unsupported { op: Operation::Assign })
        );
        assert_eq!(ev.call_count(), 0);
    }

    #[test]
    fn test_only_exists_and_get_are_guarded() {
        let active = Rc::new(Cell::new(true));
        let seen = Rc::new(Cell::new(None));
        let watch = || {
            let active = active.clone();
            let seen = seen.clone();
            Closure::new("watch", move |_, _| {
                seen.set(Some(active.get()));
                Ok(Value::flag(true))
            })
        };
        let strategy = PositionalDispatchStrategy::new(slots(&[
            (Operation::Exists, watch()),
            (Operation::Remove, watch()),
        ]))
        .unwrap();

        let mut ev = EvalContext::new();
        let mut cx = Dispatch::new(&mut ev, &active, FailurePolicy::RestoreAlways, "t", Uuid::nil());
        assert!(strategy.exists(&mut cx, "x"));
        assert_eq!(seen.get(), Some(false));
        assert!(strategy.remove(&mut cx, "x"));
        assert_eq!(seen.get(), Some(true));
        assert!(active.get());
    }

    #[test]
    fn test_failing_get_is_absent() {
        let strategy = PositionalDispatchStrategy::new(slots(&[(
            Operation::Get,
            Closure::new("get", |_, _| Err(EvalError::Raised("boom".to_string()))),
        )]))
        .unwrap();
        let mut ev = EvalContext::new();
        let active = Cell::new(true);
        let mut cx = Dispatch::new(&mut ev, &active, FailurePolicy::RestoreAlways, "t", Uuid::nil());
        assert_eq!(strategy.get(&mut cx, "x"), None);
        assert!(active.get());
    }
}
