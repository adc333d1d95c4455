//! Handler binding strategies.
//!
//! A table owns exactly one [`DispatchStrategy`]. The strategy decides how an
//! [`Operation`] maps to something callable, which arguments that callable
//! receives, which invocations run under the [`DispatchGuard`], and how
//! handler results and failures collapse into the neutral answers a table
//! hands back to the host.

use std::cell::{Cell, RefCell};
use std::fmt;

use uuid::Uuid;

use crate::host::evaluator::{Call, Callee, Evaluator};
use crate::host::value::Value;
use crate::table::error::DispatchError;
use crate::table::guard::{DispatchGuard, FailurePolicy};
use crate::table::operation::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Named,
    Positional,
}

/// Everything a strategy needs to run one table operation: the host
/// evaluator, the owning table's `active` flag and its failure policy.
pub struct Dispatch<'a> {
    evaluator: &'a mut dyn Evaluator,
    active: &'a Cell<bool>,
    policy: FailurePolicy,
    table: &'a str,
    id: Uuid,
}

impl<'a> Dispatch<'a> {
    pub(crate) fn new(
        evaluator: &'a mut dyn Evaluator,
        active: &'a Cell<bool>,
        policy: FailurePolicy,
        table: &'a str,
        id: Uuid,
    ) -> Self {
        Dispatch {
            evaluator,
            active,
            policy,
            table,
            id,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Evaluate `call` with the table suspended.
    pub fn guarded(&mut self, op: Operation, call: &Call) -> Result<Value, DispatchError> {
        tracing::debug!(table = self.table, id = %self.id, %op, call = %call.describe(), "guarded dispatch");
        let evaluator = &mut *self.evaluator;
        DispatchGuard::suspend(self.active, self.policy)
            .run(|| evaluator.eval(call))
            .map_err(|source| DispatchError::Handler { op, source })
    }

    /// Evaluate `call` leaving the table's `active` flag alone.
    pub fn unguarded(&mut self, op: Operation, call: &Call) -> Result<Value, DispatchError> {
        tracing::debug!(table = self.table, id = %self.id, %op, call = %call.describe(), "dispatch");
        self.evaluator
            .eval(call)
            .map_err(|source| DispatchError::Handler { op, source })
    }

    /// Collapse a dispatch outcome to a truth value, logging anything that
    /// is not a well-formed answer.
    pub fn flag(&self, outcome: Result<Value, DispatchError>) -> Option<bool> {
        match outcome {
            Ok(value) => {
                let flag = value.as_flag();
                if flag.is_none() {
                    tracing::warn!(
                        table = self.table,
                        id = %self.id,
                        got = value.type_name(),
                        "handler returned no truth value"
                    );
                }
                flag
            }
            Err(err) => {
                self.report(&err);
                None
            }
        }
    }

    /// Collapse a ListObjects outcome to names.
    pub fn names(&self, outcome: Result<Value, DispatchError>) -> Vec<String> {
        match outcome {
            Ok(value) => value.as_names().unwrap_or_else(|| {
                tracing::warn!(
                    table = self.table,
                    id = %self.id,
                    got = value.type_name(),
                    "object listing is not a character vector"
                );
                Vec::new()
            }),
            Err(err) => {
                self.report(&err);
                Vec::new()
            }
        }
    }

    pub fn report(&self, err: &DispatchError) {
        match err {
            DispatchError::Unsupported { op } => {
                tracing::debug!(table = self.table, id = %self.id, %op, "operation unsupported")
            }
            DispatchError::Inactive { op } => {
                tracing::debug!(table = self.table, id = %self.id, %op, "reentrant dispatch refused")
            }
            _ => tracing::warn!(table = self.table, id = %self.id, op = %err.op(), error = %err, "handler failed"),
        }
    }
}

/// Handler state pinned for a table's lifetime and dropped exactly once.
pub struct Pinned<T> {
    slot: RefCell<Option<T>>,
}

impl<T> Pinned<T> {
    pub fn new(value: T) -> Self {
        Pinned {
            slot: RefCell::new(Some(value)),
        }
    }

    /// Borrow the pinned state briefly. Never hold the borrow across a
    /// handler call.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.slot.borrow().as_ref().map(f)
    }

    /// Returns `false` when already released.
    pub fn release(&self) -> bool {
        self.slot.borrow_mut().take().is_some()
    }

    pub fn is_released(&self) -> bool {
        self.slot.borrow().is_none()
    }
}

impl<T: Clone> Pinned<T> {
    pub fn get(&self) -> Option<T> {
        self.with(T::clone)
    }
}

/// A way of binding the table operations to handlers.
pub trait DispatchStrategy: fmt::Debug {
    fn kind(&self) -> StrategyKind;

    /// Resolve `op` to the callee that would be invoked, or `None` if the
    /// operation is unsupported.
    fn handler(&self, op: Operation) -> Option<Callee>;

    /// Whether invocations of `op` run under the reentrancy guard.
    fn guards(&self, op: Operation) -> bool;

    /// Invoke the handler for `op` with explicit arguments. Strategy-specific
    /// implicit arguments (the shared context) are added here.
    fn invoke(
        &self,
        cx: &mut Dispatch<'_>,
        op: Operation,
        args: Vec<Value>,
    ) -> Result<Value, DispatchError>;

    fn exists(&self, cx: &mut Dispatch<'_>, name: &str) -> bool;

    /// `None` when the handler reports "not found" or fails.
    fn get(&self, cx: &mut Dispatch<'_>, name: &str) -> Option<Value>;

    fn assign(
        &self,
        cx: &mut Dispatch<'_>,
        name: &str,
        value: Value,
    ) -> Result<Value, DispatchError>;

    fn remove(&self, cx: &mut Dispatch<'_>, name: &str) -> bool;

    fn objects(&self, cx: &mut Dispatch<'_>) -> Vec<String>;

    /// `None` when there is no caching opinion.
    fn can_cache(&self, cx: &mut Dispatch<'_>, name: &str) -> Option<bool>;

    fn on_attach(&self, cx: &mut Dispatch<'_>);

    fn on_detach(&self, cx: &mut Dispatch<'_>);

    /// Unpin handler state. Returns `false` if it was already released.
    fn release(&self) -> bool;

    fn is_released(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinned_releases_once() {
        let pinned = Pinned::new(vec![1, 2, 3]);
        assert_eq!(pinned.get(), Some(vec![1, 2, 3]));
        assert_eq!(pinned.with(Vec::len), Some(3));
        assert!(pinned.release());
        assert!(!pinned.release());
        assert!(pinned.is_released());
        assert_eq!(pinned.get(), None);
    }
}
