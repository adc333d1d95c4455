//! The virtual table facade.
//!
//! One [`VirtualTable`] backs one mounted scope. The host asks it whether a
//! name exists, for a name's value, to assign or remove a name, or for the
//! names it serves; the table forwards each request to its strategy and
//! turns whatever comes back into an answer the host can act on.
//!
//! Reads never fail: a missing handler, a handler failure, or a reentrant
//! lookup all come back as `false`, `None` or an empty listing. Writes are
//! the exception. Assigning into a table without an assign handler is an
//! error rather than a silent no-op.
//!
//! ## Reentrancy
//!
//! Handlers run with the table marked inactive. A handler that looks up a
//! name in its own scope therefore sees "absent" instead of recursing:
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::{Rc, Weak};
//! use scopedb::host::{Closure, EvalContext, Value};
//! use scopedb::table::{new_positional_dispatch_table, Operation, VirtualTable};
//!
//! let me: Rc<RefCell<Weak<VirtualTable>>> = Rc::new(RefCell::new(Weak::new()));
//! let inner = me.clone();
//! let get = Closure::new("get", move |ev, _args| {
//!     let table = inner.borrow().upgrade().expect("table alive");
//!     Ok(Value::flag(table.exists(ev, "other")))
//! });
//! let mut slots = vec![Value::Null; 8];
//! slots[Operation::Get.ordinal()] = get.into();
//!
//! let table = new_positional_dispatch_table(Value::List(slots)).unwrap();
//! *me.borrow_mut() = table.downgrade();
//!
//! let mut ev = EvalContext::new();
//! assert_eq!(table.get(&mut ev, "x"), Some(Value::flag(false)));
//! assert!(table.is_active());
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use uuid::Uuid;

use crate::host::error::EvalError;
use crate::host::evaluator::{Callee, Evaluator};
use crate::host::value::Value;
use crate::table::config::TableConfig;
use crate::table::error::{DispatchError, TableError};
use crate::table::guard::FailurePolicy;
use crate::table::named::NamedDispatchStrategy;
use crate::table::operation::Operation;
use crate::table::positional::PositionalDispatchStrategy;
use crate::table::strategy::{Dispatch, DispatchStrategy, StrategyKind};

pub struct VirtualTable {
    id: Uuid,
    name: String,
    active: Cell<bool>,
    cached_names: RefCell<Option<Vec<String>>>,
    cache_names: bool,
    policy: FailurePolicy,
    strategy: Box<dyn DispatchStrategy>,
}

impl VirtualTable {
    pub fn new(strategy: Box<dyn DispatchStrategy>, config: &TableConfig) -> Self {
        let table = VirtualTable {
            id: Uuid::new_v4(),
            name: config.name.clone(),
            active: Cell::new(true),
            cached_names: RefCell::new(None),
            cache_names: config.cache_names,
            policy: config.failure_policy,
            strategy,
        };
        tracing::debug!(
            table = table.name.as_str(),
            id = %table.id,
            kind = ?table.strategy.kind(),
            policy = ?table.policy,
            "table created"
        );
        table
    }

    fn dispatch<'a>(&'a self, ev: &'a mut dyn Evaluator) -> Dispatch<'a> {
        Dispatch::new(ev, &self.active, self.policy, &self.name, self.id)
    }

    fn suspended(&self, op: Operation, name: &str) -> bool {
        let suspended = !self.active.get();
        if suspended {
            tracing::debug!(table = self.name.as_str(), id = %self.id, %op, name, "reentrant lookup answered absent");
        }
        suspended
    }

    pub fn exists(&self, ev: &mut dyn Evaluator, name: &str) -> bool {
        if self.suspended(Operation::Exists, name) {
            return false;
        }
        self.strategy.exists(&mut self.dispatch(ev), name)
    }

    pub fn get(&self, ev: &mut dyn Evaluator, name: &str) -> Option<Value> {
        if self.suspended(Operation::Get, name) {
            return None;
        }
        self.strategy.get(&mut self.dispatch(ev), name)
    }

    /// Assign through the table's write handler.
    ///
    /// A handler failure is logged and reported as `NULL`. A missing handler
    /// is an error, including a named `dbwrite` the evaluator does not define,
    /// as is a released table.
    pub fn assign(
        &self,
        ev: &mut dyn Evaluator,
        name: &str,
        value: Value,
    ) -> Result<Value, TableError> {
        let mut cx = self.dispatch(ev);
        let outcome = self.strategy.assign(&mut cx, name, value);
        match outcome {
            Ok(value) => {
                self.invalidate_names();
                Ok(value)
            }
            Err(DispatchError::Unsupported { op }) => Err(TableError::UnsupportedOperation {
                op,
                table: self.name.clone(),
            }),
            Err(DispatchError::Handler {
                op,
                source: EvalError::UndefinedFunction(fun),
            }) if op.handler_name() == Some(fun.as_str()) => {
                Err(TableError::UnsupportedOperation {
                    op,
                    table: self.name.clone(),
                })
            }
            Err(DispatchError::Released { .. }) => Err(TableError::Released {
                table: self.name.clone(),
            }),
            Err(err) => {
                cx.report(&err);
                self.invalidate_names();
                Ok(Value::Null)
            }
        }
    }

    pub fn remove(&self, ev: &mut dyn Evaluator, name: &str) -> bool {
        let removed = self.strategy.remove(&mut self.dispatch(ev), name);
        if removed {
            self.invalidate_names();
        }
        removed
    }

    /// Enumerate the names the table serves, refreshing the name cache when
    /// caching is on.
    pub fn objects(&self, ev: &mut dyn Evaluator) -> Vec<String> {
        let names = self.strategy.objects(&mut self.dispatch(ev));
        if self.cache_names && !self.strategy.is_released() {
            *self.cached_names.borrow_mut() = Some(names.clone());
        }
        names
    }

    /// Names from the last `objects()` call, if still valid. Advisory only.
    pub fn cached_names(&self) -> Option<Vec<String>> {
        self.cached_names.borrow().clone()
    }

    pub fn invalidate_names(&self) {
        self.cached_names.borrow_mut().take();
    }

    /// Whether the host may cache the value it resolved for `name`.
    /// Defaults to `false` when the table has no opinion.
    pub fn can_cache(&self, ev: &mut dyn Evaluator, name: &str) -> bool {
        self.strategy
            .can_cache(&mut self.dispatch(ev), name)
            .unwrap_or(false)
    }

    pub fn on_attach(&self, ev: &mut dyn Evaluator) {
        tracing::info!(table = self.name.as_str(), id = %self.id, "attach");
        self.strategy.on_attach(&mut self.dispatch(ev));
    }

    pub fn on_detach(&self, ev: &mut dyn Evaluator) {
        tracing::info!(table = self.name.as_str(), id = %self.id, "detach");
        self.strategy.on_detach(&mut self.dispatch(ev));
    }

    /// Invoke the raw handler for `op` and return its undecorated result.
    ///
    /// Exists and Get are refused with [`DispatchError::Inactive`] while one
    /// of this table's handlers is running.
    pub fn invoke(
        &self,
        ev: &mut dyn Evaluator,
        op: Operation,
        args: Vec<Value>,
    ) -> Result<Value, DispatchError> {
        if op == Operation::Unknown {
            return Err(DispatchError::Unsupported { op });
        }
        let name = args.get(0).and_then(Value::as_str).unwrap_or_default();
        if matches!(op, Operation::Exists | Operation::Get) && self.suspended(op, name) {
            return Err(DispatchError::Inactive { op });
        }
        self.strategy.invoke(&mut self.dispatch(ev), op, args)
    }

    /// Unpin the handler state. Only the first call has any effect.
    pub fn release(&self) -> bool {
        let released = self.strategy.release();
        if released {
            self.invalidate_names();
            tracing::info!(table = self.name.as_str(), id = %self.id, "released");
        } else {
            tracing::warn!(table = self.name.as_str(), id = %self.id, "release of an already released table");
        }
        released
    }

    pub fn is_released(&self) -> bool {
        self.strategy.is_released()
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// The callee `op` would dispatch to.
    pub fn handler(&self, op: Operation) -> Option<Callee> {
        self.strategy.handler(op)
    }

    pub fn supports(&self, op: Operation) -> bool {
        self.handler(op).is_some()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }
}

impl fmt::Debug for VirtualTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualTable")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("active", &self.active.get())
            .field("cached_names", &self.cached_names.borrow())
            .field("policy", &self.policy)
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// Shared handle to a mounted table.
#[derive(Clone, Debug)]
pub struct TableHandle(Rc<VirtualTable>);

impl TableHandle {
    pub fn new(table: VirtualTable) -> Self {
        TableHandle(Rc::new(table))
    }

    pub fn downgrade(&self) -> Weak<VirtualTable> {
        Rc::downgrade(&self.0)
    }

    pub fn ptr_eq(a: &TableHandle, b: &TableHandle) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl Deref for TableHandle {
    type Target = VirtualTable;

    fn deref(&self) -> &VirtualTable {
        &self.0
    }
}

/// Table whose operations call the well-known `db*` functions with
/// `context` as first argument.
pub fn new_named_dispatch_table(context: Value) -> TableHandle {
    new_named_dispatch_table_with_config(context, &TableConfig::default())
}

pub fn new_named_dispatch_table_with_config(context: Value, config: &TableConfig) -> TableHandle {
    TableHandle::new(VirtualTable::new(
        Box::new(NamedDispatchStrategy::new(context)),
        config,
    ))
}

/// Table whose operations call the closures at their ordinal in `handlers`.
pub fn new_positional_dispatch_table(handlers: Value) -> Result<TableHandle, TableError> {
    new_positional_dispatch_table_with_config(handlers, &TableConfig::default())
}

pub fn new_positional_dispatch_table_with_config(
    handlers: Value,
    config: &TableConfig,
) -> Result<TableHandle, TableError> {
    let strategy = PositionalDispatchStrategy::new(handlers)?;
    Ok(TableHandle::new(VirtualTable::new(Box::new(strategy), config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::error::EvalError;
    use crate::host::evaluator::EvalContext;
    use crate::host::value::{Closure, Environment};
    use crate::table::operation::HANDLER_SLOTS;

    fn failing_named(ev: &mut EvalContext) {
        for op in Operation::ALL.iter() {
            let name = op.handler_name().unwrap();
            ev.define(name, move |_, _| Err(EvalError::Raised(format!("{} failed", name))));
        }
    }

    #[test]
    fn test_named_failures_degrade_and_restore() {
        let mut ev = EvalContext::new();
        failing_named(&mut ev);
        let table = new_named_dispatch_table(Environment::new().into());
        assert!(!table.exists(&mut ev, "x"));
        assert_eq!(table.get(&mut ev, "x"), None);
        assert!(!table.remove(&mut ev, "x"));
        assert!(!table.can_cache(&mut ev, "x"));
        assert!(table.objects(&mut ev).is_empty());
        table.on_attach(&mut ev);
        table.on_detach(&mut ev);
        assert_eq!(table.assign(&mut ev, "x", Value::flag(true)), Ok(Value::Null));
        assert!(table.is_active());
    }

    #[test]
    fn test_latch_policy_reactivates_after_failure() {
        let mut ev = EvalContext::new();
        failing_named(&mut ev);
        let config = TableConfig::new().with_failure_policy(FailurePolicy::LatchActiveOnFailure);
        let table = new_named_dispatch_table_with_config(Value::Null, &config);
        assert_eq!(table.policy(), FailurePolicy::LatchActiveOnFailure);
        table.objects(&mut ev);
        assert!(table.is_active());
    }

    #[test]
    fn test_positional_assign_without_handler_is_an_error() {
        let mut ev = EvalContext::new();
        let table = new_positional_dispatch_table_with_config(
            Value::List(vec![Value::Null; HANDLER_SLOTS]),
            &TableConfig::new().with_name("ro"),
        )
        .unwrap();
        assert_eq!(
            table.assign(&mut ev, "x", Value::Null),
            Err(TableError::UnsupportedOperation {
                op: Operation::Assign,
                table: "ro".to_string()
            })
        );
        assert!(!table.supports(Operation::Assign));
    }

    #[test]
    fn test_cached_names_follow_objects_and_writes() {
        let env = Environment::new();
        let mut ev = EvalContext::new();
        ev.define("dbobjects", |_, args| match &args[0] {
            Value::Env(env) => Ok(Value::strings(env.names())),
            _ => Ok(Value::Null),
        });
        ev.define("dbwrite", |_, args| match (&args[0], args[1].as_str()) {
            (Value::Env(env), Some(name)) => {
                env.set(name, args[2].clone());
                Ok(args[2].clone())
            }
            _ => Err(EvalError::Raised("bad write".to_string())),
        });
        env.set("a", Value::Null);
        let table = new_named_dispatch_table(env.clone().into());
        assert_eq!(table.cached_names(), None);
        assert_eq!(table.objects(&mut ev), vec!["a".to_string()]);
        assert_eq!(table.cached_names(), Some(vec!["a".to_string()]));
        table.assign(&mut ev, "b", Value::flag(false)).unwrap();
        assert_eq!(table.cached_names(), None);
        assert_eq!(table.objects(&mut ev), vec!["a".to_string(), "b".to_string()]);

        let uncached = new_named_dispatch_table_with_config(
            env.into(),
            &TableConfig::new().with_cache_names(false),
        );
        uncached.objects(&mut ev);
        assert_eq!(uncached.cached_names(), None);
    }

    #[test]
    fn test_release_is_once_and_neutralises() {
        let mut ev = EvalContext::new();
        let hits = std::rc::Rc::new(Cell::new(0));
        let counter = hits.clone();
        let mut slots = vec![Value::Null; HANDLER_SLOTS];
        slots[Operation::Exists.ordinal()] = Closure::new("exists", move |_, _| {
            counter.set(counter.get() + 1);
            Ok(Value::flag(true))
        })
        .into();
        let table = new_positional_dispatch_table(Value::List(slots)).unwrap();
        assert!(table.exists(&mut ev, "x"));
        assert!(table.release());
        assert!(!table.release());
        assert!(table.is_released());
        assert!(!table.exists(&mut ev, "x"));
        assert_eq!(hits.get(), 1);
        assert_eq!(
            table.assign(&mut ev, "x", Value::Null),
            Err(TableError::Released { table: "UserDefinedDatabase".to_string() })
        );
    }

    #[test]
    fn test_invoke_unknown_is_unsupported() {
        let mut ev = EvalContext::new();
        let table = new_named_dispatch_table(Value::Null);
        assert_eq!(
            table.invoke(&mut ev, Operation::Unknown, Vec::new()),
            Err(DispatchError::Unsupported { op: Operation::Unknown })
        );
        assert_eq!(ev.call_count(), 0);
    }
}
