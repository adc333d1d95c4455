//! Virtual tables: scopes whose names are served by handlers.
//!
//! A virtual table intercepts name resolution for one scope. Instead of
//! looking into native variable storage, the host asks the table, and the
//! table calls externally supplied handlers through the host evaluator.
//!
//! ### Key Components
//!
//! - **[`Operation`]**: the eight handler-bearing operations plus `Unknown`,
//!   with stable ordinals and canonical handler names
//! - **[`DispatchStrategy`]**: how operations are bound to handlers
//! - **[`NamedDispatchStrategy`]**: calls `dbread`, `dbexists`, ... by name,
//!   passing a shared context object first
//! - **[`PositionalDispatchStrategy`]**: calls the closure stored at the
//!   operation's ordinal in a handler list
//! - **[`DispatchGuard`]**: marks the table inactive while a handler runs
//! - **[`VirtualTable`]**: the facade the host talks to
//!
//! ### Operation names
//!
//! | ordinal | operation     | named handler |
//! |---------|---------------|---------------|
//! | 0       | `Assign`      | `dbwrite`     |
//! | 1       | `Get`         | `dbread`      |
//! | 2       | `Exists`      | `dbexists`    |
//! | 3       | `Remove`      | `dbremove`    |
//! | 4       | `ListObjects` | `dbobjects`   |
//! | 5       | `CanCache`    | `dbcanCache`  |
//! | 6       | `OnAttach`    | `dbattach`    |
//! | 7       | `OnDetach`    | `dbdetach`    |
//!
//! ## Example: named dispatch
//!
//! ```
//! use scopedb::host::{EvalContext, Environment, Value};
//! use scopedb::table::new_named_dispatch_table;
//!
//! let mut ev = EvalContext::new();
//! ev.define("dbexists", |_, args| match (&args[0], args[1].as_str()) {
//!     (Value::Env(env), Some(name)) => Ok(Value::flag(env.contains(name))),
//!     _ => Ok(Value::flag(false)),
//! });
//! ev.define("dbread", |_, args| match (&args[0], args[1].as_str()) {
//!     (Value::Env(env), Some(name)) => Ok(env.get(name).unwrap_or_else(|| args[2].clone())),
//!     _ => Ok(args[2].clone()),
//! });
//!
//! let env = Environment::new();
//! env.set("answer", Value::Integer(vec![42]));
//! let table = new_named_dispatch_table(env.into());
//!
//! assert!(table.exists(&mut ev, "answer"));
//! assert_eq!(table.get(&mut ev, "answer"), Some(Value::Integer(vec![42])));
//! assert_eq!(table.get(&mut ev, "question"), None);
//! ```

pub mod config;
pub mod error;
pub mod guard;
pub mod named;
pub mod operation;
pub mod positional;
pub mod strategy;
pub mod virtual_table;

pub use config::TableConfig;
pub use error::{DispatchError, TableError};
pub use guard::{DispatchGuard, FailurePolicy};
pub use named::NamedDispatchStrategy;
pub use operation::{Operation, HANDLER_NAMES, HANDLER_SLOTS};
pub use positional::PositionalDispatchStrategy;
pub use strategy::{Dispatch, DispatchStrategy, StrategyKind};
pub use virtual_table::{
    new_named_dispatch_table, new_named_dispatch_table_with_config,
    new_positional_dispatch_table, new_positional_dispatch_table_with_config, TableHandle,
    VirtualTable,
};
