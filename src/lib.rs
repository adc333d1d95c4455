//! # scopedb - user-defined databases for name resolution
//!
//! A virtual table lets a host language runtime hand name resolution for one
//! scope to outside code. Existence checks, lookups, assignments, removals,
//! listings, caching hints and attach/detach notifications all become handler
//! calls made through the host's own evaluator.
//!
//! Two ways of binding handlers are supported:
//!
//! - **Named dispatch**: the table calls well-known functions (`dbread`,
//!   `dbexists`, `dbwrite`, ...) and passes one shared context object as the
//!   first argument of every call.
//! - **Positional dispatch**: the table holds a list of closures and calls the
//!   one at the operation's ordinal, with no context argument.
//!
//! ## Quick Start
//!
//! ```
//! use scopedb::host::{Closure, EvalContext, Value};
//! use scopedb::table::{new_positional_dispatch_table, Operation};
//!
//! let names = ["alpha", "beta"];
//! let mut slots = vec![Value::Null; 8];
//! slots[Operation::Exists.ordinal()] = Closure::new("exists", move |_, args| {
//!     Ok(Value::flag(names.iter().any(|n| args[0].as_str() == Some(*n))))
//! })
//! .into();
//! slots[Operation::ListObjects.ordinal()] =
//!     Closure::new("objects", move |_, _| Ok(Value::strings(names.iter().copied()))).into();
//!
//! let table = new_positional_dispatch_table(Value::List(slots)).unwrap();
//! let mut ev = EvalContext::new();
//!
//! assert!(table.exists(&mut ev, "alpha"));
//! assert!(!table.exists(&mut ev, "gamma"));
//! assert_eq!(table.objects(&mut ev), vec!["alpha", "beta"]);
//! ```
//!
//! ## Failure Model
//!
//! Reads never fail. A missing handler, a handler that raises, and a lookup
//! made from inside a running handler of the same table all answer `false`,
//! `None` or an empty listing. Assigning into a table that has no write
//! handler is the one error the host sees.
//!
//! ## Architecture
//!
//! - **[`host`]** - Values, the evaluator seam, and the search path
//! - **[`table`]** - Operations, dispatch strategies, the reentrancy guard,
//!   and the [`table::VirtualTable`] facade

#[macro_use]
extern crate lazy_static;

pub mod host;
pub mod table;
