//! Search path — the host's scope chain with virtual tables mounted on it.
//!
//! A free name is looked up in the global frame first, then in each attached
//! table, newest attachment first:
//!
//! ```text
//! lookup("x")
//!      ↓
//! 1. global frame          → native storage
//! 2. value cache           → values a table allowed us to keep
//! 3. attached tables       → exists("x")? then get("x")
//!      ↓
//! 4. can_cache("x")?       → remember the value until the path changes
//! ```
//!
//! Attaching a table empties the value cache, since the newcomer sits in
//! front of every table a cached value came from.
//!
//! Attaching a table fires its `on_attach` notification; detaching fires
//! `on_detach` and then releases the table's handler state. Each happens
//! exactly once per table.
//!
//! ## Example
//!
//! ```
//! use scopedb::host::{Closure, EvalContext, SearchPath, Value};
//! use scopedb::table::{new_positional_dispatch_table, Operation};
//!
//! let mut slots = vec![Value::Null; 8];
//! slots[Operation::Exists.ordinal()] =
//!     Closure::new("exists", |_, args| Ok(Value::flag(args[0].as_str() == Some("pi")))).into();
//! slots[Operation::Get.ordinal()] =
//!     Closure::new("get", |_, _| Ok(Value::Numeric(vec![3.14159]))).into();
//! let table = new_positional_dispatch_table(Value::List(slots)).unwrap();
//!
//! let mut ev = EvalContext::new();
//! let mut path = SearchPath::new();
//! path.attach(&mut ev, table.clone());
//!
//! assert_eq!(path.lookup(&mut ev, "pi"), Some(Value::Numeric(vec![3.14159])));
//! assert_eq!(path.lookup(&mut ev, "e"), None);
//!
//! path.detach(&mut ev, table.id());
//! assert!(table.is_released());
//! ```

use std::collections::HashMap;

use uuid::Uuid;

use crate::host::evaluator::Evaluator;
use crate::host::value::{Environment, Value};
use crate::table::error::TableError;
use crate::table::virtual_table::TableHandle;

struct CachedBinding {
    owner: Uuid,
    value: Value,
}

/// The global frame plus the tables attached behind it.
pub struct SearchPath {
    global: Environment,
    /// Attached tables, searched front to back.
    tables: Vec<TableHandle>,
    /// Values tables allowed us to keep, by name.
    cache: HashMap<String, CachedBinding>,
}

impl SearchPath {
    pub fn new() -> Self {
        Self::with_global(Environment::new())
    }

    pub fn with_global(global: Environment) -> Self {
        SearchPath {
            global,
            tables: Vec::new(),
            cache: HashMap::new(),
        }
    }

    pub fn global(&self) -> &Environment {
        &self.global
    }

    /// Mount `table` in front of the tables already attached and drop every
    /// cached value.
    ///
    /// Returns `false` (and does nothing) if the table is already on the
    /// path or has been released.
    pub fn attach(&mut self, ev: &mut dyn Evaluator, table: TableHandle) -> bool {
        if self.position(table.id()).is_some() || table.is_released() {
            tracing::warn!(table = table.name(), id = %table.id(), "refusing to attach table");
            return false;
        }
        table.on_attach(ev);
        self.cache.clear();
        self.tables.insert(0, table);
        true
    }

    /// Unmount the table with `id`, notify it, and release it.
    pub fn detach(&mut self, ev: &mut dyn Evaluator, id: Uuid) -> Option<TableHandle> {
        let pos = self.position(id)?;
        let table = self.tables.remove(pos);
        self.forget(id);
        table.on_detach(ev);
        table.release();
        Some(table)
    }

    /// Detach every table, newest first.
    pub fn detach_all(&mut self, ev: &mut dyn Evaluator) {
        while let Some(id) = self.tables.first().map(|t| t.id()) {
            self.detach(ev, id);
        }
    }

    pub fn tables(&self) -> &[TableHandle] {
        &self.tables
    }

    pub fn find(&self, id: Uuid) -> Option<&TableHandle> {
        self.tables.iter().find(|t| t.id() == id)
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.tables.iter().position(|t| t.id() == id)
    }

    fn forget(&mut self, owner: Uuid) {
        self.cache.retain(|_, cached| cached.owner != owner);
    }

    /// Resolve a free name.
    pub fn lookup(&mut self, ev: &mut dyn Evaluator, name: &str) -> Option<Value> {
        if let Some(value) = self.global.get(name) {
            return Some(value);
        }
        if let Some(cached) = self.cache.get(name) {
            return Some(cached.value.clone());
        }
        for table in &self.tables {
            if !table.exists(ev, name) {
                continue;
            }
            if let Some(value) = table.get(ev, name) {
                if table.can_cache(ev, name) {
                    self.cache.insert(
                        name.to_string(),
                        CachedBinding {
                            owner: table.id(),
                            value: value.clone(),
                        },
                    );
                }
                return Some(value);
            }
        }
        None
    }

    pub fn exists(&mut self, ev: &mut dyn Evaluator, name: &str) -> bool {
        self.global.contains(name)
            || self.cache.contains_key(name)
            || self.tables.iter().any(|t| t.exists(ev, name))
    }

    /// Bind `name` in the global frame.
    pub fn assign(&mut self, name: &str, value: Value) {
        self.global.set(name, value);
    }

    /// Assign `name` inside the attached table `id`.
    pub fn assign_in(
        &mut self,
        ev: &mut dyn Evaluator,
        id: Uuid,
        name: &str,
        value: Value,
    ) -> Result<Value, TableError> {
        let table = self.find(id).cloned().ok_or_else(|| TableError::NotAttached {
            table: id.to_string(),
        })?;
        self.cache.remove(name);
        table.assign(ev, name, value)
    }

    /// Remove `name` from the attached table `id`.
    pub fn remove_from(&mut self, ev: &mut dyn Evaluator, id: Uuid, name: &str) -> bool {
        let table = match self.find(id).cloned() {
            Some(table) => table,
            None => return false,
        };
        self.cache.remove(name);
        table.remove(ev, name)
    }

    /// Every visible name: the global frame's, then each table's listing.
    /// Tables are asked through their name cache when it is populated.
    pub fn names(&self, ev: &mut dyn Evaluator) -> Vec<String> {
        let mut names = self.global.names();
        for table in &self.tables {
            let listed = match table.cached_names() {
                Some(cached) => cached,
                None => table.objects(ev),
            };
            names.extend(listed);
        }
        names
    }

    pub fn cached_value(&self, name: &str) -> Option<&Value> {
        self.cache.get(name).map(|c| &c.value)
    }
}

impl Default for SearchPath {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SearchPath {
    fn drop(&mut self) {
        for table in self.tables.drain(..) {
            tracing::warn!(table = table.name(), id = %table.id(), "releasing table still attached at shutdown");
            table.release();
        }
    }
}
