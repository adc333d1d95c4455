//! The operations a virtual table answers, and their canonical handler names.

use std::collections::HashMap;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Handler names used by named dispatch, indexed by operation ordinal.
pub const HANDLER_NAMES: [&str; 8] = [
    "dbwrite",
    "dbread",
    "dbexists",
    "dbremove",
    "dbobjects",
    "dbcanCache",
    "dbattach",
    "dbdetach",
];

/// Number of operations that can carry a handler (everything but `Unknown`).
pub const HANDLER_SLOTS: usize = HANDLER_NAMES.len();

lazy_static! {
    static ref OPERATION_BY_NAME: HashMap<&'static str, Operation> = Operation::ALL
        .iter()
        .map(|op| (op.handler_name().unwrap_or_default(), *op))
        .collect();
}

/// An operation a host can ask of a virtual table.
///
/// The discriminants are a stable contract: positional handler lists are
/// indexed by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Assign = 0,
    Get = 1,
    Exists = 2,
    Remove = 3,
    ListObjects = 4,
    CanCache = 5,
    OnAttach = 6,
    OnDetach = 7,
    Unknown = 8,
}

impl Operation {
    /// Every operation that has a handler slot, in ordinal order.
    pub const ALL: [Operation; HANDLER_SLOTS] = [
        Operation::Assign,
        Operation::Get,
        Operation::Exists,
        Operation::Remove,
        Operation::ListObjects,
        Operation::CanCache,
        Operation::OnAttach,
        Operation::OnDetach,
    ];

    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Out-of-range ordinals map to `Unknown`.
    pub fn from_ordinal(ordinal: usize) -> Operation {
        Operation::ALL
            .get(ordinal)
            .copied()
            .unwrap_or(Operation::Unknown)
    }

    pub fn handler_name(self) -> Option<&'static str> {
        HANDLER_NAMES.get(self.ordinal()).copied()
    }

    pub fn from_handler_name(name: &str) -> Operation {
        OPERATION_BY_NAME
            .get(name)
            .copied()
            .unwrap_or(Operation::Unknown)
    }

    /// Whether the operation is addressed to a single name.
    pub fn takes_name(self) -> bool {
        matches!(
            self,
            Operation::Assign
                | Operation::Get
                | Operation::Exists
                | Operation::Remove
                | Operation::CanCache
        )
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.handler_name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "unknown"),
        }
    }
}
