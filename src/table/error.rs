use thiserror::Error;

use crate::host::error::EvalError;
use crate::table::operation::Operation;

/// Outcome of a raw handler dispatch that did not produce a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("no handler bound for {op}")]
    Unsupported { op: Operation },
    #[error("handler for {op} failed: {source}")]
    Handler {
        op: Operation,
        #[source]
        source: EvalError,
    },
    #[error("table released before {op}")]
    Released { op: Operation },
    #[error("{op} refused while the table's own handler is running")]
    Inactive { op: Operation },
}

impl DispatchError {
    pub fn op(&self) -> Operation {
        match self {
            DispatchError::Unsupported { op }
            | DispatchError::Handler { op, .. }
            | DispatchError::Released { op }
            | DispatchError::Inactive { op } => *op,
        }
    }
}

/// Errors a table surfaces to its caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("can't {op} in this type of database ({table})")]
    UnsupportedOperation { op: Operation, table: String },
    #[error("invalid handler collection: {0}")]
    InvalidHandlers(String),
    #[error("table {table} has been released")]
    Released { table: String },
    #[error("no table {table} on the search path")]
    NotAttached { table: String },
    #[error("table config error: {0}")]
    Config(String),
}
