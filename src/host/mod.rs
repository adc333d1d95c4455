//! The host-side collaborators a virtual table talks to.
//!
//! Tables do not own a language runtime. Everything they need from one is
//! gathered here:
//!
//! - **[`Value`]**: the values handlers receive and return, including the
//!   `Unbound` and `Missing` sentinels used to say "not found"
//! - **[`Evaluator`]**: evaluates a constructed [`Call`], reporting failure
//!   as `Err` and never as a `NULL` result
//! - **[`EvalContext`]**: a small evaluator with a registry of named
//!   functions, enough to host named-dispatch handlers
//! - **[`SearchPath`]**: the scope chain tables are attached to

pub mod error;
pub mod evaluator;
pub mod search_path;
pub mod value;

pub use error::EvalError;
pub use evaluator::{Call, Callee, EvalContext, Evaluator};
pub use search_path::SearchPath;
pub use value::{Closure, Environment, Marker, Value};
