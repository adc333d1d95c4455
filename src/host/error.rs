use thiserror::Error;

/// Failure reported by the host evaluator while running a call.
///
/// This is distinct from a call that succeeds with `Value::Null`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("could not find function \"{0}\"")]
    UndefinedFunction(String),
    #[error("attempt to apply non-function ({0})")]
    NotCallable(String),
    #[error("{0}")]
    Raised(String),
    #[error("{function}: expected {expected} arguments, got {found}")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },
}
