//! Reentrancy guard around a single handler invocation.
//!
//! While a guarded handler runs, the owning table reports itself inactive so
//! that lookups the handler triggers in the same scope answer "absent"
//! instead of recursing back into the handler.

use std::cell::Cell;

use serde::Deserialize;

/// What happens to the `active` flag when a guarded handler fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Put back whatever state was captured before the call.
    RestoreAlways,
    /// Force the table active after a failed call, whatever it was before.
    ///
    /// This applies to nested calls too. A guarded call that fails while an
    /// outer handler of the same table is still running reactivates the
    /// table, so the outer handler's own lookups dispatch again from then on.
    LatchActiveOnFailure,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::RestoreAlways
    }
}

impl FailurePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "restore-always" | "restore" => Some(FailurePolicy::RestoreAlways),
            "latch-active-on-failure" | "latch" => Some(FailurePolicy::LatchActiveOnFailure),
            _ => None,
        }
    }
}

/// Suspends a table's `active` flag for the lifetime of the guard.
///
/// The captured state is put back on drop, so unwinding out of a handler
/// restores it too.
#[must_use]
pub struct DispatchGuard<'a> {
    active: &'a Cell<bool>,
    prior: bool,
    policy: FailurePolicy,
    failed: bool,
}

impl<'a> DispatchGuard<'a> {
    pub fn suspend(active: &'a Cell<bool>, policy: FailurePolicy) -> Self {
        let prior = active.replace(false);
        DispatchGuard {
            active,
            prior,
            policy,
            failed: false,
        }
    }

    /// Run exactly one invocation under the guard.
    pub fn run<T, E, F>(mut self, invocation: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let result = invocation();
        self.failed = result.is_err();
        result
    }

    pub fn prior(&self) -> bool {
        self.prior
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        let restored = match (self.failed, self.policy) {
            (true, FailurePolicy::LatchActiveOnFailure) => true,
            _ => self.prior,
        };
        self.active.set(restored);
    }
}
