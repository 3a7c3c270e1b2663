//! Opt-in structural self checks.
//!
//! The hierarchy validates itself after a refinement cycle when either
//! [`MultiGridOptions::check_invariants`](crate::topology::multigrid::MultiGridOptions)
//! is set or one of the `strict-invariants` / `check-invariants` features is on.
//! In that case a broken cycle returns an error. Otherwise debug builds still
//! assert the invariants and panic on the first violation.

use crate::mesh_error::MeshError;

/// Structures that can verify their own invariants.
pub trait DebugInvariants {
    /// Panic on the first violation when invariant checking is compiled in.
    fn debug_assert_invariants(&self);
    /// Validate invariants and return the first error encountered.
    fn validate_invariants(&self) -> Result<(), MeshError>;
}

/// Whether post-cycle validation runs, given the runtime option.
pub(crate) fn invariant_checks_enabled(requested: bool) -> bool {
    requested || cfg!(any(feature = "strict-invariants", feature = "check-invariants"))
}

/// Evaluate a `Result`-returning check and panic with context on `Err`.
///
/// Compiled out unless `debug_assertions` or an invariant feature is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_request_enables_checks() {
        assert!(invariant_checks_enabled(true));
    }
}
