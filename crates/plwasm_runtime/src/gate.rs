//! Capability gate for dangerous functions.

/// Policy consulted before a script calls a function flagged dangerous.
///
/// Any `Fn(&str) -> bool` closure is a gate, so embeddings can plug in
/// their own policy:
///
/// ```rust
/// use plwasm_runtime::DangerousFunctionGate;
///
/// let only_exists = |name: &str| name == "std::file::exists";
/// assert!(only_exists.allow("std::file::exists"));
/// assert!(!only_exists.allow("std::file::read"));
/// ```
pub trait DangerousFunctionGate {
    /// Returns `true` to let the call proceed.
    fn allow(&self, function: &str) -> bool;
}

impl<F> DangerousFunctionGate for F
where
    F: Fn(&str) -> bool,
{
    fn allow(&self, function: &str) -> bool {
        self(function)
    }
}

/// Denies every dangerous call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl DangerousFunctionGate for DenyAll {
    fn allow(&self, _function: &str) -> bool {
        false
    }
}

/// Permits every dangerous call.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl DangerousFunctionGate for AllowAll {
    fn allow(&self, _function: &str) -> bool {
        true
    }
}
