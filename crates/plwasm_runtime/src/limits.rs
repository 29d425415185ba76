//! Evaluation limits.

use serde::{Deserialize, Serialize};

/// Bounds that keep a hostile or buggy script from exhausting the host.
///
/// Each limit can be raised or lowered per script with the matching
/// `#pragma`, up to [`RuntimeLimits::CEILING`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeLimits {
    /// Maximum nesting of function calls and struct placements.
    pub eval_depth: u64,
    /// Maximum number of entries in one array.
    pub array_limit: u64,
    /// Maximum number of patterns created by one execution.
    pub pattern_limit: u64,
    /// Maximum number of iterations of one `while` loop.
    pub loop_limit: u64,
}

impl Default for RuntimeLimits {
    fn default() -> Self {
        Self {
            eval_depth: 32,
            array_limit: 0x10000,
            pattern_limit: 0x20000,
            loop_limit: 0x10000,
        }
    }
}

impl RuntimeLimits {
    /// Highest values a script may raise each limit to with a `#pragma`.
    pub const CEILING: Self = Self {
        eval_depth: 64,
        array_limit: 0x100_0000,
        pattern_limit: 0x10_0000,
        loop_limit: 0x100_0000,
    };
}
