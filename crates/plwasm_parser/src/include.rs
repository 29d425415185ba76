//! Include resolution.

/// Maximum nesting depth of `#include` directives.
pub const MAX_INCLUDE_DEPTH: usize = 32;

/// A file located by an [`IncludeResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInclude {
    /// Canonical path, used for `#pragma once` bookkeeping and error messages.
    pub path: String,
    pub source: String,
}

/// Looks up the text of `#include`d files.
///
/// # Example
///
/// ```rust
/// use plwasm_parser::{IncludeResolver, ResolvedInclude};
///
/// struct Single;
///
/// impl IncludeResolver for Single {
///     fn resolve(&self, name: &str) -> Option<ResolvedInclude> {
///         (name == "types.pat").then(|| ResolvedInclude {
///             path: "/sources/includes/types.pat".into(),
///             source: "using Byte = u8;".into(),
///         })
///     }
/// }
/// ```
pub trait IncludeResolver {
    /// Resolves `name` as written between the directive's delimiters.
    fn resolve(&self, name: &str) -> Option<ResolvedInclude>;
}

impl<F> IncludeResolver for F
where
    F: Fn(&str) -> Option<ResolvedInclude>,
{
    fn resolve(&self, name: &str) -> Option<ResolvedInclude> {
        self(name)
    }
}
