//! In-memory file store backing `#include` and the `std::file` functions.

use std::collections::BTreeMap;

use plwasm_parser::{IncludeResolver, ResolvedInclude};

/// Absolute virtual paths mapped to file contents.
#[derive(Debug, Clone, Default)]
pub struct VirtualFileSystem {
    files: BTreeMap<String, String>,
}

impl VirtualFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `contents` at `path`, replacing any previous file.
    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        self.files.insert(normalize(&path.into()), contents.into());
    }

    pub fn read(&self, path: &str) -> Option<&str> {
        self.files.get(&normalize(path)).map(String::as_str)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.files.contains_key(&normalize(path))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Returns a resolver searching `include_paths` in order, then `name` itself.
    pub fn resolver<'a>(&'a self, include_paths: &'a [String]) -> IncludeLookup<'a> {
        IncludeLookup {
            vfs: self,
            include_paths,
        }
    }
}

/// Collapses `.`, `..` and repeated separators; the result always starts with `/`.
fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

pub struct IncludeLookup<'a> {
    vfs: &'a VirtualFileSystem,
    include_paths: &'a [String],
}

impl IncludeResolver for IncludeLookup<'_> {
    fn resolve(&self, name: &str) -> Option<ResolvedInclude> {
        self.include_paths
            .iter()
            .map(|dir| normalize(&format!("{dir}/{name}")))
            .chain(std::iter::once(normalize(name)))
            .find_map(|path| {
                self.vfs.files.get(&path).map(|source| ResolvedInclude {
                    path: path.clone(),
                    source: source.clone(),
                })
            })
    }
}
