//! The runtime seam and its bundled implementation.

use plwasm_parser::PatternParser;
use tracing::{debug, info};

use crate::data_source::{DataSource, EmptySource};
use crate::error::ExecutionError;
use crate::eval::{self, EvalContext, Settings};
use crate::gate::{DangerousFunctionGate, DenyAll};
use crate::limits::RuntimeLimits;
use crate::log::{LogConsole, LogEntry};
use crate::pattern::Pattern;
use crate::vfs::VirtualFileSystem;

/// A pattern language runtime as seen by a host session.
///
/// Implementations keep their configuration across executions. Each call to
/// [`execute_string`](PatternRuntime::execute_string) starts from an empty
/// console log and an empty pattern tree.
pub trait PatternRuntime {
    /// Installs the hook consulted before any dangerous function runs.
    fn set_dangerous_function_gate(&mut self, gate: Box<dyn DangerousFunctionGate>);

    /// Sets the directories searched by `#include`, in priority order.
    fn set_include_paths(&mut self, paths: Vec<String>);

    /// Binds the bytes scripts read, exposed starting at `base_address`.
    fn set_data_source(&mut self, base_address: u64, source: Box<dyn DataSource>);

    /// Stores a file in the runtime's virtual filesystem.
    fn add_virtual_file(&mut self, path: &str, contents: &str);

    /// Parses and evaluates a script.
    ///
    /// On failure the console log still holds the entries emitted before
    /// the error and the pattern tree is empty.
    fn execute_string(&mut self, code: &str) -> Result<(), ExecutionError>;

    /// Entries logged by the most recent execution, in emission order.
    fn console_log(&self) -> &[LogEntry];

    /// Top-level patterns placed by the most recent successful execution.
    fn patterns(&self) -> &[Pattern];
}

/// The bundled tree-walking pattern language runtime.
pub struct PatternLanguage {
    gate: Box<dyn DangerousFunctionGate>,
    include_paths: Vec<String>,
    vfs: VirtualFileSystem,
    source: Box<dyn DataSource>,
    base_address: u64,
    limits: RuntimeLimits,
    console: LogConsole,
    patterns: Vec<Pattern>,
}

impl Default for PatternLanguage {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternLanguage {
    /// Creates a runtime with no data, no include paths and every dangerous
    /// function denied.
    pub fn new() -> Self {
        Self::with_limits(RuntimeLimits::default())
    }

    pub fn with_limits(limits: RuntimeLimits) -> Self {
        Self {
            gate: Box::new(DenyAll),
            include_paths: Vec::new(),
            vfs: VirtualFileSystem::new(),
            source: Box::new(EmptySource),
            base_address: 0,
            limits,
            console: LogConsole::new(),
            patterns: Vec::new(),
        }
    }

    pub fn limits(&self) -> RuntimeLimits {
        self.limits
    }
}

impl PatternRuntime for PatternLanguage {
    fn set_dangerous_function_gate(&mut self, gate: Box<dyn DangerousFunctionGate>) {
        self.gate = gate;
    }

    fn set_include_paths(&mut self, paths: Vec<String>) {
        debug!(?paths, "include paths set");
        self.include_paths = paths;
    }

    fn set_data_source(&mut self, base_address: u64, source: Box<dyn DataSource>) {
        debug!(base_address, size = source.size(), "data source bound");
        self.base_address = base_address;
        self.source = source;
    }

    fn add_virtual_file(&mut self, path: &str, contents: &str) {
        debug!(path, bytes = contents.len(), "virtual file stored");
        self.vfs.insert(path, contents);
    }

    fn execute_string(&mut self, code: &str) -> Result<(), ExecutionError> {
        self.console.clear();
        self.patterns.clear();

        let resolver = self.vfs.resolver(&self.include_paths);
        let program = PatternParser::with_resolver(&resolver).parse(code)?;

        let mut settings = Settings::new(self.limits, self.base_address);
        settings.apply(&program, self.source.size())?;

        let ctx = EvalContext {
            data: &*self.source,
            gate: &*self.gate,
            vfs: &self.vfs,
            console: &mut self.console,
            settings,
        };
        self.patterns = eval::evaluate(&program, ctx)?;

        info!(
            patterns = self.patterns.len(),
            log_entries = self.console.entries().len(),
            "script executed"
        );
        Ok(())
    }

    fn console_log(&self) -> &[LogEntry] {
        self.console.entries()
    }

    fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::gate::AllowAll;
    use crate::log::LogLevel;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn runtime_with(bytes: &[u8]) -> PatternLanguage {
        let mut runtime = PatternLanguage::new();
        let data: Arc<[u8]> = Arc::from(bytes.to_vec());
        runtime.set_data_source(0x00, Box::new(data));
        runtime
    }

    #[test]
    fn test_execute_places_patterns() {
        let mut runtime = runtime_with(&[1, 2, 3]);
        runtime.execute_string("u8 x @ 0x00;").unwrap();
        assert_eq!(runtime.patterns().len(), 1);
        assert_eq!(runtime.patterns()[0].format_value(), "1");
    }

    #[test]
    fn test_execution_clears_previous_state() {
        let mut runtime = runtime_with(&[1]);
        runtime
            .execute_string("std::print(\"first\"); u8 x @ 0;")
            .unwrap();
        runtime.execute_string("std::print(\"second\");").unwrap();

        assert_eq!(
            runtime.console_log(),
            &[LogEntry::new(LogLevel::Info, "second")]
        );
        assert!(runtime.patterns().is_empty());
    }

    #[test]
    fn test_failed_execution_keeps_log_and_drops_patterns() {
        let mut runtime = runtime_with(&[1]);
        let err = runtime
            .execute_string("u8 a @ 0;\nstd::print(\"before\");\nstd::error(\"stop\");")
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Aborted);
        assert_eq!((err.line, err.column), (3, 1));
        assert_eq!(err.to_string(), "3:1 -> stop");
        assert_eq!(runtime.console_log().len(), 1);
        assert!(runtime.patterns().is_empty());
    }

    #[test]
    fn test_parse_error_location() {
        let mut runtime = PatternLanguage::new();
        let err = runtime.execute_string("u8 x\nu8 y;").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parser);
        assert_eq!((err.line, err.column), (2, 1));
    }

    #[test]
    fn test_include_resolves_through_virtual_files() {
        let mut runtime = runtime_with(&[0x2A]);
        runtime.set_include_paths(vec!["/sources/includes".into()]);
        runtime.add_virtual_file("/sources/includes/types.pat", "using Byte = u8;");

        runtime
            .execute_string("#include <types.pat>\nByte b @ 0;")
            .unwrap();
        assert_eq!(runtime.patterns()[0].type_name, "Byte");
        assert_eq!(runtime.patterns()[0].format_value(), "42");
    }

    #[test]
    fn test_dangerous_function_gate() {
        let mut runtime = PatternLanguage::new();
        runtime.add_virtual_file("/data/notes.txt", "hello");
        let script = "std::print(std::file::read(\"/data/notes.txt\"));";

        let err = runtime.execute_string(script).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DangerousFunction);
        assert_eq!(
            err.message,
            "calling of dangerous function 'std::file::read' is not allowed"
        );

        runtime.set_dangerous_function_gate(Box::new(AllowAll));
        runtime.execute_string(script).unwrap();
        assert_eq!(runtime.console_log()[0].message, "hello");
    }

    #[test]
    fn test_gate_receives_function_name() {
        let mut runtime = PatternLanguage::new();
        runtime.set_dangerous_function_gate(Box::new(|name: &str| name == "std::file::exists"));

        runtime
            .execute_string("std::print(\"{}\", std::file::exists(\"/nope\"));")
            .unwrap();
        assert_eq!(runtime.console_log()[0].message, "false");
        assert!(runtime.execute_string("std::file::read(\"/nope\");").is_err());
    }
}
