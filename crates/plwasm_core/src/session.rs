//! Session Runtime Handle.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use plwasm_runtime::{DangerousFunctionGate, PatternLanguage, PatternRuntime};
use tracing::{debug, info, warn};

use crate::SessionError;
use crate::buffer::{DATA_BASE_ADDRESS, DataBuffer};
use crate::config::SessionConfig;
use crate::dispatcher::FormatterCatalog;
use crate::log_sink::ConsoleOutput;
use crate::outcome::ExecutionOutcome;

/// Where a session is in its call protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    DataBound,
    Executed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::DataBound => "data bound",
            Self::Executed => "executed",
        };
        f.write_str(name)
    }
}

/// One long-lived runtime plus everything a host reads back from it.
///
/// The session drives the protocol `initialize`, then any number of
/// `set_data`, then `execute`, then reads results. Executing again without
/// new data reuses the current buffer. Every execution replaces the
/// console output, so it always reflects exactly one run.
pub struct Session<R = PatternLanguage> {
    runtime: R,
    config: SessionConfig,
    gate: Option<Box<dyn DangerousFunctionGate>>,
    catalog: FormatterCatalog,
    state: SessionState,
    data: DataBuffer,
    outcome: ExecutionOutcome,
    console: ConsoleOutput,
}

impl Session<PatternLanguage> {
    /// Creates a session around the bundled runtime.
    pub fn new(config: SessionConfig) -> Self {
        let runtime = PatternLanguage::with_limits(config.limits);
        Self::with_runtime(runtime, config)
    }
}

impl Default for Session<PatternLanguage> {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl<R: PatternRuntime> Session<R> {
    pub fn with_runtime(runtime: R, config: SessionConfig) -> Self {
        Self {
            runtime,
            config,
            gate: None,
            catalog: FormatterCatalog::new(),
            state: SessionState::Uninitialized,
            data: DataBuffer::empty(),
            outcome: ExecutionOutcome::NotRun,
            console: ConsoleOutput::new(),
        }
    }

    /// Replaces the gate derived from the configured policy.
    ///
    /// Takes effect at [`initialize`](Session::initialize).
    pub fn with_gate(mut self, gate: impl DangerousFunctionGate + 'static) -> Self {
        self.gate = Some(Box::new(gate));
        self
    }

    /// Installs the gate and include paths and binds the current buffer.
    pub fn initialize(&mut self) {
        if self.state != SessionState::Uninitialized {
            warn!(state = %self.state, "session initialized more than once");
        }
        let gate = self
            .gate
            .take()
            .unwrap_or_else(|| self.config.dangerous_functions.gate());
        self.runtime.set_dangerous_function_gate(gate);
        self.runtime
            .set_include_paths(self.config.include_paths.clone());
        self.runtime
            .set_data_source(DATA_BASE_ADDRESS, self.data.source());
        self.transition(SessionState::Initialized);
    }

    /// Replaces the data buffer with a copy of `bytes`.
    pub fn set_data(&mut self, bytes: &[u8]) {
        self.data = DataBuffer::copy_from(bytes);
        self.runtime
            .set_data_source(DATA_BASE_ADDRESS, self.data.source());
        info!(bytes = self.data.len(), "data buffer replaced");
        self.transition(SessionState::DataBound);
    }

    /// Stores a file `#include` can find.
    pub fn add_include_file(&mut self, path: &str, contents: &str) {
        self.runtime.add_virtual_file(path, contents);
    }

    /// Runs `code` against the current buffer and rebuilds the console
    /// output.
    ///
    /// Script errors and runtime panics both end up as the last console
    /// entry; nothing escapes to the caller.
    pub fn execute(&mut self, code: &str) -> &ConsoleOutput {
        if self.state == SessionState::Uninitialized {
            warn!("executing on an uninitialized session");
        }
        debug!(bytes = code.len(), data = self.data.len(), "execution started");

        let runtime = &mut self.runtime;
        let result = panic::catch_unwind(AssertUnwindSafe(|| runtime.execute_string(code)));

        self.outcome = match result {
            Ok(Ok(())) => ExecutionOutcome::Completed {
                patterns: self.runtime.patterns().len(),
            },
            Ok(Err(err)) => {
                debug!(kind = ?err.kind, line = err.line, column = err.column, "script failed");
                ExecutionOutcome::Failed(err)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(%message, "runtime fault caught");
                ExecutionOutcome::Faulted { message }
            }
        };
        self.console = ConsoleOutput::encode(self.runtime.console_log(), &self.outcome);

        info!(
            success = self.outcome.is_success(),
            log_entries = self.console.len(),
            "execution finished"
        );
        self.transition(SessionState::Executed);
        &self.console
    }

    /// Console output of the most recent execution.
    pub fn console(&self) -> &ConsoleOutput {
        &self.console
    }

    pub fn outcome(&self) -> &ExecutionOutcome {
        &self.outcome
    }

    pub fn formatters(&self) -> &FormatterCatalog {
        &self.catalog
    }

    /// Renders the patterns of the most recent execution.
    pub fn format(&self, name: &str) -> Result<String, SessionError> {
        self.catalog.render(name, self.runtime.patterns())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn data(&self) -> &DataBuffer {
        &self.data
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "session state changed");
        }
        self.state = next;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
