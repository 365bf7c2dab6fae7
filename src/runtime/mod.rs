//! Execution unit runtime
//!
//! A unit moves through `Pending -> Materialized -> Running ->
//! Completed | Failed -> Cleaned`. The script is written to a private
//! temporary file for the duration of the run; the file is removed when the
//! [`UnitRun`] is dropped, whatever way the run ended.
//!
//! A non-zero exit code is a normal outcome at this layer. Only failing to
//! start the process (OperationError) or hitting the policy timeout
//! (Timeout) are errors.

pub mod pointer;
pub mod process;
pub mod runner;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use pointer::ExecutionPointer;
pub use process::{Exit, OutputChunk, RunningProcess, Stream};
pub use runner::{CommandLine, RunnerKind};

use crate::context::Context;
use crate::error::{Result, runtime};
use crate::package::{ExecutionUnit, Package};

/// Exit handlers may chain into other units this many times
const MAX_HANDLER_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    Materialized,
    Running,
    Completed(i32),
    Failed(String),
    Cleaned,
}

pub struct Runtime {
    units_dir: PathBuf,
}

impl Runtime {
    pub fn new(context: &Context) -> Self {
        Self {
            units_dir: context.units_dir(),
        }
    }

    /// Materialize `unit` and start it, returning a stream of its output
    pub fn dispatch(&self, unit: &ExecutionUnit, args: &[String]) -> Result<UnitRun> {
        let mut state = StateLog::new(&unit.policy.name);

        let pointer = ExecutionPointer::materialize(&self.units_dir, unit)?;
        state.enter(UnitState::Materialized);

        let mut all_args = unit.policy.arguments.clone();
        all_args.extend(args.iter().cloned());
        let command = unit.policy.runner.command(pointer.path(), &all_args);
        let cwd = unit.policy.working_directory.as_deref().map(Path::new);
        let timeout = unit.policy.timeout.map(Duration::from_secs);

        // On spawn failure the pointer is dropped here, which removes the file.
        let process = match RunningProcess::spawn(&command, cwd, &unit.policy.environment, timeout) {
            Ok(process) => process,
            Err(e) => {
                state.enter(UnitState::Failed(e.to_string()));
                state.enter(UnitState::Cleaned);
                return Err(e);
            }
        };
        state.enter(UnitState::Running);

        Ok(UnitRun {
            name: unit.policy.name.clone(),
            timeout: unit.policy.timeout.unwrap_or_default(),
            process: Some(process),
            pointer: Some(pointer),
            state,
        })
    }

    /// Run `unit` to completion, forwarding output to `sink` unless the policy is silent
    pub fn execute_unit(
        &self,
        unit: &ExecutionUnit,
        args: &[String],
        sink: &mut dyn FnMut(&OutputChunk),
    ) -> Result<i32> {
        let mut run = self.dispatch(unit, args)?;
        while let Some(chunk) = run.next_chunk()? {
            if !unit.policy.silent {
                sink(&chunk);
            }
        }
        run.finish()
    }

    /// Run a named unit of `package`, then follow its exit handlers
    pub fn execute_with_handlers(
        &self,
        package: &Package,
        unit_name: &str,
        args: &[String],
        sink: &mut dyn FnMut(&OutputChunk),
        notify: &mut dyn FnMut(&str),
    ) -> Result<HandlerOutcome> {
        let mut current = unit_name.to_string();
        let mut current_args = args.to_vec();

        for _ in 0..=MAX_HANDLER_DEPTH {
            let unit = package
                .find_unit(&current)
                .ok_or_else(|| runtime::unit_not_found(&current))?;
            if let Some(message) = &unit.policy.message {
                notify(message);
            }

            let code = self.execute_unit(unit, &current_args, sink)?;
            let Some(handle) = unit
                .policy
                .exit_handlers
                .as_ref()
                .and_then(|h| h.for_exit_code(code))
            else {
                return Ok(HandlerOutcome {
                    exit_code: code,
                    end_process: None,
                });
            };

            if let Some(message) = &handle.message {
                notify(message);
            }
            if handle.end_process {
                return Ok(HandlerOutcome {
                    exit_code: code,
                    end_process: Some(handle.exit_code),
                });
            }
            match &handle.run {
                Some(next) => {
                    tracing::debug!(from = %current, to = %next, "Following exit handler");
                    current.clone_from(next);
                    current_args.clear();
                }
                None => {
                    return Ok(HandlerOutcome {
                        exit_code: code,
                        end_process: None,
                    });
                }
            }
        }

        Err(runtime::operation(format!(
            "exit handlers starting at '{unit_name}' chained more than {MAX_HANDLER_DEPTH} units"
        )))
    }
}

/// Result of a unit run including its exit handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerOutcome {
    /// Exit code of the last unit that ran
    pub exit_code: i32,
    /// Set when a handler asked the whole process to exit with this code
    pub end_process: Option<i32>,
}

/// A unit that is running; yields its output until the process exits
pub struct UnitRun {
    name: String,
    timeout: u64,
    process: Option<RunningProcess>,
    pointer: Option<ExecutionPointer>,
    state: StateLog,
}

impl UnitRun {
    pub fn next_chunk(&mut self) -> Result<Option<OutputChunk>> {
        match self.process.as_mut() {
            Some(process) => process.next_chunk(),
            None => Ok(None),
        }
    }

    /// Path of the materialized script while the run is alive
    pub fn script_path(&self) -> Option<&Path> {
        self.pointer.as_ref().map(ExecutionPointer::path)
    }

    /// Wait for exit and clean up, returning the exit code
    pub fn finish(mut self) -> Result<i32> {
        let exit = match self.process.take() {
            Some(process) => process.wait(),
            None => Err(runtime::operation("unit already finished")),
        };
        let result = match exit {
            Ok(Exit::Code(code)) => {
                self.state.enter(UnitState::Completed(code));
                Ok(code)
            }
            Ok(Exit::TimedOut) => {
                let err = runtime::timeout(&self.name, self.timeout);
                self.state.enter(UnitState::Failed(err.to_string()));
                Err(err)
            }
            Err(e) => {
                self.state.enter(UnitState::Failed(e.to_string()));
                Err(e)
            }
        };
        self.clean();
        result
    }

    fn clean(&mut self) {
        self.process.take();
        if self.pointer.take().is_some() {
            self.state.enter(UnitState::Cleaned);
        }
    }
}

impl Iterator for UnitRun {
    type Item = OutputChunk;

    fn next(&mut self) -> Option<OutputChunk> {
        self.next_chunk().ok().flatten()
    }
}

impl Drop for UnitRun {
    fn drop(&mut self) {
        self.clean();
    }
}

/// Logs each state transition of one unit
struct StateLog {
    unit: String,
    current: UnitState,
}

impl StateLog {
    fn new(unit: &str) -> Self {
        tracing::debug!(unit, state = ?UnitState::Pending, "Unit state");
        Self {
            unit: unit.to_string(),
            current: UnitState::Pending,
        }
    }

    fn enter(&mut self, next: UnitState) {
        tracing::debug!(unit = %self.unit, from = ?self.current, to = ?next, "Unit state");
        self.current = next;
    }
}
