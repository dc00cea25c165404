//! Per-run command state.

use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use foreman_outcome::{ErrorCategory, ErrorCollection, ErrorRecord, PathSegment};

use crate::callbacks::{CallbackTarget, ChainFault};
use crate::command::{Command, Execution, Interrupt};
use crate::context::Foreman;
use crate::extensions::Extensions;
use crate::metadata::CommandMetadata;
use crate::state::{CommandState, StateMachine};
use crate::symbols;

/// One run of command `C`.
///
/// Created by [`Foreman::run`] or [`Foreman::run_async`] and dropped once
/// the [`Outcome`](crate::Outcome) has been built. Callbacks and the command
/// body receive it as `&mut Invocation<C>`.
pub struct Invocation<C: Command> {
    pub(crate) foreman: Foreman,
    pub(crate) metadata: Arc<CommandMetadata>,
    pub(crate) raw_inputs: Map<String, Value>,
    /// Set when the caller passed something other than a JSON object.
    pub(crate) rejected_inputs: Option<Value>,
    pub(crate) inputs: Option<C::Inputs>,
    pub(crate) errors: ErrorCollection,
    pub(crate) machine: StateMachine,
    pub(crate) runtime_path: Vec<String>,
    pub(crate) result: Option<C::Result>,
    pub(crate) halted: bool,
    pub(crate) skipped: bool,
    pub(crate) depth: usize,
    extensions: Extensions,
    _command: PhantomData<fn() -> C>,
}

impl<C: Command> Invocation<C> {
    pub(crate) fn new(
        foreman: Foreman,
        metadata: Arc<CommandMetadata>,
        inputs: Value,
        runtime_path: Vec<String>,
        depth: usize,
    ) -> Self {
        let (raw_inputs, rejected_inputs) = match inputs {
            Value::Object(map) => (map, None),
            Value::Null => (Map::new(), None),
            other => (Map::new(), Some(other)),
        };
        Self {
            foreman,
            metadata,
            raw_inputs,
            rejected_inputs,
            inputs: None,
            errors: ErrorCollection::new(),
            machine: StateMachine::new(),
            runtime_path,
            result: None,
            halted: false,
            skipped: false,
            depth,
            extensions: Extensions::new(),
            _command: PhantomData,
        }
    }

    /// The validated inputs.
    ///
    /// Fails with a fault before `validate_inputs` has produced them, so
    /// calling this from a `validate_inputs` before-callback is a bug that
    /// ends the run with `execution_error`.
    pub fn inputs(&self) -> Result<&C::Inputs, Interrupt> {
        self.inputs.as_ref().ok_or_else(|| {
            Interrupt::fault(anyhow::anyhow!(
                "inputs of {} read before validation",
                self.metadata.name
            ))
        })
    }

    pub fn raw_inputs(&self) -> &Map<String, Value> {
        &self.raw_inputs
    }

    pub fn raw_input(&self, name: &str) -> Option<&Value> {
        self.raw_inputs.get(name)
    }

    /// Raw inputs for normalization by `validate_inputs` before-callbacks.
    pub fn raw_inputs_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.raw_inputs
    }

    /// Records a `data` error at `path`. Does not halt.
    pub fn add_input_error(
        &mut self,
        path: Vec<PathSegment>,
        symbol: impl Into<String>,
        message: impl Into<String>,
    ) -> &mut ErrorRecord {
        let record = self.stamp(ErrorRecord::data(path, symbol, message));
        self.errors.upsert(record)
    }

    /// Records a `runtime` error without halting.
    ///
    /// Returns the stored record so context can be attached:
    ///
    /// ```rust,ignore
    /// run.add_runtime_error("insufficient_funds", "balance too low")
    ///     .insert_context("balance", balance);
    /// ```
    pub fn add_runtime_error(
        &mut self,
        symbol: impl Into<String>,
        message: impl Into<String>,
    ) -> &mut ErrorRecord {
        let record = self.stamp(ErrorRecord::runtime(symbol, message));
        self.errors.upsert(record)
    }

    /// Records an error, halting when it is fatal.
    ///
    /// ```rust,ignore
    /// run.add_error(ErrorRecord::runtime("locked", "account is locked").fatal())?;
    /// ```
    pub fn add_error(&mut self, record: ErrorRecord) -> Execution<()> {
        let fatal = record.is_fatal;
        let record = self.stamp(record);
        self.errors.add(record);
        if fatal {
            return Err(self.halt());
        }
        Ok(())
    }

    /// Stops the run. Return the interrupt from the command body:
    ///
    /// ```rust,ignore
    /// if locked {
    ///     return Err(run.halt());
    /// }
    /// ```
    ///
    /// Callbacks may call it and drop the result; the chain stops at its
    /// next step.
    pub fn halt(&mut self) -> Interrupt {
        self.halted = true;
        Interrupt::Halt
    }

    /// Records a fatal `runtime` error and stops the run.
    pub fn halt_with_runtime_error(
        &mut self,
        symbol: impl Into<String>,
        message: impl Into<String>,
    ) -> Interrupt {
        let record = self.stamp(ErrorRecord::runtime(symbol, message).fatal());
        self.errors.add(record);
        self.halt()
    }

    pub fn errors(&self) -> &ErrorCollection {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn state(&self) -> CommandState {
        self.machine.state()
    }

    /// Every state this run has been in, oldest first.
    pub fn history(&self) -> &[CommandState] {
        self.machine.history()
    }

    pub fn result(&self) -> Option<&C::Result> {
        self.result.as_ref()
    }

    /// Replaces the result. `execute` callbacks use this to decorate or
    /// substitute what the body returned.
    pub fn set_result(&mut self, result: C::Result) -> Option<C::Result> {
        self.result.replace(result)
    }

    pub fn take_result(&mut self) -> Option<C::Result> {
        self.result.take()
    }

    /// Names of the commands this run is nested in, outermost first.
    pub fn runtime_path(&self) -> &[String] {
        &self.runtime_path
    }

    pub fn command_name(&self) -> &str {
        &self.metadata.name
    }

    pub fn domain(&self) -> Option<&str> {
        self.metadata.domain.as_deref()
    }

    pub fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    /// Subcommand nesting depth. Top-level runs are at depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Per-run values shared between callbacks and the command body.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Application state registered on the [`Foreman`].
    pub fn app_state<T: 'static>(&self) -> Option<&T> {
        self.foreman.app_state::<T>()
    }

    pub fn foreman(&self) -> &Foreman {
        &self.foreman
    }

    pub(crate) fn stamp(&self, mut record: ErrorRecord) -> ErrorRecord {
        if record.runtime_path.is_empty() {
            record.runtime_path = self.runtime_path.clone();
        }
        record
    }

    /// Records a fatal `system` error and halts.
    pub(crate) fn record_system_error(
        &mut self,
        symbol: &str,
        message: impl Into<String>,
        context: Map<String, Value>,
    ) {
        let mut record = ErrorRecord::system(symbol, message);
        record.context = context;
        let record = self.stamp(record);
        self.errors.add(record);
        self.halted = true;
    }

    pub(crate) fn has_data_errors(&self) -> bool {
        self.errors.has_category(ErrorCategory::Data)
    }
}

impl<C: Command> CallbackTarget for Invocation<C> {
    fn current_state(&self) -> CommandState {
        self.machine.state()
    }

    fn is_halted(&self) -> bool {
        self.halted
    }

    fn record_fault(&mut self, fault: ChainFault) {
        let mut context = Map::new();
        context.insert("callback".into(), Value::from(fault.callback()));
        self.record_system_error(symbols::CALLBACK_MODE_MISMATCH, fault.to_string(), context);
    }
}

impl<C: Command> fmt::Debug for Invocation<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("command", &self.metadata.name)
            .field("state", &self.machine.state())
            .field("errors", &self.errors.len())
            .field("halted", &self.halted)
            .field("runtime_path", &self.runtime_path)
            .finish_non_exhaustive()
    }
}
