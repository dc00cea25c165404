//! The lifecycle driver.
//!
//! One run walks `validate_inputs`, then `execute` if the inputs were
//! validated, then `finalize`, each through its compiled callback chain:
//!
//! ```text
//! uninitialized -> validating -> validated -> executing -> executed -> outcome_ready
//!                             \-> invalid ---------------------------/
//!                             \-> halted  <-------------/-----------/
//! ```
//!
//! Nothing raised inside a run escapes it. Faults returned by the body and
//! panics in the body or in callbacks become `system` errors; the caller
//! always gets an [`Outcome`].

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use foreman_outcome::{ErrorRecord, Outcome, PathSegment};

use crate::callbacks::{CallbackRegistry, ChainKey, CoreAction, Flow};
use crate::command::{Command, Execute, ExecuteAsync, Execution, Fault, Interrupt};
use crate::error::ProgrammingError;
use crate::invocation::Invocation;
use crate::logging::macros::{log_run_end, log_run_error, log_run_start};
use crate::state::{CommandState, Transition};
use crate::symbols;

type Registry<C> = CallbackRegistry<Invocation<C>>;

/// Runs a blocking command to completion.
pub(crate) fn drive<C: Execute>(mut run: Invocation<C>, registry: &Registry<C>) -> Outcome<C::Result> {
    let started = Instant::now();
    log_run_start!("run", command = %run.metadata.name, depth = run.depth);

    let mut validate = validate_core::<C>;
    transition(&mut run, registry, Transition::ValidateInputs, &mut validate);

    if run.state() == CommandState::Validated {
        let mut execute = execute_core::<C>;
        transition(&mut run, registry, Transition::Execute, &mut execute);
    }

    run.halted = false;
    let mut finalize = finalize_core::<C>;
    transition(&mut run, registry, Transition::Finalize, &mut finalize);

    finish(run, started)
}

/// Runs a suspending command to completion.
pub(crate) async fn drive_async<C: ExecuteAsync>(
    mut run: Invocation<C>,
    registry: &Registry<C>,
) -> Outcome<C::Result> {
    let started = Instant::now();
    log_run_start!("run_async", command = %run.metadata.name, depth = run.depth);

    let validate = validate_core::<C>;
    transition_async(
        &mut run,
        registry,
        Transition::ValidateInputs,
        CoreAction::Blocking(&validate),
    )
    .await;

    if run.state() == CommandState::Validated {
        let execute = execute_core_async::<C>;
        transition_async(
            &mut run,
            registry,
            Transition::Execute,
            CoreAction::Suspending(&execute),
        )
        .await;
    }

    run.halted = false;
    let finalize = finalize_core::<C>;
    transition_async(
        &mut run,
        registry,
        Transition::Finalize,
        CoreAction::Blocking(&finalize),
    )
    .await;

    finish(run, started)
}

fn transition<C: Command>(
    run: &mut Invocation<C>,
    registry: &Registry<C>,
    transition: Transition,
    core: &mut dyn FnMut(&mut Invocation<C>) -> Flow,
) {
    let Some(from) = enter(run, transition) else {
        return;
    };
    let chain = registry.chain(ChainKey::new(transition, from));

    let flow = if run.foreman.config().catch_panics {
        match panic::catch_unwind(AssertUnwindSafe(|| chain.invoke(&mut *run, &mut *core))) {
            Ok(flow) => flow,
            Err(payload) => {
                record_panic(run, payload);
                Flow::Halt
            }
        }
    } else {
        chain.invoke(run, core)
    };

    conclude(run, transition, from, flow);
}

async fn transition_async<C: Command>(
    run: &mut Invocation<C>,
    registry: &Registry<C>,
    transition: Transition,
    core: CoreAction<'_, Invocation<C>>,
) {
    let Some(from) = enter(run, transition) else {
        return;
    };
    let chain = registry.chain(ChainKey::new(transition, from));

    let flow = if run.foreman.config().catch_panics {
        let invoked = AssertUnwindSafe(chain.invoke_async(&mut *run, core))
            .catch_unwind()
            .await;
        match invoked {
            Ok(flow) => flow,
            Err(payload) => {
                record_panic(run, payload);
                Flow::Halt
            }
        }
    } else {
        chain.invoke_async(&mut *run, core).await
    };

    conclude(run, transition, from, flow);
}

fn enter<C: Command>(run: &mut Invocation<C>, transition: Transition) -> Option<CommandState> {
    match run.machine.enter(transition) {
        Ok(from) => {
            tracing::debug!(
                component = module_path!(),
                op = "enter",
                command = %run.metadata.name,
                transition = %transition,
                from = %from,
            );
            Some(from)
        }
        Err(err) => {
            record_programming_error(run, err);
            None
        }
    }
}

/// Settles whatever the chain left open.
///
/// A chain that returns without its core having settled the transition was
/// either halted or short-circuited by an around-callback that never
/// proceeded.
fn conclude<C: Command>(run: &mut Invocation<C>, transition: Transition, from: CommandState, flow: Flow) {
    if flow.is_halt() && transition != Transition::Finalize {
        run.halted = true;
    }

    let settled = match run.machine.active() {
        Some(Transition::Finalize) => run.machine.settle(Transition::Finalize, CommandState::OutcomeReady),
        Some(Transition::ValidateInputs) => {
            if !run.halted {
                run.record_system_error(
                    symbols::INPUTS_NOT_VALIDATED,
                    "input validation was skipped",
                    Map::new(),
                );
            }
            run.machine.halt()
        }
        Some(Transition::Execute) => {
            if run.halted {
                run.machine.halt()
            } else {
                run.skipped = true;
                run.machine.settle(Transition::Execute, CommandState::Executed)
            }
        }
        None if run.halted && !run.state().is_terminal() => run.machine.halt(),
        None => Ok(()),
    };
    if let Err(err) = settled {
        record_programming_error(run, err);
    }

    tracing::debug!(
        component = module_path!(),
        op = "settle",
        command = %run.metadata.name,
        transition = %transition,
        from = %from,
        to = %run.state(),
    );
}

fn settle<C: Command>(run: &mut Invocation<C>, transition: Transition, to: CommandState) {
    if let Err(err) = run.machine.settle(transition, to) {
        record_programming_error(run, err);
    }
}

fn validate_core<C: Command>(run: &mut Invocation<C>) -> Flow {
    if let Some(rejected) = &run.rejected_inputs {
        let kind = json_kind(rejected);
        run.add_input_error(
            Vec::new(),
            symbols::CANNOT_CAST,
            format!("inputs must be an object, got {}", kind),
        )
        .insert_context("received", kind);
    } else {
        match run.metadata.inputs.cast(&run.raw_inputs) {
            Ok(cast) => match serde_json::from_value::<C::Inputs>(Value::Object(cast)) {
                Ok(inputs) => run.inputs = Some(inputs),
                Err(err) => {
                    let record = run.stamp(deserialize_error(&err));
                    run.errors.add(record);
                }
            },
            Err(records) => {
                for record in records {
                    let record = run.stamp(record);
                    run.errors.add(record);
                }
            }
        }
    }

    if run.inputs.is_some() {
        if let Err(interrupt) = C::validate_inputs(run) {
            interrupted(run, interrupt);
            return Flow::Halt;
        }
    }
    if run.halted {
        return Flow::Halt;
    }

    let to = if run.has_data_errors() {
        CommandState::Invalid
    } else {
        CommandState::Validated
    };
    settle(run, Transition::ValidateInputs, to);
    Flow::Continue
}

fn execute_core<C: Execute>(run: &mut Invocation<C>) -> Flow {
    let executed = <C as Execute>::execute(run);
    conclude_body(run, executed)
}

fn execute_core_async<C: ExecuteAsync>(run: &mut Invocation<C>) -> BoxFuture<'_, Flow> {
    Box::pin(async move {
        let executed = <C as ExecuteAsync>::execute(run).await;
        conclude_body(run, executed)
    })
}

fn conclude_body<C: Command>(run: &mut Invocation<C>, executed: Execution<C::Result>) -> Flow {
    match executed {
        Ok(_) if run.halted => Flow::Halt,
        Ok(result) => {
            run.result = Some(result);
            settle(run, Transition::Execute, CommandState::Executed);
            Flow::Continue
        }
        Err(interrupt) => {
            interrupted(run, interrupt);
            Flow::Halt
        }
    }
}

fn finalize_core<C: Command>(run: &mut Invocation<C>) -> Flow {
    settle(run, Transition::Finalize, CommandState::OutcomeReady);
    Flow::Continue
}

fn interrupted<C: Command>(run: &mut Invocation<C>, interrupt: Interrupt) {
    match interrupt {
        Interrupt::Halt => run.halted = true,
        Interrupt::Fault(fault) => record_fault(run, fault),
    }
}

fn record_fault<C: Command>(run: &mut Invocation<C>, fault: Fault) {
    let message = fault.message();
    record_execution_error(run, fault.error_type(), message);
}

fn record_panic<C: Command>(run: &mut Invocation<C>, payload: Box<dyn Any + Send>) {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    };
    record_execution_error(run, "panic", message);
}

fn record_programming_error<C: Command>(run: &mut Invocation<C>, err: ProgrammingError) {
    record_execution_error(run, std::any::type_name::<ProgrammingError>(), err.to_string());
}

fn record_execution_error<C: Command>(run: &mut Invocation<C>, error_type: &str, message: String) {
    tracing::error!(
        component = module_path!(),
        op = "execution_error",
        command = %run.metadata.name,
        state = %run.state(),
        error_type,
        message = %message,
    );
    let mut context = Map::new();
    context.insert("error_type".into(), Value::from(error_type));
    context.insert("message".into(), Value::from(message.clone()));
    run.record_system_error(symbols::EXECUTION_ERROR, message, context);
}

/// Maps a serde error from deserializing the cast inputs to a data error.
fn deserialize_error(err: &serde_json::Error) -> ErrorRecord {
    let message = err.to_string();
    let quoted = message
        .split('`')
        .nth(1)
        .map(|name| vec![PathSegment::from(name)]);

    let record = match quoted {
        Some(path) if message.starts_with("missing field") => ErrorRecord::data(
            path,
            symbols::MISSING_REQUIRED_ATTRIBUTE,
            "is required",
        ),
        Some(path) if message.starts_with("unknown field") => ErrorRecord::data(
            path,
            symbols::UNEXPECTED_ATTRIBUTE,
            "is not an accepted input",
        ),
        _ => ErrorRecord::data(Vec::new(), symbols::CANNOT_CAST, message.clone()),
    };
    record.with_context("detail", message)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn finish<C: Command>(mut run: Invocation<C>, started: Instant) -> Outcome<C::Result> {
    if run.errors.is_empty() {
        if let Some(result) = run.result.take() {
            log_run_end!(
                "run",
                duration_ms = started.elapsed().as_millis() as u64,
                command = %run.metadata.name,
            );
            return Outcome::success(result);
        }
        let (symbol, message) = if run.skipped {
            (symbols::EXECUTION_SKIPPED, "execute was skipped by a callback")
        } else {
            (symbols::EXECUTION_HALTED, "run halted without recording an error")
        };
        run.record_system_error(symbol, message, Map::new());
    }

    log_run_error!(
        "run",
        duration_ms = started.elapsed().as_millis() as u64,
        command = %run.metadata.name,
        error_count = run.errors.len(),
        symbols = ?run.errors.iter().map(|record| record.symbol.as_str()).collect::<Vec<_>>(),
    );
    Outcome::failure(std::mem::take(&mut run.errors))
}
