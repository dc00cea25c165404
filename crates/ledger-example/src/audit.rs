//! Cross-cutting behavior attached with callbacks rather than written into
//! each command.

use std::sync::Arc;
use std::time::Instant;

use foreman::{CallbackEntry, Command, ConfigurationError, Foreman, Invocation};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

/// One audited run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub command: String,
    pub succeeded: bool,
    pub duration_ms: u64,
    /// Parent commands, outermost first. Empty for top-level runs.
    pub runtime_path: Vec<String>,
}

#[derive(Debug, Default)]
pub struct AuditTrail {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditTrail {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    fn push(&self, entry: AuditEntry) {
        tracing::info!(
            component = module_path!(),
            op = "audit",
            command = %entry.command,
            succeeded = entry.succeeded,
            duration_ms = entry.duration_ms,
        );
        self.entries.lock().push(entry);
    }
}

/// Wraps `C`'s execute step and records every run in the [`AuditTrail`]
/// found in app state.
pub fn audit<C: Command>(foreman: &Foreman) -> Result<(), ConfigurationError> {
    let entry = CallbackEntry::around("execute", |run: &mut Invocation<C>, proceed| {
        let started = Instant::now();
        let flow = proceed.run(run);
        if let Some(trail) = run.app_state::<Arc<AuditTrail>>() {
            trail.push(AuditEntry {
                command: run.command_name().to_string(),
                succeeded: !flow.is_halt() && !run.has_errors(),
                duration_ms: started.elapsed().as_millis() as u64,
                runtime_path: run.runtime_path().to_vec(),
            });
        }
        flow
    })
    .priority(-100)
    .named("audit");
    foreman.callbacks::<C>().register(entry).map(|_| ())
}

/// Trims and lowercases the named account-id inputs of `C` before they are
/// validated.
pub fn normalize_ids<C: Command>(
    foreman: &Foreman,
    keys: &'static [&'static str],
) -> Result<(), ConfigurationError> {
    let entry = CallbackEntry::before("validate_inputs", move |run: &mut Invocation<C>| {
        for key in keys {
            if let Some(Value::String(id)) = run.raw_inputs_mut().get_mut(*key) {
                *id = id.trim().to_lowercase();
            }
        }
    })
    .named("normalize_ids");
    foreman.callbacks::<C>().register(entry).map(|_| ())
}
