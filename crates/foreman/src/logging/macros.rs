//! Lifecycle event macros.

/// Logs the start of a run.
macro_rules! log_run_start {
    ($op:expr, $($field:tt)*) => {
        tracing::debug!(
            component = module_path!(),
            op = $op,
            event = $crate::logging::EVENT_START,
            $($field)*
        );
    };
}

/// Logs a run that produced a success.
macro_rules! log_run_end {
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::logging::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Logs a run that produced a failure.
macro_rules! log_run_error {
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::warn!(
            component = module_path!(),
            op = $op,
            event = $crate::logging::EVENT_END_ERROR,
            duration_ms = $duration,
            $($field)*
        );
    };
}

pub(crate) use log_run_end;
pub(crate) use log_run_error;
pub(crate) use log_run_start;
