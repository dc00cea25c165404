//! Command traits and the interrupt type returned by command bodies.
//!
//! A command is a type implementing [`Command`] plus one of [`Execute`]
//! (blocking) or [`ExecuteAsync`] (suspending). The type itself carries no
//! state; each run gets a fresh [`Invocation`] holding the inputs, errors
//! and result for that run only.
//!
//! ```rust,ignore
//! struct Double;
//!
//! #[derive(Deserialize)]
//! struct DoubleInputs { value: i64 }
//!
//! impl Command for Double {
//!     type Inputs = DoubleInputs;
//!     type Result = i64;
//!
//!     fn metadata() -> CommandMetadata {
//!         CommandMetadata::new("Double")
//!             .inputs(InputSchema::new().field(Field::integer("value").required()))
//!     }
//! }
//!
//! impl Execute for Double {
//!     fn execute(run: &mut Invocation<Self>) -> Execution<i64> {
//!         Ok(run.inputs()?.value * 2)
//!     }
//! }
//!
//! let outcome = foreman.run::<Double>(json!({"value": 21}));
//! assert_eq!(outcome.unwrap(), 42);
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

use crate::context::Foreman;
use crate::invocation::Invocation;
use crate::metadata::CommandMetadata;
use crate::Outcome;

/// Result of a command body or validation hook.
pub type Execution<R> = Result<R, Interrupt>;

/// Why a command body stopped early.
///
/// Any `std::error::Error` converts into [`Interrupt::Fault`] through `?`,
/// so repository and parsing errors need no wrapping. For `anyhow` errors
/// use [`Interrupt::fault`].
#[derive(Debug)]
pub enum Interrupt {
    /// Stop now. Errors already recorded are preserved.
    Halt,
    /// An unexpected failure. Recorded as a `system` error.
    Fault(Fault),
}

impl Interrupt {
    pub fn fault(error: impl Into<anyhow::Error>) -> Self {
        Interrupt::Fault(Fault {
            error: error.into(),
            error_type: "anyhow::Error",
        })
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, Interrupt::Halt)
    }
}

impl<E> From<E> for Interrupt
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Interrupt::Fault(Fault {
            error: anyhow::Error::new(error),
            error_type: std::any::type_name::<E>(),
        })
    }
}

/// An unexpected error raised by command code.
#[derive(Debug)]
pub struct Fault {
    error: anyhow::Error,
    error_type: &'static str,
}

impl Fault {
    /// Type name of the original error.
    pub fn error_type(&self) -> &'static str {
        self.error_type
    }

    pub fn message(&self) -> String {
        self.error.to_string()
    }

    pub fn into_error(self) -> anyhow::Error {
        self.error
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.error)
    }
}

/// Inputs of a command that takes none. Unknown keys are ignored unless the
/// command's schema rejects them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
pub struct NoInputs {}

/// The declaration shared by blocking and suspending commands.
pub trait Command: Send + Sized + 'static {
    /// Typed inputs, deserialized from the cast raw inputs.
    type Inputs: DeserializeOwned + Send + 'static;
    type Result: Send + 'static;

    fn metadata() -> CommandMetadata;

    /// Extra validation run by the `validate_inputs` core after casting
    /// succeeds. Data errors added here make the run invalid.
    fn validate_inputs(run: &mut Invocation<Self>) -> Execution<()> {
        let _ = run;
        Ok(())
    }
}

/// A command whose body blocks.
pub trait Execute: Command {
    fn execute(run: &mut Invocation<Self>) -> Execution<Self::Result>;

    /// Runs the command once against `foreman`.
    fn run(foreman: &Foreman, inputs: Value) -> Outcome<Self::Result> {
        foreman.run::<Self>(inputs)
    }
}

/// A command whose body may suspend.
#[async_trait]
pub trait ExecuteAsync: Command {
    async fn execute(run: &mut Invocation<Self>) -> Execution<Self::Result>;

    /// Runs the command once against `foreman`.
    async fn run_async(foreman: &Foreman, inputs: Value) -> Outcome<Self::Result> {
        foreman.run_async::<Self>(inputs).await
    }
}
