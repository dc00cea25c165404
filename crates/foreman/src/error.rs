//! Framework error types.
//!
//! These describe mistakes made while wiring or driving commands. Business
//! failures never use them: those are [`ErrorRecord`](crate::ErrorRecord)s
//! inside an [`Outcome::Failure`](crate::Outcome::Failure).

use thiserror::Error;

use crate::state::{CommandState, Transition};

/// A registration-time mistake: bad callback options, conflicting commands,
/// or an invalid domain declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("unknown transition '{0}' (expected one of: validate_inputs, execute, finalize)")]
    UnknownTransition(String),

    #[error("unknown state '{0}'")]
    UnknownState(String),

    /// A `from_state` filter names a state the transition never starts from.
    #[error("transition '{transition}' never starts from state '{state}'")]
    InvalidFromState {
        transition: Transition,
        state: CommandState,
    },

    /// A `to_state` filter names a state the callback can never observe:
    /// one the transition never ends in, or, for before and around
    /// callbacks, anything but the happy-path target.
    #[error("a callback on transition '{transition}' never sees target state '{state}'")]
    InvalidToState {
        transition: Transition,
        state: CommandState,
    },

    /// Two different command types claim the same full name.
    #[error("a different command is already registered as '{0}'")]
    DuplicateCommand(String),

    #[error(transparent)]
    Domain(#[from] foreman_domain::DomainError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Misuse of the lifecycle machinery itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgrammingError {
    /// The run already produced its outcome.
    #[error("command already completed; a command instance runs exactly once")]
    AlreadyCompleted,

    #[error("transition '{transition}' cannot start from state '{from}'")]
    IllegalTransition {
        transition: Transition,
        from: CommandState,
    },

    #[error("transition '{transition}' cannot end in state '{to}'")]
    IllegalTarget {
        transition: Transition,
        to: CommandState,
    },

    #[error("transition '{active}' is still in progress")]
    TransitionInProgress { active: Transition },

    #[error("transition '{0}' is not in progress")]
    NotInTransition(Transition),
}
