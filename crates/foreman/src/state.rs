//! Command states, transitions and the per-run state machine.
//!
//! ```text
//! validate_inputs: uninitialized -> validating -> validated | invalid | halted
//! execute:         validated     -> executing  -> executed  | halted
//! finalize:        executed | invalid | halted -> outcome_ready
//! ```
//!
//! `invalid`, `halted` and `outcome_ready` end a run. Each transition is
//! entered, then settled into one of its targets; callbacks registered for
//! the transition run between the two.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigurationError, ProgrammingError};

/// Where a command instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandState {
    Uninitialized,
    Validating,
    Validated,
    Invalid,
    Executing,
    Executed,
    Halted,
    OutcomeReady,
}

impl CommandState {
    pub const ALL: [CommandState; 8] = [
        CommandState::Uninitialized,
        CommandState::Validating,
        CommandState::Validated,
        CommandState::Invalid,
        CommandState::Executing,
        CommandState::Executed,
        CommandState::Halted,
        CommandState::OutcomeReady,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandState::Uninitialized => "uninitialized",
            CommandState::Validating => "validating",
            CommandState::Validated => "validated",
            CommandState::Invalid => "invalid",
            CommandState::Executing => "executing",
            CommandState::Executed => "executed",
            CommandState::Halted => "halted",
            CommandState::OutcomeReady => "outcome_ready",
        }
    }

    /// Returns true for states that end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommandState::Invalid | CommandState::Halted | CommandState::OutcomeReady
        )
    }
}

impl fmt::Display for CommandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for CommandState {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for CommandState {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownState(s.to_string()))
    }
}

/// A named lifecycle step. The name is the callback lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    ValidateInputs,
    Execute,
    Finalize,
}

impl Transition {
    /// All transitions, in the order a run takes them.
    pub const ALL: [Transition; 3] = [
        Transition::ValidateInputs,
        Transition::Execute,
        Transition::Finalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::ValidateInputs => "validate_inputs",
            Transition::Execute => "execute",
            Transition::Finalize => "finalize",
        }
    }

    /// States the transition may start from.
    pub fn sources(&self) -> &'static [CommandState] {
        match self {
            Transition::ValidateInputs => &[CommandState::Uninitialized],
            Transition::Execute => &[CommandState::Validated],
            Transition::Finalize => &[
                CommandState::Executed,
                CommandState::Invalid,
                CommandState::Halted,
            ],
        }
    }

    /// State held while the transition's callbacks run, if any.
    pub fn intermediate(&self) -> Option<CommandState> {
        match self {
            Transition::ValidateInputs => Some(CommandState::Validating),
            Transition::Execute => Some(CommandState::Executing),
            Transition::Finalize => None,
        }
    }

    /// States the transition may end in.
    pub fn targets(&self) -> &'static [CommandState] {
        match self {
            Transition::ValidateInputs => &[
                CommandState::Validated,
                CommandState::Invalid,
                CommandState::Halted,
            ],
            Transition::Execute => &[CommandState::Executed, CommandState::Halted],
            Transition::Finalize => &[CommandState::OutcomeReady],
        }
    }

    /// The target reached when nothing goes wrong. Chains are compiled for it.
    pub fn happy_target(&self) -> CommandState {
        match self {
            Transition::ValidateInputs => CommandState::Validated,
            Transition::Execute => CommandState::Executed,
            Transition::Finalize => CommandState::OutcomeReady,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Transition {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for Transition {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Transition::ALL
            .into_iter()
            .find(|transition| transition.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownTransition(s.to_string()))
    }
}

/// Tracks one run's position in the transition table.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: CommandState,
    active: Option<Transition>,
    history: Vec<CommandState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self {
            state: CommandState::Uninitialized,
            active: None,
            history: vec![CommandState::Uninitialized],
        }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    /// The transition that has been entered but not yet settled.
    pub fn active(&self) -> Option<Transition> {
        self.active
    }

    /// Every state the run has been in, oldest first.
    pub fn history(&self) -> &[CommandState] {
        &self.history
    }

    /// Returns an error if `transition` cannot be entered now.
    pub fn check(&self, transition: Transition) -> Result<(), ProgrammingError> {
        if self.state == CommandState::OutcomeReady {
            return Err(ProgrammingError::AlreadyCompleted);
        }
        if let Some(active) = self.active {
            return Err(ProgrammingError::TransitionInProgress { active });
        }
        if !transition.sources().contains(&self.state) {
            return Err(ProgrammingError::IllegalTransition {
                transition,
                from: self.state,
            });
        }
        Ok(())
    }

    /// Enters a transition, moving to its intermediate state.
    ///
    /// Returns the state the transition started from.
    pub fn enter(&mut self, transition: Transition) -> Result<CommandState, ProgrammingError> {
        self.check(transition)?;
        let from = self.state;
        self.active = Some(transition);
        if let Some(intermediate) = transition.intermediate() {
            self.move_to(intermediate);
        }
        Ok(from)
    }

    /// Completes the active transition in one of its targets.
    pub fn settle(&mut self, transition: Transition, to: CommandState) -> Result<(), ProgrammingError> {
        if self.active != Some(transition) {
            return Err(ProgrammingError::NotInTransition(transition));
        }
        if !transition.targets().contains(&to) {
            return Err(ProgrammingError::IllegalTarget { transition, to });
        }
        self.active = None;
        self.move_to(to);
        Ok(())
    }

    /// Moves to `halted`, settling the active transition if there is one.
    ///
    /// Finalization cannot be halted; halting during it is a no-op.
    pub fn halt(&mut self) -> Result<(), ProgrammingError> {
        match (self.state, self.active) {
            (CommandState::OutcomeReady, _) => Err(ProgrammingError::AlreadyCompleted),
            (_, Some(Transition::Finalize)) | (CommandState::Halted, None) => Ok(()),
            _ => {
                self.active = None;
                self.move_to(CommandState::Halted);
                Ok(())
            }
        }
    }

    fn move_to(&mut self, state: CommandState) {
        self.state = state;
        self.history.push(state);
    }
}
