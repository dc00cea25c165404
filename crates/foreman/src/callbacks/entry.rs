//! Callback entries and their builder options.

use std::fmt;
use std::sync::Arc;

use crate::callbacks::chain::{AsyncAround, Proceed};
use crate::error::ConfigurationError;
use crate::state::{CommandState, Transition};

/// Whether a chain should keep going.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

impl Flow {
    pub fn is_halt(&self) -> bool {
        matches!(self, Flow::Halt)
    }
}

/// Where a callback runs relative to the transition's core action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Before,
    After,
    Around,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Before => write!(f, "before"),
            Phase::After => write!(f, "after"),
            Phase::Around => write!(f, "around"),
        }
    }
}

/// Identifier handed out on registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(pub(crate) u64);

pub(crate) type HookFn<T> = Arc<dyn Fn(&mut T) + Send + Sync>;
pub(crate) type AroundFn<T> = Arc<dyn Fn(&mut T, Proceed<'_, T>) -> Flow + Send + Sync>;
pub(crate) type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// What a callback does when it fires.
pub(crate) enum Action<T> {
    Hook(HookFn<T>),
    Around(AroundFn<T>),
    AroundAsync(Arc<dyn AsyncAround<T>>),
}

/// A callback waiting to be registered.
///
/// Transition and state names are kept as given and resolved by
/// [`CallbackRegistry::register`](crate::CallbackRegistry::register), which
/// rejects names that do not exist or cannot occur for the transition.
///
/// ```rust,ignore
/// let entry = CallbackEntry::before("execute", |run: &mut Invocation<Charge>| {
///     run.extensions_mut().insert(Started(Instant::now()));
/// })
/// .priority(-10)
/// .when(|run| run.raw_inputs().contains_key("amount"))
/// .named("timing");
/// registry.register(entry)?;
/// ```
pub struct CallbackEntry<T> {
    pub(crate) phase: Phase,
    pub(crate) transition: String,
    pub(crate) action: Action<T>,
    pub(crate) priority: i32,
    pub(crate) from_state: Option<String>,
    pub(crate) to_state: Option<String>,
    pub(crate) when: Option<Predicate<T>>,
    pub(crate) name: Option<String>,
}

impl<T> CallbackEntry<T> {
    fn new(phase: Phase, transition: impl AsRef<str>, action: Action<T>) -> Self {
        Self {
            phase,
            transition: transition.as_ref().to_string(),
            action,
            priority: 0,
            from_state: None,
            to_state: None,
            when: None,
            name: None,
        }
    }

    /// Runs `f` before the core action.
    pub fn before<F>(transition: impl AsRef<str>, f: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        Self::new(Phase::Before, transition, Action::Hook(Arc::new(f)))
    }

    /// Runs `f` after the core action, unless the chain halted.
    pub fn after<F>(transition: impl AsRef<str>, f: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        Self::new(Phase::After, transition, Action::Hook(Arc::new(f)))
    }

    /// Wraps the rest of the chain. `f` decides whether to call
    /// [`Proceed::run`]; not calling it skips the core action and every
    /// callback nested inside.
    pub fn around<F>(transition: impl AsRef<str>, f: F) -> Self
    where
        F: Fn(&mut T, Proceed<'_, T>) -> Flow + Send + Sync + 'static,
    {
        Self::new(Phase::Around, transition, Action::Around(Arc::new(f)))
    }

    /// Wraps the rest of the chain with a suspending callback. Only usable
    /// from commands run with [`Foreman::run_async`](crate::Foreman::run_async).
    pub fn around_async<A>(transition: impl AsRef<str>, around: A) -> Self
    where
        A: AsyncAround<T> + 'static,
    {
        Self::new(
            Phase::Around,
            transition,
            Action::AroundAsync(Arc::new(around)),
        )
    }

    /// Sets the priority. Lower runs first (outermost for around).
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Only apply when the transition starts from this state.
    pub fn from_state(mut self, state: impl AsRef<str>) -> Self {
        self.from_state = Some(state.as_ref().to_string());
        self
    }

    /// Only apply when the transition ends in this state.
    ///
    /// Before and around callbacks run ahead of the outcome, so for them the
    /// only accepted state is the transition's happy-path target.
    pub fn to_state(mut self, state: impl AsRef<str>) -> Self {
        self.to_state = Some(state.as_ref().to_string());
        self
    }

    /// Only apply when `predicate` holds at call time.
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.when = Some(Arc::new(predicate));
        self
    }

    /// Labels the callback in logs and diagnostics.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn resolve(self, id: CallbackId) -> Result<Callback<T>, ConfigurationError> {
        let transition: Transition = self.transition.parse()?;

        let from_state = match &self.from_state {
            Some(name) => {
                let state: CommandState = name.parse()?;
                if !transition.sources().contains(&state) {
                    return Err(ConfigurationError::InvalidFromState { transition, state });
                }
                Some(state)
            }
            None => None,
        };

        let to_state = match &self.to_state {
            Some(name) => {
                let state: CommandState = name.parse()?;
                let reachable = match self.phase {
                    Phase::After => transition.targets().contains(&state),
                    Phase::Before | Phase::Around => state == transition.happy_target(),
                };
                if !reachable {
                    return Err(ConfigurationError::InvalidToState { transition, state });
                }
                Some(state)
            }
            None => None,
        };

        Ok(Callback {
            id,
            phase: self.phase,
            transition,
            action: self.action,
            priority: self.priority,
            from_state,
            to_state,
            when: self.when,
            name: self.name,
        })
    }
}

impl<T> fmt::Debug for CallbackEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackEntry")
            .field("phase", &self.phase)
            .field("transition", &self.transition)
            .field("priority", &self.priority)
            .field("from_state", &self.from_state)
            .field("to_state", &self.to_state)
            .field("conditional", &self.when.is_some())
            .field("name", &self.name)
            .finish()
    }
}

/// A registered callback with resolved transition and state filters.
pub(crate) struct Callback<T> {
    pub(crate) id: CallbackId,
    pub(crate) phase: Phase,
    pub(crate) transition: Transition,
    pub(crate) action: Action<T>,
    pub(crate) priority: i32,
    pub(crate) from_state: Option<CommandState>,
    pub(crate) to_state: Option<CommandState>,
    pub(crate) when: Option<Predicate<T>>,
    pub(crate) name: Option<String>,
}

impl<T> Callback<T> {
    /// Compile-time match: transition and wildcard-aware state filters.
    ///
    /// After-callbacks defer their `to_state` check to call time, since the
    /// state actually reached is only known once the core action has run.
    pub(crate) fn matches(&self, transition: Transition, from: CommandState, to: CommandState) -> bool {
        self.transition == transition
            && self.from_state.map_or(true, |state| state == from)
            && (self.phase == Phase::After || self.to_state.map_or(true, |state| state == to))
    }

    /// Call-time predicate check.
    pub(crate) fn applies(&self, target: &T) -> bool {
        self.when.as_ref().map_or(true, |predicate| predicate(target))
    }

    pub(crate) fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}#{}", self.phase, self.id.0),
        }
    }
}
