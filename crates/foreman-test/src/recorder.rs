//! Records which lifecycle hooks fired.

use std::fmt;
use std::sync::Arc;

use foreman::{CallbackEntry, Command, CommandState, Foreman, Invocation, Phase, Transition};
use parking_lot::Mutex;

/// One recorded hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookCall {
    pub phase: Phase,
    pub transition: Transition,
    /// The run's state when the hook fired: the intermediate state for
    /// `before`, the settled state for `after`.
    pub state: CommandState,
}

impl fmt::Display for HookCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.phase, self.transition, self.state)
    }
}

/// A shared, ordered log of hook calls for one command type.
///
/// The log's before-hooks run first and its after-hooks run last among
/// same-transition callbacks, so what it records brackets everything else.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<HookCall>>>,
}

impl CallLog {
    pub(crate) fn attach<C: Command>(foreman: &Foreman) -> Self {
        let log = Self::default();
        let registry = foreman.callbacks::<C>();

        for transition in Transition::ALL {
            for (phase, priority) in [(Phase::Before, i32::MIN), (Phase::After, i32::MAX)] {
                let calls = log.calls.clone();
                let hook = move |run: &mut Invocation<C>| {
                    calls.lock().push(HookCall {
                        phase,
                        transition,
                        state: run.state(),
                    });
                };
                let entry = match phase {
                    Phase::Before => CallbackEntry::before(transition.as_str(), hook),
                    _ => CallbackEntry::after(transition.as_str(), hook),
                };
                // Transition names come from the enum itself and cannot be rejected.
                let _ = registry.register(entry.priority(priority).named("call-log"));
            }
        }
        log
    }

    pub fn calls(&self) -> Vec<HookCall> {
        self.calls.lock().clone()
    }

    /// Transitions whose before-hook fired, in order.
    pub fn transitions(&self) -> Vec<&'static str> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.phase == Phase::Before)
            .map(|call| call.transition.as_str())
            .collect()
    }

    /// States observed by after-hooks, in order.
    pub fn settled_states(&self) -> Vec<CommandState> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.phase == Phase::After)
            .map(|call| call.state)
            .collect()
    }

    pub fn fired(&self, phase: Phase, transition: Transition) -> bool {
        self.calls
            .lock()
            .iter()
            .any(|call| call.phase == phase && call.transition == transition)
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}
