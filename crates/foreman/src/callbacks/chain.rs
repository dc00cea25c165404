//! Compiled callback chains.
//!
//! A chain is compiled once per [`ChainKey`] from the callbacks that match
//! it, then reused for every run. Compilation sorts the callbacks and
//! composes the around-callbacks into nested steps; predicates and
//! after-callback `to_state` filters stay as call-time checks.
//!
//! ```text
//! around[0] ( around[1] ( ... before* -> core -> after* ... ) )
//! ```
//!
//! The halt flag of the target is checked before every step. Once it is
//! set, nothing further in the chain runs, after-callbacks included.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

use crate::callbacks::entry::{Action, Callback, Flow, Phase};
use crate::state::{CommandState, Transition};

/// What a chain needs to know about the value it runs over.
pub trait CallbackTarget: Send + 'static {
    fn current_state(&self) -> CommandState;

    fn is_halted(&self) -> bool;

    /// Records a fault detected by the chain itself and halts the target.
    fn record_fault(&mut self, fault: ChainFault);
}

/// A misuse detected while a chain runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainFault {
    /// A blocking around-callback was asked to wrap a suspending core.
    BlockingAroundOverSuspendingCore { callback: String },
    /// A suspending around-callback was reached from a blocking run.
    AsyncAroundInBlockingChain { callback: String },
}

impl ChainFault {
    pub fn callback(&self) -> &str {
        match self {
            ChainFault::BlockingAroundOverSuspendingCore { callback }
            | ChainFault::AsyncAroundInBlockingChain { callback } => callback,
        }
    }
}

impl fmt::Display for ChainFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainFault::BlockingAroundOverSuspendingCore { callback } => write!(
                f,
                "blocking around-callback '{}' cannot wrap a suspending execute",
                callback
            ),
            ChainFault::AsyncAroundInBlockingChain { callback } => write!(
                f,
                "async around-callback '{}' cannot run in a blocking run",
                callback
            ),
        }
    }
}

/// Cache key of a compiled chain within one registry.
///
/// `to` is the transition's happy target: the state the chain is compiled
/// for, not necessarily the state the run ends up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainKey {
    pub transition: Transition,
    pub from: CommandState,
    pub to: CommandState,
}

impl ChainKey {
    pub fn new(transition: Transition, from: CommandState) -> Self {
        Self {
            transition,
            from,
            to: transition.happy_target(),
        }
    }
}

impl fmt::Display for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}->{}", self.transition, self.from, self.to)
    }
}

type StepFn<T> = dyn Fn(&mut T, &mut dyn FnMut(&mut T) -> Flow) -> Flow + Send + Sync;
type Step<T> = Arc<StepFn<T>>;

/// Continuation handed to a blocking around-callback.
///
/// Taking `self` by value means the rest of the chain runs at most once per
/// around-callback invocation.
pub struct Proceed<'a, T> {
    next: &'a StepFn<T>,
    core: &'a mut dyn FnMut(&mut T) -> Flow,
}

impl<'a, T> Proceed<'a, T> {
    /// Runs the callbacks nested inside this one, then the core action.
    pub fn run(self, target: &mut T) -> Flow {
        (self.next)(target, self.core)
    }
}

/// The core of a transition as seen by a suspending run.
pub enum CoreAction<'a, T> {
    Blocking(&'a (dyn Fn(&mut T) -> Flow + Send + Sync)),
    Suspending(&'a (dyn for<'t> Fn(&'t mut T) -> BoxFuture<'t, Flow> + Send + Sync)),
}

impl<T> Clone for CoreAction<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for CoreAction<'_, T> {}

/// A suspending around-callback.
///
/// ```rust,ignore
/// struct Timeout(Duration);
///
/// #[async_trait]
/// impl AsyncAround<Invocation<Fetch>> for Timeout {
///     async fn around(
///         &self,
///         run: &mut Invocation<Fetch>,
///         proceed: AsyncProceed<'_, Invocation<Fetch>>,
///     ) -> Flow {
///         let started = Instant::now();
///         let flow = proceed.run(run).await;
///         tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64);
///         flow
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncAround<T>: Send + Sync {
    async fn around(&self, target: &mut T, proceed: AsyncProceed<'_, T>) -> Flow;
}

/// Continuation handed to a suspending around-callback.
pub struct AsyncProceed<'a, T> {
    chain: &'a CompiledChain<T>,
    index: usize,
    core: CoreAction<'a, T>,
}

impl<'a, T: CallbackTarget> AsyncProceed<'a, T> {
    /// Runs the callbacks nested inside this one, then the core action.
    pub fn run<'t>(self, target: &'t mut T) -> BoxFuture<'t, Flow>
    where
        'a: 't,
    {
        self.chain.invoke_from(self.index, target, self.core)
    }
}

/// An immutable, sorted composition of the callbacks for one [`ChainKey`].
pub struct CompiledChain<T> {
    key: ChainKey,
    around: Vec<Arc<Callback<T>>>,
    before: Vec<Arc<Callback<T>>>,
    after: Vec<Arc<Callback<T>>>,
    /// `levels[i]` runs the chain from `around[i]` inward; the last level
    /// runs the before-callbacks, the core and the after-callbacks.
    levels: Vec<Step<T>>,
}

impl<T: CallbackTarget> CompiledChain<T> {
    pub(crate) fn compile(key: ChainKey, callbacks: &[Arc<Callback<T>>]) -> Self {
        let mut matching: Vec<Arc<Callback<T>>> = callbacks
            .iter()
            .filter(|callback| callback.matches(key.transition, key.from, key.to))
            .cloned()
            .collect();
        // Stable: equal priorities keep registration order.
        matching.sort_by_key(|callback| callback.priority);

        let select = |phase: Phase| -> Vec<Arc<Callback<T>>> {
            matching
                .iter()
                .filter(|callback| callback.phase == phase)
                .cloned()
                .collect()
        };
        let around = select(Phase::Around);
        let before = select(Phase::Before);
        let after = select(Phase::After);

        let innermost: Step<T> = {
            let before = before.clone();
            let after = after.clone();
            Arc::new(move |target: &mut T, core: &mut dyn FnMut(&mut T) -> Flow| {
                if run_before(&before, target).is_halt() {
                    return Flow::Halt;
                }
                if core(target).is_halt() || target.is_halted() {
                    return Flow::Halt;
                }
                run_after(&after, target)
            })
        };

        let mut levels = vec![innermost];
        for callback in around.iter().rev() {
            let next = match levels.last() {
                Some(next) => next.clone(),
                None => break,
            };
            let callback = callback.clone();
            let step: Step<T> = Arc::new(move |target: &mut T, core: &mut dyn FnMut(&mut T) -> Flow| {
                if target.is_halted() {
                    return Flow::Halt;
                }
                if !callback.applies(target) {
                    return next(target, core);
                }
                match &callback.action {
                    Action::Around(around) => around(
                        target,
                        Proceed {
                            next: next.as_ref(),
                            core,
                        },
                    ),
                    Action::AroundAsync(_) => {
                        target.record_fault(ChainFault::AsyncAroundInBlockingChain {
                            callback: callback.label(),
                        });
                        Flow::Halt
                    }
                    // Hooks are never compiled into the around list.
                    Action::Hook(_) => next(target, core),
                }
            });
            levels.push(step);
        }
        levels.reverse();

        Self {
            key,
            around,
            before,
            after,
            levels,
        }
    }

    /// Runs the chain around a blocking core action.
    pub fn invoke(&self, target: &mut T, core: &mut dyn FnMut(&mut T) -> Flow) -> Flow {
        match self.levels.first() {
            Some(outermost) => outermost(target, core),
            None => core(target),
        }
    }

    /// Runs the chain in a suspending run.
    ///
    /// Suspension happens only inside the core and inside suspending
    /// around-callbacks; the chain's own bookkeeping never awaits.
    pub fn invoke_async<'t>(&'t self, target: &'t mut T, core: CoreAction<'t, T>) -> BoxFuture<'t, Flow> {
        self.invoke_from(0, target, core)
    }

    fn invoke_from<'t>(
        &'t self,
        index: usize,
        target: &'t mut T,
        core: CoreAction<'t, T>,
    ) -> BoxFuture<'t, Flow> {
        Box::pin(async move {
            if target.is_halted() {
                return Flow::Halt;
            }
            let Some(callback) = self.around.get(index) else {
                return self.run_innermost_async(target, core).await;
            };
            if !callback.applies(target) {
                return self.invoke_from(index + 1, target, core).await;
            }

            match &callback.action {
                Action::AroundAsync(around) => {
                    let proceed = AsyncProceed {
                        chain: self,
                        index: index + 1,
                        core,
                    };
                    around.around(target, proceed).await
                }
                Action::Around(around) => match (core, self.levels.get(index + 1)) {
                    (CoreAction::Blocking(blocking), Some(next)) => {
                        let mut core = |target: &mut T| blocking(target);
                        around(
                            target,
                            Proceed {
                                next: next.as_ref(),
                                core: &mut core,
                            },
                        )
                    }
                    _ => {
                        target.record_fault(ChainFault::BlockingAroundOverSuspendingCore {
                            callback: callback.label(),
                        });
                        Flow::Halt
                    }
                },
                Action::Hook(_) => self.invoke_from(index + 1, target, core).await,
            }
        })
    }

    async fn run_innermost_async(&self, target: &mut T, core: CoreAction<'_, T>) -> Flow {
        if run_before(&self.before, target).is_halt() {
            return Flow::Halt;
        }
        let flow = match core {
            CoreAction::Blocking(blocking) => blocking(target),
            CoreAction::Suspending(suspending) => suspending(target).await,
        };
        if flow.is_halt() || target.is_halted() {
            return Flow::Halt;
        }
        run_after(&self.after, target)
    }
}

impl<T> CompiledChain<T> {
    pub fn key(&self) -> ChainKey {
        self.key
    }

    /// Number of callbacks compiled into the chain.
    pub fn len(&self) -> usize {
        self.around.len() + self.before.len() + self.after.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Callback labels in execution order, around-callbacks outermost first.
    pub fn labels(&self) -> Vec<String> {
        self.around
            .iter()
            .chain(&self.before)
            .chain(&self.after)
            .map(|callback| callback.label())
            .collect()
    }
}

impl<T> fmt::Debug for CompiledChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledChain")
            .field("key", &self.key)
            .field("around", &self.around.len())
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}

fn run_before<T: CallbackTarget>(callbacks: &[Arc<Callback<T>>], target: &mut T) -> Flow {
    for callback in callbacks {
        if target.is_halted() {
            return Flow::Halt;
        }
        if !callback.applies(target) {
            continue;
        }
        if let Action::Hook(hook) = &callback.action {
            hook(target);
        }
    }
    if target.is_halted() {
        Flow::Halt
    } else {
        Flow::Continue
    }
}

fn run_after<T: CallbackTarget>(callbacks: &[Arc<Callback<T>>], target: &mut T) -> Flow {
    for callback in callbacks {
        if target.is_halted() {
            return Flow::Halt;
        }
        let reached = target.current_state();
        if callback.to_state.is_some_and(|state| state != reached) || !callback.applies(target) {
            continue;
        }
        if let Action::Hook(hook) = &callback.action {
            hook(target);
        }
    }
    if target.is_halted() {
        Flow::Halt
    } else {
        Flow::Continue
    }
}
