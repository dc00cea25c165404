//! Lifecycle callbacks.
//!
//! Callbacks run before, after, or around a transition's core action. They
//! are registered per command type and compiled into cached chains, so the
//! per-run cost is a cache lookup plus the callbacks themselves.
//!
//! # Ordering
//!
//! For one transition:
//!
//! 1. Around-callbacks nest outer to inner by ascending priority.
//! 2. Before-callbacks run by ascending priority.
//! 3. The core action runs.
//! 4. After-callbacks run by ascending priority.
//!
//! Equal priorities keep registration order.
//!
//! # Halting
//!
//! A halt (a fatal error, or an explicit halt on the target) is checked
//! between every step. Nothing further in the chain runs afterwards,
//! after-callbacks included.

mod chain;
mod entry;
mod registry;

pub use chain::{
    AsyncAround, AsyncProceed, CallbackTarget, ChainFault, ChainKey, CompiledChain, CoreAction,
    Proceed,
};
pub use entry::{CallbackEntry, CallbackId, Flow, Phase};
pub use registry::{CacheStats, CallbackRegistry};
