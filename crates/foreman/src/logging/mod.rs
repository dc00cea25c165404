//! Structured logging for the lifecycle.
//!
//! Every run emits a `start` event when it begins and an `end` (success) or
//! `end_error` (failure) event once its outcome is built. Transitions, chain
//! compilation and domain registration log at `debug`. All events carry
//! `component` and `op` fields so they can be filtered without parsing
//! messages.
//!
//! Applications install a subscriber once:
//!
//! ```rust
//! use foreman::logging::{init, Profile};
//!
//! init(Profile::Development);
//! ```
//!
//! Libraries embedding the framework should not call [`init`]; their host
//! application owns the subscriber.

mod init;
pub(crate) mod macros;

pub use init::{init, Profile};

pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
