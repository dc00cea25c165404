//! Test harness for applications built on `foreman`.
//!
//! Each [`TestForeman`] owns a fresh [`Foreman`](foreman::Foreman), so tests
//! never share callbacks, chain caches or call counters. On top of that the
//! crate provides:
//!
//! - [`CallLog`]: records which lifecycle hooks fired, in order
//! - outcome assertions with readable failure messages ([`assert_success`],
//!   [`assert_failure`], [`assert_error`])
//! - [`LogCapture`]: an in-memory tracing layer for asserting on lifecycle
//!   events
//!
//! ```rust
//! use foreman::{Command, CommandMetadata, Execute, Execution, Invocation, NoInputs};
//! use foreman_test::{assert_success, TestForeman};
//! use serde_json::json;
//!
//! struct Ping;
//!
//! impl Command for Ping {
//!     type Inputs = NoInputs;
//!     type Result = &'static str;
//!
//!     fn metadata() -> CommandMetadata {
//!         CommandMetadata::new("Ping")
//!     }
//! }
//!
//! impl Execute for Ping {
//!     fn execute(_run: &mut Invocation<Self>) -> Execution<&'static str> {
//!         Ok("pong")
//!     }
//! }
//!
//! let harness = TestForeman::new();
//! let log = harness.record::<Ping>();
//!
//! assert_eq!(assert_success(harness.run::<Ping>(json!({}))), "pong");
//! assert_eq!(log.transitions(), vec!["validate_inputs", "execute", "finalize"]);
//! ```
//!
//! Tests that install [`LogCapture`] touch the global subscriber; mark them
//! with [`serial`].

mod assertions;
mod capture;
mod harness;
mod recorder;

pub use assertions::{assert_error, assert_failure, assert_success, error_symbols};
pub use capture::{CapturedEvent, LogCapture};
pub use harness::TestForeman;
pub use recorder::{CallLog, HookCall};

pub use serial_test::serial;
