//! Command lifecycle framework.
//!
//! `foreman` runs business operations ("commands") through a fixed
//! lifecycle and hands back a structured [`Outcome`]. It provides:
//!
//! - **Typed commands**: declare inputs, a result type and metadata; write
//!   one `execute` body, blocking ([`Execute`]) or suspending
//!   ([`ExecuteAsync`])
//! - **Input casting**: an [`InputSchema`] coerces and constrains raw JSON
//!   inputs before they are deserialized, producing one `data` error per
//!   bad field
//! - **Callbacks**: before, after and around each transition, filtered by
//!   state and predicate, compiled into cached chains
//! - **Structured errors**: keyed [`ErrorRecord`]s instead of exceptions;
//!   errors always win over a returned result
//! - **Domain governance**: commands belong to domains, and subcommand calls
//!   across domains require a declared dependency
//!
//! # Lifecycle
//!
//! ```text
//! validate_inputs: uninitialized -> validating -> validated | invalid | halted
//! execute:         validated -> executing -> executed | halted
//! finalize:        executed | invalid | halted -> outcome_ready
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use foreman::{Command, CommandMetadata, Execute, Execution, Field, Foreman, InputSchema, Invocation};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! struct CreateUser;
//!
//! #[derive(Deserialize)]
//! struct CreateUserInputs {
//!     name: String,
//!     age: i64,
//! }
//!
//! impl Command for CreateUser {
//!     type Inputs = CreateUserInputs;
//!     type Result = String;
//!
//!     fn metadata() -> CommandMetadata {
//!         CommandMetadata::new("CreateUser").inputs(
//!             InputSchema::new()
//!                 .field(Field::string("name").required())
//!                 .field(Field::integer("age").required()),
//!         )
//!     }
//! }
//!
//! impl Execute for CreateUser {
//!     fn execute(run: &mut Invocation<Self>) -> Execution<String> {
//!         let inputs = run.inputs()?;
//!         if inputs.age < 0 {
//!             let message = format!("{} has a negative age", inputs.name);
//!             run.add_input_error(vec!["age".into()], "invalid_age", message);
//!             return Err(run.halt());
//!         }
//!         Ok(format!("created {}", inputs.name))
//!     }
//! }
//!
//! let foreman = Foreman::new();
//!
//! let outcome = foreman.run::<CreateUser>(json!({"name": "Ada", "age": "36"}));
//! assert_eq!(outcome.unwrap(), "created Ada");
//!
//! let outcome = foreman.run::<CreateUser>(json!({"name": "Ada", "age": -1}));
//! assert!(outcome.has_error("invalid_age"));
//! ```
//!
//! # Errors
//!
//! Business failures are [`ErrorRecord`]s in an [`Outcome::Failure`]. The
//! Rust error types in [`error`] describe wiring mistakes
//! ([`ConfigurationError`]) and misuse of the state machine
//! ([`ProgrammingError`]) and never appear in an outcome as such.

pub mod callbacks;
mod command;
mod context;
pub mod error;
mod extensions;
mod invocation;
pub mod logging;
mod machine;
mod metadata;
mod schema;
pub mod state;
mod subcommand;
pub mod symbols;

pub use callbacks::{
    AsyncAround, AsyncProceed, CacheStats, CallbackEntry, CallbackId, CallbackRegistry, ChainKey,
    Flow, Phase, Proceed,
};
pub use command::{Command, Execute, ExecuteAsync, Execution, Fault, Interrupt, NoInputs};
pub use context::{Foreman, ForemanBuilder, ForemanConfig};
pub use error::{ConfigurationError, ProgrammingError};
pub use extensions::Extensions;
pub use invocation::Invocation;
pub use metadata::CommandMetadata;
pub use schema::{Constraint, Field, FieldType, InputSchema};
pub use state::{CommandState, StateMachine, Transition};

pub use foreman_domain::{CallPair, Domain, DomainError, DomainGraph, Organization, GLOBAL_DOMAIN};
pub use foreman_outcome::{
    error_path, ErrorCategory, ErrorCollection, ErrorRecord, Outcome, PathSegment, WrongVariant,
};
