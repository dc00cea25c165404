//! End-to-end tests of a single run: validation, execution, finalization
//! and the outcome they produce.

use foreman::{
    Command, CommandMetadata, CommandState, ErrorCategory, Execute, Execution, Field, Foreman,
    InputSchema, Invocation, NoInputs, PathSegment,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

// ============================================================================
// Commands under test
// ============================================================================

struct Answer;

impl Command for Answer {
    type Inputs = NoInputs;
    type Result = i64;

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("Answer")
    }
}

impl Execute for Answer {
    fn execute(_run: &mut Invocation<Self>) -> Execution<i64> {
        Ok(42)
    }
}

struct CreateUser;

#[derive(Debug, Deserialize)]
struct CreateUserInputs {
    name: String,
    age: i64,
}

impl Command for CreateUser {
    type Inputs = CreateUserInputs;
    type Result = String;

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("CreateUser").inputs(
            InputSchema::new()
                .field(Field::string("name").required().min_length(1))
                .field(Field::integer("age").required()),
        )
    }

    fn validate_inputs(run: &mut Invocation<Self>) -> Execution<()> {
        if run.inputs()?.age < 0 {
            run.add_input_error(vec!["age".into()], "invalid_age", "age must not be negative");
        }
        Ok(())
    }
}

impl Execute for CreateUser {
    fn execute(run: &mut Invocation<Self>) -> Execution<String> {
        let inputs = run.inputs()?;
        Ok(format!("{} ({})", inputs.name, inputs.age))
    }
}

struct WarnButReturn;

impl Command for WarnButReturn {
    type Inputs = NoInputs;
    type Result = i64;

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("WarnButReturn")
    }
}

impl Execute for WarnButReturn {
    fn execute(run: &mut Invocation<Self>) -> Execution<i64> {
        run.add_runtime_error("warn", "something looked off");
        Ok(42)
    }
}

struct Explode;

impl Command for Explode {
    type Inputs = NoInputs;
    type Result = ();

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("Explode")
    }
}

impl Execute for Explode {
    fn execute(_run: &mut Invocation<Self>) -> Execution<()> {
        panic!("boom");
    }
}

struct ParseNumber;

#[derive(Debug, Deserialize)]
struct ParseNumberInputs {
    text: String,
}

impl Command for ParseNumber {
    type Inputs = ParseNumberInputs;
    type Result = i64;

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("ParseNumber")
    }
}

impl Execute for ParseNumber {
    fn execute(run: &mut Invocation<Self>) -> Execution<i64> {
        Ok(run.inputs()?.text.parse::<i64>()?)
    }
}

struct Locked;

impl Command for Locked {
    type Inputs = NoInputs;
    type Result = ();

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("Locked")
    }
}

impl Execute for Locked {
    fn execute(run: &mut Invocation<Self>) -> Execution<()> {
        Err(run.halt_with_runtime_error("locked", "resource is locked"))
    }
}

struct QuietHalt;

impl Command for QuietHalt {
    type Inputs = NoInputs;
    type Result = ();

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("QuietHalt")
    }
}

impl Execute for QuietHalt {
    fn execute(run: &mut Invocation<Self>) -> Execution<()> {
        Err(run.halt())
    }
}

fn history_recorder<C: Command>(foreman: &Foreman) -> Arc<Mutex<Vec<CommandState>>> {
    let history = Arc::new(Mutex::new(Vec::new()));
    let sink = history.clone();
    foreman
        .callbacks::<C>()
        .register_after("finalize", move |run: &mut Invocation<C>| {
            *sink.lock() = run.history().to_vec();
        })
        .unwrap();
    history
}

// ============================================================================
// Success and failure
// ============================================================================

#[test]
fn test_minimal_command_succeeds() {
    let foreman = Foreman::new();
    let outcome = foreman.run::<Answer>(json!({}));
    assert!(outcome.is_success());
    assert_eq!(outcome.unwrap(), 42);
}

#[test]
fn test_success_walks_the_happy_path() {
    let foreman = Foreman::new();
    let history = history_recorder::<Answer>(&foreman);

    foreman.run::<Answer>(json!({})).unwrap();

    assert_eq!(
        *history.lock(),
        vec![
            CommandState::Uninitialized,
            CommandState::Validating,
            CommandState::Validated,
            CommandState::Executing,
            CommandState::Executed,
            CommandState::OutcomeReady,
        ]
    );
}

#[test]
fn test_command_validation_error_makes_run_invalid() {
    let foreman = Foreman::new();
    let history = history_recorder::<CreateUser>(&foreman);

    let outcome = foreman.run::<CreateUser>(json!({"name": "Ada", "age": -1}));

    assert!(outcome.is_failure());
    let errors = outcome.unwrap_errors();
    let record = errors.get("data.age.invalid_age").expect("invalid_age recorded");
    assert_eq!(record.category, ErrorCategory::Data);
    assert_eq!(record.path, vec![PathSegment::from("age")]);
    assert_eq!(
        *history.lock(),
        vec![
            CommandState::Uninitialized,
            CommandState::Validating,
            CommandState::Invalid,
            CommandState::OutcomeReady,
        ]
    );
}

struct SignUp;

#[derive(Debug, Deserialize)]
struct SignUpInputs {
    age: i64,
}

impl Command for SignUp {
    type Inputs = SignUpInputs;
    type Result = i64;

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("SignUp")
            .inputs(InputSchema::new().field(Field::integer("age").required()))
    }
}

impl Execute for SignUp {
    fn execute(run: &mut Invocation<Self>) -> Execution<i64> {
        Ok(run.inputs()?.age)
    }
}

#[test]
fn test_before_validation_callback_can_reject_inputs() {
    let foreman = Foreman::new();
    foreman
        .callbacks::<SignUp>()
        .register_before("validate_inputs", |run: &mut Invocation<SignUp>| {
            let age = run.raw_input("age").and_then(|age| age.as_i64());
            if age.is_some_and(|age| age < 18) {
                run.add_input_error(vec!["age".into()], "invalid_age", "must be an adult");
            }
        })
        .unwrap();
    let history = history_recorder::<SignUp>(&foreman);

    assert_eq!(foreman.run::<SignUp>(json!({"age": 30})).unwrap(), 30);

    let errors = foreman.run::<SignUp>(json!({"age": 12})).unwrap_errors();
    assert_eq!(errors.len(), 1);
    let record = errors.get("data.age.invalid_age").expect("invalid_age recorded");
    assert_eq!(record.category, ErrorCategory::Data);
    assert_eq!(record.path, vec![PathSegment::from("age")]);
    assert!(history
        .lock()
        .ends_with(&[CommandState::Invalid, CommandState::OutcomeReady]));
}

#[test]
fn test_inputs_are_cast_before_deserializing() {
    let foreman = Foreman::new();
    let outcome = foreman.run::<CreateUser>(json!({"name": "Ada", "age": "36"}));
    assert_eq!(outcome.unwrap(), "Ada (36)");
}

#[test]
fn test_every_bad_field_is_reported() {
    let foreman = Foreman::new();
    let outcome = foreman.run::<CreateUser>(json!({"name": "", "age": "old", "admin": true}));

    let mut keys = outcome.error_keys();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            "data.admin.unexpected_attribute",
            "data.age.cannot_cast",
            "data.name.too_short",
        ]
    );
}

#[test]
fn test_missing_required_input() {
    let foreman = Foreman::new();
    let outcome = foreman.run::<CreateUser>(json!({"age": 3}));
    assert!(outcome.has_error("missing_required_attribute"));
    assert_eq!(outcome.error_keys(), vec!["data.name.missing_required_attribute"]);
}

#[test]
fn test_serde_reports_fields_an_open_schema_misses() {
    let foreman = Foreman::new();
    let outcome = foreman.run::<ParseNumber>(json!({}));
    assert_eq!(outcome.error_keys(), vec!["data.text.missing_required_attribute"]);
}

#[test]
fn test_non_object_inputs_cannot_be_cast() {
    let foreman = Foreman::new();
    let outcome = foreman.run::<Answer>(json!([1, 2, 3]));
    let errors = outcome.unwrap_errors();
    let record = errors.get("data..cannot_cast").expect("root cast error");
    assert!(record.path.is_empty());
    assert_eq!(record.context["received"], "array");
}

#[test]
fn test_errors_override_a_returned_result() {
    let foreman = Foreman::new();
    let outcome = foreman.run::<WarnButReturn>(json!({}));
    assert!(outcome.is_failure());
    assert!(outcome.result().is_none());
    assert_eq!(outcome.error_keys(), vec!["runtime..warn"]);
}

#[test]
fn test_outcome_is_exactly_one_branch() {
    let foreman = Foreman::new();
    for outcome in [
        foreman.run::<Answer>(json!({})).map(|_| ()),
        foreman.run::<WarnButReturn>(json!({})).map(|_| ()),
        foreman.run::<Locked>(json!({})),
        foreman.run::<QuietHalt>(json!({})),
    ] {
        assert_ne!(outcome.is_success(), outcome.is_failure());
    }
}

// ============================================================================
// Halting and faults
// ============================================================================

#[test]
fn test_halt_with_runtime_error_ends_halted() {
    let foreman = Foreman::new();
    let history = history_recorder::<Locked>(&foreman);

    let outcome = foreman.run::<Locked>(json!({}));

    let errors = outcome.unwrap_errors();
    let record = errors.get("runtime..locked").unwrap();
    assert!(record.is_fatal);
    assert_eq!(
        history.lock().iter().rev().nth(1),
        Some(&CommandState::Halted)
    );
}

#[test]
fn test_halt_without_error_still_fails() {
    let foreman = Foreman::new();
    let outcome = foreman.run::<QuietHalt>(json!({}));
    assert_eq!(outcome.error_keys(), vec!["system..execution_halted"]);
}

#[test]
fn test_panics_become_execution_errors() {
    let foreman = Foreman::new();
    let outcome = foreman.run::<Explode>(json!({}));

    let errors = outcome.unwrap_errors();
    let record = errors.get("system..execution_error").expect("execution_error");
    assert_eq!(record.category, ErrorCategory::System);
    assert_eq!(record.context["error_type"], "panic");
    assert_eq!(record.context["message"], "boom");
}

#[test]
fn test_panics_propagate_when_not_caught() {
    let foreman = Foreman::builder().catch_panics(false).build().unwrap();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        foreman.run::<Explode>(json!({}))
    }));
    assert!(result.is_err());
}

#[test]
fn test_returned_errors_become_execution_errors() {
    let foreman = Foreman::new();
    let outcome = foreman.run::<ParseNumber>(json!({"text": "twelve"}));

    let errors = outcome.unwrap_errors();
    let record = errors.get("system..execution_error").unwrap();
    let error_type = record.context["error_type"].as_str().unwrap();
    assert!(error_type.ends_with("ParseIntError"), "{}", error_type);
    assert!(record.message.contains("invalid digit"));
}

#[test]
fn test_panicking_callback_is_contained() {
    let foreman = Foreman::new();
    foreman
        .callbacks::<Answer>()
        .register_before("execute", |_run| panic!("callback exploded"))
        .unwrap();

    let outcome = foreman.run::<Answer>(json!({}));
    let errors = outcome.unwrap_errors();
    assert_eq!(
        errors.get("system..execution_error").unwrap().context["message"],
        "callback exploded"
    );
}

#[test]
fn test_each_run_gets_a_fresh_invocation() {
    let foreman = Foreman::new();
    let first = foreman.run::<WarnButReturn>(json!({}));
    let second = foreman.run::<WarnButReturn>(json!({}));
    assert_eq!(first.unwrap_errors().len(), 1);
    assert_eq!(second.unwrap_errors().len(), 1);
}

#[test]
fn test_outcome_serializes_for_adapters() {
    let foreman = Foreman::new();
    let json = serde_json::to_value(foreman.run::<CreateUser>(json!({"age": 1}))).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["errors"][0]["symbol"], "missing_required_attribute");
    assert_eq!(json["errors"][0]["path"], json!(["name"]));
}
