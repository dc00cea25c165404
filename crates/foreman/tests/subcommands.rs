//! Nested runs and cross-domain governance.

use foreman::{
    Command, CommandMetadata, ErrorCategory, Execute, Execution, Field, Foreman, InputSchema,
    Invocation, NoInputs,
};
use serde::Deserialize;
use serde_json::json;

// ============================================================================
// Accounts domain
// ============================================================================

struct LoadAccount;

#[derive(Debug, Deserialize)]
struct LoadAccountInputs {
    id: String,
}

impl Command for LoadAccount {
    type Inputs = LoadAccountInputs;
    type Result = i64;

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("LoadAccount")
            .domain("Accounts")
            .organization("Bank")
            .inputs(InputSchema::new().field(Field::string("id").required().min_length(3)))
            .possible_error("not_found")
    }
}

impl Execute for LoadAccount {
    fn execute(run: &mut Invocation<Self>) -> Execution<i64> {
        match run.inputs()?.id.as_str() {
            "acc-1" => Ok(100),
            other => {
                let other = other.to_string();
                run.add_runtime_error("not_found", "no such account")
                    .insert_context("id", other);
                Err(run.halt())
            }
        }
    }
}

struct AuditLog;

impl Command for AuditLog {
    type Inputs = NoInputs;
    type Result = ();

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("AuditLog").domain("Accounts").organization("Bank")
    }
}

impl Execute for AuditLog {
    fn execute(_run: &mut Invocation<Self>) -> Execution<()> {
        Ok(())
    }
}

// ============================================================================
// Payments domain
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChargeInputs {
    account: String,
}

fn charge_metadata(name: &str) -> CommandMetadata {
    CommandMetadata::new(name)
        .domain("Payments")
        .organization("Bank")
        .inputs(InputSchema::new().field(Field::string("account").required()))
}

/// Carries on after a failed lookup.
struct Charge;

impl Command for Charge {
    type Inputs = ChargeInputs;
    type Result = String;

    fn metadata() -> CommandMetadata {
        charge_metadata("Charge")
    }
}

impl Execute for Charge {
    fn execute(run: &mut Invocation<Self>) -> Execution<String> {
        let account = run.inputs()?.account.clone();
        let balance = run.run_subcommand::<LoadAccount>(json!({ "id": account }));
        Ok(format!("balance {:?}", balance))
    }
}

/// Cannot continue without the lookup.
struct StrictCharge;

impl Command for StrictCharge {
    type Inputs = ChargeInputs;
    type Result = i64;

    fn metadata() -> CommandMetadata {
        charge_metadata("StrictCharge")
    }
}

impl Execute for StrictCharge {
    fn execute(run: &mut Invocation<Self>) -> Execution<i64> {
        let account = run.inputs()?.account.clone();
        let balance = run.run_subcommand_bang::<LoadAccount>(json!({ "id": account }))?;
        Ok(balance - 1)
    }
}

/// Nests itself until the depth limit refuses.
struct Recurse;

impl Command for Recurse {
    type Inputs = NoInputs;
    type Result = usize;

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("Recurse")
    }
}

impl Execute for Recurse {
    fn execute(run: &mut Invocation<Self>) -> Execution<usize> {
        Ok(run
            .run_subcommand::<Recurse>(json!({}))
            .map_or(0, |levels| levels + 1))
    }
}

struct RecordAudit;

impl Command for RecordAudit {
    type Inputs = NoInputs;
    type Result = ();

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("RecordAudit").domain("Accounts").organization("Bank")
    }
}

impl Execute for RecordAudit {
    fn execute(run: &mut Invocation<Self>) -> Execution<()> {
        run.run_subcommand_bang::<AuditLog>(json!({}))
    }
}

fn bank() -> Foreman {
    let foreman = Foreman::new();
    foreman.register::<LoadAccount>().unwrap();
    foreman.register::<AuditLog>().unwrap();
    foreman.register::<Charge>().unwrap();
    foreman.register::<StrictCharge>().unwrap();
    foreman
}

// ============================================================================
// Domain gate
// ============================================================================

#[test]
fn test_undeclared_cross_domain_call_is_denied() {
    let foreman = bank();
    let outcome = foreman.run::<StrictCharge>(json!({"account": "acc-1"}));

    let errors = outcome.unwrap_errors();
    let record = errors
        .get("runtime..domain_dependency_not_declared")
        .expect("denial recorded");
    assert_eq!(record.category, ErrorCategory::Runtime);
    assert_eq!(record.context["subcommand"], "LoadAccount");
    assert_eq!(record.context["from_domain"], "Payments");
    assert_eq!(record.context["to_domain"], "Accounts");
    assert!(record.message.contains("Accounts"));
    assert_eq!(foreman.domains().call_count("Payments", "Accounts"), 0);
}

#[test]
fn test_declared_dependency_allows_the_same_call() {
    let foreman = bank();
    foreman
        .domains()
        .declare_dependency("Payments", ["Accounts"])
        .unwrap();

    let outcome = foreman.run::<StrictCharge>(json!({"account": "acc-1"}));

    assert_eq!(outcome.unwrap(), 99);
    assert_eq!(foreman.domains().call_count("Payments", "Accounts"), 1);
}

#[test]
fn test_enforcement_can_be_disabled() {
    let foreman = Foreman::builder()
        .enforce_domain_dependencies(false)
        .build()
        .unwrap();
    foreman.register::<LoadAccount>().unwrap();
    foreman.register::<StrictCharge>().unwrap();

    assert_eq!(foreman.run::<StrictCharge>(json!({"account": "acc-1"})).unwrap(), 99);
    assert_eq!(foreman.domains().call_count("Payments", "Accounts"), 1);
}

#[test]
fn test_same_domain_calls_are_neither_gated_nor_counted() {
    let foreman = bank();
    foreman.register::<RecordAudit>().unwrap();

    assert!(foreman.run::<RecordAudit>(json!({})).is_success());
    assert!(foreman.domains().cross_domain_calls().is_empty());
}

// ============================================================================
// Error propagation
// ============================================================================

#[test]
fn test_child_errors_are_copied_with_subcommand_context() {
    let foreman = bank();
    foreman
        .domains()
        .declare_dependency("Payments", ["Accounts"])
        .unwrap();

    let outcome = foreman.run::<Charge>(json!({"account": "acc-404"}));

    // The parent kept going and returned a value, but the copied error wins.
    assert!(outcome.is_failure());
    let errors = outcome.unwrap_errors();
    assert_eq!(errors.len(), 1);
    let record = errors.get("runtime..not_found").unwrap();
    assert_eq!(record.context["subcommand"], "LoadAccount");
    assert_eq!(record.context["id"], "acc-404");
    assert_eq!(record.runtime_path, vec!["Charge".to_string()]);
}

#[test]
fn test_bang_halts_the_parent() {
    let foreman = bank();
    foreman
        .domains()
        .declare_dependency("Payments", ["Accounts"])
        .unwrap();

    let outcome = foreman.run::<StrictCharge>(json!({"account": "acc-404"}));

    assert_eq!(outcome.error_keys(), vec!["runtime..not_found"]);
}

#[test]
fn test_child_validation_errors_keep_their_path() {
    let foreman = bank();
    foreman
        .domains()
        .declare_dependency("Payments", ["Accounts"])
        .unwrap();

    let outcome = foreman.run::<Charge>(json!({"account": "ab"}));

    let errors = outcome.unwrap_errors();
    let record = errors.get("data.id.too_short").expect("child data error");
    assert_eq!(record.context["subcommand"], "LoadAccount");
}

#[test]
fn test_depth_limit_stops_runaway_nesting() {
    let foreman = Foreman::builder().max_subcommand_depth(3).build().unwrap();

    let outcome = foreman.run::<Recurse>(json!({}));

    let errors = outcome.unwrap_errors();
    let record = errors.get("runtime..subcommand_depth_exceeded").unwrap();
    assert_eq!(record.context["depth"], 4);
    assert_eq!(record.runtime_path, vec!["Recurse"; 3]);
}
