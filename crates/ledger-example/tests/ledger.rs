use std::sync::Arc;

use foreman::{ForemanConfig, Transition};
use foreman_test::{assert_error, assert_failure, assert_success, LogCapture, TestForeman};
use ledger_example::{
    build, AdjustBalance, AuditTrail, Deposit, GetAccount, OpenAccount, Store, Transfer, Withdraw,
};
use serde_json::json;

fn bank() -> (TestForeman, Arc<Store>) {
    let store = Arc::new(Store::in_memory());
    let foreman = build(store.clone(), ForemanConfig::default()).unwrap();
    let harness = TestForeman::from(foreman);
    for (id, owner, initial) in [("alice", "Alice", 10_000), ("bob", "Bob", 500)] {
        assert_success(
            harness.run::<OpenAccount>(json!({ "id": id, "owner": owner, "initial": initial })),
        );
    }
    (harness, store)
}

fn balance(store: &Store, id: &str) -> i64 {
    store.account(id).unwrap().balance
}

#[test]
fn test_deposit_and_withdraw_adjust_the_balance() {
    let (bank, store) = bank();

    let account = assert_success(bank.run::<Deposit>(json!({"account": "bob", "amount": "250"})));
    assert_eq!(account.balance, 750);

    assert_success(bank.run::<Withdraw>(json!({"account": "bob", "amount": 50})));
    assert_eq!(balance(&store, "bob"), 700);
}

#[test]
fn test_transfer_moves_money_between_domains() {
    let (bank, store) = bank();
    let log = bank.record::<AdjustBalance>();

    let receipt = assert_success(
        bank.run::<Transfer>(json!({"from": "alice", "to": "bob", "amount": 2_500})),
    );

    assert_eq!(receipt.from.balance, 7_500);
    assert_eq!(receipt.to.balance, 3_000);
    assert_eq!(balance(&store, "alice"), 7_500);
    // GetAccount plus two adjustments.
    assert_eq!(bank.domains().call_count("Payments", "Accounts"), 3);
    assert_eq!(
        log.transitions().iter().filter(|t| **t == Transition::Execute.as_str()).count(),
        2
    );
}

#[test]
fn test_insufficient_funds_stops_the_transfer() {
    let (bank, store) = bank();

    let outcome = bank.run::<Transfer>(json!({"from": "bob", "to": "alice", "amount": 900}));

    let record = assert_error(&outcome, "runtime..insufficient_funds");
    assert_eq!(record.context["subcommand"], "AdjustBalance");
    assert_eq!(record.context["balance"], 500);
    assert_eq!(record.context["requested"], 900);
    assert_eq!(record.runtime_path, vec!["Transfer".to_string()]);
    assert_eq!(balance(&store, "bob"), 500);
    assert_eq!(balance(&store, "alice"), 10_000);
}

#[test]
fn test_unknown_destination_debits_nothing() {
    let (bank, store) = bank();

    let outcome = bank.run::<Transfer>(json!({"from": "alice", "to": "carol", "amount": 1}));

    let record = assert_error(&outcome, "runtime..not_found");
    assert_eq!(record.context["id"], "carol");
    assert_eq!(balance(&store, "alice"), 10_000);
}

#[test]
fn test_self_transfer_is_invalid() {
    let (bank, _store) = bank();

    let outcome = bank.run::<Transfer>(json!({"from": "alice", "to": "alice", "amount": 1}));

    assert_eq!(outcome.error_keys(), vec!["data.to.same_account"]);
    assert!(bank.domains().cross_domain_calls().is_empty());
}

#[test]
fn test_inputs_are_validated_per_field() {
    let (bank, _store) = bank();

    let errors = assert_failure(bank.run::<OpenAccount>(json!({
        "id": "ab",
        "owner": "Ann",
        "initial": -5,
    })));
    assert!(errors.contains_key("data.id.too_short"));
    assert!(errors.contains_key("data.initial.too_small"));

    let outcome = bank.run::<Deposit>(json!({"account": "bob", "amount": "ten"}));
    assert_error(&outcome, "data.amount.cannot_cast");

    let outcome = bank.run::<OpenAccount>(json!({"id": "alice", "owner": "Other"}));
    assert_error(&outcome, "data.id.already_exists");
}

#[test]
fn test_account_ids_are_normalized() {
    let (bank, _store) = bank();
    let account = assert_success(bank.run::<Deposit>(json!({"account": "  BOB ", "amount": 1})));
    assert_eq!(account.id, "bob");
    assert_success(bank.run::<GetAccount>(json!({"id": "Alice"})));
}

#[test]
fn test_payments_are_audited() {
    let (bank, _store) = bank();

    assert_success(bank.run::<Deposit>(json!({"account": "bob", "amount": 1})));
    assert_failure(bank.run::<Withdraw>(json!({"account": "bob", "amount": 10_000})));
    // Invalid runs never reach execute, so they are not audited.
    assert_failure(bank.run::<Transfer>(json!({"from": "bob", "to": "bob", "amount": 1})));

    let trail = bank.app_state::<Arc<AuditTrail>>().unwrap();
    let entries = trail.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].command, "Deposit");
    assert!(entries[0].succeeded);
    assert_eq!(entries[1].command, "Withdraw");
    assert!(!entries[1].succeeded);
    assert!(entries.iter().all(|entry| entry.runtime_path.is_empty()));
}

#[test]
fn test_undeclared_dependency_is_refused() {
    let harness = TestForeman::new()
        .with_command::<Deposit>()
        .with_command::<AdjustBalance>();

    let outcome = harness.run::<Deposit>(json!({"account": "bob", "amount": 1}));

    let record = assert_error(&outcome, "runtime..domain_dependency_not_declared");
    assert_eq!(record.context["to_domain"], "Accounts");
}

#[test]
fn test_missing_store_is_an_execution_error() {
    let harness = TestForeman::new();
    let outcome = harness.run::<GetAccount>(json!({"id": "alice"}));
    let record = assert_error(&outcome, "system..execution_error");
    assert!(record.message.contains("no ledger store"));
}

#[test]
fn test_ledger_survives_a_reload() {
    let dir = TestForeman::new().scratch_dir();
    let path = dir.path().join("ledger.json");

    let store = Arc::new(Store::open(&path).unwrap());
    let bank = build(store.clone(), ForemanConfig::default()).unwrap();
    assert_success(bank.run::<OpenAccount>(json!({"id": "carol", "owner": "Carol", "initial": 42})));
    store.save().unwrap();

    let reopened = Store::open(&path).unwrap();
    assert_eq!(reopened.account("carol").unwrap().balance, 42);
}

#[test]
fn test_transfers_log_their_subcommands() {
    let (bank, _store) = bank();
    let capture = LogCapture::start();

    assert_success(bank.run::<Transfer>(json!({"from": "alice", "to": "bob", "amount": 1})));

    let starts = capture.count_events(|event| {
        event.op.as_deref() == Some("run") && event.event.as_deref() == Some("start")
    });
    assert_eq!(starts, 4);
    assert_eq!(capture.events_for("audit").len(), 1);
}
