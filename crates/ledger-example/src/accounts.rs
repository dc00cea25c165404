//! The `Accounts` domain: owns balances.

use foreman::{
    Command, CommandMetadata, Execute, Execution, Field, InputSchema, Invocation, PathSegment,
};
use serde::Deserialize;

use crate::store::Account;
use crate::{store, BANK, NOT_FOUND};

pub const DOMAIN: &str = "Accounts";
pub const ALREADY_EXISTS: &str = "already_exists";
pub const INSUFFICIENT_FUNDS: &str = "insufficient_funds";

fn id_field(name: &str) -> Field {
    Field::string(name).required().min_length(3).max_length(32)
}

// ============================================================================
// OpenAccount
// ============================================================================

pub struct OpenAccount;

#[derive(Debug, Deserialize)]
pub struct OpenAccountInputs {
    pub id: String,
    pub owner: String,
    pub initial: i64,
}

impl Command for OpenAccount {
    type Inputs = OpenAccountInputs;
    type Result = Account;

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("OpenAccount")
            .description("Open a new account")
            .domain(DOMAIN)
            .organization(BANK)
            .inputs(
                InputSchema::new()
                    .field(id_field("id"))
                    .field(Field::string("owner").required().min_length(1))
                    .field(Field::integer("initial").default(0).min(0.0)),
            )
            .result("Account")
            .possible_error(ALREADY_EXISTS)
    }

    fn validate_inputs(run: &mut Invocation<Self>) -> Execution<()> {
        let id = run.inputs()?.id.clone();
        if store(run)?.account(&id).is_some() {
            run.add_input_error(
                vec![PathSegment::from("id")],
                ALREADY_EXISTS,
                format!("account {} already exists", id),
            );
        }
        Ok(())
    }
}

impl Execute for OpenAccount {
    fn execute(run: &mut Invocation<Self>) -> Execution<Account> {
        let store = store(run)?;
        let inputs = run.inputs()?;
        let account = Account {
            id: inputs.id.clone(),
            owner: inputs.owner.clone(),
            balance: inputs.initial,
        };
        store
            .ledger()
            .accounts
            .insert(account.id.clone(), account.clone());
        Ok(account)
    }
}

// ============================================================================
// GetAccount
// ============================================================================

pub struct GetAccount;

#[derive(Debug, Deserialize)]
pub struct AccountRef {
    pub id: String,
}

impl Command for GetAccount {
    type Inputs = AccountRef;
    type Result = Account;

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("GetAccount")
            .description("Look up one account")
            .domain(DOMAIN)
            .organization(BANK)
            .inputs(InputSchema::new().field(id_field("id")))
            .result("Account")
            .possible_error(NOT_FOUND)
    }
}

impl Execute for GetAccount {
    fn execute(run: &mut Invocation<Self>) -> Execution<Account> {
        let id = run.inputs()?.id.clone();
        match store(run)?.account(&id) {
            Some(account) => Ok(account),
            None => Err(not_found(run, &id)),
        }
    }
}

// ============================================================================
// AdjustBalance
// ============================================================================

/// Adds `delta` cents to a balance. Balances never go negative.
pub struct AdjustBalance;

#[derive(Debug, Deserialize)]
pub struct AdjustBalanceInputs {
    pub id: String,
    pub delta: i64,
}

impl Command for AdjustBalance {
    type Inputs = AdjustBalanceInputs;
    type Result = Account;

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("AdjustBalance")
            .description("Add to or subtract from a balance")
            .domain(DOMAIN)
            .organization(BANK)
            .inputs(
                InputSchema::new()
                    .field(id_field("id"))
                    .field(Field::integer("delta").required()),
            )
            .result("Account")
            .possible_error(NOT_FOUND)
            .possible_error(INSUFFICIENT_FUNDS)
    }
}

impl Execute for AdjustBalance {
    fn execute(run: &mut Invocation<Self>) -> Execution<Account> {
        let store = store(run)?;
        let (id, delta) = {
            let inputs = run.inputs()?;
            (inputs.id.clone(), inputs.delta)
        };

        let mut ledger = store.ledger();
        let Some(account) = ledger.accounts.get_mut(&id) else {
            return Err(not_found(run, &id));
        };
        let balance = account.balance + delta;
        if balance < 0 {
            let available = account.balance;
            run.add_runtime_error(
                INSUFFICIENT_FUNDS,
                format!("account {} holds {} cents", id, available),
            )
            .insert_context("id", id.as_str())
            .insert_context("balance", available)
            .insert_context("requested", -delta);
            return Err(run.halt());
        }
        account.balance = balance;
        Ok(account.clone())
    }
}

fn not_found<C: Command>(run: &mut Invocation<C>, id: &str) -> foreman::Interrupt {
    run.add_runtime_error(NOT_FOUND, format!("no account {}", id))
        .insert_context("id", id);
    run.halt()
}
