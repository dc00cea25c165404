//! The `Payments` domain: moves money by calling into `Accounts`.

use foreman::{
    Command, CommandMetadata, Execute, Execution, Field, InputSchema, Invocation, PathSegment,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::accounts::{AdjustBalance, GetAccount};
use crate::store::Account;
use crate::BANK;

pub const DOMAIN: &str = "Payments";
pub const SAME_ACCOUNT: &str = "same_account";

fn movement_schema() -> InputSchema {
    InputSchema::new()
        .field(Field::string("account").required())
        .field(Field::integer("amount").required().min(1.0))
}

#[derive(Debug, Deserialize)]
pub struct MovementInputs {
    pub account: String,
    pub amount: i64,
}

pub struct Deposit;

impl Command for Deposit {
    type Inputs = MovementInputs;
    type Result = Account;

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("Deposit")
            .description("Add money to an account")
            .domain(DOMAIN)
            .organization(BANK)
            .inputs(movement_schema())
            .result("Account")
    }
}

impl Execute for Deposit {
    fn execute(run: &mut Invocation<Self>) -> Execution<Account> {
        let (account, amount) = {
            let inputs = run.inputs()?;
            (inputs.account.clone(), inputs.amount)
        };
        run.run_subcommand_bang::<AdjustBalance>(json!({ "id": account, "delta": amount }))
    }
}

pub struct Withdraw;

impl Command for Withdraw {
    type Inputs = MovementInputs;
    type Result = Account;

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("Withdraw")
            .description("Take money out of an account")
            .domain(DOMAIN)
            .organization(BANK)
            .inputs(movement_schema())
            .result("Account")
    }
}

impl Execute for Withdraw {
    fn execute(run: &mut Invocation<Self>) -> Execution<Account> {
        let (account, amount) = {
            let inputs = run.inputs()?;
            (inputs.account.clone(), inputs.amount)
        };
        run.run_subcommand_bang::<AdjustBalance>(json!({ "id": account, "delta": -amount }))
    }
}

// ============================================================================
// Transfer
// ============================================================================

pub struct Transfer;

#[derive(Debug, Deserialize)]
pub struct TransferInputs {
    pub from: String,
    pub to: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub from: Account,
    pub to: Account,
    pub amount: i64,
}

impl Command for Transfer {
    type Inputs = TransferInputs;
    type Result = TransferReceipt;

    fn metadata() -> CommandMetadata {
        CommandMetadata::new("Transfer")
            .description("Move money between two accounts")
            .domain(DOMAIN)
            .organization(BANK)
            .inputs(
                InputSchema::new()
                    .field(Field::string("from").required())
                    .field(Field::string("to").required())
                    .field(Field::integer("amount").required().min(1.0)),
            )
            .result("TransferReceipt")
            .possible_error(SAME_ACCOUNT)
    }

    fn validate_inputs(run: &mut Invocation<Self>) -> Execution<()> {
        let inputs = run.inputs()?;
        if inputs.from == inputs.to {
            let message = format!("cannot transfer from {} to itself", inputs.to);
            run.add_input_error(vec![PathSegment::from("to")], SAME_ACCOUNT, message);
        }
        Ok(())
    }
}

impl Execute for Transfer {
    fn execute(run: &mut Invocation<Self>) -> Execution<TransferReceipt> {
        let (from, to, amount) = {
            let inputs = run.inputs()?;
            (inputs.from.clone(), inputs.to.clone(), inputs.amount)
        };

        // The destination must exist before anything is debited.
        run.run_subcommand_bang::<GetAccount>(json!({ "id": to }))?;
        let from = run.run_subcommand_bang::<AdjustBalance>(json!({ "id": from, "delta": -amount }))?;
        let to = run.run_subcommand_bang::<AdjustBalance>(json!({ "id": to, "delta": amount }))?;

        Ok(TransferReceipt { from, to, amount })
    }
}
