use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use foreman::logging::{self, Profile};
use foreman::{Execute, Foreman, ForemanConfig, Outcome};
use serde::Serialize;
use serde_json::{json, Value};

use ledger_example::{
    build, Account, Deposit, GetAccount, OpenAccount, Store, Transfer, TransferReceipt, Withdraw,
};

/// A small bank ledger
#[derive(Parser)]
#[command(name = "ledger")]
#[command(about = "Keep account balances in a JSON file")]
struct Cli {
    /// Ledger file
    #[arg(long, global = true, default_value = "ledger.json")]
    store: PathBuf,

    /// Framework configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print outcomes as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log lifecycle events to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a new account
    Open {
        id: String,
        owner: String,
        /// Opening balance in cents
        #[arg(long)]
        initial: Option<String>,
    },

    /// Add money to an account
    Deposit { account: String, amount: String },

    /// Take money out of an account
    Withdraw { account: String, amount: String },

    /// Move money between accounts
    Transfer {
        from: String,
        to: String,
        amount: String,
    },

    /// Show one account
    Show { id: String },

    /// List every command with its inputs and possible errors
    Manifest,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.verbose {
        logging::init(Profile::Development);
    }

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<ForemanConfig>(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => ForemanConfig::default(),
    };
    let store = Arc::new(Store::open(&cli.store)?);
    let foreman = build(store.clone(), config)?;
    let json = cli.json;

    let code = match cli.command {
        Commands::Open { id, owner, initial } => {
            let mut inputs = json!({ "id": id, "owner": owner });
            if let Some(initial) = initial {
                inputs["initial"] = Value::String(initial);
            }
            execute::<OpenAccount>(&foreman, &store, inputs, json, describe_account)?
        }
        Commands::Deposit { account, amount } => execute::<Deposit>(
            &foreman,
            &store,
            json!({ "account": account, "amount": amount }),
            json,
            describe_account,
        )?,
        Commands::Withdraw { account, amount } => execute::<Withdraw>(
            &foreman,
            &store,
            json!({ "account": account, "amount": amount }),
            json,
            describe_account,
        )?,
        Commands::Transfer { from, to, amount } => execute::<Transfer>(
            &foreman,
            &store,
            json!({ "from": from, "to": to, "amount": amount }),
            json,
            describe_receipt,
        )?,
        Commands::Show { id } => {
            let outcome = foreman.run::<GetAccount>(json!({ "id": id }));
            report(&outcome, json, describe_account)?
        }
        Commands::Manifest => {
            println!("{}", serde_json::to_string_pretty(&manifest(&foreman))?);
            ExitCode::SUCCESS
        }
    };
    Ok(code)
}

/// Runs a command that changes balances and saves the ledger on success.
fn execute<C>(
    foreman: &Foreman,
    store: &Store,
    inputs: Value,
    json: bool,
    describe: fn(&C::Result) -> String,
) -> Result<ExitCode>
where
    C: Execute,
    C::Result: Serialize,
{
    let outcome = foreman.run::<C>(inputs);
    if outcome.is_success() {
        store.save()?;
    }
    report(&outcome, json, describe)
}

fn report<R: Serialize>(
    outcome: &Outcome<R>,
    json: bool,
    describe: fn(&R) -> String,
) -> Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        match outcome {
            Outcome::Success(result) => println!("{}", describe(result)),
            Outcome::Failure(errors) => {
                for record in errors {
                    eprintln!("{}: {}", record.key(), record.message);
                }
            }
        }
    }
    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn describe_account(account: &Account) -> String {
    format!(
        "{} ({}): {}.{:02}",
        account.id,
        account.owner,
        account.balance / 100,
        account.balance % 100
    )
}

fn describe_receipt(receipt: &TransferReceipt) -> String {
    format!(
        "moved {} cents\n  {}\n  {}",
        receipt.amount,
        describe_account(&receipt.from),
        describe_account(&receipt.to)
    )
}

fn manifest(foreman: &Foreman) -> Value {
    let commands: Vec<Value> = foreman
        .commands()
        .iter()
        .map(|metadata| {
            json!({
                "name": metadata.full_name(),
                "description": metadata.description,
                "inputs": metadata.inputs,
                "result": metadata.result,
                "errors": metadata.implied_errors(),
            })
        })
        .collect();
    let domains: Vec<Value> = foreman
        .domains()
        .domains()
        .iter()
        .map(|domain| {
            json!({
                "name": domain.full_name(),
                "depends_on": domain.dependencies,
                "commands": domain.commands,
            })
        })
        .collect();
    json!({ "commands": commands, "domains": domains })
}
