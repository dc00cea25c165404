//! A small bank ledger built on `foreman`.
//!
//! Two domains in the `Bank` organization:
//!
//! - `Accounts` owns balances: [`OpenAccount`], [`GetAccount`],
//!   [`AdjustBalance`]
//! - `Payments` moves money: [`Deposit`], [`Withdraw`], [`Transfer`]
//!
//! `Payments` declares a dependency on `Accounts` and reaches balances only
//! through subcommands. Auditing and id normalization are callbacks
//! (see [`audit`]).

pub mod accounts;
pub mod audit;
pub mod payments;
pub mod store;

use std::sync::Arc;

use anyhow::Result;
use foreman::{Command, Execution, Foreman, ForemanConfig, Interrupt, Invocation};

pub use accounts::{AdjustBalance, GetAccount, OpenAccount};
pub use audit::{AuditEntry, AuditTrail};
pub use payments::{Deposit, Transfer, TransferReceipt, Withdraw};
pub use store::{Account, Ledger, Store};

pub const BANK: &str = "Bank";
pub const NOT_FOUND: &str = "not_found";

/// Builds a framework instance with every ledger command registered and
/// the domain dependencies declared.
pub fn build(store: Arc<Store>, config: ForemanConfig) -> Result<Foreman> {
    let foreman = Foreman::builder()
        .config(config)
        .app_state(store)
        .app_state(Arc::new(AuditTrail::default()))
        .build()?;

    foreman.register::<OpenAccount>()?;
    foreman.register::<GetAccount>()?;
    foreman.register::<AdjustBalance>()?;
    foreman.register::<Deposit>()?;
    foreman.register::<Withdraw>()?;
    foreman.register::<Transfer>()?;

    foreman
        .domains()
        .declare_dependency(payments::DOMAIN, [accounts::DOMAIN])?;

    audit::audit::<Deposit>(&foreman)?;
    audit::audit::<Withdraw>(&foreman)?;
    audit::audit::<Transfer>(&foreman)?;
    audit::normalize_ids::<OpenAccount>(&foreman, &["id"])?;
    audit::normalize_ids::<GetAccount>(&foreman, &["id"])?;
    audit::normalize_ids::<Deposit>(&foreman, &["account"])?;
    audit::normalize_ids::<Withdraw>(&foreman, &["account"])?;
    audit::normalize_ids::<Transfer>(&foreman, &["from", "to"])?;

    tracing::debug!(
        component = module_path!(),
        op = "build",
        commands = foreman.commands().len(),
    );
    Ok(foreman)
}

/// The store a run works against.
pub(crate) fn store<C: Command>(run: &Invocation<C>) -> Execution<Arc<Store>> {
    run.app_state::<Arc<Store>>()
        .cloned()
        .ok_or_else(|| Interrupt::fault(anyhow::anyhow!("no ledger store in app state")))
}
