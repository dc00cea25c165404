//! JSON-file persistence for accounts.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub owner: String,
    /// Balance in cents.
    pub balance: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub accounts: BTreeMap<String, Account>,
}

/// The ledger plus the file it was loaded from.
///
/// Commands mutate the in-memory copy; callers decide when to [`save`](Store::save).
#[derive(Debug)]
pub struct Store {
    path: Option<PathBuf>,
    ledger: Mutex<Ledger>,
}

impl Store {
    /// An unsaved store, for tests and dry runs.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Loads `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ledger = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading ledger {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing ledger {}", path.display()))?
        } else {
            Ledger::default()
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            ledger: Mutex::new(ledger),
        })
    }

    pub fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock()
    }

    pub fn account(&self, id: &str) -> Option<Account> {
        self.ledger.lock().accounts.get(id).cloned()
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&*self.ledger.lock())?;
        fs::write(path, json).with_context(|| format!("writing ledger {}", path.display()))?;
        tracing::debug!(component = module_path!(), op = "save", path = %path.display());
        Ok(())
    }
}
