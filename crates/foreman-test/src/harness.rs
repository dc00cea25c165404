//! Isolated framework instances.

use std::ops::Deref;

use foreman::{Command, Execute, ExecuteAsync, Foreman, ForemanBuilder, Outcome};
use serde_json::Value;
use tempfile::TempDir;

use crate::recorder::CallLog;

/// A [`Foreman`] owned by one test.
///
/// Dereferences to the wrapped `Foreman`, so everything it offers is
/// available directly. Setup helpers panic on misconfiguration, since a
/// broken fixture should fail the test that built it.
#[derive(Debug, Clone, Default)]
pub struct TestForeman {
    foreman: Foreman,
}

impl TestForeman {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the instance from a customized builder.
    ///
    /// # Panics
    ///
    /// Panics if the builder's configuration is rejected.
    pub fn from_builder(builder: ForemanBuilder) -> Self {
        match builder.build() {
            Ok(foreman) => Self { foreman },
            Err(err) => panic!("invalid test configuration: {}", err),
        }
    }

    /// Registers `C` and its domain.
    ///
    /// # Panics
    ///
    /// Panics if the command cannot be registered.
    pub fn with_command<C: Command>(self) -> Self {
        self.register_command::<C>();
        self
    }

    /// Registers `C` and its domain, for harnesses held by reference.
    ///
    /// # Panics
    ///
    /// Panics if the command cannot be registered.
    pub fn register_command<C: Command>(&self) {
        if let Err(err) = self.foreman.register::<C>() {
            panic!("cannot register {}: {}", std::any::type_name::<C>(), err);
        }
    }

    /// Declares that `domain` depends on `dependencies`.
    ///
    /// # Panics
    ///
    /// Panics if a domain is unknown or the declaration closes a cycle.
    pub fn with_dependency<const N: usize>(self, domain: &str, dependencies: [&str; N]) -> Self {
        if let Err(err) = self.foreman.domains().declare_dependency(domain, dependencies) {
            panic!("cannot declare {} dependencies: {}", domain, err);
        }
        self
    }

    /// Attaches a [`CallLog`] to every transition of `C`.
    pub fn record<C: Command>(&self) -> CallLog {
        CallLog::attach::<C>(&self.foreman)
    }

    pub fn run<C: Execute>(&self, inputs: Value) -> Outcome<C::Result> {
        self.foreman.run::<C>(inputs)
    }

    pub async fn run_async<C: ExecuteAsync>(&self, inputs: Value) -> Outcome<C::Result> {
        self.foreman.run_async::<C>(inputs).await
    }

    pub fn foreman(&self) -> &Foreman {
        &self.foreman
    }

    /// A temporary directory removed when the returned guard drops, for
    /// commands that persist state to disk.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    pub fn scratch_dir(&self) -> TempDir {
        match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(err) => panic!("cannot create scratch directory: {}", err),
        }
    }
}

impl Deref for TestForeman {
    type Target = Foreman;

    fn deref(&self) -> &Foreman {
        &self.foreman
    }
}

impl From<Foreman> for TestForeman {
    fn from(foreman: Foreman) -> Self {
        Self { foreman }
    }
}
