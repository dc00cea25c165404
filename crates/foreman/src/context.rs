//! The registry context every run goes through.
//!
//! A [`Foreman`] owns everything that would otherwise be process-wide: the
//! domain graph, the callback registries of each command type, command
//! metadata, configuration and shared application state. Tests build a
//! fresh one per case; applications build one at startup and clone the
//! handle wherever commands are run.
//!
//! ```rust,ignore
//! let foreman = Foreman::builder()
//!     .app_state(Repository::open(path)?)
//!     .max_subcommand_depth(16)
//!     .build()?;
//!
//! foreman.register::<OpenAccount>()?;
//! foreman.register::<Transfer>()?;
//! foreman.domains().declare_dependency("Payments", ["Accounts"])?;
//!
//! let outcome = foreman.run::<Transfer>(json!({"from": "a", "to": "b", "amount": 5}));
//! ```

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use foreman_domain::{DomainGraph, GLOBAL_DOMAIN};
use foreman_outcome::Outcome;

use crate::callbacks::CallbackRegistry;
use crate::command::{Command, Execute, ExecuteAsync};
use crate::error::ConfigurationError;
use crate::extensions::Extensions;
use crate::invocation::Invocation;
use crate::machine;
use crate::metadata::CommandMetadata;

/// Runtime switches.
///
/// Deserializable so applications can keep it in their own config files:
///
/// ```rust
/// use foreman::ForemanConfig;
///
/// let config: ForemanConfig = serde_json::from_str(r#"{"max_subcommand_depth": 8}"#).unwrap();
/// assert_eq!(config.max_subcommand_depth, 8);
/// assert!(config.enforce_domain_dependencies);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForemanConfig {
    /// Deny subcommand calls into domains the caller has not declared.
    pub enforce_domain_dependencies: bool,
    /// Count allowed cross-domain subcommand calls.
    pub track_cross_domain_calls: bool,
    /// Turn panics in bodies and callbacks into `execution_error`.
    pub catch_panics: bool,
    /// Deepest subcommand nesting allowed. Top-level runs are depth 0.
    pub max_subcommand_depth: usize,
}

impl Default for ForemanConfig {
    fn default() -> Self {
        Self {
            enforce_domain_dependencies: true,
            track_cross_domain_calls: true,
            catch_panics: true,
            max_subcommand_depth: 64,
        }
    }
}

struct Inner {
    config: ForemanConfig,
    domains: DomainGraph,
    callbacks: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    metadata: RwLock<HashMap<TypeId, Arc<CommandMetadata>>>,
    /// Registered commands by full name.
    commands: RwLock<BTreeMap<String, (TypeId, Arc<CommandMetadata>)>>,
    app_state: Arc<Extensions>,
}

/// Handle to a command registry context. Cloning is cheap and clones share
/// all state.
#[derive(Clone)]
pub struct Foreman {
    inner: Arc<Inner>,
}

impl Default for Foreman {
    fn default() -> Self {
        Self::from_parts(ForemanConfig::default(), Extensions::new())
    }
}

impl Foreman {
    /// A context with default configuration and no application state.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ForemanBuilder {
        ForemanBuilder::new()
    }

    fn from_parts(config: ForemanConfig, app_state: Extensions) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                domains: DomainGraph::new(),
                callbacks: RwLock::new(HashMap::new()),
                metadata: RwLock::new(HashMap::new()),
                commands: RwLock::new(BTreeMap::new()),
                app_state: Arc::new(app_state),
            }),
        }
    }

    pub fn config(&self) -> &ForemanConfig {
        &self.inner.config
    }

    /// The domain graph commands are governed by.
    pub fn domains(&self) -> &DomainGraph {
        &self.inner.domains
    }

    /// Registers `C` for discovery and places it in its domain.
    ///
    /// Registering the same type again is a no-op. Registering a different
    /// type under an already used full name fails, as does placing a domain
    /// in a different organization than it was first registered with.
    /// Commands in [`GLOBAL_DOMAIN`] join the built-in global domain.
    pub fn register<C: Command>(&self) -> Result<Arc<CommandMetadata>, ConfigurationError> {
        let metadata = self.metadata::<C>();
        let full_name = metadata.full_name();
        let type_id = TypeId::of::<C>();

        let mut commands = self.inner.commands.write();
        if let Some((existing, _)) = commands.get(&full_name) {
            if *existing != type_id {
                return Err(ConfigurationError::DuplicateCommand(full_name));
            }
            return Ok(metadata);
        }

        match (&metadata.domain, &metadata.organization) {
            (Some(domain), organization) => {
                // The global domain always exists and belongs to no organization.
                if domain != GLOBAL_DOMAIN {
                    self.inner
                        .domains
                        .register_domain(domain, organization.as_deref())?;
                } else if let Some(organization) = organization {
                    self.inner.domains.register_organization(organization);
                }
                self.inner.domains.register_command(domain, &metadata.name)?;
            }
            (None, Some(organization)) => self.inner.domains.register_organization(organization),
            (None, None) => {}
        }

        commands.insert(full_name.clone(), (type_id, metadata.clone()));
        tracing::debug!(
            component = module_path!(),
            op = "register_command",
            command = %full_name,
        );
        Ok(metadata)
    }

    /// The callback registry of `C`, created on first use.
    pub fn callbacks<C: Command>(&self) -> Arc<CallbackRegistry<Invocation<C>>> {
        let type_id = TypeId::of::<C>();
        let existing = self.inner.callbacks.read().get(&type_id).cloned();
        let registry = match existing {
            Some(registry) => registry,
            None => self
                .inner
                .callbacks
                .write()
                .entry(type_id)
                .or_insert_with(|| {
                    Arc::new(CallbackRegistry::<Invocation<C>>::new()) as Arc<dyn Any + Send + Sync>
                })
                .clone(),
        };
        // Entries are only ever inserted under their own type's id.
        registry
            .downcast::<CallbackRegistry<Invocation<C>>>()
            .unwrap_or_else(|_| Arc::new(CallbackRegistry::new()))
    }

    /// Metadata of `C`, built once per context.
    pub fn metadata<C: Command>(&self) -> Arc<CommandMetadata> {
        let type_id = TypeId::of::<C>();
        if let Some(metadata) = self.inner.metadata.read().get(&type_id) {
            return metadata.clone();
        }
        self.inner
            .metadata
            .write()
            .entry(type_id)
            .or_insert_with(|| Arc::new(C::metadata()))
            .clone()
    }

    /// Registered commands ordered by full name.
    pub fn commands(&self) -> Vec<Arc<CommandMetadata>> {
        self.inner
            .commands
            .read()
            .values()
            .map(|(_, metadata)| metadata.clone())
            .collect()
    }

    /// Looks up a registered command by full name (`Org::Domain::Name`).
    pub fn command(&self, full_name: &str) -> Option<Arc<CommandMetadata>> {
        self.inner
            .commands
            .read()
            .get(full_name)
            .map(|(_, metadata)| metadata.clone())
    }

    pub fn app_state<T: 'static>(&self) -> Option<&T> {
        self.inner.app_state.get::<T>()
    }

    /// Runs a blocking command once.
    pub fn run<C: Execute>(&self, inputs: Value) -> Outcome<C::Result> {
        self.run_nested::<C>(inputs, Vec::new(), 0)
    }

    /// Runs a suspending command once.
    pub fn run_async<C: ExecuteAsync>(&self, inputs: Value) -> BoxFuture<'static, Outcome<C::Result>> {
        self.run_nested_async::<C>(inputs, Vec::new(), 0)
    }

    pub(crate) fn run_nested<C: Execute>(
        &self,
        inputs: Value,
        runtime_path: Vec<String>,
        depth: usize,
    ) -> Outcome<C::Result> {
        let run = Invocation::new(self.clone(), self.metadata::<C>(), inputs, runtime_path, depth);
        let registry = self.callbacks::<C>();
        machine::drive(run, &registry)
    }

    pub(crate) fn run_nested_async<C: ExecuteAsync>(
        &self,
        inputs: Value,
        runtime_path: Vec<String>,
        depth: usize,
    ) -> BoxFuture<'static, Outcome<C::Result>> {
        let run = Invocation::new(self.clone(), self.metadata::<C>(), inputs, runtime_path, depth);
        let registry = self.callbacks::<C>();
        Box::pin(async move { machine::drive_async(run, &registry).await })
    }
}

impl fmt::Debug for Foreman {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Foreman")
            .field("config", &self.inner.config)
            .field("commands", &self.inner.commands.read().len())
            .field("callback_registries", &self.inner.callbacks.read().len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Foreman`].
#[derive(Debug, Default)]
pub struct ForemanBuilder {
    config: ForemanConfig,
    app_state: Extensions,
}

impl ForemanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration, e.g. one loaded from a file.
    pub fn config(mut self, config: ForemanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn enforce_domain_dependencies(mut self, enforce: bool) -> Self {
        self.config.enforce_domain_dependencies = enforce;
        self
    }

    pub fn track_cross_domain_calls(mut self, track: bool) -> Self {
        self.config.track_cross_domain_calls = track;
        self
    }

    pub fn catch_panics(mut self, catch: bool) -> Self {
        self.config.catch_panics = catch;
        self
    }

    pub fn max_subcommand_depth(mut self, depth: usize) -> Self {
        self.config.max_subcommand_depth = depth;
        self
    }

    /// Adds shared application state, readable from every run through
    /// [`Invocation::app_state`].
    ///
    /// One value per type; a later value of the same type replaces the
    /// earlier one.
    pub fn app_state<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.app_state.insert(value);
        self
    }

    pub fn build(self) -> Result<Foreman, ConfigurationError> {
        if self.config.max_subcommand_depth == 0 {
            return Err(ConfigurationError::Invalid(
                "max_subcommand_depth must be at least 1".to_string(),
            ));
        }
        Ok(Foreman::from_parts(self.config, self.app_state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Execution, NoInputs};

    struct Ping;

    impl Command for Ping {
        type Inputs = NoInputs;
        type Result = &'static str;

        fn metadata() -> CommandMetadata {
            CommandMetadata::new("Ping").domain("Health").organization("Ops")
        }
    }

    impl Execute for Ping {
        fn execute(_run: &mut Invocation<Self>) -> Execution<&'static str> {
            Ok("pong")
        }
    }

    struct OtherPing;

    impl Command for OtherPing {
        type Inputs = NoInputs;
        type Result = ();

        fn metadata() -> CommandMetadata {
            CommandMetadata::new("Ping").domain("Health").organization("Ops")
        }
    }

    #[test]
    fn test_register_places_command_in_domain() {
        let foreman = Foreman::new();
        let metadata = foreman.register::<Ping>().unwrap();
        assert_eq!(metadata.full_name(), "Ops::Health::Ping");
        assert_eq!(foreman.domains().domain_of_command("Ping").as_deref(), Some("Health"));
        assert!(foreman.command("Ops::Health::Ping").is_some());

        // Idempotent for the same type.
        foreman.register::<Ping>().unwrap();
        assert_eq!(foreman.commands().len(), 1);
    }

    struct Now;

    impl Command for Now {
        type Inputs = NoInputs;
        type Result = ();

        fn metadata() -> CommandMetadata {
            CommandMetadata::new("Now").domain(GLOBAL_DOMAIN)
        }
    }

    #[test]
    fn test_register_into_global_domain() {
        let foreman = Foreman::new();
        foreman.register::<Now>().unwrap();
        foreman.register::<Ping>().unwrap();

        let global = foreman.domains().domain(GLOBAL_DOMAIN).unwrap();
        assert!(global.commands.contains("Now"));
        assert!(foreman.domains().can_call("Health", GLOBAL_DOMAIN));
    }

    #[test]
    fn test_duplicate_full_name_rejected() {
        let foreman = Foreman::new();
        foreman.register::<Ping>().unwrap();
        assert_eq!(
            foreman.register::<OtherPing>().unwrap_err(),
            ConfigurationError::DuplicateCommand("Ops::Health::Ping".into())
        );
    }

    #[test]
    fn test_callback_registry_is_per_type_and_shared_by_clones() {
        let foreman = Foreman::new();
        let clone = foreman.clone();
        foreman
            .callbacks::<Ping>()
            .register_before("execute", |_run| {})
            .unwrap();
        assert_eq!(clone.callbacks::<Ping>().len(), 1);
        assert!(foreman.callbacks::<OtherPing>().is_empty());
    }

    #[test]
    fn test_contexts_are_isolated() {
        let first = Foreman::new();
        let second = Foreman::new();
        first
            .callbacks::<Ping>()
            .register_before("execute", |_run| {})
            .unwrap();
        assert!(second.callbacks::<Ping>().is_empty());
    }

    #[test]
    fn test_builder_rejects_zero_depth() {
        assert!(matches!(
            Foreman::builder().max_subcommand_depth(0).build(),
            Err(ConfigurationError::Invalid(_))
        ));
    }

    #[test]
    fn test_app_state() {
        struct Greeting(&'static str);
        let foreman = Foreman::builder().app_state(Greeting("hi")).build().unwrap();
        assert_eq!(foreman.app_state::<Greeting>().map(|g| g.0), Some("hi"));
        assert!(foreman.app_state::<u32>().is_none());
    }

    #[test]
    fn test_run_shortcut() {
        let foreman = Foreman::new();
        assert_eq!(Ping::run(&foreman, Value::Null).unwrap(), "pong");
    }
}
