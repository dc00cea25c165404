//! Error types for the domain graph.

use thiserror::Error;

/// Errors raised when registering domains or declaring dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The named domain has not been registered.
    #[error("unknown domain '{0}'")]
    UnknownDomain(String),

    /// The name is reserved for the implicit global domain.
    #[error("'{0}' is reserved for the global domain")]
    ReservedName(String),

    /// The domain is already registered under a different organization.
    #[error("domain '{domain}' already belongs to organization {existing:?}, not {requested:?}")]
    OrganizationConflict {
        domain: String,
        existing: Option<String>,
        requested: Option<String>,
    },

    /// The global domain cannot depend on anything.
    #[error("the global domain cannot declare dependencies")]
    GlobalCannotDepend,

    /// The declaration would close a dependency cycle.
    #[error("declaring {domain} -> {dependency} would create a cycle: {}", path.join(" -> "))]
    Cycle {
        domain: String,
        dependency: String,
        /// The cycle, starting and ending at `domain`.
        path: Vec<String>,
    },
}
