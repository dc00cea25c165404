//! The domain registry and dependency graph.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::calls::{CallPair, CrossDomainCalls};
use crate::error::DomainError;

/// Name of the implicit domain every domain may call into.
pub const GLOBAL_DOMAIN: &str = "Global";

/// A named group of commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Domain {
    pub name: String,
    pub organization: Option<String>,
    /// Directly declared dependencies. Never contains the domain itself or
    /// the global domain, both of which are implicit.
    pub dependencies: BTreeSet<String>,
    pub commands: BTreeSet<String>,
}

impl Domain {
    fn new(name: &str, organization: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            organization: organization.map(str::to_string),
            dependencies: BTreeSet::new(),
            commands: BTreeSet::new(),
        }
    }

    /// Returns `Organization::Domain`, or just the domain name.
    pub fn full_name(&self) -> String {
        match &self.organization {
            Some(organization) => format!("{}::{}", organization, self.name),
            None => self.name.clone(),
        }
    }

    /// Returns true if this domain directly depends on `other`.
    pub fn depends_on(&self, other: &str) -> bool {
        self.dependencies.contains(other)
    }

    pub fn is_global(&self) -> bool {
        self.name == GLOBAL_DOMAIN
    }
}

/// A named group of domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Organization {
    pub name: String,
    pub domains: BTreeSet<String>,
}

#[derive(Debug)]
struct GraphState {
    domains: BTreeMap<String, Domain>,
    organizations: BTreeMap<String, Organization>,
}

impl Default for GraphState {
    fn default() -> Self {
        let mut domains = BTreeMap::new();
        domains.insert(
            GLOBAL_DOMAIN.to_string(),
            Domain::new(GLOBAL_DOMAIN, None),
        );
        Self {
            domains,
            organizations: BTreeMap::new(),
        }
    }
}

impl GraphState {
    fn require(&self, name: &str) -> Result<&Domain, DomainError> {
        self.domains
            .get(name)
            .ok_or_else(|| DomainError::UnknownDomain(name.to_string()))
    }

    /// Depth-first search for a path `from -> ... -> to` over declared edges
    /// plus `pending` edges out of `pending_owner`.
    fn find_path(
        &self,
        from: &str,
        to: &str,
        pending_owner: &str,
        pending: &BTreeSet<String>,
    ) -> Option<Vec<String>> {
        let mut stack = vec![vec![from.to_string()]];
        let mut visited = BTreeSet::new();

        while let Some(path) = stack.pop() {
            let current = match path.last() {
                Some(current) => current.clone(),
                None => continue,
            };
            if current == to {
                return Some(path);
            }
            if !visited.insert(current.clone()) {
                continue;
            }

            let declared = self.domains.get(&current).map(|d| &d.dependencies);
            let extra = (current == pending_owner).then_some(pending);
            for next in declared.into_iter().chain(extra).flatten() {
                if !visited.contains(next) {
                    let mut extended = path.clone();
                    extended.push(next.clone());
                    stack.push(extended);
                }
            }
        }
        None
    }
}

/// Registry of organizations and domains, with dependency enforcement and
/// cross-domain call tracking.
///
/// All graph mutations take a single write lock and are computed before
/// being committed, so a failed declaration leaves no partial edges.
#[derive(Debug, Default)]
pub struct DomainGraph {
    state: RwLock<GraphState>,
    calls: CrossDomainCalls,
}

impl DomainGraph {
    /// Creates a graph containing only the global domain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an organization. Registering an existing one is a no-op.
    pub fn register_organization(&self, name: &str) {
        let mut state = self.state.write();
        state
            .organizations
            .entry(name.to_string())
            .or_insert_with(|| Organization {
                name: name.to_string(),
                domains: BTreeSet::new(),
            });
    }

    /// Registers a domain, creating its organization if needed.
    ///
    /// Re-registering a domain with the same organization returns the
    /// existing domain unchanged.
    pub fn register_domain(
        &self,
        name: &str,
        organization: Option<&str>,
    ) -> Result<Domain, DomainError> {
        if name == GLOBAL_DOMAIN {
            return Err(DomainError::ReservedName(name.to_string()));
        }

        let mut state = self.state.write();
        if let Some(existing) = state.domains.get(name) {
            if existing.organization.as_deref() != organization {
                return Err(DomainError::OrganizationConflict {
                    domain: name.to_string(),
                    existing: existing.organization.clone(),
                    requested: organization.map(str::to_string),
                });
            }
            return Ok(existing.clone());
        }

        if let Some(organization) = organization {
            state
                .organizations
                .entry(organization.to_string())
                .or_insert_with(|| Organization {
                    name: organization.to_string(),
                    domains: BTreeSet::new(),
                })
                .domains
                .insert(name.to_string());
        }

        let domain = Domain::new(name, organization);
        state.domains.insert(name.to_string(), domain.clone());
        tracing::debug!(
            component = module_path!(),
            op = "register_domain",
            domain = name,
            organization = organization.unwrap_or(""),
        );
        Ok(domain)
    }

    /// Records that a command belongs to a domain.
    pub fn register_command(&self, domain: &str, command: &str) -> Result<(), DomainError> {
        let mut state = self.state.write();
        let entry = state
            .domains
            .get_mut(domain)
            .ok_or_else(|| DomainError::UnknownDomain(domain.to_string()))?;
        entry.commands.insert(command.to_string());
        Ok(())
    }

    /// Declares that `domain` depends on each of `dependencies`.
    ///
    /// Dependencies on the domain itself or on the global domain are implicit
    /// and ignored. Before anything is committed, a depth-first search from
    /// each new target back to `domain` checks for cycles, including through
    /// edges accepted earlier in the same call. On error nothing changes.
    pub fn declare_dependency<I, S>(&self, domain: &str, dependencies: I) -> Result<(), DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if domain == GLOBAL_DOMAIN {
            return Err(DomainError::GlobalCannotDepend);
        }

        let mut state = self.state.write();
        state.require(domain)?;

        let mut accepted = BTreeSet::new();
        for dependency in dependencies {
            let dependency = dependency.as_ref();
            state.require(dependency)?;
            if dependency == domain || dependency == GLOBAL_DOMAIN {
                continue;
            }
            if let Some(mut path) = state.find_path(dependency, domain, domain, &accepted) {
                path.insert(0, domain.to_string());
                tracing::warn!(
                    component = module_path!(),
                    op = "declare_dependency",
                    domain,
                    dependency,
                    cycle = %path.join(" -> "),
                    "rejected dependency cycle"
                );
                return Err(DomainError::Cycle {
                    domain: domain.to_string(),
                    dependency: dependency.to_string(),
                    path,
                });
            }
            accepted.insert(dependency.to_string());
        }

        if let Some(entry) = state.domains.get_mut(domain) {
            for dependency in &accepted {
                tracing::debug!(
                    component = module_path!(),
                    op = "declare_dependency",
                    domain,
                    dependency = dependency.as_str(),
                );
            }
            entry.dependencies.extend(accepted);
        }
        Ok(())
    }

    /// Returns true if a command in `from` may call a command in `to`.
    ///
    /// Only direct dependencies grant permission.
    pub fn can_call(&self, from: &str, to: &str) -> bool {
        if from == to || to == GLOBAL_DOMAIN {
            return true;
        }
        self.state
            .read()
            .domains
            .get(from)
            .is_some_and(|domain| domain.depends_on(to))
    }

    /// Counts a call from `from` into `to`. Same-domain calls are skipped.
    pub fn track_cross_domain_call(&self, from: &str, to: &str) {
        self.calls.track(from, to);
    }

    /// Returns the number of tracked calls from `from` into `to`.
    pub fn call_count(&self, from: &str, to: &str) -> u64 {
        self.calls.count(from, to)
    }

    /// Returns a snapshot of all cross-domain call counters.
    pub fn cross_domain_calls(&self) -> BTreeMap<CallPair, u64> {
        self.calls.snapshot()
    }

    pub fn reset_call_counts(&self) {
        self.calls.reset();
    }

    /// Returns a copy of a domain.
    pub fn domain(&self, name: &str) -> Option<Domain> {
        self.state.read().domains.get(name).cloned()
    }

    /// Returns copies of all domains, sorted by name.
    pub fn domains(&self) -> Vec<Domain> {
        self.state.read().domains.values().cloned().collect()
    }

    pub fn organization(&self, name: &str) -> Option<Organization> {
        self.state.read().organizations.get(name).cloned()
    }

    pub fn organizations(&self) -> Vec<Organization> {
        self.state.read().organizations.values().cloned().collect()
    }

    /// Returns the direct dependencies of a domain.
    pub fn dependencies(&self, name: &str) -> Option<BTreeSet<String>> {
        self.state
            .read()
            .domains
            .get(name)
            .map(|domain| domain.dependencies.clone())
    }

    /// Returns every domain reachable from `name` through declared edges.
    pub fn transitive_dependencies(&self, name: &str) -> BTreeSet<String> {
        let state = self.state.read();
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&String> = state
            .domains
            .get(name)
            .map(|d| d.dependencies.iter().collect())
            .unwrap_or_default();

        while let Some(next) = stack.pop() {
            if seen.insert(next.clone()) {
                if let Some(domain) = state.domains.get(next) {
                    stack.extend(domain.dependencies.iter());
                }
            }
        }
        seen
    }

    /// Returns the domain a command was registered under.
    pub fn domain_of_command(&self, command: &str) -> Option<String> {
        self.state
            .read()
            .domains
            .values()
            .find(|domain| domain.commands.contains(command))
            .map(|domain| domain.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(names: &[&str]) -> DomainGraph {
        let graph = DomainGraph::new();
        for name in names {
            graph.register_domain(name, None).unwrap();
        }
        graph
    }

    #[test]
    fn test_global_domain_exists() {
        let graph = DomainGraph::new();
        let global = graph.domain(GLOBAL_DOMAIN).unwrap();
        assert!(global.is_global());
        assert!(global.dependencies.is_empty());
    }

    #[test]
    fn test_global_name_is_reserved() {
        let graph = DomainGraph::new();
        assert_eq!(
            graph.register_domain(GLOBAL_DOMAIN, None),
            Err(DomainError::ReservedName(GLOBAL_DOMAIN.to_string()))
        );
    }

    #[test]
    fn test_register_domain_is_idempotent() {
        let graph = DomainGraph::new();
        graph.register_domain("Accounts", Some("Bank")).unwrap();
        let again = graph.register_domain("Accounts", Some("Bank")).unwrap();
        assert_eq!(again.full_name(), "Bank::Accounts");
        assert_eq!(graph.domains().len(), 2);
    }

    #[test]
    fn test_register_domain_organization_conflict() {
        let graph = DomainGraph::new();
        graph.register_domain("Accounts", Some("Bank")).unwrap();
        let err = graph.register_domain("Accounts", Some("Shop")).unwrap_err();
        assert!(matches!(err, DomainError::OrganizationConflict { .. }));
    }

    #[test]
    fn test_organization_tracks_domains() {
        let graph = DomainGraph::new();
        graph.register_domain("Accounts", Some("Bank")).unwrap();
        graph.register_domain("Payments", Some("Bank")).unwrap();

        let bank = graph.organization("Bank").unwrap();
        assert_eq!(bank.domains.len(), 2);
        assert!(bank.domains.contains("Payments"));
    }

    #[test]
    fn test_can_call_rules() {
        let graph = graph_with(&["A", "B", "C"]);
        graph.declare_dependency("A", ["B"]).unwrap();

        assert!(graph.can_call("A", "A"));
        assert!(graph.can_call("A", GLOBAL_DOMAIN));
        assert!(graph.can_call("A", "B"));
        assert!(!graph.can_call("B", "A"));
        assert!(!graph.can_call("A", "C"));
        assert!(!graph.can_call("Unknown", "A"));
    }

    #[test]
    fn test_call_permission_is_not_transitive() {
        let graph = graph_with(&["A", "B", "C"]);
        graph.declare_dependency("A", ["B"]).unwrap();
        graph.declare_dependency("B", ["C"]).unwrap();

        assert!(!graph.can_call("A", "C"));
        assert!(graph.transitive_dependencies("A").contains("C"));
    }

    #[test]
    fn test_cycle_detection_is_transitive() {
        let graph = graph_with(&["A", "B", "C"]);
        graph.declare_dependency("A", ["B"]).unwrap();
        graph.declare_dependency("B", ["C"]).unwrap();

        let err = graph.declare_dependency("C", ["A"]).unwrap_err();
        match err {
            DomainError::Cycle { path, .. } => {
                assert_eq!(path, vec!["C", "A", "B", "C"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(graph.dependencies("C").unwrap().is_empty());
    }

    #[test]
    fn test_failed_declaration_is_atomic() {
        let graph = graph_with(&["A", "B", "C"]);
        graph.declare_dependency("B", ["A"]).unwrap();

        // C is fine, A closes a cycle: neither edge may land.
        assert!(graph.declare_dependency("A", ["C", "B"]).is_err());
        assert!(graph.dependencies("A").unwrap().is_empty());
    }

    #[test]
    fn test_cycle_through_edges_in_same_declaration() {
        let graph = graph_with(&["A", "B"]);
        graph.declare_dependency("B", ["A"]).unwrap();
        assert!(graph.declare_dependency("A", ["B"]).is_err());
    }

    #[test]
    fn test_self_and_global_dependencies_are_implicit() {
        let graph = graph_with(&["A"]);
        graph.declare_dependency("A", ["A", GLOBAL_DOMAIN]).unwrap();
        assert!(graph.dependencies("A").unwrap().is_empty());
    }

    #[test]
    fn test_global_cannot_depend() {
        let graph = graph_with(&["A"]);
        assert_eq!(
            graph.declare_dependency(GLOBAL_DOMAIN, ["A"]),
            Err(DomainError::GlobalCannotDepend)
        );
    }

    #[test]
    fn test_unknown_dependency_is_rejected() {
        let graph = graph_with(&["A"]);
        assert_eq!(
            graph.declare_dependency("A", ["Nope"]),
            Err(DomainError::UnknownDomain("Nope".to_string()))
        );
    }

    #[test]
    fn test_commands_are_recorded() {
        let graph = graph_with(&["Accounts"]);
        graph.register_command("Accounts", "OpenAccount").unwrap();
        assert_eq!(
            graph.domain_of_command("OpenAccount").as_deref(),
            Some("Accounts")
        );
        assert!(graph.register_command("Nope", "X").is_err());
    }
}
