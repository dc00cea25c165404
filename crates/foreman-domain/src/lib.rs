//! Domain dependency graph for command governance.
//!
//! Commands are grouped into named domains, which may in turn belong to an
//! organization. A domain declares which other domains it depends on, and a
//! command may only call into its own domain, the implicit [`GLOBAL_DOMAIN`],
//! or a domain it directly depends on.
//!
//! # Rules
//!
//! - The dependency relation (plus implicit self-edges and the implicit
//!   global domain) is acyclic. A declaration that would close a cycle is
//!   rejected and leaves the graph untouched.
//! - Cycle detection follows edges transitively; call permission does not.
//!   If `Billing` depends on `Accounts` and `Accounts` depends on `Users`,
//!   `Billing` still may not call `Users` directly.
//! - Readers never observe half of a declaration: all of a domain's new
//!   edges become visible together.
//!
//! # Example
//!
//! ```rust
//! use foreman_domain::DomainGraph;
//!
//! let graph = DomainGraph::new();
//! graph.register_domain("Accounts", Some("Bank")).unwrap();
//! graph.register_domain("Payments", Some("Bank")).unwrap();
//!
//! assert!(!graph.can_call("Payments", "Accounts"));
//! graph.declare_dependency("Payments", ["Accounts"]).unwrap();
//! assert!(graph.can_call("Payments", "Accounts"));
//!
//! // The reverse edge would create a cycle.
//! assert!(graph.declare_dependency("Accounts", ["Payments"]).is_err());
//! ```

mod calls;
mod error;
mod graph;

pub use calls::{CallPair, CrossDomainCalls};
pub use error::DomainError;
pub use graph::{Domain, DomainGraph, Organization, GLOBAL_DOMAIN};
