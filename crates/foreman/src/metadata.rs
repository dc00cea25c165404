//! Command metadata for discovery.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::schema::InputSchema;
use crate::symbols;

/// Everything a discovery collaborator (manifest, help, MCP tool listing)
/// needs to know about a command without running it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandMetadata {
    pub name: String,
    pub description: Option<String>,
    pub domain: Option<String>,
    pub organization: Option<String>,
    pub inputs: InputSchema,
    /// Free-form description of the result shape.
    pub result: Option<String>,
    /// Runtime error symbols the command documents.
    pub possible_errors: BTreeSet<String>,
}

impl CommandMetadata {
    /// Metadata with an open input schema and no domain.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            domain: None,
            organization: None,
            inputs: InputSchema::open(),
            result: None,
            possible_errors: BTreeSet::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn inputs(mut self, inputs: InputSchema) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn possible_error(mut self, symbol: impl Into<String>) -> Self {
        self.possible_errors.insert(symbol.into());
        self
    }

    /// `Organization::Domain::Name`, omitting absent parts.
    pub fn full_name(&self) -> String {
        [
            self.organization.as_deref(),
            self.domain.as_deref(),
            Some(self.name.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("::")
    }

    /// Every symbol a run of this command can produce: documented runtime
    /// errors, data errors implied by the input schema, and
    /// `execution_error`.
    pub fn implied_errors(&self) -> BTreeSet<String> {
        let mut all: BTreeSet<String> = self.possible_errors.clone();
        all.extend(
            self.inputs
                .implied_errors()
                .into_iter()
                .map(str::to_string),
        );
        all.insert(symbols::EXECUTION_ERROR.to_string());
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;

    #[test]
    fn test_full_name() {
        let bare = CommandMetadata::new("Ping");
        assert_eq!(bare.full_name(), "Ping");

        let scoped = CommandMetadata::new("Deposit")
            .domain("Accounts")
            .organization("Bank");
        assert_eq!(scoped.full_name(), "Bank::Accounts::Deposit");
    }

    #[test]
    fn test_implied_errors_merge_sources() {
        let metadata = CommandMetadata::new("Withdraw")
            .inputs(InputSchema::new().field(Field::integer("amount").required().min(1.0)))
            .possible_error("insufficient_funds");

        let implied: Vec<_> = metadata.implied_errors().into_iter().collect();
        assert_eq!(
            implied,
            vec![
                "cannot_cast",
                "execution_error",
                "insufficient_funds",
                "missing_required_attribute",
                "too_small",
                "unexpected_attribute",
            ]
        );
    }

    #[test]
    fn test_serializes() {
        let metadata = CommandMetadata::new("Ping").description("Health check");
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["name"], "Ping");
        assert_eq!(json["description"], "Health check");
        assert_eq!(json["inputs"]["allow_unknown"], true);
    }
}
