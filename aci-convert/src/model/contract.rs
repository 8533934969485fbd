//! Contracts, subjects, and filters.

use serde::Serialize;

/// A traffic policy between EPGs (vzBrCP), or a taboo policy (vzTaboo).
///
/// Synthesis compiles each contract into exactly one named ACL; a contract
/// with no subjects compiles to nothing at all.
#[derive(Debug, Clone)]
pub struct Contract {
    /// Canonical `tenant:name` key.
    pub name: String,
    pub tenant: String,
    pub scope: Option<String>,
    pub description: Option<String>,
    pub subjects: Vec<Subject>,
}

impl Contract {
    pub fn new(name: String, tenant: String) -> Self {
        Self {
            name,
            tenant,
            scope: None,
            description: None,
            subjects: Vec::new(),
        }
    }

    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }
}

/// One subject (vzSubj) grouping filter references under a contract.
#[derive(Debug, Clone, Default)]
pub struct Subject {
    pub name: Option<String>,
    /// When set, every rule the subject generates also applies with source
    /// and destination ports swapped, so return traffic matches.
    pub reverse_filter_ports: bool,
    pub filters: Vec<FilterRef>,
}

/// A subject's reference to a filter (vzRsSubjFiltAtt).
///
/// The reference may point at a tenant filter definition, carry inline match
/// attributes, or both. `resolved` is set at the resolver barrier when the
/// named definition exists.
#[derive(Debug, Clone)]
pub struct FilterRef {
    /// Local filter name as written in the subject; empty for purely inline
    /// references.
    pub name: String,
    /// Canonical key of the filter definition, when it exists.
    pub resolved: Option<String>,
    pub action: FilterAction,
    /// Inline protocol (`tcp`, `udp`, `icmp`, a number) for references with
    /// no definition.
    pub ip_protocol: Option<String>,
    /// Inline destination ports for references with no definition.
    pub dst_ports: Vec<String>,
}

impl FilterRef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            resolved: None,
            action: FilterAction::Permit,
            ip_protocol: None,
            dst_ports: Vec::new(),
        }
    }
}

/// Whether matched traffic is allowed through or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterAction {
    Permit,
    Deny,
}

impl FilterAction {
    /// APIC exports write `deny` explicitly; anything else permits.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("deny") => FilterAction::Deny,
            _ => FilterAction::Permit,
        }
    }
}

/// A reusable filter definition (vzFilter) owned by a tenant.
#[derive(Debug, Clone)]
pub struct Filter {
    /// Canonical `tenant:name` key.
    pub name: String,
    pub tenant: String,
    pub description: Option<String>,
    pub entries: Vec<FilterEntry>,
}

impl Filter {
    pub fn new(name: String, tenant: String) -> Self {
        Self {
            name,
            tenant,
            description: None,
            entries: Vec::new(),
        }
    }

    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }
}

/// One match line inside a filter (vzEntry). All fields are kept exactly as
/// exported; normalization happens during ACL synthesis.
#[derive(Debug, Clone, Default)]
pub struct FilterEntry {
    pub name: Option<String>,
    pub ether_type: Option<String>,
    pub protocol: Option<String>,
    /// Single destination port (`dPort`); ranges use the from/to pair.
    pub dst_port: Option<String>,
    pub dst_from_port: Option<String>,
    pub dst_to_port: Option<String>,
    pub src_port: Option<String>,
    pub src_from_port: Option<String>,
    pub src_to_port: Option<String>,
    pub icmp_type: Option<String>,
    pub icmp_code: Option<String>,
    pub stateful: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_action_defaults_to_permit() {
        assert_eq!(FilterAction::parse(None), FilterAction::Permit);
        assert_eq!(FilterAction::parse(Some("permit")), FilterAction::Permit);
        assert_eq!(FilterAction::parse(Some("deny")), FilterAction::Deny);
    }

    #[test]
    fn contract_local_name_strips_tenant() {
        let contract = Contract::new("t1:allow-web".to_string(), "t1".to_string());
        assert_eq!(contract.local_name(), "allow-web");
    }
}
