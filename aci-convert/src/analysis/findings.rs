//! Finding value objects shared by the static analyzers.
//!
//! Every finding family splits into a key struct and a text payload. The key
//! carries severity, category, and the subject fields that identify what the
//! finding is about; equality and hashing are defined over the key alone, so
//! two analyzers reaching the same conclusion through different code paths
//! collapse into one finding. Description, impact, and recommendation live in
//! the payload and never participate in equality.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Ranked severity, lowest first so `Ord` sorts escalating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// Free-text portion of a finding, excluded from equality and hashing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FindingPayload {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub impact: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubnetCategory {
    NoSubnet,
    InvalidFormat,
    Duplicate,
    OverlapSameVrf,
}

impl SubnetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubnetCategory::NoSubnet => "NO_SUBNET",
            SubnetCategory::InvalidFormat => "INVALID_FORMAT",
            SubnetCategory::Duplicate => "DUPLICATE",
            SubnetCategory::OverlapSameVrf => "OVERLAP_SAME_VRF",
        }
    }
}

/// Identity of a subnet finding: the bridge domain(s), VRF(s), and subnet
/// text involved. Single-subject categories leave the second triple unset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SubnetFindingKey {
    pub severity: Severity,
    pub category: SubnetCategory,
    pub bd1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vrf1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bd2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vrf2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet2: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubnetFinding {
    #[serde(flatten)]
    pub key: SubnetFindingKey,
    #[serde(flatten)]
    pub payload: FindingPayload,
}

impl SubnetFinding {
    pub fn severity(&self) -> Severity {
        self.key.severity
    }

    pub fn category_name(&self) -> &'static str {
        self.key.category.as_str()
    }
}

impl PartialEq for SubnetFinding {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for SubnetFinding {}

impl Hash for SubnetFinding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VrfIsolationCategory {
    SubnetOverlap,
    CrossVrfContract,
    UnusedVrf,
    L3outScope,
}

impl VrfIsolationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            VrfIsolationCategory::SubnetOverlap => "SUBNET_OVERLAP",
            VrfIsolationCategory::CrossVrfContract => "CROSS_VRF_CONTRACT",
            VrfIsolationCategory::UnusedVrf => "UNUSED_VRF",
            VrfIsolationCategory::L3outScope => "L3OUT_SCOPE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VrfIsolationFindingKey {
    pub severity: Severity,
    pub category: VrfIsolationCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vrf1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vrf2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l3out: Option<String>,
}

/// VRF isolation finding. The tenant is context for the reader, not part of
/// the identity: VRF keys already carry their tenant prefix.
#[derive(Debug, Clone, Serialize)]
pub struct VrfIsolationFinding {
    #[serde(flatten)]
    pub key: VrfIsolationFindingKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(flatten)]
    pub payload: FindingPayload,
}

impl VrfIsolationFinding {
    pub fn severity(&self) -> Severity {
        self.key.severity
    }

    pub fn category_name(&self) -> &'static str {
        self.key.category.as_str()
    }
}

impl PartialEq for VrfIsolationFinding {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for VrfIsolationFinding {}

impl Hash for VrfIsolationFinding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractUsageCategory {
    AnyAny,
    OverlyPermissive,
    UnrestrictedProtocol,
    BroadPortRange,
    MissingDeny,
    UnusedContract,
}

impl ContractUsageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractUsageCategory::AnyAny => "ANY_ANY",
            ContractUsageCategory::OverlyPermissive => "OVERLY_PERMISSIVE",
            ContractUsageCategory::UnrestrictedProtocol => "UNRESTRICTED_PROTOCOL",
            ContractUsageCategory::BroadPortRange => "BROAD_PORT_RANGE",
            ContractUsageCategory::MissingDeny => "MISSING_DENY",
            ContractUsageCategory::UnusedContract => "UNUSED_CONTRACT",
        }
    }
}

/// Identity of a contract usage finding. Contract-level categories leave
/// filter and entry unset; entry-level categories fill both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ContractUsageFindingKey {
    pub severity: Severity,
    pub category: ContractUsageCategory,
    pub contract: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractUsageFinding {
    #[serde(flatten)]
    pub key: ContractUsageFindingKey,
    #[serde(flatten)]
    pub payload: FindingPayload,
}

impl ContractUsageFinding {
    pub fn severity(&self) -> Severity {
        self.key.severity
    }

    pub fn category_name(&self) -> &'static str {
        self.key.category.as_str()
    }
}

impl PartialEq for ContractUsageFinding {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ContractUsageFinding {}

impl Hash for ContractUsageFinding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReachabilityCategory {
    EpgNoContract,
    EpgNoBd,
    CrossVrfPair,
}

impl ReachabilityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReachabilityCategory::EpgNoContract => "EPG_NO_CONTRACT",
            ReachabilityCategory::EpgNoBd => "EPG_NO_BD",
            ReachabilityCategory::CrossVrfPair => "CROSS_VRF_PAIR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ReachabilityFindingKey {
    pub severity: Severity,
    pub category: ReachabilityCategory,
    pub source_epg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_epg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
}

/// Reachability finding. Carries the most optional context of the family,
/// so construction goes through [`ReachabilityFindingBuilder`].
#[derive(Debug, Clone, Serialize)]
pub struct ReachabilityFinding {
    #[serde(flatten)]
    pub key: ReachabilityFindingKey,
    #[serde(flatten)]
    pub payload: FindingPayload,
}

impl ReachabilityFinding {
    pub fn builder(
        severity: Severity,
        category: ReachabilityCategory,
        source_epg: &str,
    ) -> ReachabilityFindingBuilder {
        ReachabilityFindingBuilder {
            key: ReachabilityFindingKey {
                severity,
                category,
                source_epg: source_epg.to_string(),
                destination_epg: None,
                contract: None,
            },
            payload: FindingPayload::default(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.key.severity
    }

    pub fn category_name(&self) -> &'static str {
        self.key.category.as_str()
    }
}

impl PartialEq for ReachabilityFinding {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ReachabilityFinding {}

impl Hash for ReachabilityFinding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

#[derive(Debug, Clone)]
pub struct ReachabilityFindingBuilder {
    key: ReachabilityFindingKey,
    payload: FindingPayload,
}

impl ReachabilityFindingBuilder {
    pub fn destination_epg(mut self, key: &str) -> Self {
        self.key.destination_epg = Some(key.to_string());
        self
    }

    pub fn contract(mut self, key: &str) -> Self {
        self.key.contract = Some(key.to_string());
        self
    }

    pub fn description(mut self, text: String) -> Self {
        self.payload.description = text;
        self
    }

    pub fn impact(mut self, text: String) -> Self {
        self.payload.impact = text;
        self
    }

    pub fn recommendation(mut self, text: String) -> Self {
        self.payload.recommendation = text;
        self
    }

    pub fn build(self) -> ReachabilityFinding {
        ReachabilityFinding {
            key: self.key,
            payload: self.payload,
        }
    }
}

/// Drop repeated findings (first occurrence wins) and order what remains by
/// descending severity. The sort is stable, so analyzer emission order is
/// preserved within one severity.
pub(crate) fn dedup_sorted<T, F>(findings: Vec<T>, severity: F) -> Vec<T>
where
    T: Clone + Eq + Hash,
    F: Fn(&T) -> Severity,
{
    let mut seen = HashSet::new();
    let mut out: Vec<T> = findings
        .into_iter()
        .filter(|finding| seen.insert(finding.clone()))
        .collect();
    out.sort_by(|a, b| severity(b).cmp(&severity(a)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    fn duplicate_subnet_finding(description: &str) -> SubnetFinding {
        SubnetFinding {
            key: SubnetFindingKey {
                severity: Severity::High,
                category: SubnetCategory::Duplicate,
                bd1: "t1:bd1".to_string(),
                vrf1: Some("t1:v1".to_string()),
                subnet1: Some("10.1.1.0/24".to_string()),
                bd2: Some("t1:bd2".to_string()),
                vrf2: Some("t1:v2".to_string()),
                subnet2: Some("10.1.1.0/24".to_string()),
            },
            payload: FindingPayload {
                description: description.to_string(),
                ..FindingPayload::default()
            },
        }
    }

    #[test]
    fn description_text_does_not_affect_equality_or_hash() {
        let a = duplicate_subnet_finding("subnet declared twice");
        let b = duplicate_subnet_finding("same conclusion, other wording");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn different_identity_fields_break_equality() {
        let a = duplicate_subnet_finding("x");
        let mut b = duplicate_subnet_finding("x");
        b.key.bd2 = Some("t1:bd3".to_string());
        assert_ne!(a, b);
    }

    #[test]
    fn severity_orders_low_to_critical() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn dedup_keeps_first_occurrence_and_sorts_by_severity() {
        let mut low = duplicate_subnet_finding("kept");
        low.key.severity = Severity::Low;
        let findings = vec![
            low,
            duplicate_subnet_finding("first wording"),
            duplicate_subnet_finding("second wording"),
        ];
        let out = dedup_sorted(findings, |f: &SubnetFinding| f.severity());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].severity(), Severity::High);
        assert_eq!(out[0].payload.description, "first wording");
        assert_eq!(out[1].payload.description, "kept");
    }

    #[test]
    fn reachability_builder_fills_key_and_payload() {
        let finding = ReachabilityFinding::builder(
            Severity::Medium,
            ReachabilityCategory::CrossVrfPair,
            "t1:app:web",
        )
        .destination_epg("t1:app:db")
        .contract("t1:web-to-db")
        .description("crosses VRFs".to_string())
        .build();
        assert_eq!(finding.key.source_epg, "t1:app:web");
        assert_eq!(finding.key.destination_epg.as_deref(), Some("t1:app:db"));
        assert_eq!(finding.key.contract.as_deref(), Some("t1:web-to-db"));
        assert_eq!(finding.category_name(), "CROSS_VRF_PAIR");
    }

    #[test]
    fn severity_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&Severity::High).expect("serialize");
        assert_eq!(json, "\"HIGH\"");
        let parsed: Severity = serde_json::from_str("\"CRITICAL\"").expect("parse");
        assert_eq!(parsed, Severity::Critical);
    }
}
