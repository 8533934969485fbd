//! Contract permissiveness and usage analysis.
//!
//! Walks every tenant contract, its subjects, and the filter entries behind
//! them, and reports policy that allows more than it appears to:
//!
//! 1. **ANY_ANY** — a permit entry constraining neither protocol nor ports
//! 2. **OVERLY_PERMISSIVE** — a subject filter reference with no definition
//!    and no inline terms, so the subject matches everything
//! 3. **UNRESTRICTED_PROTOCOL** — tcp or udp permitted with no port
//!    constraint at all
//! 4. **BROAD_PORT_RANGE** — a port range spanning at least half the port
//!    space (destination checked before source)
//! 5. **MISSING_DENY** — a contract with no deny subject anywhere
//! 6. **UNUSED_CONTRACT** — a contract no EPG or external EPG references
//!
//! Each permit entry yields at most one finding, the most severe applicable
//! category. Taboo contracts are deny-lists by construction and are not
//! analyzed here.

use std::collections::BTreeSet;

use crate::analysis::findings::{
    dedup_sorted, ContractUsageCategory, ContractUsageFinding, ContractUsageFindingKey,
    FindingPayload, Severity,
};
use crate::model::{Contract, FabricConfig, FilterAction, FilterEntry, FilterRef};
use crate::synth::acl::normalize_port;

/// Port span at and above which a range counts as broad.
const BROAD_PORT_SPAN: u32 = 32_768;

/// Check every contract in the fabric for permissiveness and usage issues.
///
/// Expects a finalized model so filter references carry their resolution
/// state and EPG contract lists are canonical.
pub fn analyze_contract_usage(config: &FabricConfig) -> Vec<ContractUsageFinding> {
    let referenced = referenced_contracts(config);
    let mut out = Vec::new();
    for tenant in config.tenants.values() {
        for contract in tenant.contracts.values() {
            check_contract(contract, config, &mut out);
            if !referenced.contains(contract.name.as_str()) {
                out.push(contract_level(
                    Severity::Low,
                    ContractUsageCategory::UnusedContract,
                    contract,
                    FindingPayload {
                        description: format!(
                            "contract {} is not provided or consumed by any EPG",
                            contract.name
                        ),
                        impact: "the contract has no effect on fabric policy".to_string(),
                        recommendation: "attach it to an EPG or delete it".to_string(),
                    },
                ));
            }
        }
    }
    dedup_sorted(out, |f: &ContractUsageFinding| f.severity())
}

fn check_contract(contract: &Contract, config: &FabricConfig, out: &mut Vec<ContractUsageFinding>) {
    let mut has_deny = false;
    for subject in &contract.subjects {
        for fref in &subject.filters {
            if fref.action == FilterAction::Deny {
                has_deny = true;
            }
            check_filter_ref(contract, fref, config, out);
        }
    }
    if !has_deny {
        out.push(contract_level(
            Severity::Low,
            ContractUsageCategory::MissingDeny,
            contract,
            FindingPayload {
                description: format!("contract {} defines no explicit deny entry", contract.name),
                impact: "traffic not matched by a permit falls through to the implicit fabric \
                         deny, which the contract does not document"
                    .to_string(),
                recommendation: "add an explicit deny subject for auditability".to_string(),
            },
        ));
    }
}

fn check_filter_ref(
    contract: &Contract,
    fref: &FilterRef,
    config: &FabricConfig,
    out: &mut Vec<ContractUsageFinding>,
) {
    let resolved = fref
        .resolved
        .as_deref()
        .and_then(|key| config.find_filter(key));
    let Some(filter) = resolved else {
        check_unresolved_ref(contract, fref, out);
        return;
    };
    if fref.action != FilterAction::Permit {
        return;
    }
    for entry in &filter.entries {
        if let Some(finding) = classify_entry(contract, &filter.name, entry) {
            out.push(finding);
        }
    }
}

/// A reference with no definition and no inline terms matches all traffic.
/// References that carry inline protocol or ports are narrowed by those and
/// only get the unrestricted-protocol check.
fn check_unresolved_ref(
    contract: &Contract,
    fref: &FilterRef,
    out: &mut Vec<ContractUsageFinding>,
) {
    let label = if fref.name.is_empty() {
        "unnamed"
    } else {
        fref.name.as_str()
    };
    let inline_protocol = protocol_value(fref.ip_protocol.as_deref());
    let inline_ports = fref
        .dst_ports
        .iter()
        .any(|port| normalize_port(Some(port)).is_some());
    if inline_protocol.is_none() && !inline_ports {
        out.push(ContractUsageFinding {
            key: ContractUsageFindingKey {
                severity: Severity::High,
                category: ContractUsageCategory::OverlyPermissive,
                contract: contract.name.clone(),
                filter: Some(label.to_string()),
                entry: None,
            },
            payload: FindingPayload {
                description: format!(
                    "filter {label} referenced by contract {} has no definition",
                    contract.name
                ),
                impact: "an unresolvable filter reference matches all traffic on this subject"
                    .to_string(),
                recommendation: "define the filter or remove the reference".to_string(),
            },
        });
        return;
    }
    if fref.action != FilterAction::Permit {
        return;
    }
    if let Some(protocol) = inline_protocol {
        if is_port_protocol(&protocol) && !inline_ports {
            out.push(ContractUsageFinding {
                key: ContractUsageFindingKey {
                    severity: Severity::Medium,
                    category: ContractUsageCategory::UnrestrictedProtocol,
                    contract: contract.name.clone(),
                    filter: Some(label.to_string()),
                    entry: None,
                },
                payload: FindingPayload {
                    description: format!(
                        "inline filter {label} in contract {} allows {protocol} with no port \
                         restriction",
                        contract.name
                    ),
                    impact: format!(
                        "all {protocol} ports are reachable between the contract's EPGs"
                    ),
                    recommendation: "restrict the reference to the required destination ports"
                        .to_string(),
                },
            });
        }
    }
}

/// Most severe applicable category for one permit entry, or nothing when the
/// entry is adequately constrained.
fn classify_entry(
    contract: &Contract,
    filter_name: &str,
    entry: &FilterEntry,
) -> Option<ContractUsageFinding> {
    let entry_label = entry.name.as_deref().unwrap_or("unnamed");
    let key = |severity, category| ContractUsageFindingKey {
        severity,
        category,
        contract: contract.name.clone(),
        filter: Some(filter_name.to_string()),
        entry: Some(entry_label.to_string()),
    };

    if entry_constrains_nothing(entry) {
        return Some(ContractUsageFinding {
            key: key(Severity::High, ContractUsageCategory::AnyAny),
            payload: FindingPayload {
                description: format!(
                    "entry {entry_label} of filter {filter_name} in contract {} matches any \
                     protocol and any port",
                    contract.name
                ),
                impact: "the contract permits all traffic between its EPGs".to_string(),
                recommendation: "narrow the filter to the protocols the application needs"
                    .to_string(),
            },
        });
    }

    let protocol = protocol_value(entry.protocol.as_deref())?;
    if !is_port_protocol(&protocol) {
        return None;
    }
    if !entry_has_ports(entry) {
        return Some(ContractUsageFinding {
            key: key(Severity::Medium, ContractUsageCategory::UnrestrictedProtocol),
            payload: FindingPayload {
                description: format!(
                    "entry {entry_label} of filter {filter_name} allows {protocol} with no port \
                     restriction"
                ),
                impact: format!("all {protocol} ports are reachable between the contract's EPGs"),
                recommendation: "restrict the entry to the required destination ports".to_string(),
            },
        });
    }

    let ranges = [
        (
            "destination",
            entry.dst_from_port.as_deref(),
            entry.dst_to_port.as_deref(),
        ),
        (
            "source",
            entry.src_from_port.as_deref(),
            entry.src_to_port.as_deref(),
        ),
    ];
    for (side, from, to) in ranges {
        if let Some((from, to)) = broad_range(from, to) {
            let phrase = if from == 1 {
                format!("an overly broad {side} port range {from}-{to}")
            } else {
                format!("a broad {side} port range {from}-{to}")
            };
            return Some(ContractUsageFinding {
                key: key(Severity::Medium, ContractUsageCategory::BroadPortRange),
                payload: FindingPayload {
                    description: format!(
                        "entry {entry_label} of filter {filter_name} allows {phrase}"
                    ),
                    impact: "the range exposes most of the port space".to_string(),
                    recommendation: "split the range into the specific services required"
                        .to_string(),
                },
            });
        }
    }
    None
}

fn contract_level(
    severity: Severity,
    category: ContractUsageCategory,
    contract: &Contract,
    payload: FindingPayload,
) -> ContractUsageFinding {
    ContractUsageFinding {
        key: ContractUsageFindingKey {
            severity,
            category,
            contract: contract.name.clone(),
            filter: None,
            entry: None,
        },
        payload,
    }
}

/// Canonical keys of every contract some EPG or external EPG provides or
/// consumes. Lists are already canonical after the resolver barrier.
fn referenced_contracts(config: &FabricConfig) -> BTreeSet<&str> {
    let mut out = BTreeSet::new();
    for tenant in config.tenants.values() {
        for epg in tenant.epgs.values() {
            out.extend(epg.provided_contracts.iter().map(String::as_str));
            out.extend(epg.consumed_contracts.iter().map(String::as_str));
        }
        for l3out in tenant.l3outs.values() {
            for ext_epg in &l3out.external_epgs {
                out.extend(ext_epg.provided_contracts.iter().map(String::as_str));
                out.extend(ext_epg.consumed_contracts.iter().map(String::as_str));
            }
        }
    }
    out
}

/// Protocol text with placeholder values dropped, lowercased.
fn protocol_value(value: Option<&str>) -> Option<String> {
    let p = value?.trim().to_lowercase();
    match p.as_str() {
        "" | "any" | "unspecified" | "0" | "ip" | "ipv4" => None,
        _ => Some(p),
    }
}

fn is_port_protocol(protocol: &str) -> bool {
    matches!(protocol, "tcp" | "udp" | "tcp-udp" | "6" | "17")
}

fn entry_has_ports(entry: &FilterEntry) -> bool {
    [
        entry.dst_port.as_deref(),
        entry.dst_from_port.as_deref(),
        entry.dst_to_port.as_deref(),
        entry.src_port.as_deref(),
        entry.src_from_port.as_deref(),
        entry.src_to_port.as_deref(),
    ]
    .into_iter()
    .any(|port| normalize_port(port).is_some())
}

fn entry_has_icmp(entry: &FilterEntry) -> bool {
    [entry.icmp_type.as_deref(), entry.icmp_code.as_deref()]
        .into_iter()
        .any(|value| {
            value.is_some_and(|v| {
                let v = v.trim().to_lowercase();
                !v.is_empty() && v != "unspecified" && v != "any"
            })
        })
}

fn entry_constrains_nothing(entry: &FilterEntry) -> bool {
    let ether = entry
        .ether_type
        .as_deref()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !matches!(v.as_str(), "" | "unspecified" | "any" | "ip" | "ipv4"));
    ether.is_none()
        && protocol_value(entry.protocol.as_deref()).is_none()
        && !entry_has_ports(entry)
        && !entry_has_icmp(entry)
}

/// Numeric from/to pair whose span covers at least half the port space.
/// Unparsable or inverted bounds disqualify the range rather than erroring.
fn broad_range(from: Option<&str>, to: Option<&str>) -> Option<(u32, u32)> {
    let from: u32 = normalize_port(from)?.parse().ok()?;
    let to: u32 = normalize_port(to)?.parse().ok()?;
    if from <= to && to <= 65_535 && to - from >= BROAD_PORT_SPAN {
        Some((from, to))
    } else {
        None
    }
}
