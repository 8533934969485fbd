//! Contract and taboo-contract compilation into IP access lists.
//!
//! Every contract with at least one effective match line becomes exactly one
//! access list, named by a pure function of the contract's canonical key.
//! Subject filter references resolve through the tenant-scoped filter
//! definitions; a reference that resolved to nothing falls back to its own
//! inline terms. A trailing default deny closes every non-empty list.

use std::collections::BTreeMap;

use crate::model::{
    Contract, Diagnostics, FabricConfig, Filter, FilterAction, FilterEntry, FilterRef, Subject,
};
use crate::synth::device::{AclLine, IpAccessList};

/// Prefix for access lists generated from regular contracts.
pub const CONTRACT_ACL_PREFIX: &str = "~CONTRACT~";
/// Prefix for access lists generated from taboo contracts.
pub const TABOO_ACL_PREFIX: &str = "~TABOO~";

/// Access-list name for a contract. Total over every input, including `""`.
pub fn acl_name(contract_name: &str) -> String {
    format!("{CONTRACT_ACL_PREFIX}{contract_name}")
}

/// Access-list name for a taboo contract.
pub fn taboo_acl_name(taboo_name: &str) -> String {
    format!("{TABOO_ACL_PREFIX}{taboo_name}")
}

/// Compiles all contracts and taboo contracts of the fabric.
///
/// Contracts with zero subjects, or whose subjects produce no line, are
/// skipped entirely rather than installed as empty lists.
pub fn build_access_lists(
    config: &FabricConfig,
    diags: &mut Diagnostics,
) -> BTreeMap<String, IpAccessList> {
    let mut acls = BTreeMap::new();
    for tenant in config.tenants.values() {
        for contract in tenant.contracts.values() {
            install(&mut acls, acl_name(&contract.name), contract, config, diags);
        }
        for taboo in tenant.taboo_contracts.values() {
            install(&mut acls, taboo_acl_name(&taboo.name), taboo, config, diags);
        }
    }
    acls
}

fn install(
    acls: &mut BTreeMap<String, IpAccessList>,
    name: String,
    contract: &Contract,
    config: &FabricConfig,
    diags: &mut Diagnostics,
) {
    let lines = contract_lines(contract, config, diags);
    if lines.is_empty() {
        return;
    }
    acls.insert(name.clone(), IpAccessList { name, lines });
}

/// Match lines for one contract, in subject order.
fn contract_lines(
    contract: &Contract,
    config: &FabricConfig,
    diags: &mut Diagnostics,
) -> Vec<AclLine> {
    let mut lines = Vec::new();
    for subject in &contract.subjects {
        subject_lines(contract, subject, config, diags, &mut lines);
    }
    if !lines.is_empty() {
        lines.push(AclLine::new(
            FilterAction::Deny,
            format!("Default deny for contract {}", contract.name),
        ));
    }
    lines
}

fn subject_lines(
    contract: &Contract,
    subject: &Subject,
    config: &FabricConfig,
    diags: &mut Diagnostics,
    out: &mut Vec<AclLine>,
) {
    for filter_ref in &subject.filters {
        let resolved = filter_ref
            .resolved
            .as_deref()
            .and_then(|key| config.find_filter(key));
        let produced = match resolved {
            Some(filter) if !filter.entries.is_empty() => {
                filter_lines(contract, filter, filter_ref.action, diags)
            }
            _ => vec![inline_line(contract, filter_ref, diags)],
        };
        for line in produced {
            // A reversed subject additionally matches the swapped port
            // direction inside the same list; lines without any port
            // constraint would reverse to themselves and are left alone.
            let reverse = (subject.reverse_filter_ports
                && (!line.dst_ports.is_empty() || !line.src_ports.is_empty()))
            .then(|| line.reversed());
            out.push(line);
            if let Some(reverse) = reverse {
                out.push(reverse);
            }
        }
    }
}

/// One line per entry of a resolved filter definition.
fn filter_lines(
    contract: &Contract,
    filter: &Filter,
    action: FilterAction,
    diags: &mut Diagnostics,
) -> Vec<AclLine> {
    filter
        .entries
        .iter()
        .map(|entry| entry_line(contract, filter.local_name(), entry, action, diags))
        .collect()
}

fn entry_line(
    contract: &Contract,
    filter_label: &str,
    entry: &FilterEntry,
    action: FilterAction,
    diags: &mut Diagnostics,
) -> AclLine {
    let entry_label = entry.name.as_deref().unwrap_or("unnamed");
    let mut line = AclLine::new(
        action,
        format!(
            "Contract {} filter {} entry {}",
            contract.name, filter_label, entry_label
        ),
    );
    line.protocol = entry
        .protocol
        .as_deref()
        .and_then(|p| normalize_protocol(p, &contract.name, diags));
    if is_icmp(entry.protocol.as_deref()) {
        line.icmp_type = entry.icmp_type.clone();
        line.icmp_code = entry.icmp_code.clone();
    }
    if let Some(port) = normalize_port(entry.dst_port.as_deref()) {
        line.dst_ports.push(port);
    } else if let Some(range) =
        port_range(entry.dst_from_port.as_deref(), entry.dst_to_port.as_deref())
    {
        line.dst_ports.push(range);
    }
    if let Some(port) = normalize_port(entry.src_port.as_deref()) {
        line.src_ports.push(port);
    } else if let Some(range) =
        port_range(entry.src_from_port.as_deref(), entry.src_to_port.as_deref())
    {
        line.src_ports.push(range);
    }
    if matches!(entry.stateful.as_deref(), Some("yes") | Some("true")) {
        diags.warn(format!(
            "stateful filtering on contract {} filter {} entry {} is not carried into the generated ACL",
            contract.name, filter_label, entry_label
        ));
    }
    line
}

/// Fallback line built from a reference's own inline terms.
fn inline_line(contract: &Contract, filter_ref: &FilterRef, diags: &mut Diagnostics) -> AclLine {
    let label = if filter_ref.name.is_empty() {
        "unnamed"
    } else {
        &filter_ref.name
    };
    let mut line = AclLine::new(
        filter_ref.action,
        format!("Contract {} filter {label}", contract.name),
    );
    line.protocol = filter_ref
        .ip_protocol
        .as_deref()
        .and_then(|p| normalize_protocol(p, &contract.name, diags));
    for port in &filter_ref.dst_ports {
        if let Some(port) = normalize_port(Some(port)) {
            line.dst_ports.push(port);
        }
    }
    line
}

/// Protocol names the generated lines use verbatim.
const KNOWN_PROTOCOLS: &[&str] = &[
    "tcp", "udp", "icmp", "igmp", "ipinip", "gre", "ospf", "pim", "sctp",
];

/// Normalizes a protocol string to a known name or numeric value.
///
/// `"ip"`/`"ipv4"` mean "any IP traffic" and yield no constraint. Numbers
/// are accepted across the full 0..=255 protocol space. Anything else is
/// reported and dropped.
pub fn normalize_protocol(
    protocol: &str,
    contract_name: &str,
    diags: &mut Diagnostics,
) -> Option<String> {
    let p = protocol.trim().to_lowercase();
    if p.is_empty() || p == "ip" || p == "ipv4" {
        return None;
    }
    if KNOWN_PROTOCOLS.contains(&p.as_str()) {
        return Some(p);
    }
    match p.parse::<u32>() {
        Ok(n) if n <= 255 => Some(p),
        Ok(_) => {
            diags.warn(format!(
                "invalid IP protocol number {protocol} in contract {contract_name} (must be 0-255)"
            ));
            None
        }
        Err(_) => {
            diags.warn(format!(
                "unknown IP protocol {protocol} in contract {contract_name}"
            ));
            None
        }
    }
}

/// Drops placeholder port values; keeps everything else trimmed.
pub fn normalize_port(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    match trimmed.to_lowercase().as_str() {
        "" | "unspecified" | "any" | "0" => None,
        _ => Some(trimmed.to_string()),
    }
}

fn port_range(from: Option<&str>, to: Option<&str>) -> Option<String> {
    let from = normalize_port(from)?;
    let to = normalize_port(to)?;
    Some(format!("{from}-{to}"))
}

fn is_icmp(protocol: Option<&str>) -> bool {
    match protocol {
        Some(p) => {
            let p = p.trim().to_lowercase();
            p == "icmp" || p.contains("icmpv4")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::build_model;
    use mo_tree_core::parse;
    use pretty_assertions::assert_eq;

    fn compile(payload: &str) -> (BTreeMap<String, IpAccessList>, Diagnostics) {
        let tree = parse(payload.as_bytes()).expect("fixture parses");
        let mut diags = Diagnostics::new();
        let config = build_model(&tree, "fab1", &mut diags);
        let acls = build_access_lists(&config, &mut diags);
        (acls, diags)
    }

    #[test]
    fn acl_name_is_total_including_empty() {
        assert_eq!(acl_name(""), "~CONTRACT~");
        assert_eq!(acl_name("t1:c1"), "~CONTRACT~t1:c1");
        assert_eq!(taboo_acl_name("t1:deny-all"), "~TABOO~t1:deny-all");
    }

    #[test]
    fn contract_with_zero_subjects_yields_no_acl() {
        let (acls, _) = compile(
            r#"{"imdata":[{"fvTenant":{"attributes":{"name":"t1"},"children":[
                {"vzBrCP":{"attributes":{"name":"empty"}}}]}}]}"#,
        );
        assert!(acls.is_empty());
    }

    #[test]
    fn resolved_filter_entries_become_lines_with_default_deny() {
        let (acls, _) = compile(
            r#"{"imdata":[{"fvTenant":{"attributes":{"name":"t1"},"children":[
                {"vzFilter":{"attributes":{"name":"web"},"children":[
                    {"vzEntry":{"attributes":{"name":"https","prot":"tcp","dPort":"443"}}},
                    {"vzEntry":{"attributes":{"name":"http","prot":"tcp","dFromPort":"8080","dToPort":"8088"}}}]}},
                {"vzBrCP":{"attributes":{"name":"allow-web"},"children":[
                    {"vzSubj":{"attributes":{"name":"s1"},"children":[
                        {"vzRsSubjFiltAtt":{"attributes":{"tnVzFilterName":"web"}}}]}}]}}]}}]}"#,
        );
        let acl = acls.get("~CONTRACT~t1:allow-web").expect("acl installed");
        assert_eq!(acl.lines.len(), 3);
        assert_eq!(acl.lines[0].protocol.as_deref(), Some("tcp"));
        assert_eq!(acl.lines[0].dst_ports, vec!["443".to_string()]);
        assert_eq!(acl.lines[1].dst_ports, vec!["8080-8088".to_string()]);
        let deny = &acl.lines[2];
        assert_eq!(deny.action, FilterAction::Deny);
        assert!(deny.matches_any());
        assert_eq!(deny.name, "Default deny for contract t1:allow-web");
    }

    #[test]
    fn unresolved_reference_falls_back_to_match_any_line() {
        let (acls, _) = compile(
            r#"{"imdata":[{"fvTenant":{"attributes":{"name":"t1"},"children":[
                {"vzBrCP":{"attributes":{"name":"c1"},"children":[
                    {"vzSubj":{"attributes":{"name":"s1"},"children":[
                        {"vzRsSubjFiltAtt":{"attributes":{"tnVzFilterName":"missing","action":"deny"}}}]}}]}}]}}]}"#,
        );
        let acl = acls.get("~CONTRACT~t1:c1").expect("acl installed");
        // The dangling reference still produces its inline line, then the
        // default deny.
        assert_eq!(acl.lines.len(), 2);
        assert_eq!(acl.lines[0].action, FilterAction::Deny);
        assert!(acl.lines[0].matches_any());
        assert_eq!(acl.lines[0].name, "Contract t1:c1 filter missing");
    }

    #[test]
    fn reverse_filter_ports_adds_swapped_twin_in_same_acl() {
        let (acls, _) = compile(
            r#"{"imdata":[{"fvTenant":{"attributes":{"name":"t1"},"children":[
                {"vzFilter":{"attributes":{"name":"web"},"children":[
                    {"vzEntry":{"attributes":{"name":"https","prot":"tcp","dPort":"443"}}}]}},
                {"vzBrCP":{"attributes":{"name":"c1"},"children":[
                    {"vzSubj":{"attributes":{"name":"s1","revFltPorts":"yes"},"children":[
                        {"vzRsSubjFiltAtt":{"attributes":{"tnVzFilterName":"web"}}}]}}]}}]}}]}"#,
        );
        assert_eq!(acls.len(), 1, "reversal never creates a second ACL");
        let acl = acls.get("~CONTRACT~t1:c1").expect("acl installed");
        assert_eq!(acl.lines.len(), 3);
        assert_eq!(acl.lines[0].dst_ports, vec!["443".to_string()]);
        assert!(acl.lines[0].src_ports.is_empty());
        assert!(acl.lines[1].dst_ports.is_empty());
        assert_eq!(acl.lines[1].src_ports, vec!["443".to_string()]);
    }

    #[test]
    fn taboo_contracts_compile_under_taboo_prefix() {
        let (acls, _) = compile(
            r#"{"imdata":[{"fvTenant":{"attributes":{"name":"t1"},"children":[
                {"vzFilter":{"attributes":{"name":"telnet"},"children":[
                    {"vzEntry":{"attributes":{"name":"e1","prot":"tcp","dPort":"23"}}}]}},
                {"vzTaboo":{"attributes":{"name":"no-telnet"},"children":[
                    {"vzSubj":{"attributes":{"name":"s1"},"children":[
                        {"vzRsSubjFiltAtt":{"attributes":{"tnVzFilterName":"telnet","action":"deny"}}}]}}]}}]}}]}"#,
        );
        let acl = acls.get("~TABOO~t1:no-telnet").expect("taboo acl installed");
        assert_eq!(acl.lines[0].action, FilterAction::Deny);
        assert_eq!(acl.lines[0].dst_ports, vec!["23".to_string()]);
    }

    #[test]
    fn protocol_normalization_covers_names_numbers_and_any() {
        let mut diags = Diagnostics::new();
        assert_eq!(
            normalize_protocol("TCP", "t1:c1", &mut diags).as_deref(),
            Some("tcp")
        );
        assert_eq!(
            normalize_protocol("17", "t1:c1", &mut diags).as_deref(),
            Some("17")
        );
        assert_eq!(normalize_protocol("ip", "t1:c1", &mut diags), None);
        assert_eq!(normalize_protocol("ipv4", "t1:c1", &mut diags), None);
        assert!(diags.is_empty());
        assert_eq!(normalize_protocol("999", "t1:c1", &mut diags), None);
        assert_eq!(normalize_protocol("bogus", "t1:c1", &mut diags), None);
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn placeholder_ports_are_dropped() {
        for placeholder in ["", "unspecified", "any", "0", "  ANY  "] {
            assert_eq!(normalize_port(Some(placeholder)), None);
        }
        assert_eq!(normalize_port(Some(" 8080 ")).as_deref(), Some("8080"));
        assert_eq!(normalize_port(Some("https")).as_deref(), Some("https"));
    }
}
