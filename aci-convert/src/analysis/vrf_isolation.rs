//! VRF isolation analysis.
//!
//! Verifies that the fabric's routing-isolation story holds together:
//!
//! 1. **SUBNET_OVERLAP** — the byte-identical subnet appears in bridge
//!    domains of two different VRFs (one finding per VRF pair per subnet)
//! 2. **CROSS_VRF_CONTRACT** — a contract's provider and consumer EPGs land
//!    in more than one VRF, resolved through EPG → bridge domain → VRF
//! 3. **UNUSED_VRF** — a VRF no bridge domain and no L3Out references
//! 4. **L3OUT_SCOPE** — an L3Out with no VRF association (high), or an
//!    external EPG subnet overlapping an internal bridge domain subnet in
//!    the same VRF (medium)
//!
//! Bridge domains without a resolved VRF cannot contribute to VRF-pair
//! evidence and are skipped by the subnet and contract checks.

use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::epg_vrf;
use crate::analysis::findings::{
    dedup_sorted, FindingPayload, Severity, VrfIsolationCategory, VrfIsolationFinding,
    VrfIsolationFindingKey,
};
use crate::analysis::subnet::subnets_overlap;
use crate::model::FabricConfig;

/// Run all VRF isolation checks over a finalized model.
pub fn analyze_vrf_isolation(config: &FabricConfig) -> Vec<VrfIsolationFinding> {
    let mut out = Vec::new();
    check_subnet_reuse(config, &mut out);
    check_contract_vrf_scope(config, &mut out);
    check_unused_vrfs(config, &mut out);
    check_l3out_scope(config, &mut out);
    dedup_sorted(out, |f: &VrfIsolationFinding| f.severity())
}

/// One subnet string declared under two or more VRFs.
fn check_subnet_reuse(config: &FabricConfig, out: &mut Vec<VrfIsolationFinding>) {
    let mut uses: BTreeMap<&str, (BTreeSet<&str>, &str)> = BTreeMap::new();
    for tenant in config.tenants.values() {
        for bd in tenant.bridge_domains.values() {
            let Some(vrf) = bd.vrf.as_deref() else {
                continue;
            };
            for subnet in &bd.subnets {
                let (vrfs, _) = uses
                    .entry(subnet.as_str())
                    .or_insert_with(|| (BTreeSet::new(), bd.tenant.as_str()));
                vrfs.insert(vrf);
            }
        }
    }
    for (subnet, (vrfs, tenant)) in &uses {
        if vrfs.len() < 2 {
            continue;
        }
        let vrfs: Vec<&str> = vrfs.iter().copied().collect();
        for (i, first) in vrfs.iter().enumerate() {
            for second in vrfs.iter().skip(i + 1) {
                out.push(VrfIsolationFinding {
                    key: VrfIsolationFindingKey {
                        severity: Severity::High,
                        category: VrfIsolationCategory::SubnetOverlap,
                        vrf1: Some((*first).to_string()),
                        vrf2: Some((*second).to_string()),
                        subnet: Some((*subnet).to_string()),
                        contract: None,
                        l3out: None,
                    },
                    tenant: Some((*tenant).to_string()),
                    payload: FindingPayload {
                        description: format!(
                            "subnet {subnet} is used in multiple VRFs: {first} and {second}"
                        ),
                        impact: "the VRFs are not address-isolated; leaking routes between them \
                                 will collide"
                            .to_string(),
                        recommendation: "renumber the subnet in one VRF or document the shared \
                                         range"
                            .to_string(),
                    },
                });
            }
        }
    }
}

/// A contract whose provider and consumer EPGs resolve to different VRFs.
fn check_contract_vrf_scope(config: &FabricConfig, out: &mut Vec<VrfIsolationFinding>) {
    let mut by_contract: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for tenant in config.tenants.values() {
        for epg in tenant.epgs.values() {
            let Some(vrf) = epg_vrf(config, epg) else {
                continue;
            };
            for key in epg
                .provided_contracts
                .iter()
                .chain(&epg.consumed_contracts)
            {
                by_contract.entry(key.as_str()).or_default().insert(vrf);
            }
        }
    }
    for (contract, vrfs) in &by_contract {
        if vrfs.len() < 2 {
            continue;
        }
        let list: Vec<&str> = vrfs.iter().copied().collect();
        let tenant = config
            .find_contract(contract)
            .map(|c| c.tenant.clone());
        out.push(VrfIsolationFinding {
            key: VrfIsolationFindingKey {
                severity: Severity::Medium,
                category: VrfIsolationCategory::CrossVrfContract,
                vrf1: None,
                vrf2: None,
                subnet: None,
                contract: Some((*contract).to_string()),
                l3out: None,
            },
            tenant,
            payload: FindingPayload {
                description: format!(
                    "contract {contract} joins EPGs in VRFs {}",
                    list.join(", ")
                ),
                impact: "the contract implies traffic across VRF boundaries that the fabric \
                         will not route by itself"
                    .to_string(),
                recommendation: "add route leaking between the VRFs or scope the contract to \
                                 one VRF"
                    .to_string(),
            },
        });
    }
}

/// VRFs nothing points at.
fn check_unused_vrfs(config: &FabricConfig, out: &mut Vec<VrfIsolationFinding>) {
    let mut referenced: BTreeSet<&str> = BTreeSet::new();
    for tenant in config.tenants.values() {
        referenced.extend(
            tenant
                .bridge_domains
                .values()
                .filter_map(|bd| bd.vrf.as_deref()),
        );
        referenced.extend(tenant.l3outs.values().filter_map(|l3out| l3out.vrf.as_deref()));
    }
    for tenant in config.tenants.values() {
        for vrf in tenant.vrfs.values() {
            if referenced.contains(vrf.name()) {
                continue;
            }
            out.push(VrfIsolationFinding {
                key: VrfIsolationFindingKey {
                    severity: Severity::Low,
                    category: VrfIsolationCategory::UnusedVrf,
                    vrf1: Some(vrf.name().to_string()),
                    vrf2: None,
                    subnet: None,
                    contract: None,
                    l3out: None,
                },
                tenant: Some(vrf.tenant.clone()),
                payload: FindingPayload {
                    description: format!(
                        "VRF {} is not referenced by any bridge domain or L3Out",
                        vrf.name()
                    ),
                    impact: "the VRF carries no workloads and usually indicates stale \
                             configuration"
                        .to_string(),
                    recommendation: "remove the VRF or attach the intended bridge domains"
                        .to_string(),
                },
            });
        }
    }
}

/// L3Outs with missing or leaky VRF scope.
fn check_l3out_scope(config: &FabricConfig, out: &mut Vec<VrfIsolationFinding>) {
    for tenant in config.tenants.values() {
        for l3out in tenant.l3outs.values() {
            let Some(vrf) = l3out.vrf.as_deref() else {
                out.push(VrfIsolationFinding {
                    key: VrfIsolationFindingKey {
                        severity: Severity::High,
                        category: VrfIsolationCategory::L3outScope,
                        vrf1: None,
                        vrf2: None,
                        subnet: None,
                        contract: None,
                        l3out: Some(l3out.name.clone()),
                    },
                    tenant: Some(l3out.tenant.clone()),
                    payload: FindingPayload {
                        description: format!("L3Out {} has no VRF association", l3out.name),
                        impact: "its routes land in the default VRF instead of an isolated \
                                 context"
                            .to_string(),
                        recommendation: "bind the L3Out to the VRF its routes belong to"
                            .to_string(),
                    },
                });
                continue;
            };
            for ext_epg in &l3out.external_epgs {
                for ext_subnet in &ext_epg.subnets {
                    if let Some((bd_name, bd_subnet)) =
                        overlapping_internal(config, vrf, ext_subnet)
                    {
                        out.push(VrfIsolationFinding {
                            key: VrfIsolationFindingKey {
                                severity: Severity::Medium,
                                category: VrfIsolationCategory::L3outScope,
                                vrf1: Some(vrf.to_string()),
                                vrf2: None,
                                subnet: Some(ext_subnet.clone()),
                                contract: None,
                                l3out: Some(l3out.name.clone()),
                            },
                            tenant: Some(l3out.tenant.clone()),
                            payload: FindingPayload {
                                description: format!(
                                    "external subnet {ext_subnet} in L3Out {} overlaps with \
                                     internal subnet {bd_subnet} on {bd_name}",
                                    l3out.name
                                ),
                                impact: "external routes can shadow the internal prefix and pull \
                                         fabric traffic out"
                                    .to_string(),
                                recommendation: "tighten the external subnet or renumber the \
                                                 bridge domain"
                                    .to_string(),
                            },
                        });
                    }
                }
            }
        }
    }
}

/// First internal bridge domain subnet in `vrf` the external subnet covers
/// or intersects.
fn overlapping_internal<'a>(
    config: &'a FabricConfig,
    vrf: &str,
    ext_subnet: &str,
) -> Option<(&'a str, &'a str)> {
    for tenant in config.tenants.values() {
        for bd in tenant.bridge_domains.values() {
            if bd.vrf.as_deref() != Some(vrf) {
                continue;
            }
            for subnet in &bd.subnets {
                if subnets_overlap(ext_subnet, subnet) {
                    return Some((bd.name.as_str(), subnet.as_str()));
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Diagnostics, ExternalEpg};
    use pretty_assertions::assert_eq;

    fn finalized(mut config: FabricConfig) -> FabricConfig {
        let mut diags = Diagnostics::new();
        config.finalize(&mut diags);
        config
    }

    fn bridge_domain(config: &mut FabricConfig, bd: &str, vrf: &str, subnets: &[&str]) {
        let tenant = config.get_or_create_tenant("t1");
        tenant.get_or_create_vrf(vrf);
        let domain = tenant.get_or_create_bridge_domain(bd);
        domain.vrf = Some(vrf.to_string());
        domain.subnets = subnets.iter().map(|s| s.to_string()).collect();
    }

    fn categories(findings: &[VrfIsolationFinding]) -> Vec<VrfIsolationCategory> {
        findings.iter().map(|f| f.key.category).collect()
    }

    #[test]
    fn subnet_in_three_vrfs_yields_one_finding_per_pair() {
        let mut config = FabricConfig::new("fab1");
        bridge_domain(&mut config, "bd1", "v1", &["10.1.1.0/24"]);
        bridge_domain(&mut config, "bd2", "v2", &["10.1.1.0/24"]);
        bridge_domain(&mut config, "bd3", "v3", &["10.1.1.0/24"]);
        let findings = analyze_vrf_isolation(&finalized(config));

        assert_eq!(findings.len(), 3);
        assert!(findings
            .iter()
            .all(|f| f.key.category == VrfIsolationCategory::SubnetOverlap));
        assert_eq!(findings[0].key.vrf1.as_deref(), Some("t1:v1"));
        assert_eq!(findings[0].key.vrf2.as_deref(), Some("t1:v2"));
        assert_eq!(findings[0].key.subnet.as_deref(), Some("10.1.1.0/24"));
        assert_eq!(findings[0].tenant.as_deref(), Some("t1"));
    }

    #[test]
    fn subnet_reuse_within_one_vrf_is_not_an_isolation_issue() {
        let mut config = FabricConfig::new("fab1");
        bridge_domain(&mut config, "bd1", "v1", &["10.1.1.0/24"]);
        bridge_domain(&mut config, "bd2", "v1", &["10.1.1.0/24"]);
        let findings = analyze_vrf_isolation(&finalized(config));
        assert_eq!(findings.len(), 0);
    }

    #[test]
    fn vrf_less_bridge_domains_are_skipped() {
        let mut config = FabricConfig::new("fab1");
        bridge_domain(&mut config, "bd1", "v1", &["10.1.1.0/24"]);
        let tenant = config.get_or_create_tenant("t1");
        let orphan = tenant.get_or_create_bridge_domain("orphan");
        orphan.subnets = vec!["10.1.1.0/24".to_string()];
        let findings = analyze_vrf_isolation(&finalized(config));
        assert_eq!(findings.len(), 0);
    }

    #[test]
    fn contract_spanning_two_vrfs_is_flagged_once() {
        let mut config = FabricConfig::new("fab1");
        bridge_domain(&mut config, "bd1", "v1", &["10.1.1.0/24"]);
        bridge_domain(&mut config, "bd2", "v2", &["10.2.1.0/24"]);
        let tenant = config.get_or_create_tenant("t1");
        tenant.get_or_create_contract("c1");
        let web = tenant.get_or_create_epg(Some("app"), "web");
        web.bridge_domain = Some("bd1".to_string());
        web.provided_contracts.push("c1".to_string());
        let db = tenant.get_or_create_epg(Some("app"), "db");
        db.bridge_domain = Some("bd2".to_string());
        db.consumed_contracts.push("c1".to_string());
        let findings = analyze_vrf_isolation(&finalized(config));

        assert_eq!(categories(&findings), vec![VrfIsolationCategory::CrossVrfContract]);
        assert_eq!(findings[0].key.contract.as_deref(), Some("t1:c1"));
        assert_eq!(findings[0].key.severity, Severity::Medium);
        assert!(findings[0].payload.description.contains("t1:v1"));
        assert!(findings[0].payload.description.contains("t1:v2"));
    }

    #[test]
    fn contract_within_one_vrf_is_quiet() {
        let mut config = FabricConfig::new("fab1");
        bridge_domain(&mut config, "bd1", "v1", &["10.1.1.0/24"]);
        let tenant = config.get_or_create_tenant("t1");
        tenant.get_or_create_contract("c1");
        let web = tenant.get_or_create_epg(Some("app"), "web");
        web.bridge_domain = Some("bd1".to_string());
        web.provided_contracts.push("c1".to_string());
        let db = tenant.get_or_create_epg(Some("app"), "db");
        db.bridge_domain = Some("bd1".to_string());
        db.consumed_contracts.push("c1".to_string());
        let findings = analyze_vrf_isolation(&finalized(config));
        assert_eq!(findings.len(), 0);
    }

    #[test]
    fn vrf_with_no_references_is_unused() {
        let mut config = FabricConfig::new("fab1");
        bridge_domain(&mut config, "bd1", "v1", &["10.1.1.0/24"]);
        let tenant = config.get_or_create_tenant("t1");
        tenant.get_or_create_vrf("v2");
        tenant.get_or_create_vrf("v3");
        let l3out = tenant.get_or_create_l3out("ext");
        l3out.vrf = Some("v2".to_string());
        let findings = analyze_vrf_isolation(&finalized(config));

        assert_eq!(categories(&findings), vec![VrfIsolationCategory::UnusedVrf]);
        assert_eq!(findings[0].key.vrf1.as_deref(), Some("t1:v3"));
        assert_eq!(findings[0].key.severity, Severity::Low);
    }

    #[test]
    fn l3out_without_vrf_is_high() {
        let mut config = FabricConfig::new("fab1");
        config.get_or_create_tenant("t1").get_or_create_l3out("ext");
        let findings = analyze_vrf_isolation(&finalized(config));

        assert_eq!(categories(&findings), vec![VrfIsolationCategory::L3outScope]);
        assert_eq!(findings[0].key.severity, Severity::High);
        assert_eq!(findings[0].key.l3out.as_deref(), Some("t1:ext"));
        assert!(findings[0]
            .payload
            .description
            .contains("has no VRF association"));
    }

    #[test]
    fn external_subnet_overlapping_internal_subnet_is_medium() {
        let mut config = FabricConfig::new("fab1");
        bridge_domain(&mut config, "bd1", "v1", &["10.1.1.0/24"]);
        let tenant = config.get_or_create_tenant("t1");
        let l3out = tenant.get_or_create_l3out("ext");
        l3out.vrf = Some("v1".to_string());
        let mut all = ExternalEpg::new("all");
        all.subnets = vec!["10.1.0.0/16".to_string()];
        l3out.external_epgs.push(all);
        let findings = analyze_vrf_isolation(&finalized(config));

        assert_eq!(categories(&findings), vec![VrfIsolationCategory::L3outScope]);
        assert_eq!(findings[0].key.severity, Severity::Medium);
        assert!(findings[0]
            .payload
            .description
            .contains("overlaps with internal subnet 10.1.1.0/24"));
    }

    #[test]
    fn external_subnet_in_a_different_vrf_is_quiet() {
        let mut config = FabricConfig::new("fab1");
        bridge_domain(&mut config, "bd1", "v1", &["10.1.1.0/24"]);
        bridge_domain(&mut config, "bd2", "v2", &["10.9.0.0/24"]);
        let tenant = config.get_or_create_tenant("t1");
        let l3out = tenant.get_or_create_l3out("ext");
        l3out.vrf = Some("v2".to_string());
        let mut all = ExternalEpg::new("all");
        all.subnets = vec!["10.1.0.0/16".to_string()];
        l3out.external_epgs.push(all);
        let findings = analyze_vrf_isolation(&finalized(config));
        assert_eq!(findings.len(), 0);
    }
}
