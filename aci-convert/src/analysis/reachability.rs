//! EPG reachability analysis.
//!
//! Flags EPGs that cannot exchange traffic the way the policy reads:
//! an EPG bound to no bridge domain, an EPG attached to no contract at all,
//! and provider/consumer pairs whose contract spans two VRFs.

use std::collections::BTreeMap;

use crate::analysis::epg_vrf;
use crate::analysis::findings::{
    dedup_sorted, ReachabilityCategory, ReachabilityFinding, Severity,
};
use crate::model::{Epg, FabricConfig};

/// Run all reachability checks over a finalized model.
pub fn analyze_reachability(config: &FabricConfig) -> Vec<ReachabilityFinding> {
    let mut out = Vec::new();
    for tenant in config.tenants.values() {
        for epg in tenant.epgs.values() {
            check_epg(epg, &mut out);
        }
    }
    check_cross_vrf_pairs(config, &mut out);
    dedup_sorted(out, |f: &ReachabilityFinding| f.severity())
}

fn check_epg(epg: &Epg, out: &mut Vec<ReachabilityFinding>) {
    if epg.bridge_domain.is_none() {
        out.push(
            ReachabilityFinding::builder(Severity::Medium, ReachabilityCategory::EpgNoBd, &epg.name)
                .description(format!("EPG {} has no bridge domain", epg.name))
                .impact("endpoints have no forwarding context and no reachable gateway".to_string())
                .recommendation("bind the EPG to a bridge domain".to_string())
                .build(),
        );
    }
    if epg.provided_contracts.is_empty() && epg.consumed_contracts.is_empty() {
        out.push(
            ReachabilityFinding::builder(
                Severity::Low,
                ReachabilityCategory::EpgNoContract,
                &epg.name,
            )
            .description(format!(
                "EPG {} neither provides nor consumes any contract",
                epg.name
            ))
            .impact(
                "endpoints in this EPG cannot reach any other EPG under fabric policy".to_string(),
            )
            .recommendation("attach a contract or remove the EPG".to_string())
            .build(),
        );
    }
}

/// Provider/consumer pairs joined by a contract but living in different VRFs.
/// The consumer initiates, so it is reported as the source EPG.
fn check_cross_vrf_pairs(config: &FabricConfig, out: &mut Vec<ReachabilityFinding>) {
    let mut providers: BTreeMap<&str, Vec<&Epg>> = BTreeMap::new();
    let mut consumers: BTreeMap<&str, Vec<&Epg>> = BTreeMap::new();
    for tenant in config.tenants.values() {
        for epg in tenant.epgs.values() {
            for key in &epg.provided_contracts {
                providers.entry(key.as_str()).or_default().push(epg);
            }
            for key in &epg.consumed_contracts {
                consumers.entry(key.as_str()).or_default().push(epg);
            }
        }
    }
    for (contract, consuming) in &consumers {
        let Some(providing) = providers.get(contract) else {
            continue;
        };
        for consumer in consuming {
            let Some(consumer_vrf) = epg_vrf(config, consumer) else {
                continue;
            };
            for provider in providing {
                if provider.name == consumer.name {
                    continue;
                }
                let Some(provider_vrf) = epg_vrf(config, provider) else {
                    continue;
                };
                if provider_vrf == consumer_vrf {
                    continue;
                }
                out.push(
                    ReachabilityFinding::builder(
                        Severity::Medium,
                        ReachabilityCategory::CrossVrfPair,
                        &consumer.name,
                    )
                    .destination_epg(&provider.name)
                    .contract(contract)
                    .description(format!(
                        "EPG {} consumes {contract} from EPG {} across VRFs {consumer_vrf} \
                         and {provider_vrf}",
                        consumer.name, provider.name
                    ))
                    .impact("the contract alone does not create inter-VRF reachability".to_string())
                    .recommendation(
                        "verify route leaking between the VRFs or move one EPG".to_string(),
                    )
                    .build(),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Diagnostics;
    use pretty_assertions::assert_eq;

    fn finalized(mut config: FabricConfig) -> FabricConfig {
        let mut diags = Diagnostics::new();
        config.finalize(&mut diags);
        config
    }

    fn epg_in_vrf(config: &mut FabricConfig, app: &str, epg: &str, bd: &str, vrf: &str) {
        let tenant = config.get_or_create_tenant("t1");
        tenant.get_or_create_vrf(vrf);
        let domain = tenant.get_or_create_bridge_domain(bd);
        domain.vrf = Some(vrf.to_string());
        domain.subnets = vec!["10.1.1.0/24".to_string()];
        let epg = tenant.get_or_create_epg(Some(app), epg);
        epg.bridge_domain = Some(bd.to_string());
    }

    fn categories(findings: &[ReachabilityFinding]) -> Vec<ReachabilityCategory> {
        findings.iter().map(|f| f.key.category).collect()
    }

    #[test]
    fn bare_epg_is_flagged_for_bridge_domain_and_contract() {
        let mut config = FabricConfig::new("fab1");
        config.get_or_create_tenant("t1").get_or_create_epg(Some("app"), "web");
        let findings = analyze_reachability(&finalized(config));

        assert_eq!(
            categories(&findings),
            vec![
                ReachabilityCategory::EpgNoBd,
                ReachabilityCategory::EpgNoContract
            ]
        );
        assert_eq!(findings[0].key.source_epg, "t1:app:web");
        assert_eq!(findings[0].key.severity, Severity::Medium);
        assert_eq!(findings[1].key.severity, Severity::Low);
    }

    #[test]
    fn epg_with_bridge_domain_and_contract_is_quiet() {
        let mut config = FabricConfig::new("fab1");
        epg_in_vrf(&mut config, "app", "web", "bd1", "v1");
        let tenant = config.get_or_create_tenant("t1");
        tenant.get_or_create_contract("c1");
        tenant
            .get_or_create_epg(Some("app"), "web")
            .consumed_contracts
            .push("c1".to_string());
        let findings = analyze_reachability(&finalized(config));
        assert_eq!(findings.len(), 0);
    }

    #[test]
    fn consumer_and_provider_in_different_vrfs_pair_up() {
        let mut config = FabricConfig::new("fab1");
        epg_in_vrf(&mut config, "app", "web", "bd1", "v1");
        epg_in_vrf(&mut config, "app", "db", "bd2", "v2");
        let tenant = config.get_or_create_tenant("t1");
        tenant.get_or_create_contract("c1");
        tenant
            .get_or_create_epg(Some("app"), "web")
            .consumed_contracts
            .push("c1".to_string());
        tenant
            .get_or_create_epg(Some("app"), "db")
            .provided_contracts
            .push("c1".to_string());
        let findings = analyze_reachability(&finalized(config));

        assert_eq!(categories(&findings), vec![ReachabilityCategory::CrossVrfPair]);
        assert_eq!(findings[0].key.source_epg, "t1:app:web");
        assert_eq!(findings[0].key.destination_epg.as_deref(), Some("t1:app:db"));
        assert_eq!(findings[0].key.contract.as_deref(), Some("t1:c1"));
    }

    #[test]
    fn same_vrf_pair_is_quiet() {
        let mut config = FabricConfig::new("fab1");
        epg_in_vrf(&mut config, "app", "web", "bd1", "v1");
        epg_in_vrf(&mut config, "app", "db", "bd2", "v1");
        let tenant = config.get_or_create_tenant("t1");
        tenant.get_or_create_contract("c1");
        tenant
            .get_or_create_epg(Some("app"), "web")
            .consumed_contracts
            .push("c1".to_string());
        tenant
            .get_or_create_epg(Some("app"), "db")
            .provided_contracts
            .push("c1".to_string());
        let findings = analyze_reachability(&finalized(config));
        assert_eq!(findings.len(), 0);
    }

    #[test]
    fn epg_both_providing_and_consuming_does_not_pair_with_itself() {
        let mut config = FabricConfig::new("fab1");
        epg_in_vrf(&mut config, "app", "web", "bd1", "v1");
        let tenant = config.get_or_create_tenant("t1");
        tenant.get_or_create_contract("c1");
        let web = tenant.get_or_create_epg(Some("app"), "web");
        web.provided_contracts.push("c1".to_string());
        web.consumed_contracts.push("c1".to_string());
        let findings = analyze_reachability(&finalized(config));
        assert_eq!(findings.len(), 0);
    }
}
