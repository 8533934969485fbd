//! Static analysis over a finalized fabric model.
//!
//! Four independent read-only passes: subnet conflicts, VRF isolation,
//! contract permissiveness, and EPG reachability. Each returns its own
//! finding family; [`analyze_fabric`] runs all of them and bundles the
//! results for reporting.

pub mod contracts;
pub mod findings;
pub mod reachability;
pub mod subnet;
pub mod vrf_isolation;

use serde::Serialize;

pub use contracts::analyze_contract_usage;
pub use findings::{
    ContractUsageCategory, ContractUsageFinding, FindingPayload, ReachabilityCategory,
    ReachabilityFinding, ReachabilityFindingBuilder, Severity, SubnetCategory, SubnetFinding,
    VrfIsolationCategory, VrfIsolationFinding,
};
pub use reachability::analyze_reachability;
pub use subnet::{analyze_subnets, subnets_overlap};
pub use vrf_isolation::analyze_vrf_isolation;

use crate::model::{Epg, FabricConfig};

/// Findings from every analyzer, grouped by family. Each list is already
/// deduplicated and ordered by descending severity.
#[derive(Debug, Clone, Serialize)]
pub struct FabricFindings {
    pub subnet: Vec<SubnetFinding>,
    pub vrf_isolation: Vec<VrfIsolationFinding>,
    pub contract_usage: Vec<ContractUsageFinding>,
    pub reachability: Vec<ReachabilityFinding>,
}

impl FabricFindings {
    pub fn total(&self) -> usize {
        self.subnet.len()
            + self.vrf_isolation.len()
            + self.contract_usage.len()
            + self.reachability.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.severities().filter(|s| *s == severity).count()
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.severities().max()
    }

    fn severities(&self) -> impl Iterator<Item = Severity> + '_ {
        self.subnet
            .iter()
            .map(SubnetFinding::severity)
            .chain(self.vrf_isolation.iter().map(VrfIsolationFinding::severity))
            .chain(self.contract_usage.iter().map(ContractUsageFinding::severity))
            .chain(self.reachability.iter().map(ReachabilityFinding::severity))
    }
}

/// Run all four analyzers over a finalized model.
pub fn analyze_fabric(config: &FabricConfig) -> FabricFindings {
    FabricFindings {
        subnet: analyze_subnets(config),
        vrf_isolation: analyze_vrf_isolation(config),
        contract_usage: analyze_contract_usage(config),
        reachability: analyze_reachability(config),
    }
}

/// VRF an EPG forwards in, resolved through its bridge domain.
pub(crate) fn epg_vrf<'a>(config: &'a FabricConfig, epg: &Epg) -> Option<&'a str> {
    let bd = config.find_bridge_domain(epg.bridge_domain.as_deref()?)?;
    bd.vrf.as_deref()
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

    #[test]
    fn analyze_fabric_collects_all_families() {
        let mut config = FabricConfig::new("fab1");
        let tenant = config.get_or_create_tenant("t1");
        tenant.get_or_create_vrf("v1");
        tenant.get_or_create_vrf("v2");
        let bd1 = tenant.get_or_create_bridge_domain("bd1");
        bd1.vrf = Some("v1".to_string());
        bd1.subnets = vec!["10.1.1.0/24".to_string()];
        let bd2 = tenant.get_or_create_bridge_domain("bd2");
        bd2.vrf = Some("v2".to_string());
        bd2.subnets = vec!["10.1.1.0/24".to_string()];
        tenant.get_or_create_epg(Some("app"), "web");
        tenant.get_or_create_contract("c1");
        let findings = analyze_fabric(&finalized(config));

        // Duplicate subnet, cross-VRF subnet reuse, bare EPG, and an
        // unreferenced permit-only contract.
        assert_eq!(findings.subnet.len(), 1);
        assert_eq!(findings.vrf_isolation.len(), 1);
        assert_eq!(findings.reachability.len(), 2);
        assert_eq!(findings.contract_usage.len(), 2);
        assert_eq!(findings.total(), 6);
        assert!(!findings.is_empty());
        assert_eq!(findings.max_severity(), Some(Severity::High));
        assert_eq!(findings.count(Severity::High), 2);
        assert_eq!(findings.count(Severity::Medium), 1);
        assert_eq!(findings.count(Severity::Low), 3);
    }

    #[test]
    fn epg_vrf_resolves_through_the_bridge_domain() {
        let mut config = FabricConfig::new("fab1");
        let tenant = config.get_or_create_tenant("t1");
        tenant.get_or_create_vrf("v1");
        tenant.get_or_create_bridge_domain("bd1").vrf = Some("v1".to_string());
        tenant.get_or_create_epg(Some("app"), "web").bridge_domain = Some("bd1".to_string());
        tenant.get_or_create_epg(Some("app"), "orphan");
        let config = finalized(config);

        let web = config.find_epg("t1:app:web").expect("epg");
        let orphan = config.find_epg("t1:app:orphan").expect("epg");
        assert_eq!(epg_vrf(&config, web), Some("t1:v1"));
        assert_eq!(epg_vrf(&config, orphan), None);
    }
}
