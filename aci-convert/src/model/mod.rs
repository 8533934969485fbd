//! The fabric object model.
//!
//! An APIC export is a tree of managed objects. Ingestion flattens that tree
//! into a [`FabricConfig`]: tenants with their policy objects, fabric nodes
//! with their interfaces, VPC pairs, and management addresses. Everything is
//! keyed by canonical names (`tenant:name` for tenant-scoped objects,
//! `tenant:app-profile:epg` for EPGs) in ordered maps, so iteration and output
//! are deterministic.
//!
//! Cross-references between objects (a bridge domain naming its VRF, an EPG
//! naming its contracts) arrive as bare local names. They stay raw until
//! [`FabricConfig::finalize`] runs, after which every reference is either a
//! canonical key or explicitly absent. Code downstream of the barrier never
//! sees a dangling name.

use std::collections::BTreeMap;

pub mod contract;
pub mod fabric;
pub mod ingest;
pub mod l3out;
pub mod tenant;

pub use contract::{Contract, Filter, FilterAction, FilterEntry, FilterRef, Subject};
pub use fabric::{
    detect_inter_fabric_connections, FabricLink, FabricNode, InterFabricConnection,
    ManagementInfo, NodeInterface, NodeRole, PathAttachment, VpcPair,
};
pub use ingest::{build_model, export_source_name, ingest_tree, MoClass};
pub use l3out::{
    BgpPeer, BgpProcess, ExternalEpg, L2Out, L3Out, OspfArea, OspfAreaType, OspfConfig,
    OspfInterface, StaticRoute,
};
pub use tenant::{BridgeDomain, Epg, Tenant, Vrf};

/// Canonical key for a tenant-scoped object: `tenant:name`.
pub fn scoped_key(tenant: &str, name: &str) -> String {
    format!("{}:{}", tenant, name)
}

/// Canonical key for an EPG: `tenant:app-profile:epg`.
pub fn epg_key(tenant: &str, app_profile: &str, name: &str) -> String {
    format!("{}:{}:{}", tenant, app_profile, name)
}

/// Append-only sink for tolerated anomalies.
///
/// Nothing recorded here is fatal. Each message describes something ingestion
/// or synthesis accepted but an operator probably wants to know about, in the
/// order it was encountered. Duplicates are kept.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one warning message.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Everything learned from one APIC export.
///
/// All collections are ordered maps so synthesis and reporting are stable
/// across runs. The `hostname` is the identity of the fabric itself (derived
/// from the export's source name, always lowercase); per-node hostnames are
/// derived from it during synthesis when a node has no usable name.
#[derive(Debug, Clone)]
pub struct FabricConfig {
    hostname: String,
    pub tenants: BTreeMap<String, Tenant>,
    /// Fabric switches keyed by node id (`"101"`, `"201"`, ...).
    pub fabric_nodes: BTreeMap<String, FabricNode>,
    /// VPC protection groups keyed by their explicit group id.
    pub vpc_pairs: BTreeMap<String, VpcPair>,
    /// Out-of-band management addresses keyed by node id.
    pub management: BTreeMap<String, ManagementInfo>,
    /// EPG static path bindings, keyed by node id and then interface name.
    pub path_attachments: BTreeMap<String, BTreeMap<String, PathAttachment>>,
    finalized: bool,
}

impl FabricConfig {
    pub fn new(source_name: &str) -> Self {
        Self {
            hostname: source_name.to_lowercase(),
            tenants: BTreeMap::new(),
            fabric_nodes: BTreeMap::new(),
            vpc_pairs: BTreeMap::new(),
            management: BTreeMap::new(),
            path_attachments: BTreeMap::new(),
            finalized: false,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Hostnames are case-insensitive identifiers; stored lowercase.
    pub fn set_hostname(&mut self, hostname: &str) {
        self.hostname = hostname.to_lowercase();
    }

    /// Returns the tenant, creating an empty one on first use.
    ///
    /// Calling this twice with the same name returns the same entry; repeated
    /// fragments of a tenant in an export accumulate into one object.
    pub fn get_or_create_tenant(&mut self, name: &str) -> &mut Tenant {
        self.tenants
            .entry(name.to_string())
            .or_insert_with(|| Tenant::new(name))
    }

    /// Returns the fabric node with this id, creating a bare one on first use.
    pub fn get_or_create_fabric_node(&mut self, id: &str) -> &mut FabricNode {
        self.fabric_nodes
            .entry(id.to_string())
            .or_insert_with(|| FabricNode::new(id))
    }

    /// Records a static path binding against every node its DN names.
    pub fn add_path_attachment(&mut self, attachment: PathAttachment) {
        for node_id in &attachment.node_ids {
            self.path_attachments
                .entry(node_id.clone())
                .or_default()
                .insert(attachment.interface.clone(), attachment.clone());
        }
    }

    pub fn find_vrf(&self, key: &str) -> Option<&Vrf> {
        let (tenant, _) = key.split_once(':')?;
        self.tenants.get(tenant)?.vrfs.get(key)
    }

    pub fn find_bridge_domain(&self, key: &str) -> Option<&BridgeDomain> {
        let (tenant, _) = key.split_once(':')?;
        self.tenants.get(tenant)?.bridge_domains.get(key)
    }

    pub fn find_epg(&self, key: &str) -> Option<&Epg> {
        let (tenant, _) = key.split_once(':')?;
        self.tenants.get(tenant)?.epgs.get(key)
    }

    pub fn find_contract(&self, key: &str) -> Option<&Contract> {
        let (tenant, _) = key.split_once(':')?;
        self.tenants.get(tenant)?.contracts.get(key)
    }

    pub fn find_filter(&self, key: &str) -> Option<&Filter> {
        let (tenant, _) = key.split_once(':')?;
        self.tenants.get(tenant)?.filters.get(key)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// The resolver barrier.
    ///
    /// Rewrites every raw cross-reference to its canonical key when the target
    /// exists in the owning tenant, and clears it (with one diagnostic) when it
    /// does not. Also drops management entries that point at nodes the export
    /// never defined. Runs once; later calls are no-ops.
    pub fn finalize(&mut self, diags: &mut Diagnostics) {
        if self.finalized {
            return;
        }
        for tenant in self.tenants.values_mut() {
            resolve_tenant_refs(tenant, diags);
        }
        let unknown: Vec<String> = self
            .management
            .keys()
            .filter(|id| !self.fabric_nodes.contains_key(id.as_str()))
            .cloned()
            .collect();
        for id in unknown {
            if let Some(info) = self.management.remove(&id) {
                diags.warn(format!(
                    "management address {} references unknown node {}",
                    info.address, id
                ));
            }
        }
        self.finalized = true;
    }
}

fn resolve_tenant_refs(tenant: &mut Tenant, diags: &mut Diagnostics) {
    let Tenant {
        name,
        vrfs,
        bridge_domains,
        epgs,
        contracts,
        taboo_contracts,
        filters,
        l3outs,
        l2outs,
        ..
    } = tenant;

    for bd in bridge_domains.values_mut() {
        if let Some(raw) = bd.vrf.take() {
            let key = scoped_key(name, &raw);
            if vrfs.contains_key(&key) {
                bd.vrf = Some(key);
            } else {
                diags.warn(format!(
                    "bridge domain {} in tenant {} references unknown VRF {}",
                    bd.name, name, raw
                ));
            }
        }
    }

    for epg in epgs.values_mut() {
        if let Some(raw) = epg.bridge_domain.take() {
            let key = scoped_key(name, &raw);
            if bridge_domains.contains_key(&key) {
                epg.bridge_domain = Some(key);
            } else {
                diags.warn(format!(
                    "EPG {} in tenant {} references unknown bridge domain {}",
                    epg.name, name, raw
                ));
            }
        }
        let owner = format!("EPG {}", epg.name);
        resolve_refs(&mut epg.provided_contracts, contracts, name, &owner, "contract", diags);
        resolve_refs(&mut epg.consumed_contracts, contracts, name, &owner, "contract", diags);
        resolve_refs(
            &mut epg.protected_by_taboos,
            taboo_contracts,
            name,
            &owner,
            "taboo contract",
            diags,
        );
    }

    for contract in contracts.values_mut().chain(taboo_contracts.values_mut()) {
        for subject in &mut contract.subjects {
            for fref in &mut subject.filters {
                if fref.name.is_empty() {
                    continue;
                }
                let key = scoped_key(name, &fref.name);
                if filters.contains_key(&key) {
                    fref.resolved = Some(key);
                }
            }
        }
    }

    for l3out in l3outs.values_mut() {
        if let Some(raw) = l3out.vrf.take() {
            let key = scoped_key(name, &raw);
            if vrfs.contains_key(&key) {
                l3out.vrf = Some(key);
            } else {
                diags.warn(format!(
                    "L3Out {} in tenant {} references unknown VRF {}",
                    l3out.name, name, raw
                ));
            }
        }
        for ext_epg in &mut l3out.external_epgs {
            let owner = format!("external EPG {}", ext_epg.name);
            resolve_refs(
                &mut ext_epg.provided_contracts,
                contracts,
                name,
                &owner,
                "contract",
                diags,
            );
            resolve_refs(
                &mut ext_epg.consumed_contracts,
                contracts,
                name,
                &owner,
                "contract",
                diags,
            );
        }
    }

    for l2out in l2outs.values_mut() {
        if let Some(raw) = l2out.bridge_domain.take() {
            let key = scoped_key(name, &raw);
            if bridge_domains.contains_key(&key) {
                l2out.bridge_domain = Some(key);
            } else {
                diags.warn(format!(
                    "L2Out {} in tenant {} references unknown bridge domain {}",
                    l2out.name, name, raw
                ));
            }
        }
    }
}

/// Rewrites a list of raw local names to canonical keys, dropping (and
/// recording) any that do not resolve within the tenant.
fn resolve_refs<V>(
    refs: &mut Vec<String>,
    pool: &BTreeMap<String, V>,
    tenant: &str,
    owner: &str,
    kind: &str,
    diags: &mut Diagnostics,
) {
    let raw = std::mem::take(refs);
    for local in raw {
        let key = scoped_key(tenant, &local);
        if pool.contains_key(&key) {
            refs.push(key);
        } else {
            diags.warn(format!(
                "{} in tenant {} references unknown {} {}",
                owner, tenant, kind, local
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_tenant_is_idempotent() {
        let mut config = FabricConfig::new("fab1.json");
        config.get_or_create_tenant("t1").description = Some("first".to_string());
        config.get_or_create_tenant("t1");
        assert_eq!(config.tenants.len(), 1);
        assert_eq!(
            config.tenants["t1"].description.as_deref(),
            Some("first"),
            "second call must not reset the existing tenant"
        );
    }

    #[test]
    fn scoped_keys_use_tenant_prefix() {
        assert_eq!(scoped_key("t1", "vrf1"), "t1:vrf1");
        assert_eq!(epg_key("t1", "app1", "web"), "t1:app1:web");
    }

    #[test]
    fn hostname_is_lowercased() {
        let config = FabricConfig::new("ACI-DC1.JSON");
        assert_eq!(config.hostname(), "aci-dc1.json");
    }

    #[test]
    fn finalize_rewrites_resolvable_refs_to_canonical_keys() {
        let mut config = FabricConfig::new("fab");
        let tenant = config.get_or_create_tenant("t1");
        tenant.get_or_create_vrf("prod");
        let bd = tenant.get_or_create_bridge_domain("bd1");
        bd.vrf = Some("prod".to_string());

        let mut diags = Diagnostics::new();
        config.finalize(&mut diags);

        let bd = config.find_bridge_domain("t1:bd1").expect("bd exists");
        assert_eq!(bd.vrf.as_deref(), Some("t1:prod"));
        assert!(diags.is_empty());
    }

    #[test]
    fn finalize_clears_dangling_refs_and_records_one_message() {
        let mut config = FabricConfig::new("fab");
        let tenant = config.get_or_create_tenant("t1");
        let bd = tenant.get_or_create_bridge_domain("bd1");
        bd.vrf = Some("missing".to_string());

        let mut diags = Diagnostics::new();
        config.finalize(&mut diags);

        let bd = config.find_bridge_domain("t1:bd1").expect("bd exists");
        assert_eq!(bd.vrf, None);
        assert_eq!(diags.len(), 1);
        assert!(diags.messages()[0].contains("unknown VRF missing"));
    }

    #[test]
    fn finalize_runs_once() {
        let mut config = FabricConfig::new("fab");
        let tenant = config.get_or_create_tenant("t1");
        tenant.get_or_create_bridge_domain("bd1").vrf = Some("missing".to_string());

        let mut diags = Diagnostics::new();
        config.finalize(&mut diags);
        config.finalize(&mut diags);
        assert_eq!(diags.len(), 1);
        assert!(config.is_finalized());
    }

    #[test]
    fn epg_contract_refs_resolve_or_drop() {
        let mut config = FabricConfig::new("fab");
        let tenant = config.get_or_create_tenant("t1");
        tenant.get_or_create_contract("web-to-db");
        let epg = tenant.get_or_create_epg(Some("app1"), "web");
        epg.consumed_contracts.push("web-to-db".to_string());
        epg.consumed_contracts.push("ghost".to_string());

        let mut diags = Diagnostics::new();
        config.finalize(&mut diags);

        let epg = config.find_epg("t1:app1:web").expect("epg exists");
        assert_eq!(epg.consumed_contracts, vec!["t1:web-to-db".to_string()]);
        assert_eq!(diags.len(), 1);
    }
}
