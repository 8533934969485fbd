//! Tenants and the objects they own.

use std::collections::BTreeMap;

use super::contract::{Contract, Filter};
use super::l3out::{L2Out, L3Out};
use super::{epg_key, scoped_key};

/// Top-level administrative and policy boundary.
///
/// Every object a tenant owns is stored under its canonical key, so the maps
/// can be merged into fabric-wide views without renaming. The `get_or_create`
/// accessors make ingestion idempotent: seeing the same object twice in an
/// export updates one entry instead of creating a duplicate.
#[derive(Debug, Clone)]
pub struct Tenant {
    pub name: String,
    pub description: Option<String>,
    pub vrfs: BTreeMap<String, Vrf>,
    pub bridge_domains: BTreeMap<String, BridgeDomain>,
    pub epgs: BTreeMap<String, Epg>,
    pub contracts: BTreeMap<String, Contract>,
    pub taboo_contracts: BTreeMap<String, Contract>,
    pub filters: BTreeMap<String, Filter>,
    pub l3outs: BTreeMap<String, L3Out>,
    pub l2outs: BTreeMap<String, L2Out>,
}

impl Tenant {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            vrfs: BTreeMap::new(),
            bridge_domains: BTreeMap::new(),
            epgs: BTreeMap::new(),
            contracts: BTreeMap::new(),
            taboo_contracts: BTreeMap::new(),
            filters: BTreeMap::new(),
            l3outs: BTreeMap::new(),
            l2outs: BTreeMap::new(),
        }
    }

    pub fn get_or_create_vrf(&mut self, local_name: &str) -> &mut Vrf {
        let key = scoped_key(&self.name, local_name);
        let tenant = self.name.clone();
        self.vrfs
            .entry(key.clone())
            .or_insert_with(|| Vrf::new(key, tenant))
    }

    pub fn get_or_create_bridge_domain(&mut self, local_name: &str) -> &mut BridgeDomain {
        let key = scoped_key(&self.name, local_name);
        let tenant = self.name.clone();
        self.bridge_domains
            .entry(key.clone())
            .or_insert_with(|| BridgeDomain::new(key, tenant))
    }

    /// EPGs are scoped by application profile as well as tenant. EPGs that
    /// sit directly under a tenant (uncommon, but exports do it) key as
    /// `tenant:epg` with no profile segment.
    pub fn get_or_create_epg(&mut self, app_profile: Option<&str>, local_name: &str) -> &mut Epg {
        let key = match app_profile {
            Some(ap) => epg_key(&self.name, ap, local_name),
            None => scoped_key(&self.name, local_name),
        };
        let tenant = self.name.clone();
        self.epgs
            .entry(key.clone())
            .or_insert_with(|| Epg::new(key, tenant))
    }

    pub fn get_or_create_contract(&mut self, local_name: &str) -> &mut Contract {
        let key = scoped_key(&self.name, local_name);
        let tenant = self.name.clone();
        self.contracts
            .entry(key.clone())
            .or_insert_with(|| Contract::new(key, tenant))
    }

    pub fn get_or_create_taboo_contract(&mut self, local_name: &str) -> &mut Contract {
        let key = scoped_key(&self.name, local_name);
        let tenant = self.name.clone();
        self.taboo_contracts
            .entry(key.clone())
            .or_insert_with(|| Contract::new(key, tenant))
    }

    pub fn get_or_create_filter(&mut self, local_name: &str) -> &mut Filter {
        let key = scoped_key(&self.name, local_name);
        let tenant = self.name.clone();
        self.filters
            .entry(key.clone())
            .or_insert_with(|| Filter::new(key, tenant))
    }

    pub fn get_or_create_l3out(&mut self, local_name: &str) -> &mut L3Out {
        let key = scoped_key(&self.name, local_name);
        let tenant = self.name.clone();
        self.l3outs
            .entry(key.clone())
            .or_insert_with(|| L3Out::new(key, tenant))
    }

    pub fn get_or_create_l2out(&mut self, local_name: &str) -> &mut L2Out {
        let key = scoped_key(&self.name, local_name);
        let tenant = self.name.clone();
        self.l2outs
            .entry(key.clone())
            .or_insert_with(|| L2Out::new(key, tenant))
    }
}

/// A routing and forwarding context (fvCtx).
///
/// The name is fixed at creation; everything downstream keys on it, so there
/// is deliberately no way to rename a VRF once it exists.
#[derive(Debug, Clone)]
pub struct Vrf {
    name: String,
    pub tenant: String,
    pub description: Option<String>,
}

impl Vrf {
    pub fn new(name: String, tenant: String) -> Self {
        Self {
            name,
            tenant,
            description: None,
        }
    }

    /// Canonical `tenant:name` key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local name without the tenant prefix.
    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }
}

/// A layer-2 flood domain (fvBD) with its gateway subnets.
#[derive(Debug, Clone)]
pub struct BridgeDomain {
    /// Canonical `tenant:name` key.
    pub name: String,
    pub tenant: String,
    /// Raw local VRF name until the resolver barrier rewrites it; canonical
    /// key or `None` afterwards.
    pub vrf: Option<String>,
    /// Gateway subnets in `a.b.c.d/len` form, exactly as exported.
    pub subnets: Vec<String>,
    /// VLAN encapsulation (`vlan-140`) taken from the BD's path attachment.
    pub encapsulation: Option<String>,
    pub description: Option<String>,
}

impl BridgeDomain {
    pub fn new(name: String, tenant: String) -> Self {
        Self {
            name,
            tenant,
            vrf: None,
            subnets: Vec::new(),
            encapsulation: None,
            description: None,
        }
    }

    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }
}

/// An endpoint group (fvAEPg): where workloads attach and policy applies.
#[derive(Debug, Clone)]
pub struct Epg {
    /// Canonical `tenant:app-profile:name` key.
    pub name: String,
    pub tenant: String,
    /// Raw local bridge domain name until the resolver barrier rewrites it.
    pub bridge_domain: Option<String>,
    pub provided_contracts: Vec<String>,
    pub consumed_contracts: Vec<String>,
    pub protected_by_taboos: Vec<String>,
    pub description: Option<String>,
}

impl Epg {
    pub fn new(name: String, tenant: String) -> Self {
        Self {
            name,
            tenant,
            bridge_domain: None,
            provided_contracts: Vec::new(),
            consumed_contracts: Vec::new(),
            protected_by_taboos: Vec::new(),
            description: None,
        }
    }

    /// Local name without the tenant and application profile prefix.
    pub fn local_name(&self) -> &str {
        match self.name.rsplit_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_are_keyed_by_canonical_name() {
        let mut tenant = Tenant::new("t1");
        tenant.get_or_create_vrf("vrf1");
        assert!(tenant.vrfs.contains_key("t1:vrf1"));
        assert_eq!(tenant.vrfs["t1:vrf1"].local_name(), "vrf1");

        tenant.get_or_create_epg(Some("app1"), "web");
        assert!(tenant.epgs.contains_key("t1:app1:web"));
        assert_eq!(tenant.epgs["t1:app1:web"].local_name(), "web");
    }

    #[test]
    fn get_or_create_reuses_existing_entries() {
        let mut tenant = Tenant::new("t1");
        tenant.get_or_create_bridge_domain("bd1").subnets.push("10.0.0.1/24".to_string());
        tenant.get_or_create_bridge_domain("bd1").subnets.push("10.0.1.1/24".to_string());
        assert_eq!(tenant.bridge_domains.len(), 1);
        assert_eq!(tenant.bridge_domains["t1:bd1"].subnets.len(), 2);
    }

    #[test]
    fn contracts_and_taboos_live_in_separate_maps() {
        let mut tenant = Tenant::new("t1");
        tenant.get_or_create_contract("deny-all");
        tenant.get_or_create_taboo_contract("deny-all");
        assert_eq!(tenant.contracts.len(), 1);
        assert_eq!(tenant.taboo_contracts.len(), 1);
    }
}
