//! External connectivity: L3Outs with their routing protocols, and L2Outs.

use std::collections::BTreeMap;

/// A layer-3 external network (l3extOut): the fabric's routed edge.
#[derive(Debug, Clone)]
pub struct L3Out {
    /// Canonical `tenant:name` key.
    pub name: String,
    pub tenant: String,
    /// Raw local VRF name until the resolver barrier rewrites it.
    pub vrf: Option<String>,
    pub description: Option<String>,
    pub bgp_process: Option<BgpProcess>,
    pub bgp_peers: Vec<BgpPeer>,
    pub ospf: Option<OspfConfig>,
    pub static_routes: Vec<StaticRoute>,
    pub external_epgs: Vec<ExternalEpg>,
}

impl L3Out {
    pub fn new(name: String, tenant: String) -> Self {
        Self {
            name,
            tenant,
            vrf: None,
            description: None,
            bgp_process: None,
            bgp_peers: Vec::new(),
            ospf: None,
            static_routes: Vec::new(),
            external_epgs: Vec::new(),
        }
    }

    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }
}

/// Fabric-side BGP process settings (bgpExtP attributes).
#[derive(Debug, Clone, Default)]
pub struct BgpProcess {
    pub router_id: Option<String>,
    pub asn: Option<u32>,
}

/// One BGP neighbor (bgpPeerP) under an L3Out.
#[derive(Debug, Clone)]
pub struct BgpPeer {
    pub address: String,
    /// Remote AS number; `None` when the export omitted or mangled it.
    pub remote_asn: Option<u32>,
    pub local_asn: Option<u32>,
    pub description: Option<String>,
}

impl BgpPeer {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            remote_asn: None,
            local_asn: None,
            description: None,
        }
    }
}

/// OSPF settings for an L3Out (ospfExtP plus its interface policies).
#[derive(Debug, Clone, Default)]
pub struct OspfConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Explicit process id; synthesis falls back to the L3Out name.
    pub process_id: Option<String>,
    /// Area id exactly as exported (`"0"`, `"0.0.0.10"`, `"backbone"`).
    pub area_id: Option<String>,
    pub areas: BTreeMap<String, OspfArea>,
    pub interfaces: Vec<OspfInterface>,
}

/// One OSPF area and its declared networks.
#[derive(Debug, Clone)]
pub struct OspfArea {
    pub area_id: String,
    pub area_type: OspfAreaType,
    pub networks: Vec<String>,
}

impl OspfArea {
    pub fn new(area_id: &str) -> Self {
        Self {
            area_id: area_id.to_string(),
            area_type: OspfAreaType::Regular,
            networks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OspfAreaType {
    Regular,
    Stub,
    Nssa,
}

impl OspfAreaType {
    /// APIC writes `stub` and `nssa`; everything else is a regular area.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("stub") => OspfAreaType::Stub,
            Some("nssa") => OspfAreaType::Nssa,
            _ => OspfAreaType::Regular,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OspfAreaType::Regular => "regular",
            OspfAreaType::Stub => "stub",
            OspfAreaType::Nssa => "nssa",
        }
    }
}

/// Per-interface OSPF settings (ospfIfP).
#[derive(Debug, Clone, Default)]
pub struct OspfInterface {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cost: Option<u32>,
    pub hello_interval: Option<u32>,
    pub dead_interval: Option<u32>,
    pub network_type: Option<String>,
    pub passive: Option<bool>,
}

/// A static route (ipRouteP) declared under an external EPG.
#[derive(Debug, Clone)]
pub struct StaticRoute {
    pub prefix: String,
    pub next_hops: Vec<String>,
    /// Administrative preference; synthesis defaults it to 1.
    pub preference: Option<u32>,
    pub interface: Option<String>,
}

impl StaticRoute {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            next_hops: Vec::new(),
            preference: None,
            interface: None,
        }
    }
}

/// An external EPG (l3extInstP) classifying outside prefixes.
#[derive(Debug, Clone)]
pub struct ExternalEpg {
    pub name: String,
    pub description: Option<String>,
    /// Classified prefixes in `a.b.c.d/len` form.
    pub subnets: Vec<String>,
    /// When set, each subnet also becomes a static route via this next hop.
    pub next_hop: Option<String>,
    pub provided_contracts: Vec<String>,
    pub consumed_contracts: Vec<String>,
}

impl ExternalEpg {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            subnets: Vec::new(),
            next_hop: None,
            provided_contracts: Vec::new(),
            consumed_contracts: Vec::new(),
        }
    }
}

/// A layer-2 external network (l2extOut) extending a bridge domain.
#[derive(Debug, Clone)]
pub struct L2Out {
    /// Canonical `tenant:name` key.
    pub name: String,
    pub tenant: String,
    /// Raw local bridge domain name until the resolver barrier rewrites it.
    pub bridge_domain: Option<String>,
    /// VLAN encapsulation (`vlan-200`) from the bridge domain binding.
    pub encapsulation: Option<String>,
    pub description: Option<String>,
}

impl L2Out {
    pub fn new(name: String, tenant: String) -> Self {
        Self {
            name,
            tenant,
            bridge_domain: None,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ospf_area_type_parses_known_values() {
        assert_eq!(OspfAreaType::parse(Some("stub")), OspfAreaType::Stub);
        assert_eq!(OspfAreaType::parse(Some("nssa")), OspfAreaType::Nssa);
        assert_eq!(OspfAreaType::parse(Some("regular")), OspfAreaType::Regular);
        assert_eq!(OspfAreaType::parse(None), OspfAreaType::Regular);
    }
}
