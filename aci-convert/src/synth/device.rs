use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::FilterAction;

/// Default MTU for fabric-facing interfaces (jumbo frames).
pub const DEFAULT_MTU: u32 = 9000;

/// Name of the VRF every device carries even when the fabric defines none.
pub const DEFAULT_VRF: &str = "default";

/// One standalone device configuration compiled from a fabric node.
///
/// Every map is ordered so that serializing the same model twice produces
/// byte-identical output.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceConfig {
    pub hostname: String,
    /// Display name, usually the raw node name from the export.
    pub human_name: String,
    pub vrfs: BTreeMap<String, DeviceVrf>,
    pub interfaces: BTreeMap<String, Interface>,
    /// IP access lists keyed by their generated `~CONTRACT~` / `~TABOO~` name.
    pub acls: BTreeMap<String, IpAccessList>,
}

impl DeviceConfig {
    pub fn new(hostname: &str, human_name: &str) -> Self {
        let mut vrfs = BTreeMap::new();
        vrfs.insert(DEFAULT_VRF.to_string(), DeviceVrf::new(DEFAULT_VRF));
        Self {
            hostname: hostname.to_string(),
            human_name: human_name.to_string(),
            vrfs,
            interfaces: BTreeMap::new(),
            acls: BTreeMap::new(),
        }
    }

    /// Returns the named VRF or the default VRF when the name is unknown.
    pub fn vrf_or_default(&mut self, name: &str) -> &mut DeviceVrf {
        let key = if self.vrfs.contains_key(name) {
            name
        } else {
            DEFAULT_VRF
        };
        self.vrfs
            .entry(key.to_string())
            .or_insert_with(|| DeviceVrf::new(key))
    }
}

/// Per-VRF routing state embedded in a device configuration.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceVrf {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgp: Option<BgpConfig>,
    /// OSPF processes keyed by process id.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub ospf: BTreeMap<String, OspfProcess>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub static_routes: Vec<StaticRouteEntry>,
}

impl DeviceVrf {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            bgp: None,
            ospf: BTreeMap::new(),
            static_routes: Vec::new(),
        }
    }
}

/// BGP process state for one VRF.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BgpConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_asn: Option<u32>,
    pub neighbors: Vec<BgpNeighbor>,
}

impl BgpConfig {
    /// Adds a neighbor unless one with the same (address, ASN) pair exists.
    pub fn add_neighbor(&mut self, neighbor: BgpNeighbor) {
        let exists = self
            .neighbors
            .iter()
            .any(|n| n.address == neighbor.address && n.remote_asn == neighbor.remote_asn);
        if !exists {
            self.neighbors.push(neighbor);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BgpNeighbor {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_asn: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_asn: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OSPF process state for one VRF.
#[derive(Debug, Clone, Serialize)]
pub struct OspfProcess {
    pub process_id: String,
    pub router_id: String,
    pub reference_bandwidth: f64,
    /// Areas keyed by numeric area id.
    pub areas: BTreeMap<u32, OspfAreaConfig>,
    /// Per-interface settings keyed by resolved interface name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub interfaces: BTreeMap<String, OspfInterfaceSettings>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OspfAreaConfig {
    pub area_id: u32,
    pub area_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OspfInterfaceSettings {
    pub area: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<u32>,
    pub hello_interval: u32,
    pub dead_interval: u32,
    pub network_type: String,
    pub passive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaticRouteEntry {
    pub prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_hop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    pub admin_distance: u32,
}

/// One logical or physical interface on a synthesized device.
#[derive(Debug, Clone, Serialize)]
pub struct Interface {
    pub name: String,
    #[serde(rename = "type")]
    pub interface_type: InterfaceType,
    pub vrf: String,
    pub enabled: bool,
    pub mtu: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u32>,
    /// Primary address in `a.b.c.d/len` form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secondary_addresses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Interface {
    pub fn new(name: &str, interface_type: InterfaceType) -> Self {
        Self {
            name: name.to_string(),
            interface_type,
            vrf: DEFAULT_VRF.to_string(),
            enabled: true,
            mtu: DEFAULT_MTU,
            vlan: None,
            address: None,
            secondary_addresses: Vec::new(),
            human_name: None,
            description: None,
        }
    }

    /// Appends a fragment to the description with a `" | "` separator.
    pub fn append_description(&mut self, fragment: &str) {
        match &mut self.description {
            Some(existing) if !existing.is_empty() => {
                existing.push_str(" | ");
                existing.push_str(fragment);
            }
            _ => self.description = Some(fragment.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterfaceType {
    Physical,
    Vlan,
    Loopback,
    Aggregated,
}

/// A compiled IP access list.
#[derive(Debug, Clone, Serialize)]
pub struct IpAccessList {
    pub name: String,
    pub lines: Vec<AclLine>,
}

/// One match line of a compiled access list.
///
/// A line with no protocol, port, or ICMP constraint matches all traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AclLine {
    pub action: FilterAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dst_ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub src_ports: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp_code: Option<String>,
    /// Trace text naming the contract, filter, and entry the line came from.
    pub name: String,
}

impl AclLine {
    pub fn new(action: FilterAction, name: String) -> Self {
        Self {
            action,
            protocol: None,
            dst_ports: Vec::new(),
            src_ports: Vec::new(),
            icmp_type: None,
            icmp_code: None,
            name,
        }
    }

    /// True when the line carries no constraint at all.
    pub fn matches_any(&self) -> bool {
        self.protocol.is_none()
            && self.dst_ports.is_empty()
            && self.src_ports.is_empty()
            && self.icmp_type.is_none()
            && self.icmp_code.is_none()
    }

    /// The same match with source and destination ports swapped.
    pub fn reversed(&self) -> Self {
        let mut line = self.clone();
        std::mem::swap(&mut line.dst_ports, &mut line.src_ports);
        line.name.push_str(" (reverse)");
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_config_always_carries_default_vrf() {
        let device = DeviceConfig::new("leaf-101", "Leaf-101");
        assert!(device.vrfs.contains_key(DEFAULT_VRF));
    }

    #[test]
    fn vrf_or_default_falls_back_for_unknown_names() {
        let mut device = DeviceConfig::new("leaf-101", "Leaf-101");
        device
            .vrfs
            .insert("t1:prod".to_string(), DeviceVrf::new("t1:prod"));
        assert_eq!(device.vrf_or_default("t1:prod").name, "t1:prod");
        assert_eq!(device.vrf_or_default("t1:missing").name, DEFAULT_VRF);
    }

    #[test]
    fn bgp_neighbors_dedup_on_address_and_asn() {
        let mut bgp = BgpConfig::default();
        let neighbor = BgpNeighbor {
            address: "10.0.0.1".to_string(),
            remote_asn: Some(65001),
            local_asn: None,
            description: None,
        };
        bgp.add_neighbor(neighbor.clone());
        bgp.add_neighbor(neighbor.clone());
        // Same address with a different ASN is a distinct peer record.
        bgp.add_neighbor(BgpNeighbor {
            remote_asn: Some(65002),
            ..neighbor
        });
        assert_eq!(bgp.neighbors.len(), 2);
    }

    #[test]
    fn reversed_line_swaps_port_directions() {
        let mut line = AclLine::new(FilterAction::Permit, "web".to_string());
        line.dst_ports.push("443".to_string());
        let reversed = line.reversed();
        assert!(reversed.dst_ports.is_empty());
        assert_eq!(reversed.src_ports, vec!["443".to_string()]);
        assert_eq!(reversed.name, "web (reverse)");
    }

    #[test]
    fn line_without_constraints_matches_any() {
        let line = AclLine::new(FilterAction::Deny, "catch-all".to_string());
        assert!(line.matches_any());
        let mut constrained = line.clone();
        constrained.protocol = Some("tcp".to_string());
        assert!(!constrained.matches_any());
    }
}
