//! Fabric nodes, VPC pairs, management addresses, and topology types.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::FabricConfig;

/// One switch in the fabric (fabricNodePEp / fabricNodeIdentP).
#[derive(Debug, Clone)]
pub struct FabricNode {
    pub id: String,
    pub name: Option<String>,
    pub pod_id: String,
    pub role: NodeRole,
    /// Interfaces declared in the export, keyed by name. First declaration
    /// wins; later duplicates are ignored.
    pub interfaces: BTreeMap<String, NodeInterface>,
}

impl FabricNode {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            pod_id: "1".to_string(),
            role: NodeRole::Unspecified,
            interfaces: BTreeMap::new(),
        }
    }

    pub fn add_interface(&mut self, interface: NodeInterface) {
        self.interfaces
            .entry(interface.name.clone())
            .or_insert(interface);
    }

    pub fn is_leaf(&self) -> bool {
        self.role == NodeRole::Leaf
    }

    pub fn is_spine(&self) -> bool {
        self.role == NodeRole::Spine
    }
}

/// Switch role in the fabric. Service leaves count as leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Leaf,
    Spine,
    Unspecified,
}

impl NodeRole {
    /// Determines the role from the exported attribute, falling back to
    /// naming conventions (`dc1-leaf-101`, `spine201`) when it is missing
    /// or unhelpful.
    pub fn infer(role: Option<&str>, name: Option<&str>) -> Self {
        match role {
            Some("leaf") | Some("services") | Some("service") => return NodeRole::Leaf,
            Some("spine") => return NodeRole::Spine,
            _ => {}
        }
        if let Some(name) = name {
            let lower = name.to_lowercase();
            if lower.contains("-spine-") || lower.starts_with("spine") {
                return NodeRole::Spine;
            }
            if lower.contains("-leaf-") || lower.contains("-services-") || lower.starts_with("leaf")
            {
                return NodeRole::Leaf;
            }
        }
        NodeRole::Unspecified
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Leaf => "leaf",
            NodeRole::Spine => "spine",
            NodeRole::Unspecified => "unspecified",
        }
    }
}

/// A physical or fabric interface declared on a node in the export.
#[derive(Debug, Clone)]
pub struct NodeInterface {
    pub name: String,
    /// Raw interface type string (`physical`, `vlan`, ...); synthesis maps it.
    pub if_type: Option<String>,
    pub enabled: bool,
    pub description: Option<String>,
    /// Canonical EPG key when the interface carries a static binding.
    pub epg: Option<String>,
    pub vlan: Option<u32>,
}

impl NodeInterface {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            if_type: None,
            enabled: true,
            description: None,
            epg: None,
            vlan: None,
        }
    }
}

/// An EPG static path binding (fvRsPathAtt), tied to the nodes its DN names.
#[derive(Debug, Clone)]
pub struct PathAttachment {
    pub dn: String,
    /// One id for `paths-101`, two for `protpaths-101-102`.
    pub node_ids: Vec<String>,
    pub interface: String,
    pub encap: Option<String>,
    /// Canonical key of the EPG that owns the binding.
    pub epg: Option<String>,
    pub description: Option<String>,
}

impl PathAttachment {
    /// Parses a target DN like `topology/pod-1/paths-101/pathep-[eth1/10]`.
    /// Returns `None` when the DN names no node or no port.
    pub fn parse(dn: &str) -> Option<Self> {
        let mut node_ids = Vec::new();
        for part in dn.split('/') {
            if let Some(rest) = part.strip_prefix("protpaths-") {
                node_ids.extend(rest.split('-').map(str::to_string));
            } else if let Some(rest) = part.strip_prefix("paths-") {
                node_ids.push(rest.to_string());
            }
        }
        let start = dn.find("pathep-[")? + "pathep-[".len();
        let end = dn[start..].find(']')? + start;
        let interface = &dn[start..end];
        if node_ids.is_empty() || interface.is_empty() {
            return None;
        }
        Some(Self {
            dn: dn.to_string(),
            node_ids,
            interface: interface.to_string(),
            encap: None,
            epg: None,
            description: None,
        })
    }
}

/// An explicit VPC protection group (fabricExplicitGEp) pairing two leaves.
#[derive(Debug, Clone)]
pub struct VpcPair {
    pub id: String,
    pub name: Option<String>,
    pub peer1: String,
    pub peer2: String,
}

impl VpcPair {
    pub fn contains(&self, node_id: &str) -> bool {
        self.peer1 == node_id || self.peer2 == node_id
    }
}

/// Out-of-band management address (mgmtRsOoBStNode) for one node.
#[derive(Debug, Clone)]
pub struct ManagementInfo {
    /// Address with prefix, e.g. `10.35.1.52/24`.
    pub address: String,
    pub gateway: Option<String>,
}

/// One physical adjacency in the synthesized fabric topology.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FabricLink {
    pub node1: String,
    pub interface1: String,
    pub node2: String,
    pub interface2: String,
}

/// A detected relationship between two separately exported fabrics.
#[derive(Debug, Clone, Serialize)]
pub struct InterFabricConnection {
    pub fabric1: String,
    pub fabric2: String,
    /// `shared-external` or `bgp`.
    pub kind: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shared_subnets: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shared_bgp_peers: Vec<String>,
}

/// Compares every pair of fabrics and reports how they appear to connect:
/// identical external EPG subnets, or identical BGP peer addresses. Keys are
/// `<fabric1>-<fabric2>-external` and `<fabric1>-<fabric2>-bgp`.
pub fn detect_inter_fabric_connections(
    configs: &BTreeMap<String, FabricConfig>,
) -> BTreeMap<String, InterFabricConnection> {
    let mut connections = BTreeMap::new();
    let fabrics: Vec<&String> = configs.keys().collect();
    for i in 0..fabrics.len() {
        for j in (i + 1)..fabrics.len() {
            let (fabric1, fabric2) = (fabrics[i], fabrics[j]);
            let (config1, config2) = (&configs[fabric1], &configs[fabric2]);

            let shared_subnets: Vec<String> = external_subnets(config1)
                .intersection(&external_subnets(config2))
                .cloned()
                .collect();
            if !shared_subnets.is_empty() {
                connections.insert(
                    format!("{}-{}-external", fabric1, fabric2),
                    InterFabricConnection {
                        fabric1: fabric1.clone(),
                        fabric2: fabric2.clone(),
                        kind: "shared-external".to_string(),
                        description: "Fabrics share external subnets".to_string(),
                        shared_subnets,
                        shared_bgp_peers: Vec::new(),
                    },
                );
            }

            let shared_peers: Vec<String> = bgp_peer_addresses(config1)
                .intersection(&bgp_peer_addresses(config2))
                .cloned()
                .collect();
            if !shared_peers.is_empty() {
                connections.insert(
                    format!("{}-{}-bgp", fabric1, fabric2),
                    InterFabricConnection {
                        fabric1: fabric1.clone(),
                        fabric2: fabric2.clone(),
                        kind: "bgp".to_string(),
                        description: "Fabrics share BGP peers".to_string(),
                        shared_subnets: Vec::new(),
                        shared_bgp_peers: shared_peers,
                    },
                );
            }
        }
    }
    connections
}

fn external_subnets(config: &FabricConfig) -> BTreeSet<String> {
    let mut subnets = BTreeSet::new();
    for tenant in config.tenants.values() {
        for l3out in tenant.l3outs.values() {
            for ext_epg in &l3out.external_epgs {
                subnets.extend(ext_epg.subnets.iter().cloned());
            }
        }
    }
    subnets
}

fn bgp_peer_addresses(config: &FabricConfig) -> BTreeSet<String> {
    let mut peers = BTreeSet::new();
    for tenant in config.tenants.values() {
        for l3out in tenant.l3outs.values() {
            for peer in &l3out.bgp_peers {
                peers.insert(peer.address.clone());
            }
        }
    }
    peers
}
