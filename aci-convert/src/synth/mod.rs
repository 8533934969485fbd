//! Device synthesis.
//!
//! Compiles a finalized [`FabricConfig`] into standalone device
//! configurations, one per fabric node:
//!
//! 1. VRFs: the reserved default VRF plus one per fvCtx. Orphaned VRFs are
//!    kept; nothing is pruned for lack of a referencing bridge domain.
//! 2. Interfaces: declared ports, path-attachment ports, loopback0, mgmt0,
//!    role-based fallback ports, the VPC peer-link, and the VLAN gateways
//!    derived from bridge domains and L2Outs.
//! 3. Access lists compiled from contracts and taboo contracts.
//! 4. Routing: per-VRF BGP neighbors, OSPF processes, and static routes
//!    folded in from each L3Out.
//!
//! A fabric with zero nodes still yields exactly one device, keyed by the
//! fabric hostname, carrying the fabric-wide state. [`fabric_links`] derives
//! the leaf-spine layer-1 topology over the same hostname assignment.

pub mod acl;
pub mod device;
pub mod interfaces;
pub mod routing;

pub use acl::{acl_name, build_access_lists, taboo_acl_name};
pub use device::{DeviceConfig, DEFAULT_VRF};

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{
    Diagnostics, FabricConfig, FabricLink, FabricNode, InterFabricConnection,
};
use device::{DeviceVrf, Interface, InterfaceType, IpAccessList};

/// Compiles every fabric node into a device configuration, keyed by hostname.
///
/// Expects a finalized config; [`crate::model::build_model`] returns one.
pub fn synthesize(
    config: &FabricConfig,
    diags: &mut Diagnostics,
) -> BTreeMap<String, DeviceConfig> {
    let mut devices = BTreeMap::new();
    let acls = acl::build_access_lists(config, diags);

    if config.fabric_nodes.is_empty() {
        diags.warn(format!(
            "no fabric nodes defined; creating single configuration for fabric {}",
            config.hostname()
        ));
        devices.insert(
            config.hostname().to_string(),
            fabric_device(config, &acls, diags),
        );
        return devices;
    }

    let hostnames = node_hostnames(config, diags);
    for node in config.fabric_nodes.values() {
        if let Some(hostname) = hostnames.get(node.id.as_str()) {
            devices.insert(
                hostname.clone(),
                convert_node(node, hostname, config, &acls, diags),
            );
        }
    }
    devices
}

fn convert_node(
    node: &FabricNode,
    hostname: &str,
    config: &FabricConfig,
    acls: &BTreeMap<String, IpAccessList>,
    diags: &mut Diagnostics,
) -> DeviceConfig {
    let human_name = node.name.as_deref().unwrap_or(hostname);
    let mut device = DeviceConfig::new(hostname, human_name);
    add_vrfs(&mut device, config);
    interfaces::add_node_interfaces(&mut device, node, config, diags);
    interfaces::add_vpc_peer_link(&mut device, node, config);
    interfaces::add_bridge_domain_interfaces(&mut device, config, diags);
    device.acls = acls.clone();
    routing::convert_l3outs(&mut device, node, config, diags);
    interfaces::add_l2out_interfaces(&mut device, config, diags);
    device
}

/// The single device standing in for a fabric whose export defines no nodes.
/// It carries the VRFs, bridge domain gateways, and contract ACLs, but no
/// physical ports.
fn fabric_device(
    config: &FabricConfig,
    acls: &BTreeMap<String, IpAccessList>,
    diags: &mut Diagnostics,
) -> DeviceConfig {
    let hostname = config.hostname();
    let mut device = DeviceConfig::new(hostname, hostname);
    add_vrfs(&mut device, config);
    let mut loopback = Interface::new("loopback0", InterfaceType::Loopback);
    loopback.human_name = Some("Loopback0".to_string());
    device.interfaces.insert("loopback0".to_string(), loopback);
    interfaces::add_bridge_domain_interfaces(&mut device, config, diags);
    device.acls = acls.clone();
    device
}

fn add_vrfs(device: &mut DeviceConfig, config: &FabricConfig) {
    for tenant in config.tenants.values() {
        for vrf in tenant.vrfs.values() {
            let mut device_vrf = DeviceVrf::new(vrf.name());
            device_vrf.description = vrf.description.clone();
            device.vrfs.insert(vrf.name().to_string(), device_vrf);
        }
    }
}

/// Assigns a hostname to every fabric node: the node's name when present,
/// otherwise a fallback derived from the fabric hostname. Collisions get the
/// node id appended, then a counter, each with a diagnostic.
pub fn node_hostnames(
    config: &FabricConfig,
    diags: &mut Diagnostics,
) -> BTreeMap<String, String> {
    let mut assigned = BTreeMap::new();
    let mut used = BTreeSet::new();
    for node in config.fabric_nodes.values() {
        let base = match node.name.as_deref() {
            Some(name) => name.to_lowercase(),
            None => fallback_node_hostname(config.hostname(), &node.id),
        };
        let mut hostname = base.clone();
        if used.contains(&hostname) {
            hostname = format!("{base}-{}", node.id);
        }
        let mut counter = 2;
        while used.contains(&hostname) {
            hostname = format!("{base}-{}-{counter}", node.id);
            counter += 1;
        }
        if hostname != base {
            diags.warn(format!(
                "duplicate node hostname {base}; using {hostname} for node {}",
                node.id
            ));
        }
        used.insert(hostname.clone());
        assigned.insert(node.id.clone(), hostname);
    }
    assigned
}

/// Hostname for a node the export never named: the fabric hostname reduced
/// to a base (export file extension stripped, a stuttered `aci-` vendor
/// prefix collapsed, trailing dashes dropped) with the node id appended.
///
/// `"aci-aci-dc2-ce2.json"` + `"1204"` yields `"aci-dc2-ce2-1204"`.
pub fn fallback_node_hostname(fabric_hostname: &str, node_id: &str) -> String {
    let trimmed = fabric_hostname.trim();
    let mut base = if trimmed.is_empty() { "aci" } else { trimmed };
    for ext in [".json", ".xml"] {
        if let Some(stripped) = base.strip_suffix(ext) {
            base = stripped;
            break;
        }
    }
    let mut collapsed = base;
    let mut stuttered = false;
    while let Some(rest) = collapsed.strip_prefix("aci-") {
        collapsed = rest;
        stuttered = true;
    }
    let base = if stuttered {
        format!("aci-{collapsed}")
    } else {
        base.to_string()
    };
    let base = base.trim_end_matches('-');
    format!("{base}-{node_id}")
}

/// Derives the layer-1 fabric topology: a leaf-to-spine full mesh, one
/// peer-link edge per VPC pair, and representative edges for detected
/// inter-fabric connections.
///
/// Leaf ports are taken in order from the node's declared interfaces plus
/// any path-attachment ports, one per spine; `ethernet1/<i+1>` stands in
/// past the end of the list. `hostnames` is the assignment produced by
/// [`node_hostnames`].
pub fn fabric_links(
    config: &FabricConfig,
    connections: &BTreeMap<String, InterFabricConnection>,
    hostnames: &BTreeMap<String, String>,
) -> BTreeSet<FabricLink> {
    let mut links = BTreeSet::new();
    let spines: Vec<&FabricNode> = config
        .fabric_nodes
        .values()
        .filter(|node| node.is_spine())
        .collect();
    let leaves: Vec<&FabricNode> = config
        .fabric_nodes
        .values()
        .filter(|node| node.is_leaf())
        .collect();

    for leaf in &leaves {
        let Some(leaf_hostname) = hostnames.get(leaf.id.as_str()) else {
            continue;
        };
        let mut leaf_ports: Vec<&str> = leaf.interfaces.keys().map(String::as_str).collect();
        if let Some(attachments) = config.path_attachments.get(leaf.id.as_str()) {
            for name in attachments.keys() {
                if !leaf_ports.contains(&name.as_str()) {
                    leaf_ports.push(name);
                }
            }
        }
        let spine_ports: Vec<Vec<&str>> = spines
            .iter()
            .map(|spine| spine.interfaces.keys().map(String::as_str).collect())
            .collect();
        for (index, spine) in spines.iter().enumerate() {
            let Some(spine_hostname) = hostnames.get(spine.id.as_str()) else {
                continue;
            };
            links.insert(FabricLink {
                node1: leaf_hostname.clone(),
                interface1: fabric_port(&leaf_ports, index),
                node2: spine_hostname.clone(),
                interface2: fabric_port(&spine_ports[index], index),
            });
        }
    }

    for pair in config.vpc_pairs.values() {
        let (Some(peer1), Some(peer2)) =
            (hostnames.get(&pair.peer1), hostnames.get(&pair.peer2))
        else {
            continue;
        };
        links.insert(FabricLink {
            node1: peer1.clone(),
            interface1: "port-channel1".to_string(),
            node2: peer2.clone(),
            interface2: "port-channel1".to_string(),
        });
    }

    add_inter_fabric_links(config, connections, hostnames, &mut links);
    links
}

/// One representative edge per detected inter-fabric connection, strung
/// between the first two border nodes of this fabric. Border nodes are the
/// leaves carrying path attachments, widened to every leaf when any L3Out
/// peers over BGP, and falling back to every leaf when nothing narrows the
/// set.
fn add_inter_fabric_links(
    config: &FabricConfig,
    connections: &BTreeMap<String, InterFabricConnection>,
    hostnames: &BTreeMap<String, String>,
    links: &mut BTreeSet<FabricLink>,
) {
    if connections.is_empty() {
        return;
    }
    let border_ids = border_node_ids(config);
    let mut border_nodes: Vec<&FabricNode> = config
        .fabric_nodes
        .values()
        .filter(|node| border_ids.contains(node.id.as_str()))
        .collect();
    if border_nodes.is_empty() {
        border_nodes = config
            .fabric_nodes
            .values()
            .filter(|node| node.is_leaf())
            .collect();
    }
    let Some(node1) = border_nodes.first() else {
        return;
    };
    let node2 = border_nodes.get(1).unwrap_or(node1);
    let (Some(hostname1), Some(hostname2)) = (
        hostnames.get(node1.id.as_str()),
        hostnames.get(node2.id.as_str()),
    ) else {
        return;
    };

    for (connection_id, connection) in connections {
        let base = inter_fabric_interface_name(connection_id, connection);
        links.insert(FabricLink {
            node1: hostname1.clone(),
            interface1: format!("{base}-fabric1"),
            node2: hostname2.clone(),
            interface2: format!("{base}-fabric2"),
        });
    }
}

fn border_node_ids(config: &FabricConfig) -> BTreeSet<&str> {
    let mut ids: BTreeSet<&str> = config
        .path_attachments
        .keys()
        .map(String::as_str)
        .collect();
    let has_bgp = config
        .tenants
        .values()
        .flat_map(|tenant| tenant.l3outs.values())
        .any(|l3out| !l3out.bgp_peers.is_empty());
    if has_bgp {
        ids.extend(
            config
                .fabric_nodes
                .values()
                .filter(|node| node.is_leaf())
                .map(|node| node.id.as_str()),
        );
    }
    ids
}

fn inter_fabric_interface_name(
    connection_id: &str,
    connection: &InterFabricConnection,
) -> String {
    let kind = if connection.kind.is_empty() {
        "generic"
    } else {
        &connection.kind
    };
    let sanitized: String = connection_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("inter-fabric-{kind}-{sanitized}")
}

fn fabric_port(candidates: &[&str], index: usize) -> String {
    match candidates.get(index) {
        Some(name) => (*name).to_string(),
        None => format!("ethernet1/{}", index + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        detect_inter_fabric_connections, ExternalEpg, NodeInterface, NodeRole, VpcPair,
    };
    use pretty_assertions::assert_eq;

    fn finalized(mut config: FabricConfig) -> FabricConfig {
        let mut diags = Diagnostics::new();
        config.finalize(&mut diags);
        config
    }

    #[test]
    fn zero_node_fabric_yields_one_device_with_default_vrf() {
        let mut config = FabricConfig::new("no-nodes-fabric");
        let tenant = config.get_or_create_tenant("t1");
        tenant.get_or_create_vrf("prod");
        let bd = tenant.get_or_create_bridge_domain("web-bd");
        bd.vrf = Some("prod".to_string());
        bd.subnets.push("10.1.1.0/24".to_string());
        let config = finalized(config);

        let mut diags = Diagnostics::new();
        let devices = synthesize(&config, &mut diags);

        assert_eq!(devices.len(), 1);
        let device = &devices["no-nodes-fabric"];
        assert!(device.vrfs.contains_key(DEFAULT_VRF));
        assert!(device.vrfs.contains_key("t1:prod"));
        assert!(device.interfaces.contains_key("loopback0"));
        let vlan = device
            .interfaces
            .values()
            .find(|iface| iface.interface_type == InterfaceType::Vlan)
            .expect("bridge domain gateway interface");
        assert_eq!(vlan.address.as_deref(), Some("10.1.1.1/24"));
        assert!(diags
            .messages()
            .iter()
            .any(|m| m.contains("no fabric nodes defined")));
    }

    #[test]
    fn one_device_per_node_keyed_by_lowercased_name() {
        let mut config = FabricConfig::new("dc1");
        config.get_or_create_tenant("t1").get_or_create_vrf("prod");
        let node = config.get_or_create_fabric_node("101");
        node.name = Some("DC1-Leaf-101".to_string());
        node.role = NodeRole::Leaf;
        let node = config.get_or_create_fabric_node("201");
        node.name = Some("DC1-Spine-201".to_string());
        node.role = NodeRole::Spine;
        let config = finalized(config);

        let mut diags = Diagnostics::new();
        let devices = synthesize(&config, &mut diags);

        assert_eq!(devices.len(), 2);
        let leaf = &devices["dc1-leaf-101"];
        assert_eq!(leaf.human_name, "DC1-Leaf-101");
        assert!(leaf.vrfs.contains_key("t1:prod"));
        assert!(leaf.interfaces.contains_key("loopback0"));
        assert!(devices.contains_key("dc1-spine-201"));
    }

    #[test]
    fn fallback_hostname_collapses_stuttered_prefix() {
        assert_eq!(
            fallback_node_hostname("aci-aci-dc2-ce2.json", "1204"),
            "aci-dc2-ce2-1204"
        );
        assert_eq!(fallback_node_hostname("dc1.xml", "101"), "dc1-101");
        assert_eq!(fallback_node_hostname("", "7"), "aci-7");
        assert_eq!(fallback_node_hostname("aci-", "3"), "aci-3");
        assert_eq!(fallback_node_hostname("plain", "9"), "plain-9");
    }

    #[test]
    fn duplicate_node_names_get_the_node_id_appended() {
        let mut config = FabricConfig::new("dc1");
        config.get_or_create_fabric_node("101").name = Some("Leaf-A".to_string());
        config.get_or_create_fabric_node("102").name = Some("Leaf-A".to_string());
        let config = finalized(config);

        let mut diags = Diagnostics::new();
        let hostnames = node_hostnames(&config, &mut diags);

        assert_eq!(hostnames["101"], "leaf-a");
        assert_eq!(hostnames["102"], "leaf-a-102");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn mesh_pairs_leaf_ports_with_spines_in_order() {
        let mut config = FabricConfig::new("dc1");
        let leaf = config.get_or_create_fabric_node("101");
        leaf.name = Some("leaf-101".to_string());
        leaf.role = NodeRole::Leaf;
        leaf.add_interface(NodeInterface::new("eth1/49"));
        leaf.add_interface(NodeInterface::new("eth1/50"));
        let spine = config.get_or_create_fabric_node("201");
        spine.name = Some("spine-201".to_string());
        spine.role = NodeRole::Spine;
        let spine = config.get_or_create_fabric_node("202");
        spine.name = Some("spine-202".to_string());
        spine.role = NodeRole::Spine;
        config.vpc_pairs.insert(
            "10".to_string(),
            VpcPair {
                id: "10".to_string(),
                name: None,
                peer1: "101".to_string(),
                peer2: "102".to_string(),
            },
        );
        let config = finalized(config);

        let hostnames = node_hostnames(&config, &mut Diagnostics::new());
        let links = fabric_links(&config, &BTreeMap::new(), &hostnames);

        let links: Vec<&FabricLink> = links.iter().collect();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].node1, "leaf-101");
        assert_eq!(links[0].interface1, "eth1/49");
        assert_eq!(links[0].node2, "spine-201");
        // Spines declared no ports, so the indexed fallback stands in.
        assert_eq!(links[0].interface2, "ethernet1/1");
        assert_eq!(links[1].interface1, "eth1/50");
        assert_eq!(links[1].node2, "spine-202");
        assert_eq!(links[1].interface2, "ethernet1/2");
        // Peer 102 does not exist as a node, so no peer-link edge appears.
    }

    #[test]
    fn vpc_pair_contributes_a_peer_link_edge() {
        let mut config = FabricConfig::new("dc1");
        for id in ["101", "102"] {
            let node = config.get_or_create_fabric_node(id);
            node.name = Some(format!("leaf-{id}"));
            node.role = NodeRole::Leaf;
        }
        config.vpc_pairs.insert(
            "10".to_string(),
            VpcPair {
                id: "10".to_string(),
                name: Some("vpc-web".to_string()),
                peer1: "101".to_string(),
                peer2: "102".to_string(),
            },
        );
        let config = finalized(config);

        let hostnames = node_hostnames(&config, &mut Diagnostics::new());
        let links = fabric_links(&config, &BTreeMap::new(), &hostnames);

        assert!(links.contains(&FabricLink {
            node1: "leaf-101".to_string(),
            interface1: "port-channel1".to_string(),
            node2: "leaf-102".to_string(),
            interface2: "port-channel1".to_string(),
        }));
    }

    #[test]
    fn inter_fabric_connections_edge_the_first_two_border_leaves() {
        let mut shared = ExternalEpg::new("internet");
        shared.subnets.push("203.0.113.0/24".to_string());

        let mut dc1 = FabricConfig::new("dc1");
        for id in ["101", "102"] {
            let node = dc1.get_or_create_fabric_node(id);
            node.name = Some(format!("dc1-leaf-{id}"));
            node.role = NodeRole::Leaf;
        }
        dc1.get_or_create_tenant("t1")
            .get_or_create_l3out("wan")
            .external_epgs
            .push(shared.clone());
        let dc1 = finalized(dc1);

        let mut dc2 = FabricConfig::new("dc2");
        dc2.get_or_create_tenant("t1")
            .get_or_create_l3out("wan")
            .external_epgs
            .push(shared);
        let dc2 = finalized(dc2);

        let mut fabrics = BTreeMap::new();
        fabrics.insert("dc1".to_string(), dc1);
        fabrics.insert("dc2".to_string(), dc2);
        let connections = detect_inter_fabric_connections(&fabrics);
        assert_eq!(connections.len(), 1);

        let dc1 = &fabrics["dc1"];
        let hostnames = node_hostnames(dc1, &mut Diagnostics::new());
        let links = fabric_links(dc1, &connections, &hostnames);

        let links: Vec<&FabricLink> = links.iter().collect();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].node1, "dc1-leaf-101");
        assert_eq!(
            links[0].interface1,
            "inter-fabric-shared-external-dc1-dc2-external-fabric1"
        );
        assert_eq!(links[0].node2, "dc1-leaf-102");
        assert_eq!(
            links[0].interface2,
            "inter-fabric-shared-external-dc1-dc2-external-fabric2"
        );
    }
}
