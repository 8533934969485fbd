//! Interface synthesis for fabric nodes.
//!
//! A device's interface table is assembled in a fixed order: interfaces
//! declared on the node, interfaces implied by EPG path attachments, the
//! VTEP loopback, the out-of-band management port, role-based fallback
//! ports for nodes the export left bare, then the VLAN interfaces derived
//! from bridge domains and L2Outs.

use std::net::Ipv4Addr;

use crate::model::{Diagnostics, FabricConfig, FabricNode, L2Out, NodeRole};
use crate::synth::device::{DeviceConfig, Interface, InterfaceType, DEFAULT_VRF};

/// Description marker for interfaces participating in the fabric underlay.
const FABRIC_MARKER: &str = "Fabric interface (IS-IS/Overlay)";

/// Adds every per-node interface: declared ports, path-attachment ports,
/// loopback0, mgmt0, and role-based fallback ports when nothing else exists.
pub fn add_node_interfaces(
    device: &mut DeviceConfig,
    node: &FabricNode,
    config: &FabricConfig,
    diags: &mut Diagnostics,
) {
    for declared in node.interfaces.values() {
        let mut iface =
            Interface::new(&declared.name, interface_type_of(declared.if_type.as_deref()));
        iface.enabled = declared.enabled;
        iface.vlan = declared.vlan;
        iface.description = declared.description.clone();
        if is_fabric_interface(&declared.name, node.role) {
            iface.append_description(FABRIC_MARKER);
        }
        device.interfaces.entry(declared.name.clone()).or_insert(iface);
    }

    if let Some(attachments) = config.path_attachments.get(&node.id) {
        for (name, attachment) in attachments {
            if device.interfaces.contains_key(name) {
                continue;
            }
            let mut iface = Interface::new(name, InterfaceType::Physical);
            if let Some(descr) = &attachment.description {
                iface.append_description(descr);
            }
            if let Some(epg) = &attachment.epg {
                iface.append_description(&format!("EPG: {epg}"));
            }
            if let Some(encap) = &attachment.encap {
                iface.append_description(&format!("VLAN: {encap}"));
            }
            if is_fabric_interface(name, node.role) {
                iface.append_description(FABRIC_MARKER);
            }
            device.interfaces.insert(name.clone(), iface);
        }
    }

    if !device.interfaces.contains_key("loopback0") {
        let mut loopback = Interface::new("loopback0", InterfaceType::Loopback);
        loopback.human_name = Some("VTEP Loopback".to_string());
        if node.role != NodeRole::Unspecified {
            loopback.description = Some(
                "VTEP (VXLAN Tunnel Endpoint) - dynamically assigned IP from TEP pool".to_string(),
            );
        }
        device.interfaces.insert("loopback0".to_string(), loopback);
    }

    if let Some(mgmt) = config.management.get(&node.id) {
        let mut iface = Interface::new("mgmt0", InterfaceType::Physical);
        match parse_prefix(&mgmt.address) {
            Some(_) => iface.address = Some(mgmt.address.trim().to_string()),
            None => diags.warn(format!(
                "failed to parse management address {} for node {}",
                mgmt.address, node.id
            )),
        }
        let mut description = "Out-of-band management interface".to_string();
        if let Some(gateway) = &mgmt.gateway {
            description.push_str(" | Gateway: ");
            description.push_str(gateway);
        }
        iface.description = Some(description);
        device.interfaces.insert("mgmt0".to_string(), iface);
    }

    // Only loopback0 so far means the export carried no interface data at
    // all for this node.
    if device.interfaces.len() == 1 {
        add_fallback_interfaces(device, node, diags);
    }
}

fn add_fallback_interfaces(device: &mut DeviceConfig, node: &FabricNode, diags: &mut Diagnostics) {
    if node.role == NodeRole::Unspecified {
        return;
    }
    let display = node.name.as_deref().unwrap_or(&node.id);
    diags.warn(format!(
        "no interfaces defined for fabric node {display}; adding fallback fabric interfaces based on role"
    ));
    match node.role {
        NodeRole::Spine => {
            for port in 1..=32 {
                let name = format!("ethernet1/{port}");
                let mut iface = Interface::new(&name, InterfaceType::Physical);
                iface.description =
                    Some(format!("Fabric interface to leaf (fallback) - Node {display}"));
                device.interfaces.insert(name, iface);
            }
        }
        NodeRole::Leaf => {
            for port in 53..=54 {
                let name = format!("ethernet1/{port}");
                let mut iface = Interface::new(&name, InterfaceType::Physical);
                iface.description =
                    Some(format!("Fabric uplink to spine (fallback) - Node {display}"));
                device.interfaces.insert(name, iface);
            }
            for port in 1..=8 {
                let name = format!("ethernet1/{port}");
                let mut iface = Interface::new(&name, InterfaceType::Physical);
                iface.description =
                    Some(format!("Downstream port for EPGs (fallback) - Node {display}"));
                device.interfaces.insert(name, iface);
            }
        }
        NodeRole::Unspecified => {}
    }
}

/// Creates the `port-channel1` peer-link interface when the node is a
/// member of a VPC protection group.
pub fn add_vpc_peer_link(device: &mut DeviceConfig, node: &FabricNode, config: &FabricConfig) {
    for pair in config.vpc_pairs.values() {
        if !pair.contains(&node.id) {
            continue;
        }
        let peer_id = if pair.peer1 == node.id {
            &pair.peer2
        } else {
            &pair.peer1
        };
        let peer_display = config
            .fabric_nodes
            .get(peer_id)
            .and_then(|peer| peer.name.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or(peer_id);
        let mut iface = Interface::new("port-channel1", InterfaceType::Aggregated);
        iface.human_name = Some(format!("VPC Peer-link (VPC {})", pair.id));
        iface.description = Some(format!(
            "VPC peer-link connecting to {peer_display} (VPC: {})",
            pair.name.as_deref().unwrap_or(&pair.id)
        ));
        device.interfaces.insert("port-channel1".to_string(), iface);
        // A node belongs to at most one pair that matters here.
        break;
    }
}

/// Creates one VLAN interface per bridge domain, carrying the gateway
/// address of each of its subnets.
pub fn add_bridge_domain_interfaces(
    device: &mut DeviceConfig,
    config: &FabricConfig,
    diags: &mut Diagnostics,
) {
    for tenant in config.tenants.values() {
        for bd in tenant.bridge_domains.values() {
            let vrf = match bd.vrf.as_deref() {
                Some(key) if device.vrfs.contains_key(key) => key.to_string(),
                Some(key) => {
                    diags.warn(format!(
                        "VRF {key} not found for bridge domain {}, using default VRF",
                        bd.name
                    ));
                    DEFAULT_VRF.to_string()
                }
                None => DEFAULT_VRF.to_string(),
            };

            let vlan_id = bridge_domain_vlan_id(&bd.name, bd.encapsulation.as_deref(), diags);
            let name = format!("Vlan{vlan_id}");
            if device.interfaces.contains_key(&name) {
                continue;
            }

            let mut addresses = Vec::new();
            for subnet in &bd.subnets {
                match parse_prefix(subnet) {
                    Some((network, len)) => {
                        let gateway = gateway_address(network, len);
                        addresses.push(format!("{gateway}/{len}"));
                    }
                    None => diags.warn(format!(
                        "invalid subnet in bridge domain {}: {subnet}",
                        bd.name
                    )),
                }
            }

            let mut iface = Interface::new(&name, InterfaceType::Vlan);
            iface.vrf = vrf;
            iface.vlan = Some(vlan_id);
            iface.human_name = Some(format!("VLAN {vlan_id} ({})", bd.name));
            iface.description = bd.description.clone();
            let mut addresses = addresses.into_iter();
            iface.address = addresses.next();
            iface.secondary_addresses = addresses.collect();
            device.interfaces.insert(name, iface);
        }
    }
}

/// VLAN id for a bridge domain: the `vlan-N` encapsulation when present and
/// parsable, otherwise a stable hash of the bridge domain key.
fn bridge_domain_vlan_id(bd_name: &str, encap: Option<&str>, diags: &mut Diagnostics) -> u32 {
    match encap {
        Some(encap) if encap.starts_with("vlan-") => {
            match encap["vlan-".len()..].parse::<u32>() {
                Ok(vlan) => vlan,
                Err(_) => {
                    let vlan = stable_vlan_id(bd_name);
                    diags.warn(format!(
                        "invalid encapsulation {encap} for bridge domain {bd_name}, using generated VLAN ID {vlan}"
                    ));
                    vlan
                }
            }
        }
        _ => stable_vlan_id(bd_name),
    }
}

/// Creates one VLAN interface per L2Out for external layer-2 connectivity.
pub fn add_l2out_interfaces(
    device: &mut DeviceConfig,
    config: &FabricConfig,
    diags: &mut Diagnostics,
) {
    for tenant in config.tenants.values() {
        for l2out in tenant.l2outs.values() {
            let vlan_id = l2out_vlan_id(l2out, diags);
            if vlan_id == 0 {
                continue;
            }
            let name = format!("L2Out-{}", l2out.name);
            if device.interfaces.contains_key(&name) {
                continue;
            }

            let vrf = l2out
                .bridge_domain
                .as_deref()
                .and_then(|key| config.find_bridge_domain(key))
                .and_then(|bd| bd.vrf.as_deref())
                .filter(|key| device.vrfs.contains_key(*key))
                .unwrap_or(DEFAULT_VRF);

            let mut iface = Interface::new(&name, InterfaceType::Vlan);
            iface.vrf = vrf.to_string();
            iface.vlan = Some(vlan_id);
            iface.human_name = Some(format!("L2Out {} (VLAN {vlan_id})", l2out.name));
            iface.description = Some(match &l2out.description {
                Some(descr) => descr.clone(),
                None => format!("L2Out {} for external L2 connectivity", l2out.name),
            });
            device.interfaces.insert(name, iface);
        }
    }
}

/// VLAN id from an L2Out encapsulation.
///
/// Accepts `vlan-100` and `vxlan-5000` (VNI folded into the VLAN range).
/// Returns 0 when the encapsulation is present but unusable.
fn l2out_vlan_id(l2out: &L2Out, diags: &mut Diagnostics) -> u32 {
    let Some(encap) = l2out
        .encapsulation
        .as_deref()
        .map(str::trim)
        .filter(|encap| !encap.is_empty())
    else {
        return stable_vlan_id(&l2out.name);
    };
    let encap = encap.to_lowercase();
    if let Some(rest) = encap.strip_prefix("vlan-") {
        match rest.parse::<u32>() {
            Ok(vlan) if (1..=4095).contains(&vlan) => return vlan,
            Ok(_) => {}
            Err(_) => diags.warn(format!(
                "invalid VLAN encapsulation {encap} for L2Out {}",
                l2out.name
            )),
        }
    }
    if let Some(rest) = encap.strip_prefix("vxlan-") {
        match rest.parse::<u32>() {
            Ok(vni) if vni >= 1 => return (vni % 4094) + 1,
            Ok(_) => {}
            Err(_) => diags.warn(format!(
                "invalid VXLAN encapsulation {encap} for L2Out {}",
                l2out.name
            )),
        }
    }
    0
}

/// Whether an interface name belongs to the fabric underlay.
///
/// Uplink ports (`eth1/53` through `eth1/99`) always count; on spines every
/// front-panel port up to `eth1/59` does.
pub(crate) fn is_fabric_interface(name: &str, role: NodeRole) -> bool {
    let Some(port) = port_after_eth1(name) else {
        return false;
    };
    if (53..=99).contains(&port) {
        return true;
    }
    role == NodeRole::Spine && (1..=59).contains(&port)
}

fn port_after_eth1(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let idx = lower.find("eth1/")?;
    let digits: String = lower[idx + "eth1/".len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn interface_type_of(raw: Option<&str>) -> InterfaceType {
    match raw.map(str::to_lowercase).as_deref() {
        Some("vlan") => InterfaceType::Vlan,
        Some("loopback") => InterfaceType::Loopback,
        Some("portchannel") | Some("aggregated") => InterfaceType::Aggregated,
        _ => InterfaceType::Physical,
    }
}

/// Parses `a.b.c.d/len` into the masked network address and prefix length.
pub(crate) fn parse_prefix(text: &str) -> Option<(Ipv4Addr, u8)> {
    let (ip, len) = text.trim().split_once('/')?;
    let ip: Ipv4Addr = ip.parse().ok()?;
    let len: u8 = len.parse().ok()?;
    if len > 32 {
        return None;
    }
    let mask = if len == 0 { 0 } else { u32::MAX << (32 - len) };
    Some((Ipv4Addr::from(u32::from(ip) & mask), len))
}

/// Gateway convention: the first host address, except on /31 and /32 where
/// the network address itself is used.
fn gateway_address(network: Ipv4Addr, len: u8) -> Ipv4Addr {
    if len < 31 {
        Ipv4Addr::from(u32::from(network) + 1)
    } else {
        network
    }
}

/// Stable VLAN id in 1..=4094 derived from an entity key.
fn stable_vlan_id(name: &str) -> u32 {
    (crc32(name.as_bytes()) % 4094) + 1
}

/// CRC32 hash using the standard polynomial (IEEE 802.3).
fn crc32(input: &[u8]) -> u32 {
    let mut crc = 0xffff_ffffu32;
    for b in input {
        crc ^= *b as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xedb8_8320 & mask);
        }
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn prefix_parse_masks_host_bits() {
        assert_eq!(
            parse_prefix("10.1.1.5/24"),
            Some(("10.1.1.0".parse().unwrap(), 24))
        );
        assert_eq!(
            parse_prefix(" 192.168.0.0/16 "),
            Some(("192.168.0.0".parse().unwrap(), 16))
        );
        assert_eq!(parse_prefix("10.1.1.0/33"), None);
        assert_eq!(parse_prefix("10.1.1.0"), None);
        assert_eq!(parse_prefix("not-an-ip/24"), None);
    }

    #[test]
    fn gateway_is_first_host_except_on_point_to_point() {
        let network: Ipv4Addr = "10.1.1.0".parse().unwrap();
        assert_eq!(gateway_address(network, 24).to_string(), "10.1.1.1");
        assert_eq!(gateway_address(network, 31).to_string(), "10.1.1.0");
        assert_eq!(gateway_address(network, 32).to_string(), "10.1.1.0");
    }

    #[test]
    fn fabric_interface_detection_depends_on_role() {
        assert!(is_fabric_interface("eth1/53", NodeRole::Leaf));
        assert!(is_fabric_interface("eth1/99", NodeRole::Unspecified));
        assert!(!is_fabric_interface("eth1/10", NodeRole::Leaf));
        assert!(is_fabric_interface("eth1/10", NodeRole::Spine));
        assert!(!is_fabric_interface("mgmt0", NodeRole::Spine));
        // Long-form names do not carry the eth1/ marker.
        assert!(!is_fabric_interface("ethernet1/53", NodeRole::Leaf));
    }

    #[test]
    fn stable_vlan_ids_stay_in_range_and_repeat() {
        for name in ["t1:bd1", "t1:bd2", "x", ""] {
            let vlan = stable_vlan_id(name);
            assert!((1..=4094).contains(&vlan));
            assert_eq!(vlan, stable_vlan_id(name));
        }
    }

    #[test]
    fn interface_types_map_from_export_strings() {
        assert_eq!(interface_type_of(None), InterfaceType::Physical);
        assert_eq!(interface_type_of(Some("ethernet")), InterfaceType::Physical);
        assert_eq!(interface_type_of(Some("VLAN")), InterfaceType::Vlan);
        assert_eq!(interface_type_of(Some("loopback")), InterfaceType::Loopback);
        assert_eq!(
            interface_type_of(Some("portchannel")),
            InterfaceType::Aggregated
        );
        assert_eq!(interface_type_of(Some("weird")), InterfaceType::Physical);
    }
}
