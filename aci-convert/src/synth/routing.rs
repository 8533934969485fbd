//! L3Out routing synthesis: BGP neighbors, OSPF processes, static routes.
//!
//! Each L3Out targets the VRF it resolved to (falling back to the default
//! VRF), and its routing children are folded into that VRF's embedded
//! process state. L3Outs with neither BGP nor OSPF are valid; they may
//! still contribute static routes.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::model::{Diagnostics, FabricConfig, FabricNode, L3Out, OspfAreaType, OspfConfig};
use crate::synth::device::{
    BgpConfig, BgpNeighbor, DeviceConfig, Interface, OspfAreaConfig, OspfInterfaceSettings,
    OspfProcess, StaticRouteEntry, DEFAULT_VRF,
};
use crate::synth::interfaces::parse_prefix;

/// Converts every L3Out of the fabric into routing state on `device`.
pub fn convert_l3outs(
    device: &mut DeviceConfig,
    node: &FabricNode,
    config: &FabricConfig,
    diags: &mut Diagnostics,
) {
    for tenant in config.tenants.values() {
        for l3out in tenant.l3outs.values() {
            let vrf_name = match l3out.vrf.as_deref() {
                Some(key) if device.vrfs.contains_key(key) => key.to_string(),
                Some(key) => {
                    diags.warn(format!(
                        "VRF {key} not found for L3Out {}, using default VRF",
                        l3out.name
                    ));
                    DEFAULT_VRF.to_string()
                }
                None => DEFAULT_VRF.to_string(),
            };

            if !l3out.bgp_peers.is_empty() {
                convert_bgp(device, l3out, &vrf_name, diags);
            }
            if !l3out.static_routes.is_empty() {
                convert_static_routes(device, l3out, &vrf_name, diags);
            }
            if let Some(ospf) = &l3out.ospf {
                convert_ospf(device, node, l3out, ospf, &vrf_name, diags);
            }
            convert_external_epg_routes(device, l3out, &vrf_name, diags);
        }
    }
}

fn convert_bgp(device: &mut DeviceConfig, l3out: &L3Out, vrf_name: &str, diags: &mut Diagnostics) {
    let process = l3out.bgp_process.clone().unwrap_or_default();
    let router_id = match process.router_id.as_deref() {
        Some(raw) if raw.parse::<Ipv4Addr>().is_ok() => Some(raw.to_string()),
        Some(raw) => {
            diags.warn(format!(
                "invalid router ID {raw} for BGP process in L3Out {}",
                l3out.name
            ));
            None
        }
        None => None,
    };
    // Process-level AS, or the first peer's local AS when the export only
    // carries it there.
    let local_asn = process
        .asn
        .or_else(|| l3out.bgp_peers.iter().find_map(|peer| peer.local_asn));

    let mut neighbors = Vec::new();
    for peer in &l3out.bgp_peers {
        if peer.address.parse::<Ipv4Addr>().is_err() {
            diags.warn(format!(
                "invalid BGP peer address {} in L3Out {}",
                peer.address, l3out.name
            ));
            continue;
        }
        neighbors.push(BgpNeighbor {
            address: peer.address.clone(),
            remote_asn: peer.remote_asn,
            local_asn: peer.local_asn.or(local_asn),
            description: Some(
                peer.description
                    .clone()
                    .unwrap_or_else(|| format!("BGP peer from L3Out {}", l3out.name)),
            ),
        });
    }

    let bgp = device
        .vrf_or_default(vrf_name)
        .bgp
        .get_or_insert_with(BgpConfig::default);
    if bgp.router_id.is_none() {
        bgp.router_id = router_id;
    }
    if bgp.local_asn.is_none() {
        bgp.local_asn = local_asn;
    }
    for neighbor in neighbors {
        bgp.add_neighbor(neighbor);
    }
}

fn convert_static_routes(
    device: &mut DeviceConfig,
    l3out: &L3Out,
    vrf_name: &str,
    diags: &mut Diagnostics,
) {
    let mut entries = Vec::new();
    for route in &l3out.static_routes {
        let Some((network, len)) = parse_prefix(&route.prefix) else {
            diags.warn(format!(
                "invalid prefix {} for static route in L3Out {}",
                route.prefix, l3out.name
            ));
            continue;
        };
        let prefix = format!("{network}/{len}");
        let admin_distance = route.preference.unwrap_or(1);
        let interface = route.interface.as_deref().and_then(|name| {
            if device.interfaces.contains_key(name) {
                Some(name.to_string())
            } else {
                diags.warn(format!(
                    "next hop interface {name} not found for static route {prefix} in L3Out {}",
                    l3out.name
                ));
                None
            }
        });

        let mut emitted = false;
        for next_hop in &route.next_hops {
            if next_hop.parse::<Ipv4Addr>().is_err() {
                diags.warn(format!(
                    "invalid next hop {next_hop} for static route {prefix} in L3Out {}",
                    l3out.name
                ));
                continue;
            }
            entries.push(StaticRouteEntry {
                prefix: prefix.clone(),
                next_hop: Some(next_hop.clone()),
                interface: interface.clone(),
                admin_distance,
            });
            emitted = true;
        }
        if !emitted {
            // An interface-only route is still valid; a route with neither
            // is dropped.
            if interface.is_some() {
                entries.push(StaticRouteEntry {
                    prefix,
                    next_hop: None,
                    interface,
                    admin_distance,
                });
            } else {
                diags.warn(format!(
                    "static route {} in L3Out {} has no valid next hop",
                    route.prefix, l3out.name
                ));
            }
        }
    }
    device
        .vrf_or_default(vrf_name)
        .static_routes
        .extend(entries);
}

fn convert_ospf(
    device: &mut DeviceConfig,
    node: &FabricNode,
    l3out: &L3Out,
    ospf: &OspfConfig,
    vrf_name: &str,
    diags: &mut Diagnostics,
) {
    let process_id = ospf
        .process_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| l3out.name.clone());
    let router_id = infer_router_id(&device.interfaces, node, &l3out.name, diags);

    let mut areas = BTreeMap::new();
    for area in ospf.areas.values() {
        let Some(area_id) = parse_area_id(Some(&area.area_id)) else {
            diags.warn(format!(
                "invalid OSPF area ID {} in L3Out {}, skipping area",
                area.area_id, l3out.name
            ));
            continue;
        };
        areas.insert(
            area_id,
            OspfAreaConfig {
                area_id,
                area_type: area.area_type.as_str().to_string(),
                networks: area.networks.clone(),
            },
        );
    }
    // No explicit areas: the process still needs one, normally the backbone.
    if areas.is_empty() {
        let area_id = parse_area_id(ospf.area_id.as_deref()).unwrap_or(0);
        areas.insert(
            area_id,
            OspfAreaConfig {
                area_id,
                area_type: OspfAreaType::Regular.as_str().to_string(),
                networks: Vec::new(),
            },
        );
    }

    let default_area = parse_area_id(ospf.area_id.as_deref()).unwrap_or(0);
    let mut interface_settings = BTreeMap::new();
    for ospf_iface in &ospf.interfaces {
        let Some(name) = ospf_iface.name.as_deref() else {
            continue;
        };
        let resolved = if device.interfaces.contains_key(name) {
            Some(name.to_string())
        } else {
            let prefixed = format!("L3Out-{}-{name}", l3out.name);
            device.interfaces.contains_key(&prefixed).then_some(prefixed)
        };
        let Some(resolved) = resolved else {
            diags.warn(format!(
                "OSPF interface {name} in L3Out {} not found in converted interfaces",
                l3out.name
            ));
            continue;
        };
        interface_settings.insert(
            resolved,
            OspfInterfaceSettings {
                area: default_area,
                cost: ospf_iface.cost,
                hello_interval: ospf_iface.hello_interval.unwrap_or(10),
                dead_interval: ospf_iface.dead_interval.unwrap_or(40),
                network_type: ospf_network_type(ospf_iface.network_type.as_deref()).to_string(),
                passive: ospf_iface.passive.unwrap_or(false),
            },
        );
    }

    let process = OspfProcess {
        process_id: process_id.clone(),
        router_id,
        reference_bandwidth: 100.0,
        areas,
        interfaces: interface_settings,
    };
    device
        .vrf_or_default(vrf_name)
        .ospf
        .insert(process_id, process);
}

/// External-EPG subnets with a next hop become plain static routes.
fn convert_external_epg_routes(
    device: &mut DeviceConfig,
    l3out: &L3Out,
    vrf_name: &str,
    diags: &mut Diagnostics,
) {
    for ext_epg in &l3out.external_epgs {
        let Some(next_hop) = ext_epg.next_hop.as_deref() else {
            continue;
        };
        if ext_epg.subnets.is_empty() {
            continue;
        }
        if next_hop.parse::<Ipv4Addr>().is_err() {
            diags.warn(format!(
                "invalid next hop {next_hop} for external EPG {} in L3Out {}",
                ext_epg.name, l3out.name
            ));
            continue;
        }
        let routes: Vec<StaticRouteEntry> = ext_epg
            .subnets
            .iter()
            .filter_map(|subnet| parse_prefix(subnet))
            .map(|(network, len)| StaticRouteEntry {
                prefix: format!("{network}/{len}"),
                next_hop: Some(next_hop.to_string()),
                interface: None,
                admin_distance: 1,
            })
            .collect();
        device.vrf_or_default(vrf_name).static_routes.extend(routes);
    }
}

/// Router id for an OSPF process: the first interface address, then a
/// pseudo-id derived from the node id, then a fixed fallback.
fn infer_router_id(
    interfaces: &BTreeMap<String, Interface>,
    node: &FabricNode,
    l3out_name: &str,
    diags: &mut Diagnostics,
) -> String {
    for iface in interfaces.values() {
        if let Some(address) = &iface.address {
            if let Some((ip, _)) = address.split_once('/') {
                if ip != "0.0.0.0" {
                    return ip.to_string();
                }
            }
        }
    }
    let digits: String = node.id.chars().filter(char::is_ascii_digit).collect();
    if let Ok(id) = digits.parse::<u32>() {
        return Ipv4Addr::from(id & 0xff).to_string();
    }
    diags.warn(format!(
        "could not infer OSPF router ID for L3Out {l3out_name}, using 0.0.0.1"
    ));
    "0.0.0.1".to_string()
}

/// Parses an OSPF area id written either as a plain number or a dotted quad.
pub(crate) fn parse_area_id(raw: Option<&str>) -> Option<u32> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(id) = raw.parse::<u32>() {
        return Some(id);
    }
    let mut octets = raw.split('.');
    let mut id: u32 = 0;
    for _ in 0..4 {
        let octet: u8 = octets.next()?.parse().ok()?;
        id = (id << 8) | u32::from(octet);
    }
    if octets.next().is_some() {
        return None;
    }
    Some(id)
}

fn ospf_network_type(raw: Option<&str>) -> &'static str {
    match raw.map(str::to_lowercase).as_deref() {
        Some("broadcast") | Some("bcast") => "broadcast",
        Some("non-broadcast") | Some("nbma") => "non-broadcast",
        Some("point-to-multipoint") | Some("p2mp") => "point-to-multipoint",
        // Fabric-facing L3Out links default to point-to-point.
        _ => "point-to-point",
    }
}
