//! Ingestion: turning a managed-object tree into a [`FabricConfig`].
//!
//! Ingestion is tolerant. Exports are produced by many APIC versions and
//! hand-edited often enough that a strict reader would reject real configs,
//! so anything suspicious but recoverable (a missing name, an unparsable
//! number, an unsupported object) is skipped with one diagnostic message and
//! parsing continues. Only the outermost decode of the export is allowed to
//! fail hard, and that happens before this module runs.

use std::path::Path;

use mo_tree_core::MoNode;

use super::contract::{Contract, FilterAction, FilterEntry, FilterRef, Subject};
use super::fabric::{ManagementInfo, NodeInterface, NodeRole, PathAttachment, VpcPair};
use super::l3out::{
    BgpPeer, ExternalEpg, L3Out, OspfArea, OspfAreaType, OspfInterface, StaticRoute,
};
use super::tenant::Tenant;
use super::{Diagnostics, FabricConfig};

/// Managed-object classes this library understands.
///
/// Dispatch goes through this closed enum rather than string comparison at
/// every call site. Classes an export uses beyond these map to
/// [`MoClass::Unknown`] and are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoClass {
    // Structural containers.
    Imdata,
    PolUni,
    FabricInst,
    FabricProtPol,
    FabricNodeIdentPol,
    CtrlrInst,
    // Tenant policy.
    FvTenant,
    FvAp,
    FvCtx,
    FvBd,
    FvSubnet,
    FvRsCtx,
    FvRsBd,
    FvAePg,
    FvRsProv,
    FvRsCons,
    FvRsProtBy,
    FvRsPathAtt,
    VzBrCp,
    VzSubj,
    VzRsSubjFiltAtt,
    VzFilter,
    VzEntry,
    VzTaboo,
    // External connectivity.
    L3extOut,
    L3extRsEctx,
    L3extInstP,
    L3extSubnet,
    IpRouteP,
    IpNexthopP,
    BgpExtP,
    BgpPeerP,
    OspfExtP,
    OspfIfP,
    L2extOut,
    L2extRsEBd,
    // Fabric membership and management.
    FabricNodePEp,
    FabricNodeIdentP,
    FabricExplicitGEp,
    FabricInterface,
    L1PhysIf,
    MgmtMgmtP,
    MgmtOoB,
    MgmtRsOoBStNode,
    Unknown,
}

impl MoClass {
    /// Maps an exported tag to its class. Exports are inconsistent about
    /// casing for the `l3ext`/`l2ext` family, so both spellings are accepted.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "imdata" => MoClass::Imdata,
            "polUni" => MoClass::PolUni,
            "fabricInst" => MoClass::FabricInst,
            "fabricProtPol" => MoClass::FabricProtPol,
            "fabricNodeIdentPol" => MoClass::FabricNodeIdentPol,
            "ctrlrInst" => MoClass::CtrlrInst,
            "fvTenant" => MoClass::FvTenant,
            "fvAp" => MoClass::FvAp,
            "fvCtx" => MoClass::FvCtx,
            "fvBD" => MoClass::FvBd,
            "fvSubnet" => MoClass::FvSubnet,
            "fvRsCtx" => MoClass::FvRsCtx,
            "fvRsBd" => MoClass::FvRsBd,
            "fvAEPg" => MoClass::FvAePg,
            "fvRsProv" => MoClass::FvRsProv,
            "fvRsCons" => MoClass::FvRsCons,
            "fvRsProtBy" => MoClass::FvRsProtBy,
            "fvRsPathAtt" => MoClass::FvRsPathAtt,
            "vzBrCP" => MoClass::VzBrCp,
            "vzSubj" => MoClass::VzSubj,
            "vzRsSubjFiltAtt" => MoClass::VzRsSubjFiltAtt,
            "vzFilter" => MoClass::VzFilter,
            "vzEntry" => MoClass::VzEntry,
            "vzTaboo" => MoClass::VzTaboo,
            "l3extOut" | "l3ExtOut" => MoClass::L3extOut,
            "l3extRsEctx" => MoClass::L3extRsEctx,
            "l3extInstP" | "l3ExtInstP" => MoClass::L3extInstP,
            "l3extSubnet" | "l3ExtSubnet" => MoClass::L3extSubnet,
            "ipRouteP" => MoClass::IpRouteP,
            "ipNexthopP" => MoClass::IpNexthopP,
            "bgpExtP" => MoClass::BgpExtP,
            "bgpPeerP" => MoClass::BgpPeerP,
            "ospfExtP" => MoClass::OspfExtP,
            "ospfIfP" => MoClass::OspfIfP,
            "l2extOut" | "l2ExtOut" => MoClass::L2extOut,
            "l2extRsEBd" => MoClass::L2extRsEBd,
            "fabricNodePEp" => MoClass::FabricNodePEp,
            "fabricNodeIdentP" => MoClass::FabricNodeIdentP,
            "fabricExplicitGEp" => MoClass::FabricExplicitGEp,
            "fabricInterface" => MoClass::FabricInterface,
            "l1PhysIf" => MoClass::L1PhysIf,
            "mgmtMgmtP" => MoClass::MgmtMgmtP,
            "mgmtOoB" => MoClass::MgmtOoB,
            "mgmtRsOoBStNode" => MoClass::MgmtRsOoBStNode,
            _ => MoClass::Unknown,
        }
    }
}

/// Builds a finalized fabric model from a parsed export.
///
/// Convenience for the common case; callers that want to merge several trees
/// into one model use [`ingest_tree`] repeatedly and call
/// [`FabricConfig::finalize`] themselves.
pub fn build_model(tree: &MoNode, source_name: &str, diags: &mut Diagnostics) -> FabricConfig {
    let mut config = FabricConfig::new(source_name);
    ingest_tree(&mut config, tree, diags);
    config.finalize(diags);
    config
}

/// Source name for [`build_model`] from an export path: the file name
/// portion, or the whole path when it has none.
pub fn export_source_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().to_string(),
        None => path.display().to_string(),
    }
}

/// Walks one managed-object tree into the config without finalizing it.
pub fn ingest_tree(config: &mut FabricConfig, tree: &MoNode, diags: &mut Diagnostics) {
    match MoClass::from_tag(&tree.class) {
        MoClass::Imdata
        | MoClass::PolUni
        | MoClass::FabricInst
        | MoClass::FabricProtPol
        | MoClass::FabricNodeIdentPol
        | MoClass::CtrlrInst => {
            for child in &tree.children {
                ingest_tree(config, child, diags);
            }
        }
        MoClass::FvTenant => parse_tenant(config, tree, diags),
        MoClass::FabricNodePEp | MoClass::FabricNodeIdentP => {
            parse_fabric_node(config, tree, diags);
        }
        MoClass::FabricExplicitGEp => parse_vpc_pair(config, tree),
        MoClass::MgmtMgmtP => parse_management_policy(config, tree, diags),
        _ => {}
    }
}

fn parse_tenant(config: &mut FabricConfig, node: &MoNode, diags: &mut Diagnostics) {
    let name = match node.attr_nonempty("name") {
        Some(name) => name.to_string(),
        None => {
            diags.warn("fvTenant with no name ignored");
            return;
        }
    };

    let mut attachments = Vec::new();
    let mut mgmt_policies = Vec::new();
    {
        let tenant = config.get_or_create_tenant(&name);
        if let Some(descr) = node.attr_nonempty("descr") {
            tenant.description = Some(descr.to_string());
        }

        for child in &node.children {
            match MoClass::from_tag(&child.class) {
                MoClass::FvCtx => parse_vrf(tenant, child),
                MoClass::FvBd => parse_bridge_domain(tenant, child),
                MoClass::FvAp => parse_app_profile(tenant, child, &mut attachments, diags),
                MoClass::FvAePg => parse_epg(tenant, None, child, &mut attachments, diags),
                MoClass::VzBrCp => parse_contract(tenant, child, false),
                MoClass::VzTaboo => parse_contract(tenant, child, true),
                MoClass::VzFilter => parse_filter(tenant, child),
                MoClass::L3extOut => parse_l3out(tenant, child, diags),
                MoClass::L2extOut => parse_l2out(tenant, child),
                MoClass::MgmtMgmtP => mgmt_policies.push(child),
                _ => {
                    diags.warn(format!(
                        "skipping unsupported object {} ({}) in tenant {}",
                        child.class,
                        child.attr_nonempty("name").unwrap_or("unnamed"),
                        name
                    ));
                }
            }
        }
    }
    for attachment in attachments {
        config.add_path_attachment(attachment);
    }
    for policy in mgmt_policies {
        parse_management_policy(config, policy, diags);
    }
}

fn parse_vrf(tenant: &mut Tenant, node: &MoNode) {
    let Some(name) = node.attr_nonempty("name") else {
        return;
    };
    let descr = node.attr_nonempty("descr").map(str::to_string);
    let vrf = tenant.get_or_create_vrf(name);
    if descr.is_some() {
        vrf.description = descr;
    }
}

fn parse_bridge_domain(tenant: &mut Tenant, node: &MoNode) {
    let Some(name) = node.attr_nonempty("name") else {
        return;
    };
    let descr = node.attr_nonempty("descr").map(str::to_string);
    let bd = tenant.get_or_create_bridge_domain(name);
    if descr.is_some() {
        bd.description = descr;
    }
    for child in &node.children {
        match MoClass::from_tag(&child.class) {
            MoClass::FvSubnet => {
                if let Some(ip) = child.attr_nonempty("ip") {
                    bd.subnets.push(ip.to_string());
                }
            }
            MoClass::FvRsCtx => {
                if let Some(vrf) = child.attr_nonempty("tnFvCtxName") {
                    bd.vrf = Some(vrf.to_string());
                }
            }
            // The BD's own path attachment carries its VLAN encapsulation.
            MoClass::FvRsPathAtt => {
                if let Some(encap) = child.attr_nonempty("encap") {
                    if encap != "unknown" {
                        bd.encapsulation = Some(encap.to_string());
                    }
                }
            }
            _ => {}
        }
    }
}

fn parse_app_profile(
    tenant: &mut Tenant,
    node: &MoNode,
    attachments: &mut Vec<PathAttachment>,
    diags: &mut Diagnostics,
) {
    let Some(ap_name) = node.attr_nonempty("name") else {
        return;
    };
    let ap_name = ap_name.to_string();
    for child in node.get_children("fvAEPg") {
        parse_epg(tenant, Some(&ap_name), child, attachments, diags);
    }
}

fn parse_epg(
    tenant: &mut Tenant,
    app_profile: Option<&str>,
    node: &MoNode,
    attachments: &mut Vec<PathAttachment>,
    diags: &mut Diagnostics,
) {
    let Some(name) = node.attr_nonempty("name") else {
        return;
    };
    let descr = node.attr_nonempty("descr").map(str::to_string);
    let epg = tenant.get_or_create_epg(app_profile, name);
    if descr.is_some() {
        epg.description = descr;
    }
    let epg_key = epg.name.clone();

    for child in &node.children {
        match MoClass::from_tag(&child.class) {
            MoClass::FvRsBd => {
                if let Some(bd) = child.attr_nonempty("tnFvBDName") {
                    epg.bridge_domain = Some(bd.to_string());
                }
            }
            MoClass::FvRsProv => {
                if let Some(contract) = child.attr_nonempty("tnVzBrCPName") {
                    epg.provided_contracts.push(contract.to_string());
                }
            }
            MoClass::FvRsCons => {
                if let Some(contract) = child.attr_nonempty("tnVzBrCPName") {
                    epg.consumed_contracts.push(contract.to_string());
                }
            }
            MoClass::FvRsProtBy => {
                if let Some(taboo) = child.attr_nonempty("tnVzTabooName") {
                    epg.protected_by_taboos.push(taboo.to_string());
                }
            }
            MoClass::FvRsPathAtt => {
                let Some(dn) = child.attr_nonempty("tDn") else {
                    continue;
                };
                match PathAttachment::parse(dn) {
                    Some(mut attachment) => {
                        attachment.encap = child.attr_nonempty("encap").map(str::to_string);
                        attachment.description = child.attr_nonempty("descr").map(str::to_string);
                        attachment.epg = Some(epg_key.clone());
                        attachments.push(attachment);
                    }
                    None => {
                        diags.warn(format!(
                            "EPG {} path attachment with unparsable DN {}",
                            epg_key, dn
                        ));
                    }
                }
            }
            _ => {}
        }
    }
}

fn parse_contract(tenant: &mut Tenant, node: &MoNode, taboo: bool) {
    let Some(name) = node.attr_nonempty("name") else {
        return;
    };
    let scope = node.attr_nonempty("scope").map(str::to_string);
    let descr = node.attr_nonempty("descr").map(str::to_string);
    let contract: &mut Contract = if taboo {
        tenant.get_or_create_taboo_contract(name)
    } else {
        tenant.get_or_create_contract(name)
    };
    if scope.is_some() {
        contract.scope = scope;
    }
    if descr.is_some() {
        contract.description = descr;
    }
    for child in node.get_children("vzSubj") {
        contract.subjects.push(parse_subject(child));
    }
}

fn parse_subject(node: &MoNode) -> Subject {
    let mut subject = Subject {
        name: node.attr_nonempty("name").map(str::to_string),
        reverse_filter_ports: matches!(node.attr("revFltPorts"), Some("yes") | Some("true")),
        filters: Vec::new(),
    };
    for child in node.get_children("vzRsSubjFiltAtt") {
        let mut fref = FilterRef::new(child.attr_nonempty("tnVzFilterName").unwrap_or(""));
        fref.action = FilterAction::parse(child.attr("action"));
        subject.filters.push(fref);
    }
    subject
}

fn parse_filter(tenant: &mut Tenant, node: &MoNode) {
    let Some(name) = node.attr_nonempty("name") else {
        return;
    };
    let descr = node.attr_nonempty("descr").map(str::to_string);
    let filter = tenant.get_or_create_filter(name);
    if descr.is_some() {
        filter.description = descr;
    }
    for child in node.get_children("vzEntry") {
        let attr = |key: &str| child.attr_nonempty(key).map(str::to_string);
        filter.entries.push(FilterEntry {
            name: attr("name"),
            ether_type: attr("etherT"),
            protocol: attr("prot"),
            dst_port: attr("dPort"),
            dst_from_port: attr("dFromPort"),
            dst_to_port: attr("dToPort"),
            src_port: attr("sPort"),
            src_from_port: attr("sFromPort"),
            src_to_port: attr("sToPort"),
            icmp_type: attr("icmpv4T"),
            icmp_code: attr("icmpv4C"),
            stateful: attr("stateful"),
        });
    }
}

fn parse_l3out(tenant: &mut Tenant, node: &MoNode, diags: &mut Diagnostics) {
    let Some(name) = node.attr_nonempty("name") else {
        return;
    };
    let descr = node.attr_nonempty("descr").map(str::to_string);
    let l3out = tenant.get_or_create_l3out(name);
    if descr.is_some() {
        l3out.description = descr;
    }
    for child in &node.children {
        match MoClass::from_tag(&child.class) {
            MoClass::L3extRsEctx => {
                if let Some(vrf) = child.attr_nonempty("tnFvCtxName") {
                    l3out.vrf = Some(vrf.to_string());
                }
            }
            MoClass::L3extInstP => parse_external_epg(l3out, child, diags),
            MoClass::BgpExtP => parse_bgp(l3out, child, diags),
            MoClass::OspfExtP => parse_ospf(l3out, child, diags),
            _ => {}
        }
    }
}

fn parse_external_epg(l3out: &mut L3Out, node: &MoNode, diags: &mut Diagnostics) {
    let name = match node.attr_nonempty("name") {
        Some(name) => name.to_string(),
        // Exports sometimes leave external EPGs nameless; synthesize one so
        // the subnets are not lost.
        None => format!("extepg-{}", l3out.local_name()),
    };
    let mut ext_epg = ExternalEpg::new(&name);
    ext_epg.description = node.attr_nonempty("descr").map(str::to_string);

    for child in &node.children {
        match MoClass::from_tag(&child.class) {
            MoClass::L3extSubnet => {
                if let Some(ip) = child.attr_nonempty("ip") {
                    ext_epg.subnets.push(ip.to_string());
                }
            }
            MoClass::IpRouteP => {
                let Some(prefix) = child.attr_nonempty("ip") else {
                    continue;
                };
                let mut route = StaticRoute::new(prefix);
                if let Some(next_hop) = child.attr_nonempty("nextHop") {
                    route.next_hops.push(next_hop.to_string());
                }
                for hop in child.get_children("ipNexthopP") {
                    if let Some(addr) = hop.attr_nonempty("nhAddr") {
                        route.next_hops.push(addr.to_string());
                    }
                }
                route.interface = child.attr_nonempty("ifName").map(str::to_string);
                if let Some(pref) = child.attr_nonempty("pref") {
                    match pref.parse::<u32>() {
                        Ok(value) => route.preference = Some(value),
                        Err(_) => diags.warn(format!(
                            "invalid preference {} on static route {} in L3Out {}",
                            pref, prefix, l3out.name
                        )),
                    }
                }
                l3out.static_routes.push(route);
            }
            MoClass::FvRsProv => {
                if let Some(contract) = child.attr_nonempty("tnVzBrCPName") {
                    ext_epg.provided_contracts.push(contract.to_string());
                }
            }
            MoClass::FvRsCons => {
                if let Some(contract) = child.attr_nonempty("tnVzBrCPName") {
                    ext_epg.consumed_contracts.push(contract.to_string());
                }
            }
            _ => {}
        }
    }
    l3out.external_epgs.push(ext_epg);
}

fn parse_bgp(l3out: &mut L3Out, node: &MoNode, diags: &mut Diagnostics) {
    let mut process = l3out.bgp_process.take().unwrap_or_default();
    if let Some(router_id) = node.attr_nonempty("routerId") {
        process.router_id = Some(router_id.to_string());
    }
    if let Some(asn) = node.attr_nonempty("asn") {
        match asn.parse::<u32>() {
            Ok(value) => process.asn = Some(value),
            Err(_) => diags.warn(format!(
                "invalid AS number {} on BGP process in L3Out {}, ignoring",
                asn, l3out.name
            )),
        }
    }
    l3out.bgp_process = Some(process);

    for child in node.get_children("bgpPeerP") {
        let Some(addr) = child.attr_nonempty("addr") else {
            continue;
        };
        let mut peer = BgpPeer::new(addr);
        peer.description = child.attr_nonempty("descr").map(str::to_string);
        for (attr, slot) in [
            ("asn", &mut peer.remote_asn),
            ("localAsn", &mut peer.local_asn),
        ] {
            if let Some(value) = child.attr_nonempty(attr) {
                match value.parse::<u32>() {
                    Ok(parsed) => *slot = Some(parsed),
                    Err(_) => diags.warn(format!(
                        "invalid AS number {} on BGP peer {} in L3Out {}, ignoring",
                        value, addr, l3out.name
                    )),
                }
            }
        }
        l3out.bgp_peers.push(peer);
    }
}

fn parse_ospf(l3out: &mut L3Out, node: &MoNode, diags: &mut Diagnostics) {
    let mut ospf = l3out.ospf.take().unwrap_or_default();
    if let Some(name) = node.attr_nonempty("name") {
        ospf.name = Some(name.to_string());
    }
    if let Some(descr) = node.attr_nonempty("descr") {
        ospf.description = Some(descr.to_string());
    }
    if let Some(area) = node.attr_nonempty("area") {
        ospf.area_id = Some(area.to_string());
        let entry = ospf
            .areas
            .entry(area.to_string())
            .or_insert_with(|| OspfArea::new(area));
        entry.area_type = OspfAreaType::parse(node.attr("areaType"));
    }

    for child in node.get_children("ospfIfP") {
        let mut iface = OspfInterface {
            name: child.attr_nonempty("name").map(str::to_string),
            description: child.attr_nonempty("descr").map(str::to_string),
            ..OspfInterface::default()
        };
        for (attr, slot) in [
            ("cost", &mut iface.cost),
            ("helloIntvl", &mut iface.hello_interval),
            ("deadIntvl", &mut iface.dead_interval),
        ] {
            if let Some(value) = child.attr_nonempty(attr) {
                match value.parse::<u32>() {
                    Ok(parsed) => *slot = Some(parsed),
                    Err(_) => diags.warn(format!(
                        "invalid OSPF {} {} in L3Out {}, using default",
                        attr, value, l3out.name
                    )),
                }
            }
        }
        ospf.interfaces.push(iface);
    }
    l3out.ospf = Some(ospf);
}

fn parse_l2out(tenant: &mut Tenant, node: &MoNode) {
    let Some(name) = node.attr_nonempty("name") else {
        return;
    };
    let descr = node.attr_nonempty("descr").map(str::to_string);
    let l2out = tenant.get_or_create_l2out(name);
    if descr.is_some() {
        l2out.description = descr;
    }
    for child in node.get_children("l2extRsEBd") {
        if let Some(bd) = child.attr_nonempty("tnFvBDName") {
            l2out.bridge_domain = Some(bd.to_string());
        }
        if let Some(encap) = child.attr_nonempty("encap") {
            l2out.encapsulation = Some(encap.to_string());
        }
    }
}

fn parse_fabric_node(config: &mut FabricConfig, node: &MoNode, diags: &mut Diagnostics) {
    // Some exports write the node id as `nodeId`, others as `id`.
    let id = match node
        .attr_nonempty("nodeId")
        .or_else(|| node.attr_nonempty("id"))
    {
        Some(id) => id.to_string(),
        None => {
            diags.warn(format!("{} with no node id ignored", node.class));
            return;
        }
    };
    let fabric_node = config.get_or_create_fabric_node(&id);
    if let Some(name) = node.attr_nonempty("name") {
        fabric_node.name = Some(name.to_string());
    }
    if let Some(pod_id) = node.attr_nonempty("podId") {
        fabric_node.pod_id = pod_id.to_string();
    }
    let role = NodeRole::infer(node.attr_nonempty("role"), fabric_node.name.as_deref());
    if role != NodeRole::Unspecified {
        fabric_node.role = role;
    }

    for child in &node.children {
        match MoClass::from_tag(&child.class) {
            MoClass::FabricInterface => {
                if let Some(name) = child.attr_nonempty("name") {
                    fabric_node.add_interface(NodeInterface::new(name));
                }
            }
            MoClass::L1PhysIf => {
                if let Some(name) = child.attr_nonempty("id") {
                    let mut iface = NodeInterface::new(name);
                    iface.description = child.attr_nonempty("descr").map(str::to_string);
                    fabric_node.add_interface(iface);
                }
            }
            _ => {}
        }
    }
}

fn parse_vpc_pair(config: &mut FabricConfig, node: &MoNode) {
    let Some(id) = node.attr_nonempty("id") else {
        return;
    };
    let mut node_ids = Vec::new();
    for child in node.get_children("fabricNodePEp") {
        if let Some(node_id) = child
            .attr_nonempty("nodeId")
            .or_else(|| child.attr_nonempty("id"))
        {
            node_ids.push(node_id.to_string());
        }
    }
    // Anything other than exactly two members is not a usable VPC pair.
    if node_ids.len() != 2 {
        return;
    }
    config.vpc_pairs.insert(
        id.to_string(),
        VpcPair {
            id: id.to_string(),
            name: node.attr_nonempty("name").map(str::to_string),
            peer1: node_ids.remove(0),
            peer2: node_ids.remove(0),
        },
    );
}

fn parse_management_policy(config: &mut FabricConfig, node: &MoNode, diags: &mut Diagnostics) {
    for oob in node.get_children("mgmtOoB") {
        for st_node in oob.get_children("mgmtRsOoBStNode") {
            let (Some(dn), Some(addr)) = (
                st_node.attr_nonempty("tDn"),
                st_node.attr_nonempty("addr"),
            ) else {
                continue;
            };
            // tDn looks like `topology/pod-1/node-1208`.
            let node_id = dn
                .split('/')
                .find_map(|part| part.strip_prefix("node-"))
                .filter(|id| !id.is_empty());
            let Some(node_id) = node_id else {
                diags.warn(format!("could not parse node id from management tDn {}", dn));
                continue;
            };
            config.management.insert(
                node_id.to_string(),
                ManagementInfo {
                    address: addr.to_string(),
                    gateway: st_node.attr_nonempty("gw").map(str::to_string),
                },
            );
        }
    }
}
