use mo_tree_core::MoNode;

use crate::model::FabricConfig;

/// Render a managed-object tree with a configurable max depth.
pub fn render_tree(node: &MoNode, max_depth: usize) -> String {
    let mut out = String::new();
    render_node(node, 0, max_depth, &mut out);
    out
}

fn render_node(node: &MoNode, depth: usize, max_depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match node.attr_nonempty("name") {
        Some(name) => out.push_str(&format!("{}{} name={}\n", indent, node.class, name)),
        None => out.push_str(&format!("{}{}\n", indent, node.class)),
    }

    if depth >= max_depth {
        return;
    }

    for child in &node.children {
        render_node(child, depth + 1, max_depth, out);
    }
}

/// Render counts of the fabric objects an export resolved to.
pub fn render_fabric_summary(config: &FabricConfig) -> String {
    let mut vrfs = 0;
    let mut bridge_domains = 0;
    let mut epgs = 0;
    let mut contracts = 0;
    let mut filters = 0;
    let mut l3outs = 0;
    for tenant in config.tenants.values() {
        vrfs += tenant.vrfs.len();
        bridge_domains += tenant.bridge_domains.len();
        epgs += tenant.epgs.len();
        contracts += tenant.contracts.len();
        filters += tenant.filters.len();
        l3outs += tenant.l3outs.len();
    }
    let leaves = config.fabric_nodes.values().filter(|n| n.is_leaf()).count();
    let spines = config.fabric_nodes.values().filter(|n| n.is_spine()).count();

    let mut out = Vec::new();
    out.push(format!("fabric {}", config.hostname()));
    out.push(format!("- tenants: {}", config.tenants.len()));
    out.push(format!("- vrfs: {vrfs}"));
    out.push(format!("- bridge_domains: {bridge_domains}"));
    out.push(format!("- epgs: {epgs}"));
    out.push(format!("- contracts: {contracts}"));
    out.push(format!("- filters: {filters}"));
    out.push(format!("- l3outs: {l3outs}"));
    out.push(format!(
        "- fabric_nodes: {} (leaves={leaves} spines={spines})",
        config.fabric_nodes.len()
    ));
    out.push(format!("- vpc_pairs: {}", config.vpc_pairs.len()));
    out.join("\n")
}
