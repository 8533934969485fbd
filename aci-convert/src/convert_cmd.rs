//! Fabric-to-device conversion orchestration.
//!
//! The conversion workflow is staged:
//!
//! 1. **Parse** — each export file becomes a managed-object tree
//! 2. **Ingest** — each tree becomes a finalized fabric model
//! 3. **Synthesize** — each fabric node becomes one device configuration
//! 4. **Topology** (optional) — leaf/spine links, VPC peer links, and
//!    inter-fabric connections detected across the converted exports
//! 5. **Output** — one JSON file per device, or a single report on stdout
//!
//! Diagnostics collected along the way go to stderr so that stdout stays
//! machine-readable.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use aci_convert::model::{
    self, detect_inter_fabric_connections, Diagnostics, FabricConfig, FabricLink,
    InterFabricConnection,
};
use aci_convert::synth::{self, DeviceConfig};
use mo_tree_core::parse_file;

use crate::cli::{ConvertArgs, OutputFormat};

/// Execute the conversion workflow for one or more fabric exports.
///
/// Devices from every export land in one map keyed by hostname; a hostname
/// produced twice across exports keeps its first configuration and emits a
/// diagnostic. With `--output-dir` each device is written to
/// `<dir>/<hostname>.json` (plus `topology.json` when requested), otherwise
/// the whole report is printed to stdout in the selected format.
pub fn run_convert(args: ConvertArgs) -> Result<()> {
    let mut diags = Diagnostics::new();

    let mut fabrics: BTreeMap<String, FabricConfig> = BTreeMap::new();
    for path in &args.files {
        let tree =
            parse_file(path).with_context(|| format!("failed to parse {}", path.display()))?;
        let fabric = model::build_model(&tree, &model::export_source_name(path), &mut diags);
        fabrics.insert(fabric.hostname().to_string(), fabric);
    }

    let mut devices: BTreeMap<String, DeviceConfig> = BTreeMap::new();
    for fabric in fabrics.values() {
        for (hostname, device) in synth::synthesize(fabric, &mut diags) {
            if devices.contains_key(&hostname) {
                diags.warn(format!(
                    "duplicate device hostname {hostname} across exports; keeping the first"
                ));
                continue;
            }
            devices.insert(hostname, device);
        }
    }

    let topology = if args.topology {
        Some(build_topology(&fabrics, &mut diags))
    } else {
        None
    };

    for message in diags.messages() {
        eprintln!("warning: {message}");
    }

    if let Some(dir) = &args.output_dir {
        return write_device_files(dir, &devices, topology.as_ref());
    }

    match args.format {
        OutputFormat::Text => {
            println!("{}", render_device_summary(&devices));
            if let Some(topology) = &topology {
                println!();
                println!("{}", render_topology(topology));
            }
        }
        OutputFormat::Json => {
            let report = ConvertReport { devices, topology };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn build_topology(
    fabrics: &BTreeMap<String, FabricConfig>,
    diags: &mut Diagnostics,
) -> TopologyReport {
    let connections = detect_inter_fabric_connections(fabrics);
    let mut links = Vec::new();
    for fabric in fabrics.values() {
        let hostnames = synth::node_hostnames(fabric, diags);
        links.extend(synth::fabric_links(fabric, &connections, &hostnames));
    }
    links.sort();
    links.dedup();
    TopologyReport {
        links,
        connections: connections.into_values().collect(),
    }
}

fn write_device_files(
    dir: &Path,
    devices: &BTreeMap<String, DeviceConfig>,
    topology: Option<&TopologyReport>,
) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    for (hostname, device) in devices {
        let path = dir.join(format!("{hostname}.json"));
        let json = serde_json::to_string_pretty(device)?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write device config {}", path.display()))?;
    }
    if let Some(topology) = topology {
        let path = dir.join("topology.json");
        let json = serde_json::to_string_pretty(topology)?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write topology {}", path.display()))?;
    }

    println!("wrote {} device configs to {}", devices.len(), dir.display());
    Ok(())
}

fn render_device_summary(devices: &BTreeMap<String, DeviceConfig>) -> String {
    let mut out = Vec::new();
    out.push("devices".to_string());
    if devices.is_empty() {
        out.push("- none".to_string());
    }
    for (hostname, device) in devices {
        out.push(format!(
            "- {hostname}: vrfs={} interfaces={} acls={}",
            device.vrfs.len(),
            device.interfaces.len(),
            device.acls.len()
        ));
    }
    out.join("\n")
}

fn render_topology(topology: &TopologyReport) -> String {
    let mut out = Vec::new();
    out.push("fabric_links".to_string());
    if topology.links.is_empty() {
        out.push("- none".to_string());
    }
    for link in &topology.links {
        out.push(format!(
            "- {}:{} <-> {}:{}",
            link.node1, link.interface1, link.node2, link.interface2
        ));
    }
    out.push(String::new());
    out.push("inter_fabric_connections".to_string());
    if topology.connections.is_empty() {
        out.push("- none".to_string());
    }
    for connection in &topology.connections {
        out.push(format!(
            "- {} <-> {} [{}] {}",
            connection.fabric1, connection.fabric2, connection.kind, connection.description
        ));
    }
    out.join("\n")
}

#[derive(Debug, Serialize)]
struct ConvertReport {
    devices: BTreeMap<String, DeviceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topology: Option<TopologyReport>,
}

#[derive(Debug, Serialize)]
struct TopologyReport {
    links: Vec<FabricLink>,
    connections: Vec<InterFabricConnection>,
}
