//! Cisco ACI fabric configuration conversion and analysis.
//!
//! This library turns APIC configuration exports (the JSON or XML dumps an
//! operator pulls from the controller) into per-switch device configurations
//! and audit findings. ACI policy is declarative and centralized; what actually
//! runs on each leaf and spine is implicit. This library makes it explicit, so
//! the result can be inspected, diffed, and checked for common fabric mistakes.
//!
//! # Architecture
//!
//! The library is organized into several functional areas:
//!
//! ## Model
//!
//! - [`model`] — The fabric object model built from a managed-object tree
//!   - Tenants with VRFs, bridge domains, EPGs, contracts, and filters
//!   - L3Outs (BGP, OSPF, static routes) and L2Outs
//!   - Fabric nodes, VPC pairs, and out-of-band management addresses
//!   - A finalize barrier that rewrites raw object references to canonical
//!     `tenant:name` keys
//!
//! ## Synthesis
//!
//! - [`synth`] — Per-node device configuration synthesis
//!   - Interface synthesis (fabric ports, loopbacks, SVIs, port-channels)
//!   - Contract and taboo compilation into named ACLs
//!   - BGP, OSPF, and static route conversion
//!   - Fabric topology (leaf/spine links, VPC peer links)
//!
//! ## Analysis
//!
//! - [`analysis`] — Audit passes over the fabric model
//!   - Subnet conflicts (duplicates, overlaps, malformed prefixes)
//!   - VRF isolation (overlapping VRF address space, cross-VRF contracts)
//!   - Contract usage (any/any permits, unresolved filters, unused contracts)
//!   - EPG reachability (missing bridge domains, missing contracts)
//!
//! ## Reporting
//!
//! - [`report`] — Terminal-friendly colored audit output and JSON reports
//! - [`inspect`] — Managed-object tree and fabric summary visualization
//! - [`profile`] — Audit profiles controlling severity floors and categories
//!
//! # Workflow
//!
//! The typical analysis workflow:
//!
//! 1. **Parse** the export into a managed-object tree
//! 2. **Ingest** the tree into a [`model::FabricConfig`], collecting
//!    diagnostics for anything tolerated but suspicious
//! 3. **Finalize** the model so every cross-reference is canonical or absent
//! 4. **Synthesize** one device configuration per fabric node
//! 5. **Audit** the model with the analysis passes
//! 6. **Report** findings, filtered through an audit profile
//!
//! # Examples
//!
//! ```ignore
//! use aci_convert::model::{self, Diagnostics};
//! use aci_convert::{analysis, synth};
//! use mo_tree_core::parse_file;
//!
//! let tree = parse_file("aci-dc1.json".as_ref())?;
//! let mut diags = Diagnostics::new();
//! let fabric = model::build_model(&tree, "aci-dc1.json", &mut diags);
//!
//! let devices = synth::synthesize(&fabric, &mut diags);
//! println!("synthesized {} device configs", devices.len());
//!
//! let findings = analysis::analyze_fabric(&fabric);
//! println!("{} findings, worst {:?}", findings.total(), findings.max_severity());
//! ```
//!
//! # Built on mo-tree-core
//!
//! This library uses `mo-tree-core` for generic managed-object tree parsing.
//! All ACI-specific logic is contained in this crate.

pub mod analysis;
pub mod inspect;
pub mod model;
pub mod profile;
pub mod report;
pub mod synth;
