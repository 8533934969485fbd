//! Bridge domain subnet conflict analysis.
//!
//! Walks every bridge domain with its resolved VRF and subnet list and
//! reports addressing problems:
//!
//! 1. **NO_SUBNET** — bridge domain declares no subnets at all
//! 2. **INVALID_FORMAT** — subnet text is not CIDR, or is a degenerate /31
//! 3. **DUPLICATE** — two bridge domains declare the byte-identical subnet,
//!    regardless of VRF
//! 4. **OVERLAP_SAME_VRF** — two bridge domains in the same VRF declare
//!    distinct subnets whose address ranges intersect
//!
//! Pair checks yield at most one finding per unordered bridge domain pair,
//! the most specific category that applies: an identical subnet is reported
//! as DUPLICATE only, never additionally as an overlap.

use std::net::Ipv4Addr;

use crate::analysis::findings::{
    dedup_sorted, FindingPayload, Severity, SubnetCategory, SubnetFinding, SubnetFindingKey,
};
use crate::model::{BridgeDomain, FabricConfig};

/// Whether two subnet strings cover intersecting address ranges.
///
/// Containment counts as overlap; adjacent ranges do not. Either side
/// failing CIDR validation yields `false` rather than an error, so callers
/// can feed raw configuration text straight in.
pub fn subnets_overlap(a: &str, b: &str) -> bool {
    match (Cidr::parse(a), Cidr::parse(b)) {
        (Some(a), Some(b)) => a.intersects(&b),
        _ => false,
    }
}

/// Check all bridge domain subnets for conflicts across the fabric.
///
/// Expects a finalized model so VRF references are canonical. Findings come
/// back deduplicated and ordered by descending severity.
pub fn analyze_subnets(config: &FabricConfig) -> Vec<SubnetFinding> {
    let mut out = Vec::new();
    let domains: Vec<&BridgeDomain> = config
        .tenants
        .values()
        .flat_map(|tenant| tenant.bridge_domains.values())
        .collect();

    for bd in &domains {
        check_own_subnets(bd, &mut out);
    }
    for (i, first) in domains.iter().enumerate() {
        for second in domains.iter().skip(i + 1) {
            check_pair(first, second, &mut out);
        }
    }
    dedup_sorted(out, |f: &SubnetFinding| f.severity())
}

/// Per-bridge-domain checks: missing subnets and malformed subnet text.
fn check_own_subnets(bd: &BridgeDomain, out: &mut Vec<SubnetFinding>) {
    if bd.subnets.is_empty() {
        out.push(single(
            Severity::Low,
            SubnetCategory::NoSubnet,
            bd,
            None,
            FindingPayload {
                description: format!("bridge domain {} has no subnets", bd.name),
                impact: "endpoints in this bridge domain have no gateway and no routable prefix"
                    .to_string(),
                recommendation: "add a subnet or remove the bridge domain".to_string(),
            },
        ));
        return;
    }
    for subnet in &bd.subnets {
        match Cidr::parse(subnet) {
            None => out.push(single(
                Severity::Medium,
                SubnetCategory::InvalidFormat,
                bd,
                Some(subnet),
                FindingPayload {
                    description: format!(
                        "subnet {subnet} on bridge domain {} is not valid CIDR notation",
                        bd.name
                    ),
                    impact: "the subnet cannot be converted or checked for conflicts".to_string(),
                    recommendation: "correct the subnet to address/prefix form".to_string(),
                },
            )),
            Some(cidr) if cidr.prefix_len == 31 => out.push(single(
                Severity::Low,
                SubnetCategory::InvalidFormat,
                bd,
                Some(subnet),
                FindingPayload {
                    description: format!(
                        "subnet {subnet} on bridge domain {} uses a /31 prefix",
                        bd.name
                    ),
                    impact: "a /31 leaves no room for a gateway plus endpoints".to_string(),
                    recommendation:
                        "widen the prefix unless this is a deliberate point-to-point link"
                            .to_string(),
                },
            )),
            Some(_) => {}
        }
    }
}

/// Pairwise check between two bridge domains. Emits at most one finding:
/// a byte-identical subnet wins over a range overlap.
fn check_pair(first: &BridgeDomain, second: &BridgeDomain, out: &mut Vec<SubnetFinding>) {
    if let Some(shared) = first
        .subnets
        .iter()
        .find(|subnet| second.subnets.contains(subnet))
    {
        out.push(SubnetFinding {
            key: SubnetFindingKey {
                severity: Severity::High,
                category: SubnetCategory::Duplicate,
                bd1: first.name.clone(),
                vrf1: first.vrf.clone(),
                subnet1: Some(shared.clone()),
                bd2: Some(second.name.clone()),
                vrf2: second.vrf.clone(),
                subnet2: Some(shared.clone()),
            },
            payload: FindingPayload {
                description: format!(
                    "subnet {shared} is declared by both {} and {}",
                    first.name, second.name
                ),
                impact: "duplicate prefixes make endpoint locations ambiguous within the fabric"
                    .to_string(),
                recommendation: "renumber one bridge domain or consolidate the two".to_string(),
            },
        });
        return;
    }

    let vrf = match (&first.vrf, &second.vrf) {
        (Some(a), Some(b)) if a == b => a,
        _ => return,
    };
    for s1 in &first.subnets {
        for s2 in &second.subnets {
            if s1 != s2 && subnets_overlap(s1, s2) {
                out.push(SubnetFinding {
                    key: SubnetFindingKey {
                        severity: Severity::Critical,
                        category: SubnetCategory::OverlapSameVrf,
                        bd1: first.name.clone(),
                        vrf1: Some(vrf.clone()),
                        subnet1: Some(s1.clone()),
                        bd2: Some(second.name.clone()),
                        vrf2: Some(vrf.clone()),
                        subnet2: Some(s2.clone()),
                    },
                    payload: FindingPayload {
                        description: format!(
                            "subnet {s1} on {} overlaps {s2} on {} in VRF {vrf}",
                            first.name, second.name
                        ),
                        impact:
                            "overlapping prefixes in one VRF blackhole or misroute traffic between \
                             the bridge domains"
                                .to_string(),
                        recommendation: "renumber so the prefixes are disjoint".to_string(),
                    },
                });
                return;
            }
        }
    }
}

fn single(
    severity: Severity,
    category: SubnetCategory,
    bd: &BridgeDomain,
    subnet: Option<&String>,
    payload: FindingPayload,
) -> SubnetFinding {
    SubnetFinding {
        key: SubnetFindingKey {
            severity,
            category,
            bd1: bd.name.clone(),
            vrf1: bd.vrf.clone(),
            subnet1: subnet.cloned(),
            bd2: None,
            vrf2: None,
            subnet2: None,
        },
        payload,
    }
}

/// IPv4 network with host bits already masked off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cidr {
    network: u32,
    prefix_len: u8,
}

impl Cidr {
    fn parse(text: &str) -> Option<Cidr> {
        let (addr, len) = text.trim().split_once('/')?;
        let addr: Ipv4Addr = addr.parse().ok()?;
        let prefix_len: u8 = len.parse().ok()?;
        if prefix_len > 32 {
            return None;
        }
        let mask = if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - prefix_len)
        };
        Some(Cidr {
            network: u32::from(addr) & mask,
            prefix_len,
        })
    }

    fn last(&self) -> u32 {
        let host_bits = 32 - self.prefix_len;
        if host_bits == 32 {
            u32::MAX
        } else {
            self.network | ((1u32 << host_bits) - 1)
        }
    }

    fn intersects(&self, other: &Cidr) -> bool {
        self.network <= other.last() && other.network <= self.last()
    }
}
