use colored::Colorize;

use crate::analysis::{FabricFindings, FindingPayload, Severity};
use crate::profile::AuditProfile;

/// Drop findings the profile excludes, in place.
pub fn apply_profile(findings: &mut FabricFindings, profile: &AuditProfile) {
    findings
        .subnet
        .retain(|f| profile.includes(f.severity(), f.category_name()));
    findings
        .vrf_isolation
        .retain(|f| profile.includes(f.severity(), f.category_name()));
    findings
        .contract_usage
        .retain(|f| profile.includes(f.severity(), f.category_name()));
    findings
        .reachability
        .retain(|f| profile.includes(f.severity(), f.category_name()));
}

/// Render findings for terminal output, one section per analysis family.
pub fn render_findings(findings: &FabricFindings) -> String {
    let mut out = Vec::new();

    out.push("subnet_conflicts".to_string());
    if findings.subnet.is_empty() {
        out.push("- none".to_string());
    } else {
        for finding in &findings.subnet {
            push_finding(
                &mut out,
                finding.severity(),
                finding.category_name(),
                &finding.payload,
            );
        }
    }
    out.push(String::new());

    out.push("vrf_isolation".to_string());
    if findings.vrf_isolation.is_empty() {
        out.push("- none".to_string());
    } else {
        for finding in &findings.vrf_isolation {
            push_finding(
                &mut out,
                finding.severity(),
                finding.category_name(),
                &finding.payload,
            );
            if let Some(tenant) = &finding.tenant {
                out.push(format!("  tenant: {tenant}"));
            }
        }
    }
    out.push(String::new());

    out.push("contract_usage".to_string());
    if findings.contract_usage.is_empty() {
        out.push("- none".to_string());
    } else {
        for finding in &findings.contract_usage {
            push_finding(
                &mut out,
                finding.severity(),
                finding.category_name(),
                &finding.payload,
            );
        }
    }
    out.push(String::new());

    out.push("reachability".to_string());
    if findings.reachability.is_empty() {
        out.push("- none".to_string());
    } else {
        for finding in &findings.reachability {
            push_finding(
                &mut out,
                finding.severity(),
                finding.category_name(),
                &finding.payload,
            );
        }
    }

    out.join("\n")
}

/// Render finding counts by severity.
pub fn render_finding_summary(findings: &FabricFindings) -> String {
    format!(
        "findings total={} critical={} high={} medium={} low={}",
        findings.total(),
        findings.count(Severity::Critical),
        findings.count(Severity::High),
        findings.count(Severity::Medium),
        findings.count(Severity::Low),
    )
    .cyan()
    .to_string()
}

fn push_finding(
    out: &mut Vec<String>,
    severity: Severity,
    category: &str,
    payload: &FindingPayload,
) {
    out.push(format!(
        "- [{}] {} {}",
        severity_tag(severity),
        category,
        payload.description
    ));
    if !payload.impact.is_empty() {
        out.push(format!("  impact: {}", payload.impact));
    }
    if !payload.recommendation.is_empty() {
        out.push(format!("  recommendation: {}", payload.recommendation));
    }
}

fn severity_tag(severity: Severity) -> String {
    match severity {
        Severity::Critical => severity.as_str().red().bold().to_string(),
        Severity::High => severity.as_str().red().to_string(),
        Severity::Medium => severity.as_str().yellow().to_string(),
        Severity::Low => severity.as_str().to_string(),
    }
}
