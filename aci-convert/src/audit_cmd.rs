use anyhow::{bail, Context, Result};
use serde::Serialize;

use aci_convert::analysis::{self, FabricFindings, Severity};
use aci_convert::model::{self, Diagnostics};
use aci_convert::profile::load_profile_with_source;
use aci_convert::report::{apply_profile, render_finding_summary, render_findings};
use mo_tree_core::parse_file;

use crate::cli::{AuditArgs, OutputFormat};

pub fn run_audit(args: AuditArgs) -> Result<()> {
    let node = parse_file(&args.file)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;

    let Some((profile, profile_source)) =
        load_profile_with_source(&args.profile, args.profiles_dir.as_deref())
    else {
        bail!("unknown audit profile {}", args.profile);
    };

    let mut diags = Diagnostics::new();
    let fabric = model::build_model(&node, &model::export_source_name(&args.file), &mut diags);
    for message in diags.messages() {
        eprintln!("warning: {message}");
    }

    let mut findings = analysis::analyze_fabric(&fabric);
    apply_profile(&mut findings, &profile);
    let gating = findings.count(Severity::Critical) + findings.count(Severity::High);

    match args.format {
        OutputFormat::Text => {
            println!(
                "fabric={} profile={} profile_source={}",
                fabric.hostname(),
                args.profile,
                profile_source
            );
            println!("{}", render_finding_summary(&findings));
            println!();
            println!("{}", render_findings(&findings));
        }
        OutputFormat::Json => {
            let report = AuditReport {
                fabric: fabric.hostname().to_string(),
                profile: args.profile.clone(),
                profile_source,
                findings,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if args.strict && gating > 0 {
        bail!("audit failed in strict mode: {gating} findings at HIGH or above");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct AuditReport {
    fabric: String,
    profile: String,
    profile_source: String,
    findings: FabricFindings,
}
