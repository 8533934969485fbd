use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "aci-convert")]
#[command(about = "Convert and audit Cisco ACI fabric configuration exports")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Show the managed-object structure of a single export file.
    Inspect(InspectArgs),
    /// Convert fabric exports into per-device configurations.
    Convert(ConvertArgs),
    /// Audit one fabric export and report findings.
    Audit(AuditArgs),
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    pub file: PathBuf,
    /// Limit the tree to the first object of this managed-object class.
    #[arg(long)]
    pub class: Option<String>,
    #[arg(long, default_value_t = 3)]
    pub depth: usize,
    /// Build the fabric model and show a summary before the tree.
    #[arg(long)]
    pub detect: bool,
}

#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// Export files to convert, one fabric each.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Write one <hostname>.json per device instead of printing to stdout.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
    /// Include fabric topology links and inter-fabric connections.
    #[arg(long)]
    pub topology: bool,
}

#[derive(Parser, Debug)]
pub struct AuditArgs {
    /// Export file to audit.
    pub file: PathBuf,
    /// Audit profile name (embedded profiles: default, strict).
    #[arg(long, default_value = "default")]
    pub profile: String,
    /// Optional profiles directory (expects <dir>/<name>.toml).
    #[arg(long)]
    pub profiles_dir: Option<PathBuf>,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Exit non-zero when findings at or above HIGH remain after filtering.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
