use anyhow::{Context, Result};
use clap::Parser;

use aci_convert::inspect::{render_fabric_summary, render_tree};
use aci_convert::model::{self, Diagnostics};
use mo_tree_core::parse_file;

mod audit_cmd;
mod cli;
mod convert_cmd;

use cli::{Cli, Command, InspectArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Inspect(args) => run_inspect(args),
        Command::Convert(args) => convert_cmd::run_convert(args),
        Command::Audit(args) => audit_cmd::run_audit(args),
    }
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let node = parse_file(&args.file)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;

    if args.detect {
        let mut diags = Diagnostics::new();
        let fabric =
            model::build_model(&node, &model::export_source_name(&args.file), &mut diags);
        for message in diags.messages() {
            eprintln!("warning: {message}");
        }
        println!("{}", render_fabric_summary(&fabric));
        println!();
    }

    let target = if let Some(class) = &args.class {
        node.find_class(class)
            .with_context(|| format!("class '{}' not found", class))?
    } else {
        &node
    };

    print!("{}", render_tree(target, args.depth));
    Ok(())
}
