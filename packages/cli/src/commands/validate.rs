use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use pagecraft_document::{to_json, RepairMode, SerializeError};
use std::fs;
use std::path::PathBuf;

use super::{load_document, repair_summary, resolve};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Page document to check
    pub file: PathBuf,

    /// Repair structural problems instead of failing on them
    #[arg(short, long)]
    pub repair: bool,

    /// Write the repaired document back to the file
    #[arg(short, long, requires = "repair")]
    pub write: bool,
}

pub fn validate(args: ValidateArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let registry = config.registry(cwd)?;
    let path = resolve(cwd, &args.file);
    let mode = if args.repair { RepairMode::Repair } else { config.editor.repair };

    println!("🔍 {} {}", "Validating".green().bold(), args.file.display());

    let loaded = match load_document(&path, &registry, mode) {
        Ok(loaded) => loaded,
        Err(err) => {
            if let Some(SerializeError::Corrupt(corrupt)) = err.downcast_ref::<SerializeError>() {
                for violation in &corrupt.violations {
                    println!("   {} {}", "✗".red(), violation);
                }
                println!();
                println!("   Run with {} to attempt a repair", "--repair".bright_white());
            }
            return Err(err);
        }
    };

    for line in repair_summary(&loaded.repairs) {
        println!("{line}");
    }
    for unknown in &loaded.unknown_components {
        println!(
            "   {} {} uses unregistered component {} (blocks publish)",
            "⚠".yellow(),
            unknown.node_id,
            unknown.component
        );
    }

    if args.write && !loaded.repairs.is_empty() {
        fs::write(&path, to_json(&loaded.document)?)?;
        println!("   {} Wrote repaired document", "✓".green());
    }

    println!();
    println!(
        "   {} {} nodes, version {}",
        "✓".green(),
        loaded.document.tree().len(),
        loaded.document.version()
    );
    if loaded.repairs.is_empty() && loaded.unknown_components.is_empty() {
        println!("   {} No issues found!", "✓".green());
    }

    Ok(())
}
