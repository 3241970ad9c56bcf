use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use pagecraft_document::{
    render as render_tree, Breakpoint, RenderInstruction, RenderKind, RenderOptions,
};
use std::path::PathBuf;

use super::{load_document, resolve};

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Page document to render
    pub file: PathBuf,

    /// Breakpoint to resolve props at (desktop, tablet, mobile)
    #[arg(short, long, default_value = "desktop")]
    pub breakpoint: Breakpoint,

    /// Include hidden nodes
    #[arg(long)]
    pub include_hidden: bool,

    /// Print the instructions as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn render(args: RenderArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let registry = config.registry(cwd)?;
    let loaded = load_document(&resolve(cwd, &args.file), &registry, config.editor.repair)?;

    let options = RenderOptions {
        include_hidden: args.include_hidden,
    };
    let instructions = render_tree(loaded.document.tree(), &registry, args.breakpoint, options);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&instructions)?);
        return Ok(());
    }

    let viewport = args.breakpoint.viewport();
    println!(
        "🖼  {} {} at {} ({} × {})",
        "Rendering".green().bold(),
        args.file.display(),
        args.breakpoint.as_str().bright_white(),
        viewport.width,
        viewport.height
    );
    println!();
    for instruction in &instructions {
        println!("{}", format_instruction(instruction)?);
    }

    Ok(())
}

fn format_instruction(instruction: &RenderInstruction) -> Result<String> {
    let indent = "  ".repeat(instruction.depth);
    let line = match &instruction.kind {
        RenderKind::Component { component } => format!(
            "{indent}{} {} {}",
            component.bright_blue(),
            instruction.node_id.dimmed(),
            serde_json::to_string(&instruction.props)?
        ),
        RenderKind::Placeholder { component } => format!(
            "{indent}{} {} (unregistered)",
            component.yellow(),
            instruction.node_id.dimmed()
        ),
    };
    Ok(line)
}
